//! Lazy, forward-only iteration over a statement's rows.

use std::iter::FusedIterator;

use crate::db::Result;
use crate::statement::Statement;

/// Where a cursor is in its single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// More rows may follow.
    Ready,
    Exhausted,
    /// A step or materialization failed; the error was the last item.
    Failed,
    Closed,
}

type Materializer<'conn, T> = Box<dyn FnMut(&Statement<'conn>) -> Result<T> + 'conn>;

/// Owns a [`Statement`] and yields one materialized item per row.
///
/// The statement is finalized as soon as the cursor is exhausted, fails,
/// is closed or is dropped, whichever happens first. An error is yielded
/// once as `Some(Err(_))`; iteration ends after it.
pub struct Cursor<'conn, T> {
    stmt: Statement<'conn>,
    materialize: Materializer<'conn, T>,
    state: CursorState,
}

impl<'conn, T> Cursor<'conn, T> {
    pub(crate) fn new(stmt: Statement<'conn>, materialize: Materializer<'conn, T>) -> Self {
        Self {
            stmt,
            materialize,
            state: CursorState::Ready,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn column_names(&self) -> &[String] {
        self.stmt.column_names()
    }

    /// Stop iterating and finalize the statement. Idempotent.
    pub fn close(&mut self) {
        if self.state == CursorState::Ready {
            self.state = CursorState::Closed;
        }
        self.stmt.finalize();
    }

    /// Give back the underlying statement; finalized unless the cursor was
    /// still ready.
    pub fn into_statement(self) -> Statement<'conn> {
        self.stmt
    }

    fn finish(&mut self, state: CursorState) {
        self.state = state;
        self.stmt.finalize();
    }
}

impl<T> Iterator for Cursor<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != CursorState::Ready {
            return None;
        }
        match self.stmt.step() {
            Ok(true) => match (self.materialize)(&self.stmt) {
                Ok(item) => Some(Ok(item)),
                Err(e) => {
                    self.finish(CursorState::Failed);
                    Some(Err(e))
                }
            },
            Ok(false) => {
                self.finish(CursorState::Exhausted);
                None
            }
            Err(e) => {
                self.finish(CursorState::Failed);
                Some(Err(e))
            }
        }
    }
}

impl<T> FusedIterator for Cursor<'_, T> {}
