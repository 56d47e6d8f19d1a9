//! SQL fixtures for tests, embedded with `include_str!`.
//!
//! ## Available Fixtures
//!
//! - [`BLOG`] - authors, posts and comments with foreign keys
//! - [`NOTES`] - one table holding every storage class, NULLs included

/// Blog schema with data.
///
/// Contains:
/// - 3 authors, one of them (`edsger`) without posts
/// - 4 posts with view counts
/// - 3 comments on posts 1 and 3; posts 2 and 4 have none
pub const BLOG: &str = include_str!("blog.sql");

/// Single `notes(id, txt, data, score)` table.
///
/// Contains:
/// - 3 rows covering text, blob (including the empty blob), real and NULL
pub const NOTES: &str = include_str!("notes.sql");
