//! Execute tests for exec command.

#[cfg(test)]
mod tests {
    use super::super::ExecCmd;
    use super::super::execute::ExecResult;
    use crate::commands::Execute;
    use litequery::Connection;
    use litequery::test_utils::blog_db;
    use rstest::{fixture, rstest};

    #[fixture]
    fn conn() -> Connection {
        blog_db()
    }

    #[rstest]
    fn test_counts_changes_across_statements(conn: Connection) {
        let cmd = ExecCmd {
            sql: "INSERT INTO authors (name) VALUES ('barbara'); UPDATE posts SET views = views + 1;"
                .into(),
        };
        let result = cmd.execute(&conn).unwrap();
        assert_eq!(
            result,
            ExecResult {
                changes: 5,
                last_insert_rowid: 4
            }
        );
    }

    #[rstest]
    fn test_invalid_sql_fails(conn: Connection) {
        let cmd = ExecCmd {
            sql: "DROP TABLE nope".into(),
        };
        let err = cmd.execute(&conn).unwrap_err();
        assert!(err.to_string().contains("no such table"), "got {}", err);
    }
}
