//! Execute tests for dump command.

#[cfg(test)]
mod tests {
    use super::super::DumpCmd;
    use crate::commands::Execute;
    use litequery::Connection;
    use litequery::test_utils::blog_db;
    use rstest::{fixture, rstest};

    #[fixture]
    fn conn() -> Connection {
        blog_db()
    }

    #[rstest]
    #[case::all(100, 3)]
    #[case::limited(2, 2)]
    #[case::none(0, 0)]
    fn test_dump_limit(conn: Connection, #[case] limit: i64, #[case] expected: usize) {
        let cmd = DumpCmd {
            table: "authors".into(),
            limit,
        };
        let result = cmd.execute(&conn).unwrap();
        assert_eq!(result.headers, vec!["id", "name"]);
        assert_eq!(result.rows.len(), expected);
    }

    #[rstest]
    fn test_quoted_table_name(conn: Connection) {
        conn.execute_batch(r#"CREATE TABLE "odd ""name""" (x); INSERT INTO "odd ""name""" VALUES (1);"#)
            .unwrap();
        let cmd = DumpCmd {
            table: r#"odd "name""#.into(),
            limit: 10,
        };
        assert_eq!(cmd.execute(&conn).unwrap().rows.len(), 1);
    }

    #[rstest]
    fn test_missing_table(conn: Connection) {
        let cmd = DumpCmd {
            table: "nope".into(),
            limit: 10,
        };
        assert!(cmd.execute(&conn).is_err());
    }
}
