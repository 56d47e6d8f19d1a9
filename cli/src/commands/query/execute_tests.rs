//! Execute tests for query command.

#[cfg(test)]
mod tests {
    use super::super::QueryCmd;
    use crate::commands::Execute;
    use litequery::test_utils::blog_db;
    use litequery::{Connection, DbError, Value};
    use rstest::{fixture, rstest};

    #[fixture]
    fn conn() -> Connection {
        blog_db()
    }

    #[rstest]
    fn test_query_with_params(conn: Connection) {
        let cmd = QueryCmd {
            sql: "SELECT title, views FROM posts WHERE views > ? ORDER BY views DESC".into(),
            params: vec![Value::Integer(100)],
        };
        let result = cmd.execute(&conn).unwrap();
        assert_eq!(result.headers, vec!["title", "views"]);
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Text("Compilers".into()), Value::Integer(300)],
                vec![Value::Text("Notes on the engine".into()), Value::Integer(120)],
            ]
        );
    }

    #[rstest]
    fn test_wrong_param_count(conn: Connection) {
        let cmd = QueryCmd {
            sql: "SELECT ?".into(),
            params: vec![],
        };
        let err = cmd.execute(&conn).unwrap_err();
        let err = err.downcast_ref::<DbError>().expect("DbError");
        assert_eq!(
            err,
            &DbError::BindingCount {
                expected: 1,
                actual: 0
            }
        );
    }
}
