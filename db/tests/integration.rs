//! End-to-end tests: typed queries compiled, prepared and run against SQLite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use litequery::expr::{column, count_star, Fragment};
use litequery::fixtures;
use litequery::schema::{ColumnDef, Table};
use litequery::{
    Connection, CursorState, DatabaseConfig, DbError, Operation, Query, TransactionMode, Value,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn blog() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to open database");
    conn.execute_batch(fixtures::BLOG).expect("fixture should load");
    conn
}

fn kv_table() -> Table {
    Table::new(
        "kv",
        vec![
            ColumnDef::typed::<i64>("id").primary_key(),
            ColumnDef::typed::<String>("txt"),
        ],
    )
}

// ==================== Transactions ====================

#[test]
fn test_transaction_rollback_leaves_table_empty() {
    let conn = Connection::open_in_memory().unwrap();
    let kv = kv_table();
    conn.execute_batch(&kv.create()).unwrap();

    let insert = kv.insert_row(&[1.into(), "A".into()]).unwrap();
    let outcome: Result<(), DbError> = conn.transaction(TransactionMode::Deferred, |c| {
        c.run(&insert)?;
        c.exec("THIS IS NOT SQL", &[])?;
        Ok(())
    });

    assert!(outcome.is_err());
    assert_eq!(conn.count(&kv.query()).unwrap(), 0);
    conn.run(&insert).unwrap();
    assert_eq!(conn.count(&kv.query()).unwrap(), 1);
}

// ==================== Writes ====================

#[test]
fn test_upsert_updates_then_inserts() {
    let conn = Connection::open_in_memory().unwrap();
    let kv = kv_table();
    conn.execute_batch(&kv.create()).unwrap();
    conn.run(&kv.insert_row(&[1.into(), "A".into()]).unwrap()).unwrap();

    conn.run(&kv.upsert_row(&[1.into(), "B".into()]).unwrap()).unwrap();
    let rows: Vec<(i64, String)> = conn.query_as("SELECT id, txt FROM kv ORDER BY id", &[]).unwrap();
    assert_eq!(rows, vec![(1, "B".to_string())]);

    conn.run(&kv.upsert_row(&[2.into(), "C".into()]).unwrap()).unwrap();
    let rows: Vec<(i64, String)> = conn.query_as("SELECT id, txt FROM kv ORDER BY id", &[]).unwrap();
    assert_eq!(rows, vec![(1, "B".to_string()), (2, "C".to_string())]);
}

#[test]
fn test_update_and_delete_by_key() {
    let conn = Connection::open_in_memory().unwrap();
    let kv = kv_table();
    conn.execute_batch(&kv.create()).unwrap();
    conn.run(&kv.insert_row(&[1.into(), "A".into()]).unwrap()).unwrap();
    conn.run(&kv.insert_row(&[2.into(), "B".into()]).unwrap()).unwrap();

    assert_eq!(conn.run(&kv.update_row(&[2.into(), "Z".into()]).unwrap()).unwrap(), 1);
    assert_eq!(conn.run(&kv.delete_row(&[1.into()]).unwrap()).unwrap(), 1);

    let rows: Vec<(i64, String)> = conn.query_as("SELECT id, txt FROM kv", &[]).unwrap();
    assert_eq!(rows, vec![(2, "Z".to_string())]);
}

#[test]
fn test_null_key_row_is_updated_and_deleted() {
    let conn = Connection::open_in_memory().unwrap();
    let codes = Table::new(
        "codes",
        vec![
            ColumnDef::typed::<Option<String>>("code").primary_key(),
            ColumnDef::typed::<i64>("n"),
        ],
    );
    conn.execute_batch(&codes.create()).unwrap();
    conn.run(&codes.insert_row(&[Value::Null, 1.into()]).unwrap()).unwrap();
    conn.run(&codes.insert_row(&["a".into(), 2.into()]).unwrap()).unwrap();

    assert_eq!(conn.run(&codes.update_row(&[Value::Null, 5.into()]).unwrap()).unwrap(), 1);
    let n: Option<i64> = conn.scalar("SELECT n FROM codes WHERE code IS NULL", &[]).unwrap();
    assert_eq!(n, Some(5));

    assert_eq!(conn.run(&codes.delete_row(&[Value::Null]).unwrap()).unwrap(), 1);
    assert_eq!(conn.count(&codes.query()).unwrap(), 1);
}

#[test]
fn test_key_only_table_update_is_rejected_before_sqlite() {
    let conn = Connection::open_in_memory().unwrap();
    let tags = Table::new("tags", vec![ColumnDef::typed::<i64>("id").primary_key()]);
    conn.execute_batch(&tags.create()).unwrap();
    conn.run(&tags.insert_row(&[1.into()]).unwrap()).unwrap();

    let err = tags.update_row(&[1.into()]).unwrap_err();
    assert_eq!(err, DbError::NoAssignments { table: "tags".into() });
    assert!(matches!(
        Query::table("tags").update(&[]),
        Err(DbError::NoAssignments { .. })
    ));
}

#[test]
fn test_update_hook_sees_builder_writes() {
    let conn = Connection::open_in_memory().unwrap();
    let kv = kv_table();
    conn.execute_batch(&kv.create()).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    conn.update_hook(Some(move |op, rowid, _: &str, table: &str| {
        sink.lock().unwrap().push((op, rowid, table.to_string()));
    }))
    .unwrap();

    conn.run(&kv.insert_row(&[7.into(), "A".into()]).unwrap()).unwrap();
    conn.run(&kv.delete_row(&[7.into()]).unwrap()).unwrap();

    assert_eq!(
        seen.lock().unwrap().as_slice(),
        [
            (Operation::Insert, 7, "kv".to_string()),
            (Operation::Delete, 7, "kv".to_string())
        ]
    );
}

// ==================== Queries ====================

#[test]
fn test_left_join_without_match_yields_null_child() {
    let conn = Connection::open_in_memory().unwrap();
    let parent = Table::new("parent", vec![ColumnDef::typed::<i64>("id").primary_key()]);
    let child = Table::new(
        "child",
        vec![
            ColumnDef::typed::<i64>("id").primary_key(),
            ColumnDef::typed::<i64>("parent_id"),
        ],
    );
    conn.execute_batch(&parent.create()).unwrap();
    conn.execute_batch(&child.create()).unwrap();
    conn.run(&parent.insert_row(&[1.into()]).unwrap()).unwrap();

    let query = parent.query().left_join(
        &child.query(),
        child.column::<i64>("parent_id").equals(parent.column::<i64>("id")),
    );
    let layout = query.layout().expect("all columns are known");
    let rows = conn.fetch(&query).unwrap();

    assert_eq!(rows.len(), 1);
    let values = rows[0].values();
    assert_eq!(layout.width(), values.len());
    assert_eq!(layout.entity_named("parent", values), Some(&[Value::Integer(1)][..]));
    assert_eq!(layout.entity_named("child", values), None);
}

#[rstest]
fn test_clause_order_is_fixed(blog: Connection) {
    let views = column::<i64>("views");
    let query = Query::table("posts")
        .select([column::<String>("title")])
        .order([views.desc()])
        .filter(views.greater_than(50))
        .limit(2);
    let compiled = query.compile();
    assert_eq!(
        compiled.sql,
        r#"SELECT "title" FROM "posts" WHERE ("views" > ?) ORDER BY "views" DESC LIMIT 2"#
    );
    let titles: Vec<String> = blog.pluck(&compiled.sql, &compiled.bindings).unwrap();
    assert_eq!(titles, vec!["Compilers", "Notes on the engine"]);
}

#[rstest]
fn test_grouped_join(blog: Connection) {
    let authors = Query::table("authors").alias("a");
    let posts = Query::table("posts").alias("p");
    let name = authors.column::<String>("name");
    let query = authors
        .join(&posts, posts.column::<i64>("author_id").equals(authors.column::<i64>("id")))
        .select([Fragment::from(&name), Fragment::from(count_star())])
        .group_by([&name])
        .order([name.asc()]);
    let compiled = query.compile();
    let rows: Vec<(String, i64)> = blog.query_as(&compiled.sql, &compiled.bindings).unwrap();
    assert_eq!(rows, vec![("ada".to_string(), 2), ("grace".to_string(), 2)]);
}

#[rstest]
fn test_joined_filter_folds_into_on(blog: Connection) {
    let posts = Query::table("posts").alias("p");
    let comments = Query::table("comments").alias("c");
    let popular = posts
        .left_join(
            &comments.filter(comments.column::<String>("body").like("%!", None)),
            comments.column::<i64>("post_id").equals(posts.column::<i64>("id")),
        )
        .select([
            Fragment::from(posts.column::<i64>("id")),
            Fragment::from(comments.column::<Option<String>>("body")),
        ])
        .order([posts.column::<i64>("id").asc()]);
    let compiled = popular.compile();
    assert!(compiled.sql.contains(" ON ("), "{}", compiled.sql);
    assert!(!compiled.sql.contains("WHERE"), "{}", compiled.sql);

    let rows: Vec<(i64, Option<String>)> = blog.query_as(&compiled.sql, &compiled.bindings).unwrap();
    assert_eq!(
        rows,
        vec![
            (1, Some("First!".to_string())),
            (2, None),
            (3, None),
            (4, None)
        ]
    );
}

#[rstest]
fn test_count_respects_limit(blog: Connection) {
    let posts = Query::table("posts");
    assert_eq!(blog.count(&posts).unwrap(), 4);
    assert_eq!(blog.count(&posts.limit(3)).unwrap(), 3);
    let authors_with_posts = posts.select_distinct([column::<i64>("author_id")]);
    assert_eq!(blog.count(&authors_with_posts).unwrap(), 2);
}

#[rstest]
fn test_placeholders_match_bindings(blog: Connection) {
    let views = column::<i64>("views");
    let title = column::<String>("title");
    let query = Query::table("posts")
        .filter(views.between(40, 130).and(title.not_in_list(["Nanoseconds", "x"])))
        .order([views.asc()]);
    let compiled = query.compile();
    assert_eq!(compiled.param_count(), compiled.bindings.len());
    assert_eq!(compiled.bindings.len(), 4);
    let stmt = blog.prepare(&compiled.sql).unwrap();
    assert_eq!(stmt.bind_parameter_count(), compiled.bindings.len());
    assert_eq!(blog.fetch(&query).unwrap().len(), 2);
}

#[rstest]
fn test_nested_union_returns_every_branch(blog: Connection) {
    let title = column::<String>("title");
    let views = column::<i64>("views");
    let posts = Query::table("posts").select([&title]);
    let popular = posts.filter(views.greater_than(200));
    let quiet = posts.filter(views.less_than(50));
    let by_ada = posts.filter(column::<i64>("author_id").equals(1));

    let query = popular.union(&quiet.union(&by_ada)).order([title.asc()]);
    let compiled = query.compile();
    let titles: Vec<String> = blog.pluck(&compiled.sql, &compiled.bindings).unwrap();
    assert_eq!(
        titles,
        vec!["Bernoulli numbers", "Compilers", "Nanoseconds", "Notes on the engine"]
    );
}

#[rstest]
fn test_union_operand_keeps_its_limit(blog: Connection) {
    let title = column::<String>("title");
    let views = column::<i64>("views");
    let posts = Query::table("posts").select([&title]);
    let most_viewed = posts.order([views.desc()]).limit(1);
    let quiet = posts.filter(views.less_than(50));

    let query = quiet.union_all(&most_viewed).order([title.asc()]);
    let compiled = query.compile();
    let titles: Vec<String> = blog.pluck(&compiled.sql, &compiled.bindings).unwrap();
    assert_eq!(titles, vec!["Compilers", "Nanoseconds"]);
    assert_eq!(blog.count(&query).unwrap(), 2);
}

#[rstest]
#[case::comments("SELECT ? -- trailing ?\n, /* ? */ ?", 2)]
#[case::numbered("SELECT ?3, ?1", 3)]
#[case::numbered_then_bare("SELECT ?2, ?", 3)]
#[case::named_reused("SELECT :a, @b, :a, $c", 3)]
#[case::quoted("SELECT 'it''s ?', ?", 1)]
fn test_placeholder_count_agrees_with_sqlite(
    blog: Connection,
    #[case] sql: &str,
    #[case] expected: usize,
) {
    let fragment = Fragment::literal(sql);
    assert_eq!(fragment.placeholder_count(), expected);
    let stmt = blog.prepare(sql).unwrap();
    assert_eq!(stmt.bind_parameter_count(), expected);
}

// ==================== Statements and cursors ====================

#[rstest]
fn test_exhausted_cursor_statement_is_closed(blog: Connection) {
    let mut cursor = blog.query("SELECT name FROM authors", &[]).unwrap();
    assert_eq!(cursor.by_ref().count(), 3);
    assert_eq!(cursor.state(), CursorState::Exhausted);
    let mut stmt = cursor.into_statement();
    assert_eq!(stmt.bind(&[]).unwrap_err(), DbError::Closed { resource: "statement" });
    stmt.finalize();
    stmt.finalize();
}

#[rstest]
#[case::integer(Value::Integer(i64::MIN))]
#[case::real(Value::Real(-0.5))]
#[case::text(Value::Text("naïve 'quoted'".into()))]
#[case::empty_text(Value::Text(String::new()))]
#[case::blob(Value::Blob(vec![0, 159, 146, 150]))]
#[case::empty_blob(Value::Blob(Vec::new()))]
#[case::null(Value::Null)]
fn test_value_round_trip(#[case] value: Value) {
    let conn = Connection::open_in_memory().unwrap();
    let back: Option<Value> = conn.scalar("SELECT ?", &[value.clone()]).unwrap();
    assert_eq!(back, Some(value));
}

#[test]
fn test_close_twice() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.close().unwrap();
    conn.close().unwrap();
    assert!(matches!(conn.prepare("SELECT 1"), Err(DbError::Closed { .. })));
}

// ==================== Cancellation ====================

#[test]
fn test_interrupt_stops_running_statement() {
    let conn = Connection::open_in_memory().unwrap();
    let handle = conn.interrupt_handle();
    let done = Arc::new(AtomicBool::new(false));
    let stop = Arc::clone(&done);
    let interrupter = thread::spawn(move || {
        while !stop.load(Ordering::SeqCst) {
            handle.interrupt();
            thread::sleep(Duration::from_millis(10));
        }
    });

    let err = conn
        .scalar::<i64>(
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT count(*) FROM c",
            &[],
        )
        .unwrap_err();
    done.store(true, Ordering::SeqCst);
    interrupter.join().unwrap();

    assert!(err.is_interrupt(), "got {}", err);
    assert_eq!(conn.scalar::<i64>("SELECT 1", &[]).unwrap(), Some(1));
}

// ==================== Configuration ====================

#[test]
fn test_file_database_persists() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("app.sqlite").display());
    let config = DatabaseConfig::from_url(&url).unwrap();

    let conn = config.connect().unwrap();
    conn.execute_batch(fixtures::NOTES).unwrap();
    drop(conn);

    let read_only = DatabaseConfig::from_url(&format!("{}?mode=ro", url)).unwrap();
    let conn = read_only.connect().unwrap();
    assert!(conn.is_readonly().unwrap());
    let texts: Vec<Option<String>> = conn.pluck("SELECT txt FROM notes ORDER BY id", &[]).unwrap();
    assert_eq!(texts, vec![Some("alpha".into()), Some("beta".into()), None]);
    assert!(conn.exec("DELETE FROM notes", &[]).is_err());
}
