//! Batch insert and upsert against a scripted connection.

mod common;

use common::{MockConnection, users};
use oraorm::{
    Dialect, DialectConfig, Entity, FieldMeta, LogicalType, OnConflict, OrmError, Record, Schema,
    Session, Value,
};

fn record(schema: &Schema, id: i64, name: &str) -> Record {
    Record::from_pairs(
        schema,
        [
            ("id", Value::Int(id)),
            ("name", name.into()),
            ("email", format!("{name}@example.com").into()),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn batch_insert_reads_back_identities_in_order() {
    let schema = users();
    let session = Session::new(MockConnection::new(), Dialect::default());
    let mut rows = vec![record(&schema, 0, "a"), record(&schema, 0, "b"), record(&schema, 0, "c")];

    let affected = session.create(&schema, &mut rows, None).await.unwrap();
    assert_eq!(affected, 3);

    let ids: Vec<_> = rows.iter().map(|r| r.get(&schema, "id").cloned()).collect();
    assert_eq!(
        ids,
        [Some(Value::Int(100)), Some(Value::Int(101)), Some(Value::Int(102))]
    );

    let executed = session.connection().executed();
    assert_eq!(executed.len(), 3);
    assert_eq!(
        executed[0].sql,
        "INSERT INTO USERS (NAME, EMAIL) VALUES (:1, :2) RETURNING ID INTO :3"
    );
    assert_eq!(
        executed[1].binds,
        [Value::Text("b".into()), Value::Text("b@example.com".into())]
    );
    assert_eq!(executed[0].outs[0].position, 3);
}

#[tokio::test]
async fn explicit_values_are_not_overwritten() {
    let schema = Schema::new("users")
        .field(FieldMeta::new("id", LogicalType::Int).primary_key().auto_increment())
        .field(FieldMeta::new("code", LogicalType::String).default_expr("SYS_GUID()"));
    let session = Session::new(MockConnection::new(), Dialect::default());
    let mut rows = vec![Record::from_pairs(&schema, [("id", Value::Int(7))]).unwrap()];

    session.create(&schema, &mut rows, None).await.unwrap();

    let executed = session.connection().executed();
    assert_eq!(
        executed[0].sql,
        "INSERT INTO USERS (ID) VALUES (:1) RETURNING ID, CODE INTO :2, :3"
    );
    assert_eq!(rows[0].get(&schema, "id"), Some(&Value::Int(7)));
    assert_eq!(
        rows[0].get(&schema, "code"),
        Some(&Value::Text("generated code".into()))
    );
}

#[tokio::test]
async fn binds_are_converted_before_execution() {
    let schema = Schema::new("flags")
        .field(FieldMeta::new("id", LogicalType::Int).primary_key().auto_increment())
        .field(FieldMeta::new("enabled", LogicalType::Bool))
        .field(FieldMeta::new("body", LogicalType::String).size(4000));
    let session = Session::new(MockConnection::new(), Dialect::default());
    let long = "x".repeat(2001);
    let mut rows = vec![
        Record::from_pairs(
            &schema,
            [("enabled", Value::Bool(true)), ("body", Value::Text(long.clone()))],
        )
        .unwrap(),
    ];

    session.create(&schema, &mut rows, None).await.unwrap();

    let executed = session.connection().executed();
    assert_eq!(executed[0].binds, [Value::Int(1), Value::Clob(long)]);
}

#[tokio::test]
async fn failure_after_first_row_is_partial() {
    let schema = users();
    let session = Session::new(MockConnection::new().failing_on(2), Dialect::default());
    let mut rows: Vec<_> = (0..4).map(|i| record(&schema, 0, &format!("u{i}"))).collect();

    let err = session.create(&schema, &mut rows, None).await.unwrap_err();
    match &err {
        OrmError::PartialBatch {
            rows_affected,
            failed_row,
            source,
        } => {
            assert_eq!(*rows_affected, 2);
            assert_eq!(*failed_row, 2);
            assert!(source.to_string().contains("ORA-00001"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.rows_affected(), Some(2));

    // rows before the failure keep their identities, later rows are untouched
    assert_eq!(rows[1].value(oraorm::FieldId(0)), Value::Int(101));
    assert_eq!(rows[3].value(oraorm::FieldId(0)), Value::Int(0));
    assert_eq!(session.connection().executed().len(), 2);
}

#[tokio::test]
async fn failure_on_first_row_is_returned_verbatim() {
    let schema = users();
    let session = Session::new(MockConnection::new().failing_on(0), Dialect::default());
    let mut rows = vec![record(&schema, 0, "a"), record(&schema, 0, "b")];

    let err = session.create(&schema, &mut rows, None).await.unwrap_err();
    assert!(matches!(err, OrmError::Execution(_)));
    assert!(session.connection().executed().is_empty());
}

#[tokio::test]
async fn compile_errors_abort_before_execution() {
    let schema = Schema::new("logs").field(FieldMeta::new("line", LogicalType::String));
    let session = Session::new(MockConnection::new(), Dialect::default());
    let mut rows = vec![Record::from_pairs(&schema, [("line", "x")]).unwrap()];

    let err = session
        .create(&schema, &mut rows, Some(&OnConflict::do_nothing()))
        .await
        .unwrap_err();
    assert!(err.is_compile());
    assert!(session.connection().executed().is_empty());
}

#[tokio::test]
async fn upsert_runs_one_merge_per_row() {
    let schema = users();
    let dialect = Dialect::new(DialectConfig::new().with_case_sensitive_naming(true));
    let session = Session::new(MockConnection::new(), dialect);
    let mut rows = vec![record(&schema, 1, "a"), record(&schema, 2, "b")];
    let on_conflict = OnConflict::do_update().set_excluded("email");

    let affected = session
        .create(&schema, &mut rows, Some(&on_conflict))
        .await
        .unwrap();
    assert_eq!(affected, 2);

    let executed = session.connection().executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(
        executed[1].sql,
        r#"MERGE INTO "users" USING (SELECT :1 AS "id", :2 AS "name", :3 AS "email" FROM DUAL) "excluded" ON ("users"."id" = "excluded"."id") WHEN MATCHED THEN UPDATE SET "email" = "excluded"."email" WHEN NOT MATCHED THEN INSERT ("id", "name", "email") VALUES ("excluded"."id", "excluded"."name", "excluded"."email")"#
    );
    assert_eq!(executed[1].binds[0], Value::Int(2));
    assert!(executed.iter().all(|e| e.outs.is_empty()));
}

#[tokio::test]
async fn do_nothing_omits_matched_branch() {
    let schema = users();
    let session = Session::new(MockConnection::new(), Dialect::default());
    let mut rows = vec![record(&schema, 5, "a")];

    session
        .create(&schema, &mut rows, Some(&OnConflict::do_nothing()))
        .await
        .unwrap();

    let sql = &session.connection().sql_log()[0];
    assert!(sql.starts_with("MERGE INTO USERS USING"));
    assert!(!sql.contains("WHEN MATCHED"));
    assert!(sql.ends_with(
        "WHEN NOT MATCHED THEN INSERT (ID, NAME, EMAIL) VALUES (EXCLUDED.ID, EXCLUDED.NAME, EXCLUDED.EMAIL)"
    ));
}

#[tokio::test]
async fn upsert_without_key_value_falls_back_to_insert() {
    let schema = users();
    let session = Session::new(MockConnection::new(), Dialect::default());
    let mut rows = vec![record(&schema, 0, "a")];

    session
        .create(&schema, &mut rows, Some(&OnConflict::update_all()))
        .await
        .unwrap();

    assert!(session.connection().sql_log()[0].starts_with("INSERT INTO USERS"));
    assert_eq!(rows[0].get(&schema, "id"), Some(&Value::Int(100)));
}
