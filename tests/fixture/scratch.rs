//! Scratch databases: unique names and cleanup on every exit path.

use crate::common::{init_tracing, scratch_prefix, test_config, unique_name};
use dbfixture::{sql_state, DropOutcome, Fixture};
use tokio_postgres::error::SqlState;

#[tokio::test]
async fn test_scratch_release() {
    skip_if_no_db!();
    init_tracing();
    let prefix = scratch_prefix("rel");
    let fixture = Fixture::setup(test_config().with_scratch_prefix(&prefix))
        .await
        .unwrap();

    let scratch = fixture
        .scratch_database(["CREATE TABLE t (id BIGINT PRIMARY KEY)"])
        .await
        .unwrap();
    let name = scratch.name().to_string();
    assert!(name.starts_with(&prefix));
    assert_eq!(scratch.id(), fixture.database_id(&name));

    let client = scratch.batch_client();
    assert!(client.query("SELECT id FROM t", &[]).await.unwrap().is_empty());
    drop(client);

    assert_eq!(scratch.release().await.unwrap(), DropOutcome::Dropped);
    assert!(!fixture.database_exists(&name).await.unwrap());

    fixture.teardown().await;
}

#[tokio::test]
async fn test_scratch_dropped_on_scope_exit() {
    skip_if_no_db!();
    let fixture = Fixture::setup(test_config()).await.unwrap();

    let name = {
        let scratch = fixture
            .scratch_database(["CREATE TABLE t (id BIGINT PRIMARY KEY)"])
            .await
            .unwrap();
        assert!(fixture.database_exists(scratch.name()).await.unwrap());
        scratch.name().to_string()
    };

    assert!(
        !fixture.database_exists(&name).await.unwrap(),
        "scratch database {} survived its guard",
        name
    );
    fixture.teardown().await;
}

#[tokio::test]
async fn test_scratch_failed_ddl_leaves_nothing_behind() {
    skip_if_no_db!();
    let prefix = scratch_prefix("bad");
    let fixture = Fixture::setup(test_config().with_scratch_prefix(&prefix))
        .await
        .unwrap();

    let result = fixture.scratch_database(["CREATE TABEL nope (id BIGINT)"]).await;
    assert!(result.is_err());
    drop(result);

    let observer = fixture.batch_client(
        test_config()
            .admin_pg_config()
            .unwrap()
            .get_dbname()
            .unwrap(),
    );
    let row = observer
        .query_one(
            "SELECT count(*) FROM pg_database WHERE datname LIKE $1",
            &[&format!("{}%", prefix)],
        )
        .await
        .unwrap();
    assert_eq!(row.get::<_, i64>(0), 0);

    drop(observer);
    fixture.teardown().await;
}

#[tokio::test]
async fn test_scratch_name_collision_keeps_existing_database() {
    skip_if_no_db!();
    init_tracing();
    let fixture = Fixture::setup(test_config()).await.unwrap();
    let taken = unique_name("taken");
    fixture
        .create_database(&taken, ["CREATE TABLE precious (id BIGINT PRIMARY KEY)"])
        .await
        .unwrap();

    let err = match fixture
        .scratch_database_named(&taken, ["CREATE TABLE t (id BIGINT)"])
        .await
    {
        Ok(_) => panic!("scratch database reused the taken name {}", taken),
        Err(e) => e,
    };
    assert_eq!(sql_state(&err), Some(&SqlState::DUPLICATE_DATABASE));

    assert!(
        fixture.database_exists(&taken).await.unwrap(),
        "existing database {} was dropped by a failed scratch create",
        taken
    );
    let client = fixture.batch_client(&taken);
    assert!(client
        .query("SELECT id FROM precious", &[])
        .await
        .unwrap()
        .is_empty());
    drop(client);

    fixture.drop_database(&taken).await;
    fixture.teardown().await;
}

#[tokio::test]
async fn test_scratch_named_failed_ddl_drops_own_database() {
    skip_if_no_db!();
    let fixture = Fixture::setup(test_config()).await.unwrap();
    let name = unique_name("own_bad");

    let err = match fixture
        .scratch_database_named(&name, ["CREATE TABLE ok (id BIGINT)", "CREATE TABEL nope (id BIGINT)"])
        .await
    {
        Ok(_) => panic!("malformed DDL was accepted"),
        Err(e) => e,
    };
    assert_eq!(sql_state(&err), Some(&SqlState::SYNTAX_ERROR));
    assert!(!fixture.database_exists(&name).await.unwrap());

    fixture.teardown().await;
}
