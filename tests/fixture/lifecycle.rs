//! Fixture lifecycle: setup, the create/use/drop cycle, teardown.

use std::time::Duration;

use crate::common::{setup, test_config, unique_name};
use dbfixture::{BatchClient, Fixture, FixtureConfig};

async fn session_count(observer: &BatchClient<'_>, application_name: &str) -> i64 {
    observer
        .query_one(
            "SELECT count(*) FROM pg_stat_activity WHERE application_name = $1",
            &[&application_name],
        )
        .await
        .unwrap()
        .get::<_, i64>(0)
}

#[tokio::test]
async fn test_create_query_drop_cycle() {
    skip_if_no_db!();
    let fixture = setup().await;
    let name = unique_name("cycle");

    fixture
        .create_database(&name, ["CREATE TABLE t (id BIGINT PRIMARY KEY)"])
        .await
        .expect("create should succeed");

    let client = fixture.batch_client(&name);
    let rows = client.query("SELECT id FROM t", &[]).await.unwrap();
    assert!(rows.is_empty(), "fresh table should have no rows");
    drop(client);

    fixture.drop_database(&name).await;
    assert!(!fixture.database_exists(&name).await.unwrap());

    // Second drop of the same name is a no-op
    fixture.drop_database(&name).await;

    fixture.teardown().await;
}

#[tokio::test]
async fn test_setup_reports_identity_to_server() {
    skip_if_no_db!();
    let config = test_config();
    let project = unique_name("proj");
    let fixture = Fixture::setup(FixtureConfig {
        project_id: project.clone(),
        ..config.clone()
    })
    .await
    .unwrap();

    let admin_db = config.admin_pg_config().unwrap();
    let observer = fixture.batch_client(admin_db.get_dbname().unwrap());
    let application_name = format!("{}/{}", project, config.instance_id);
    // The admin session plus the observer itself
    assert_eq!(session_count(&observer, &application_name).await, 2);

    drop(observer);
    fixture.teardown().await;
}

#[tokio::test]
async fn test_dropping_fixture_releases_connection() {
    skip_if_no_db!();
    let config = test_config();
    let project = unique_name("raii");
    let application_name = format!("{}/{}", project, config.instance_id);

    let fixture = Fixture::setup(FixtureConfig {
        project_id: project,
        ..config.clone()
    })
    .await
    .unwrap();

    let watcher = Fixture::setup(config.clone()).await.unwrap();
    let admin_db = config.admin_pg_config().unwrap();
    let observer = watcher.batch_client(admin_db.get_dbname().unwrap());

    assert_eq!(session_count(&observer, &application_name).await, 1);

    // No teardown: leaving scope must be enough
    drop(fixture);

    let mut remaining = 1;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        remaining = session_count(&observer, &application_name).await;
        if remaining == 0 {
            break;
        }
    }
    assert_eq!(remaining, 0, "connection still open after fixture was dropped");

    drop(observer);
    watcher.teardown().await;
}

#[tokio::test]
async fn test_setup_propagates_connection_error() {
    // Port 1 is never a Postgres server
    let config = FixtureConfig::new("p", "i", "postgres://postgres@127.0.0.1:1/postgres")
        .with_connect_timeout(Duration::from_secs(1));
    let result = Fixture::setup(config).await;
    assert!(result.is_err(), "setup against a closed port must fail");
}

#[tokio::test]
async fn test_setup_rejects_invalid_host() {
    let config = FixtureConfig::new("p", "i", "postgres://postgres@localhost:5432");
    let err = match Fixture::setup(config).await {
        Ok(_) => panic!("host without administrative database accepted"),
        Err(e) => e,
    };
    assert!(format!("{err:#}").contains("administrative database"));
}
