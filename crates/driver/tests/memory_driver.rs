//! Tests for the scripted in-memory driver.

use journal_sync_driver::testing::{row, MemoryDriver};
use journal_sync_driver::{Driver, DriverError};
use sync_core::SourceValue;

#[tokio::test]
async fn test_registered_rows_are_returned_in_order() {
    let driver = MemoryDriver::new();
    driver.respond(
        "SELECT A FROM T",
        vec![row([("A", 1i64)]), row([("A", 2i64)])],
    );

    let conn = driver.open_connection().await.unwrap();
    let mut cmd = conn.prepare("SELECT A FROM T").await.unwrap();
    assert_eq!(cmd.sql(), "SELECT A FROM T");
    let mut cursor = cmd.execute_query().await.unwrap();

    let mut seen = Vec::new();
    while cursor.next().await.unwrap() {
        seen.push(cursor.value("a").unwrap());
    }
    assert_eq!(seen, vec![SourceValue::Int(1), SourceValue::Int(2)]);
    assert_eq!(driver.execution_count("SELECT A FROM T"), 1);
}

#[tokio::test]
async fn test_unregistered_query_is_empty() {
    let driver = MemoryDriver::new();
    let conn = driver.open_connection().await.unwrap();
    let mut cursor = conn
        .prepare("SELECT X FROM NOWHERE")
        .await
        .unwrap()
        .execute_query()
        .await
        .unwrap();
    assert!(!cursor.next().await.unwrap());
    assert_eq!(driver.executed(), vec!["SELECT X FROM NOWHERE".to_string()]);
}

#[tokio::test]
async fn test_missing_column() {
    let driver = MemoryDriver::new();
    driver.respond("Q", vec![row([("A", "x")])]);
    let conn = driver.open_connection().await.unwrap();
    let mut cursor = conn.prepare("Q").await.unwrap().execute_query().await.unwrap();
    assert!(cursor.next().await.unwrap());
    assert!(matches!(
        cursor.value("B"),
        Err(DriverError::MissingColumn(c)) if c == "B"
    ));
}

#[tokio::test]
async fn test_one_shot_precedes_persistent_response() {
    let driver = MemoryDriver::new();
    driver.respond("Q", vec![]);
    driver.respond_once("Q", vec![row([("A", 7i64)])]);
    let conn = driver.open_connection().await.unwrap();

    let mut first = conn.prepare("Q").await.unwrap().execute_query().await.unwrap();
    assert!(first.next().await.unwrap());

    let mut second = conn.prepare("Q").await.unwrap().execute_query().await.unwrap();
    assert!(!second.next().await.unwrap());
}

#[tokio::test]
async fn test_scripted_failures() {
    let driver = MemoryDriver::new();
    driver.fail_on("BAD");
    let conn = driver.open_connection().await.unwrap();
    let err = conn
        .prepare("BAD")
        .await
        .unwrap()
        .execute_query()
        .await
        .err()
        .unwrap();
    assert!(matches!(err, DriverError::Query { .. }));

    driver.clear_failure("BAD");
    assert!(conn.prepare("BAD").await.unwrap().execute_query().await.is_ok());

    driver.set_fail_open(true);
    assert!(matches!(
        driver.open_connection().await.err().unwrap(),
        DriverError::Connection(_)
    ));
}

#[tokio::test]
async fn test_closed_connection_rejects_prepare() {
    let driver = MemoryDriver::new();
    let mut conn = driver.open_connection().await.unwrap();
    conn.close().await.unwrap();
    assert!(matches!(
        conn.prepare("Q").await.err().unwrap(),
        DriverError::Closed
    ));
    assert_eq!(driver.opened(), 1);
    assert_eq!(driver.closed(), 1);
}
