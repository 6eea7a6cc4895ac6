#![allow(clippy::unwrap_used, clippy::panic)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use tokio::sync::watch;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::db::Database;
use crate::models::{Session, TransactionType, User};

fn new_txn(description: &str, day: u32) -> NewTransaction {
    NewTransaction {
        user_id: None,
        description: description.into(),
        amount: dec!(10),
        kind: TransactionType::Expense,
        date: Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap(),
    }
}

// ── Local store ───────────────────────────────────────────────

#[tokio::test]
async fn test_local_empty_slot_reads_empty() {
    let store = LocalStore::new(Arc::new(Database::open_in_memory().unwrap()));
    assert!(store.fetch_all(&Scope::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_local_insert_assigns_unique_ids() {
    let store = LocalStore::new(Arc::new(Database::open_in_memory().unwrap()));
    let a = store.insert(&new_txn("a", 1)).await.unwrap();
    let b = store.insert(&new_txn("b", 2)).await.unwrap();
    let c = store.insert(&new_txn("c", 3)).await.unwrap();
    assert_ne!(a.id, b.id);
    assert_ne!(b.id, c.id);
    assert_ne!(a.id, c.id);
    assert!(a.id.parse::<i64>().is_ok());
}

#[tokio::test]
async fn test_local_fetch_sorts_by_date_desc() {
    let store = LocalStore::new(Arc::new(Database::open_in_memory().unwrap()));
    store.insert(&new_txn("middle", 10)).await.unwrap();
    store.insert(&new_txn("oldest", 1)).await.unwrap();
    store.insert(&new_txn("newest", 20)).await.unwrap();

    let all = store.fetch_all(&Scope::All).await.unwrap();
    let names: Vec<&str> = all.iter().map(|t| t.description.as_str()).collect();
    assert_eq!(names, vec!["newest", "middle", "oldest"]);
}

#[tokio::test]
async fn test_local_slot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let id = {
        let store = LocalStore::new(Arc::new(Database::open(&path).unwrap()));
        store.insert(&new_txn("persisted", 5)).await.unwrap().id
    };
    let store = LocalStore::new(Arc::new(Database::open(&path).unwrap()));
    let all = store.fetch_all(&Scope::All).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, id);
    assert_eq!(all[0].description, "persisted");
}

#[tokio::test]
async fn test_local_slot_is_json_array() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = LocalStore::new(db.clone());
    store.insert(&new_txn("coffee", 2)).await.unwrap();

    let raw = db
        .read_slot(crate::db::schema::TRANSACTIONS_SLOT)
        .unwrap()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(json.is_array());
    assert_eq!(json[0]["description"], "coffee");
    assert_eq!(json[0]["type"], "expense");
}

#[tokio::test]
async fn test_local_delete_and_missing_delete() {
    let store = LocalStore::new(Arc::new(Database::open_in_memory().unwrap()));
    let a = store.insert(&new_txn("a", 1)).await.unwrap();
    store.insert(&new_txn("b", 2)).await.unwrap();

    store.delete(&a.id, &Scope::All).await.unwrap();
    store.delete(&a.id, &Scope::All).await.unwrap();
    store.delete("does-not-exist", &Scope::All).await.unwrap();

    let all = store.fetch_all(&Scope::All).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].description, "b");
}

#[tokio::test]
async fn test_local_delete_respects_owner() {
    let store = LocalStore::new(Arc::new(Database::open_in_memory().unwrap()));
    let mut owned = new_txn("mine", 1);
    owned.user_id = Some("u-2".into());
    let row = store.insert(&owned).await.unwrap();

    store
        .delete(&row.id, &Scope::Owner("u-1".into()))
        .await
        .unwrap();
    assert_eq!(store.fetch_all(&Scope::All).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_local_corrupt_slot_is_an_error() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.write_slot(crate::db::schema::TRANSACTIONS_SLOT, "{not json")
        .unwrap();
    let store = LocalStore::new(db);
    let err = store.fetch_all(&Scope::All).await.unwrap_err();
    assert!(matches!(err, crate::error::StoreError::Corrupt(_)));
}

#[tokio::test]
async fn test_local_slot_keeps_exact_amounts() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = LocalStore::new(db.clone());
    let mut precise = new_txn("Precise", 3);
    precise.amount = dec!(999999999999.99);
    let mut small = new_txn("Small", 4);
    small.amount = dec!(0.1);
    store.insert(&precise).await.unwrap();
    store.insert(&small).await.unwrap();

    let raw = db
        .read_slot(crate::db::schema::TRANSACTIONS_SLOT)
        .unwrap()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json[1]["amount"], "999999999999.99");

    let all = store.fetch_all(&Scope::All).await.unwrap();
    assert_eq!(all[0].amount, dec!(0.1));
    assert_eq!(all[1].amount, dec!(999999999999.99));
}

#[tokio::test]
async fn test_local_slot_reads_numeric_amounts() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.write_slot(
        crate::db::schema::TRANSACTIONS_SLOT,
        r#"[{"id":"1","description":"Coffee","amount":3.5,"type":"expense","date":"2024-01-02T09:00:00Z"}]"#,
    )
    .unwrap();
    let store = LocalStore::new(db);
    let all = store.fetch_all(&Scope::All).await.unwrap();
    assert_eq!(all[0].amount, dec!(3.5));
}

#[tokio::test]
async fn test_oversized_amount_leaves_local_ledger_usable() {
    let store = LocalStore::new(Arc::new(Database::open_in_memory().unwrap()));
    let ledger = crate::ledger::Ledger::new(store, Scope::All);

    let err = ledger
        .add("Big", "79228162514264337593543950335", TransactionType::Income)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    let err = ledger
        .add("Precise", "12345678901234567.89", TransactionType::Income)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    ledger.add("Coffee", "3", TransactionType::Expense).await.unwrap();
    assert_eq!(ledger.load().await.unwrap(), 1);
    assert_eq!(ledger.balance(), dec!(-3));
}

#[test]
fn test_next_id_bumps_past_collisions() {
    let existing = vec![
        new_txn("a", 1).into_transaction("1000".into()),
        new_txn("b", 1).into_transaction("1001".into()),
    ];
    assert_eq!(local::next_id(&existing, 1000), "1002");
    assert_eq!(local::next_id(&existing, 999), "999");
}

// ── Remote store ──────────────────────────────────────────────

fn remote(server: &MockServer, session: Option<watch::Receiver<Option<Session>>>) -> RemoteStore {
    RemoteStore::new(
        reqwest::Client::new(),
        &server.uri().parse().unwrap(),
        "anon-key".into(),
        session,
    )
}

fn session_for(user: &str) -> Session {
    Session {
        access_token: "user-token".into(),
        refresh_token: "refresh".into(),
        expires_at: Utc::now() + chrono::Duration::hours(1),
        user: User {
            id: user.into(),
            email: Some("ana@example.com".into()),
        },
    }
}

fn row_json(id: &str, description: &str, date: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "user_id": "u-1",
        "description": description,
        "amount": 12.5,
        "type": "income",
        "date": date,
        "created_at": date,
        "updated_at": date
    })
}

#[tokio::test]
async fn test_remote_fetch_sends_anon_key_and_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/transactions"))
        .and(query_param("select", "*"))
        .and(query_param("order", "date.desc"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            row_json("2", "Salary", "2024-02-01T00:00:00+00:00"),
            row_json("1", "Bonus", "2024-01-01T00:00:00+00:00"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = remote(&server, None).fetch_all(&Scope::All).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].description, "Salary");
    assert_eq!(rows[0].amount, dec!(12.5));
}

#[tokio::test]
async fn test_remote_fetch_scoped_uses_session_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/transactions"))
        .and(query_param("user_id", "eq.u-1"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let (_tx, rx) = watch::channel(Some(session_for("u-1")));
    let store = remote(&server, Some(rx));
    assert!(store.is_authenticated());
    let rows = store.fetch_all(&Scope::Owner("u-1".into())).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_remote_without_session_is_not_authenticated() {
    let server = MockServer::start().await;
    let (_tx, rx) = watch::channel(None);
    let err = remote(&server, Some(rx))
        .fetch_all(&Scope::Owner("u-1".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, crate::error::StoreError::NotAuthenticated));
}

#[tokio::test]
async fn test_remote_insert_returns_created_row() {
    let server = MockServer::start().await;
    let mut new = new_txn("Salary", 3);
    new.user_id = Some("u-1".into());
    new.kind = TransactionType::Income;

    Mock::given(method("POST"))
        .and(path("/rest/v1/transactions"))
        .and(header("prefer", "return=representation"))
        .and(body_json(serde_json::json!([{
            "user_id": "u-1",
            "description": "Salary",
            "amount": 10.0,
            "type": "income",
            "date": "2024-01-03T09:00:00Z"
        }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([
            row_json("abc", "Salary", "2024-01-03T09:00:00+00:00")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let stored = remote(&server, None).insert(&new).await.unwrap();
    assert_eq!(stored.id, "abc");
    assert_eq!(stored.user_id.as_deref(), Some("u-1"));
}

#[tokio::test]
async fn test_remote_insert_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/transactions"))
        .respond_with(ResponseTemplate::new(403).set_body_string("new row violates row-level security"))
        .mount(&server)
        .await;

    let err = remote(&server, None)
        .insert(&new_txn("x", 1))
        .await
        .unwrap_err();
    match err {
        crate::error::StoreError::Rejected { status, body, .. } => {
            assert_eq!(status, 403);
            assert!(body.contains("row-level security"));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_remote_insert_empty_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/transactions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let err = remote(&server, None)
        .insert(&new_txn("x", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, crate::error::StoreError::Rejected { .. }));
}

#[tokio::test]
async fn test_remote_delete_scoped() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/transactions"))
        .and(query_param("id", "eq.abc"))
        .and(query_param("user_id", "eq.u-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (_tx, rx) = watch::channel(Some(session_for("u-1")));
    remote(&server, Some(rx))
        .delete("abc", &Scope::Owner("u-1".into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_remote_unreachable() {
    let store = RemoteStore::new(
        reqwest::Client::new(),
        &"http://127.0.0.1:1".parse().unwrap(),
        "anon-key".into(),
        None,
    );
    let err = store.fetch_all(&Scope::All).await.unwrap_err();
    assert!(err.is_unreachable());
}

#[tokio::test]
async fn test_remote_bad_payload_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = remote(&server, None).fetch_all(&Scope::All).await.unwrap_err();
    assert!(matches!(err, crate::error::StoreError::Decode { .. }));
}

// ── Change feed ───────────────────────────────────────────────

fn stamps(pairs: &[(&str, &str)]) -> BTreeMap<String, Option<String>> {
    pairs
        .iter()
        .map(|(id, at)| (id.to_string(), Some(at.to_string())))
        .collect()
}

#[test]
fn test_diff_detects_insert_update_delete() {
    let prev = stamps(&[("a", "t1"), ("b", "t1"), ("c", "t1")]);
    let next = stamps(&[("a", "t1"), ("b", "t2"), ("d", "t1")]);
    let events = realtime::diff(&prev, &next);
    assert_eq!(
        events,
        vec![
            ChangeEvent::Update("b".into()),
            ChangeEvent::Insert("d".into()),
            ChangeEvent::Delete("c".into()),
        ]
    );
}

#[test]
fn test_diff_identical_is_empty() {
    let snap = stamps(&[("a", "t1")]);
    assert!(realtime::diff(&snap, &snap).is_empty());
}

#[tokio::test]
async fn test_watch_emits_after_baseline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/transactions"))
        .and(query_param("select", "id,updated_at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "a", "updated_at": "t1"}
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/transactions"))
        .and(query_param("select", "id,updated_at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "a", "updated_at": "t1"},
            {"id": "b", "updated_at": "t1"}
        ])))
        .mount(&server)
        .await;

    let backend = Backend::Remote(remote(&server, None));
    let mut sub = backend
        .subscribe(&Scope::All, Duration::from_millis(10))
        .unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .unwrap();
    assert_eq!(event, Some(ChangeEvent::Insert("b".into())));
}

#[tokio::test]
async fn test_local_backend_has_no_feed() {
    let backend = Backend::Local(LocalStore::new(Arc::new(Database::open_in_memory().unwrap())));
    assert!(backend.subscribe(&Scope::All, Duration::from_secs(1)).is_none());
    assert_eq!(backend.label(), "local");
}
