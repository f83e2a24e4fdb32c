use anyhow::Result;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use whoop_club_bot::database::{connection::DatabaseManager, models::*};
use whoop_club_bot::services::webhook::{ApiService, Participant, SIGNATURE_HEADER};

async fn setup_test_db() -> Result<(Arc<DatabaseManager>, TempDir)> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("test.db");
    let database_url = format!("sqlite:{}", db_path.display());

    let db_manager = DatabaseManager::new(&database_url).await?;
    db_manager.run_migrations().await?;

    Ok((Arc::new(db_manager), temp_dir))
}

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn signature_header() -> HeaderName {
    HeaderName::from_static(SIGNATURE_HEADER)
}

#[tokio::test]
async fn test_health_endpoints() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let server = TestServer::new(ApiService::new(db, None).router)?;

    server.get("/health").await.assert_status_ok();
    server.get("/health/ready").await.assert_status_ok();
    server.get("/health/live").await.assert_status_ok();

    Ok(())
}

#[tokio::test]
async fn test_webhook_rejects_missing_and_bad_signature() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let server = TestServer::new(ApiService::new(db, Some("secret".to_string())).router)?;
    let body = br#"{"event":"payment.succeeded","object":{"id":"gw-1","metadata":{}}}"#;

    let response = server.post("/webhook/gateway").bytes(body.to_vec().into()).await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/webhook/gateway")
        .add_header(signature_header(), HeaderValue::from_static("deadbeef"))
        .bytes(body.to_vec().into())
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_webhook_acks_valid_signature() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let server = TestServer::new(ApiService::new(db, Some("secret".to_string())).router)?;
    let body = br#"{"event":"payment.succeeded","object":{"id":"gw-1","metadata":{}}}"#;

    let response = server
        .post("/webhook/gateway")
        .add_header(signature_header(), HeaderValue::from_str(&sign("secret", body))?)
        .bytes(body.to_vec().into())
        .await;
    response.assert_status_ok();
    let ack: serde_json::Value = response.json();
    assert_eq!(ack["ok"], true);

    Ok(())
}

#[tokio::test]
async fn test_webhook_acks_garbage_payload_when_unsigned() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    // No secret configured: unsigned webhooks are accepted.
    let server = TestServer::new(ApiService::new(db, None).router)?;

    let response = server
        .post("/webhook/gateway")
        .bytes(b"not even json".to_vec().into())
        .await;
    response.assert_status_ok();
    let ack: serde_json::Value = response.json();
    assert_eq!(ack["ok"], true);

    Ok(())
}

#[tokio::test]
async fn test_webhook_applies_payment_end_to_end() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    let slot_id = Slot::reserve(&db.pool, training.id, 1, "fast", "R1", "gateway", Utc::now())
        .await?
        .expect("reservation");
    let payment =
        Payment::create(&db.pool, 1, 800, "gateway", "slot", slot_id, None, None, Utc::now())
            .await?;

    let server = TestServer::new(ApiService::new(db.clone(), Some("secret".to_string())).router)?;
    let body = format!(
        r#"{{"event":"payment.succeeded","object":{{"id":"gw-1","metadata":{{"payment_id":"{}"}}}}}}"#,
        payment.id
    );

    // Deliver the same event twice, as gateways do.
    for _ in 0..2 {
        let response = server
            .post("/webhook/gateway")
            .add_header(
                signature_header(),
                HeaderValue::from_str(&sign("secret", body.as_bytes()))?,
            )
            .bytes(body.clone().into_bytes().into())
            .await;
        response.assert_status_ok();
    }

    let slot = Slot::find_by_id(&db.pool, slot_id).await?.expect("slot");
    assert_eq!(slot.status, "confirmed");
    let payment = Payment::find_by_id(&db.pool, payment.id).await?.expect("payment");
    assert_eq!(payment.status, "succeeded");

    Ok(())
}

#[tokio::test]
async fn test_participants_export() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let date = Utc::now() + Duration::days(2);
    let training = Training::create(&db.pool, date).await?;
    User::upsert(&db.pool, 1, "Maverick", "Analog").await?;
    User::upsert(&db.pool, 2, "Goose", "DJI").await?;

    let confirmed = Slot::reserve(&db.pool, training.id, 1, "fast", "R1", "manual", Utc::now())
        .await?
        .expect("reservation");
    whoop_club_bot::services::moderation::approve_slot(&db.pool, confirmed).await?;
    // A still-pending slot must not appear in the export.
    Slot::reserve(&db.pool, training.id, 2, "fast", "R2", "manual", Utc::now()).await?;

    let server = TestServer::new(ApiService::new(db, None).router)?;

    let response = server
        .get("/api/participants")
        .add_query_param("date", date.format("%d.%m.%Y").to_string())
        .await;
    response.assert_status_ok();
    let pilots: Vec<Participant> = response.json();
    assert_eq!(pilots.len(), 1);
    assert_eq!(pilots[0].callsign, "Maverick");
    assert_eq!(pilots[0].group, "fast");
    assert_eq!(pilots[0].channel, "R1");

    Ok(())
}

#[tokio::test]
async fn test_participants_bad_and_unknown_dates() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let server = TestServer::new(ApiService::new(db, None).router)?;

    server
        .get("/api/participants")
        .add_query_param("date", "2026-01-01")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .get("/api/participants")
        .add_query_param("date", "01.01.2030")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    Ok(())
}
