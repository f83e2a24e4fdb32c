use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};

use crate::database::connection::DatabaseManager;
use crate::database::models::{Slot, Training};
use crate::services::reconciliation::{self, GatewayEvent};

/// Header carrying the hex HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
}

/// One confirmed pilot for the race-timing export.
#[derive(Debug, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub callsign: String,
    pub group: String,
    pub channel: String,
}

#[derive(Debug, Deserialize)]
pub struct ParticipantsQuery {
    /// DD.MM.YYYY
    pub date: String,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseManager>,
    pub webhook_secret: Option<String>,
    pub start_time: DateTime<Utc>,
}

/// HTTP surface: gateway webhook, health checks and the participants
/// export consumed by the timing system.
pub struct ApiService {
    pub router: Router,
}

impl ApiService {
    pub fn new(db: Arc<DatabaseManager>, webhook_secret: Option<String>) -> Self {
        let state = AppState {
            db,
            webhook_secret,
            start_time: Utc::now(),
        };

        let router = Router::new()
            .route("/health", get(health_check))
            .route("/health/ready", get(readiness_check))
            .route("/health/live", get(liveness_check))
            .route("/webhook/gateway", post(gateway_webhook))
            .route("/api/participants", get(participants_by_date))
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .with_state(state);

        Self { router }
    }
}

/// Gateway notification endpoint.
///
/// Signature (when a secret is configured) is checked over the raw body
/// before any parsing; a mismatch is the only error this endpoint ever
/// surfaces. Everything else, including unknown and duplicate events,
/// acknowledges `{"ok": true}` quickly: the gateway retries on its own
/// and our idempotent application makes those retries safe.
async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if let Some(secret) = &state.webhook_secret {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;
        if !verify_signature(secret.as_bytes(), &body, provided) {
            warn!("webhook signature verification failed");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    let ack = Json(serde_json::json!({ "ok": true }));

    let event: GatewayEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            warn!("unparseable webhook payload: {e}");
            return Ok(ack);
        }
    };

    match reconciliation::apply_gateway_event(&state.db.pool, &event).await {
        Ok(outcome) => info!(?outcome, gateway_id = %event.object.id, "webhook processed"),
        // Internal failures are ours to sort out; the gateway will retry.
        Err(e) => warn!(gateway_id = %event.object.id, "webhook application failed: {e}"),
    }

    Ok(ack)
}

/// Keyed hash over the raw body, hex-encoded, compared in constant time.
pub fn verify_signature(secret: &[u8], body: &[u8], provided_hex: &str) -> bool {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(expected.as_bytes(), provided_hex.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn participants_by_date(
    State(state): State<AppState>,
    Query(query): Query<ParticipantsQuery>,
) -> Result<Json<Vec<Participant>>, StatusCode> {
    let day = NaiveDate::parse_from_str(query.date.trim(), "%d.%m.%Y")
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let training = Training::find_on_day(&state.db.pool, &day.format("%Y-%m-%d").to_string())
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let slots = Slot::confirmed_participants(&state.db.pool, training.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(
        slots
            .into_iter()
            .map(|s| Participant {
                name: s.nickname.clone(),
                callsign: s.nickname,
                group: s.group_name,
                channel: s.channel,
            })
            .collect(),
    ))
}

async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    if test_database_connection(&state.db).await.is_err() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let uptime = Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds() as u64;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
    }))
}

async fn readiness_check(State(state): State<AppState>) -> Result<Json<&'static str>, StatusCode> {
    match test_database_connection(&state.db).await {
        Ok(_) => Ok(Json("ready")),
        Err(_) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

async fn liveness_check() -> Json<&'static str> {
    Json("alive")
}

async fn test_database_connection(db: &DatabaseManager) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").fetch_one(&db.pool).await?;
    Ok(())
}
