//! Applies asynchronous "payment succeeded" gateway events to the ledger.
//!
//! The webhook acknowledgment must return quickly, so this module only
//! performs the ledger transitions; user/admin notifications are owed via
//! the payment's `ui_status` flag and delivered later by the sweeper.

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::database::models::{Payment, Slot, Subscription};
use crate::error::LedgerError;

/// Gateway webhook payload: `{event, object: {id, metadata}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    pub event: String,
    pub object: GatewayObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayObject {
    pub id: String,
    #[serde(default)]
    pub metadata: GatewayMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayMetadata {
    /// Cross-reference to the local payments row
    pub payment_id: Option<String>,
}

/// What the handler did with the event. Every variant is acknowledged
/// identically to the gateway; the distinction is for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// First application: payment marked succeeded, target confirmed
    Applied,
    /// Replay of an already-applied event; no side effects
    Duplicate,
    /// Event we do not process (wrong type, missing or unknown reference)
    Ignored,
}

/// Applies a gateway event exactly once.
///
/// The idempotency hinge is the guarded `mark_succeeded`: a replayed
/// event affects zero rows and is acknowledged without side effects. The
/// follow-up target confirmation is itself a no-op when already applied,
/// which also lets the sweeper finish a crash-interrupted application.
pub async fn apply_gateway_event(
    pool: &sqlx::SqlitePool,
    event: &GatewayEvent,
) -> Result<EventOutcome, LedgerError> {
    if event.event != "payment.succeeded" {
        info!(event = %event.event, "ignoring gateway event type");
        return Ok(EventOutcome::Ignored);
    }

    let Some(payment_id) = event
        .object
        .metadata
        .payment_id
        .as_deref()
        .and_then(|raw| raw.parse::<i64>().ok())
    else {
        warn!(gateway_id = %event.object.id, "gateway event without usable payment reference");
        return Ok(EventOutcome::Ignored);
    };

    let Some(payment) = Payment::find_by_id(pool, payment_id).await? else {
        warn!(payment_id, gateway_id = %event.object.id, "gateway event references unknown payment");
        return Ok(EventOutcome::Ignored);
    };

    if !Payment::mark_succeeded(pool, payment.id, Utc::now()).await? {
        // A replay can still owe the second step when an earlier run died
        // between marking the payment and confirming the target.
        if confirm_target(pool, &payment).await? {
            warn!(payment_id = payment.id, "replay finished an interrupted application");
        } else {
            info!(payment_id = payment.id, "duplicate gateway event, already succeeded");
        }
        return Ok(EventOutcome::Duplicate);
    }

    confirm_target(pool, &payment).await?;
    info!(payment_id = payment.id, target_type = %payment.target_type, target_id = payment.target_id,
          "gateway payment applied");
    Ok(EventOutcome::Applied)
}

/// Second, independently idempotent step: confirm whatever the payment
/// was for. Returns whether any state changed, so callers can tell a
/// fresh confirmation from a no-op.
pub async fn confirm_target(pool: &sqlx::SqlitePool, payment: &Payment) -> Result<bool, LedgerError> {
    match payment.target_type.as_str() {
        // Guarded pending -> confirmed; a confirmed or pending_cancel
        // slot is left alone, so a late event cannot wipe a user's
        // cancellation request.
        "slot" => Ok(Slot::confirm(pool, payment.target_id).await?),
        // Activation flips status and grants credits exactly once.
        "subscription" => Ok(Subscription::activate(pool, payment.target_id).await?),
        other => {
            warn!(payment_id = payment.id, target_type = %other, "unknown payment target type");
            Ok(false)
        }
    }
}
