//! Admin moderation: approve/reject of pending slots and subscription
//! orders. Each action is a guarded ledger transition; the first admin to
//! act wins, later actions surface as `AlreadyHandled`.

use tracing::{info, warn};

use crate::database::models::{Slot, SlotDetails, Subscription, Training, User};
use crate::error::LedgerError;
use crate::services::reservation::method;

/// Approves a pending slot.
///
/// For subscription-paid slots the user's credit is decremented here, in
/// the same transaction as the status flip, with a `credits > 0` guard:
/// an empty balance at this point is an inconsistency and rolls the
/// approval back rather than being ignored.
pub async fn approve_slot(
    pool: &sqlx::SqlitePool,
    slot_id: i64,
) -> Result<SlotDetails, LedgerError> {
    let slot = Slot::find_by_id(pool, slot_id)
        .await?
        .ok_or(LedgerError::AlreadyHandled)?;

    // A cancelled or closed training takes no new confirmations.
    let training = Training::find_by_id(pool, slot.training_id)
        .await?
        .ok_or(LedgerError::SessionNotFound)?;
    if training.status != "open" {
        return Err(LedgerError::SessionClosed);
    }

    let mut tx = pool.begin().await?;
    let confirmed = Slot::confirm(&mut *tx, slot_id).await?;
    if !confirmed {
        tx.rollback().await?;
        return Err(LedgerError::AlreadyHandled);
    }

    if slot.payment_method == method::SUBSCRIPTION {
        let spent = User::spend_credit(&mut *tx, slot.user_id).await?;
        if !spent {
            tx.rollback().await?;
            warn!(slot_id, user_id = slot.user_id, "subscription slot approved with empty balance");
            return Err(LedgerError::CreditInconsistency { user_id: slot.user_id });
        }
    }
    tx.commit().await?;

    info!(slot_id, user_id = slot.user_id, "slot approved");

    Slot::details(pool, slot_id)
        .await?
        .ok_or(LedgerError::SlotNotFound)
}

/// Rejects a pending slot: the slot is deleted outright. No credit is
/// touched, none was consumed for a still-pending slot.
pub async fn reject_slot(pool: &sqlx::SqlitePool, slot_id: i64) -> Result<i64, LedgerError> {
    let slot = Slot::find_by_id(pool, slot_id)
        .await?
        .ok_or(LedgerError::AlreadyHandled)?;

    if !Slot::delete_in_status(pool, slot_id, "pending").await? {
        return Err(LedgerError::AlreadyHandled);
    }

    info!(slot_id, user_id = slot.user_id, "slot rejected");
    Ok(slot.user_id)
}

/// Approves a subscription purchase: order confirmed and credits granted
/// exactly once.
pub async fn approve_subscription(
    pool: &sqlx::SqlitePool,
    subscription_id: i64,
) -> Result<Subscription, LedgerError> {
    if !Subscription::activate(pool, subscription_id).await? {
        return Err(LedgerError::AlreadyHandled);
    }
    info!(subscription_id, "subscription approved");
    Subscription::find_by_id(pool, subscription_id)
        .await?
        .ok_or(LedgerError::SubscriptionNotFound)
}

/// Rejects a pending subscription purchase.
pub async fn reject_subscription(
    pool: &sqlx::SqlitePool,
    subscription_id: i64,
) -> Result<i64, LedgerError> {
    let order = Subscription::find_by_id(pool, subscription_id)
        .await?
        .ok_or(LedgerError::AlreadyHandled)?;

    if !Subscription::delete_pending(pool, subscription_id).await? {
        return Err(LedgerError::AlreadyHandled);
    }

    info!(subscription_id, user_id = order.user_id, "subscription rejected");
    Ok(order.user_id)
}
