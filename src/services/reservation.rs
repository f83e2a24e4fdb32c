//! Reservation engine: allocates channels to users and drives the
//! cancellation state machine.
//!
//! Every mutation that depends on a prior read is pushed down into a
//! single conditional statement at the store layer, because the event
//! loop can interleave two requests at any await point.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::config::Config;
use crate::database::models::{Slot, Training, User};
use crate::error::LedgerError;
use crate::utils::datetime::parse_stored;

/// Payment methods a reservation can carry.
pub mod method {
    pub const SUBSCRIPTION: &str = "subscription";
    pub const MANUAL: &str = "manual";
    pub const GATEWAY: &str = "gateway";
    pub const ADMIN: &str = "admin";
}

/// Reserves `channel` in `group` of an open, future training for `user_id`.
///
/// Method selection: a positive credit balance selects `subscription`
/// (the credit itself is only decremented when an admin confirms);
/// otherwise the slot starts as `manual` and the user may switch to a
/// gateway payment.
pub async fn reserve(
    pool: &sqlx::SqlitePool,
    config: &Config,
    training_id: i64,
    user_id: i64,
    group: &str,
    channel: &str,
    now: DateTime<Utc>,
) -> Result<Slot, LedgerError> {
    let training = Training::find_by_id(pool, training_id)
        .await?
        .ok_or(LedgerError::SessionNotFound)?;

    if training.status != "open" || parse_stored(&training.date)? <= now {
        return Err(LedgerError::SessionClosed);
    }

    let layout = config
        .group(group)
        .ok_or_else(|| LedgerError::UnknownChannel(format!("{group}/{channel}")))?;
    if !layout.channels.iter().any(|c| c == channel) {
        return Err(LedgerError::UnknownChannel(format!("{group}/{channel}")));
    }

    let payment_method = if User::credits(pool, user_id).await? > 0 {
        method::SUBSCRIPTION
    } else {
        method::MANUAL
    };

    let Some(slot_id) =
        Slot::reserve(pool, training_id, user_id, group, channel, payment_method, now).await?
    else {
        // The conditional insert refused; find out which guard fired.
        if Slot::user_has_slot(pool, training_id, user_id).await? {
            return Err(LedgerError::AlreadyBooked);
        }
        return Err(LedgerError::ChannelTaken);
    };

    info!(slot_id, training_id, user_id, group, channel, payment_method, "slot reserved");

    Slot::find_by_id(pool, slot_id)
        .await?
        .ok_or(LedgerError::SlotNotFound)
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelRequest {
    pub slot_id: i64,
    /// Whether one credit will be restored if an admin approves. Evaluated
    /// at request time, not approval time.
    pub refund_due: bool,
}

/// Transitions a confirmed slot to pending_cancel. Does not free the
/// channel; admin approval does.
pub async fn request_cancel(
    pool: &sqlx::SqlitePool,
    config: &Config,
    slot_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<CancelRequest, LedgerError> {
    let slot = Slot::find_by_id(pool, slot_id)
        .await?
        .ok_or(LedgerError::SlotNotFound)?;
    if slot.user_id != user_id {
        return Err(LedgerError::NotSlotOwner);
    }

    let training = Training::find_by_id(pool, slot.training_id)
        .await?
        .ok_or(LedgerError::SessionNotFound)?;

    // At exactly the window boundary the refund is still granted.
    let refund_due = slot.payment_method == method::SUBSCRIPTION
        && parse_stored(&training.date)? - now >= Duration::hours(config.refund_window_hours);

    if !Slot::request_cancel(pool, slot_id, refund_due).await? {
        return Err(LedgerError::AlreadyHandled);
    }

    info!(slot_id, user_id, refund_due, "cancellation requested");
    Ok(CancelRequest { slot_id, refund_due })
}

/// Result of an approved cancellation, for the outbound notifications.
#[derive(Debug, Clone)]
pub struct CancelledSlot {
    pub user_id: i64,
    pub refunded: bool,
}

/// Deletes a pending_cancel slot; restores one credit when the request
/// was made inside the refund window and the slot was subscription-paid.
pub async fn approve_cancel(
    pool: &sqlx::SqlitePool,
    slot_id: i64,
) -> Result<CancelledSlot, LedgerError> {
    let mut tx = pool.begin().await?;
    // The delete returns the removed row: the refund flag is taken from
    // the request being approved, not from a read that a decline and
    // re-request could have gone stale under.
    let Some(slot) = Slot::take_pending_cancel(&mut *tx, slot_id).await? else {
        tx.rollback().await?;
        return Err(LedgerError::AlreadyHandled);
    };

    let refunded = slot.refund_due && slot.payment_method == method::SUBSCRIPTION;
    if refunded {
        User::refund_credit(&mut *tx, slot.user_id).await?;
    }
    tx.commit().await?;

    info!(slot_id, user_id = slot.user_id, refunded, "cancellation approved");
    Ok(CancelledSlot { user_id: slot.user_id, refunded })
}

/// Returns a pending_cancel slot to confirmed (cancellation declined).
pub async fn decline_cancel(pool: &sqlx::SqlitePool, slot_id: i64) -> Result<i64, LedgerError> {
    let slot = Slot::find_by_id(pool, slot_id)
        .await?
        .ok_or(LedgerError::AlreadyHandled)?;
    if !Slot::restore_confirmed(pool, slot_id).await? {
        return Err(LedgerError::AlreadyHandled);
    }
    Ok(slot.user_id)
}

/// Cancels a whole training: guarded status flip, then one credit back to
/// every confirmed slot holder, all in one transaction. Returns the
/// participants for the (best-effort, post-commit) notifications.
pub async fn cancel_training(
    pool: &sqlx::SqlitePool,
    training_id: i64,
) -> Result<Vec<Slot>, LedgerError> {
    let participants = Slot::for_training(pool, training_id).await?;

    let mut tx = pool.begin().await?;
    let cancelled = Training::cancel(&mut *tx, training_id).await?;
    if !cancelled {
        tx.rollback().await?;
        return Err(LedgerError::AlreadyHandled);
    }
    for slot in participants.iter().filter(|s| s.status == "confirmed") {
        User::refund_credit(&mut *tx, slot.user_id).await?;
    }
    // Unconfirmed requests die with the training; nothing was spent on
    // them and no admin should be able to approve one later.
    Slot::delete_pending_for_training(&mut *tx, training_id).await?;
    tx.commit().await?;

    info!(training_id, participants = participants.len(), "training cancelled");
    Ok(participants)
}
