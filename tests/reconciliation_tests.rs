use anyhow::Result;
use chrono::{Duration, Utc};
use tempfile::{tempdir, TempDir};
use whoop_club_bot::database::{connection::DatabaseManager, models::*};
use whoop_club_bot::services::reconciliation::{
    apply_gateway_event, confirm_target, EventOutcome, GatewayEvent, GatewayMetadata, GatewayObject,
};

async fn setup_test_db() -> Result<(DatabaseManager, TempDir)> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("test.db");
    let database_url = format!("sqlite:{}", db_path.display());

    let db_manager = DatabaseManager::new(&database_url).await?;
    db_manager.run_migrations().await?;

    Ok((db_manager, temp_dir))
}

fn succeeded_event(gateway_id: &str, payment_id: Option<String>) -> GatewayEvent {
    GatewayEvent {
        event: "payment.succeeded".to_string(),
        object: GatewayObject {
            id: gateway_id.to_string(),
            metadata: GatewayMetadata { payment_id },
        },
    }
}

#[tokio::test]
async fn test_slot_payment_event_confirms_slot() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    let slot_id = Slot::reserve(&db.pool, training.id, 1, "fast", "R1", "gateway", Utc::now())
        .await?
        .expect("reservation");
    let payment =
        Payment::create(&db.pool, 1, 800, "gateway", "slot", slot_id, None, None, Utc::now())
            .await?;

    let event = succeeded_event("gw-1", Some(payment.id.to_string()));
    let outcome = apply_gateway_event(&db.pool, &event).await?;
    assert_eq!(outcome, EventOutcome::Applied);

    let slot = Slot::find_by_id(&db.pool, slot_id).await?.expect("slot");
    assert_eq!(slot.status, "confirmed");
    let payment = Payment::find_by_id(&db.pool, payment.id).await?.expect("payment");
    assert_eq!(payment.status, "succeeded");
    assert!(payment.paid_at.is_some());

    Ok(())
}

#[tokio::test]
async fn test_replayed_event_is_a_noop() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    let order = Subscription::create(&db.pool, 1, 5, Utc::now()).await?;
    let payment = Payment::create(
        &db.pool, 1, 3800, "gateway", "subscription", order.id, None, None, Utc::now(),
    )
    .await?;

    let event = succeeded_event("gw-2", Some(payment.id.to_string()));
    assert_eq!(apply_gateway_event(&db.pool, &event).await?, EventOutcome::Applied);
    assert_eq!(User::credits(&db.pool, 1).await?, 5);

    // The gateway redelivers: acknowledged, zero side effects.
    assert_eq!(apply_gateway_event(&db.pool, &event).await?, EventOutcome::Duplicate);
    assert_eq!(apply_gateway_event(&db.pool, &event).await?, EventOutcome::Duplicate);
    assert_eq!(User::credits(&db.pool, 1).await?, 5);

    Ok(())
}

#[tokio::test]
async fn test_unknown_payment_reference_is_ignored() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;

    let event = succeeded_event("gw-3", Some("424242".to_string()));
    assert_eq!(apply_gateway_event(&db.pool, &event).await?, EventOutcome::Ignored);

    let event = succeeded_event("gw-4", None);
    assert_eq!(apply_gateway_event(&db.pool, &event).await?, EventOutcome::Ignored);

    let event = succeeded_event("gw-5", Some("not-a-number".to_string()));
    assert_eq!(apply_gateway_event(&db.pool, &event).await?, EventOutcome::Ignored);

    Ok(())
}

#[tokio::test]
async fn test_other_event_types_are_ignored() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    let order = Subscription::create(&db.pool, 1, 5, Utc::now()).await?;
    let payment = Payment::create(
        &db.pool, 1, 3800, "gateway", "subscription", order.id, None, None, Utc::now(),
    )
    .await?;

    let mut event = succeeded_event("gw-6", Some(payment.id.to_string()));
    event.event = "payment.waiting_for_capture".to_string();

    assert_eq!(apply_gateway_event(&db.pool, &event).await?, EventOutcome::Ignored);
    let payment = Payment::find_by_id(&db.pool, payment.id).await?.expect("payment");
    assert_eq!(payment.status, "pending");
    assert_eq!(User::credits(&db.pool, 1).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_replay_finishes_interrupted_application() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    let slot_id = Slot::reserve(&db.pool, training.id, 1, "fast", "R1", "gateway", Utc::now())
        .await?
        .expect("reservation");
    let payment =
        Payment::create(&db.pool, 1, 800, "gateway", "slot", slot_id, None, None, Utc::now())
            .await?;

    // The process died between the two application steps: the payment is
    // succeeded but the slot was never confirmed.
    assert!(Payment::mark_succeeded(&db.pool, payment.id, Utc::now()).await?);

    let event = succeeded_event("gw-8", Some(payment.id.to_string()));
    assert_eq!(apply_gateway_event(&db.pool, &event).await?, EventOutcome::Duplicate);

    let slot = Slot::find_by_id(&db.pool, slot_id).await?.expect("slot");
    assert_eq!(slot.status, "confirmed");

    Ok(())
}

#[tokio::test]
async fn test_sweep_settles_interrupted_subscription_without_replay() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    let order = Subscription::create(&db.pool, 1, 5, Utc::now()).await?;
    let payment = Payment::create(
        &db.pool, 1, 3800, "gateway", "subscription", order.id, None, None, Utc::now(),
    )
    .await?;

    assert!(Payment::mark_succeeded(&db.pool, payment.id, Utc::now()).await?);
    let payment = Payment::find_by_id(&db.pool, payment.id).await?.expect("payment");

    // The sweep re-confirms targets of succeeded-but-unnotified payments.
    assert!(confirm_target(&db.pool, &payment).await?);
    assert_eq!(User::credits(&db.pool, 1).await?, 5);

    // Running it again changes nothing.
    assert!(!confirm_target(&db.pool, &payment).await?);
    assert_eq!(User::credits(&db.pool, 1).await?, 5);

    Ok(())
}

#[tokio::test]
async fn test_late_event_leaves_cancellation_request_intact() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(5)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    let slot_id = Slot::reserve(&db.pool, training.id, 1, "fast", "R1", "gateway", Utc::now())
        .await?
        .expect("reservation");
    let payment =
        Payment::create(&db.pool, 1, 800, "gateway", "slot", slot_id, None, None, Utc::now())
            .await?;

    // Admin confirmed manually, then the user asked to cancel.
    whoop_club_bot::services::moderation::approve_slot(&db.pool, slot_id).await?;
    assert!(Slot::request_cancel(&db.pool, slot_id, true).await?);

    // The gateway event arrives late; it settles the payment but must not
    // flip the slot back to confirmed.
    let event = succeeded_event("gw-9", Some(payment.id.to_string()));
    assert_eq!(apply_gateway_event(&db.pool, &event).await?, EventOutcome::Applied);

    let slot = Slot::find_by_id(&db.pool, slot_id).await?.expect("slot");
    assert_eq!(slot.status, "pending_cancel");
    assert!(slot.refund_due);

    Ok(())
}

#[tokio::test]
async fn test_event_after_admin_approval_still_settles_payment() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    let slot_id = Slot::reserve(&db.pool, training.id, 1, "fast", "R1", "gateway", Utc::now())
        .await?
        .expect("reservation");
    let payment =
        Payment::create(&db.pool, 1, 800, "gateway", "slot", slot_id, None, None, Utc::now())
            .await?;

    // An admin confirmed the slot manually before the webhook arrived.
    whoop_club_bot::services::moderation::approve_slot(&db.pool, slot_id).await?;

    let event = succeeded_event("gw-7", Some(payment.id.to_string()));
    assert_eq!(apply_gateway_event(&db.pool, &event).await?, EventOutcome::Applied);

    // Target confirmation is idempotent; the slot simply stays confirmed.
    let slot = Slot::find_by_id(&db.pool, slot_id).await?.expect("slot");
    assert_eq!(slot.status, "confirmed");

    Ok(())
}
