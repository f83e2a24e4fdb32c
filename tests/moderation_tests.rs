use anyhow::Result;
use chrono::{Duration, Utc};
use tempfile::{tempdir, TempDir};
use whoop_club_bot::database::{connection::DatabaseManager, models::*};
use whoop_club_bot::error::LedgerError;
use whoop_club_bot::services::moderation;

async fn setup_test_db() -> Result<(DatabaseManager, TempDir)> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("test.db");
    let database_url = format!("sqlite:{}", db_path.display());

    let db_manager = DatabaseManager::new(&database_url).await?;
    db_manager.run_migrations().await?;

    Ok((db_manager, temp_dir))
}

async fn pending_slot(
    db: &DatabaseManager,
    training_id: i64,
    user_id: i64,
    channel: &str,
    payment_method: &str,
) -> Result<i64> {
    Ok(
        Slot::reserve(&db.pool, training_id, user_id, "fast", channel, payment_method, Utc::now())
            .await?
            .expect("reservation should succeed"),
    )
}

#[tokio::test]
async fn test_approve_manual_slot() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;

    let slot_id = pending_slot(&db, training.id, 1, "R1", "manual").await?;
    let details = moderation::approve_slot(&db.pool, slot_id).await?;
    assert_eq!(details.status, "confirmed");

    Ok(())
}

#[tokio::test]
async fn test_approve_subscription_slot_spends_one_credit() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    User::add_credits(&db.pool, 1, 2).await?;

    let slot_id = pending_slot(&db, training.id, 1, "R1", "subscription").await?;
    let details = moderation::approve_slot(&db.pool, slot_id).await?;
    assert_eq!(details.credits, 1);
    assert_eq!(User::credits(&db.pool, 1).await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_double_approve_is_already_handled() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    User::add_credits(&db.pool, 1, 5).await?;

    let slot_id = pending_slot(&db, training.id, 1, "R1", "subscription").await?;
    moderation::approve_slot(&db.pool, slot_id).await?;

    // The second admin loses the race; crucially no second credit is spent.
    let err = moderation::approve_slot(&db.pool, slot_id).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyHandled));
    assert_eq!(User::credits(&db.pool, 1).await?, 4);

    Ok(())
}

#[tokio::test]
async fn test_approve_with_empty_balance_rolls_back() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;

    // A subscription slot whose owner has no credits left.
    let slot_id = pending_slot(&db, training.id, 1, "R1", "subscription").await?;

    let err = moderation::approve_slot(&db.pool, slot_id).await.unwrap_err();
    assert!(matches!(err, LedgerError::CreditInconsistency { user_id: 1 }));

    // The whole approval rolled back: the slot is still pending.
    let slot = Slot::find_by_id(&db.pool, slot_id).await?.expect("slot");
    assert_eq!(slot.status, "pending");
    assert_eq!(User::credits(&db.pool, 1).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_approve_refused_for_cancelled_training() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    User::add_credits(&db.pool, 1, 1).await?;

    let slot_id = pending_slot(&db, training.id, 1, "R1", "subscription").await?;
    // The training row is flipped directly, leaving the slot in place.
    assert!(Training::cancel(&db.pool, training.id).await?);

    let err = moderation::approve_slot(&db.pool, slot_id).await.unwrap_err();
    assert!(matches!(err, LedgerError::SessionClosed));

    // Nothing was confirmed and no credit was spent.
    let slot = Slot::find_by_id(&db.pool, slot_id).await?.expect("slot");
    assert_eq!(slot.status, "pending");
    assert_eq!(User::credits(&db.pool, 1).await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_reject_slot_deletes_it() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;

    let slot_id = pending_slot(&db, training.id, 1, "R1", "manual").await?;
    let user_id = moderation::reject_slot(&db.pool, slot_id).await?;
    assert_eq!(user_id, 1);
    assert!(Slot::find_by_id(&db.pool, slot_id).await?.is_none());

    // Rejecting twice: the second admin is told it is already handled.
    let err = moderation::reject_slot(&db.pool, slot_id).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyHandled));

    Ok(())
}

#[tokio::test]
async fn test_reject_confirmed_slot_refused() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;

    let slot_id = pending_slot(&db, training.id, 1, "R1", "manual").await?;
    moderation::approve_slot(&db.pool, slot_id).await?;

    let err = moderation::reject_slot(&db.pool, slot_id).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyHandled));

    Ok(())
}

#[tokio::test]
async fn test_subscription_approval_grants_credits_once() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;

    let order = Subscription::create(&db.pool, 1, 5, Utc::now()).await?;
    let approved = moderation::approve_subscription(&db.pool, order.id).await?;
    assert_eq!(approved.status, "confirmed");
    assert_eq!(User::credits(&db.pool, 1).await?, 5);

    let err = moderation::approve_subscription(&db.pool, order.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyHandled));
    assert_eq!(User::credits(&db.pool, 1).await?, 5);

    Ok(())
}

#[tokio::test]
async fn test_subscription_rejection() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;

    let order = Subscription::create(&db.pool, 1, 5, Utc::now()).await?;
    let user_id = moderation::reject_subscription(&db.pool, order.id).await?;
    assert_eq!(user_id, 1);
    assert!(Subscription::find_by_id(&db.pool, order.id).await?.is_none());
    assert_eq!(User::credits(&db.pool, 1).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_cannot_reject_confirmed_subscription() -> Result<()> {
    let (db, _tmp) = setup_test_db().await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;

    let order = Subscription::create(&db.pool, 1, 5, Utc::now()).await?;
    moderation::approve_subscription(&db.pool, order.id).await?;

    let err = moderation::reject_subscription(&db.pool, order.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyHandled));
    // The confirmed order and its credits are untouched.
    assert!(Subscription::find_by_id(&db.pool, order.id).await?.is_some());
    assert_eq!(User::credits(&db.pool, 1).await?, 5);

    Ok(())
}
