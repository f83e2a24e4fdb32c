use anyhow::Result;
use chrono::{Duration, Utc};
use tempfile::{tempdir, TempDir};
use whoop_club_bot::database::{connection::DatabaseManager, models::*};

async fn setup_test_db() -> Result<(DatabaseManager, TempDir)> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("test.db");
    let database_url = format!("sqlite:{}", db_path.display());

    let db_manager = DatabaseManager::new(&database_url).await?;
    db_manager.run_migrations().await?;

    Ok((db_manager, temp_dir))
}

#[tokio::test]
async fn test_user_upsert_preserves_credits() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;

    let user = User::upsert(&db.pool, 100, "Maverick", "Analog").await?;
    assert_eq!(user.credits, 0);

    User::add_credits(&db.pool, 100, 5).await?;

    // Re-registering updates the profile but never touches the balance.
    let user = User::upsert(&db.pool, 100, "Goose", "DJI").await?;
    assert_eq!(user.nickname, "Goose");
    assert_eq!(user.video_system, "DJI");
    assert_eq!(user.credits, 5);

    Ok(())
}

#[tokio::test]
async fn test_spend_credit_guard() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;
    User::upsert(&db.pool, 100, "Maverick", "Analog").await?;
    User::add_credits(&db.pool, 100, 1).await?;

    assert!(User::spend_credit(&db.pool, 100).await?);
    // Balance is now zero; the guard refuses instead of going negative.
    assert!(!User::spend_credit(&db.pool, 100).await?);
    assert_eq!(User::credits(&db.pool, 100).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_credits_of_unknown_user_is_zero() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;
    assert_eq!(User::credits(&db.pool, 999).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_training_lifecycle() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;
    let date = Utc::now() + Duration::days(3);

    let training = Training::create(&db.pool, date).await?;
    assert_eq!(training.status, "open");
    assert!(!training.full_announced);

    let upcoming = Training::list_open_upcoming(&db.pool, Utc::now()).await?;
    assert_eq!(upcoming.len(), 1);

    // Guarded cancel: first wins, second is a no-op.
    assert!(Training::cancel(&db.pool, training.id).await?);
    assert!(!Training::cancel(&db.pool, training.id).await?);

    assert!(Training::list_open_upcoming(&db.pool, Utc::now()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_find_on_day_skips_cancelled() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;
    let date = Utc::now() + Duration::days(3);
    let prefix = date.format("%Y-%m-%d").to_string();

    let training = Training::create(&db.pool, date).await?;
    assert!(Training::find_on_day(&db.pool, &prefix).await?.is_some());

    Training::cancel(&db.pool, training.id).await?;
    assert!(Training::find_on_day(&db.pool, &prefix).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_mark_full_announced_is_one_shot() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;

    assert!(Training::mark_full_announced(&db.pool, training.id).await?);
    assert!(!Training::mark_full_announced(&db.pool, training.id).await?);

    Ok(())
}

#[tokio::test]
async fn test_slot_reserve_conditional_insert() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    User::upsert(&db.pool, 2, "B", "DJI").await?;

    let first = Slot::reserve(&db.pool, training.id, 1, "fast", "R1", "manual", Utc::now()).await?;
    assert!(first.is_some());

    // Same channel: refused.
    let clash = Slot::reserve(&db.pool, training.id, 2, "fast", "R1", "manual", Utc::now()).await?;
    assert!(clash.is_none());

    // Same user, different channel: refused.
    let dup = Slot::reserve(&db.pool, training.id, 1, "fast", "R2", "manual", Utc::now()).await?;
    assert!(dup.is_none());

    // Different user, free channel: fine.
    let ok = Slot::reserve(&db.pool, training.id, 2, "fast", "R2", "manual", Utc::now()).await?;
    assert!(ok.is_some());

    Ok(())
}

#[tokio::test]
async fn test_rejected_slot_frees_the_channel() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;
    User::upsert(&db.pool, 2, "B", "DJI").await?;

    let slot_id = Slot::reserve(&db.pool, training.id, 1, "fast", "R1", "manual", Utc::now())
        .await?
        .expect("first reservation");
    assert!(Slot::delete_in_status(&db.pool, slot_id, "pending").await?);

    let retaken =
        Slot::reserve(&db.pool, training.id, 2, "fast", "R1", "manual", Utc::now()).await?;
    assert!(retaken.is_some());

    Ok(())
}

#[tokio::test]
async fn test_payment_mark_succeeded_guard() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;

    let payment =
        Payment::create(&db.pool, 1, 800, "gateway", "slot", 1, None, None, Utc::now()).await?;
    assert_eq!(payment.status, "pending");
    assert_eq!(payment.ui_status, "shown");

    assert!(Payment::mark_succeeded(&db.pool, payment.id, Utc::now()).await?);
    assert!(!Payment::mark_succeeded(&db.pool, payment.id, Utc::now()).await?);

    let owed = Payment::succeeded_unnotified(&db.pool).await?;
    assert_eq!(owed.len(), 1);

    Payment::mark_ui_paid(&db.pool, payment.id).await?;
    assert!(Payment::succeeded_unnotified(&db.pool).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_announcement_claim_is_per_key() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;
    let now = Utc::now();

    assert!(AnnouncementLog::claim(&db.pool, "daily_promo", "2025-03-18", now).await?);
    assert!(!AnnouncementLog::claim(&db.pool, "daily_promo", "2025-03-18", now).await?);
    // A different date is a fresh claim.
    assert!(AnnouncementLog::claim(&db.pool, "daily_promo", "2025-03-19", now).await?);

    Ok(())
}

#[tokio::test]
async fn test_admin_prompt_bookkeeping() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;

    AdminPrompt::record(&db.pool, "slot", 7, 100, 555).await?;
    AdminPrompt::record(&db.pool, "slot", 7, 200, 556).await?;

    let prompts = AdminPrompt::for_entity(&db.pool, "slot", 7).await?;
    assert_eq!(prompts.len(), 2);

    AdminPrompt::delete_for_entity(&db.pool, "slot", 7).await?;
    assert!(AdminPrompt::for_entity(&db.pool, "slot", 7).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_pending_without_prompt() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;
    let training = Training::create(&db.pool, Utc::now() + Duration::days(1)).await?;
    User::upsert(&db.pool, 1, "A", "Analog").await?;

    let slot_id = Slot::reserve(&db.pool, training.id, 1, "fast", "R1", "manual", Utc::now())
        .await?
        .expect("reservation");

    let stuck = Slot::pending_without_prompt(&db.pool).await?;
    assert_eq!(stuck.len(), 1);
    assert_eq!(stuck[0].id, slot_id);

    AdminPrompt::record(&db.pool, "slot", slot_id, 100, 555).await?;
    assert!(Slot::pending_without_prompt(&db.pool).await?.is_empty());

    Ok(())
}
