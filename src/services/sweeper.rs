//! Background reconciliation: re-sends lost admin prompts, announces
//! fully-booked and upcoming sessions, and delivers the notification
//! batches owed for gateway-confirmed payments.
//!
//! Every job catches errors per item so one bad record cannot stop the
//! rest of the sweep.

use chrono::Utc;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::database::connection::DatabaseManager;
use crate::database::models::{
    AnnouncementLog, Payment, Slot, Subscription, Training, User,
};
use crate::services::{notifier, reconciliation};
use crate::utils::datetime::format_stored;
use crate::utils::text::user_link;

type JobResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub struct Sweeper {
    bot: Bot,
    db: Arc<DatabaseManager>,
    config: Arc<Config>,
    scheduler: JobScheduler,
}

impl Sweeper {
    pub async fn new(
        bot: Bot,
        db: Arc<DatabaseManager>,
        config: Arc<Config>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let scheduler = JobScheduler::new().await?;
        let mut sweeper = Self { bot, db, config, scheduler };
        sweeper.schedule_jobs().await?;
        Ok(sweeper)
    }

    pub async fn start(&mut self) -> JobResult {
        self.scheduler.start().await?;
        info!("Sweeper started");
        Ok(())
    }

    pub async fn stop(&mut self) -> JobResult {
        self.scheduler.shutdown().await?;
        info!("Sweeper stopped");
        Ok(())
    }

    async fn schedule_jobs(&mut self) -> JobResult {
        // Deferred payment notifications, every 5 seconds.
        {
            let (bot, db, config) = (self.bot.clone(), self.db.clone(), self.config.clone());
            let job = Job::new_async("*/5 * * * * *", move |_uuid, _l| {
                let (bot, db, config) = (bot.clone(), db.clone(), config.clone());
                Box::pin(async move {
                    deliver_payment_notifications(&bot, &db, &config).await;
                })
            })?;
            self.scheduler.add(job).await?;
        }

        // Stuck pending prompts and capacity check, every 5 minutes.
        {
            let (bot, db, config) = (self.bot.clone(), self.db.clone(), self.config.clone());
            let job = Job::new_async("0 */5 * * * *", move |_uuid, _l| {
                let (bot, db, config) = (bot.clone(), db.clone(), config.clone());
                Box::pin(async move {
                    if let Err(e) = resend_pending_prompts(&bot, &db, &config.admins).await {
                        error!("pending prompt sweep failed: {e}");
                    }
                    if let Err(e) = check_full_trainings(&bot, &db, &config).await {
                        error!("capacity sweep failed: {e}");
                    }
                })
            })?;
            self.scheduler.add(job).await?;
        }

        // Daily capacity promo at 10:00 UTC, one shot per date.
        {
            let (bot, db, config) = (self.bot.clone(), self.db.clone(), self.config.clone());
            let job = Job::new_async("0 0 10 * * *", move |_uuid, _l| {
                let (bot, db, config) = (bot.clone(), db.clone(), config.clone());
                Box::pin(async move {
                    if let Err(e) = send_capacity_promo(&bot, &db, &config, false).await {
                        error!("daily promo failed: {e}");
                    }
                })
            })?;
            self.scheduler.add(job).await?;
        }

        Ok(())
    }
}

/// Re-delivers admin prompts for pending slots that never got one (the
/// initial notification was lost). Returns how many were re-sent.
pub async fn resend_pending_prompts(
    bot: &Bot,
    db: &DatabaseManager,
    admins: &[i64],
) -> Result<usize, sqlx::Error> {
    let stuck = Slot::pending_without_prompt(&db.pool).await?;
    let mut sent = 0;
    for slot in &stuck {
        if notifier::send_slot_prompts(bot, db, admins, slot).await > 0 {
            info!(slot_id = slot.id, "re-sent admin prompt for stuck pending slot");
            sent += 1;
        }
    }
    Ok(sent)
}

/// Fires the one-time "fully booked" announcement for trainings whose
/// confirmed count reached total capacity.
pub async fn check_full_trainings(
    bot: &Bot,
    db: &DatabaseManager,
    config: &Config,
) -> Result<(), sqlx::Error> {
    let capacity = config.total_capacity();
    for training in Training::list_open_upcoming(&db.pool, Utc::now()).await? {
        let confirmed = Training::confirmed_count(&db.pool, training.id).await?;
        if confirmed < capacity {
            continue;
        }
        // The durable flag makes this a one-shot even across restarts.
        if !Training::mark_full_announced(&db.pool, training.id).await? {
            continue;
        }
        let text = format!(
            "🔥 Training <b>{}</b> is fully booked! {confirmed}/{capacity} channels taken. 🛸",
            format_stored(&training.date),
        );
        if let Err(e) = bot
            .send_message(ChatId(config.club_chat_id), text)
            .parse_mode(ParseMode::Html)
            .await
        {
            warn!(training_id = training.id, "failed to announce full training: {e}");
        }
    }
    Ok(())
}

/// Announces remaining capacity of the nearest open training in the club
/// chat. The scheduled daily run is guarded by a per-date flag; `force`
/// (the admin command) bypasses the guard.
pub async fn send_capacity_promo(
    bot: &Bot,
    db: &DatabaseManager,
    config: &Config,
    force: bool,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let Some(training) = Training::list_open_upcoming(&db.pool, now).await?.into_iter().next()
    else {
        return Ok(false);
    };

    if !force {
        let key = now.format("%Y-%m-%d").to_string();
        if !AnnouncementLog::claim(&db.pool, "daily_promo", &key, now).await? {
            return Ok(false);
        }
    }

    let mut lines = Vec::new();
    for group in &config.groups {
        let used = Training::confirmed_count_by_group(&db.pool, training.id, &group.name).await?;
        let free = group.channels.len() as i64 - used;
        let status = if free > 0 {
            format!("{free} spots")
        } else {
            "no spots left".to_string()
        };
        lines.push(format!("{}: <b>{status}</b>", group.name));
    }

    let text = format!(
        "🔥 <b>Spots left for the next training!</b>\n📅 <b>{}</b>\n\n{}\n\n🚀 Book yours while they last!",
        format_stored(&training.date),
        lines.join("\n"),
    );
    if let Err(e) = bot
        .send_message(ChatId(config.club_chat_id), text)
        .parse_mode(ParseMode::Html)
        .await
    {
        warn!(training_id = training.id, "failed to send capacity promo: {e}");
    }
    Ok(true)
}

/// Delivers the notification batch for payments the gateway already
/// confirmed: re-confirms the payment's target if a crash left it
/// behind, edits the originating payment message, posts to the club
/// chat and informs the admins, then flips `ui_status`.
///
/// The flag flip is not atomic with the sends; a crash in between can
/// duplicate one batch, which is accepted.
pub async fn deliver_payment_notifications(bot: &Bot, db: &DatabaseManager, config: &Config) {
    let owed = match Payment::succeeded_unnotified(&db.pool).await {
        Ok(p) => p,
        Err(e) => {
            error!("failed to list unnotified payments: {e}");
            return;
        }
    };

    for payment in owed {
        // Finish a crash-interrupted application first: the payment can be
        // succeeded with its target not yet confirmed, and nothing gets
        // announced until the target matches the payment.
        match reconciliation::confirm_target(&db.pool, &payment).await {
            Ok(true) => {
                warn!(payment_id = payment.id, "confirmed target left behind by an interrupted application");
            }
            Ok(false) => {}
            Err(e) => {
                error!(payment_id = payment.id, "target confirmation failed: {e}");
                continue;
            }
        }

        let result = match payment.target_type.as_str() {
            "slot" => notify_slot_paid(bot, db, config, &payment).await,
            "subscription" => notify_subscription_paid(bot, db, config, &payment).await,
            other => {
                warn!(payment_id = payment.id, target_type = %other, "unknown payment target in sweep");
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                if let Err(e) = Payment::mark_ui_paid(&db.pool, payment.id).await {
                    error!(payment_id = payment.id, "failed to flip ui_status: {e}");
                }
            }
            Err(e) => error!(payment_id = payment.id, "payment notification failed: {e}"),
        }
    }
}

async fn notify_slot_paid(
    bot: &Bot,
    db: &DatabaseManager,
    config: &Config,
    payment: &Payment,
) -> Result<(), sqlx::Error> {
    let Some(slot) = Slot::details(&db.pool, payment.target_id).await? else {
        warn!(payment_id = payment.id, "paid slot vanished before notification");
        return Ok(());
    };
    let date_fmt = format_stored(&slot.date);

    // Replace the payment prompt under the user's original message.
    if let (Some(chat_id), Some(message_id)) = (payment.chat_id, payment.message_id) {
        let text = format!(
            "📅 <b>Training {date_fmt}</b>\n✅ <b>Payment received!</b>\n🏁 {}, channel <b>{}</b>",
            slot.group_name, slot.channel,
        );
        if let Err(e) = bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id as i32), text)
            .parse_mode(ParseMode::Html)
            .await
        {
            warn!(payment_id = payment.id, "failed to edit payment message: {e}");
        }
    }

    let confirmed = Training::confirmed_count(&db.pool, slot.training_id).await?;
    let capacity = config.total_capacity();
    let club_text = format!(
        "🛸 {} booked training <b>{date_fmt}</b>\nSpots left: {}/{capacity}",
        user_link(slot.user_id, &slot.nickname),
        capacity - confirmed,
    );
    if let Err(e) = bot
        .send_message(ChatId(config.club_chat_id), club_text)
        .parse_mode(ParseMode::Html)
        .await
    {
        warn!(payment_id = payment.id, "failed to post club booking notice: {e}");
    }

    let admin_text = format!(
        "✅ {} paid online and booked:\n📅 {date_fmt}\n🏁 <b>{}</b>\n📡 Channel: <b>{}</b>\n🎮 OSD: <b>{}</b>",
        user_link(slot.user_id, &slot.nickname),
        slot.group_name,
        slot.channel,
        slot.nickname,
    );
    notifier::notify_admins(bot, &config.admins, &admin_text).await;
    Ok(())
}

async fn notify_subscription_paid(
    bot: &Bot,
    db: &DatabaseManager,
    config: &Config,
    payment: &Payment,
) -> Result<(), sqlx::Error> {
    let Some(order) = Subscription::find_by_id(&db.pool, payment.target_id).await? else {
        warn!(payment_id = payment.id, "paid subscription vanished before notification");
        return Ok(());
    };
    let total = User::credits(&db.pool, order.user_id).await?;

    if let (Some(chat_id), Some(message_id)) = (payment.chat_id, payment.message_id) {
        let text = format!(
            "🎟 <b>Subscription paid</b>\n📦 Added: <b>{}</b>\n📊 Total available: <b>{total}</b>",
            order.count,
        );
        if let Err(e) = bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id as i32), text)
            .parse_mode(ParseMode::Html)
            .await
        {
            warn!(payment_id = payment.id, "failed to edit subscription message: {e}");
        }
    }

    let nickname = User::find(&db.pool, order.user_id)
        .await?
        .map(|u| u.nickname)
        .unwrap_or_else(|| "-".to_string());
    let admin_text = format!(
        "🎟 <b>Subscription paid</b>\n👤 {} (ID: <code>{}</code>)\n📦 Bought: <b>{}</b>\n📊 Total: <b>{total}</b>\n🧾 Payment ID: <code>{}</code>",
        user_link(order.user_id, &nickname),
        order.user_id,
        order.count,
        payment.id,
    );
    notifier::notify_admins(bot, &config.admins, &admin_text).await;
    Ok(())
}
