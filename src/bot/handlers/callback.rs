//! Callback-query dispatcher: the booking flow (training -> group ->
//! channel), payment buttons, and every admin moderation action.
//!
//! Moderation callbacks race between admins by design; the ledger's
//! guarded updates decide the winner and losers get an "already handled"
//! toast.

use std::sync::Arc;

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use tracing::error;

use super::HandlerResult;
use crate::config::Config;
use crate::database::connection::DatabaseManager;
use crate::database::models::{Slot, Subscription, Training, User};
use crate::error::LedgerError;
use crate::services::gateway::GatewayClient;
use crate::services::notifier::{self, entity};
use crate::services::{moderation, reservation};
use crate::utils::datetime::format_stored;

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    db: Arc<DatabaseManager>,
    config: Arc<Config>,
    gateway: Option<Arc<GatewayClient>>,
) -> HandlerResult {
    let Some(data) = q.data.clone() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    let user_id = q.from.id.0 as i64;
    tracing::info!(user_id, data, "callback received");

    let parts: Vec<&str> = data.split(':').collect();
    let result = match parts.as_slice() {
        ["train", id] => pick_training(&bot, &q, &db, &config, id.parse()?).await,
        ["grp", id, group] => pick_group(&bot, &q, &db, &config, id.parse()?, group).await,
        ["rsv", id, group, channel] => {
            reserve(&bot, &q, &db, &config, gateway.is_some(), id.parse()?, group, channel).await
        }
        ["paid", slot_id] => manual_paid(&bot, &q, &db, &config, slot_id.parse()?).await,
        ["gwpay", slot_id] => {
            gateway_slot_payment(&bot, &q, &db, &config, gateway.as_deref(), slot_id.parse()?).await
        }
        ["sub", count] => pick_pack(&bot, &q, &db, &config, gateway.is_some(), count.parse()?).await,
        ["subpaid", sub_id] => subscription_paid(&bot, &q, &db, &config, sub_id.parse()?).await,
        ["gwsub", sub_id] => {
            gateway_sub_payment(&bot, &q, &db, &config, gateway.as_deref(), sub_id.parse()?).await
        }
        ["cxl", slot_id] => request_cancel(&bot, &q, &db, &config, slot_id.parse()?).await,
        // Admin actions below.
        ["ok", slot_id] => admin_approve_slot(&bot, &q, &db, &config, slot_id.parse()?).await,
        ["no", slot_id] => admin_reject_slot(&bot, &q, &db, &config, slot_id.parse()?).await,
        ["cxlok", slot_id] => admin_approve_cancel(&bot, &q, &db, &config, slot_id.parse()?).await,
        ["cxlno", slot_id] => admin_decline_cancel(&bot, &q, &db, &config, slot_id.parse()?).await,
        ["subok", sub_id] => admin_approve_sub(&bot, &q, &db, &config, sub_id.parse()?).await,
        ["subno", sub_id] => admin_reject_sub(&bot, &q, &db, &config, sub_id.parse()?).await,
        ["traincancel", id] => admin_cancel_training(&bot, &q, &db, &config, id.parse()?).await,
        ["addcr", target, count] => {
            admin_add_credits(&bot, &q, &db, &config, target.parse()?, count.parse()?).await
        }
        ["addcr_cancel"] => {
            if let Some(msg) = &q.message {
                bot.edit_message_text(msg.chat.id, msg.id, "❌ Credit grant cancelled.").await?;
            }
            bot.answer_callback_query(q.id.clone()).await?;
            Ok(())
        }
        _ => {
            bot.answer_callback_query(q.id.clone()).text("Unknown action").await?;
            Ok(())
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(CallbackError::Denied) => {
            bot.answer_callback_query(q.id)
                .text("❌ Administrators only")
                .await?;
            Ok(())
        }
        Err(CallbackError::Ledger(e)) => {
            bot.answer_callback_query(q.id)
                .text(user_message(&e))
                .show_alert(true)
                .await?;
            Ok(())
        }
        Err(CallbackError::Other(e)) => Err(e),
    }
}

/// Domain errors become user-facing toasts; everything else bubbles to
/// the dispatcher's error handler.
enum CallbackError {
    Denied,
    Ledger(LedgerError),
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl From<LedgerError> for CallbackError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Db(_) | LedgerError::BadTimestamp(_) => {
                error!("callback ledger failure: {e}");
                Self::Ledger(e)
            }
            _ => Self::Ledger(e),
        }
    }
}

impl From<sqlx::Error> for CallbackError {
    fn from(e: sqlx::Error) -> Self {
        error!("callback database failure: {e}");
        Self::Ledger(LedgerError::Db(e))
    }
}

impl From<teloxide::RequestError> for CallbackError {
    fn from(e: teloxide::RequestError) -> Self {
        Self::Other(Box::new(e))
    }
}

type CallbackResult = Result<(), CallbackError>;

fn user_message(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::SessionNotFound => "Training not found",
        LedgerError::SessionClosed => "Registration for this training is closed",
        LedgerError::AlreadyBooked => "You already have a slot in this training",
        LedgerError::ChannelTaken => "That channel was just taken, pick another",
        LedgerError::UnknownChannel(_) => "Unknown group or channel",
        LedgerError::AlreadyHandled => "Already handled by another admin",
        LedgerError::SlotNotFound => "Booking not found",
        LedgerError::SubscriptionNotFound => "Subscription order not found",
        LedgerError::PaymentNotFound => "Payment not found",
        LedgerError::NotSlotOwner => "This booking is not yours",
        LedgerError::CreditInconsistency { .. } => {
            "Credit balance inconsistency, approval rolled back"
        }
        LedgerError::Gateway(_) => "Payment gateway error, try again later",
        LedgerError::BadTimestamp(_) | LedgerError::Db(_) => "Internal error, try again later",
    }
}

fn require_admin(q: &CallbackQuery, config: &Config) -> Result<i64, CallbackError> {
    let user_id = q.from.id.0 as i64;
    if config.is_admin(user_id) {
        Ok(user_id)
    } else {
        Err(CallbackError::Denied)
    }
}

async fn pick_training(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    training_id: i64,
) -> CallbackResult {
    let training = Training::find_by_id(&db.pool, training_id)
        .await?
        .ok_or(LedgerError::SessionNotFound)?;

    let mut rows = Vec::new();
    for group in &config.groups {
        let taken = Slot::taken_channels(&db.pool, training_id, &group.name).await?;
        let free = group.channels.len() - taken.len();
        rows.push(vec![InlineKeyboardButton::callback(
            format!("🏁 {} ({free} free)", group.name),
            format!("grp:{training_id}:{}", group.name),
        )]);
    }

    if let Some(msg) = &q.message {
        bot.edit_message_text(
            msg.chat.id,
            msg.id,
            format!("📅 Training {}\nPick a group:", format_stored(&training.date)),
        )
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    }
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn pick_group(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    training_id: i64,
    group: &str,
) -> CallbackResult {
    let layout = config
        .group(group)
        .ok_or_else(|| LedgerError::UnknownChannel(group.to_string()))?;
    let taken = Slot::taken_channels(&db.pool, training_id, group).await?;

    let mut rows: Vec<Vec<InlineKeyboardButton>> = layout
        .channels
        .iter()
        .filter(|c| !taken.contains(c))
        .map(|c| {
            vec![InlineKeyboardButton::callback(
                format!("📡 {c}"),
                format!("rsv:{training_id}:{group}:{c}"),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "⬅️ Back".to_string(),
        format!("train:{training_id}"),
    )]);

    if let Some(msg) = &q.message {
        bot.edit_message_text(msg.chat.id, msg.id, format!("🏁 Group {group}\nPick a channel:"))
            .reply_markup(InlineKeyboardMarkup::new(rows))
            .await?;
    }
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn reserve(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    gateway_available: bool,
    training_id: i64,
    group: &str,
    channel: &str,
) -> CallbackResult {
    let user_id = q.from.id.0 as i64;
    if User::find(&db.pool, user_id).await?.is_none() {
        bot.answer_callback_query(q.id.clone())
            .text("Register first: send /start to the bot")
            .show_alert(true)
            .await?;
        return Ok(());
    }

    let slot =
        reservation::reserve(&db.pool, config, training_id, user_id, group, channel, Utc::now())
            .await?;

    let Some(msg) = &q.message else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    if slot.payment_method == reservation::method::SUBSCRIPTION {
        if let Ok(Some(details)) = Slot::details(&db.pool, slot.id).await {
            notifier::send_slot_prompts(bot, db, &config.admins, &details).await;
        }
        bot.edit_message_text(
            msg.chat.id,
            msg.id,
            format!(
                "🎟 Slot <b>{channel}</b> in <b>{group}</b> reserved.\n⏳ Awaiting admin confirmation; 1 credit will be spent on approval.",
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;
    } else {
        let mut buttons = Vec::new();
        if gateway_available {
            buttons.push(InlineKeyboardButton::callback(
                "💳 Pay online".to_string(),
                format!("gwpay:{}", slot.id),
            ));
        }
        buttons.push(InlineKeyboardButton::callback(
            "✅ I paid".to_string(),
            format!("paid:{}", slot.id),
        ));
        bot.edit_message_text(
            msg.chat.id,
            msg.id,
            format!(
                "📡 Slot <b>{channel}</b> in <b>{group}</b> reserved.\n💰 Training fee: <b>{} ₽</b>.\nPay online or transfer manually and press \"I paid\".",
                config.slot_price,
            ),
        )
        .parse_mode(ParseMode::Html)
        .reply_markup(InlineKeyboardMarkup::new(vec![buttons]))
        .await?;
    }
    bot.answer_callback_query(q.id.clone()).text("Slot reserved").await?;
    Ok(())
}

async fn manual_paid(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    slot_id: i64,
) -> CallbackResult {
    let user_id = q.from.id.0 as i64;
    let details = Slot::details(&db.pool, slot_id)
        .await?
        .ok_or(LedgerError::SlotNotFound)?;
    if details.user_id != user_id {
        return Err(LedgerError::NotSlotOwner.into());
    }
    if details.status != "pending" {
        return Err(LedgerError::AlreadyHandled.into());
    }

    notifier::send_slot_prompts(bot, db, &config.admins, &details).await;

    if let Some(msg) = &q.message {
        bot.edit_message_text(
            msg.chat.id,
            msg.id,
            format!(
                "📅 Training {}\n📡 Channel <b>{}</b>\n⏳ Payment reported, awaiting admin confirmation.",
                format_stored(&details.date),
                details.channel,
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;
    }
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn gateway_slot_payment(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    gateway: Option<&GatewayClient>,
    slot_id: i64,
) -> CallbackResult {
    let gateway = gateway.ok_or_else(|| LedgerError::Gateway("gateway not configured".into()))?;
    let user_id = q.from.id.0 as i64;
    let details = Slot::details(&db.pool, slot_id)
        .await?
        .ok_or(LedgerError::SlotNotFound)?;
    if details.user_id != user_id {
        return Err(LedgerError::NotSlotOwner.into());
    }

    let Some(msg) = &q.message else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let created = gateway
        .create_payment(
            &db.pool,
            user_id,
            config.slot_price,
            "slot",
            slot_id,
            msg.chat.id.0,
            i64::from(msg.id.0),
            &format!("Training {}", format_stored(&details.date)),
        )
        .await?;

    let url = reqwest::Url::parse(&created.confirmation_url)
        .map_err(|e| LedgerError::Gateway(e.to_string()))?;
    bot.edit_message_text(
        msg.chat.id,
        msg.id,
        format!(
            "📅 Training {}\n📡 Channel <b>{}</b>\n💳 Pay <b>{} ₽</b> by the link below. The booking confirms automatically.",
            format_stored(&details.date),
            details.channel,
            config.slot_price,
        ),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        "💳 Pay online".to_string(),
        url,
    )]]))
    .await?;
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn pick_pack(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    gateway_available: bool,
    count: i64,
) -> CallbackResult {
    let user_id = q.from.id.0 as i64;
    if User::find(&db.pool, user_id).await?.is_none() {
        bot.answer_callback_query(q.id.clone())
            .text("Register first: send /start to the bot")
            .show_alert(true)
            .await?;
        return Ok(());
    }
    let pack = config
        .pack(count)
        .ok_or(LedgerError::SubscriptionNotFound)?;

    let order = Subscription::create(&db.pool, user_id, pack.count, Utc::now()).await?;

    let mut buttons = Vec::new();
    if gateway_available {
        buttons.push(InlineKeyboardButton::callback(
            "💳 Pay online".to_string(),
            format!("gwsub:{}", order.id),
        ));
    }
    buttons.push(InlineKeyboardButton::callback(
        "✅ I paid".to_string(),
        format!("subpaid:{}", order.id),
    ));

    if let Some(msg) = &q.message {
        bot.edit_message_text(
            msg.chat.id,
            msg.id,
            format!(
                "🎟 Pack: <b>{} trainings</b>\n💰 Price: <b>{} ₽</b>\nPay online or transfer manually and press \"I paid\".",
                pack.count, pack.price,
            ),
        )
        .parse_mode(ParseMode::Html)
        .reply_markup(InlineKeyboardMarkup::new(vec![buttons]))
        .await?;
    }
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn subscription_paid(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    sub_id: i64,
) -> CallbackResult {
    let user_id = q.from.id.0 as i64;
    let order = Subscription::find_by_id(&db.pool, sub_id)
        .await?
        .ok_or(LedgerError::SubscriptionNotFound)?;
    if order.user_id != user_id {
        return Err(LedgerError::NotSlotOwner.into());
    }
    if order.status != "pending" {
        return Err(LedgerError::AlreadyHandled.into());
    }

    let user = User::find(&db.pool, user_id).await?;
    notifier::send_subscription_prompts(bot, db, &config.admins, &order, user.as_ref()).await;

    if let Some(msg) = &q.message {
        bot.edit_message_text(
            msg.chat.id,
            msg.id,
            format!(
                "🎟 Pack: <b>{} trainings</b>\n⏳ Payment reported, awaiting admin confirmation.",
                order.count,
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;
    }
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn gateway_sub_payment(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    gateway: Option<&GatewayClient>,
    sub_id: i64,
) -> CallbackResult {
    let gateway = gateway.ok_or_else(|| LedgerError::Gateway("gateway not configured".into()))?;
    let user_id = q.from.id.0 as i64;
    let order = Subscription::find_by_id(&db.pool, sub_id)
        .await?
        .ok_or(LedgerError::SubscriptionNotFound)?;
    if order.user_id != user_id {
        return Err(LedgerError::NotSlotOwner.into());
    }
    let pack = config
        .pack(order.count)
        .ok_or(LedgerError::SubscriptionNotFound)?;

    let Some(msg) = &q.message else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let created = gateway
        .create_payment(
            &db.pool,
            user_id,
            pack.price,
            "subscription",
            order.id,
            msg.chat.id.0,
            i64::from(msg.id.0),
            &format!("Subscription pack, {} trainings", pack.count),
        )
        .await?;

    let url = reqwest::Url::parse(&created.confirmation_url)
        .map_err(|e| LedgerError::Gateway(e.to_string()))?;
    bot.edit_message_text(
        msg.chat.id,
        msg.id,
        format!(
            "🎟 Pack: <b>{} trainings</b>\n💳 Pay <b>{} ₽</b> by the link below. Credits arrive automatically.",
            pack.count, pack.price,
        ),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        "💳 Pay online".to_string(),
        url,
    )]]))
    .await?;
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn request_cancel(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    slot_id: i64,
) -> CallbackResult {
    let user_id = q.from.id.0 as i64;
    let request =
        reservation::request_cancel(&db.pool, config, slot_id, user_id, Utc::now()).await?;

    if let Ok(Some(details)) = Slot::details(&db.pool, slot_id).await {
        notifier::send_cancel_prompts(bot, db, &config.admins, &details, request.refund_due).await;
    }

    let note = if request.refund_due {
        "1 credit returns to you on approval."
    } else {
        "Outside the refund window, no credit returns."
    };
    bot.answer_callback_query(q.id.clone())
        .text(format!("Cancellation requested. {note}"))
        .show_alert(true)
        .await?;
    Ok(())
}

async fn admin_approve_slot(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    slot_id: i64,
) -> CallbackResult {
    let admin_id = require_admin(q, config)?;
    let details = moderation::approve_slot(&db.pool, slot_id).await?;

    notifier::retract_prompts(bot, db, entity::SLOT, slot_id, admin_id).await;
    let credit_note = if details.payment_method == reservation::method::SUBSCRIPTION {
        format!("\n🎟 1 credit spent, {} left.", details.credits)
    } else {
        String::new()
    };
    notifier::notify_user(
        bot,
        details.user_id,
        &format!(
            "✅ Your booking is confirmed!\n📅 {}\n🏁 <b>{}</b>, channel <b>{}</b>{credit_note}",
            format_stored(&details.date),
            details.group_name,
            details.channel,
        ),
    )
    .await;

    finish_admin_action(bot, q, "✅ Approved").await
}

async fn admin_reject_slot(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    slot_id: i64,
) -> CallbackResult {
    let admin_id = require_admin(q, config)?;
    let user_id = moderation::reject_slot(&db.pool, slot_id).await?;

    notifier::retract_prompts(bot, db, entity::SLOT, slot_id, admin_id).await;
    notifier::notify_user(
        bot,
        user_id,
        "❌ Your booking was rejected. The channel is free again; contact an admin if this looks wrong.",
    )
    .await;

    finish_admin_action(bot, q, "❌ Rejected").await
}

async fn admin_approve_cancel(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    slot_id: i64,
) -> CallbackResult {
    let admin_id = require_admin(q, config)?;
    let cancelled = reservation::approve_cancel(&db.pool, slot_id).await?;

    notifier::retract_prompts(bot, db, entity::SLOT, slot_id, admin_id).await;
    let note = if cancelled.refunded {
        "\n🎟 1 credit returned to your balance."
    } else {
        ""
    };
    notifier::notify_user(
        bot,
        cancelled.user_id,
        &format!("✅ Your booking was cancelled.{note}"),
    )
    .await;

    finish_admin_action(bot, q, "✅ Cancellation approved").await
}

async fn admin_decline_cancel(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    slot_id: i64,
) -> CallbackResult {
    let admin_id = require_admin(q, config)?;
    let user_id = reservation::decline_cancel(&db.pool, slot_id).await?;

    notifier::retract_prompts(bot, db, entity::SLOT, slot_id, admin_id).await;
    notifier::notify_user(
        bot,
        user_id,
        "❌ Your cancellation request was declined; the booking stays confirmed.",
    )
    .await;

    finish_admin_action(bot, q, "❌ Cancellation declined").await
}

async fn admin_approve_sub(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    sub_id: i64,
) -> CallbackResult {
    let admin_id = require_admin(q, config)?;
    let order = moderation::approve_subscription(&db.pool, sub_id).await?;

    notifier::retract_prompts(bot, db, entity::SUBSCRIPTION, sub_id, admin_id).await;
    let total = User::credits(&db.pool, order.user_id).await?;
    notifier::notify_user(
        bot,
        order.user_id,
        &format!(
            "🎟 Subscription confirmed!\n📦 Added: <b>{}</b>\n📊 Total available: <b>{total}</b>",
            order.count,
        ),
    )
    .await;

    finish_admin_action(bot, q, "✅ Subscription approved").await
}

async fn admin_reject_sub(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    sub_id: i64,
) -> CallbackResult {
    let admin_id = require_admin(q, config)?;
    let user_id = moderation::reject_subscription(&db.pool, sub_id).await?;

    notifier::retract_prompts(bot, db, entity::SUBSCRIPTION, sub_id, admin_id).await;
    notifier::notify_user(
        bot,
        user_id,
        "❌ Your subscription purchase was rejected. Contact an admin if this looks wrong.",
    )
    .await;

    finish_admin_action(bot, q, "❌ Subscription rejected").await
}

async fn admin_cancel_training(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    training_id: i64,
) -> CallbackResult {
    require_admin(q, config)?;
    let training = Training::find_by_id(&db.pool, training_id)
        .await?
        .ok_or(LedgerError::SessionNotFound)?;
    let participants = reservation::cancel_training(&db.pool, training_id).await?;

    let date_fmt = format_stored(&training.date);
    for slot in &participants {
        let text = match slot.status.as_str() {
            "confirmed" => format!(
                "🚫 The training on <b>{date_fmt}</b> was cancelled. 1 credit returned to your balance.",
            ),
            "pending" => {
                // The booking request was dropped with the training; pull
                // the now-dead approval prompts out of the admin chats.
                notifier::retract_prompts(bot, db, entity::SLOT, slot.id, 0).await;
                format!(
                    "🚫 The training on <b>{date_fmt}</b> was cancelled, your booking request is dropped.",
                )
            }
            _ => format!("🚫 The training on <b>{date_fmt}</b> was cancelled."),
        };
        notifier::notify_user(bot, slot.user_id, &text).await;
    }
    notifier::notify_user(
        bot,
        config.club_chat_id,
        &format!("🚫 The training on <b>{date_fmt}</b> is cancelled."),
    )
    .await;

    finish_admin_action(bot, q, &format!("🚫 Training {date_fmt} cancelled")).await
}

async fn admin_add_credits(
    bot: &Bot,
    q: &CallbackQuery,
    db: &DatabaseManager,
    config: &Config,
    target: i64,
    count: i64,
) -> CallbackResult {
    require_admin(q, config)?;
    User::add_credits(&db.pool, target, count).await?;
    let total = User::credits(&db.pool, target).await?;

    notifier::notify_user(
        bot,
        target,
        &format!("🎟 An admin granted you <b>{count}</b> credits. Total: <b>{total}</b>."),
    )
    .await;

    finish_admin_action(bot, q, &format!("✅ Granted {count} credits (total {total})")).await
}

/// Strips the keyboard off the acted-on prompt and stamps the verdict.
async fn finish_admin_action(bot: &Bot, q: &CallbackQuery, verdict: &str) -> CallbackResult {
    if let Some(msg) = &q.message {
        let text = msg.text().unwrap_or_default();
        bot.edit_message_text(msg.chat.id, msg.id, format!("{text}\n\n{verdict}"))
            .await?;
    }
    bot.answer_callback_query(q.id.clone()).text(verdict).await?;
    Ok(())
}
