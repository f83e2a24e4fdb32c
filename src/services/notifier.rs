//! Best-effort outbound notifications.
//!
//! Delivery failures (blocked bot, deleted message) are logged per
//! recipient and never propagate: the ledger mutation that triggered the
//! notification has already committed and must not be rolled back by a
//! slow or broken chat.

use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use tracing::warn;

use crate::database::connection::DatabaseManager;
use crate::database::models::{AdminPrompt, SlotDetails, Subscription, User};
use crate::utils::datetime::format_stored;
use crate::utils::text::user_link;

/// Entity tags used in the admin_prompts table.
pub mod entity {
    pub const SLOT: &str = "slot";
    pub const SUBSCRIPTION: &str = "subscription";
}

/// Sends `text` to a single user; false on failure.
pub async fn notify_user(bot: &Bot, user_id: i64, text: &str) -> bool {
    match bot
        .send_message(ChatId(user_id), text)
        .parse_mode(ParseMode::Html)
        .await
    {
        Ok(_) => true,
        Err(e) => {
            warn!(user_id, "failed to notify user: {e}");
            false
        }
    }
}

/// Sends `text` to every admin, skipping failures.
pub async fn notify_admins(bot: &Bot, admins: &[i64], text: &str) {
    for &admin in admins {
        notify_user(bot, admin, text).await;
    }
}

/// Sends the approval prompt for a pending slot to every admin and
/// records each delivered prompt so duplicates can be retracted later.
pub async fn send_slot_prompts(
    bot: &Bot,
    db: &DatabaseManager,
    admins: &[i64],
    slot: &SlotDetails,
) -> usize {
    let payment_desc = match slot.payment_method.as_str() {
        "subscription" => format!("🎟 Subscription ({} credits left)", slot.credits),
        "gateway" => "💳 Gateway".to_string(),
        _ => "💳 Manual transfer".to_string(),
    };
    let text = format!(
        "📥 New training booking:\n\
         👤 {} (ID: <code>{}</code>)\n\
         📅 {}\n\
         🏁 Group: <b>{}</b>\n\
         📡 Channel: <b>{}</b>\n\
         🎮 OSD: <b>{}</b>\n\
         🎥 Video: <b>{}</b>\n\
         {payment_desc}\n\
         ⏳ Awaiting payment confirmation",
        user_link(slot.user_id, &slot.nickname),
        slot.user_id,
        format_stored(&slot.date),
        slot.group_name,
        slot.channel,
        slot.nickname,
        slot.video_system,
    );
    let keyboard = InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Approve", format!("ok:{}", slot.id)),
        InlineKeyboardButton::callback("❌ Reject", format!("no:{}", slot.id)),
    ]]);
    send_prompts(bot, db, admins, entity::SLOT, slot.id, &text, keyboard).await
}

/// Approval prompt for a cancellation request.
pub async fn send_cancel_prompts(
    bot: &Bot,
    db: &DatabaseManager,
    admins: &[i64],
    slot: &SlotDetails,
    refund_due: bool,
) -> usize {
    let refund_line = if refund_due {
        "🎟 1 credit will be refunded"
    } else {
        "🚫 Outside the refund window, no refund"
    };
    let text = format!(
        "📤 Cancellation request:\n\
         👤 {} (ID: <code>{}</code>)\n\
         📅 {}\n\
         🏁 <b>{}</b>, channel <b>{}</b>\n\
         {refund_line}",
        user_link(slot.user_id, &slot.nickname),
        slot.user_id,
        format_stored(&slot.date),
        slot.group_name,
        slot.channel,
    );
    let keyboard = InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Approve", format!("cxlok:{}", slot.id)),
        InlineKeyboardButton::callback("❌ Decline", format!("cxlno:{}", slot.id)),
    ]]);
    send_prompts(bot, db, admins, entity::SLOT, slot.id, &text, keyboard).await
}

/// Approval prompt for a subscription purchase.
pub async fn send_subscription_prompts(
    bot: &Bot,
    db: &DatabaseManager,
    admins: &[i64],
    order: &Subscription,
    user: Option<&User>,
) -> usize {
    let nickname = user.map(|u| u.nickname.as_str()).unwrap_or("-");
    let text = format!(
        "💰 Subscription purchase:\n\
         👤 {} (ID: <code>{}</code>)\n\
         📦 {} trainings\n\
         ⏳ Awaiting confirmation",
        user_link(order.user_id, nickname),
        order.user_id,
        order.count,
    );
    let keyboard = InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Approve", format!("subok:{}", order.id)),
        InlineKeyboardButton::callback("❌ Reject", format!("subno:{}", order.id)),
    ]]);
    send_prompts(bot, db, admins, entity::SUBSCRIPTION, order.id, &text, keyboard).await
}

async fn send_prompts(
    bot: &Bot,
    db: &DatabaseManager,
    admins: &[i64],
    entity_type: &str,
    entity_id: i64,
    text: &str,
    keyboard: InlineKeyboardMarkup,
) -> usize {
    let mut sent = 0;
    for &admin in admins {
        let message = match bot
            .send_message(ChatId(admin), text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard.clone())
            .await
        {
            Ok(m) => m,
            Err(e) => {
                warn!(admin, entity_type, entity_id, "failed to send admin prompt: {e}");
                continue;
            }
        };
        if let Err(e) = AdminPrompt::record(
            &db.pool,
            entity_type,
            entity_id,
            admin,
            i64::from(message.id.0),
        )
        .await
        {
            warn!(admin, entity_type, entity_id, "failed to record admin prompt: {e}");
        }
        sent += 1;
    }
    sent
}

/// Deletes the outstanding prompts for an entity from every admin chat
/// once one admin has acted, so nobody acts on a stale prompt.
pub async fn retract_prompts(
    bot: &Bot,
    db: &DatabaseManager,
    entity_type: &str,
    entity_id: i64,
    acted_by: i64,
) {
    let prompts = match AdminPrompt::for_entity(&db.pool, entity_type, entity_id).await {
        Ok(p) => p,
        Err(e) => {
            warn!(entity_type, entity_id, "failed to load admin prompts: {e}");
            return;
        }
    };

    for prompt in prompts.iter().filter(|p| p.admin_id != acted_by) {
        if let Err(e) = bot
            .delete_message(ChatId(prompt.admin_id), MessageId(prompt.message_id as i32))
            .await
        {
            warn!(admin = prompt.admin_id, entity_type, entity_id, "failed to retract prompt: {e}");
        }
    }

    if let Err(e) = AdminPrompt::delete_for_entity(&db.pool, entity_type, entity_id).await {
        warn!(entity_type, entity_id, "failed to clear admin prompts: {e}");
    }
}
