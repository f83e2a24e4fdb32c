//! User-facing commands: registration entry, training list, own
//! bookings, subscription purchase.

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};

use crate::bot::handlers::{HandlerResult, RegistrationDialogue, RegistrationState};
use crate::config::Config;
use crate::database::connection::DatabaseManager;
use crate::database::models::{Slot, Training, User};
use crate::utils::datetime::format_stored;

fn sender_id(msg: &Message) -> i64 {
    msg.from().map(|u| u.id.0 as i64).unwrap_or(0)
}

/// `/start`: shows the profile, or begins registration for new pilots.
pub async fn handle_start(
    bot: Bot,
    msg: Message,
    dialogue: RegistrationDialogue,
    db: &DatabaseManager,
) -> HandlerResult {
    match User::find(&db.pool, sender_id(&msg)).await? {
        Some(user) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "👋 You are already registered!\n\n👤 Nickname: {}\n🛠 System: {}\n🎟 Credits: {}\n\nUse /trainings to book a slot.",
                    user.nickname, user.video_system, user.credits
                ),
            )
            .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "👋 Hi! What's your nickname / OSD tag?")
                .await?;
            dialogue.update(RegistrationState::AwaitingNickname).await?;
        }
    }
    Ok(())
}

/// `/trainings`: upcoming open sessions as a booking keyboard.
pub async fn handle_trainings(bot: Bot, msg: Message, db: &DatabaseManager) -> HandlerResult {
    let trainings = Training::list_open_upcoming(&db.pool, Utc::now()).await?;
    if trainings.is_empty() {
        bot.send_message(msg.chat.id, "📭 No upcoming trainings yet.").await?;
        return Ok(());
    }

    let rows: Vec<Vec<InlineKeyboardButton>> = trainings
        .iter()
        .map(|t| {
            vec![InlineKeyboardButton::callback(
                format!("📅 {}", format_stored(&t.date)),
                format!("train:{}", t.id),
            )]
        })
        .collect();

    bot.send_message(msg.chat.id, "📅 Pick a training:")
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

/// `/mybookings`: the user's slots with cancel buttons for confirmed ones.
pub async fn handle_my_bookings(bot: Bot, msg: Message, db: &DatabaseManager) -> HandlerResult {
    let slots = Slot::for_user(&db.pool, sender_id(&msg)).await?;
    if slots.is_empty() {
        bot.send_message(msg.chat.id, "📭 You have no bookings. Use /trainings.")
            .await?;
        return Ok(());
    }

    let mut lines = vec!["📋 <b>Your bookings:</b>".to_string()];
    let mut rows = Vec::new();
    for slot in &slots {
        let status = match slot.status.as_str() {
            "pending" => "⏳ awaiting confirmation",
            "confirmed" => "✅ confirmed",
            "pending_cancel" => "🕐 cancellation requested",
            other => other,
        };
        lines.push(format!(
            "📅 {} — {} <b>{}</b>, {status}",
            format_stored(&slot.date),
            slot.group_name,
            slot.channel,
        ));
        if slot.status == "confirmed" {
            rows.push(vec![InlineKeyboardButton::callback(
                format!("❌ Cancel {}", format_stored(&slot.date)),
                format!("cxl:{}", slot.id),
            )]);
        }
    }

    bot.send_message(msg.chat.id, lines.join("\n"))
        .parse_mode(ParseMode::Html)
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

/// `/buysubscription`: pack selection keyboard.
pub async fn handle_buy_subscription(bot: Bot, msg: Message, config: &Config) -> HandlerResult {
    let rows: Vec<Vec<InlineKeyboardButton>> = config
        .subscription_packs
        .iter()
        .map(|p| {
            vec![InlineKeyboardButton::callback(
                format!("🎟 {} trainings — {} ₽", p.count, p.price),
                format!("sub:{}", p.count),
            )]
        })
        .collect();

    bot.send_message(msg.chat.id, "🎟 Pick a subscription pack:")
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}
