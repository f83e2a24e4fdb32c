//! Administrator commands. The permission gate lives in the command
//! dispatcher; these handlers assume the sender is an admin.

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use tracing::warn;

use crate::bot::handlers::HandlerResult;
use crate::config::Config;
use crate::database::connection::DatabaseManager;
use crate::database::models::{Slot, Training, User};
use crate::services::sweeper;
use crate::utils::datetime::format_stored;
use crate::utils::text::{chunk_text_by_lines, MESSAGE_LIMIT};
use crate::utils::validation::validate_training_date;

/// `/users`: every registered pilot, chunked to fit the message limit.
pub async fn handle_users(bot: Bot, msg: Message, db: &DatabaseManager) -> HandlerResult {
    let users = User::list_all(&db.pool).await?;
    if users.is_empty() {
        bot.send_message(msg.chat.id, "📭 Nobody registered yet.").await?;
        return Ok(());
    }

    let mut lines = vec![format!("👥 <b>Registered pilots ({}):</b>", users.len())];
    for user in &users {
        lines.push(format!(
            "<code>{}</code> — {} ({}), 🎟 {}",
            user.user_id, user.nickname, user.video_system, user.credits
        ));
    }
    for chunk in chunk_text_by_lines(&lines.join("\n"), MESSAGE_LIMIT) {
        bot.send_message(msg.chat.id, chunk)
            .parse_mode(ParseMode::Html)
            .await?;
    }
    Ok(())
}

/// `/subscribers`: pilots holding subscription credits.
pub async fn handle_subscribers(bot: Bot, msg: Message, db: &DatabaseManager) -> HandlerResult {
    let users = User::list_with_credits(&db.pool).await?;
    if users.is_empty() {
        bot.send_message(msg.chat.id, "📭 Nobody holds credits right now.").await?;
        return Ok(());
    }

    let mut lines = vec![format!("🎟 <b>Subscribers ({}):</b>", users.len())];
    for user in &users {
        lines.push(format!(
            "<code>{}</code> — {}: 🎟 {}",
            user.user_id, user.nickname, user.credits
        ));
    }
    for chunk in chunk_text_by_lines(&lines.join("\n"), MESSAGE_LIMIT) {
        bot.send_message(msg.chat.id, chunk)
            .parse_mode(ParseMode::Html)
            .await?;
    }
    Ok(())
}

/// `/newtraining DD.MM.YYYY`: creates the session and pre-books the
/// configured club pilots.
pub async fn handle_new_training(
    bot: Bot,
    msg: Message,
    date: &str,
    db: &DatabaseManager,
    config: &Config,
) -> HandlerResult {
    let start = match validate_training_date(date, Utc::now()) {
        Ok(dt) => dt,
        Err(e) => {
            bot.send_message(msg.chat.id, format!("❗ {e}")).await?;
            return Ok(());
        }
    };

    let training = Training::create(&db.pool, start).await?;
    for pilot in &config.seed_pilots {
        if let Err(e) = Slot::insert_confirmed(
            &db.pool,
            training.id,
            pilot.user_id,
            &pilot.group,
            &pilot.channel,
            Utc::now(),
        )
        .await
        {
            warn!(training_id = training.id, user_id = pilot.user_id, "seed booking failed: {e}");
        }
    }

    bot.send_message(
        msg.chat.id,
        format!("✅ Training created for {}", format_stored(&training.date)),
    )
    .await?;
    Ok(())
}

/// `/canceltraining`: pick which open training to cancel.
pub async fn handle_cancel_training(bot: Bot, msg: Message, db: &DatabaseManager) -> HandlerResult {
    let trainings = Training::list_open_upcoming(&db.pool, Utc::now()).await?;
    if trainings.is_empty() {
        bot.send_message(msg.chat.id, "📭 No open trainings to cancel.").await?;
        return Ok(());
    }

    let rows: Vec<Vec<InlineKeyboardButton>> = trainings
        .iter()
        .map(|t| {
            vec![InlineKeyboardButton::callback(
                format!("❌ {}", format_stored(&t.date)),
                format!("traincancel:{}", t.id),
            )]
        })
        .collect();

    bot.send_message(msg.chat.id, "Which training should be cancelled?")
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

/// `/addcredits <user_id> <count>`: two-step, the grant happens on the
/// confirmation callback.
pub async fn handle_add_credits(
    bot: Bot,
    msg: Message,
    target: i64,
    count: i64,
    db: &DatabaseManager,
) -> HandlerResult {
    if count <= 0 {
        bot.send_message(msg.chat.id, "❗ The credit count must be positive.").await?;
        return Ok(());
    }
    let Some(user) = User::find(&db.pool, target).await? else {
        bot.send_message(msg.chat.id, "❌ No such registered user.").await?;
        return Ok(());
    };

    let keyboard = InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Confirm", format!("addcr:{target}:{count}")),
        InlineKeyboardButton::callback("❌ Cancel", "addcr_cancel".to_string()),
    ]]);
    bot.send_message(
        msg.chat.id,
        format!(
            "Grant <b>{count}</b> credits to {} (<code>{target}</code>)?",
            user.nickname
        ),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(keyboard)
    .await?;
    Ok(())
}

/// `/resendpending`: re-delivers lost admin prompts right now.
pub async fn handle_resend_pending(
    bot: Bot,
    msg: Message,
    db: &DatabaseManager,
    config: &Config,
) -> HandlerResult {
    let sent = sweeper::resend_pending_prompts(&bot, db, &config.admins).await?;
    bot.send_message(msg.chat.id, format!("📨 Re-sent prompts for {sent} pending bookings."))
        .await?;
    Ok(())
}

/// `/promote`: immediate capacity announcement in the club chat.
pub async fn handle_promote(
    bot: Bot,
    msg: Message,
    db: &DatabaseManager,
    config: &Config,
) -> HandlerResult {
    if sweeper::send_capacity_promo(&bot, db, config, true).await? {
        bot.send_message(msg.chat.id, "📣 Capacity announcement sent.").await?;
    } else {
        bot.send_message(msg.chat.id, "📭 No upcoming training to promote.").await?;
    }
    Ok(())
}

/// `/announce <text>`: broadcast to the club chat.
pub async fn handle_announce(bot: Bot, msg: Message, text: &str, config: &Config) -> HandlerResult {
    if text.trim().is_empty() {
        bot.send_message(msg.chat.id, "❗ Usage: /announce <text>").await?;
        return Ok(());
    }
    for chunk in chunk_text_by_lines(text.trim(), MESSAGE_LIMIT) {
        bot.send_message(ChatId(config.club_chat_id), chunk)
            .parse_mode(ParseMode::Html)
            .await?;
    }
    bot.send_message(msg.chat.id, "📣 Announcement posted.").await?;
    Ok(())
}
