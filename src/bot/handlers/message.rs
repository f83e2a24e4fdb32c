use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, KeyboardRemove};
use teloxide::utils::command::BotCommands;

use super::{HandlerResult, RegistrationDialogue, RegistrationState};
use crate::bot::commands::{admin, booking, Command};
use crate::config::Config;
use crate::database::connection::DatabaseManager;
use crate::database::models::User;
use crate::utils::validation::validate_nickname;

/// Video systems a pilot can fly.
pub const VIDEO_SYSTEMS: [&str; 4] = ["HDZero", "Analog", "DJI", "Walksnail"];

fn sender_id(msg: &Message) -> i64 {
    msg.from().map(|u| u.id.0 as i64).unwrap_or(0)
}

/// One-tap reply keyboard with the four video systems, two per row.
fn video_system_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(VIDEO_SYSTEMS[0]), KeyboardButton::new(VIDEO_SYSTEMS[1])],
        vec![KeyboardButton::new(VIDEO_SYSTEMS[2]), KeyboardButton::new(VIDEO_SYSTEMS[3])],
    ])
    .resize_keyboard(true)
}

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: RegistrationDialogue,
    db: Arc<DatabaseManager>,
    config: Arc<Config>,
) -> HandlerResult {
    let user_id = sender_id(&msg);

    // Admin commands are gated up front; everything below the match is
    // available to any user.
    let admin_only = matches!(
        cmd,
        Command::Users
            | Command::Subscribers
            | Command::NewTraining { .. }
            | Command::CancelTraining
            | Command::AddCredits { .. }
            | Command::ResendPending
            | Command::Promote
            | Command::Announce { .. }
    );
    if admin_only && !config.is_admin(user_id) {
        bot.send_message(msg.chat.id, "❌ This command is for administrators.")
            .await?;
        return Ok(());
    }

    match cmd {
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
        Command::Start => {
            booking::handle_start(bot, msg, dialogue, &db).await?;
        }
        Command::Id => {
            bot.send_message(msg.chat.id, format!("Your Telegram id: {user_id}"))
                .await?;
        }
        Command::Trainings => {
            booking::handle_trainings(bot, msg, &db).await?;
        }
        Command::MyBookings => {
            booking::handle_my_bookings(bot, msg, &db).await?;
        }
        Command::BuySubscription => {
            booking::handle_buy_subscription(bot, msg, &config).await?;
        }
        Command::Users => {
            admin::handle_users(bot, msg, &db).await?;
        }
        Command::Subscribers => {
            admin::handle_subscribers(bot, msg, &db).await?;
        }
        Command::NewTraining { date } => {
            admin::handle_new_training(bot, msg, &date, &db, &config).await?;
        }
        Command::CancelTraining => {
            admin::handle_cancel_training(bot, msg, &db).await?;
        }
        Command::AddCredits { user_id: target, count } => {
            admin::handle_add_credits(bot, msg, target, count, &db).await?;
        }
        Command::ResendPending => {
            admin::handle_resend_pending(bot, msg, &db, &config).await?;
        }
        Command::Promote => {
            admin::handle_promote(bot, msg, &db, &config).await?;
        }
        Command::Announce { text } => {
            admin::handle_announce(bot, msg, &text, &config).await?;
        }
    }
    Ok(())
}

/// Non-command text: drives the registration dialogue, otherwise only
/// reacts to malformed commands.
pub async fn general_message(
    bot: Bot,
    msg: Message,
    dialogue: RegistrationDialogue,
    db: Arc<DatabaseManager>,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    match dialogue.get().await?.unwrap_or_default() {
        RegistrationState::AwaitingNickname => {
            let nickname = match validate_nickname(text) {
                Ok(n) => n,
                Err(e) => {
                    bot.send_message(msg.chat.id, format!("❗ {e}. Try again:")).await?;
                    return Ok(());
                }
            };
            bot.send_message(msg.chat.id, "🚁 Pick the video system you fly:")
                .reply_markup(video_system_keyboard())
                .await?;
            dialogue
                .update(RegistrationState::AwaitingVideoSystem { nickname })
                .await?;
        }
        RegistrationState::AwaitingVideoSystem { nickname } => {
            let system = text.trim();
            if !VIDEO_SYSTEMS.contains(&system) {
                bot.send_message(msg.chat.id, "🚁 Use one of the keyboard buttons:").await?;
                return Ok(());
            }
            match User::upsert(&db.pool, sender_id(&msg), &nickname, system).await {
                Ok(user) => {
                    bot.send_message(
                        msg.chat.id,
                        format!(
                            "✅ Registration complete!\n\n👤 Nickname: {}\n🛠 System: {}",
                            user.nickname, user.video_system
                        ),
                    )
                    .reply_markup(KeyboardRemove::new())
                    .await?;
                    dialogue.update(RegistrationState::Idle).await?;
                }
                Err(e) => {
                    tracing::error!("registration upsert failed: {e}");
                    bot.send_message(msg.chat.id, "❌ Could not save your profile, try again later.")
                        .await?;
                }
            }
        }
        RegistrationState::Idle => {
            if text.starts_with('/') {
                bot.send_message(
                    msg.chat.id,
                    format!(
                        "Unknown command: {}\nUse /help to see all commands.",
                        text.split_whitespace().next().unwrap_or(text)
                    ),
                )
                .await?;
            }
        }
    }
    Ok(())
}
