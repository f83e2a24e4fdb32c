pub mod admin;
pub mod booking;

use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Whoop club bot commands:")]
pub enum Command {
    #[command(description = "Display this help message")]
    Help,
    #[command(description = "Register or update your pilot profile")]
    Start,
    #[command(description = "Show your Telegram id")]
    Id,
    #[command(description = "Upcoming trainings, book a slot")]
    Trainings,
    #[command(description = "Your bookings")]
    MyBookings,
    #[command(description = "Buy a subscription pack")]
    BuySubscription,
    #[command(description = "List registered pilots (admin)")]
    Users,
    #[command(description = "List pilots with subscription credits (admin)")]
    Subscribers,
    #[command(description = "Create a training: /newtraining DD.MM.YYYY (admin)")]
    NewTraining { date: String },
    #[command(description = "Cancel a training (admin)")]
    CancelTraining,
    #[command(
        description = "Grant credits: /addcredits <user_id> <count> (admin)",
        parse_with = "split"
    )]
    AddCredits { user_id: i64, count: i64 },
    #[command(description = "Re-send stuck booking prompts (admin)")]
    ResendPending,
    #[command(description = "Announce remaining capacity now (admin)")]
    Promote,
    #[command(description = "Broadcast to the club chat: /announce <text> (admin)")]
    Announce { text: String },
}
