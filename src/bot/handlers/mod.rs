pub mod callback;
pub mod message;

use std::sync::Arc;

use teloxide::{
    dispatching::{dialogue, dialogue::InMemStorage, UpdateHandler},
    prelude::*,
};

use crate::config::Config;
use crate::database::connection::DatabaseManager;
use crate::services::gateway::GatewayClient;

/// Registration flow state: nickname first, then the video system.
#[derive(Debug, Clone, Default)]
pub enum RegistrationState {
    #[default]
    Idle,
    AwaitingNickname,
    AwaitingVideoSystem {
        nickname: String,
    },
}

pub type RegistrationDialogue = Dialogue<RegistrationState, InMemStorage<RegistrationState>>;

/// Handler result: Telegram errors and dialogue storage errors both box
/// into the dispatcher's error type.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub struct BotHandler {
    pub db: Arc<DatabaseManager>,
    pub config: Arc<Config>,
    pub gateway: Option<Arc<GatewayClient>>,
}

impl BotHandler {
    pub fn new(
        db: Arc<DatabaseManager>,
        config: Arc<Config>,
        gateway: Option<Arc<GatewayClient>>,
    ) -> Self {
        Self { db, config, gateway }
    }

    pub fn schema(&self) -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
        use teloxide::dispatching::UpdateFilterExt;

        let (db, config) = (self.db.clone(), self.config.clone());
        let (db_cb, config_cb, gateway_cb) =
            (self.db.clone(), self.config.clone(), self.gateway.clone());
        let db_text = self.db.clone();

        dialogue::enter::<Update, InMemStorage<RegistrationState>, RegistrationState, _>()
            .branch(
                Update::filter_message()
                    .filter_command::<crate::bot::commands::Command>()
                    .endpoint(move |bot, msg, cmd, dialogue| {
                        let (db, config) = (db.clone(), config.clone());
                        async move {
                            message::command_handler(bot, msg, cmd, dialogue, db, config).await
                        }
                    }),
            )
            .branch(Update::filter_callback_query().endpoint(move |bot, q| {
                let (db, config, gateway) =
                    (db_cb.clone(), config_cb.clone(), gateway_cb.clone());
                async move { callback::callback_handler(bot, q, db, config, gateway).await }
            }))
            .branch(Update::filter_message().endpoint(move |bot, msg, dialogue| {
                let db = db_text.clone();
                async move { message::general_message(bot, msg, dialogue, db).await }
            }))
    }
}
