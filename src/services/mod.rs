pub mod gateway;
pub mod moderation;
pub mod notifier;
pub mod reconciliation;
pub mod reservation;
pub mod sweeper;
pub mod webhook;
