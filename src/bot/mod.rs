//! Telegram surface: command definitions and update handlers.

pub mod commands;
pub mod handlers;
