//! # Whoop Club Bot
//!
//! A Telegram bot for an FPV tiny-whoop racing club: members book video
//! channels in scheduled training sessions, buy subscription credit packs
//! and pay through an external payment gateway; admins moderate bookings
//! and payments.
//!
//! ## Features
//! - Channel-exclusive slot reservations with a guarded-update state machine
//! - Subscription credits, decremented when an admin confirms a booking
//! - Idempotent payment-gateway webhook reconciliation
//! - Background sweeper for stuck prompts, capacity announcements and
//!   deferred payment notifications
//! - Persistent storage with SQLite

/// Bot command handlers and callback processing
pub mod bot;
/// Configuration management and environment variables
pub mod config;
/// Database models, connections, and migrations
pub mod database;
/// Domain errors of the booking ledger
pub mod error;
/// Reservation engine, payment reconciliation, moderation and sweeper
pub mod services;
/// Utility functions for datetime, validation, and formatting
pub mod utils;
