//! Small shared helpers: timestamps, input validation, message text.

pub mod datetime;
pub mod text;
pub mod validation;
