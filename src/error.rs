use thiserror::Error;

/// Errors of the booking/payment ledger.
///
/// Conflict variants (`AlreadyBooked`, `ChannelTaken`, `AlreadyHandled`)
/// come out of guarded updates that affected zero rows; callers report
/// them to the user and never retry automatically.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Training does not exist
    #[error("training not found")]
    SessionNotFound,

    /// Training is cancelled or already in the past
    #[error("training is not open for booking")]
    SessionClosed,

    /// User already holds a slot in this training
    #[error("already booked in this training")]
    AlreadyBooked,

    /// Another pending/confirmed slot occupies the channel
    #[error("channel is already taken")]
    ChannelTaken,

    /// Group or channel label is not part of the configured layout
    #[error("unknown group or channel: {0}")]
    UnknownChannel(String),

    /// The entity was already transitioned by someone else; first writer won
    #[error("already handled")]
    AlreadyHandled,

    /// Slot does not exist (deleted or never created)
    #[error("slot not found")]
    SlotNotFound,

    /// Subscription order does not exist
    #[error("subscription not found")]
    SubscriptionNotFound,

    /// Payment record does not exist
    #[error("payment not found")]
    PaymentNotFound,

    /// A subscription-paid slot was approved but the user has no credit left
    #[error("user {user_id} has no subscription credit to spend")]
    CreditInconsistency {
        /// Owner of the empty balance
        user_id: i64,
    },

    /// The slot does not belong to the acting user
    #[error("slot belongs to another user")]
    NotSlotOwner,

    /// Gateway call failed (timeout, non-2xx); the local payment is canceled
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// A stored timestamp failed to parse back
    #[error("corrupt stored timestamp: {0}")]
    BadTimestamp(#[from] chrono::ParseError),

    /// Underlying storage failure; the whole operation was rolled back
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
