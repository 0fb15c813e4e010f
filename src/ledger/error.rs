//! Error types for ledger operations.

use chrono::NaiveDate;
use thiserror::Error;

use crate::Points;
use crate::model::UserId;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Points),

    #[error("insufficient points for user {user}: available {available}, requested {requested}")]
    InsufficientFunds {
        user: UserId,
        available: Points,
        requested: Points,
    },

    #[error("user {0} cannot transfer to themselves")]
    SelfTransfer(UserId),

    #[error("already checked in on {0}")]
    AlreadyCheckedIn(NaiveDate),

    #[error("daily begging limit reached ({attempts} attempts today)")]
    BegLimitReached { attempts: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}
