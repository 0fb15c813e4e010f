//! Error returned by a single chat command.

use thiserror::Error;

use crate::games::GameError;
use crate::ledger::LedgerError;
use crate::market::MarketError;

/// Every failure is replied to the invoker and aborts only that command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Market(#[from] MarketError),

    #[error("{0}")]
    Game(#[from] GameError),

    #[error("only admins can use this command")]
    NotAuthorized,

    #[error("usage: {0}")]
    MalformedArguments(&'static str),

    #[error("{0}")]
    InvalidTarget(String),
}
