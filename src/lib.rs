pub mod bot;
pub mod command;
pub mod config;
pub mod csv;
pub mod error;
pub mod games;
pub mod gateway;
pub mod help;
pub mod ledger;
pub mod leveling;
pub mod market;
pub mod model;
pub mod points;
pub mod presence;
pub mod store;

pub use bot::Bot;
pub use error::CommandError;
pub use ledger::{Ledger, LedgerDocument};
pub use market::Marketplace;
pub use model::{ChannelId, ChatMessage, GatewayEvent, UserId};
pub use points::Points;
