//! Runtime configuration.
//!
//! Command line arguments with environment variable fallbacks, turned into an
//! [`EconomyConfig`] that the rest of the crate reads.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{FixedOffset, Offset, Utc};
use clap::{Parser, ValueEnum};

use crate::Points;
use crate::model::UserId;

/// What happens to a marketplace listing once somebody buys it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PurchasePolicy {
    /// The listing is a service advertisement and stays up.
    #[default]
    Repeatable,
    /// The listing is a single item and is removed when bought.
    Consume,
}

/// Replay chat and voice events through the point economy
#[derive(Parser, Debug, Clone)]
#[command(name = "point-economy")]
pub struct Args {
    /// Events CSV to replay
    pub events: PathBuf,

    /// Directory holding ledger.json and market.json
    #[arg(long, env = "ECONOMY_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Write a CSV of all accounts here once the replay finishes
    #[arg(long)]
    pub accounts_out: Option<PathBuf>,

    /// User ids allowed to run admin commands
    #[arg(long = "admin", env = "ECONOMY_ADMINS", value_delimiter = ',')]
    pub admins: Vec<UserId>,

    /// User ids whose voice presence never earns points (e.g. TTS bots)
    #[arg(long = "ignore-voice", env = "ECONOMY_IGNORED_VOICE", value_delimiter = ',')]
    pub ignored_voice_users: Vec<UserId>,

    /// Offset from UTC, in hours, of the civil day used for check-ins
    #[arg(long, env = "ECONOMY_UTC_OFFSET", default_value_t = 9, allow_negative_numbers = true)]
    pub utc_offset_hours: i32,

    /// Whether buying a marketplace listing removes it
    #[arg(
        long,
        env = "ECONOMY_PURCHASE_POLICY",
        value_enum,
        default_value_t = PurchasePolicy::Repeatable
    )]
    pub purchase_policy: PurchasePolicy,

    /// Seed for reproducible game outcomes
    #[arg(long, env = "ECONOMY_RNG_SEED")]
    pub rng_seed: Option<u64>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

impl Args {
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.json")
    }

    pub fn market_path(&self) -> PathBuf {
        self.data_dir.join("market.json")
    }

    pub fn economy(&self) -> Result<EconomyConfig, String> {
        let utc_offset = FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .ok_or_else(|| format!("utc offset out of range: {}", self.utc_offset_hours))?;
        Ok(EconomyConfig {
            admins: self.admins.iter().copied().collect(),
            ignored_voice_users: self.ignored_voice_users.iter().copied().collect(),
            utc_offset,
            purchase_policy: self.purchase_policy,
            rng_seed: self.rng_seed,
            ..EconomyConfig::default()
        })
    }
}

/// Economy-wide settings.
#[derive(Debug, Clone)]
pub struct EconomyConfig {
    pub admins: HashSet<UserId>,
    pub ignored_voice_users: HashSet<UserId>,
    pub utc_offset: FixedOffset,
    pub purchase_policy: PurchasePolicy,
    pub rng_seed: Option<u64>,
    /// Points per minute in voice with the microphone on.
    pub mic_on_rate: Points,
    /// Points per minute in voice while muted.
    pub mic_off_rate: Points,
}

impl EconomyConfig {
    pub fn is_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            admins: HashSet::new(),
            ignored_voice_users: HashSet::new(),
            utc_offset: FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix()),
            purchase_policy: PurchasePolicy::default(),
            rng_seed: None,
            mic_on_rate: Points::new(2),
            mic_off_rate: Points::new(1),
        }
    }
}
