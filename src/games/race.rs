//! Single global pari-mutuel horse race.
//!
//! [`RaceTrack`] owns the race lifecycle `Idle → Staged → Running → Idle`;
//! [`RaceSim`] advances the horses. Only the earliest bettor on the winning
//! horse is paid, and takes the whole pool.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use tokio::time::sleep;
use tracing::info;

use super::{GameError, Services};
use crate::Points;
use crate::gateway::Embed;
use crate::ledger::{Field, Ledger, LedgerDocument, LedgerError};
use crate::model::{ChannelId, UserId, mention};

pub const MIN_HORSES: usize = 2;
pub const MAX_HORSES: usize = 8;
pub const TRACK_LENGTH: u32 = 25;
const TICK: Duration = Duration::from_millis(250);
const STEPS: [u32; 4] = [0, 1, 2, 3];
const ICONS: [&str; 7] = ["🏇", "🐂", "🐉", "🦓", "🐐", "🐖", "🐪"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Staged,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bet {
    pub user: UserId,
    /// 0-based horse index.
    pub horse: usize,
    pub amount: Points,
}

#[derive(Debug)]
struct RaceState {
    phase: Phase,
    horses: Vec<String>,
    /// In placement order.
    bets: Vec<Bet>,
    /// Bumped whenever a race is entered or torn down, so a stale run loop
    /// can tell it was cancelled.
    generation: u64,
}

impl RaceState {
    fn pool(&self) -> Points {
        self.bets.iter().map(|bet| bet.amount).sum()
    }

    fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.horses.clear();
        self.bets.clear();
        self.generation += 1;
    }
}

/// A race that has just left the staging phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceStart {
    pub generation: u64,
    pub horses: Vec<String>,
    pub pool: Points,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payout {
    Won { user: UserId, pool: Points },
    /// Nobody backed the winner; the pool is lost.
    Void { pool: Points },
    NoBets,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceResult {
    /// Horse names in finishing order.
    pub order: Vec<String>,
    pub payout: Payout,
}

pub struct RaceTrack {
    state: Mutex<RaceState>,
}

impl Default for RaceTrack {
    fn default() -> Self {
        Self::new()
    }
}

impl RaceTrack {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RaceState {
                phase: Phase::Idle,
                horses: Vec::new(),
                bets: Vec::new(),
                generation: 0,
            }),
        }
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn horses(&self) -> Vec<String> {
        self.lock().horses.clone()
    }

    pub fn bets(&self) -> Vec<Bet> {
        self.lock().bets.clone()
    }

    /// Stage a new race. Bets on a previously staged race are refunded.
    pub fn enter(&self, ledger: &Ledger, horses: Vec<String>) -> Result<(), GameError> {
        if !(MIN_HORSES..=MAX_HORSES).contains(&horses.len()) {
            return Err(GameError::HorseCount { got: horses.len() });
        }
        let mut state = self.lock();
        if state.phase == Phase::Running {
            return Err(GameError::RaceRunning);
        }
        refund(ledger, &state.bets)?;
        state.reset();
        state.phase = Phase::Staged;
        state.horses = horses;
        info!(horses = state.horses.len(), "race staged");
        Ok(())
    }

    /// Place a bet on the 1-based `horse`; the amount is debited at once.
    pub fn bet(
        &self,
        ledger: &Ledger,
        user: UserId,
        horse: usize,
        amount: Points,
    ) -> Result<Bet, GameError> {
        let mut state = self.lock();
        match state.phase {
            Phase::Idle => return Err(GameError::NoRace),
            Phase::Running => return Err(GameError::RaceRunning),
            Phase::Staged => {}
        }
        if horse == 0 || horse > state.horses.len() {
            return Err(GameError::InvalidHorse(horse));
        }
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount).into());
        }
        if state.bets.iter().any(|bet| bet.user == user) {
            return Err(GameError::AlreadyBet);
        }
        ledger.debit(user, amount)?;
        let bet = Bet {
            user,
            horse: horse - 1,
            amount,
        };
        state.bets.push(bet.clone());
        info!(user, horse, amount = %amount, "race bet placed");
        Ok(bet)
    }

    pub fn begin(&self) -> Result<RaceStart, GameError> {
        let mut state = self.lock();
        match state.phase {
            Phase::Idle => Err(GameError::NoRace),
            Phase::Running => Err(GameError::RaceRunning),
            Phase::Staged => {
                state.phase = Phase::Running;
                Ok(RaceStart {
                    generation: state.generation,
                    horses: state.horses.clone(),
                    pool: state.pool(),
                })
            }
        }
    }

    /// Tear down a staged or running race, refunding every bet.
    pub fn cancel(&self, ledger: &Ledger) -> Result<Vec<Bet>, GameError> {
        let mut state = self.lock();
        if state.phase == Phase::Idle {
            return Err(GameError::NoRace);
        }
        refund(ledger, &state.bets)?;
        let refunded = std::mem::take(&mut state.bets);
        state.reset();
        info!(refunded = refunded.len(), "race cancelled");
        Ok(refunded)
    }

    /// Whether the run started as `generation` is still the live race.
    pub fn is_current(&self, generation: u64) -> bool {
        let state = self.lock();
        state.phase == Phase::Running && state.generation == generation
    }

    /// Settle a finished run and return to idle. `None` when the race was
    /// cancelled or replaced meanwhile.
    pub fn finish(
        &self,
        ledger: &Ledger,
        generation: u64,
        order: &[usize],
    ) -> Result<Option<RaceResult>, GameError> {
        let mut state = self.lock();
        if state.phase != Phase::Running || state.generation != generation {
            return Ok(None);
        }
        let pool = state.pool();
        let payout = match order.first() {
            _ if state.bets.is_empty() => Payout::NoBets,
            Some(winner) => match state.bets.iter().find(|bet| bet.horse == *winner) {
                Some(bet) => Payout::Won {
                    user: bet.user,
                    pool,
                },
                None => Payout::Void { pool },
            },
            None => Payout::Void { pool },
        };
        if let Payout::Won { user, pool } = payout {
            ledger.credit(user, Field::Points, pool)?;
        }
        let order = order
            .iter()
            .filter_map(|idx| state.horses.get(*idx).cloned())
            .collect();
        state.reset();
        info!(?payout, "race settled");
        Ok(Some(RaceResult { order, payout }))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RaceState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn refund(ledger: &Ledger, bets: &[Bet]) -> Result<(), LedgerError> {
    if bets.is_empty() {
        return Ok(());
    }
    ledger.transact(|doc: &mut LedgerDocument| {
        for bet in bets {
            doc.credit(bet.user, Field::Points, bet.amount);
        }
        Ok(())
    })
}

/// Positions of every horse over a run.
#[derive(Debug, Clone)]
pub struct RaceSim {
    positions: Vec<u32>,
    momentum: Vec<f64>,
    order: Vec<usize>,
}

impl RaceSim {
    /// Momentum is drawn once per horse here and kept for the whole run.
    pub fn new(horses: usize, rng: &mut impl Rng) -> Self {
        Self {
            positions: vec![0; horses],
            momentum: (0..horses).map(|_| rng.gen_range(0.8..1.2)).collect(),
            order: Vec::with_capacity(horses),
        }
    }

    /// Advance every unfinished horse by one weighted step.
    pub fn tick(&mut self, rng: &mut impl Rng) {
        for idx in 0..self.positions.len() {
            if self.positions[idx] >= TRACK_LENGTH {
                continue;
            }
            let condition = rng.gen_range(0.9..1.1) * self.momentum[idx];
            let weights = [condition, 2.5, 3.5 * (2.0 - condition), 1.5];
            let step = WeightedIndex::new(weights)
                .map(|dist| STEPS[dist.sample(rng)])
                .unwrap_or(1);
            self.positions[idx] += step;
            if self.positions[idx] >= TRACK_LENGTH {
                self.order.push(idx);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.order.len() == self.positions.len()
    }

    /// Horse indices in the order they crossed the line; ties within a tick
    /// keep horse order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    pub fn render(&self, names: &[String]) -> String {
        let len = TRACK_LENGTH as usize;
        let lines: Vec<String> = names
            .iter()
            .zip(&self.positions)
            .enumerate()
            .map(|(i, (name, pos))| {
                let pos = (*pos as usize).min(len);
                let icon = ICONS[i % ICONS.len()];
                let lane: String = ".".repeat(pos) + icon + &".".repeat(len - pos);
                let lane: String = lane.chars().take(len).collect();
                format!("{}|{lane}| {name}", i + 1)
            })
            .collect();
        format!("```\n{}\n```", lines.join("\n"))
    }
}

pub fn staged_embed(horses: &[String]) -> Embed {
    let list: Vec<String> = horses
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}. {name}", i + 1))
        .collect();
    Embed::new("🏇 The race is ready!").description(format!(
        "Bet with `!bet <number> <points>`\n{}",
        list.join("\n")
    ))
}

pub fn result_embed(result: &RaceResult) -> Embed {
    const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];
    let placings: Vec<String> = result
        .order
        .iter()
        .enumerate()
        .map(|(rank, name)| match MEDALS.get(rank) {
            Some(medal) => format!("{medal} {name}"),
            None => format!("#{} {name}", rank + 1),
        })
        .collect();
    let winner = result.order.first().map(String::as_str).unwrap_or("-");
    let payout = match &result.payout {
        Payout::Won { user, pool } => format!(
            "🎉 Winner: {winner}. {} takes the pool of {pool} points!",
            mention(*user)
        ),
        Payout::Void { .. } => "💸 Nobody backed the winner; the pool is void.".to_string(),
        Payout::NoBets => "😔 The race ran without bets.".to_string(),
    };
    Embed::new("🏁 Race results")
        .description(placings.join("\n"))
        .field("Bets", payout)
}

/// Drive a started race to the finish line, updating the track message each
/// tick, then settle it. Stops quietly if the race is cancelled meanwhile.
pub async fn run<R: Rng>(
    services: Services,
    track: Arc<RaceTrack>,
    channel: ChannelId,
    start: RaceStart,
    mut rng: R,
) {
    let message = services.say(channel, "```🌾 Getting ready to start...```");
    let mut sim = RaceSim::new(start.horses.len(), &mut rng);

    while !sim.is_finished() {
        sleep(TICK).await;
        if !track.is_current(start.generation) {
            return;
        }
        sim.tick(&mut rng);
        services
            .gateway
            .edit_message(message, &sim.render(&start.horses));
    }

    match track.finish(&services.ledger, start.generation, sim.order()) {
        Ok(Some(result)) => {
            services.say(channel, result_embed(&result));
        }
        Ok(None) => {}
        Err(err) => {
            services.say(channel, format!("❌ {err}"));
        }
    }
}
