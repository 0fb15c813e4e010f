//! Voice presence accrual.
//!
//! Tracks one session per user in a voice channel and turns it into points
//! when the user leaves or switches channels. Sessions live in memory only and
//! are lost on restart.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::Points;
use crate::model::{PresenceChange, UserId};

/// Per-minute accrual rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualRates {
    pub mic_on: Points,
    pub mic_off: Points,
}

impl AccrualRates {
    fn rate(&self, mic_on: bool) -> f64 {
        let rate = if mic_on { self.mic_on } else { self.mic_off };
        rate.value() as f64
    }
}

/// Samples of one continuous channel occupancy.
#[derive(Debug, Clone)]
pub struct VoiceSession {
    join_time: DateTime<Utc>,
    history: Vec<(DateTime<Utc>, bool)>,
}

impl VoiceSession {
    pub fn start(at: DateTime<Utc>, mic_on: bool) -> Self {
        Self {
            join_time: at,
            history: vec![(at, mic_on)],
        }
    }

    pub fn toggle(&mut self, at: DateTime<Utc>, mic_on: bool) {
        self.history.push((at, mic_on));
    }

    /// Points earned by this session when it ends at `leave_time`.
    ///
    /// Each interval between samples is weighted by the mic state at its start;
    /// samples older than the join time are discarded and the total is
    /// truncated.
    pub fn settle(mut self, leave_time: DateTime<Utc>, rates: AccrualRates) -> Points {
        let last_mic = self.history.last().map(|(_, mic)| *mic).unwrap_or(false);
        self.history.push((leave_time, last_mic));
        self.history.retain(|(at, _)| *at >= self.join_time);

        let total: f64 = self
            .history
            .windows(2)
            .map(|pair| {
                let (t1, mic_on) = pair[0];
                let (t2, _) = pair[1];
                let minutes = (t2 - t1).num_milliseconds() as f64 / 60_000.0;
                minutes * rates.rate(mic_on)
            })
            .sum();
        Points::new(total.max(0.0).floor() as i64)
    }
}

/// Classification of a presence change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Join,
    Toggle,
    Move,
    Leave,
    /// Neither before nor after in a channel.
    Idle,
}

impl Transition {
    pub fn of(change: &PresenceChange) -> Self {
        match (change.previous, change.current) {
            (None, Some(_)) => Transition::Join,
            (Some(prev), Some(curr)) if prev == curr => Transition::Toggle,
            (Some(_), Some(_)) => Transition::Move,
            (Some(_), None) => Transition::Leave,
            (None, None) => Transition::Idle,
        }
    }
}

/// Points produced by a settled session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accrual {
    pub user: UserId,
    pub earned: Points,
}

/// Registry of open voice sessions.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    sessions: HashMap<UserId, VoiceSession>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tracking(&self, user: UserId) -> bool {
        self.sessions.contains_key(&user)
    }

    /// Apply a presence change; returns the accrual when a session ended
    /// with a positive amount.
    pub fn apply(&mut self, change: &PresenceChange, rates: AccrualRates) -> Option<Accrual> {
        let mic_on = !change.muted;
        let transition = Transition::of(change);
        debug!(user = change.user, ?transition, mic_on, "voice presence");

        match transition {
            Transition::Join => {
                self.sessions
                    .insert(change.user, VoiceSession::start(change.at, mic_on));
                None
            }
            Transition::Toggle => {
                // No session means the join was missed (e.g. restart); stay idle.
                if let Some(session) = self.sessions.get_mut(&change.user) {
                    session.toggle(change.at, mic_on);
                }
                None
            }
            Transition::Move => {
                let accrual = self.settle(change.user, change.at, rates);
                self.sessions
                    .insert(change.user, VoiceSession::start(change.at, mic_on));
                accrual
            }
            Transition::Leave => self.settle(change.user, change.at, rates),
            Transition::Idle => None,
        }
    }

    /// End the user's session. A user without a session settles to nothing.
    fn settle(
        &mut self,
        user: UserId,
        leave_time: DateTime<Utc>,
        rates: AccrualRates,
    ) -> Option<Accrual> {
        let session = self.sessions.remove(&user)?;
        let earned = session.settle(leave_time, rates);
        earned.is_positive().then_some(Accrual { user, earned })
    }
}
