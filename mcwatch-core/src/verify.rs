//! Account verification.
//!
//! A requester proves control of a player account by disconnecting,
//! connecting and disconnecting again while the bot watches the presence
//! cache once per tick:
//!
//! ```text
//! AwaitingDisconnectedStart --absent--> AwaitingConnect --present--> AwaitingDisconnect --absent--> Verified
//!          |present                            |cap                          |cap
//!          v                                   v                             v
//!     AlreadyOnline                      NeverConnected              NeverDisconnected
//! ```
//!
//! An unreachable snapshot at any tick ends the attempt with `ServerOffline`.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::error::VerifyError;
use crate::ledger::Ledger;
use crate::models::{Identity, PlayerName, Snapshot};
use crate::presence::PresenceCache;
use crate::store::LedgerStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingDisconnectedStart,
    AwaitingConnect,
    AwaitingDisconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Target was online at the first tick
    AlreadyOnline,
    NeverConnected,
    NeverDisconnected,
    ServerOffline,
}

impl FailureReason {
    pub fn message(self) -> &'static str {
        match self {
            FailureReason::AlreadyOnline => {
                "Verification failed. (Make sure to start disconnected!)"
            }
            FailureReason::NeverConnected => "Verification failed. (You never logged on!)",
            FailureReason::NeverDisconnected => {
                "Verification failed. (Make sure to disconnect after a few seconds!)"
            }
            FailureReason::ServerOffline => "The server is offline. :sob:",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Verified,
    Failed(FailureReason),
}

impl Outcome {
    pub fn message(self) -> &'static str {
        match self {
            Outcome::Verified => "Verification successful!",
            Outcome::Failed(reason) => reason.message(),
        }
    }
}

/// State of one verification attempt. Feed it one snapshot per tick.
#[derive(Debug, Clone)]
pub struct Attempt {
    target: PlayerName,
    requester: Identity,
    max_ticks: u32,
    ticks: u32,
    phase: Phase,
}

impl Attempt {
    pub fn new(target: PlayerName, requester: Identity, max_ticks: u32) -> Self {
        Self {
            target,
            requester,
            max_ticks: max_ticks.max(1),
            ticks: 0,
            phase: Phase::AwaitingDisconnectedStart,
        }
    }

    /// Advance by one tick. Returns the outcome once the attempt is over.
    pub fn observe(&mut self, snapshot: &Snapshot) -> Option<Outcome> {
        self.ticks += 1;

        let Some(status) = snapshot.status() else {
            return Some(Outcome::Failed(FailureReason::ServerOffline));
        };
        let present = status.is_present(&self.target);

        match (self.phase, present) {
            (Phase::AwaitingDisconnectedStart, true) => {
                return Some(Outcome::Failed(FailureReason::AlreadyOnline));
            }
            (Phase::AwaitingDisconnectedStart, false) => self.phase = Phase::AwaitingConnect,
            (Phase::AwaitingConnect, true) => self.phase = Phase::AwaitingDisconnect,
            (Phase::AwaitingDisconnect, false) => return Some(Outcome::Verified),
            (Phase::AwaitingConnect, false) | (Phase::AwaitingDisconnect, true) => {}
        }

        if self.ticks >= self.max_ticks {
            let reason = match self.phase {
                Phase::AwaitingDisconnect => FailureReason::NeverDisconnected,
                Phase::AwaitingConnect | Phase::AwaitingDisconnectedStart => {
                    FailureReason::NeverConnected
                }
            };
            return Some(Outcome::Failed(reason));
        }
        None
    }

    pub fn target(&self) -> &PlayerName {
        &self.target
    }

    pub fn requester(&self) -> &Identity {
        &self.requester
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn started_offline(&self) -> bool {
        self.phase != Phase::AwaitingDisconnectedStart
    }

    pub fn observed_connect(&self) -> bool {
        self.phase == Phase::AwaitingDisconnect
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VerifierConfig {
    pub tick: Duration,
    pub max_ticks: u32,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            max_ticks: 20,
        }
    }
}

/// Starts verification attempts and tracks which targets have one running.
pub struct Verifier<S> {
    cache: PresenceCache,
    ledger: Arc<Ledger<S>>,
    in_flight: Arc<scc::HashSet<PlayerName>>,
    config: VerifierConfig,
}

impl<S> Clone for Verifier<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            ledger: self.ledger.clone(),
            in_flight: self.in_flight.clone(),
            config: self.config,
        }
    }
}

impl<S: LedgerStore> Verifier<S> {
    pub fn new(cache: PresenceCache, ledger: Arc<Ledger<S>>, config: VerifierConfig) -> Self {
        Self {
            cache,
            ledger,
            in_flight: Arc::new(scc::HashSet::new()),
            config,
        }
    }

    /// Reserve an attempt for `target`. Refuses players never seen on the
    /// server, players already linked, and targets with an attempt running.
    ///
    /// The reservation lasts until the returned [`PendingVerification`] is
    /// run to completion, cancelled or dropped.
    pub async fn begin(
        &self,
        target: &str,
        requester: Identity,
    ) -> Result<PendingVerification<S>, VerifyError> {
        let entry = self
            .ledger
            .entry(target)
            .await
            .ok_or_else(|| VerifyError::UnknownPlayer(target.to_string()))?;
        if entry.is_linked() {
            return Err(VerifyError::AlreadyLinked(target.to_string()));
        }

        self.in_flight
            .insert_async(target.to_string())
            .await
            .map_err(|_| VerifyError::AlreadyInProgress(target.to_string()))?;
        let reservation = Reservation {
            in_flight: self.in_flight.clone(),
            target: target.to_string(),
        };

        Ok(PendingVerification {
            verifier: self.clone(),
            attempt: Attempt::new(target.to_string(), requester, self.config.max_ticks),
            reservation,
        })
    }

    pub async fn is_in_flight(&self, target: &str) -> bool {
        self.in_flight.contains_async(target).await
    }
}

/// Holds a target in the in-flight set until dropped.
struct Reservation {
    in_flight: Arc<scc::HashSet<PlayerName>>,
    target: PlayerName,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let _ = self.in_flight.remove_sync(&self.target);
    }
}

/// A reserved attempt that has not started sampling yet. Dropping it, for
/// example when the command waiting on the confirmation is cancelled,
/// releases the target.
pub struct PendingVerification<S> {
    verifier: Verifier<S>,
    attempt: Attempt,
    reservation: Reservation,
}

impl<S: LedgerStore> PendingVerification<S> {
    pub fn target(&self) -> &PlayerName {
        self.attempt.target()
    }

    /// Sample the presence cache once per tick until the attempt ends. On
    /// success the requester is linked and the ledger saved.
    pub async fn run(self) -> Outcome {
        let PendingVerification {
            verifier,
            mut attempt,
            reservation,
        } = self;
        info!(
            player = %attempt.target(),
            requester = %attempt.requester().name,
            "verification started"
        );

        let mut ticker = tokio::time::interval(verifier.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let outcome = loop {
            ticker.tick().await;
            let snapshot = verifier.cache.current();
            if let Some(outcome) = attempt.observe(&snapshot) {
                break outcome;
            }
        };

        if outcome == Outcome::Verified {
            if let Err(e) = verifier
                .ledger
                .link(attempt.target(), attempt.requester())
                .await
            {
                error!(error = %e, "verified player vanished from ledger");
            }
        }
        drop(reservation);

        info!(
            player = %attempt.target(),
            requester = %attempt.requester().name,
            ticks = attempt.ticks(),
            outcome = ?outcome,
            "verification finished"
        );
        outcome
    }

    /// Release the reservation without sampling.
    pub fn cancel(self) {
        info!(player = %self.attempt.target(), "verification cancelled before start");
    }
}
