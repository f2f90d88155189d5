//! The session lifecycle state machine.
//!
//! [`Lifecycle`] is pure bookkeeping: it owns the [`SessionState`], the
//! identity sequence, the reconnect counter, and the spawn permission, and
//! it decides what happens after a session ends. It never touches a
//! connection or a timer. The controller performs the I/O and reports
//! each step here, which keeps every transition in one place and lets the
//! rules be tested without a game server.
//!
//! # Identity conflicts
//!
//! When a session ends because our name is already logged in, the next
//! identity is selected and spawning is held back until the occupancy gate
//! has seen the server with somebody on it and then empty again. That
//! avoids dropping a second bot onto a server whose first bot is still
//! around.

use std::time::Duration;

use crate::{
    BackoffPolicy, Identity, IdentityRotator, ReconnectState, SessionEnd, SessionError,
    SessionState, is_identity_conflict,
};

/// Whether the controller may open a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnGate {
    /// Spawning follows the occupancy gate.
    Armed,
    /// An identity conflict happened. Waiting to see the server occupied.
    AwaitingOccupied,
    /// Seen occupied; waiting for it to empty.
    AwaitingEmpty,
}

/// What the controller should do once teardown has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    /// Sleep for the given delay, then go idle.
    Retry(Duration),
    /// Go idle but do not spawn until the occupancy cycle completes.
    Suppressed,
    /// Reconnecting is disabled; stay idle for good.
    Stopped,
}

/// The controller's state machine.
#[derive(Debug)]
pub struct Lifecycle {
    state: SessionState,
    rotator: IdentityRotator,
    reconnect: ReconnectState,
    spawn: SpawnGate,
    backoff: BackoffPolicy,
    reconnect_enabled: bool,
}

impl Lifecycle {
    pub fn new(base_username: impl Into<String>, backoff: BackoffPolicy) -> Self {
        Self {
            state: SessionState::Idle,
            rotator: IdentityRotator::new(base_username),
            reconnect: ReconnectState::default(),
            spawn: SpawnGate::Armed,
            backoff,
            reconnect_enabled: true,
        }
    }

    /// With reconnect disabled, the first session end parks the machine
    /// in `Idle` permanently.
    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect_enabled = enabled;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The identity the next (or current) session uses.
    pub fn identity(&self) -> Identity {
        self.rotator.current()
    }

    pub fn reconnect(&self) -> &ReconnectState {
        &self.reconnect
    }

    pub fn spawn_gate(&self) -> SpawnGate {
        self.spawn
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect_enabled
    }

    /// Whether an idle controller is allowed to connect, given the
    /// latest occupancy reading.
    pub fn may_spawn(&self, authorized: bool) -> bool {
        self.state == SessionState::Idle && self.spawn == SpawnGate::Armed && authorized
    }

    /// Whether the machine has parked for good (reconnect disabled and a
    /// session already ended).
    pub fn is_parked(&self) -> bool {
        !self.reconnect_enabled && self.state == SessionState::Idle && self.reconnect.last_reason.is_some()
    }

    // ---- Transitions ----

    /// `Idle → Connecting`. Returns the identity to connect as.
    pub fn begin_connect(&mut self, authorized: bool) -> Result<Identity, SessionError> {
        match self.state {
            SessionState::Idle => {}
            s if s.has_connection() || s == SessionState::Ending => {
                return Err(SessionError::AlreadyActive(s));
            }
            s => {
                return Err(SessionError::InvalidTransition {
                    from: s,
                    event: "connect",
                });
            }
        }
        if self.is_parked() || !self.may_spawn(authorized) {
            return Err(SessionError::NotAuthorized);
        }
        self.transition(SessionState::Connecting);
        Ok(self.identity())
    }

    /// `Connecting → Authenticating`: the player spawned.
    pub fn on_ready(&mut self) -> Result<(), SessionError> {
        self.expect(SessionState::Connecting, "finish connecting")?;
        self.transition(SessionState::Authenticating);
        Ok(())
    }

    /// `Authenticating → Active`. Resets the attempt counter.
    pub fn on_authenticated(&mut self) -> Result<(), SessionError> {
        self.expect(SessionState::Authenticating, "activate")?;
        self.reconnect.attempt = 0;
        self.transition(SessionState::Active);
        Ok(())
    }

    /// `Connecting | Authenticating | Active → Ending`.
    ///
    /// Records the reason, and on an identity conflict rotates to the next
    /// identity and holds spawning.
    pub fn begin_ending(&mut self, end: &SessionEnd) -> Result<(), SessionError> {
        if !self.state.has_connection() {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                event: "end session",
            });
        }

        let reason = end.reason();
        tracing::info!(identity = %self.identity(), %end, "session ending");
        self.reconnect.last_reason = Some(reason.to_string());

        if is_identity_conflict(reason) {
            let previous = self.identity();
            let next = self.rotator.next();
            self.spawn = SpawnGate::AwaitingOccupied;
            tracing::warn!(
                %previous,
                %next,
                "identity already logged in; rotating and holding spawn until the server empties"
            );
        }

        self.transition(SessionState::Ending);
        Ok(())
    }

    /// `Ending → Backoff | Idle`, once the connection is closed.
    pub fn finish_ending(&mut self) -> Result<EndOutcome, SessionError> {
        self.expect(SessionState::Ending, "finish ending")?;

        if self.spawn != SpawnGate::Armed {
            self.transition(SessionState::Idle);
            return Ok(EndOutcome::Suppressed);
        }
        if !self.reconnect_enabled {
            tracing::info!("reconnect disabled; staying idle");
            self.transition(SessionState::Idle);
            return Ok(EndOutcome::Stopped);
        }

        self.reconnect.attempt = self.reconnect.attempt.saturating_add(1);
        let reason = self.reconnect.last_reason.as_deref().unwrap_or_default();
        let delay = self.backoff.delay(self.reconnect.attempt, reason);
        self.reconnect.last_delay = Some(delay);
        tracing::info!(
            attempt = self.reconnect.attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );
        self.transition(SessionState::Backoff);
        Ok(EndOutcome::Retry(delay))
    }

    /// `Backoff → Idle`: the reconnect delay has elapsed.
    pub fn on_backoff_elapsed(&mut self) -> Result<(), SessionError> {
        self.expect(SessionState::Backoff, "leave backoff")?;
        self.transition(SessionState::Idle);
        Ok(())
    }

    /// Feeds an occupancy reading (`true` = empty, spawn authorized) into
    /// the held-spawn cycle. No effect while armed.
    pub fn observe_occupancy(&mut self, authorized: bool) {
        self.spawn = match (self.spawn, authorized) {
            (SpawnGate::AwaitingOccupied, false) => {
                tracing::info!("server occupied; waiting for it to empty");
                SpawnGate::AwaitingEmpty
            }
            (SpawnGate::AwaitingEmpty, true) => {
                tracing::info!(identity = %self.identity(), "server empty again; spawn re-armed");
                SpawnGate::Armed
            }
            (gate, _) => gate,
        };
    }

    fn expect(&self, state: SessionState, event: &'static str) -> Result<(), SessionError> {
        if self.state == state {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.state,
                event,
            })
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(self.state.can_transition_to(next));
        tracing::debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle() -> Lifecycle {
        Lifecycle::new(
            "Bot",
            BackoffPolicy {
                max_jitter: Duration::ZERO,
                ..BackoffPolicy::default()
            },
        )
    }

    /// Drives Idle → Active.
    fn activate(lc: &mut Lifecycle) {
        lc.begin_connect(true).unwrap();
        lc.on_ready().unwrap();
        lc.on_authenticated().unwrap();
    }

    fn end(lc: &mut Lifecycle, end: SessionEnd) -> EndOutcome {
        lc.begin_ending(&end).unwrap();
        lc.finish_ending().unwrap()
    }

    #[test]
    fn test_happy_path_reaches_active() {
        let mut lc = lifecycle();

        let identity = lc.begin_connect(true).unwrap();
        assert_eq!(identity.username(), "Bot");
        assert_eq!(lc.state(), SessionState::Connecting);
        lc.on_ready().unwrap();
        assert_eq!(lc.state(), SessionState::Authenticating);
        lc.on_authenticated().unwrap();
        assert_eq!(lc.state(), SessionState::Active);
    }

    #[test]
    fn test_begin_connect_unauthorized_stays_idle() {
        let mut lc = lifecycle();

        assert!(matches!(lc.begin_connect(false), Err(SessionError::NotAuthorized)));
        assert_eq!(lc.state(), SessionState::Idle);
    }

    #[test]
    fn test_begin_connect_while_active_is_refused() {
        let mut lc = lifecycle();
        activate(&mut lc);

        assert!(matches!(
            lc.begin_connect(true),
            Err(SessionError::AlreadyActive(SessionState::Active))
        ));
    }

    #[test]
    fn test_begin_connect_during_backoff_is_invalid() {
        let mut lc = lifecycle();
        activate(&mut lc);
        end(&mut lc, SessionEnd::Ended("socketClosed".into()));

        assert!(matches!(
            lc.begin_connect(true),
            Err(SessionError::InvalidTransition {
                from: SessionState::Backoff,
                ..
            })
        ));
    }

    #[test]
    fn test_ordinary_end_schedules_exponential_backoff() {
        let mut lc = lifecycle();

        lc.begin_connect(true).unwrap();
        let first = end(&mut lc, SessionEnd::Failed("connection refused".into()));
        assert_eq!(first, EndOutcome::Retry(Duration::from_secs(5)));
        assert_eq!(lc.state(), SessionState::Backoff);

        lc.on_backoff_elapsed().unwrap();
        lc.begin_connect(true).unwrap();
        let second = end(&mut lc, SessionEnd::Failed("connection refused".into()));
        assert_eq!(second, EndOutcome::Retry(Duration::from_secs(10)));
        assert_eq!(lc.reconnect().attempt, 2);
        assert_eq!(lc.reconnect().last_delay, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_reaching_active_resets_attempt_counter() {
        let mut lc = lifecycle();
        lc.begin_connect(true).unwrap();
        end(&mut lc, SessionEnd::Failed("x".into()));
        lc.on_backoff_elapsed().unwrap();
        assert_eq!(lc.reconnect().attempt, 1);

        activate(&mut lc);
        assert_eq!(lc.reconnect().attempt, 0);

        let outcome = end(&mut lc, SessionEnd::Ended("socketClosed".into()));
        assert_eq!(outcome, EndOutcome::Retry(Duration::from_secs(5)));
    }

    #[test]
    fn test_throttled_end_uses_floor_and_still_counts() {
        let mut lc = lifecycle();
        activate(&mut lc);

        let outcome = end(&mut lc, SessionEnd::Kicked("Connection throttled! Please wait".into()));

        assert_eq!(outcome, EndOutcome::Retry(Duration::from_secs(60)));
        assert_eq!(lc.reconnect().attempt, 1);
    }

    #[test]
    fn test_identity_conflict_rotates_and_suppresses() {
        let mut lc = lifecycle();
        activate(&mut lc);

        let outcome = end(&mut lc, SessionEnd::Kicked("duplicate_login".into()));

        assert_eq!(outcome, EndOutcome::Suppressed);
        assert_eq!(lc.state(), SessionState::Idle);
        assert_eq!(lc.identity().username(), "Bot1");
        assert_eq!(lc.reconnect().attempt, 0, "no retry was scheduled");
        assert!(!lc.may_spawn(true));
        assert!(matches!(lc.begin_connect(true), Err(SessionError::NotAuthorized)));
    }

    #[test]
    fn test_conflict_spawn_rearms_only_after_full_occupancy_cycle() {
        let mut lc = lifecycle();
        activate(&mut lc);
        end(&mut lc, SessionEnd::Ended("You logged in from another location".into()));

        lc.observe_occupancy(true); // still empty: not enough
        assert_eq!(lc.spawn_gate(), SpawnGate::AwaitingOccupied);
        lc.observe_occupancy(false);
        assert_eq!(lc.spawn_gate(), SpawnGate::AwaitingEmpty);
        lc.observe_occupancy(false);
        assert!(!lc.may_spawn(false));
        lc.observe_occupancy(true);
        assert_eq!(lc.spawn_gate(), SpawnGate::Armed);

        assert_eq!(lc.begin_connect(true).unwrap().username(), "Bot1");
    }

    #[test]
    fn test_each_conflict_advances_identity() {
        let mut lc = lifecycle();
        for expected in ["Bot1", "Bot2", "Bot3"] {
            activate(&mut lc);
            end(&mut lc, SessionEnd::Kicked("duplicate_login".into()));
            lc.observe_occupancy(false);
            lc.observe_occupancy(true);
            assert_eq!(lc.identity().username(), expected);
        }
    }

    #[test]
    fn test_reconnect_disabled_parks_after_first_end() {
        let mut lc = lifecycle().with_reconnect(false);
        activate(&mut lc);

        let outcome = end(&mut lc, SessionEnd::Ended("socketClosed".into()));

        assert_eq!(outcome, EndOutcome::Stopped);
        assert!(lc.is_parked());
        assert!(matches!(lc.begin_connect(true), Err(SessionError::NotAuthorized)));
    }

    #[test]
    fn test_finish_ending_outside_ending_is_invalid() {
        let mut lc = lifecycle();
        assert!(matches!(
            lc.finish_ending(),
            Err(SessionError::InvalidTransition {
                from: SessionState::Idle,
                ..
            })
        ));
    }

    #[test]
    fn test_begin_ending_twice_is_invalid() {
        let mut lc = lifecycle();
        activate(&mut lc);
        lc.begin_ending(&SessionEnd::Ended("a".into())).unwrap();

        assert!(lc.begin_ending(&SessionEnd::Ended("b".into())).is_err());
        assert_eq!(lc.reconnect().last_reason.as_deref(), Some("a"));
    }
}
