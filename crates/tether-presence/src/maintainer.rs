//! The presence maintainer: everything the bot does while Active.

use rand::Rng;
use tether_protocol::{BlockPos, ControlState, Goal, Position};
use tether_transport::{Connection, TransportError};
use tracing::{debug, info, warn};

use crate::{PresenceConfig, Ticker};

/// A periodic action that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceAction {
    /// Send the next line of the repeating message list.
    SendMessage,
    /// Pick a new roam target.
    Roam,
}

/// Keeps an active session visibly busy.
///
/// The maintainer owns its timers but not the connection: the controller
/// passes the connection into [`start`](Self::start),
/// [`fire`](Self::fire), and [`stop`](Self::stop). Timers only report that
/// an action is due ([`next_action`](Self::next_action)); the write itself
/// happens in `fire`, which checks liveness at that moment.
#[derive(Debug)]
pub struct PresenceMaintainer {
    config: PresenceConfig,
    message_ticker: Ticker,
    roam_ticker: Ticker,
    next_line: usize,
    held: Vec<ControlState>,
    running: bool,
}

impl PresenceMaintainer {
    pub fn new(config: PresenceConfig) -> Self {
        let message_ticker = Ticker::new(config.messages.interval());
        let roam_ticker = Ticker::new(config.roam.interval());
        Self {
            config,
            message_ticker,
            roam_ticker,
            next_line: 0,
            held: Vec::new(),
            running: false,
        }
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Controls currently held down.
    pub fn held_controls(&self) -> &[ControlState] {
        &self.held
    }

    /// Begins presence on a freshly active connection.
    ///
    /// One-shot messages go out immediately, the fixed position goal (if
    /// any) is set, anti-idle controls are pressed, and the periodic timers
    /// are started. Calling `start` while running restarts from scratch.
    pub fn start<C: Connection>(&mut self, conn: &C) {
        if self.running {
            self.stop(conn);
        }
        self.running = true;
        self.next_line = 0;

        let messages = &self.config.messages;
        if messages.enabled && !messages.lines.is_empty() {
            if messages.repeat {
                self.message_ticker.start();
            } else {
                for line in &messages.lines {
                    guarded(conn, "chat", || conn.send_chat(line));
                }
            }
        }

        if self.config.position.enabled {
            let goal = Goal::Block {
                target: self.config.position.target(),
            };
            if guarded(conn, "goal", || conn.set_goal(goal)) {
                info!(%goal, "walking to fixed position");
            }
        } else if self.config.roam.enabled {
            self.roam_ticker.start();
        }

        if self.config.anti_idle.enabled {
            self.press(conn, ControlState::Jump);
            if self.config.anti_idle.sneak {
                self.press(conn, ControlState::Sneak);
            }
        }

        debug!(
            conn = %conn.id(),
            messages = self.message_ticker.is_running(),
            roam = self.roam_ticker.is_running(),
            held = self.held.len(),
            "presence started"
        );
    }

    /// Waits for the next periodic action. Pends forever when stopped or
    /// when neither timer is configured.
    pub async fn next_action(&mut self) -> PresenceAction {
        tokio::select! {
            _ = self.message_ticker.wait_for_tick() => PresenceAction::SendMessage,
            _ = self.roam_ticker.wait_for_tick() => PresenceAction::Roam,
        }
    }

    /// Performs a due action. Returns `true` if something was written.
    ///
    /// Does nothing once the maintainer is stopped or the connection is no
    /// longer alive, however the action got here.
    pub fn fire<C: Connection>(&mut self, action: PresenceAction, conn: &C) -> bool {
        if !self.running {
            debug!(?action, "presence stopped; dropping action");
            return false;
        }
        match action {
            PresenceAction::SendMessage => self.send_next_line(conn),
            PresenceAction::Roam => self.roam(conn),
        }
    }

    /// Cancels both timers and releases held controls.
    ///
    /// Must run before the connection is closed. Releasing controls on an
    /// already dead connection is skipped; the bookkeeping is cleared
    /// either way.
    pub fn stop<C: Connection>(&mut self, conn: &C) {
        self.message_ticker.stop();
        self.roam_ticker.stop();
        for control in std::mem::take(&mut self.held) {
            guarded(conn, "release control", || {
                conn.set_control_state(control, false)
            });
        }
        if self.running {
            debug!(conn = %conn.id(), "presence stopped");
        }
        self.running = false;
    }

    fn send_next_line<C: Connection>(&mut self, conn: &C) -> bool {
        let lines = &self.config.messages.lines;
        let Some(line) = lines.get(self.next_line % lines.len().max(1)) else {
            return false;
        };
        let sent = guarded(conn, "chat", || conn.send_chat(line));
        if sent {
            debug!(index = self.next_line, %line, "sent presence message");
            self.next_line = (self.next_line + 1) % lines.len();
        }
        sent
    }

    fn roam<C: Connection>(&mut self, conn: &C) -> bool {
        let Some(position) = conn.position() else {
            debug!("no position reported yet; skipping roam");
            return false;
        };
        let target = roam_target(position, self.config.roam.radius, &mut rand::rng());
        let goal = Goal::Near { target, radius: 1 };
        let sent = guarded(conn, "goal", || conn.set_goal(goal));
        if sent {
            debug!(from = %position, %target, "roaming");
        }
        sent
    }

    fn press<C: Connection>(&mut self, conn: &C, control: ControlState) {
        if guarded(conn, "press control", || conn.set_control_state(control, true)) {
            self.held.push(control);
        }
    }
}

/// Runs a write only if the connection is alive right now.
fn guarded<C: Connection>(
    conn: &C,
    what: &'static str,
    write: impl FnOnce() -> Result<(), TransportError>,
) -> bool {
    if !conn.is_alive() {
        debug!(conn = %conn.id(), what, "connection not alive; write skipped");
        return false;
    }
    match write() {
        Ok(()) => true,
        Err(e) => {
            warn!(conn = %conn.id(), what, error = %e, "presence write failed");
            false
        }
    }
}

/// A random block within `radius` of `position` on both horizontal axes,
/// at the current (rounded) height.
pub fn roam_target(position: Position, radius: u32, rng: &mut impl Rng) -> BlockPos {
    let origin = position.to_block();
    let r = i64::from(radius);
    if r == 0 {
        return origin;
    }
    BlockPos::new(
        origin.x + rng.random_range(-r..r),
        origin.y,
        origin.z + rng.random_range(-r..r),
    )
}
