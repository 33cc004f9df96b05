//! Connection state machine with pluggable backoff and clock.
//!
//! ```text
//!            begin_connect            connected
//!   Closed ───────────────▶ Connecting ─────────▶ Open
//!     ▲                        │                   │
//!     │                        │ disconnected      │ disconnected
//!     │                        ▼                   ▼
//!     │                 ReconnectScheduled ◀─── Closed
//!     │                        │
//!     └─── (retry budget spent) ──▶ Failed
//! ```

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Connection state of the realtime channel
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    ReconnectScheduled { attempt: u32, at: DateTime<Utc> },
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::ReconnectScheduled { .. }
        )
    }
}

/// Decides how long to wait before a reconnect attempt.
pub trait BackoffPolicy: Send + Sync {
    /// Delay in milliseconds before attempt number `attempt` (0-based), or
    /// `None` when no further attempts should be made.
    fn delay_for_attempt(&self, attempt: u32) -> Option<u32>;
}

/// Exponential backoff settings
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = infinite)
    pub max_attempts: u32,
    pub initial_delay_ms: u32,
    pub max_delay_ms: u32,
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.5,
        }
    }
}

impl BackoffPolicy for ReconnectConfig {
    fn delay_for_attempt(&self, attempt: u32) -> Option<u32> {
        if self.max_attempts > 0 && attempt >= self.max_attempts {
            return None;
        }
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(exponent);
        Some((delay.min(self.max_delay_ms as f32)) as u32)
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for deterministic tests and simulations.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += Duration::milliseconds(ms);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Tracks the connection lifecycle and schedules reconnect attempts.
pub struct Reconnector<B = ReconnectConfig, C = SystemClock> {
    policy: B,
    clock: C,
    state: ConnectionState,
    /// Failed attempts since the last successful open.
    attempt: u32,
}

impl Reconnector {
    pub fn new(config: ReconnectConfig) -> Self {
        Self::with_parts(config, SystemClock)
    }
}

impl<B: BackoffPolicy, C: Clock> Reconnector<B, C> {
    pub fn with_parts(policy: B, clock: C) -> Self {
        Self {
            policy,
            clock,
            state: ConnectionState::Closed,
            attempt: 0,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn begin_connect(&mut self) -> ConnectionState {
        self.state = ConnectionState::Connecting;
        self.state.clone()
    }

    pub fn connected(&mut self) -> ConnectionState {
        self.attempt = 0;
        self.state = ConnectionState::Open;
        self.state.clone()
    }

    /// Record a lost or failed connection and schedule the next attempt.
    pub fn disconnected(&mut self) -> ConnectionState {
        self.state = ConnectionState::Closed;
        self.state = match self.policy.delay_for_attempt(self.attempt) {
            Some(delay_ms) => {
                self.attempt += 1;
                ConnectionState::ReconnectScheduled {
                    attempt: self.attempt,
                    at: self.clock.now() + Duration::milliseconds(delay_ms as i64),
                }
            }
            None => ConnectionState::Failed {
                reason: format!("Gave up after {} reconnect attempts", self.attempt),
            },
        };
        self.state.clone()
    }

    /// Whether a scheduled reconnect may start now.
    pub fn is_due(&self) -> bool {
        match &self.state {
            ConnectionState::ReconnectScheduled { at, .. } => self.clock.now() >= *at,
            ConnectionState::Closed => true,
            _ => false,
        }
    }

    /// Milliseconds left until the scheduled reconnect; 0 when due or when
    /// nothing is scheduled.
    pub fn remaining_ms(&self) -> u64 {
        match &self.state {
            ConnectionState::ReconnectScheduled { at, .. } => {
                (*at - self.clock.now()).num_milliseconds().max(0) as u64
            }
            _ => 0,
        }
    }

    pub fn has_failed(&self) -> bool {
        matches!(self.state, ConnectionState::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn config(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            max_attempts,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let cfg = config(0);
        let delays: Vec<_> = (0..6).map(|a| cfg.delay_for_attempt(a)).collect();
        assert_eq!(
            delays,
            vec![Some(100), Some(200), Some(400), Some(800), Some(1000), Some(1000)]
        );
    }

    #[test]
    fn backoff_stops_at_max_attempts() {
        let cfg = config(2);
        assert_eq!(cfg.delay_for_attempt(1), Some(200));
        assert_eq!(cfg.delay_for_attempt(2), None);
    }

    #[test]
    fn disconnect_schedules_reconnect_on_injected_clock() {
        let clock = ManualClock::new(start());
        let mut r = Reconnector::with_parts(config(0), clock.clone());

        r.begin_connect();
        r.connected();
        assert!(r.state().is_open());

        let state = r.disconnected();
        assert_eq!(
            state,
            ConnectionState::ReconnectScheduled {
                attempt: 1,
                at: start() + Duration::milliseconds(100),
            }
        );
        assert!(!r.is_due());
        assert_eq!(r.remaining_ms(), 100);

        clock.advance_ms(60);
        assert_eq!(r.remaining_ms(), 40);
        clock.advance_ms(40);
        assert!(r.is_due());
        assert_eq!(r.remaining_ms(), 0);
    }

    #[test]
    fn failed_attempts_back_off_until_budget_is_spent() {
        let clock = ManualClock::new(start());
        let mut r = Reconnector::with_parts(config(2), clock.clone());

        r.begin_connect();
        assert!(matches!(
            r.disconnected(),
            ConnectionState::ReconnectScheduled { attempt: 1, .. }
        ));
        clock.advance_ms(100);
        r.begin_connect();
        let second = r.disconnected();
        assert_eq!(
            second,
            ConnectionState::ReconnectScheduled {
                attempt: 2,
                at: start() + Duration::milliseconds(300),
            }
        );
        r.begin_connect();
        assert!(matches!(r.disconnected(), ConnectionState::Failed { .. }));
        assert!(r.has_failed());
        assert!(!r.is_due());
    }

    #[test]
    fn successful_open_resets_attempts() {
        let clock = ManualClock::new(start());
        let mut r = Reconnector::with_parts(config(0), clock);

        r.begin_connect();
        r.disconnected();
        r.begin_connect();
        r.disconnected();
        assert_eq!(r.attempt(), 2);

        r.begin_connect();
        r.connected();
        assert_eq!(r.attempt(), 0);
        assert!(matches!(
            r.disconnected(),
            ConnectionState::ReconnectScheduled { attempt: 1, .. }
        ));
    }
}
