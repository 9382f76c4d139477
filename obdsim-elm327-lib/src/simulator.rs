//! One emulated adapter: dispatcher plus the vehicle it reports on

use log::debug;
use obdsim_telemetry::{TelemetryEngine, VehicleTelemetryState, TICK_INTERVAL};
use rand::rngs::StdRng;
use rand::Rng;
use std::time::{Duration, Instant};

use crate::command::CommandRequest;
use crate::config::AdapterConfig;
use crate::dispatcher::{ProtocolDispatcher, SessionEvent};

/// Upper bound on ticks replayed by a single [`Simulator::poll`]
pub const MAX_CATCH_UP_TICKS: u32 = 50;

/// The adapter persona shared by every transport.
///
/// Not internally synchronized: when several transports feed commands in,
/// the integrator wraps it in a mutex so commands run one at a time.
pub struct Simulator<R = StdRng> {
    dispatcher: ProtocolDispatcher,
    telemetry: VehicleTelemetryState,
    engine: TelemetryEngine<R>,
    last_tick: Instant,
}

impl Simulator<StdRng> {
    /// Simulator with a randomized idle vehicle and the default `ATZ` delay.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(ProtocolDispatcher::new(), TelemetryEngine::new())
    }
}

impl Default for Simulator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Simulator<R> {
    pub fn with_parts(dispatcher: ProtocolDispatcher, mut engine: TelemetryEngine<R>) -> Self {
        let telemetry = engine.initial_state();
        debug!("Initial telemetry: {telemetry:?}");
        Self {
            dispatcher,
            telemetry,
            engine,
            last_tick: Instant::now(),
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        self.dispatcher.config()
    }

    pub fn dispatcher(&self) -> &ProtocolDispatcher {
        &self.dispatcher
    }

    /// Current telemetry snapshot
    pub fn telemetry(&self) -> &VehicleTelemetryState {
        &self.telemetry
    }

    /// Direct access to the vehicle state, for scripted scenarios
    pub fn telemetry_mut(&mut self) -> &mut VehicleTelemetryState {
        &mut self.telemetry
    }

    /// Advance telemetry for every whole tick interval elapsed since the last
    /// tick, up to [`MAX_CATCH_UP_TICKS`]. Returns the number of ticks run.
    ///
    /// Partial intervals carry over to the next call; ticks beyond the
    /// catch-up limit are dropped.
    pub fn poll(&mut self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.last_tick);
        let interval = TICK_INTERVAL.as_nanos();
        let due = elapsed.as_nanos() / interval;
        if due == 0 {
            return 0;
        }

        let ticks = u32::try_from(due).unwrap_or(u32::MAX).min(MAX_CATCH_UP_TICKS);
        for _ in 0..ticks {
            self.engine.tick(&mut self.telemetry, TICK_INTERVAL);
        }

        #[allow(clippy::cast_possible_truncation)] // remainder is below one tick interval
        let remainder = Duration::from_nanos((elapsed.as_nanos() % interval) as u64);
        self.last_tick = now.checked_sub(remainder).unwrap_or(now);
        ticks
    }

    /// Answer a command against the current telemetry snapshot.
    pub fn handle(&mut self, request: &CommandRequest) -> String {
        let response = self.dispatcher.dispatch(&request.raw, &self.telemetry);
        debug!(
            "[{}] {:?} -> {:?}",
            request.origin, request.raw, response
        );
        response
    }

    pub fn session_event(&mut self, event: &SessionEvent) {
        self.dispatcher.session_event(event);
    }
}
