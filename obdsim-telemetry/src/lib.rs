//! Simulated vehicle telemetry for the OBD2 adapter emulator
//!
//! This library owns the physical state of the pretend vehicle and advances it
//! one fixed tick at a time. It has no notion of time sources or threads: the
//! caller decides when a tick happens and passes the elapsed wall-clock time.
//!
//! Values are intentionally noisy. Every tick draws fresh randomness, but every
//! field is hard-clamped to its [`bounds`] entry afterwards, so a reader never
//! observes an out-of-range value.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::Duration;

/// Target cadence for [`TelemetryEngine::tick`].
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Closed interval a telemetry field is clamped to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn clamp(self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Linearly map `value` from this interval onto `min..max` of `to`.
    ///
    /// The result is not clamped; callers add jitter first and clamp last.
    #[must_use]
    pub fn map_onto(self, value: f64, to_min: f64, to_max: f64) -> f64 {
        (value - self.min) * (to_max - to_min) / (self.max - self.min) + to_min
    }
}

/// Hard limits for every field of [`VehicleTelemetryState`].
pub mod bounds {
    use super::Bounds;

    pub const RPM: Bounds = Bounds::new(700.0, 6000.0);
    /// km/h
    pub const SPEED: Bounds = Bounds::new(0.0, 150.0);
    /// Percent
    pub const THROTTLE: Bounds = Bounds::new(0.0, 100.0);
    /// Percent
    pub const ENGINE_LOAD: Bounds = Bounds::new(0.0, 100.0);
    /// g/s
    pub const AIRFLOW: Bounds = Bounds::new(5.0, 50.0);
    /// °C
    pub const COOLANT_TEMP: Bounds = Bounds::new(80.0, 110.0);
    /// °C
    pub const OIL_TEMP: Bounds = Bounds::new(75.0, 130.0);
    /// kPa above atmospheric
    pub const BOOST: Bounds = Bounds::new(0.0, 150.0);
    /// Percent
    pub const FUEL_LEVEL: Bounds = Bounds::new(5.0, 100.0);
}

// Target RPM selection
const TARGET_RPM_MIN: f64 = 750.0;
const TARGET_RPM_MAX: f64 = 4000.0;
const TARGET_HOLD_MIN_MS: u64 = 3000;
const TARGET_HOLD_MAX_MS: u64 = 8000;
const RPM_STEP_MIN: f64 = 5.0;
const RPM_STEP_MAX: f64 = 25.0;

// Jitter applied on top of the RPM-derived values
const SPEED_JITTER: f64 = 5.0;
const THROTTLE_JITTER: f64 = 10.0;
const LOAD_JITTER: f64 = 5.0;
const AIRFLOW_JITTER: f64 = 2.0;
const TEMP_JITTER: f64 = 0.2;

// Turbo model
const BOOST_RPM_THRESHOLD: f64 = 2000.0;
const BOOST_THROTTLE_THRESHOLD: f64 = 50.0;
const BOOST_CHARGE_MIN: f64 = -3.0;
const BOOST_CHARGE_MAX: f64 = 8.0;
const BOOST_DECAY: f64 = 5.0;

const FUEL_BURN_LOAD_THRESHOLD: f64 = 60.0;
const FUEL_BURN_PER_TICK: f64 = 0.001;

/// Physical state of the simulated vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehicleTelemetryState {
    pub rpm: f64,
    pub speed: f64,
    pub throttle_position: f64,
    pub engine_load: f64,
    pub airflow_rate: f64,
    pub coolant_temp: f64,
    pub oil_temp: f64,
    pub boost_pressure: f64,
    pub fuel_level: f64,
}

impl Default for VehicleTelemetryState {
    /// A warm engine idling at standstill
    fn default() -> Self {
        Self {
            rpm: 800.0,
            speed: 0.0,
            throttle_position: 0.0,
            engine_load: 25.0,
            airflow_rate: 15.0,
            coolant_temp: 90.0,
            oil_temp: 85.0,
            boost_pressure: 0.0,
            fuel_level: 75.0,
        }
    }
}

impl VehicleTelemetryState {
    /// Randomized idle state, narrower than the hard bounds.
    pub fn idle<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            rpm: rng.gen_range(750.0..850.0),
            coolant_temp: rng.gen_range(85.0..95.0),
            oil_temp: rng.gen_range(80.0..90.0),
            fuel_level: rng.gen_range(60.0..90.0),
            engine_load: rng.gen_range(20.0..30.0),
            airflow_rate: rng.gen_range(12.0..18.0),
            ..Self::default()
        }
    }

    /// Whether every field lies within its [`bounds`] entry.
    #[must_use]
    pub fn in_bounds(&self) -> bool {
        bounds::RPM.contains(self.rpm)
            && bounds::SPEED.contains(self.speed)
            && bounds::THROTTLE.contains(self.throttle_position)
            && bounds::ENGINE_LOAD.contains(self.engine_load)
            && bounds::AIRFLOW.contains(self.airflow_rate)
            && bounds::COOLANT_TEMP.contains(self.coolant_temp)
            && bounds::OIL_TEMP.contains(self.oil_temp)
            && bounds::BOOST.contains(self.boost_pressure)
            && bounds::FUEL_LEVEL.contains(self.fuel_level)
    }
}

/// Advances a [`VehicleTelemetryState`] one tick at a time.
///
/// The engine chases a target RPM that is re-drawn every few seconds; all
/// other quantities are derived from RPM or random-walk on their own.
pub struct TelemetryEngine<R = StdRng> {
    rng: R,
    target_rpm: Option<f64>,
    /// How long the current target is held before a new one is drawn
    hold: Duration,
    since_target_change: Duration,
}

impl TelemetryEngine<StdRng> {
    /// Engine seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for TelemetryEngine<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> TelemetryEngine<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            target_rpm: None,
            hold: Duration::ZERO,
            since_target_change: Duration::ZERO,
        }
    }

    /// Fresh randomized idle state drawn from this engine's generator.
    pub fn initial_state(&mut self) -> VehicleTelemetryState {
        VehicleTelemetryState::idle(&mut self.rng)
    }

    /// RPM the engine is currently moving towards, once the first tick ran.
    #[must_use]
    pub fn target_rpm(&self) -> Option<f64> {
        self.target_rpm
    }

    fn draw_hold(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(TARGET_HOLD_MIN_MS..=TARGET_HOLD_MAX_MS))
    }

    fn jitter(&mut self, amplitude: f64) -> f64 {
        self.rng.gen_range(-amplitude..=amplitude)
    }

    fn update_target(&mut self, current_rpm: f64, elapsed: Duration) -> f64 {
        self.since_target_change += elapsed;

        match self.target_rpm {
            Some(target) if self.since_target_change < self.hold => target,
            Some(_) => {
                let target = self.rng.gen_range(TARGET_RPM_MIN..=TARGET_RPM_MAX);
                debug!("New target RPM: {target:.0}");
                self.target_rpm = Some(target);
                self.hold = self.draw_hold();
                self.since_target_change = Duration::ZERO;
                target
            }
            None => {
                // Hold the starting RPM until the first re-target
                self.target_rpm = Some(current_rpm);
                self.hold = self.draw_hold();
                self.since_target_change = Duration::ZERO;
                current_rpm
            }
        }
    }

    /// Advance `state` by one tick.
    ///
    /// `elapsed` is the wall-clock time since the previous tick and only
    /// drives the target-RPM timer; per-tick steps are fixed.
    pub fn tick(&mut self, state: &mut VehicleTelemetryState, elapsed: Duration) {
        let target = self.update_target(state.rpm, elapsed);

        let step = self.rng.gen_range(RPM_STEP_MIN..=RPM_STEP_MAX);
        if state.rpm < target {
            state.rpm += step;
        } else if state.rpm > target {
            state.rpm -= step;
        }
        state.rpm = bounds::RPM.clamp(state.rpm);

        let rpm = state.rpm;
        state.speed =
            bounds::SPEED.clamp(bounds::RPM.map_onto(rpm, 0.0, 120.0) + self.jitter(SPEED_JITTER));
        state.throttle_position = bounds::THROTTLE
            .clamp(bounds::RPM.map_onto(rpm, 0.0, 80.0) + self.jitter(THROTTLE_JITTER));
        state.engine_load = bounds::ENGINE_LOAD
            .clamp(bounds::RPM.map_onto(rpm, 15.0, 85.0) + self.jitter(LOAD_JITTER));
        state.airflow_rate = bounds::AIRFLOW
            .clamp(bounds::RPM.map_onto(rpm, 8.0, 45.0) + self.jitter(AIRFLOW_JITTER));

        state.coolant_temp = bounds::COOLANT_TEMP.clamp(state.coolant_temp + self.jitter(TEMP_JITTER));
        state.oil_temp = bounds::OIL_TEMP.clamp(state.oil_temp + self.jitter(TEMP_JITTER));

        if rpm > BOOST_RPM_THRESHOLD && state.throttle_position > BOOST_THROTTLE_THRESHOLD {
            state.boost_pressure += self.rng.gen_range(BOOST_CHARGE_MIN..=BOOST_CHARGE_MAX);
        } else {
            state.boost_pressure -= BOOST_DECAY;
        }
        state.boost_pressure = bounds::BOOST.clamp(state.boost_pressure);

        if state.engine_load > FUEL_BURN_LOAD_THRESHOLD {
            state.fuel_level -= FUEL_BURN_PER_TICK;
        }
        state.fuel_level = bounds::FUEL_LEVEL.clamp(state.fuel_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seeded(seed: u64) -> TelemetryEngine<StdRng> {
        TelemetryEngine::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Pin the target so RPM hovers around `rpm` for the rest of the test.
    fn pin_target(engine: &mut TelemetryEngine<StdRng>, rpm: f64) {
        engine.target_rpm = Some(rpm);
        engine.hold = Duration::from_secs(3600);
        engine.since_target_change = Duration::ZERO;
    }

    #[test]
    fn test_default_state_in_bounds() {
        assert!(VehicleTelemetryState::default().in_bounds());
    }

    #[test]
    fn test_idle_state_ranges() {
        let mut engine = seeded(7);
        for _ in 0..100 {
            let state = engine.initial_state();
            assert!(state.in_bounds());
            assert!((750.0..850.0).contains(&state.rpm));
            assert!((85.0..95.0).contains(&state.coolant_temp));
            assert!((60.0..90.0).contains(&state.fuel_level));
            assert!(state.speed.abs() < f64::EPSILON);
            assert!(state.boost_pressure.abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_map_onto() {
        assert!((bounds::RPM.map_onto(700.0, 0.0, 120.0)).abs() < 1e-9);
        assert!((bounds::RPM.map_onto(6000.0, 0.0, 120.0) - 120.0).abs() < 1e-9);
        assert!((bounds::RPM.map_onto(3350.0, 15.0, 85.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_tick_holds_current_rpm() {
        let mut engine = seeded(1);
        let mut state = VehicleTelemetryState::default();
        assert_eq!(engine.target_rpm(), None);
        engine.tick(&mut state, TICK_INTERVAL);
        assert_eq!(engine.target_rpm(), Some(800.0));
    }

    #[test]
    fn test_target_redrawn_after_hold() {
        let mut engine = seeded(2);
        let mut state = VehicleTelemetryState::default();
        engine.tick(&mut state, TICK_INTERVAL);
        // Longer than the maximum hold
        engine.tick(&mut state, Duration::from_millis(TARGET_HOLD_MAX_MS + 1));
        let target = engine.target_rpm().unwrap();
        assert!((TARGET_RPM_MIN..=TARGET_RPM_MAX).contains(&target));
    }

    #[test]
    fn test_rpm_moves_towards_target() {
        let mut engine = seeded(3);
        let mut state = VehicleTelemetryState::default();
        pin_target(&mut engine, 3000.0);
        for _ in 0..20 {
            let before = state.rpm;
            engine.tick(&mut state, TICK_INTERVAL);
            let step = state.rpm - before;
            assert!((RPM_STEP_MIN..=RPM_STEP_MAX).contains(&step), "step {step}");
        }
    }

    #[test]
    fn test_derived_values_track_rpm() {
        let mut engine = seeded(4);
        let mut state = VehicleTelemetryState {
            rpm: 700.0,
            ..VehicleTelemetryState::default()
        };
        pin_target(&mut engine, 700.0);
        engine.tick(&mut state, TICK_INTERVAL);
        // At the bottom of the RPM range the affine maps sit at their low end
        assert!(state.speed <= SPEED_JITTER + 1.0);
        assert!(state.throttle_position <= THROTTLE_JITTER + 1.0);
        assert!(state.engine_load <= 15.0 + LOAD_JITTER + 1.0);
    }

    #[test]
    fn test_boost_decays_at_idle() {
        let mut engine = seeded(5);
        let mut state = VehicleTelemetryState {
            boost_pressure: 12.0,
            ..VehicleTelemetryState::default()
        };
        pin_target(&mut engine, 800.0);
        engine.tick(&mut state, TICK_INTERVAL);
        assert!((state.boost_pressure - 7.0).abs() < 1e-9);
        engine.tick(&mut state, TICK_INTERVAL);
        engine.tick(&mut state, TICK_INTERVAL);
        assert!(state.boost_pressure.abs() < f64::EPSILON);
    }

    #[test]
    fn test_boost_charges_under_load() {
        let mut engine = seeded(6);
        let mut state = VehicleTelemetryState {
            rpm: 5000.0,
            ..VehicleTelemetryState::default()
        };
        pin_target(&mut engine, 5000.0);
        for _ in 0..100 {
            engine.tick(&mut state, TICK_INTERVAL);
        }
        assert!(state.boost_pressure > 50.0, "boost {}", state.boost_pressure);
    }

    #[test]
    fn test_fuel_burns_only_under_load() {
        let mut engine = seeded(8);
        let mut idle = VehicleTelemetryState::default();
        pin_target(&mut engine, 800.0);
        for _ in 0..50 {
            engine.tick(&mut idle, TICK_INTERVAL);
        }
        assert!((idle.fuel_level - 75.0).abs() < f64::EPSILON);

        let mut engine = seeded(9);
        let mut loaded = VehicleTelemetryState {
            rpm: 5500.0,
            ..VehicleTelemetryState::default()
        };
        pin_target(&mut engine, 5500.0);
        for _ in 0..50 {
            engine.tick(&mut loaded, TICK_INTERVAL);
        }
        assert!((loaded.fuel_level - (75.0 - 50.0 * FUEL_BURN_PER_TICK)).abs() < 1e-9);
    }

    #[test]
    fn test_fuel_floor() {
        let mut engine = seeded(10);
        let mut state = VehicleTelemetryState {
            rpm: 5500.0,
            fuel_level: 5.0,
            ..VehicleTelemetryState::default()
        };
        pin_target(&mut engine, 5500.0);
        engine.tick(&mut state, TICK_INTERVAL);
        assert!((state.fuel_level - 5.0).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_ticks_stay_in_bounds(seed in any::<u64>(), ticks in 1usize..600, step_ms in 0u64..2000) {
            let mut engine = seeded(seed);
            let mut state = engine.initial_state();
            for _ in 0..ticks {
                engine.tick(&mut state, Duration::from_millis(step_ms));
                prop_assert!(state.in_bounds(), "out of bounds: {:?}", state);
            }
        }

        #[test]
        fn prop_fuel_never_increases(seed in any::<u64>(), ticks in 1usize..600) {
            let mut engine = seeded(seed);
            let mut state = engine.initial_state();
            for _ in 0..ticks {
                let before = state.fuel_level;
                engine.tick(&mut state, TICK_INTERVAL);
                prop_assert!(state.fuel_level <= before);
            }
        }
    }
}
