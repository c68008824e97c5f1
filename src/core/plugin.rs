//! CorePlugin wires scaled simulation timing and the per-frame system ordering.
use bevy::prelude::*;
use std::time::Duration;

const DEFAULT_TIME_SCALE: f32 = 1.0;
const MIN_TIME_SCALE: f32 = 0.001;

/// Ordering of one simulation tick inside `Update`.
///
/// The game clock is written in `Clock`, every schedule controller reads it in
/// `Schedules`, and presentation/bookkeeping follows in `Sync`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    Clock,
    Schedules,
    Sync,
}

/// Tracks scaled simulation time derived from real frame deltas.
#[derive(Resource, Debug)]
pub struct SimulationClock {
    time_scale: f32,
    paused: bool,
    last_scaled_delta: Duration,
    elapsed: Duration,
}

impl SimulationClock {
    /// Creates a new clock with the provided time-scale multiplier.
    pub fn new(time_scale: f32) -> Self {
        Self {
            time_scale: time_scale.max(MIN_TIME_SCALE),
            paused: false,
            last_scaled_delta: Duration::ZERO,
            elapsed: Duration::ZERO,
        }
    }

    /// Sets the time-scale multiplier (clamped to a small positive minimum).
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(MIN_TIME_SCALE);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Scaled delta of the current frame; zero while paused.
    pub fn last_scaled_delta(&self) -> Duration {
        self.last_scaled_delta
    }

    /// Total scaled duration elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Applies a real frame delta to the clock.
    pub fn tick(&mut self, real_delta: Duration) {
        self.last_scaled_delta = if self.paused {
            Duration::ZERO
        } else {
            real_delta.mul_f32(self.time_scale)
        };
        self.elapsed += self.last_scaled_delta;
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_SCALE)
    }
}

/// Registers simulation timing and the tick ordering sets.
#[derive(Debug, Clone, Copy)]
pub struct CorePlugin {
    time_scale: f32,
}

impl CorePlugin {
    /// Creates a CorePlugin with the provided time-scale multiplier.
    pub const fn with_time_scale(time_scale: f32) -> Self {
        Self { time_scale }
    }
}

impl Default for CorePlugin {
    fn default() -> Self {
        Self::with_time_scale(DEFAULT_TIME_SCALE)
    }
}

impl Plugin for CorePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SimulationClock::new(self.time_scale))
            .configure_sets(
                Update,
                (
                    SimulationSet::Clock,
                    SimulationSet::Schedules,
                    SimulationSet::Sync,
                )
                    .chain(),
            )
            .add_systems(Startup, log_startup_time_scale)
            .add_systems(
                Update,
                update_simulation_clock.in_set(SimulationSet::Clock),
            );
    }
}

/// Feeds Bevy's frame delta into the simulation clock.
pub fn update_simulation_clock(mut clock: ResMut<SimulationClock>, time: Res<Time>) {
    clock.tick(time.delta());
}

fn log_startup_time_scale(clock: Res<SimulationClock>) {
    info!(
        "CorePlugin initialised with time scale: {:.3}",
        clock.time_scale()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_scales_delta_with_multiplier() {
        let mut clock = SimulationClock::new(4.0);
        clock.tick(Duration::from_millis(250));

        assert_eq!(clock.last_scaled_delta(), Duration::from_secs(1));
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn paused_clock_reports_zero_delta() {
        let mut clock = SimulationClock::default();
        clock.tick(Duration::from_millis(500));
        clock.pause();
        clock.tick(Duration::from_millis(500));

        assert!(clock.is_paused());
        assert_eq!(clock.last_scaled_delta(), Duration::ZERO);
        assert_eq!(clock.elapsed(), Duration::from_millis(500));

        clock.resume();
        clock.tick(Duration::from_millis(500));
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn clock_clamps_min_time_scale() {
        let mut clock = SimulationClock::new(0.0);
        assert!((clock.time_scale() - MIN_TIME_SCALE).abs() < f32::EPSILON);

        clock.set_time_scale(-5.0);
        assert!((clock.time_scale() - MIN_TIME_SCALE).abs() < f32::EPSILON);
    }
}
