//! Game clock: stepped time of day, day boundary detection, and
//! `config/time.toml` loading.
use std::{fmt, fs, io, path::Path};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{core::plugin::SimulationClock, world::events::DayBoundaryEvent};

pub const MINUTES_PER_DAY: u16 = 1440;
const CONFIG_PATH: &str = "config/time.toml";

/// Minutes since midnight, always in `[0, 1440)`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct GameTime(u16);

impl GameTime {
    pub const MIDNIGHT: Self = Self(0);

    /// Wraps any minute count onto the 24h dial.
    pub fn from_minutes(minutes: u32) -> Self {
        Self((minutes % MINUTES_PER_DAY as u32) as u16)
    }

    pub fn from_hm(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then(|| Self(hour as u16 * 60 + minute as u16))
    }

    /// Parses a 24-hour `HH:MM` string, range-checked to `[00:00, 23:59]`.
    pub fn parse_hhmm(text: &str) -> Option<Self> {
        let (hours, minutes) = text.trim().split_once(':')?;
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(hours) || hours.len() > 2 || !digits(minutes) || minutes.len() != 2 {
            return None;
        }
        Self::from_hm(hours.parse().ok()?, minutes.parse().ok()?)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u8 {
        (self.0 / 60) as u8
    }

    pub fn minute(self) -> u8 {
        (self.0 % 60) as u8
    }

    /// Minutes elapsed since `day_start`, searching forward through midnight.
    ///
    /// This is the value schedule comparisons use: with a day starting at
    /// 08:00, 02:00 sorts after 23:00.
    pub fn since(self, day_start: GameTime) -> u16 {
        (self.0 + MINUTES_PER_DAY - day_start.0) % MINUTES_PER_DAY
    }

    pub fn add_minutes(self, minutes: u32) -> Self {
        Self::from_minutes(self.0 as u32 + minutes)
    }
}

impl fmt::Display for GameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl TryFrom<String> for GameTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_hhmm(&value).ok_or_else(|| format!("invalid HH:MM time `{}`", value))
    }
}

impl From<GameTime> for String {
    fn from(value: GameTime) -> Self {
        value.to_string()
    }
}

/// Invalid day-length/start-hour configuration. Fatal at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum ClockConfigurationError {
    Unreadable { path: String, message: String },
    Malformed { message: String },
    InvalidStartHour(u32),
    InvalidDayLength(u32),
    InvalidStep { minutes_per_step: u32, day_length_minutes: u32 },
    InvalidStepDuration(f32),
    InvalidStartTime(String),
}

impl fmt::Display for ClockConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable { path, message } => write!(f, "cannot read {}: {}", path, message),
            Self::Malformed { message } => write!(f, "malformed clock config: {}", message),
            Self::InvalidStartHour(hour) => {
                write!(f, "day_start_hour must be in 0..24, got {}", hour)
            }
            Self::InvalidDayLength(length) => {
                write!(f, "day_length_minutes must be in 1..=1440, got {}", length)
            }
            Self::InvalidStep {
                minutes_per_step,
                day_length_minutes,
            } => write!(
                f,
                "minutes_per_step {} must be positive and divide day_length_minutes {}",
                minutes_per_step, day_length_minutes
            ),
            Self::InvalidStepDuration(seconds) => write!(
                f,
                "real_seconds_per_step must be finite and positive, got {}",
                seconds
            ),
            Self::InvalidStartTime(time) => {
                write!(f, "start_time `{}` is not a time within the game day", time)
            }
        }
    }
}

impl std::error::Error for ClockConfigurationError {}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawTimeConfig {
    #[serde(default)]
    clock: RawClockSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawClockSection {
    day_start_hour: u32,
    day_length_minutes: u32,
    minutes_per_step: u32,
    real_seconds_per_step: f32,
    start_time: Option<String>,
}

impl Default for RawClockSection {
    fn default() -> Self {
        Self {
            day_start_hour: 8,
            day_length_minutes: 960,
            minutes_per_step: 15,
            real_seconds_per_step: 10.0,
            start_time: None,
        }
    }
}

/// Validated clock tuning: when the day starts, how long it lasts, and how
/// real seconds map onto 15-minute (by default) in-game steps.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct ClockSettings {
    pub day_start: GameTime,
    pub day_length_minutes: u16,
    pub minutes_per_step: u16,
    pub real_seconds_per_step: f32,
    pub start_time: GameTime,
}

impl ClockSettings {
    /// Reads `config/time.toml`; a missing file yields the defaults.
    pub fn load() -> Result<Self, ClockConfigurationError> {
        Self::load_from(Path::new(CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Result<Self, ClockConfigurationError> {
        match fs::read_to_string(path) {
            Ok(data) => Self::from_toml_str(&data),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "{} not found. Using default clock settings.",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(err) => Err(ClockConfigurationError::Unreadable {
                path: path.display().to_string(),
                message: err.to_string(),
            }),
        }
    }

    pub fn from_toml_str(data: &str) -> Result<Self, ClockConfigurationError> {
        let raw = toml::from_str::<RawTimeConfig>(data).map_err(|err| {
            ClockConfigurationError::Malformed {
                message: err.to_string(),
            }
        })?;
        Self::try_from(raw)
    }

    /// The wall-clock time at which the game day wraps back to `day_start`.
    pub fn day_end(&self) -> GameTime {
        self.day_start.add_minutes(self.day_length_minutes as u32)
    }

    /// Whether `time` falls inside the active part of the day.
    pub fn contains(&self, time: GameTime) -> bool {
        time.since(self.day_start) < self.day_length_minutes
    }
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            day_start: GameTime(8 * 60),
            day_length_minutes: 960,
            minutes_per_step: 15,
            real_seconds_per_step: 10.0,
            start_time: GameTime(8 * 60),
        }
    }
}

impl TryFrom<RawTimeConfig> for ClockSettings {
    type Error = ClockConfigurationError;

    fn try_from(value: RawTimeConfig) -> Result<Self, Self::Error> {
        let clock = value.clock;

        if clock.day_start_hour >= 24 {
            return Err(ClockConfigurationError::InvalidStartHour(
                clock.day_start_hour,
            ));
        }
        if clock.day_length_minutes == 0 || clock.day_length_minutes > MINUTES_PER_DAY as u32 {
            return Err(ClockConfigurationError::InvalidDayLength(
                clock.day_length_minutes,
            ));
        }
        if clock.minutes_per_step == 0 || clock.day_length_minutes % clock.minutes_per_step != 0 {
            return Err(ClockConfigurationError::InvalidStep {
                minutes_per_step: clock.minutes_per_step,
                day_length_minutes: clock.day_length_minutes,
            });
        }
        if !clock.real_seconds_per_step.is_finite() || clock.real_seconds_per_step <= 0.0 {
            return Err(ClockConfigurationError::InvalidStepDuration(
                clock.real_seconds_per_step,
            ));
        }

        let day_start = GameTime(clock.day_start_hour as u16 * 60);
        let mut settings = Self {
            day_start,
            day_length_minutes: clock.day_length_minutes as u16,
            minutes_per_step: clock.minutes_per_step as u16,
            real_seconds_per_step: clock.real_seconds_per_step,
            start_time: day_start,
        };

        if let Some(text) = clock.start_time {
            match GameTime::parse_hhmm(&text) {
                Some(time) if settings.contains(time) => settings.start_time = time,
                _ => return Err(ClockConfigurationError::InvalidStartTime(text)),
            }
        }

        Ok(settings)
    }
}

/// Runtime state for the game clock. Written once per tick, read by everyone else.
#[derive(Resource, Debug, Clone)]
pub struct GameClock {
    time: GameTime,
    day: u64,
    accumulator: f32,
    rolled_over: bool,
}

impl GameClock {
    pub fn new(settings: &ClockSettings) -> Self {
        Self {
            time: settings.start_time,
            day: 0,
            accumulator: 0.0,
            rolled_over: false,
        }
    }

    pub fn now(&self) -> GameTime {
        self.time
    }

    pub fn day(&self) -> u64 {
        self.day
    }

    /// True when the most recent `advance` crossed the day boundary.
    pub fn rolled_over(&self) -> bool {
        self.rolled_over
    }

    /// Accumulates real seconds and advances in whole in-game steps.
    pub fn advance(&mut self, delta_real_seconds: f32, settings: &ClockSettings) -> GameTime {
        self.rolled_over = false;
        if !delta_real_seconds.is_finite() || delta_real_seconds <= 0.0 {
            return self.time;
        }

        self.accumulator += delta_real_seconds;
        while self.accumulator >= settings.real_seconds_per_step {
            self.accumulator -= settings.real_seconds_per_step;
            self.step(settings);
        }
        self.time
    }

    /// Jumps to a saved day/time; times outside the active day snap to its start.
    pub fn restore(&mut self, day: u64, time: GameTime, settings: &ClockSettings) {
        self.day = day;
        self.time = if settings.contains(time) {
            time
        } else {
            settings.day_start
        };
        self.accumulator = 0.0;
        self.rolled_over = false;
    }

    fn step(&mut self, settings: &ClockSettings) {
        let elapsed =
            self.time.since(settings.day_start) as u32 + settings.minutes_per_step as u32;
        if elapsed >= settings.day_length_minutes as u32 {
            self.time = settings.day_start;
            self.day = self.day.saturating_add(1);
            self.rolled_over = true;
        } else {
            self.time = settings.day_start.add_minutes(elapsed);
        }
    }
}

/// Advances the game clock by the scaled simulation delta and announces day wraps.
pub fn advance_game_clock(
    mut clock: ResMut<GameClock>,
    settings: Res<ClockSettings>,
    simulation_clock: Res<SimulationClock>,
    mut boundaries: MessageWriter<DayBoundaryEvent>,
) {
    let delta = simulation_clock.last_scaled_delta().as_secs_f32();
    let now = clock.advance(delta, &settings);
    if clock.rolled_over() {
        info!("Day {} begins at {}", clock.day(), now);
        boundaries.write(DayBoundaryEvent { day: clock.day() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(hour: u8, minute: u8) -> GameTime {
        GameTime::from_hm(hour, minute).unwrap()
    }

    #[test]
    fn parses_and_range_checks_hhmm() {
        assert_eq!(GameTime::parse_hhmm("08:00"), Some(hm(8, 0)));
        assert_eq!(GameTime::parse_hhmm("23:59"), Some(hm(23, 59)));
        assert_eq!(GameTime::parse_hhmm("7:05"), Some(hm(7, 5)));
        assert_eq!(GameTime::parse_hhmm("24:00"), None);
        assert_eq!(GameTime::parse_hhmm("12:60"), None);
        assert_eq!(GameTime::parse_hhmm("12:5"), None);
        assert_eq!(GameTime::parse_hhmm("noon"), None);
        assert_eq!(GameTime::parse_hhmm("-1:00"), None);
        assert_eq!(hm(9, 5).to_string(), "09:05");
    }

    #[test]
    fn comparisons_search_forward_from_day_start() {
        let start = hm(8, 0);
        assert_eq!(hm(8, 0).since(start), 0);
        assert_eq!(hm(23, 0).since(start), 900);
        assert_eq!(hm(2, 0).since(start), 1080);
        assert!(hm(2, 0).since(start) > hm(23, 0).since(start));
    }

    #[test]
    fn clock_advances_in_discrete_steps() {
        let settings = ClockSettings::default();
        let mut clock = GameClock::new(&settings);

        assert_eq!(clock.advance(9.5, &settings), hm(8, 0));
        assert_eq!(clock.advance(0.5, &settings), hm(8, 15));
        assert_eq!(clock.advance(40.0, &settings), hm(9, 15));
        assert!(!clock.rolled_over());
    }

    #[test]
    fn clock_wraps_to_day_start_and_flags_boundary() {
        let settings = ClockSettings::default();
        let mut clock = GameClock::new(&settings);
        clock.restore(0, hm(23, 45), &settings);

        let now = clock.advance(settings.real_seconds_per_step, &settings);
        assert_eq!(now, hm(8, 0));
        assert_eq!(clock.day(), 1);
        assert!(clock.rolled_over());

        clock.advance(1.0, &settings);
        assert!(!clock.rolled_over());
    }

    #[test]
    fn clock_ignores_non_finite_deltas() {
        let settings = ClockSettings::default();
        let mut clock = GameClock::new(&settings);
        assert_eq!(clock.advance(f32::NAN, &settings), hm(8, 0));
        assert_eq!(clock.advance(-3.0, &settings), hm(8, 0));
    }

    #[test]
    fn settings_parse_from_toml() {
        let settings = ClockSettings::from_toml_str(
            r#"
            [clock]
            day_start_hour = 6
            day_length_minutes = 1200
            minutes_per_step = 10
            real_seconds_per_step = 7.0
            start_time = "09:30"
            "#,
        )
        .unwrap();

        assert_eq!(settings.day_start, hm(6, 0));
        assert_eq!(settings.day_end(), hm(2, 0));
        assert_eq!(settings.start_time, hm(9, 30));
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let settings = ClockSettings::load_from(Path::new("config/no_such_clock.toml")).unwrap();
        assert_eq!(settings, ClockSettings::default());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let settings = ClockSettings::from_toml_str("").unwrap();
        assert_eq!(settings, ClockSettings::default());
        assert_eq!(settings.day_end(), GameTime::MIDNIGHT);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let cases = [
            ("[clock]\nday_start_hour = 24", "start"),
            ("[clock]\nday_length_minutes = 0", "length"),
            ("[clock]\nday_length_minutes = 2000", "length"),
            ("[clock]\nminutes_per_step = 7", "step"),
            ("[clock]\nreal_seconds_per_step = 0.0", "duration"),
            ("[clock]\nstart_time = \"03:00\"", "start_time"),
            ("[clock\n", "malformed"),
        ];

        for (config, label) in cases {
            assert!(
                ClockSettings::from_toml_str(config).is_err(),
                "expected {} config to fail",
                label
            );
        }
    }
}
