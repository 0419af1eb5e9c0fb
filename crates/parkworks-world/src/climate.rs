//! Weather and temperature.

use serde::{Deserialize, Serialize};

use crate::rng::ParkRng;

/// Ticks between weather changes.
pub const WEATHER_UPDATE_TICKS: u16 = 1920;

/// Ticks between one-degree temperature steps towards the target.
const TEMPERATURE_STEP_TICKS: u16 = 128;

/// Mean temperature per month, March through October.
const MONTH_BASE_TEMPERATURE: [i8; 8] = [10, 14, 18, 23, 26, 25, 20, 14];

/// The current weather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherKind {
    Sunny,
    PartiallyCloudy,
    Cloudy,
    Rain,
    HeavyRain,
    Thunder,
}

impl WeatherKind {
    const ALL: [WeatherKind; 6] = [
        WeatherKind::Sunny,
        WeatherKind::PartiallyCloudy,
        WeatherKind::Cloudy,
        WeatherKind::Rain,
        WeatherKind::HeavyRain,
        WeatherKind::Thunder,
    ];

    /// Rain, heavy rain and thunder all count.
    pub fn is_raining(self) -> bool {
        matches!(self, WeatherKind::Rain | WeatherKind::HeavyRain | WeatherKind::Thunder)
    }

    /// Degrees the weather pulls the target temperature down by.
    fn chill(self) -> i8 {
        match self {
            WeatherKind::Sunny => -2,
            WeatherKind::PartiallyCloudy => 0,
            WeatherKind::Cloudy => 2,
            WeatherKind::Rain => 4,
            WeatherKind::HeavyRain => 5,
            WeatherKind::Thunder => 6,
        }
    }
}

/// Ambient sound the climate wants playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimateSound {
    None,
    Rain,
    Thunder,
}

/// Weather, temperature and the countdown to the next weather change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Climate {
    /// Weather until the next roll.
    pub weather: WeatherKind,
    /// Degrees Celsius. Moves one degree at a time towards `target_temperature`.
    pub temperature: i8,
    /// Temperature the current weather is heading for.
    pub target_temperature: i8,
    /// Ticks left until the weather is rolled again.
    pub update_timer: u16,
}

impl Default for Climate {
    fn default() -> Self {
        Self {
            weather: WeatherKind::Sunny,
            temperature: MONTH_BASE_TEMPERATURE[0],
            target_temperature: MONTH_BASE_TEMPERATURE[0],
            update_timer: WEATHER_UPDATE_TICKS,
        }
    }
}

impl Climate {
    /// Advance the climate by one tick.
    pub fn update(&mut self, rng: &mut ParkRng, month: u32) {
        if self.update_timer == 0 {
            self.weather = WeatherKind::ALL[rng.next_range(WeatherKind::ALL.len() as u32) as usize];
            let base = MONTH_BASE_TEMPERATURE[(month % 8) as usize];
            let jitter = rng.next_range(5) as i8 - 2;
            self.target_temperature = base + jitter - self.weather.chill();
            self.update_timer = WEATHER_UPDATE_TICKS;
            return;
        }
        self.update_timer -= 1;
        if self.update_timer % TEMPERATURE_STEP_TICKS == 0 {
            self.temperature += (self.target_temperature - self.temperature).signum();
        }
    }

    /// The ambient sound for the current weather.
    pub fn sound(&self) -> ClimateSound {
        match self.weather {
            WeatherKind::Thunder => ClimateSound::Thunder,
            w if w.is_raining() => ClimateSound::Rain,
            _ => ClimateSound::None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_changes_only_when_timer_expires() {
        let mut climate = Climate::default();
        let mut rng = ParkRng::from_seed(3);
        for _ in 0..WEATHER_UPDATE_TICKS {
            climate.update(&mut rng, 0);
        }
        assert_eq!(climate.update_timer, 0);
        climate.update(&mut rng, 0);
        assert_eq!(climate.update_timer, WEATHER_UPDATE_TICKS);
    }

    #[test]
    fn temperature_walks_towards_target() {
        let mut climate = Climate {
            target_temperature: 20,
            temperature: 10,
            ..Climate::default()
        };
        let mut rng = ParkRng::from_seed(3);
        for _ in 0..(TEMPERATURE_STEP_TICKS as u32 * 3) {
            climate.update(&mut rng, 0);
        }
        assert_eq!(climate.temperature, 13);
    }

    #[test]
    fn thunder_sounds_like_thunder() {
        let climate = Climate {
            weather: WeatherKind::Thunder,
            ..Climate::default()
        };
        assert_eq!(climate.sound(), ClimateSound::Thunder);
    }
}
