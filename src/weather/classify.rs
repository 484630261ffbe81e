//! Weather alert classification against Indian Meteorological
//! Department-style thresholds.
//!
//! Rules run in a fixed order and a later matching rule overrides an
//! earlier one, so a reading can only carry a single alert. Levels map
//! to announcement severity as red→critical, orange→high,
//! yellow→medium.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Green,
    Yellow,
    Orange,
    Red,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Green => "green",
            AlertLevel::Yellow => "yellow",
            AlertLevel::Orange => "orange",
            AlertLevel::Red => "red",
        }
    }

    /// Announcement severity for this alert level.
    pub fn severity(&self) -> &'static str {
        match self {
            AlertLevel::Red => "critical",
            AlertLevel::Orange => "high",
            _ => "medium",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            AlertLevel::Green => "🟩",
            AlertLevel::Yellow => "🟨",
            AlertLevel::Orange => "🟧",
            AlertLevel::Red => "🟥",
        }
    }

    pub fn meaning(&self) -> &'static str {
        match self {
            AlertLevel::Green => "No warning",
            AlertLevel::Yellow => "Be updated",
            AlertLevel::Orange => "Be prepared",
            AlertLevel::Red => "Take action",
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            AlertLevel::Green => "No action needed",
            AlertLevel::Yellow => "Weather could change — monitor forecasts",
            AlertLevel::Orange => "Dangerous weather expected — stay alert",
            AlertLevel::Red => "Extremely severe weather — emergency measures required",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HeatWave,
    ColdWave,
    Cyclone,
    Thunderstorm,
    DustStorm,
    ColdDay,
    HeatIndex,
}

impl AlertKind {
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::HeatWave => "Heat Wave",
            AlertKind::ColdWave => "Cold Wave",
            AlertKind::Cyclone => "Cyclone",
            AlertKind::Thunderstorm => "Thunderstorm",
            AlertKind::DustStorm => "Dust Storm",
            AlertKind::ColdDay => "Cold Day",
            AlertKind::HeatIndex => "Heat Index",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub level: AlertLevel,
    pub kind: Option<AlertKind>,
    pub message: String,
    pub is_extreme: bool,
}

impl Assessment {
    fn normal() -> Self {
        Assessment {
            level: AlertLevel::Green,
            kind: None,
            message: "Normal weather conditions".to_string(),
            is_extreme: false,
        }
    }

    fn raise(&mut self, level: AlertLevel, kind: AlertKind, message: String) {
        self.level = level;
        self.kind = Some(kind);
        self.message = message;
        self.is_extreme = true;
    }
}

pub fn assess(
    temperature: Option<f64>,
    wind_speed: Option<f64>,
    visibility: Option<f64>,
    condition: &str,
    humidity: Option<f64>,
) -> Assessment {
    let mut out = Assessment::normal();
    let condition_lower = condition.to_lowercase();

    // Heat wave / cold wave
    if let Some(temp) = temperature {
        if temp >= 47.0 {
            out.raise(
                AlertLevel::Red,
                AlertKind::HeatWave,
                format!(
                    "🌡️ EXTREME HEAT WAVE: {}°C (Prolonged ≥3 days) - Take immediate action!",
                    temp
                ),
            );
        } else if temp >= 45.0 {
            out.raise(
                AlertLevel::Orange,
                AlertKind::HeatWave,
                format!("🌡️ SEVERE HEAT WAVE: {}°C - Be prepared!", temp),
            );
        } else if temp >= 40.0 {
            out.raise(
                AlertLevel::Yellow,
                AlertKind::HeatWave,
                format!("🌡️ Heat Wave Warning: {}°C (Plains) - Stay updated!", temp),
            );
        } else if temp <= 4.0 {
            out.raise(
                AlertLevel::Red,
                AlertKind::ColdWave,
                format!(
                    "❄️ WIDESPREAD EXTREME COLD WAVE: {}°C - Take immediate action!",
                    temp
                ),
            );
        } else if temp <= 10.0 {
            out.raise(
                AlertLevel::Yellow,
                AlertKind::ColdWave,
                format!("❄️ Cold Wave Warning: {}°C - Stay updated!", temp),
            );
        }
    }

    // Cyclonic wind
    if let Some(wind) = wind_speed {
        if wind >= 118.0 {
            out.raise(
                AlertLevel::Red,
                AlertKind::Cyclone,
                format!(
                    "🌪️ VERY SEVERE / SUPER CYCLONE: {} km/h - Emergency measures required!",
                    wind
                ),
            );
        } else if wind >= 88.0 {
            out.raise(
                AlertLevel::Orange,
                AlertKind::Cyclone,
                format!("🌪️ SEVERE CYCLONIC STORM: {} km/h - Be prepared!", wind),
            );
        } else if wind >= 62.0 {
            out.raise(
                AlertLevel::Yellow,
                AlertKind::Cyclone,
                format!("🌪️ Cyclonic Storm: {} km/h - Stay updated!", wind),
            );
        }
    }

    // Thunderstorm: keyed on condition text plus wind
    if ["thunder", "storm", "lightning"]
        .iter()
        .any(|w| condition_lower.contains(w))
    {
        if let Some(wind) = wind_speed {
            if wind >= 70.0 {
                out.raise(
                    AlertLevel::Red,
                    AlertKind::Thunderstorm,
                    format!(
                        "⚡ DESTRUCTIVE THUNDERSTORM: {} km/h winds, widespread lightning - Emergency measures!",
                        wind
                    ),
                );
            } else if wind >= 50.0 {
                out.raise(
                    AlertLevel::Orange,
                    AlertKind::Thunderstorm,
                    format!(
                        "⚡ Severe Thunderstorm: {} km/h winds, hail possible - Be prepared!",
                        wind
                    ),
                );
            } else if wind >= 30.0 {
                out.raise(
                    AlertLevel::Yellow,
                    AlertKind::Thunderstorm,
                    format!(
                        "⚡ Thunderstorm with Lightning: {} km/h winds - Stay updated!",
                        wind
                    ),
                );
            }
        }
    }

    // Dust / sandstorm: wind plus reduced visibility
    if ["dust", "sand", "squall"]
        .iter()
        .any(|w| condition_lower.contains(w))
    {
        if let (Some(wind), Some(vis)) = (wind_speed, visibility) {
            if wind >= 60.0 && vis < 200.0 {
                out.raise(
                    AlertLevel::Red,
                    AlertKind::DustStorm,
                    format!(
                        "🌬️ EXTREME DUST STORM: {} km/h winds, visibility {} km - Emergency measures!",
                        wind, vis
                    ),
                );
            } else if wind >= 50.0 && vis < 500.0 {
                out.raise(
                    AlertLevel::Orange,
                    AlertKind::DustStorm,
                    format!(
                        "🌬️ Severe Dust Storm: {} km/h winds, visibility {} km - Be prepared!",
                        wind, vis
                    ),
                );
            } else if wind >= 30.0 && vis < 1000.0 {
                out.raise(
                    AlertLevel::Yellow,
                    AlertKind::DustStorm,
                    format!(
                        "🌬️ Dust Storm: {} km/h winds, visibility {} km - Stay updated!",
                        wind, vis
                    ),
                );
            }
        }
    }

    // Cold day
    if let Some(temp) = temperature {
        if temp <= 12.0 {
            out.raise(
                AlertLevel::Red,
                AlertKind::ColdDay,
                format!(
                    "🌊 EXTREME COLD DAY: {}°C (≥2 days) - Take immediate action!",
                    temp
                ),
            );
        } else if temp <= 14.0 {
            out.raise(
                AlertLevel::Orange,
                AlertKind::ColdDay,
                format!("🌊 Severe Cold Day: {}°C - Be prepared!", temp),
            );
        } else if temp <= 16.0 {
            out.raise(
                AlertLevel::Yellow,
                AlertKind::ColdDay,
                format!("🌊 Cold Day: {}°C - Stay updated!", temp),
            );
        }
    }

    // Heat index: simplified HI = T + 0.5 * (T - 20) * (H - 40) / 100
    if let (Some(temp), Some(hum)) = (temperature, humidity) {
        let heat_index = temp + 0.5 * (temp - 20.0) * (hum - 40.0) / 100.0;
        if heat_index >= 65.0 {
            out.raise(
                AlertLevel::Red,
                AlertKind::HeatIndex,
                format!(
                    "🌡️ HEAT INDEX DANGER ZONE: {:.1}°C - Heat stress risk!",
                    heat_index
                ),
            );
        } else if heat_index >= 55.0 {
            out.raise(
                AlertLevel::Orange,
                AlertKind::HeatIndex,
                format!(
                    "🌡️ Heat Index Extreme Caution: {:.1}°C - Be prepared!",
                    heat_index
                ),
            );
        } else if heat_index >= 41.0 {
            out.raise(
                AlertLevel::Yellow,
                AlertKind::HeatIndex,
                format!("🌡️ Heat Index Caution: {:.1}°C - Stay updated!", heat_index),
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mild_weather_is_green() {
        let a = assess(Some(25.0), Some(10.0), Some(10.0), "Partly cloudy", Some(50.0));
        assert_eq!(a.level, AlertLevel::Green);
        assert!(!a.is_extreme);
        assert_eq!(a.message, "Normal weather conditions");
    }

    #[test]
    fn heat_wave_bands() {
        assert_eq!(
            assess(Some(41.0), None, None, "Sunny", None).level,
            AlertLevel::Yellow
        );
        assert_eq!(
            assess(Some(46.0), None, None, "Sunny", None).level,
            AlertLevel::Orange
        );
        let red = assess(Some(48.0), None, None, "Sunny", None);
        assert_eq!(red.level, AlertLevel::Red);
        assert_eq!(red.kind, Some(AlertKind::HeatWave));
        assert!(red.is_extreme);
    }

    #[test]
    fn cyclone_overrides_heat() {
        let a = assess(Some(41.0), Some(120.0), None, "Windy", None);
        assert_eq!(a.level, AlertLevel::Red);
        assert_eq!(a.kind, Some(AlertKind::Cyclone));
    }

    #[test]
    fn thunderstorm_requires_condition_text() {
        let quiet = assess(Some(25.0), Some(55.0), None, "Clear", None);
        assert_ne!(quiet.kind, Some(AlertKind::Thunderstorm));

        let stormy = assess(Some(25.0), Some(55.0), None, "Thundery outbreaks", None);
        assert_eq!(stormy.kind, Some(AlertKind::Thunderstorm));
        assert_eq!(stormy.level, AlertLevel::Orange);
    }

    #[test]
    fn dust_storm_needs_wind_and_visibility() {
        let a = assess(Some(30.0), Some(65.0), Some(0.1), "Blowing dust", None);
        assert_eq!(a.kind, Some(AlertKind::DustStorm));
        assert_eq!(a.level, AlertLevel::Red);

        let clear_vis = assess(Some(30.0), Some(65.0), None, "Blowing dust", None);
        assert_ne!(clear_vis.kind, Some(AlertKind::DustStorm));
    }

    #[test]
    fn cold_day_overrides_cold_wave() {
        // 8°C trips the cold-wave yellow first, then the cold-day red.
        let a = assess(Some(8.0), None, None, "Mist", None);
        assert_eq!(a.kind, Some(AlertKind::ColdDay));
        assert_eq!(a.level, AlertLevel::Red);
    }

    #[test]
    fn heat_index_combines_temperature_and_humidity() {
        // 38°C at 90% humidity: HI = 38 + 0.5*18*50/100 = 42.5
        let a = assess(Some(38.0), None, None, "Humid", Some(90.0));
        assert_eq!(a.kind, Some(AlertKind::HeatIndex));
        assert_eq!(a.level, AlertLevel::Yellow);
    }

    #[test]
    fn severity_mapping() {
        assert_eq!(AlertLevel::Red.severity(), "critical");
        assert_eq!(AlertLevel::Orange.severity(), "high");
        assert_eq!(AlertLevel::Yellow.severity(), "medium");
    }
}
