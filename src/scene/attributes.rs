//! Typed per-entity settings records.
//!
//! Light carriers and materials carry small settings records. An absent
//! record or field means "use the documented default", which is resolved
//! once by [`LightConfig::point_settings`] / [`LightConfig::spot_settings`].

use serde::{Deserialize, Serialize};

/// Whether a light is switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LightStatus {
    #[default]
    On,
    Off,
}

impl LightStatus {
    /// Case-insensitive: `"ON"` is on, anything else is off.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("on") {
            LightStatus::On
        } else {
            LightStatus::Off
        }
    }

    pub fn is_on(self) -> bool {
        self == LightStatus::On
    }
}

impl From<String> for LightStatus {
    fn from(s: String) -> Self {
        LightStatus::parse(&s)
    }
}

impl From<LightStatus> for String {
    fn from(status: LightStatus) -> Self {
        match status {
            LightStatus::On => "On".to_string(),
            LightStatus::Off => "Off".to_string(),
        }
    }
}

/// Light status breakpoints parsed from `time[STATE]-time[STATE]-...`.
///
/// Times are in seconds; a breakpoint takes effect once the current time
/// reaches it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationKeys {
    breakpoints: Vec<(f64, LightStatus)>,
}

impl AnimationKeys {
    /// Parse an animation string. Malformed segments are skipped, so a
    /// blank string yields no breakpoints.
    pub fn parse(s: &str) -> Self {
        let breakpoints = s
            .split('-')
            .filter_map(|segment| {
                let (time, rest) = segment.trim().split_once('[')?;
                let state = rest.trim_end_matches(']');
                let time = time.trim().parse::<f64>().ok()?;
                Some((time, LightStatus::parse(state)))
            })
            .collect();
        Self { breakpoints }
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    pub fn breakpoints(&self) -> &[(f64, LightStatus)] {
        &self.breakpoints
    }

    /// State of the last breakpoint whose time is not after `time`.
    /// `None` before the first breakpoint.
    pub fn state_at(&self, time: f64) -> Option<LightStatus> {
        self.breakpoints
            .iter()
            .take_while(|(threshold, _)| *threshold <= time)
            .last()
            .map(|(_, state)| *state)
    }
}

/// Settings stored on a light carrier instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LightConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub power: Option<f64>,
    #[serde(default)]
    pub status: Option<LightStatus>,
    /// Animation string, e.g. `"1[On]-4[Off]-7[On]"`.
    #[serde(default)]
    pub animate: Option<String>,
    #[serde(default)]
    pub attenuation: Option<String>,
    /// Spot hot spot angle.
    #[serde(default)]
    pub radius: Option<f64>,
    /// Spot fall off angle.
    #[serde(default)]
    pub falloff: Option<f64>,
    /// Distance from the light to its target, in model units.
    #[serde(default)]
    pub distance: Option<f64>,
}

/// Fully resolved light settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LightSettings {
    pub name: String,
    pub power: f64,
    pub status: LightStatus,
    pub animation: AnimationKeys,
    pub attenuation: String,
    pub hot_spot: f64,
    pub fall_off: f64,
    pub focus_distance: Option<f64>,
}

const DEFAULT_ATTENUATION: &str = "Inverse Square";

impl LightConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Point light defaults: power `0.7 * d^2` (d = 1 when unknown).
    pub fn point_settings(&self) -> LightSettings {
        let d = self.distance.unwrap_or(1.0);
        LightSettings {
            name: self.name.clone().unwrap_or_else(|| "Pointlight".to_string()),
            power: self.power.unwrap_or_else(|| round_tenth(0.7 * d * d)),
            hot_spot: 0.0,
            fall_off: 0.0,
            focus_distance: None,
            ..self.common_settings()
        }
    }

    /// Spot light defaults: power `d^2` with a known distance, otherwise 5;
    /// hot spot 0, fall off 100.
    pub fn spot_settings(&self) -> LightSettings {
        let power = match self.distance {
            Some(d) => round_tenth(d * d),
            None => 5.0,
        };
        LightSettings {
            name: self.name.clone().unwrap_or_else(|| "Spotlight".to_string()),
            power: self.power.unwrap_or(power),
            hot_spot: self.radius.unwrap_or(0.0),
            fall_off: self.falloff.unwrap_or(100.0),
            focus_distance: self.distance,
            ..self.common_settings()
        }
    }

    fn common_settings(&self) -> LightSettings {
        LightSettings {
            name: String::new(),
            power: 0.0,
            status: self.status.unwrap_or_default(),
            animation: self
                .animate
                .as_deref()
                .map(AnimationKeys::parse)
                .unwrap_or_default(),
            attenuation: self
                .attenuation
                .clone()
                .unwrap_or_else(|| DEFAULT_ATTENUATION.to_string()),
            hot_spot: 0.0,
            fall_off: 0.0,
            focus_distance: None,
        }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl LightSettings {
    /// Status at the given animation time, or the configured status when
    /// not animating or before the first breakpoint.
    pub fn status_at(&self, time: Option<f64>) -> LightStatus {
        time.and_then(|t| self.animation.state_at(t))
            .unwrap_or(self.status)
    }
}

/// Renderer material data attached to a host material, usually copied
/// from a material library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialAttributes {
    /// Verbatim material object body.
    #[serde(default)]
    pub kt_mat: Option<String>,
    /// Verbatim mesh tail (map channel and object parameters).
    #[serde(default)]
    pub kt_map: Option<String>,
    /// Name of the library material this was copied from.
    #[serde(default)]
    pub kt_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_animated_light_states() {
        let keys = AnimationKeys::parse("0[On]-4[Off]-7[On]");
        assert_eq!(keys.breakpoints().len(), 3);

        let fps = 25.0;
        let at_frame = |frame: f64| keys.state_at(frame / fps);
        assert_eq!(at_frame(2.0 * fps), Some(LightStatus::On));
        assert_eq!(at_frame(5.0 * fps), Some(LightStatus::Off));
        assert_eq!(at_frame(8.0 * fps), Some(LightStatus::On));
    }

    #[test]
    fn test_default_before_first_breakpoint() {
        let settings = LightConfig {
            status: Some(LightStatus::Off),
            animate: Some("1[On]-4[Off]".to_string()),
            ..Default::default()
        }
        .point_settings();
        assert_eq!(settings.status_at(Some(0.5)), LightStatus::Off);
        assert_eq!(settings.status_at(Some(2.0)), LightStatus::On);
        assert_eq!(settings.status_at(None), LightStatus::Off);
    }

    #[test]
    fn test_blank_animation_is_empty() {
        assert!(AnimationKeys::parse(" ").is_empty());
        assert!(AnimationKeys::parse("").is_empty());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(LightStatus::parse("ON"), LightStatus::On);
        assert_eq!(LightStatus::parse("on"), LightStatus::On);
        assert_eq!(LightStatus::parse("Off"), LightStatus::Off);
        assert_eq!(LightStatus::parse("dim"), LightStatus::Off);
    }

    #[test]
    fn test_point_defaults() {
        let settings = LightConfig::default().point_settings();
        assert_eq!(settings.name, "Pointlight");
        assert_eq!(settings.power, 0.7);
        assert_eq!(settings.attenuation, "Inverse Square");
        assert!(settings.status.is_on());

        let far = LightConfig {
            distance: Some(2.0),
            ..Default::default()
        };
        assert_eq!(far.point_settings().power, 2.8);
    }

    #[test]
    fn test_spot_defaults() {
        let settings = LightConfig::default().spot_settings();
        assert_eq!(settings.name, "Spotlight");
        assert_eq!(settings.power, 5.0);
        assert_eq!(settings.hot_spot, 0.0);
        assert_eq!(settings.fall_off, 100.0);
        assert_eq!(settings.focus_distance, None);

        let aimed = LightConfig {
            distance: Some(3.0),
            ..Default::default()
        }
        .spot_settings();
        assert_eq!(aimed.power, 9.0);
        assert_eq!(aimed.focus_distance, Some(3.0));
    }

    #[test]
    fn test_light_config_from_json() {
        let config: LightConfig =
            serde_json::from_str(r#"{"name": "Lamp", "power": 2.5, "status": "OFF"}"#).unwrap();
        assert_eq!(config.name.as_deref(), Some("Lamp"));
        assert_eq!(config.status, Some(LightStatus::Off));
    }
}
