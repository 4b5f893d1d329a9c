use std::{env, str::FromStr};
use tracing::warn;

use crate::{autostart::AutostartMethod, level::BrightnessLevel};

pub const ENV_LOG: &str = "BRIGHTNESS_CONTROLLER_LOG";
pub const ENV_AUTOSTART: &str = "BRIGHTNESS_CONTROLLER_AUTOSTART";
pub const ENV_FALLBACK: &str = "BRIGHTNESS_CONTROLLER_FALLBACK";
pub const ENV_MARGIN: &str = "BRIGHTNESS_CONTROLLER_MARGIN";

/// runtime knobs, everything else lives in `tauri.conf.json`,
/// the log filter is read by `log::init_logging` from `ENV_LOG`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub autostart: AutostartMethod,
    /// used whenever the current brightness can't be read
    pub fallback_brightness: BrightnessLevel,
    /// gap between the panel & the work area edges, physical pixels
    pub panel_margin: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            autostart: AutostartMethod::Shortcut,
            fallback_brightness: BrightnessLevel::default(),
            panel_margin: 10,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// defaults overridden by whatever `lookup` returns
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(method) = parse_var(&lookup, ENV_AUTOSTART) {
            config.autostart = method;
        }
        if let Some(value) = parse_var::<i64>(&lookup, ENV_FALLBACK) {
            config.fallback_brightness = BrightnessLevel::clamped(value);
        }
        if let Some(margin) = parse_var::<i32>(&lookup, ENV_MARGIN) {
            config.panel_margin = margin.max(0);
        }
        config
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use super::*;

    fn config_with(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_overrides() {
        let config = config_with(&[]);
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.fallback_brightness.value(), 50);
        assert_eq!(config.panel_margin, 10);
        assert_eq!(config.autostart, AutostartMethod::Shortcut);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_with(&[
            (ENV_AUTOSTART, "registry"),
            (ENV_FALLBACK, "70"),
            (ENV_MARGIN, "24"),
        ]);
        assert_eq!(config.autostart, AutostartMethod::RunKey);
        assert_eq!(config.fallback_brightness.value(), 70);
        assert_eq!(config.panel_margin, 24);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = config_with(&[
            (ENV_AUTOSTART, "sometimes"),
            (ENV_FALLBACK, "bright"),
            (ENV_MARGIN, "-"),
        ]);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn fallback_is_clamped() {
        assert_eq!(config_with(&[(ENV_FALLBACK, "400")]).fallback_brightness.value(), 100);
        assert_eq!(config_with(&[(ENV_MARGIN, "-5")]).panel_margin, 0);
    }
}
