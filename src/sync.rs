use tracing::{debug, error, info, warn};

use crate::{
    error::ProviderError,
    level::{BrightnessLevel, PanelSnapshot},
    provider::{BrightnessProvider, MonitorId},
};

/// result of pushing a level to every monitor
#[derive(Debug, Default)]
pub struct SetOutcome {
    pub applied: usize,
    pub failures: Vec<(MonitorId, ProviderError)>,
}

impl SetOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// single source of truth for the slider, label, tooltip & tray glyph
pub struct BrightnessSync<P> {
    provider: P,
    monitors: Vec<MonitorId>,
    level: BrightnessLevel,
    fallback: BrightnessLevel,
}

impl<P: BrightnessProvider> BrightnessSync<P> {
    /// enumerates monitors and seeds the level from the first one
    pub fn new(provider: P, fallback: BrightnessLevel) -> Self {
        let mut sync = Self {
            provider,
            monitors: Vec::new(),
            level: fallback,
            fallback,
        };
        sync.refresh_monitors();
        sync.level = sync.read_brightness();
        info!("initial brightness: {}, monitors: {}", sync.level, sync.monitors.len());
        sync
    }

    pub fn level(&self) -> BrightnessLevel {
        self.level
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot::from(self.level)
    }

    pub fn monitors(&self) -> &[MonitorId] {
        &self.monitors
    }

    /// keeps the previous list when enumeration fails
    pub fn refresh_monitors(&mut self) {
        match self.provider.list_monitors() {
            Ok(monitors) => {
                debug!("enumerated monitors: {:?}", monitors);
                self.monitors = monitors;
            }
            Err(e) => {
                error!("failed to enumerate monitors: {}", e);
            }
        }
    }

    /// current reading of the first monitor, fallback on any failure
    pub fn read_brightness(&mut self) -> BrightnessLevel {
        let display = self.monitors.first();
        match self.provider.get_brightness(display) {
            Ok(values) => match values.first() {
                Some(&value) => BrightnessLevel::from(value),
                None => {
                    warn!("brightness provider returned no readings, using {}", self.fallback);
                    self.fallback
                }
            },
            Err(e) => {
                error!("failed to read brightness, using {}: {}", self.fallback, e);
                self.fallback
            }
        }
    }

    /// optimistic: the level is updated before any monitor is touched and
    /// stays even when some (or all) of the writes fail
    pub fn set_brightness(&mut self, value: BrightnessLevel) -> SetOutcome {
        self.level = value;

        if self.monitors.is_empty() {
            self.refresh_monitors();
        }

        let mut outcome = SetOutcome::default();
        for monitor in &self.monitors {
            match self.provider.set_brightness(value, monitor) {
                Ok(()) => outcome.applied += 1,
                Err(e) => {
                    error!("error setting brightness: {}", e);
                    outcome.failures.push((monitor.clone(), e));
                }
            }
        }
        debug!("brightness {} applied to {}/{} monitors", value, outcome.applied, self.monitors.len());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{level::IconTier, provider::fake::FakeProvider};

    fn level(v: u8) -> BrightnessLevel {
        BrightnessLevel::from(v)
    }

    #[test]
    fn seeds_level_from_first_monitor() {
        let provider = FakeProvider::with_monitors(&[("DISPLAY1", 64), ("DISPLAY2", 20)]);
        let sync = BrightnessSync::new(provider, BrightnessLevel::default());
        assert_eq!(sync.level(), level(64));
        assert_eq!(sync.monitors().len(), 2);
    }

    #[test]
    fn read_falls_back_for_every_error_kind() {
        let errors: [fn() -> ProviderError; 5] = [
            || ProviderError::Enumerate("gone".into()),
            || ProviderError::UnknownMonitor("DISPLAY1".into()),
            || ProviderError::Read { monitor: "DISPLAY1".into(), reason: "i2c".into() },
            || ProviderError::Write { monitor: "DISPLAY1".into(), reason: "i2c".into() },
            || ProviderError::Unsupported,
        ];
        for make_err in errors {
            let mut provider = FakeProvider::with_monitors(&[("DISPLAY1", 90)]);
            provider.fail_read = Some(make_err);
            let mut sync = BrightnessSync::new(provider, BrightnessLevel::default());
            assert_eq!(sync.level(), level(50));
            assert_eq!(sync.read_brightness(), level(50));
        }
    }

    #[test]
    fn read_falls_back_without_monitors() {
        let provider = FakeProvider::default();
        let mut sync = BrightnessSync::new(provider, level(35));
        assert_eq!(sync.read_brightness(), level(35));
    }

    #[test]
    fn read_clamps_out_of_range_readings() {
        let provider = FakeProvider::with_monitors(&[("DISPLAY1", 140)]);
        let sync = BrightnessSync::new(provider, BrightnessLevel::default());
        assert_eq!(sync.level(), level(100));
    }

    #[test]
    fn label_follows_every_value() {
        let provider = FakeProvider::with_monitors(&[("DISPLAY1", 10)]);
        let mut sync = BrightnessSync::new(provider, BrightnessLevel::default());
        for v in 0..=100u8 {
            sync.set_brightness(level(v));
            assert_eq!(sync.snapshot().label, format!("{v}%"));
        }
    }

    #[test]
    fn writes_every_monitor() {
        let provider = FakeProvider::with_monitors(&[("DISPLAY1", 10), ("DISPLAY2", 10)]);
        let record = provider.record();
        let mut sync = BrightnessSync::new(provider, BrightnessLevel::default());

        let outcome = sync.set_brightness(level(77));
        assert!(outcome.is_complete());
        assert_eq!(outcome.applied, 2);
        assert_eq!(
            record.borrow().writes,
            vec![("DISPLAY1".to_string(), 77), ("DISPLAY2".to_string(), 77)]
        );
    }

    #[test]
    fn failing_monitor_does_not_roll_back_or_block_others() {
        let mut provider = FakeProvider::with_monitors(&[("DISPLAY1", 40), ("DISPLAY2", 40)]);
        provider.fail_write.insert("DISPLAY1".to_string());
        let record = provider.record();
        let mut sync = BrightnessSync::new(provider, BrightnessLevel::default());

        let outcome = sync.set_brightness(level(90));
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, MonitorId("DISPLAY1".into()));

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.label, "90%");
        assert_eq!(snapshot.tooltip, "Brightness: 90%");
        assert_eq!(snapshot.tier, IconTier::High);
        assert_eq!(record.borrow().values.get("DISPLAY2"), Some(&90));
    }

    #[test]
    fn re_enumerates_when_no_monitor_is_known() {
        let mut provider = FakeProvider::with_monitors(&[("DISPLAY1", 40)]);
        provider.fail_enumerate = true;
        let record = provider.record();
        let mut sync = BrightnessSync::new(provider, BrightnessLevel::default());
        assert!(sync.monitors().is_empty());

        let outcome = sync.set_brightness(level(30));
        assert_eq!(outcome.applied, 0);
        assert_eq!(record.borrow().enumerations, 2);
        assert_eq!(sync.level(), level(30));
    }

    #[test]
    fn refresh_keeps_previous_list_on_failure() {
        let provider = FakeProvider::with_monitors(&[("DISPLAY1", 40)]);
        let mut sync = BrightnessSync::new(provider, BrightnessLevel::default());
        sync.provider.fail_enumerate = true;
        sync.refresh_monitors();
        assert_eq!(sync.monitors(), &[MonitorId("DISPLAY1".into())]);
    }
}
