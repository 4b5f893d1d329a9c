use std::fmt;
use serde::{Serialize, Deserialize};
#[cfg(any(windows, test))]
use tracing::warn;

use crate::{error::ProviderError, level::BrightnessLevel};

/// on windows this is the `monitorDevicePath`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorId(pub String);

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// os level brightness service, every call is blocking
pub trait BrightnessProvider {
    fn list_monitors(&mut self) -> Result<Vec<MonitorId>, ProviderError>;

    /// `None` reads every known monitor
    fn get_brightness(&mut self, display: Option<&MonitorId>) -> Result<Vec<u32>, ProviderError>;

    fn set_brightness(&mut self, value: BrightnessLevel, display: &MonitorId) -> Result<(), ProviderError>;
}

#[cfg(windows)]
pub type SystemProvider = crate::monitors::WindowsProvider;

#[cfg(not(windows))]
pub type SystemProvider = UnsupportedProvider;

/// keeps the tray usable where there is no brightness backend
#[cfg(not(windows))]
#[derive(Debug, Default)]
pub struct UnsupportedProvider;

#[cfg(not(windows))]
impl UnsupportedProvider {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(windows))]
impl BrightnessProvider for UnsupportedProvider {
    fn list_monitors(&mut self) -> Result<Vec<MonitorId>, ProviderError> {
        Err(ProviderError::Unsupported)
    }

    fn get_brightness(&mut self, _display: Option<&MonitorId>) -> Result<Vec<u32>, ProviderError> {
        Err(ProviderError::Unsupported)
    }

    fn set_brightness(&mut self, _value: BrightnessLevel, _display: &MonitorId) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported)
    }
}

/// first item whose id is `device_path`; a group that couldn't be queried
/// (eg. one logical monitor) is logged and skipped
#[cfg(any(windows, test))]
pub fn first_match<T, I>(groups: I, device_path: &str) -> Option<T>
where
    I: IntoIterator<Item = Result<Vec<(String, T)>, ProviderError>>,
{
    groups.into_iter().find_map(|group| match group {
        Ok(group) => group
            .into_iter()
            .find(|(id, _)| id == device_path)
            .map(|(_, item)| item),
        Err(e) => {
            warn!("skipping a logical monitor while looking for `{}`: {}", device_path, e);
            None
        }
    })
}
