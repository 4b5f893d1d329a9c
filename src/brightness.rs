//!
//! ddc/ci & ioctl brightness calls, adapted from:
//! `https://github.com/stephaneyfx/brightness/blob/master/src/blocking/windows.rs`
//! its under 0BSD license & belongs to respective owners!!
//! `https://spdx.org/licenses/0BSD.html`
//! credit: @jacob-pro, @stephaneyfx
//!
use std::{
    ffi::c_void,
    mem::size_of,
};
use windows::{
    core::BOOL,
    Win32::{
        System::IO::DeviceIoControl,
        Devices::Display::{
            DISPLAY_BRIGHTNESS, DISPLAYPOLICY_AC, DISPLAYPOLICY_DC,
            GetMonitorBrightness, SetMonitorBrightness, IOCTL_VIDEO_QUERY_DISPLAY_BRIGHTNESS,
            IOCTL_VIDEO_QUERY_SUPPORTED_BRIGHTNESS, IOCTL_VIDEO_SET_DISPLAY_BRIGHTNESS,
        },
    },
};

use crate::{
    error::ProviderError,
    monitors::MonitorDevice,
};

fn read_err(device: &MonitorDevice, reason: impl std::fmt::Debug) -> ProviderError {
    ProviderError::Read {
        monitor: device.friendly_name.clone(),
        reason: format!("{reason:?}"),
    }
}

fn write_err(device: &MonitorDevice, reason: impl std::fmt::Debug) -> ProviderError {
    ProviderError::Write {
        monitor: device.friendly_name.clone(),
        reason: format!("{reason:?}"),
    }
}

/// levels an internal panel accepts, usually a handful between 0 & 100
#[derive(Debug)]
pub struct SupportedLevels(Vec<u8>);

impl SupportedLevels {
    pub fn nearest(&self, percentage: u8) -> u8 {
        self.0
            .iter()
            .copied()
            .min_by_key(|&level| (level as i16 - percentage as i16).abs())
            .unwrap_or(percentage)
    }
}

/// raw vcp 0x10 range of an external monitor
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DdcciRange {
    pub min: u32,
    pub max: u32,
    pub current: u32,
}

impl DdcciRange {
    pub fn percentage(&self) -> u32 {
        if self.max <= self.min {
            return 0;
        }
        let span = (self.max - self.min) as f64;
        let current = self.current.saturating_sub(self.min) as f64;
        (current / span * 100.0).round() as u32
    }

    pub fn raw_for(&self, percentage: u8) -> u32 {
        let span = self.max.saturating_sub(self.min) as f64;
        (percentage as f64 / 100.0 * span).round() as u32 + self.min
    }
}

pub fn ddcci_read(device: &MonitorDevice) -> Result<DdcciRange, ProviderError> {
    let mut range = DdcciRange::default();
    unsafe {
        BOOL(GetMonitorBrightness(
            device.physical_monitor.0,
            &mut range.min,
            &mut range.current,
            &mut range.max,
        ))
        .ok()
        .map_err(|e| read_err(device, e))?;
    }
    Ok(range)
}

pub fn ddcci_write(device: &MonitorDevice, raw: u32) -> Result<(), ProviderError> {
    unsafe {
        BOOL(SetMonitorBrightness(device.physical_monitor.0, raw))
            .ok()
            .map_err(|e| write_err(device, e))
    }
}

pub fn ioctl_supported_levels(device: &MonitorDevice) -> Result<SupportedLevels, ProviderError> {
    let mut bytes_returned = 0;
    let mut out_buffer = Vec::<u8>::with_capacity(256);
    unsafe {
        DeviceIoControl(
            device.handle.0,
            IOCTL_VIDEO_QUERY_SUPPORTED_BRIGHTNESS,
            None,
            0,
            Some(out_buffer.as_mut_ptr() as *mut c_void),
            out_buffer.capacity() as u32,
            Some(&mut bytes_returned),
            None,
        )
        .map_err(|e| read_err(device, e))?;
        out_buffer.set_len(bytes_returned as usize);
    }
    Ok(SupportedLevels(out_buffer))
}

/// percentage of an internal panel for the active power policy
pub fn ioctl_read(device: &MonitorDevice) -> Result<u32, ProviderError> {
    let mut bytes_returned = 0;
    let mut display_brightness = DISPLAY_BRIGHTNESS::default();
    unsafe {
        DeviceIoControl(
            device.handle.0,
            IOCTL_VIDEO_QUERY_DISPLAY_BRIGHTNESS,
            None,
            0,
            Some(&mut display_brightness as *mut DISPLAY_BRIGHTNESS as *mut c_void),
            size_of::<DISPLAY_BRIGHTNESS>() as u32,
            Some(&mut bytes_returned),
            None,
        )
        .map_err(|e| read_err(device, e))?;
    }
    match display_brightness.ucDisplayPolicy as u32 {
        DISPLAYPOLICY_AC => Ok(display_brightness.ucACBrightness as u32),
        DISPLAYPOLICY_DC => Ok(display_brightness.ucDCBrightness as u32),
        policy => Err(read_err(device, format!("unexpected display policy {policy}"))),
    }
}

pub fn ioctl_write(device: &MonitorDevice, value: u8) -> Result<(), ProviderError> {
    // bit 0: ac, bit 1: dc
    const DISPLAYPOLICY_BOTH: u8 = 3;
    let mut display_brightness = DISPLAY_BRIGHTNESS {
        ucACBrightness: value,
        ucDCBrightness: value,
        ucDisplayPolicy: DISPLAYPOLICY_BOTH,
    };
    let mut bytes_returned = 0;
    unsafe {
        DeviceIoControl(
            device.handle.0,
            IOCTL_VIDEO_SET_DISPLAY_BRIGHTNESS,
            Some(&mut display_brightness as *mut DISPLAY_BRIGHTNESS as *mut c_void),
            size_of::<DISPLAY_BRIGHTNESS>() as u32,
            None,
            0,
            Some(&mut bytes_returned),
            None,
        )
        .map_err(|e| write_err(device, e))?;
    }
    // a query issued right after the set can still report the old value
    std::thread::sleep(std::time::Duration::from_nanos(1));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddcci_range_maps_both_ways() {
        let range = DdcciRange { min: 0, max: 100, current: 40 };
        assert_eq!(range.percentage(), 40);
        assert_eq!(range.raw_for(65), 65);

        let range = DdcciRange { min: 10, max: 60, current: 35 };
        assert_eq!(range.percentage(), 50);
        assert_eq!(range.raw_for(100), 60);
        assert_eq!(range.raw_for(0), 10);
    }

    #[test]
    fn ddcci_range_tolerates_empty_span() {
        let range = DdcciRange { min: 50, max: 50, current: 50 };
        assert_eq!(range.percentage(), 0);
        assert_eq!(range.raw_for(80), 50);
    }

    #[test]
    fn picks_nearest_supported_level() {
        let levels = SupportedLevels(vec![0, 25, 50, 75, 100]);
        assert_eq!(levels.nearest(60), 50);
        assert_eq!(levels.nearest(63), 75);
        assert_eq!(SupportedLevels(vec![]).nearest(42), 42);
    }
}
