use std::{
    fmt, ptr, iter,
    ffi::{OsString, OsStr},
    os::windows::ffi::{OsStringExt, OsStrExt},
};
use tracing::{debug, warn};
use windows::{
    core::{BOOL, PCWSTR},
    Win32::{
        Foundation::{
            ERROR_SUCCESS, HANDLE, CloseHandle, ERROR_ACCESS_DENIED, LPARAM, RECT,
        },
        Graphics::Gdi::{
            DISPLAY_DEVICE_ACTIVE, DISPLAY_DEVICEW, EnumDisplayDevicesW, EnumDisplayMonitors,
            GetMonitorInfoW, HDC, HMONITOR, MONITORINFO, MONITORINFOEXW,
        },
        Devices::Display::{
            QueryDisplayConfig, DestroyPhysicalMonitor,
            DisplayConfigGetDeviceInfo, GetDisplayConfigBufferSizes,
            GetNumberOfPhysicalMonitorsFromHMONITOR, GetPhysicalMonitorsFromHMONITOR,
            DISPLAYCONFIG_OUTPUT_TECHNOLOGY_DISPLAYPORT_EMBEDDED,
            DISPLAYCONFIG_PATH_INFO, DISPLAYCONFIG_TARGET_DEVICE_NAME,
            QDC_ONLY_ACTIVE_PATHS, DISPLAYCONFIG_MODE_INFO, PHYSICAL_MONITOR,
            DISPLAYCONFIG_DEVICE_INFO_HEADER, DISPLAYCONFIG_MODE_INFO_TYPE_TARGET,
            DISPLAYCONFIG_OUTPUT_TECHNOLOGY_LVDS, DISPLAYCONFIG_VIDEO_OUTPUT_TECHNOLOGY,
            DISPLAYCONFIG_DEVICE_INFO_GET_TARGET_NAME, DISPLAYCONFIG_OUTPUT_TECHNOLOGY_INTERNAL,
        },
        UI::WindowsAndMessaging::EDD_GET_DEVICE_INTERFACE_NAME,
        Storage::FileSystem::{
            CreateFileW, FILE_GENERIC_READ, FILE_GENERIC_WRITE, FILE_SHARE_READ, FILE_SHARE_WRITE,
            OPEN_EXISTING,
        },
    }
};

use crate::{
    brightness,
    error::ProviderError,
    level::BrightnessLevel,
    provider::{self, BrightnessProvider, MonitorId},
};

#[inline]
fn flag_set<T: std::ops::BitAnd<Output = T> + std::cmp::PartialEq + Copy>(t: T, flag: T) -> bool {
    t & flag == flag
}

/// file handle of an internal panel, closed on drop
pub struct SafeHandle(pub HANDLE);

impl SafeHandle {
    fn null() -> Self {
        Self(HANDLE(ptr::null_mut()))
    }
}

impl Drop for SafeHandle {
    fn drop(&mut self) {
        unsafe {
            if !self.0.is_invalid() {
                let _ = CloseHandle(self.0);
            }
        }
    }
}

impl fmt::Debug for SafeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// ddc/ci handle of an external monitor, destroyed on drop
pub struct SafePhysicalMonitor(pub HANDLE);

impl SafePhysicalMonitor {
    fn null() -> Self {
        Self(HANDLE(ptr::null_mut()))
    }
}

impl Drop for SafePhysicalMonitor {
    fn drop(&mut self) {
        unsafe {
            if !self.0.is_invalid() {
                let _ = DestroyPhysicalMonitor(self.0);
            }
        }
    }
}

impl fmt::Debug for SafePhysicalMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// one connected display, owns its os handles
#[derive(Debug)]
pub struct MonitorDevice {
    /// `monitorDevicePath`
    pub id: MonitorId,
    /// name as shown in the windows settings
    pub friendly_name: String,
    /// valid for internal (ioctl) displays only
    pub handle: SafeHandle,
    /// valid for external (ddc/ci) displays only
    pub physical_monitor: SafePhysicalMonitor,
    pub output_technology: DISPLAYCONFIG_VIDEO_OUTPUT_TECHNOLOGY,
}

fn is_internal_technology(technology: DISPLAYCONFIG_VIDEO_OUTPUT_TECHNOLOGY) -> bool {
    matches!(
        technology,
        DISPLAYCONFIG_OUTPUT_TECHNOLOGY_INTERNAL
            | DISPLAYCONFIG_OUTPUT_TECHNOLOGY_LVDS
            | DISPLAYCONFIG_OUTPUT_TECHNOLOGY_DISPLAYPORT_EMBEDDED
    )
}

impl MonitorDevice {
    pub fn is_internal(&self) -> bool {
        is_internal_technology(self.output_technology)
    }

    pub fn get(&self) -> Result<u32, ProviderError> {
        if self.is_internal() {
            brightness::ioctl_read(self)
        } else {
            Ok(brightness::ddcci_read(self)?.percentage())
        }
    }

    pub fn set(&self, level: BrightnessLevel) -> Result<(), ProviderError> {
        if self.is_internal() {
            let supported = brightness::ioctl_supported_levels(self)?;
            brightness::ioctl_write(self, supported.nearest(level.value()))
        } else {
            let range = brightness::ddcci_read(self)?;
            brightness::ddcci_write(self, range.raw_for(level.value()))
        }
    }
}

fn wchar_to_string(s: &[u16]) -> String {
    let end = s.iter().position(|&x| x == 0).unwrap_or(s.len());
    OsString::from_wide(&s[..end]).to_string_lossy().into()
}

fn enumerate_err(reason: impl fmt::Debug) -> ProviderError {
    ProviderError::Enumerate(format!("{reason:?}"))
}

/// opens the `monitorDevicePath` of an internal display,
/// `None` for things that aren't real panels (eg. rdp sessions)
fn open_device_path(device_path: &str) -> Result<Option<SafeHandle>, ProviderError> {
    let wide: Vec<u16> = OsStr::new(device_path)
        .encode_wide()
        .chain(iter::once(0))
        .collect();

    let handle = unsafe {
        CreateFileW(
            PCWSTR(wide.as_ptr()),
            (FILE_GENERIC_READ | FILE_GENERIC_WRITE).0,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            None,
            OPEN_EXISTING,
            Default::default(),
            None,
        )
    };

    match handle {
        Ok(h) if !h.is_invalid() => Ok(Some(SafeHandle(h))),
        Ok(_) => Ok(None),
        Err(e) if e.code() == ERROR_ACCESS_DENIED.to_hresult() => Ok(None),
        Err(e) => Err(enumerate_err(format!("CreateFileW({device_path}): {e:?}"))),
    }
}

/// physical monitor handles behind a `HMONITOR`, wrapped right away so
/// none of them leak on an early return
fn physical_monitors(hmonitor: HMONITOR) -> Result<Vec<SafePhysicalMonitor>, ProviderError> {
    let mut count: u32 = 0;
    unsafe {
        GetNumberOfPhysicalMonitorsFromHMONITOR(hmonitor, &mut count).map_err(enumerate_err)?;
        let mut raw = vec![PHYSICAL_MONITOR::default(); count as usize];
        GetPhysicalMonitorsFromHMONITOR(hmonitor, &mut raw).map_err(enumerate_err)?;
        Ok(raw
            .into_iter()
            .map(|pm| SafePhysicalMonitor(pm.hPhysicalMonitor))
            .collect())
    }
}

/// active display devices attached to a `HMONITOR`
fn display_devices(hmonitor: HMONITOR) -> Result<Vec<DISPLAY_DEVICEW>, ProviderError> {
    unsafe {
        let mut info = MONITORINFOEXW::default();
        info.monitorInfo.cbSize = size_of::<MONITORINFOEXW>() as u32;
        GetMonitorInfoW(hmonitor, &mut info as *mut _ as *mut MONITORINFO)
            .ok()
            .map_err(enumerate_err)?;

        Ok((0..)
            .map_while(|device_number| {
                let mut device = DISPLAY_DEVICEW {
                    cb: size_of::<DISPLAY_DEVICEW>() as u32,
                    ..Default::default()
                };
                EnumDisplayDevicesW(
                    PCWSTR(info.szDevice.as_ptr()),
                    device_number,
                    &mut device,
                    EDD_GET_DEVICE_INTERFACE_NAME,
                )
                .as_bool()
                .then_some(device)
            })
            .filter(|device| flag_set(device.StateFlags, DISPLAY_DEVICE_ACTIVE))
            .collect())
    }
}

/// logical monitors; in "duplicate" mode several physical ones share one
fn hmonitors() -> Result<Vec<HMONITOR>, ProviderError> {
    extern "system" fn push_monitor(handle: HMONITOR, _: HDC, _: *mut RECT, data: LPARAM) -> BOOL {
        let monitors = unsafe { &mut *(data.0 as *mut Vec<HMONITOR>) };
        monitors.push(handle);
        true.into()
    }

    let mut handles = Vec::<HMONITOR>::new();
    unsafe {
        EnumDisplayMonitors(None, None, Some(push_monitor), LPARAM(&mut handles as *mut _ as isize))
            .ok()
            .map_err(enumerate_err)?;
    }
    Ok(handles)
}

/// device ids of a `HMONITOR` paired with their ddc/ci handles
fn paired_physical_monitors(hmonitor: HMONITOR) -> Result<Vec<(String, SafePhysicalMonitor)>, ProviderError> {
    let devices = display_devices(hmonitor)?;
    let physical = physical_monitors(hmonitor)?;
    // the only link between the two lists is their order
    if devices.len() != physical.len() {
        return Err(ProviderError::Enumerate(format!(
            "{} display devices but {} physical monitors, \
             a monitor was probably (dis)connected while enumerating",
            devices.len(),
            physical.len()
        )));
    }
    Ok(devices
        .iter()
        .map(|dev| wchar_to_string(&dev.DeviceID))
        .zip(physical)
        .collect())
}

/// ddc/ci handle whose display device matches `device_path`
fn find_physical_monitor(device_path: &str) -> Result<Option<SafePhysicalMonitor>, ProviderError> {
    let groups = hmonitors()?.into_iter().map(paired_physical_monitors);
    Ok(provider::first_match(groups, device_path))
}

fn target_name(mode: &DISPLAYCONFIG_MODE_INFO) -> Option<DISPLAYCONFIG_TARGET_DEVICE_NAME> {
    unsafe {
        let mut target: DISPLAYCONFIG_TARGET_DEVICE_NAME = std::mem::zeroed();
        target.header = DISPLAYCONFIG_DEVICE_INFO_HEADER {
            r#type: DISPLAYCONFIG_DEVICE_INFO_GET_TARGET_NAME,
            size: size_of::<DISPLAYCONFIG_TARGET_DEVICE_NAME>() as u32,
            adapterId: mode.adapterId,
            id: mode.id,
        };
        (DisplayConfigGetDeviceInfo(&mut target as *mut _ as *mut _) == ERROR_SUCCESS.0 as i32)
            .then_some(target)
    }
}

/// every active display with a usable brightness handle
pub fn get_monitors() -> Result<Vec<MonitorDevice>, ProviderError> {
    let mut path_count: u32 = 0;
    let mut mode_count: u32 = 0;

    let modes = unsafe {
        let err = GetDisplayConfigBufferSizes(QDC_ONLY_ACTIVE_PATHS, &mut path_count, &mut mode_count);
        if err != ERROR_SUCCESS {
            return Err(enumerate_err(format!("GetDisplayConfigBufferSizes: {err:?}")));
        }

        let mut paths = vec![DISPLAYCONFIG_PATH_INFO::default(); path_count as usize];
        let mut modes = vec![DISPLAYCONFIG_MODE_INFO::default(); mode_count as usize];
        let err = QueryDisplayConfig(
            QDC_ONLY_ACTIVE_PATHS,
            &mut path_count,
            paths.as_mut_ptr(),
            &mut mode_count,
            modes.as_mut_ptr(),
            None,
        );
        if err != ERROR_SUCCESS {
            return Err(enumerate_err(format!("QueryDisplayConfig: {err:?}")));
        }
        modes.truncate(mode_count as usize);
        modes
    };

    let mut monitors = Vec::new();
    for mode in modes.iter().filter(|m| m.infoType == DISPLAYCONFIG_MODE_INFO_TYPE_TARGET) {
        let Some(target) = target_name(mode) else {
            continue;
        };

        let internal = is_internal_technology(target.outputTechnology);
        let friendly = wchar_to_string(&target.monitorFriendlyDeviceName);
        // internal panels often report a blank name
        let friendly_name = match (friendly.trim().is_empty(), internal) {
            (false, _) => friendly,
            (true, true) => "Internal Display".to_string(),
            (true, false) => "Unknown Display".to_string(),
        };
        let device_path = wchar_to_string(&target.monitorDevicePath);

        let (handle, physical_monitor) = if internal {
            let handle = open_device_path(&device_path)
                .unwrap_or_else(|e| {
                    warn!("could not open `{}`: {}", friendly_name, e);
                    None
                })
                .unwrap_or_else(SafeHandle::null);
            (handle, SafePhysicalMonitor::null())
        } else {
            let physical = find_physical_monitor(&device_path)?.unwrap_or_else(SafePhysicalMonitor::null);
            (SafeHandle::null(), physical)
        };

        if handle.0.is_invalid() && physical_monitor.0.is_invalid() {
            warn!("no brightness handle for `{}`, skipping", friendly_name);
            continue;
        }

        monitors.push(MonitorDevice {
            id: MonitorId(device_path),
            friendly_name,
            handle,
            physical_monitor,
            output_technology: target.outputTechnology,
        });
    }

    debug!("monitors: {:?}", monitors);
    Ok(monitors)
}

/// win32 backed provider, keeps the handles of the last enumeration
#[derive(Debug, Default)]
pub struct WindowsProvider {
    devices: Vec<MonitorDevice>,
}

impl WindowsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn device(&self, id: &MonitorId) -> Result<&MonitorDevice, ProviderError> {
        self.devices
            .iter()
            .find(|d| &d.id == id)
            .ok_or_else(|| ProviderError::UnknownMonitor(id.0.clone()))
    }
}

impl BrightnessProvider for WindowsProvider {
    fn list_monitors(&mut self) -> Result<Vec<MonitorId>, ProviderError> {
        self.devices = get_monitors()?;
        Ok(self.devices.iter().map(|d| d.id.clone()).collect())
    }

    fn get_brightness(&mut self, display: Option<&MonitorId>) -> Result<Vec<u32>, ProviderError> {
        match display {
            Some(id) => Ok(vec![self.device(id)?.get()?]),
            None => self.devices.iter().map(MonitorDevice::get).collect(),
        }
    }

    fn set_brightness(&mut self, value: BrightnessLevel, display: &MonitorId) -> Result<(), ProviderError> {
        self.device(display)?.set(value)
    }
}
