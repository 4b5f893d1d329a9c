use std::{
    env, fmt, thread,
    str::FromStr,
    path::{Path, PathBuf},
};
use tracing::{error, info};

use crate::error::AutostartError;

/// name of the shortcut file and of the run key value
pub const ENTRY_NAME: &str = "BrightnessController";
pub const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutostartMethod {
    /// `.lnk` in the user's startup folder
    Shortcut,
    /// `HKCU\...\Run` value
    RunKey,
    Disabled,
}

impl FromStr for AutostartMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shortcut" | "lnk" => Ok(Self::Shortcut),
            "registry" | "runkey" | "run-key" => Ok(Self::RunKey),
            "off" | "disabled" | "none" => Ok(Self::Disabled),
            other => Err(format!("unknown autostart method `{other}`")),
        }
    }
}

impl fmt::Display for AutostartMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shortcut => "shortcut",
            Self::RunKey => "registry",
            Self::Disabled => "disabled",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutostartOutcome {
    Installed,
    AlreadyPresent,
    Skipped,
}

/// `<roaming appdata>\Microsoft\Windows\Start Menu\Programs\Startup\<name>.lnk`
pub fn shortcut_path(roaming: &Path) -> PathBuf {
    roaming
        .join("Microsoft")
        .join("Windows")
        .join("Start Menu")
        .join("Programs")
        .join("Startup")
        .join(format!("{ENTRY_NAME}.lnk"))
}

/// run key command line, quoted so paths with spaces survive
pub fn run_command(exe: &Path) -> String {
    format!("\"{}\"", exe.display())
}

/// installs the login entry for `exe` unless it's already there
pub fn ensure_registered(method: AutostartMethod, exe: &Path) -> Result<AutostartOutcome, AutostartError> {
    match method {
        AutostartMethod::Disabled => Ok(AutostartOutcome::Skipped),
        AutostartMethod::Shortcut => {
            let roaming = dirs::config_dir().ok_or(AutostartError::StartupFolder)?;
            ensure_shortcut(&shortcut_path(&roaming), exe, platform::create_shortcut)
        }
        AutostartMethod::RunKey => ensure_run_value(
            &run_command(exe),
            || platform::read_run_value(ENTRY_NAME),
            |command| platform::write_run_value(ENTRY_NAME, command),
        ),
    }
}

/// present as soon as `link` exists, whatever it points at
fn ensure_shortcut<C>(link: &Path, exe: &Path, create: C) -> Result<AutostartOutcome, AutostartError>
where
    C: FnOnce(&Path, &Path) -> Result<(), AutostartError>,
{
    if link.exists() {
        return Ok(AutostartOutcome::AlreadyPresent);
    }
    create(link, exe)?;
    Ok(AutostartOutcome::Installed)
}

/// present only when the stored value is exactly `command`, a stale path
/// gets overwritten
fn ensure_run_value<R, W>(command: &str, read: R, write: W) -> Result<AutostartOutcome, AutostartError>
where
    R: FnOnce() -> Result<Option<String>, AutostartError>,
    W: FnOnce(&str) -> Result<(), AutostartError>,
{
    if read()?.as_deref() == Some(command) {
        return Ok(AutostartOutcome::AlreadyPresent);
    }
    write(command)?;
    Ok(AutostartOutcome::Installed)
}

/// one shot, off the ui thread, failures only end up in the log
pub fn register_in_background(method: AutostartMethod) {
    let spawned = thread::Builder::new()
        .name("autostart".into())
        .spawn(move || {
            let result = env::current_exe()
                .map_err(AutostartError::Executable)
                .and_then(|exe| ensure_registered(method, &exe));
            match result {
                Ok(AutostartOutcome::Installed) => info!("autostart entry installed ({})", method),
                Ok(AutostartOutcome::AlreadyPresent) => info!("autostart entry already present ({})", method),
                Ok(AutostartOutcome::Skipped) => info!("autostart disabled"),
                Err(e) => error!("could not register autostart: {}", e),
            }
        });

    if let Err(e) = spawned {
        error!("failed to spawn autostart thread: {}", e);
    }
}

#[cfg(windows)]
mod platform {
    use std::path::Path;
    use windows::{
        core::{HSTRING, Interface, PCWSTR},
        Win32::{
            Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS},
            System::{
                Com::{
                    CoCreateInstance, CoInitializeEx, CoUninitialize, IPersistFile,
                    CLSCTX_INPROC_SERVER, COINIT_APARTMENTTHREADED,
                },
                Registry::{
                    RegCloseKey, RegCreateKeyExW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
                    HKEY, HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, REG_OPTION_NON_VOLATILE,
                    REG_SAM_FLAGS, REG_SZ,
                },
            },
            UI::Shell::{IShellLinkW, ShellLink},
        },
    };

    use super::RUN_KEY;
    use crate::error::AutostartError;

    /// closes the key on drop
    struct RunKey(HKEY);

    impl RunKey {
        /// `None` when the key doesn't exist
        fn open(access: REG_SAM_FLAGS) -> Result<Option<Self>, AutostartError> {
            let mut hkey = HKEY::default();
            let err = unsafe {
                RegOpenKeyExW(HKEY_CURRENT_USER, &HSTRING::from(RUN_KEY), None, access, &mut hkey)
            };
            if err == ERROR_FILE_NOT_FOUND {
                return Ok(None);
            }
            err.ok()
                .map_err(|e| AutostartError::Registry(format!("open {RUN_KEY}: {e}")))?;
            Ok(Some(Self(hkey)))
        }

        /// opens the key for writing, creating it on profiles that lack it
        fn create() -> Result<Self, AutostartError> {
            let mut hkey = HKEY::default();
            unsafe {
                RegCreateKeyExW(
                    HKEY_CURRENT_USER,
                    &HSTRING::from(RUN_KEY),
                    None,
                    PCWSTR::null(),
                    REG_OPTION_NON_VOLATILE,
                    KEY_WRITE,
                    None,
                    &mut hkey,
                    None,
                )
                .ok()
                .map_err(|e| AutostartError::Registry(format!("create {RUN_KEY}: {e}")))?;
            }
            Ok(Self(hkey))
        }
    }

    impl Drop for RunKey {
        fn drop(&mut self) {
            unsafe {
                let _ = RegCloseKey(self.0);
            }
        }
    }

    pub fn read_run_value(name: &str) -> Result<Option<String>, AutostartError> {
        let Some(key) = RunKey::open(KEY_READ)? else {
            return Ok(None);
        };
        let name = HSTRING::from(name);
        let mut size: u32 = 0;
        unsafe {
            let err = RegQueryValueExW(key.0, &name, None, None, None, Some(&mut size as *mut u32));
            if err == ERROR_FILE_NOT_FOUND {
                return Ok(None);
            }
            if err != ERROR_SUCCESS {
                return Err(AutostartError::Registry(format!("query size: {err:?}")));
            }

            let mut buffer = vec![0u16; (size as usize).div_ceil(2)];
            RegQueryValueExW(
                key.0,
                &name,
                None,
                None,
                Some(buffer.as_mut_ptr() as *mut u8),
                Some(&mut size as *mut u32),
            )
            .ok()
            .map_err(|e| AutostartError::Registry(format!("query value: {e}")))?;

            let end = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
            Ok(Some(String::from_utf16_lossy(&buffer[..end])))
        }
    }

    pub fn write_run_value(name: &str, command: &str) -> Result<(), AutostartError> {
        let key = RunKey::create()?;
        // REG_SZ wants the terminating nul included
        let bytes: Vec<u8> = command
            .encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(u16::to_le_bytes)
            .collect();
        unsafe {
            RegSetValueExW(key.0, &HSTRING::from(name), None, REG_SZ, Some(&bytes))
                .ok()
                .map_err(|e| AutostartError::Registry(format!("set value: {e}")))
        }
    }

    pub fn create_shortcut(link: &Path, exe: &Path) -> Result<(), AutostartError> {
        let shortcut_err = |e: windows::core::Error| AutostartError::Shortcut {
            path: link.to_path_buf(),
            reason: e.to_string(),
        };
        let working_dir = exe.parent().unwrap_or(exe);

        unsafe {
            // S_FALSE when this thread already joined an apartment
            let initialized = CoInitializeEx(None, COINIT_APARTMENTTHREADED).is_ok();

            let result = (|| -> windows::core::Result<()> {
                let shell_link: IShellLinkW = CoCreateInstance(&ShellLink, None, CLSCTX_INPROC_SERVER)?;
                shell_link.SetPath(&HSTRING::from(exe.as_os_str()))?;
                shell_link.SetWorkingDirectory(&HSTRING::from(working_dir.as_os_str()))?;
                shell_link.SetIconLocation(&HSTRING::from(exe.as_os_str()), 0)?;
                let file: IPersistFile = shell_link.cast()?;
                file.Save(&HSTRING::from(link.as_os_str()), true)
            })();

            if initialized {
                CoUninitialize();
            }
            result.map_err(shortcut_err)
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use std::path::Path;
    use crate::error::AutostartError;

    pub fn read_run_value(_name: &str) -> Result<Option<String>, AutostartError> {
        Err(AutostartError::Unsupported)
    }

    pub fn write_run_value(_name: &str, _command: &str) -> Result<(), AutostartError> {
        Err(AutostartError::Unsupported)
    }

    pub fn create_shortcut(_link: &Path, _exe: &Path) -> Result<(), AutostartError> {
        Err(AutostartError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, fs};

    #[test]
    fn parses_methods() {
        assert_eq!("shortcut".parse::<AutostartMethod>(), Ok(AutostartMethod::Shortcut));
        assert_eq!("Registry".parse::<AutostartMethod>(), Ok(AutostartMethod::RunKey));
        assert_eq!("runkey".parse::<AutostartMethod>(), Ok(AutostartMethod::RunKey));
        assert_eq!("OFF".parse::<AutostartMethod>(), Ok(AutostartMethod::Disabled));
        assert!("later".parse::<AutostartMethod>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for method in [AutostartMethod::Shortcut, AutostartMethod::RunKey, AutostartMethod::Disabled] {
            assert_eq!(method.to_string().parse::<AutostartMethod>(), Ok(method));
        }
    }

    #[test]
    fn shortcut_lives_in_startup_folder() {
        let path = shortcut_path(Path::new("roaming"));
        let components: Vec<_> = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            components,
            ["roaming", "Microsoft", "Windows", "Start Menu", "Programs", "Startup", "BrightnessController.lnk"]
        );
    }

    #[test]
    fn run_command_is_quoted() {
        let exe = Path::new("C:/Program Files/Brightness Controller/brightness-controller.exe");
        assert_eq!(
            run_command(exe),
            "\"C:/Program Files/Brightness Controller/brightness-controller.exe\""
        );
    }

    #[test]
    fn disabled_is_skipped() {
        let outcome = ensure_registered(AutostartMethod::Disabled, Path::new("app.exe")).unwrap();
        assert_eq!(outcome, AutostartOutcome::Skipped);
    }

    #[cfg(not(windows))]
    #[test]
    fn run_key_is_unsupported_off_windows() {
        let result = ensure_registered(AutostartMethod::RunKey, Path::new("app"));
        assert!(matches!(result, Err(AutostartError::Unsupported)));
    }

    #[test]
    fn existing_shortcut_is_left_alone() {
        let roaming = tempfile::tempdir().unwrap();
        let link = shortcut_path(roaming.path());
        fs::create_dir_all(link.parent().unwrap()).unwrap();
        fs::write(&link, b"").unwrap();

        let outcome = ensure_shortcut(&link, Path::new("app.exe"), |_, _| {
            panic!("shortcut must not be recreated")
        });
        assert_eq!(outcome.unwrap(), AutostartOutcome::AlreadyPresent);
    }

    #[test]
    fn missing_shortcut_is_created_for_the_executable() {
        let roaming = tempfile::tempdir().unwrap();
        let link = shortcut_path(roaming.path());
        let mut created = None;

        let outcome = ensure_shortcut(&link, Path::new("C:/apps/bc.exe"), |link, exe| {
            created = Some((link.to_path_buf(), exe.to_path_buf()));
            Ok(())
        });
        assert_eq!(outcome.unwrap(), AutostartOutcome::Installed);
        assert_eq!(created, Some((link, PathBuf::from("C:/apps/bc.exe"))));
    }

    #[test]
    fn shortcut_creation_failure_is_reported() {
        let roaming = tempfile::tempdir().unwrap();
        let link = shortcut_path(roaming.path());
        let outcome = ensure_shortcut(&link, Path::new("app.exe"), |link, _| {
            Err(AutostartError::Shortcut {
                path: link.to_path_buf(),
                reason: "access denied".into(),
            })
        });
        assert!(matches!(outcome, Err(AutostartError::Shortcut { .. })));
    }

    #[test]
    fn matching_run_value_is_left_alone() {
        let command = run_command(Path::new("C:/apps/bc.exe"));
        let outcome = ensure_run_value(
            &command,
            || Ok(Some(command.clone())),
            |_| panic!("run value must not be rewritten"),
        );
        assert_eq!(outcome.unwrap(), AutostartOutcome::AlreadyPresent);
    }

    #[test]
    fn missing_or_stale_run_value_is_written() {
        let command = run_command(Path::new("C:/apps/bc.exe"));
        for existing in [None, Some("\"C:/old/bc.exe\"".to_string())] {
            let written = Cell::new(None);
            let outcome = ensure_run_value(
                &command,
                || Ok(existing),
                |value| {
                    written.set(Some(value.to_string()));
                    Ok(())
                },
            );
            assert_eq!(outcome.unwrap(), AutostartOutcome::Installed);
            assert_eq!(written.take(), Some(command.clone()));
        }
    }
}
