use std::sync::Arc;
use tracing::{error, info};
use tauri::{
    Emitter, Manager, WindowEvent, RunEvent,
    AppHandle, menu::{Menu, MenuItem},
    tray::{MouseButton, MouseButtonState,
        TrayIconBuilder, TrayIconEvent
    }
};
use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    log, utils, icons, autostart,
    config::AppConfig,
    provider::SystemProvider,
    level::{IconTier, PanelSnapshot},
    events::{self, AppEvent, EventSender, PanelSurface},
};

pub const TRAY_ID: &str = "brightness-tray";
pub const PANEL_LABEL: &str = "panel";
/// pushed to the webview with a `PanelSnapshot` payload
pub const BRIGHTNESS_CHANGED: &str = "brightness-changed";

/// managed by tauri, cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub log_guard: Arc<WorkerGuard>,
    pub events: EventSender,
}

/// tauri side of the dispatcher: tray, panel window & webview
pub struct TauriSurface {
    app: AppHandle,
    panel_margin: i32,
}

impl PanelSurface for TauriSurface {
    fn render(&mut self, snapshot: &PanelSnapshot) {
        if let Some(tray) = self.app.tray_by_id(TRAY_ID) {
            if let Err(e) = tray.set_tooltip(Some(&snapshot.tooltip)) {
                error!("failed to set tray tooltip: {}", e);
            }
        }
        if let Err(e) = self.app.emit(BRIGHTNESS_CHANGED, snapshot) {
            error!("failed to emit `{}`: {}", BRIGHTNESS_CHANGED, e);
        }
    }

    fn set_tray_icon(&mut self, tier: IconTier) {
        if let Some(tray) = self.app.tray_by_id(TRAY_ID) {
            if let Err(e) = tray.set_icon(Some(icons::tier_icon(tier))) {
                error!("failed to set tray icon: {}", e);
            }
        }
    }

    fn show_panel(&mut self) {
        match self.app.get_webview_window(PANEL_LABEL) {
            Some(window) => utils::show_panel(&window, self.panel_margin),
            None => error!("panel window `{}` is missing", PANEL_LABEL),
        }
    }

    fn hide_panel(&mut self) {
        if let Some(window) = self.app.get_webview_window(PANEL_LABEL) {
            if let Err(e) = window.hide() {
                error!("failed to hide panel: {}", e);
            }
        }
    }

    fn exit(&mut self) {
        self.app.exit(0);
    }
}

fn send_event(app: &AppHandle, event: AppEvent) {
    match app.try_state::<AppState>() {
        Some(state) => {
            // a dead dispatcher is logged by `send`
            let _ = state.events.send(event);
        }
        None => error!("app state not managed yet, dropping {:?}", event),
    }
}

pub fn run() {
    let builder = tauri::Builder::default()
        .invoke_handler(tauri::generate_handler![
            events::set_brightness,
            events::panel_state,
            events::hide_panel,
        ])
        .setup(|app| {
            let log_guard = log::init_logging(app)?;
            let config = AppConfig::from_env();
            info!("starting brightness controller: {:?}", config);

            let (events_tx, events_rx) = events::channel();
            app.manage(AppState {
                log_guard: Arc::new(log_guard),
                events: events_tx.clone(),
            });

            let quit_i = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
            let menu = Menu::with_items(app, &[&quit_i])?;

            let tray_events = events_tx.clone();
            let _ = TrayIconBuilder::with_id(TRAY_ID)
                .menu(&menu)
                .icon(icons::tier_icon(config.fallback_brightness.tier()))
                .tooltip(config.fallback_brightness.tooltip())
                .on_tray_icon_event(move |_tray, event| {
                    let activated = matches!(
                        event,
                        TrayIconEvent::Click {
                            button: MouseButton::Left,
                            button_state: MouseButtonState::Up,
                            ..
                        } | TrayIconEvent::DoubleClick {
                            button: MouseButton::Left,
                            ..
                        }
                    );
                    if activated {
                        let _ = tray_events.send(AppEvent::TrayActivated);
                    }
                })
                .show_menu_on_left_click(false)
                .build(app)?;

            let surface = TauriSurface {
                app: app.handle().clone(),
                panel_margin: config.panel_margin,
            };
            events::spawn_dispatcher(SystemProvider::new, config.fallback_brightness, surface, events_rx)?;

            autostart::register_in_background(config.autostart);

            info!("tray ready, panel hidden until activated");
            Ok(())
        })
        .on_menu_event(|app, event| {
            match event.id().as_ref() {
                "quit" => {
                    info!("`Quit` menu item clicked");
                    match app.try_state::<AppState>() {
                        Some(state) => events::request_quit(&state.events, || app.exit(0)),
                        None => app.exit(0),
                    }
                }
                _ => {}
            }
        });

    builder
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| {
            if let RunEvent::WindowEvent { label, event, .. } = event {
                if label != PANEL_LABEL {
                    return;
                }
                match event {
                    WindowEvent::Focused(false) => send_event(app_handle, AppEvent::FocusLost),
                    WindowEvent::CloseRequested { api, .. } => {
                        // keep the webview alive, the slider state lives there too
                        api.prevent_close();
                        send_event(app_handle, AppEvent::CloseRequested);
                    }
                    _ => {}
                }
            }
        });
}
