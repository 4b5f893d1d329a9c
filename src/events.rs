//! Event queue between the ui callbacks and the brightness state.
//!
//! Tray clicks, window events & webview commands only enqueue an
//! [`AppEvent`]. One `brightness-dispatch` thread owns the provider and the
//! [`BrightnessSync`], pops events in order and drives a [`PanelSurface`].

use std::{collections::VecDeque, thread};
use tauri::State;
use tracing::{debug, error, info, warn};
use tokio::sync::{
    oneshot,
    mpsc::{self, error::SendError, UnboundedReceiver, UnboundedSender},
};

use crate::{
    app::AppState,
    level::{BrightnessLevel, IconTier, PanelSnapshot},
    provider::BrightnessProvider,
    sync::BrightnessSync,
};

#[derive(Debug)]
pub enum AppEvent {
    /// slider moved in the panel
    SliderChanged(u8),
    /// tray icon clicked or double clicked
    TrayActivated,
    FocusLost,
    /// close control in the panel or os close request
    CloseRequested,
    Snapshot(oneshot::Sender<PanelSnapshot>),
    Quit,
}

/// whatever actually draws the panel & tray
pub trait PanelSurface {
    /// push label, tooltip & slider value out
    fn render(&mut self, snapshot: &PanelSnapshot);
    fn set_tray_icon(&mut self, tier: IconTier);
    fn show_panel(&mut self);
    fn hide_panel(&mut self);
    fn exit(&mut self);
}

/// cloneable handle used by the callbacks
#[derive(Debug, Clone)]
pub struct EventSender(UnboundedSender<AppEvent>);

impl EventSender {
    /// fails once the dispatcher has stopped (or died)
    pub fn send(&self, event: AppEvent) -> Result<(), SendError<AppEvent>> {
        self.0
            .send(event)
            .inspect_err(|e| error!("dispatcher is gone, dropping event: {:?}", e.0))
    }
}

/// quits through the dispatcher, or right away when nothing is left to
/// receive the event
pub fn request_quit(events: &EventSender, exit: impl FnOnce()) {
    if events.send(AppEvent::Quit).is_err() {
        warn!("dispatcher not running, exiting directly");
        exit();
    }
}

pub fn channel() -> (EventSender, UnboundedReceiver<AppEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender(tx), rx)
}

pub struct Dispatcher<P, S> {
    sync: BrightnessSync<P>,
    surface: S,
    panel_visible: bool,
    tray_tier: Option<IconTier>,
}

impl<P: BrightnessProvider, S: PanelSurface> Dispatcher<P, S> {
    pub fn new(sync: BrightnessSync<P>, surface: S) -> Self {
        Self {
            sync,
            surface,
            panel_visible: false,
            tray_tier: None,
        }
    }

    pub fn panel_visible(&self) -> bool {
        self.panel_visible
    }

    /// draws the initial state, then handles events until `Quit` or until
    /// every sender is gone
    pub fn run(mut self, mut rx: UnboundedReceiver<AppEvent>) {
        self.render();
        let mut backlog = VecDeque::new();
        loop {
            let event = match backlog.pop_front() {
                Some(event) => event,
                None => match rx.blocking_recv() {
                    Some(event) => event,
                    None => break,
                },
            };
            let event = coalesce(event, &mut rx, &mut backlog);
            if !self.handle(event) {
                break;
            }
        }
        info!("dispatcher stopped");
    }

    /// returns `false` once the loop should stop
    pub fn handle(&mut self, event: AppEvent) -> bool {
        debug!("handling {:?}", event);
        match event {
            AppEvent::SliderChanged(value) => self.on_slider(BrightnessLevel::from(value)),
            AppEvent::TrayActivated => self.on_tray_activated(),
            AppEvent::FocusLost | AppEvent::CloseRequested => self.on_dismissed(),
            AppEvent::Snapshot(reply) => {
                // the command may have given up waiting
                let _ = reply.send(self.sync.snapshot());
            }
            AppEvent::Quit => {
                info!("quit requested, exiting");
                self.surface.exit();
                return false;
            }
        }
        true
    }

    fn on_slider(&mut self, level: BrightnessLevel) {
        if level == self.sync.level() {
            return;
        }
        // the ui keeps the requested value either way
        let outcome = self.sync.set_brightness(level);
        if !outcome.is_complete() {
            warn!(
                "brightness {} reached {}/{} monitors",
                level,
                outcome.applied,
                outcome.applied + outcome.failures.len()
            );
        }
        self.render();
    }

    fn on_tray_activated(&mut self) {
        self.sync.refresh_monitors();
        self.surface.show_panel();
        self.panel_visible = true;
        self.render();
    }

    /// hidden, never destroyed; the slider keeps its value
    fn on_dismissed(&mut self) {
        if self.panel_visible {
            self.surface.hide_panel();
            self.panel_visible = false;
        }
    }

    fn render(&mut self) {
        let snapshot = self.sync.snapshot();
        if self.tray_tier != Some(snapshot.tier) {
            self.surface.set_tray_icon(snapshot.tier);
            self.tray_tier = Some(snapshot.tier);
        }
        self.surface.render(&snapshot);
    }
}

/// folds the slider moves already waiting in `rx` into the latest one;
/// anything else read while doing so goes to `backlog`, in order
fn coalesce(
    event: AppEvent,
    rx: &mut UnboundedReceiver<AppEvent>,
    backlog: &mut VecDeque<AppEvent>,
) -> AppEvent {
    let AppEvent::SliderChanged(_) = event else {
        return event;
    };
    let mut latest = event;
    while backlog.is_empty() {
        match rx.try_recv() {
            Ok(next @ AppEvent::SliderChanged(_)) => latest = next,
            Ok(other) => backlog.push_back(other),
            Err(_) => break,
        }
    }
    latest
}

/// runs the dispatcher on its own thread; the provider is created there
/// & never leaves it
pub fn spawn_dispatcher<P, S, F>(
    make_provider: F,
    fallback: BrightnessLevel,
    surface: S,
    rx: UnboundedReceiver<AppEvent>,
) -> std::io::Result<thread::JoinHandle<()>>
where
    P: BrightnessProvider,
    S: PanelSurface + Send + 'static,
    F: FnOnce() -> P + Send + 'static,
{
    thread::Builder::new()
        .name("brightness-dispatch".into())
        .spawn(move || {
            let sync = BrightnessSync::new(make_provider(), fallback);
            Dispatcher::new(sync, surface).run(rx);
        })
}

#[tauri::command]
pub fn set_brightness(value: u8, state: State<'_, AppState>) -> Result<(), String> {
    debug!("invoked `set_brightness` with {}", value);
    state
        .events
        .send(AppEvent::SliderChanged(value))
        .map_err(|e| format!("brightness dispatcher stopped: {e}"))
}

#[tauri::command]
pub async fn panel_state(state: State<'_, AppState>) -> Result<PanelSnapshot, String> {
    let (tx, rx) = oneshot::channel();
    state
        .events
        .send(AppEvent::Snapshot(tx))
        .map_err(|e| format!("brightness dispatcher stopped: {e}"))?;
    rx.await.map_err(|e| format!("brightness state unavailable: {e}"))
}

#[tauri::command]
pub fn hide_panel(state: State<'_, AppState>) -> Result<(), String> {
    state
        .events
        .send(AppEvent::CloseRequested)
        .map_err(|e| format!("brightness dispatcher stopped: {e}"))
}
