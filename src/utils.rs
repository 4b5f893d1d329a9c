use tracing::error;
use tauri::{
    PhysicalPosition,
    PhysicalSize,
    WebviewWindow,
};

/// top-left corner that puts the panel at the bottom-right of the work
/// area (screen minus taskbar), `margin` pixels from both edges
pub fn panel_origin(
    area_position: PhysicalPosition<i32>,
    area_size: PhysicalSize<u32>,
    panel_size: PhysicalSize<u32>,
    margin: i32,
) -> PhysicalPosition<i32> {
    let right = area_position.x + area_size.width as i32;
    let bottom = area_position.y + area_size.height as i32;
    let x = right - panel_size.width as i32 - margin;
    let y = bottom - panel_size.height as i32 - margin;
    // never push it off the top-left of the work area
    PhysicalPosition::new(x.max(area_position.x), y.max(area_position.y))
}

pub fn show_panel(window: &WebviewWindow, margin: i32) {
    // need the primary monitor's work area for positioning
    match window.primary_monitor() {
        Ok(Some(monitor)) => {
            let panel_size = match window.outer_size() {
                Ok(size) => size,
                Err(e) => {
                    error!("failed to get panel outer size: {}", e);
                    return;
                }
            };
            let area = monitor.work_area();
            let origin = panel_origin(area.position, area.size, panel_size, margin);
            if let Err(e) = window.set_position(origin) {
                error!("failed to set panel position: {}", e);
            }
        }
        Ok(None) => error!("no primary monitor, showing the panel where it was"),
        Err(e) => error!("failed to query primary monitor: {}", e),
    }

    // avoid unwrapping
    if let Err(e) = window.unminimize() { error!("failed to unminimize panel: {}", e); }
    if let Err(e) = window.show() { error!("failed to show panel: {}", e); }
    if let Err(e) = window.set_focus() { error!("failed to focus panel: {}", e); }
}
