// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod log;
mod sync;
mod error;
mod icons;
mod level;
mod utils;
mod config;
mod events;
mod provider;
mod autostart;
#[cfg(windows)]
mod monitors;
#[cfg(windows)]
mod brightness;

fn main() {
    crate::app::run();
}
