// Prevents additional console window on Windows in release
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod compositor;
#[cfg(target_os = "macos")]
mod media_remote;
mod poller;
mod presentation;
mod scraper;
mod settings;
mod source;
mod state;
mod tray;
mod types;
mod widget;

use tauri::Manager;

use crate::poller::SystemMediaPoller;
use crate::scraper::WebPlayerScraper;
use crate::settings::Settings;

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Spindle");

    let settings = Settings::from_env();

    tauri::Builder::default()
        .setup(move |app| setup_app(app, settings))
        .invoke_handler(tauri::generate_handler![
            widget::current_frame,
            widget::toggle_browser,
            scraper::report_track
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(run_handler);
}

fn setup_app(app: &mut tauri::App, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Setting up application");

    // Floating widget plus menu bar item, no Dock icon
    #[cfg(target_os = "macos")]
    app.set_activation_policy(tauri::ActivationPolicy::Accessory);

    let state = state::create_state();
    app.manage(state.clone());

    if settings.sources.web {
        match WebPlayerScraper::build(app.handle(), &settings) {
            Ok(player) => {
                widget::install_overlay_hooks(app.handle(), &player);
                log::info!("Web player scraper started");
            }
            Err(e) => {
                // The disc view still works from the system source
                log::error!("Failed to start web player scraper: {:#}", e);
            }
        }
    }

    // After the player window so the menu knows whether it can toggle
    if let Err(e) = tray::TrayManager::setup(app.handle(), &state) {
        log::error!("Menu bar icon unavailable: {:#}", e);
    }

    if settings.sources.system {
        match source::system_source() {
            Some(source) => {
                SystemMediaPoller::new(source, settings.poll_interval).spawn(app.handle().clone());
            }
            None => log::info!("System media polling disabled"),
        }
    }

    let handle = app.handle().clone();
    ctrlc::set_handler(move || {
        log::info!("Received interrupt signal, exiting...");
        handle.exit(0);
    })?;

    Ok(())
}

fn run_handler(_app_handle: &tauri::AppHandle, event: tauri::RunEvent) {
    match event {
        tauri::RunEvent::ExitRequested { code, .. } => {
            log::info!("App exit requested (code {:?})", code);
        }
        tauri::RunEvent::Exit => {
            log::info!("App exit event received");
        }
        _ => {}
    }
}
