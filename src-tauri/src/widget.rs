use anyhow::{Context, Result};
use tauri::{AppHandle, Emitter, Manager, Runtime, State, WebviewWindow, WindowEvent};

use crate::scraper::PLAYER_LABEL;
use crate::state::{AppState, SharedState};
use crate::tray::TrayManager;
use crate::types::{NowPlayingUpdate, ViewMode, WidgetFrame};

pub const WIDGET_LABEL: &str = "widget";
pub const FRAME_EVENT: &str = "frame";

/// Merge a producer's update into the shared record and publish the result.
/// Must run on the main thread.
pub fn apply_update<R: Runtime>(app: &AppHandle<R>, update: NowPlayingUpdate) {
    let Some(state) = app.try_state::<SharedState>() else {
        log::error!("Shared state missing, dropping update");
        return;
    };

    let changes = {
        let mut guard = state.write();
        let AppState {
            now_playing,
            presentation,
        } = &mut *guard;

        let changes = now_playing.apply(update);
        if presentation.observe(&changes) {
            log::info!("Now playing: {} - {}", now_playing.title, now_playing.artist);
        }
        changes
    };

    if changes.any() {
        publish(app, &state, changes.identity());
    }
}

/// Push the current frame to the widget page and refresh the tray
pub fn publish<R: Runtime>(app: &AppHandle<R>, state: &SharedState, rebuild_menu: bool) {
    let frame = {
        let guard = state.read();
        guard.presentation.frame(&guard.now_playing)
    };

    if let Err(e) = app.emit_to(WIDGET_LABEL, FRAME_EVENT, frame) {
        log::error!("Failed to emit frame: {}", e);
    }

    if rebuild_menu {
        if let Err(e) = TrayManager::rebuild_menu(app, state) {
            log::error!("Failed to rebuild menu: {}", e);
        }
    }
    if let Err(e) = TrayManager::update_icon(app, state) {
        log::error!("Failed to update icon: {}", e);
    }
}

/// Switch between the disc and the browser overlay. The view only changes
/// once the player window has been moved.
pub fn toggle_overlay<R: Runtime>(app: &AppHandle<R>) -> Result<ViewMode> {
    let player = player_window(app)?;
    let state = app.state::<SharedState>().inner().clone();

    let mode = state.read().presentation.next_mode();
    match mode {
        ViewMode::Browser => cover_widget(app, &player)?,
        ViewMode::Disc => player.hide().context("Failed to hide player window")?,
    }

    state.write().presentation.set_mode(mode);
    log::info!("Switched to {:?} view", mode);
    publish(app, &state, true);
    Ok(mode)
}

/// Return to the disc, e.g. when the browser window is closed
pub fn show_disc<R: Runtime>(app: &AppHandle<R>) -> Result<()> {
    let state = app.state::<SharedState>().inner().clone();
    state.write().presentation.show_disc();

    if let Ok(player) = player_window(app) {
        player.hide().context("Failed to hide player window")?;
    }
    publish(app, &state, true);
    Ok(())
}

/// Closing the browser only hides it, so the scraper keeps running
pub fn install_overlay_hooks<R: Runtime>(app: &AppHandle<R>, player: &WebviewWindow<R>) {
    let handle = app.clone();
    player.on_window_event(move |event| {
        if let WindowEvent::CloseRequested { api, .. } = event {
            api.prevent_close();
            if let Err(e) = show_disc(&handle) {
                log::error!("Failed to return to disc view: {:#}", e);
            }
        }
    });
}

fn player_window<R: Runtime>(app: &AppHandle<R>) -> Result<WebviewWindow<R>> {
    app.get_webview_window(PLAYER_LABEL)
        .context("Web player is not running")
}

/// Place the player exactly over the widget and bring it forward
fn cover_widget<R: Runtime>(app: &AppHandle<R>, player: &WebviewWindow<R>) -> Result<()> {
    if let Some(widget) = app.get_webview_window(WIDGET_LABEL) {
        let position = widget.outer_position().context("Failed to read widget position")?;
        let size = widget.inner_size().context("Failed to read widget size")?;
        player.set_position(position)?;
        player.set_size(size)?;
    }
    player.show().context("Failed to show player window")?;
    if let Err(e) = player.set_focus() {
        log::warn!("Failed to focus player window: {}", e);
    }
    Ok(())
}

#[tauri::command]
pub fn current_frame(state: State<'_, SharedState>) -> WidgetFrame {
    let guard = state.read();
    guard.presentation.frame(&guard.now_playing)
}

#[tauri::command]
pub fn toggle_browser(app: AppHandle) -> Result<ViewMode, String> {
    toggle_overlay(&app).map_err(|e| format!("{:#}", e))
}
