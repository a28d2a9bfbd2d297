use anyhow::{Context, Result};
use tauri::{
    image::Image,
    menu::{Menu, MenuItem, PredefinedMenuItem},
    tray::TrayIconBuilder,
    AppHandle, Manager, Runtime,
};

use crate::compositor::Compositor;
use crate::scraper::PLAYER_LABEL;
use crate::state::SharedState;
use crate::types::ViewMode;
use crate::widget;

/// TrayManager is stored as a singleton in Tauri's app state.
/// It owns the Compositor which loads the font once at startup.
pub struct TrayManager {
    compositor: Compositor,
}

impl TrayManager {
    pub fn new() -> Result<Self> {
        let compositor = Compositor::new()
            .context("Failed to initialize compositor - font may be missing")?;
        Ok(Self { compositor })
    }

    /// Initialize the menu bar icon and store TrayManager as app state
    pub fn setup<R: Runtime>(app: &AppHandle<R>, state: &SharedState) -> Result<()> {
        let manager = TrayManager::new()?;

        let menu = Self::build_menu_internal(app, state)?;
        let initial_icon = manager.render_icon(state)?;

        let tray = TrayIconBuilder::new()
            .icon(initial_icon)
            .menu(&menu)
            .on_menu_event(move |app, event| {
                Self::handle_menu_event(app, event);
            })
            .build(app)?;

        app.manage(tray);
        app.manage(manager);

        Ok(())
    }

    fn build_menu_internal<R: Runtime>(app: &AppHandle<R>, state: &SharedState) -> Result<Menu<R>> {
        let state_guard = state.read();
        let menu = Menu::new(app)?;

        let now_playing = &state_guard.now_playing;
        let label = if now_playing.artist.is_empty() {
            now_playing.title.clone()
        } else {
            format!("{} - {}", now_playing.title, now_playing.artist)
        };
        let item = MenuItem::with_id(app, "now_playing", &label, false, None::<&str>)?;
        menu.append(&item)?;

        let separator = PredefinedMenuItem::separator(app)?;
        menu.append(&separator)?;

        let toggle_label = match state_guard.presentation.mode() {
            ViewMode::Disc => "Show Browser",
            ViewMode::Browser => "Show Turntable",
        };
        let has_player = app.get_webview_window(PLAYER_LABEL).is_some();
        let toggle = MenuItem::with_id(app, "toggle_view", toggle_label, has_player, None::<&str>)?;
        menu.append(&toggle)?;

        let quit_item = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
        menu.append(&quit_item)?;

        Ok(menu)
    }

    fn handle_menu_event<R: Runtime>(app: &AppHandle<R>, event: tauri::menu::MenuEvent) {
        match event.id().as_ref() {
            "quit" => {
                log::info!("Quit requested from menu");
                app.exit(0);
            }
            "toggle_view" => {
                if let Err(e) = widget::toggle_overlay(app) {
                    log::error!("Failed to toggle browser overlay: {:#}", e);
                }
            }
            _ => {
                // Disabled items, do nothing
            }
        }
    }

    /// Rebuild the tray menu (called when the track or the view changes)
    pub fn rebuild_menu<R: Runtime>(app: &AppHandle<R>, state: &SharedState) -> Result<()> {
        let Some(tray) = app.try_state::<tauri::tray::TrayIcon<R>>() else {
            return Ok(());
        };

        let new_menu = Self::build_menu_internal(app, state)?;
        tray.set_menu(Some(new_menu))?;
        Ok(())
    }

    fn render_icon(&self, state: &SharedState) -> Result<Image<'static>> {
        let icon_bytes = {
            let state_guard = state.read();
            let now_playing = &state_guard.now_playing;
            if now_playing.is_playing || now_playing.artwork.is_some() {
                self.compositor.create_menu_bar_icon(
                    now_playing.artwork.as_ref().and_then(|a| a.image()),
                    &now_playing.title,
                    &now_playing.artist,
                )?
            } else {
                self.compositor.create_menu_bar_icon(None, "", "")?
            }
        };

        Image::from_bytes(&icon_bytes).context("Failed to create image from bytes")
    }

    /// Redraw the menu bar icon from the current state.
    /// A no-op when the tray could not be created at startup.
    pub fn update_icon<R: Runtime>(app: &AppHandle<R>, state: &SharedState) -> Result<()> {
        let (Some(manager), Some(tray)) = (
            app.try_state::<TrayManager>(),
            app.try_state::<tauri::tray::TrayIcon<R>>(),
        ) else {
            return Ok(());
        };

        let image = manager.render_icon(state)?;
        tray.set_icon(Some(image))?;
        Ok(())
    }
}
