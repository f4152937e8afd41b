//! Main window lifecycle.
//!
//! The window is created hidden and maximized; it becomes visible only once
//! the readiness probe confirms the server answers. Closing the window clears
//! the handle so reactivation can create a fresh one.

use std::sync::Mutex;

use tauri::{AppHandle, Url, WebviewUrl, WebviewWindow, WebviewWindowBuilder};

pub const MAIN_WINDOW_LABEL: &str = "main";

pub struct WindowController {
    window: Mutex<Option<WebviewWindow>>,
    url: Url,
}

impl WindowController {
    pub fn new(url: Url) -> Self {
        Self {
            window: Mutex::new(None),
            url,
        }
    }

    /// Build the window, hidden. No-op when one already exists.
    pub fn create(&self, app: &AppHandle) -> Result<(), String> {
        let mut slot = self
            .window
            .lock()
            .map_err(|_| "window mutex poisoned".to_string())?;
        if slot.is_some() {
            return Ok(());
        }
        let window = WebviewWindowBuilder::new(
            app,
            MAIN_WINDOW_LABEL,
            WebviewUrl::External(self.url.clone()),
        )
        .title("Fretboard Map")
        .maximized(true)
        .visible(false)
        .build()
        .map_err(|err| format!("failed to create window: {err}"))?;
        *slot = Some(window);
        Ok(())
    }

    /// Load the server root into the view and show the window.
    pub fn reveal(&self) -> Result<(), String> {
        let mut slot = self
            .window
            .lock()
            .map_err(|_| "window mutex poisoned".to_string())?;
        let Some(window) = slot.as_mut() else {
            return Ok(());
        };
        window
            .navigate(self.url.clone())
            .map_err(|err| format!("failed to load server url: {err}"))?;
        window
            .show()
            .map_err(|err| format!("failed to show window: {err}"))?;
        Ok(())
    }

    /// Called when the window is destroyed so reactivation creates a new one.
    pub fn handle_closed(&self) {
        if let Ok(mut slot) = self.window.lock() {
            *slot = None;
        }
    }

    pub fn is_open(&self) -> bool {
        self.window.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}
