#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod probe;
mod supervisor;
mod window;

use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

use tauri::{AppHandle, Manager, RunEvent, Url, WindowEvent};
use tauri_plugin_log::{Target, TargetKind};

use config::LauncherConfig;
use probe::ReadinessProbe;
use supervisor::ServerSupervisor;
use window::WindowController;

/// Launcher state: one supervisor, one window controller, one shutdown flag.
struct Launcher {
    config: LauncherConfig,
    supervisor: ServerSupervisor,
    window: WindowController,
    shutting_down: AtomicBool,
}

impl Launcher {
    fn new(config: LauncherConfig) -> Result<Self, String> {
        let url = Url::parse(&config.server_url())
            .map_err(|err| format!("invalid server url: {err}"))?;
        Ok(Self {
            supervisor: ServerSupervisor::new(config.grace_timeout),
            window: WindowController::new(url),
            config,
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Single shutdown routine shared by every lifecycle trigger
    /// (all-windows-closed, exit request, interrupt). Idempotent.
    fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("shutting down server");
        self.supervisor.terminate();
    }
}

fn resolve_app_script(app: &AppHandle) -> Result<PathBuf, String> {
    if cfg!(debug_assertions) {
        Ok(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(config::APP_SCRIPT))
    } else {
        Ok(app
            .path()
            .resource_dir()
            .map_err(|err| format!("failed to resolve resource dir: {err}"))?
            .join(config::APP_SCRIPT))
    }
}

/// Spawn the Dash server. An unsolicited exit is fatal for the whole
/// application, regardless of exit code.
fn start_server(app: &AppHandle, launcher: &Launcher) -> Result<(), String> {
    let script = resolve_app_script(app)?;
    log::info!(
        "starting server: {} {}",
        launcher.config.python_bin,
        script.display()
    );
    let mut command = Command::new(&launcher.config.python_bin);
    command.arg(&script);

    let handle = app.clone();
    launcher.supervisor.spawn(command, move |_code| {
        let launcher = handle.state::<Launcher>();
        if launcher.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("server gone, quitting");
        handle.exit(0);
    })
}

/// Poll the server on a background thread; reveal the window on the first
/// successful probe.
fn start_probe(app: &AppHandle) {
    let handle = app.clone();
    std::thread::spawn(move || {
        let launcher = handle.state::<Launcher>();
        let probe = ReadinessProbe::new(&launcher.config);
        if probe.wait_until_ready() {
            log::info!("server ready, showing window");
            if let Err(err) = launcher.window.reveal() {
                log::error!("{err}");
            }
        } else {
            log::error!("server never became ready, giving up");
        }
    });
}

fn main() {
    tauri::Builder::default()
        .plugin(
            tauri_plugin_log::Builder::new()
                .level(if cfg!(debug_assertions) {
                    log::LevelFilter::Debug
                } else {
                    log::LevelFilter::Info
                })
                .targets([
                    Target::new(TargetKind::Stdout),
                    Target::new(TargetKind::LogDir { file_name: None }),
                ])
                .build(),
        )
        .setup(|app| {
            app.manage(Launcher::new(LauncherConfig::load())?);
            let handle = app.handle().clone();
            let launcher = app.state::<Launcher>();

            start_server(&handle, &launcher)?;
            launcher.window.create(&handle)?;
            start_probe(&handle);

            let interrupt_handle = handle.clone();
            ctrlc::set_handler(move || {
                log::info!("interrupt received, shutting down");
                interrupt_handle.state::<Launcher>().shutdown();
                interrupt_handle.exit(0);
            })?;
            Ok(())
        })
        .on_window_event(|win, event| {
            if let WindowEvent::Destroyed = event {
                if win.label() == window::MAIN_WINDOW_LABEL {
                    win.app_handle().state::<Launcher>().window.handle_closed();
                }
            }
        })
        .build(tauri::generate_context!())
        .expect("error while building fretboard desktop shell")
        .run(|handle, event| match event {
            // macOS dock reactivation with no open window: the server is
            // assumed still running, so no re-probe before showing.
            #[cfg(target_os = "macos")]
            RunEvent::Reopen { .. } => {
                let launcher = handle.state::<Launcher>();
                if !launcher.window.is_open() {
                    let reopened = launcher
                        .window
                        .create(handle)
                        .and_then(|_| launcher.window.reveal());
                    if let Err(err) = reopened {
                        log::error!("failed to reopen window: {err}");
                    }
                }
            }
            RunEvent::ExitRequested { .. } => handle.state::<Launcher>().shutdown(),
            RunEvent::Exit => handle.state::<Launcher>().shutdown(),
            _ => {}
        });
}
