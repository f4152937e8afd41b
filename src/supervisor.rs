//! Dash server process lifecycle.
//!
//! The supervisor exclusively owns the child handle: spawn with piped output,
//! watch for exit, and terminate gracefully with a forced kill after a
//! timeout. The child's stdout and stderr are forwarded line by line to the
//! log without buffering or parsing.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct ServerSupervisor {
    child: Arc<Mutex<Option<Child>>>,
    kill_timer_armed: AtomicBool,
    grace_timeout: Duration,
}

impl ServerSupervisor {
    pub fn new(grace_timeout: Duration) -> Self {
        Self {
            child: Arc::new(Mutex::new(None)),
            kill_timer_armed: AtomicBool::new(false),
            grace_timeout,
        }
    }

    /// Start the server process. `on_exit` is invoked exactly once, whenever
    /// the process exits, with its exit code (`None` when killed by a signal).
    pub fn spawn(
        &self,
        mut command: Command,
        on_exit: impl FnOnce(Option<i32>) + Send + 'static,
    ) -> Result<(), String> {
        let mut slot = self
            .child
            .lock()
            .map_err(|_| "server process mutex poisoned".to_string())?;
        if slot.is_some() {
            return Err("server process already running".to_string());
        }

        let mut child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| format!("failed to start server process: {err}"))?;
        log::info!("server process started (pid {})", child.id());

        if let Some(stdout) = child.stdout.take() {
            thread::spawn(move || {
                for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                    log::info!("server: {line}");
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    log::error!("server: {line}");
                }
            });
        }

        *slot = Some(child);
        drop(slot);

        let handle = Arc::clone(&self.child);
        thread::spawn(move || {
            let code = watch_exit(&handle);
            match code {
                Some(code) => log::info!("server process exited with code {code}"),
                None => log::info!("server process exited (terminated by signal)"),
            }
            on_exit(code);
        });
        Ok(())
    }

    /// Graceful-then-forced termination. No-op when no process is held.
    /// Safe to call from overlapping shutdown hooks: the forced-kill timer is
    /// armed at most once per supervisor.
    pub fn terminate(&self) {
        let slot = match self.child.lock() {
            Ok(slot) => slot,
            Err(_) => return,
        };
        let Some(child) = slot.as_ref() else {
            return;
        };
        let pid = child.id();
        drop(slot);

        log::info!("sending graceful termination to server (pid {pid})");
        send_graceful(pid);

        if self.kill_timer_armed.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = Arc::clone(&self.child);
        let grace = self.grace_timeout;
        thread::spawn(move || {
            thread::sleep(grace);
            let mut slot = match handle.lock() {
                Ok(slot) => slot,
                Err(_) => return,
            };
            if let Some(child) = slot.as_mut() {
                log::warn!(
                    "server still running {}ms after graceful signal, killing",
                    grace.as_millis()
                );
                // killing an already-exited process is a harmless no-op
                let _ = child.kill();
            }
        });
    }

    pub fn is_running(&self) -> bool {
        self.child.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

/// Poll the held child until it exits, then clear the handle and return the
/// exit code. Returns immediately if the handle is already gone.
fn watch_exit(slot: &Mutex<Option<Child>>) -> Option<i32> {
    loop {
        {
            let mut guard = match slot.lock() {
                Ok(guard) => guard,
                Err(_) => return None,
            };
            let Some(child) = guard.as_mut() else {
                return None;
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    *guard = None;
                    return status.code();
                }
                Ok(None) => {}
                Err(err) => {
                    log::error!("failed to poll server process: {err}");
                    *guard = None;
                    return None;
                }
            }
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn send_graceful(pid: u32) {
    // delivery failure (process already gone) is treated as success
    let _ = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
}

#[cfg(windows)]
fn send_graceful(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .output();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    fn terminate_without_process_is_noop() {
        let supervisor = ServerSupervisor::new(Duration::from_millis(100));
        supervisor.terminate();
        assert!(!supervisor.is_running());
    }

    #[test]
    fn reports_exit_code_and_clears_handle() {
        let supervisor = ServerSupervisor::new(Duration::from_secs(5));
        let (tx, rx) = mpsc::channel();
        supervisor
            .spawn(sh("exit 7"), move |code| {
                let _ = tx.send(code);
            })
            .unwrap();
        let code = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(code, Some(7));
        assert!(!supervisor.is_running());
    }

    #[test]
    fn rejects_second_spawn_while_running() {
        let supervisor = ServerSupervisor::new(Duration::from_secs(1));
        let (tx, rx) = mpsc::channel();
        supervisor
            .spawn(sh("sleep 30"), move |code| {
                let _ = tx.send(code);
            })
            .unwrap();
        assert!(supervisor.is_running());
        let second = supervisor.spawn(sh("exit 0"), |_| {});
        assert!(second.is_err());
        supervisor.terminate();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn graceful_signal_is_enough_for_a_cooperative_process() {
        let supervisor = ServerSupervisor::new(Duration::from_secs(5));
        let (tx, rx) = mpsc::channel();
        supervisor
            .spawn(sh("sleep 30"), move |code| {
                let _ = tx.send(code);
            })
            .unwrap();
        let start = Instant::now();
        supervisor.terminate();
        let code = rx.recv_timeout(Duration::from_secs(3)).unwrap();
        // sleep dies on SIGTERM, well before the forced-kill timeout
        assert_eq!(code, None);
        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(!supervisor.is_running());
    }

    #[test]
    fn forced_kill_after_grace_timeout() {
        let grace = Duration::from_millis(300);
        let supervisor = ServerSupervisor::new(grace);
        let (tx, rx) = mpsc::channel();
        supervisor
            .spawn(
                sh("trap '' TERM; while :; do sleep 0.05; done"),
                move |code| {
                    let _ = tx.send(code);
                },
            )
            .unwrap();
        // give the shell a moment to install the trap
        thread::sleep(Duration::from_millis(200));
        let start = Instant::now();
        supervisor.terminate();
        let code = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(code, None);
        // the kill must not fire before the grace timeout elapses
        assert!(start.elapsed() >= grace);
        assert!(!supervisor.is_running());
    }

    #[test]
    fn repeated_terminate_is_safe() {
        let grace = Duration::from_millis(300);
        let supervisor = ServerSupervisor::new(grace);
        let (tx, rx) = mpsc::channel();
        supervisor
            .spawn(
                sh("trap '' TERM; while :; do sleep 0.05; done"),
                move |code| {
                    let _ = tx.send(code);
                },
            )
            .unwrap();
        thread::sleep(Duration::from_millis(200));
        supervisor.terminate();
        supervisor.terminate();
        supervisor.terminate();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(!supervisor.is_running());
        // exit is observed exactly once
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        supervisor.terminate();
    }
}
