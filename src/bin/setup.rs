//! One-time provisioning for the bundled Dash server.
//!
//! Creates `server/.venv` and installs `server/requirements.txt` into it.
//! Run once before the first launch; the launcher itself never invokes this.

use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    if let Err(err) = provision(&server_dir()) {
        eprintln!("setup failed: {err}");
        std::process::exit(1);
    }
}

fn server_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("server")
}

fn provision(server_dir: &Path) -> Result<(), String> {
    let venv = server_dir.join(".venv");
    let requirements = server_dir.join("requirements.txt");
    let pip = venv_bin_dir(&venv).join(pip_name());

    println!("creating virtual environment at {}", venv.display());
    run_step(Command::new(python_bin()).arg("-m").arg("venv").arg(&venv))?;
    run_step(Command::new(&pip).args(["install", "--upgrade", "pip"]))?;
    println!("installing {}", requirements.display());
    run_step(Command::new(&pip).arg("install").arg("-r").arg(&requirements))?;
    println!("virtual environment ready at {}", venv.display());
    Ok(())
}

fn run_step(command: &mut Command) -> Result<(), String> {
    let status = command
        .status()
        .map_err(|err| format!("failed to run {:?}: {err}", command.get_program()))?;
    if !status.success() {
        return Err(format!("{:?} exited with {status}", command.get_program()));
    }
    Ok(())
}

fn python_bin() -> &'static str {
    if cfg!(target_os = "windows") {
        "python"
    } else {
        "python3"
    }
}

fn pip_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "pip.exe"
    } else {
        "pip"
    }
}

fn venv_bin_dir(venv: &Path) -> PathBuf {
    if cfg!(target_os = "windows") {
        venv.join("Scripts")
    } else {
        venv.join("bin")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venv_layout_matches_platform() {
        let venv = Path::new("/tmp/app/server/.venv");
        let bin = venv_bin_dir(venv);
        if cfg!(target_os = "windows") {
            assert!(bin.ends_with("Scripts"));
            assert_eq!(pip_name(), "pip.exe");
        } else {
            assert!(bin.ends_with("bin"));
            assert_eq!(pip_name(), "pip");
        }
    }

    #[test]
    fn server_dir_is_manifest_relative() {
        assert!(server_dir().ends_with("server"));
    }
}
