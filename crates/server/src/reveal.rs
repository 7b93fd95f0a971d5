use std::io;
use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

/// Asks the platform file manager to show `path`. Does not wait for it.
pub fn reveal_in_file_manager(path: &Path) {
    let mut command = opener_command(path);
    match command.spawn() {
        Ok(child) => debug!("Revealing {:?} (pid {})", path, child.id()),
        Err(err) => warn!("Failed to reveal {:?}: {}", path, err),
    }
}

#[cfg(target_os = "macos")]
fn opener_command(path: &Path) -> Command {
    let mut command = Command::new("open");
    command.arg("-R").arg(path);
    command
}

#[cfg(target_os = "windows")]
fn opener_command(path: &Path) -> Command {
    let mut command = Command::new("explorer");
    command.arg(format!("/select,{}", path.display()));
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener_command(path: &Path) -> Command {
    let target = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(path)
    };
    let mut command = Command::new("xdg-open");
    command.arg(target);
    command
}

pub fn ensure_revealable(path: &Path) -> io::Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("nothing to reveal at {}", path.display()),
        ))
    }
}
