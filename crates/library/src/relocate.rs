use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Moves `source` to `destination` unless something already lives there, in
/// which case the existing file wins and `destination` is returned untouched.
pub fn relocate(source: &Path, destination: &Path) -> io::Result<PathBuf> {
    if destination.exists() {
        info!(
            "Destination {:?} already exists; leaving {:?} in place",
            destination, source
        );
        return Ok(destination.to_path_buf());
    }
    if !source.is_file() {
        return Err(io::Error::new(
            ErrorKind::NotFound,
            format!("source missing: {}", source.display()),
        ));
    }
    ensure_parent(destination)?;
    move_file(source, destination)?;
    debug!("Moved {:?} -> {:?}", source, destination);
    Ok(destination.to_path_buf())
}

/// Moves without ever replacing an existing destination.
pub(crate) fn move_new(source: &Path, destination: &Path) -> io::Result<()> {
    if destination.exists() {
        return Err(already_exists(destination));
    }
    ensure_parent(destination)?;
    move_file(source, destination)
}

/// Copies without ever replacing an existing destination.
pub(crate) fn copy_new(source: &Path, destination: &Path) -> io::Result<()> {
    ensure_parent(destination)?;
    let mut reader = File::open(source)?;
    let mut writer = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
    {
        Ok(writer) => writer,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(already_exists(destination))
        }
        Err(err) => return Err(err),
    };
    if let Err(err) = io::copy(&mut reader, &mut writer) {
        drop(writer);
        let _ = fs::remove_file(destination);
        return Err(err);
    }
    Ok(())
}

/// Rename when possible; across filesystems fall back to copy + delete.
fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(err),
        Err(rename_err) => {
            debug!(
                "Rename {:?} -> {:?} failed ({}); copying instead",
                source, destination, rename_err
            );
            copy_new(source, destination)?;
            remove_source(source, destination)
        }
    }
}

/// Second half of a copy + delete move. If the source cannot go, the copy is
/// taken back so the file exists in one place only.
fn remove_source(source: &Path, destination: &Path) -> io::Result<()> {
    if let Err(err) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(err);
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn already_exists(path: &Path) -> io::Error {
    io::Error::new(
        ErrorKind::AlreadyExists,
        format!("destination exists: {}", path.display()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::touch_with;

    #[test]
    fn moves_into_new_directories() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("inbox/a.mp3");
        touch_with(&source, b"aaa");
        let dest = dir.path().join("lib/Artist/Album/01 - a.mp3");

        let final_path = relocate(&source, &dest).unwrap();
        assert_eq!(final_path, dest);
        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"aaa");
    }

    #[test]
    fn existing_destination_wins() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("inbox/a.mp3");
        let dest = dir.path().join("lib/a.mp3");
        touch_with(&source, b"new");
        touch_with(&dest, b"old");

        let final_path = relocate(&source, &dest).unwrap();
        assert_eq!(final_path, dest);
        assert!(source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }

    #[test]
    fn missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = relocate(&dir.path().join("gone.mp3"), &dir.path().join("x/gone.mp3"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn copy_new_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.mp3");
        let dest = dir.path().join("out/a.mp3");
        touch_with(&source, b"src");
        touch_with(&dest, b"keep");

        let err = copy_new(&source, &dest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&dest).unwrap(), b"keep");
    }

    #[test]
    fn undeletable_source_takes_the_copy_back() {
        let dir = tempfile::tempdir().unwrap();
        // remove_file refuses directories, whoever runs the test.
        let source = dir.path().join("stuck");
        fs::create_dir_all(&source).unwrap();
        let dest = dir.path().join("out/a.mp3");
        touch_with(&dest, b"copy");

        assert!(remove_source(&source, &dest).is_err());
        assert!(!dest.exists());
        assert!(source.is_dir());
    }

    #[test]
    fn move_new_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.mp3");
        let dest = dir.path().join("out/a.mp3");
        touch_with(&source, b"src");
        touch_with(&dest, b"keep");

        assert!(move_new(&source, &dest).is_err());
        assert!(source.exists());
    }
}
