use std::env;
use std::path::PathBuf;

use library::{LibraryHandle, TagReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let inbox = args
        .next()
        .or_else(|| env::var("INBOX_PATH").ok())
        .ok_or("INBOX_PATH not set and no inbox argument")?;
    let library_root = args
        .next()
        .or_else(|| env::var("LIBRARY_PATH").ok())
        .ok_or("LIBRARY_PATH not set and no library argument")?;

    let library = LibraryHandle::open(PathBuf::from(&library_root))?;
    let scan = library.scan_inbox(&PathBuf::from(&inbox), &TagReader::new())?;
    for failure in &scan.failures {
        warn!("Skipped {:?}: {}", failure.path, failure.error);
    }
    let report = library.organize(&scan.proposals)?;
    for failure in &report.failures {
        warn!("Not organized {:?}: {}", failure.path, failure.error);
    }

    println!(
        "{} organized, {} failed, {} skipped",
        report.organized,
        report.failed + scan.failures.len(),
        scan.skipped
    );

    Ok(())
}
