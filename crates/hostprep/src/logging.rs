//! Run log file
//!
//! Every run appends timestamped records to one file. The console only shows
//! progress; command lines, exit codes and output end up here.

use std::fs::{self, File, OpenOptions, Permissions};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;

const LOG_MODE: u32 = 0o600;

/// Open the log for appending, owner-only
pub fn open(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(LOG_MODE)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    // `mode` only applies at creation; tighten files left by older runs
    fs::set_permissions(path, Permissions::from_mode(LOG_MODE))
        .with_context(|| format!("Failed to restrict log file: {}", path.display()))?;
    Ok(file)
}

/// Plain-text subscriber recording everything down to debug level
fn subscriber<W>(writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_max_level(Level::DEBUG)
        .finish()
}

/// Install the global subscriber writing to `path`
pub fn init(path: &Path) -> Result<()> {
    let file = open(path)?;
    tracing::subscriber::set_global_default(subscriber(Mutex::new(file)))
        .context("Failed to install log subscriber")
}
