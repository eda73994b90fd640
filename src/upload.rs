use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::config::ServerConfig;

pub const HEADER_PEEK_LEN: usize = 12;
const DEBUG_PREFIX: &str = "rec-";
const DEBUG_EXTENSION: &str = "mp4";

/// Upload and debug directories shared by every request.
#[derive(Clone, Debug)]
pub struct UploadWorkspace {
    upload_dir: PathBuf,
    debug_dir: PathBuf,
    max_debug_files: usize,
}

impl UploadWorkspace {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            debug_dir: config.debug_dir.clone(),
            max_debug_files: config.max_debug_files,
        }
    }

    /// Creates both directories if they are missing.
    pub async fn prepare(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.debug_dir).await?;
        Ok(())
    }

    pub fn working_path(&self, id: &Uuid) -> PathBuf {
        self.upload_dir.join(format!("upload-{}.m4a", id.simple()))
    }

    /// Copies the upload into the debug directory and returns the copy's path.
    pub async fn save_debug_copy(&self, upload: &Upload) -> io::Result<PathBuf> {
        let debug_path = self.debug_dir.join(debug_file_name(Utc::now(), &upload.id));
        tokio::fs::copy(upload.path(), &debug_path).await?;

        if self.max_debug_files > 0 {
            if let Err(e) = self.prune_debug_copies().await {
                warn!("Failed to prune debug directory {}: {e}", self.debug_dir.display());
            }
        }

        Ok(debug_path)
    }

    async fn prune_debug_copies(&self) -> io::Result<()> {
        let mut entries = tokio::fs::read_dir(&self.debug_dir).await?;
        let mut copies = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(DEBUG_PREFIX) && name.ends_with(DEBUG_EXTENSION) {
                copies.push(name);
            }
        }

        if copies.len() <= self.max_debug_files {
            return Ok(());
        }

        // Names start with the timestamp, so lexical order is chronological.
        copies.sort();
        let excess = copies.len() - self.max_debug_files;
        for name in copies.into_iter().take(excess) {
            let path = self.debug_dir.join(&name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Pruned debug copy {}", path.display()),
                Err(e) => warn!("Failed to prune debug copy {}: {e}", path.display()),
            }
        }
        Ok(())
    }
}

/// Deletes the working file when dropped, unless [`UploadGuard::keep`] was called.
#[derive(Debug)]
pub struct UploadGuard {
    path: PathBuf,
    armed: bool,
}

impl UploadGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leaves the working file on disk.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }

    /// Deletes the working file on the runtime; `Drop` only covers early exits.
    pub async fn remove(self) {
        let path = self.keep();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed working file {}", path.display()),
            Err(e) => debug!("Could not remove working file {}: {e}", path.display()),
        }
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed working file {}", self.path.display()),
            Err(e) => debug!("Could not remove working file {}: {e}", self.path.display()),
        }
    }
}

/// A received upload sitting in the working directory.
#[derive(Debug)]
pub struct Upload {
    pub id: Uuid,
    pub original_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: u64,
    pub guard: UploadGuard,
}

impl Upload {
    pub fn path(&self) -> &Path {
        self.guard.path()
    }

    pub fn is_small(&self, small_file_threshold: u64) -> bool {
        self.size < small_file_threshold
    }

    pub fn log_summary(&self, small_file_threshold: u64) {
        info!("---- Incoming upload {} ----", self.id);
        info!("originalname: {}", self.original_name.as_deref().unwrap_or("(none)"));
        info!("mimetype    : {}", self.mime_type.as_deref().unwrap_or("(none)"));
        info!("saved path  : {}", self.path().display());
        info!("size bytes  : {}", self.size);

        if self.is_small(small_file_threshold) {
            warn!(
                "File is very small ({} bytes < {small_file_threshold}); likely silent mic or permissions issue.",
                self.size
            );
        }
    }
}

/// Reads up to the first [`HEADER_PEEK_LEN`] bytes of `path`.
pub async fn peek_header(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = vec![0u8; HEADER_PEEK_LEN];
    let mut filled = 0;
    while filled < HEADER_PEEK_LEN {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Renders header bytes for a log line, e.g. `... ftypM4A `.
pub fn render_header(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect()
}

/// ISO-8601 UTC timestamp with `:` and `.` made filesystem safe.
pub fn debug_stamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

pub fn debug_file_name(now: DateTime<Utc>, id: &Uuid) -> String {
    let short_id = id.simple().to_string();
    format!("{DEBUG_PREFIX}{}-{}.{DEBUG_EXTENSION}", debug_stamp(now), &short_id[..8])
}
