use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::cancel::CancelToken;
use super::catalog::RemoteSource;
use super::constants::{STAGING_DOWNLOAD_NAME, TRANSFER_CHUNK_SIZE};
use super::error::TransferError;

/// The point in time after which a transfer is abandoned, optionally tied to a shutdown signal.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    expires_at: Instant,
    cancel: Option<CancelToken>,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            expires_at: started + timeout,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Time left before expiry. None once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }

    /// Err if the deadline passed or the transfer was cancelled
    pub fn check(&self) -> Result<Duration, TransferError> {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Err(TransferError::Cancelled);
        }
        self.remaining()
            .ok_or_else(|| TransferError::Timeout(self.started.elapsed()))
    }

    /// The error for a blocking read that was cut short by its timeout
    pub fn interrupted(&self) -> TransferError {
        match self.check() {
            Err(e) => e,
            Ok(_) => TransferError::Timeout(self.started.elapsed()),
        }
    }
}

/// True for the error kinds a socket read reports when its read timeout fires
pub fn is_read_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Copy `reader` into `writer` chunk by chunk, checking the deadline before every read.
///
/// `arm_timeout` is called before each read with the time left, so that a reader backed by a
/// socket can bound the blocking read itself. A read which times out is reported as a
/// `TransferError::Timeout`.
pub fn copy_until_deadline<R, W, F>(
    reader: &mut R,
    writer: &mut W,
    deadline: &Deadline,
    mut arm_timeout: F,
) -> Result<u64, TransferError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: FnMut(&R, Duration) -> std::io::Result<()>,
{
    let mut buffer = vec![0u8; TRANSFER_CHUNK_SIZE];
    let mut total: u64 = 0;
    loop {
        let remaining = deadline.check()?;
        arm_timeout(&*reader, remaining)?;
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if is_read_timeout(&e) => return Err(deadline.interrupted()),
            Err(e) => return Err(e.into()),
        };
        writer.write_all(&buffer[..n])?;
        total += n as u64;
    }
    Ok(total)
}

/// Performs a single file transfer under a hard wall-clock timeout.
///
/// Bytes land in a private staging file inside the target directory. Only once the whole file
/// has been received and synced is the staging file renamed to its final name, so the final
/// name never refers to a partial file. The target directory is assumed to have a single writer.
#[derive(Debug, Clone)]
pub struct TransferGuard {
    timeout: Duration,
    keep_staging_on_timeout: bool,
}

impl TransferGuard {
    pub fn new(timeout: Duration, keep_staging_on_timeout: bool) -> Self {
        Self {
            timeout,
            keep_staging_on_timeout,
        }
    }

    pub fn staging_path(local_dir: &Path) -> PathBuf {
        local_dir.join(STAGING_DOWNLOAD_NAME)
    }

    /// Fetch `remote_name` into `local_dir/remote_name`.
    ///
    /// On `TransferError::Timeout` the session must not be reused. The staging file is left
    /// behind for inspection when configured to; on every other failure it is removed.
    pub fn fetch(
        &self,
        source: &mut dyn RemoteSource,
        remote_name: &str,
        local_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<PathBuf, TransferError> {
        if remote_name.is_empty()
            || remote_name.contains(['/', '\\'])
            || remote_name == STAGING_DOWNLOAD_NAME
            || remote_name.starts_with('.')
        {
            return Err(TransferError::InvalidName(remote_name.to_string()));
        }
        let staging = Self::staging_path(local_dir);
        let final_path = local_dir.join(remote_name);
        let deadline = Deadline::after(self.timeout).with_cancel(cancel.clone());

        match Self::fetch_to_staging(source, remote_name, &staging, &deadline) {
            Ok(bytes) => {
                std::fs::rename(&staging, &final_path)?;
                spdlog::info!(
                    "Downloaded {} ({})",
                    remote_name,
                    human_bytes::human_bytes(bytes as f64)
                );
                Ok(final_path)
            }
            Err(e @ TransferError::Timeout(_)) if self.keep_staging_on_timeout => {
                spdlog::warn!(
                    "Transfer of {} timed out; leaving {} for inspection",
                    remote_name,
                    staging.display()
                );
                Err(e)
            }
            Err(e) => {
                if let Err(rm_err) = std::fs::remove_file(&staging) {
                    if rm_err.kind() != ErrorKind::NotFound {
                        spdlog::warn!("Could not remove {}: {}", staging.display(), rm_err);
                    }
                }
                Err(e)
            }
        }
    }

    // The staging file handle is dropped before returning on every path
    fn fetch_to_staging(
        source: &mut dyn RemoteSource,
        remote_name: &str,
        staging: &Path,
        deadline: &Deadline,
    ) -> Result<u64, TransferError> {
        let mut writer = BufWriter::new(File::create(staging)?);
        let bytes = source.retrieve(remote_name, &mut writer, deadline)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(bytes)
    }
}
