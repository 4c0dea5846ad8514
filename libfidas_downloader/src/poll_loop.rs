use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::cancel::CancelToken;
use super::catalog::{open_catalog, Connector};
use super::config::Config;
use super::convert::SchemaConverter;
use super::error::{ConversionError, CycleError};
use super::selection::{local_files, SelectionPolicy};
use super::transfer::TransferGuard;

/// Source of time for the poll loop. Tests substitute a fake to run cycles without waiting.
pub trait Clock {
    fn now(&self) -> Instant;

    /// Wait for `duration` or until `cancel` fires. Returns true if cancelled.
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        cancel.wait_timeout(duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// The next step runs a cycle
    Active,
    /// The next step sleeps for the given time
    Idle(Duration),
    /// Shut down, either by request or after a fatal error
    Stopped,
}

/// What a successful cycle did
#[derive(Debug, Default)]
pub struct CycleReport {
    pub downloaded: Vec<String>,
    pub converted: Vec<PathBuf>,
    pub failed_conversions: Vec<(String, ConversionError)>,
}

/// Time left to sleep after a cycle that took `elapsed`. Zero if the cycle overran.
pub fn sleep_for(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// The process-wide driver.
///
/// Alternates between running one cycle (Active) and sleeping out the rest of the poll interval
/// (Idle). A failed cycle is logged and the loop carries on at the usual cadence; only errors
/// reported as fatal, or cancellation of the token, stop it.
///
/// The target directory must have no other writer while the loop runs.
pub struct PollLoop<C: Clock> {
    connector: Box<dyn Connector>,
    policy: SelectionPolicy,
    guard: TransferGuard,
    converter: SchemaConverter,
    target_path: PathBuf,
    remote_dir: String,
    poll_interval: Duration,
    clock: C,
    cancel: CancelToken,
    state: LoopState,
}

impl<C: Clock> PollLoop<C> {
    pub fn new(config: &Config, connector: Box<dyn Connector>, clock: C, cancel: CancelToken) -> Self {
        Self {
            connector,
            policy: SelectionPolicy::new(&config.file_prefix),
            guard: TransferGuard::new(config.transfer_timeout(), config.keep_staging_on_timeout),
            converter: SchemaConverter::new(&config.timestamp_format),
            target_path: config.target_path.clone(),
            remote_dir: config.remote_dir.clone(),
            poll_interval: config.poll_interval(),
            clock,
            cancel,
            state: LoopState::Active,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run one full cycle: list, select, then fetch and convert each file in order.
    ///
    /// A failed conversion is recorded in the report and the cycle moves on; the raw file stays.
    /// Any other failure ends the cycle. The session is closed with QUIT only after success,
    /// otherwise it is just dropped.
    pub fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        spdlog::info!("Fidas data downloader cycle started");
        let (mut source, listing) = open_catalog(self.connector.as_ref())?;
        let local = local_files(&self.target_path).map_err(CycleError::LocalScanError)?;
        let download_set = self
            .policy
            .select(&listing, &local)
            .ok_or_else(|| CycleError::NoMatchingRemoteFiles(self.remote_dir.clone()))?;

        let mut report = CycleReport::default();
        for entry in download_set.entries() {
            spdlog::info!("Downloading {} (period {})", entry.filename, entry.period);
            self.guard.fetch(
                source.as_mut(),
                &entry.filename,
                &self.target_path,
                &self.cancel,
            )?;
            report.downloaded.push(entry.filename.clone());

            match self.converter.convert(&self.target_path, &entry.filename) {
                Ok(path) => report.converted.push(path),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    spdlog::error!("Failed to convert {}: {}", entry.filename, e);
                    report.failed_conversions.push((entry.filename.clone(), e));
                }
            }
        }

        if let Err(e) = source.quit() {
            spdlog::warn!("Connection did not close cleanly: {}", e);
        }
        Ok(report)
    }

    /// Advance the state machine by one transition and return the new state.
    ///
    /// Err is only returned for a fatal cycle error, after which the loop is Stopped.
    pub fn step(&mut self) -> Result<LoopState, CycleError> {
        self.state = match self.state {
            LoopState::Active => {
                let started = self.clock.now();
                let result = self.run_cycle();
                let elapsed = self.clock.now().saturating_duration_since(started);
                match result {
                    Ok(report) => spdlog::info!(
                        "Cycle finished in {:.1} s: {} downloaded, {} converted, {} failed conversions",
                        elapsed.as_secs_f64(),
                        report.downloaded.len(),
                        report.converted.len(),
                        report.failed_conversions.len()
                    ),
                    Err(e) if e.is_fatal() => {
                        spdlog::error!("Stopping after unrecoverable error: {}", e);
                        self.state = LoopState::Stopped;
                        return Err(e);
                    }
                    Err(e) => spdlog::error!("Cycle failed: {}", e),
                }
                if self.cancel.is_cancelled() {
                    LoopState::Stopped
                } else {
                    LoopState::Idle(sleep_for(self.poll_interval, elapsed))
                }
            }
            LoopState::Idle(duration) => {
                if self.clock.sleep(duration, &self.cancel) {
                    LoopState::Stopped
                } else {
                    LoopState::Active
                }
            }
            LoopState::Stopped => LoopState::Stopped,
        };
        Ok(self.state)
    }

    /// Poll until cancelled or a fatal error occurs
    pub fn run(&mut self) -> Result<(), CycleError> {
        while self.step()? != LoopState::Stopped {}
        spdlog::info!("Poll loop stopped.");
        Ok(())
    }
}
