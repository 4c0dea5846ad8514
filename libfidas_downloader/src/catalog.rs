use std::fmt;
use std::io::Write;
use std::net::ToSocketAddrs;
use std::time::Duration;

use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};

use super::config::Config;
use super::constants::{DATA_FILE_SUFFIX, MONTH_FROM_END, YEAR_FROM_END};
use super::error::{CatalogError, TransferError};
use super::transfer::{copy_until_deadline, is_read_timeout, Deadline};

/// A (year, month) pair identifying one monthly data file. Ordered by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    pub year: u16,
    pub month: u8,
}

impl PeriodKey {
    pub fn new(year: u16, month: u8) -> Self {
        Self { year, month }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A data file found in the remote listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub filename: String,
    pub period: PeriodKey,
}

impl RemoteEntry {
    /// Parse one line of a LIST response. The file name is the last whitespace separated token.
    pub fn from_listing_line(line: &str, prefix: &str) -> Option<Self> {
        let name = line.split_whitespace().last()?;
        Self::from_filename(name, prefix)
    }

    /// Parse a file name of the form `PREFIX*_YYYY_MM.txt`.
    ///
    /// Returns None if the name does not follow the instrument naming convention.
    pub fn from_filename(name: &str, prefix: &str) -> Option<Self> {
        if !name.starts_with(prefix)
            || !name.ends_with(DATA_FILE_SUFFIX)
            || name.len() < prefix.len() + YEAR_FROM_END.0
        {
            return None;
        }
        let year = digits_from_end(name, YEAR_FROM_END)?.parse().ok()?;
        let month = digits_from_end(name, MONTH_FROM_END)?.parse().ok()?;
        Some(Self {
            filename: name.to_string(),
            period: PeriodKey::new(year, month),
        })
    }
}

fn digits_from_end(name: &str, (start, end): (usize, usize)) -> Option<&str> {
    let len = name.len();
    let digits = name.get(len.checked_sub(start)?..len.checked_sub(end)?)?;
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

/// An open, authenticated session with the remote instrument, positioned in the data directory.
///
/// A session is used strictly sequentially: one listing, then one transfer at a time.
pub trait RemoteSource {
    /// Return the raw directory listing, one line per entry
    fn list(&mut self) -> Result<Vec<String>, CatalogError>;

    /// Stream `name` into `sink`, giving up once `deadline` expires. Returns the number of bytes written.
    fn retrieve(
        &mut self,
        name: &str,
        sink: &mut dyn Write,
        deadline: &Deadline,
    ) -> Result<u64, TransferError>;

    /// Politely end the session
    fn quit(&mut self) -> Result<(), CatalogError>;
}

/// Opens new sessions. One session is opened per poll cycle.
pub trait Connector {
    fn connect(&self) -> Result<Box<dyn RemoteSource>, CatalogError>;
}

/// Open a session and fetch the directory listing.
///
/// Errors are returned as is; retrying is up to the caller.
pub fn open_catalog(
    connector: &dyn Connector,
) -> Result<(Box<dyn RemoteSource>, Vec<String>), CatalogError> {
    let mut source = connector.connect()?;
    let listing = source.list()?;
    Ok((source, listing))
}

/// Connects to the Fidas FTP server
#[derive(Debug, Clone)]
pub struct FtpConnector {
    address: String,
    username: String,
    password: String,
    remote_dir: String,
    connect_timeout: Duration,
    transfer_timeout: Duration,
}

impl FtpConnector {
    pub fn new(config: &Config) -> Self {
        Self {
            address: config.address(),
            username: config.username.clone(),
            password: config.password.clone(),
            remote_dir: config.remote_dir.clone(),
            connect_timeout: config.connect_timeout(),
            transfer_timeout: config.transfer_timeout(),
        }
    }
}

impl Connector for FtpConnector {
    fn connect(&self) -> Result<Box<dyn RemoteSource>, CatalogError> {
        let addr = self
            .address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| CatalogError::UnresolvedHost(self.address.clone()))?;
        let mut stream = FtpStream::connect_timeout(addr, self.connect_timeout)?;
        // Replies on the control connection should never take longer than a whole transfer
        stream
            .get_ref()
            .set_read_timeout(Some(self.transfer_timeout))?;
        stream.login(&self.username, &self.password)?;
        stream.cwd(&self.remote_dir)?;
        stream.transfer_type(FileType::Binary)?;
        spdlog::info!("Connection to {} open.", self.address);
        Ok(Box::new(FtpSource {
            stream,
            control_timeout: self.transfer_timeout,
        }))
    }
}

/// A logged-in FTP control connection
pub struct FtpSource {
    stream: FtpStream,
    control_timeout: Duration,
}

impl FtpSource {
    /// Bound the next control connection reply by what is left of `deadline`
    fn arm_control(&self, deadline: &Deadline) -> Result<(), TransferError> {
        let remaining = deadline.check()?;
        self.stream.get_ref().set_read_timeout(Some(remaining))?;
        Ok(())
    }
}

fn transfer_error(err: FtpError, deadline: &Deadline) -> TransferError {
    match err {
        FtpError::ConnectionError(ref io) if is_read_timeout(io) => deadline.interrupted(),
        other => other.into(),
    }
}

impl RemoteSource for FtpSource {
    fn list(&mut self) -> Result<Vec<String>, CatalogError> {
        Ok(self.stream.list(None)?)
    }

    fn retrieve(
        &mut self,
        name: &str,
        sink: &mut dyn Write,
        deadline: &Deadline,
    ) -> Result<u64, TransferError> {
        // Every wait on either connection is bounded by the same deadline. On error the data
        // stream is dropped unfinished and the control connection is left in an unknown state;
        // the caller discards the whole session.
        self.arm_control(deadline)?;
        let mut data = self
            .stream
            .retr_as_stream(name)
            .map_err(|e| transfer_error(e, deadline))?;
        let bytes = copy_until_deadline(&mut data, sink, deadline, |data, remaining| {
            data.get_ref().set_read_timeout(Some(remaining))
        })?;
        self.arm_control(deadline)?;
        self.stream
            .finalize_retr_stream(data)
            .map_err(|e| transfer_error(e, deadline))?;
        self.stream
            .get_ref()
            .set_read_timeout(Some(self.control_timeout))?;
        Ok(bytes)
    }

    fn quit(&mut self) -> Result<(), CatalogError> {
        Ok(self.stream.quit()?)
    }
}
