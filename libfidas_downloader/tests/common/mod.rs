#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use libfidas_downloader::cancel::CancelToken;
use libfidas_downloader::catalog::{Connector, RemoteSource};
use libfidas_downloader::constants::{ERROR_FLAG_COLUMNS, SIZE_CHANNEL_COLUMNS};
use libfidas_downloader::error::{CatalogError, TransferError};
use libfidas_downloader::poll_loop::Clock;
use libfidas_downloader::transfer::{copy_until_deadline, Deadline};

/// Named columns, in the order they are placed into the free slots of the record layout
const NAMED_COLUMNS: &[&str] = &[
    "PM1",
    "PM2.5",
    "PM4",
    "PM10",
    "PMtot",
    "Cn",
    "rH",
    "T_dew_point",
    "T",
    "p",
    "wind speed",
    "wind direction",
    "wind signal quality",
    "prec. int.",
    "prec. type",
    "flowrate",
    "velocity",
    "coincidence",
    "pump output",
    "IADS T",
    "channel deviation",
    "LED T",
    "modus",
    "alt. PM#1",
    "alt. PM#2",
    "alt. PM#3",
    "alt. PM#4",
    "alt. PM#5",
    "alt. PM#6",
    "alt. PM#7",
    "alt. PM#8",
    "alt. PM#9",
    "alt. PM#10",
    "alt. PM#11",
    "alt. PM#12",
    "alt. PM#13",
];

const FLAG_NAMES: [&str; 8] = [
    "flow err",
    "coincidence err",
    "pump err",
    "weather station err",
    "IADS err",
    "calibration err",
    "LED err",
    "operating mode err",
];

pub const N_SIZES: usize = 78;

/// One measurement row of a synthetic data file
#[derive(Debug, Clone)]
pub struct RowSpec {
    pub date: String,
    pub time: String,
    pub flags: [bool; 8],
    pub mode: u8,
}

impl RowSpec {
    pub fn new(date: &str, time: &str) -> Self {
        Self {
            date: date.to_string(),
            time: time.to_string(),
            flags: [false; 8],
            mode: 1,
        }
    }

    pub fn flags(mut self, set: &[usize]) -> Self {
        for bit in set {
            self.flags[*bit] = true;
        }
        self
    }

    pub fn mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }
}

/// Header of each slot in the record layout (slot 0 is the merged timestamp)
pub fn record_headers() -> Vec<String> {
    let mut headers = vec![String::from("date_time")];
    let mut named = NAMED_COLUMNS.iter();
    let mut size_channel = 0;
    while headers.len() < SIZE_CHANNEL_COLUMNS.end || named.len() > 0 {
        let slot = headers.len();
        if ERROR_FLAG_COLUMNS.contains(&slot) {
            headers.push(FLAG_NAMES[slot - ERROR_FLAG_COLUMNS.start].to_string());
        } else if SIZE_CHANNEL_COLUMNS.contains(&slot) {
            headers.push(size_label(size_channel));
            size_channel += 1;
        } else if let Some(name) = named.next() {
            headers.push(name.to_string());
        } else {
            headers.push(format!("unused {slot}"));
        }
    }
    headers
}

/// Size channel labels 0.10, 0.35, 0.60, ... written without float noise
pub fn size_label(channel: usize) -> String {
    let hundredths = 10 + channel * 25;
    format!("{}.{:02}", hundredths / 100, hundredths % 100)
}

pub fn slot_of(header: &str) -> usize {
    record_headers()
        .iter()
        .position(|h| h == header)
        .unwrap_or_else(|| panic!("no column {header}"))
}

/// The value written into a plain numeric cell
pub fn cell_value(slot: usize, row: usize) -> f64 {
    (slot * 100 + row) as f64
}

/// Tab separated text in the instrument's layout
pub fn data_file_text(rows: &[RowSpec]) -> String {
    let headers = record_headers();
    let mode_slot = slot_of("modus");
    let mut text = String::from("date\ttime");
    for header in headers.iter().skip(1) {
        text.push('\t');
        text.push_str(header);
    }
    text.push('\n');
    for (row, spec) in rows.iter().enumerate() {
        text.push_str(&spec.date);
        text.push('\t');
        text.push_str(&spec.time);
        for slot in 1..headers.len() {
            text.push('\t');
            if ERROR_FLAG_COLUMNS.contains(&slot) {
                let set = spec.flags[slot - ERROR_FLAG_COLUMNS.start];
                // Both spellings occur in instrument output
                text.push_str(match (set, slot % 2 == 0) {
                    (true, true) => "1",
                    (true, false) => "True",
                    (false, true) => "0",
                    (false, false) => "False",
                });
            } else if slot == mode_slot {
                text.push_str(&spec.mode.to_string());
            } else {
                text.push_str(&cell_value(slot, row).to_string());
            }
        }
        text.push('\n');
    }
    text
}

pub fn default_rows() -> Vec<RowSpec> {
    vec![
        RowSpec::new("01.03.2024", "00:00:00").flags(&[0, 3]),
        RowSpec::new("01.03.2024", "00:01:00").mode(3),
        RowSpec::new("02.03.2024", "00:00:30").flags(&[0, 1, 2, 3, 4, 5, 6, 7]),
    ]
}

pub fn write_data_file(dir: &Path, name: &str, rows: &[RowSpec]) {
    std::fs::write(dir.join(name), data_file_text(rows)).unwrap();
}

pub fn data_name(year: u16, month: u8) -> String {
    format!("DUSTMONITOR_0815_{year:04}_{month:02}.txt")
}

pub fn listing_line(name: &str) -> String {
    format!("-rw-r--r--    1 0        0          204800 Jan 01 00:00 {name}")
}

pub fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// What the scripted remote saw, shared between every session it opened
#[derive(Debug, Default)]
pub struct RemoteLog {
    pub connects: usize,
    pub retrieved: Vec<String>,
    pub quits: usize,
}

/// An in-memory stand-in for the instrument's FTP server
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    files: Arc<BTreeMap<String, Vec<u8>>>,
    extra_listing: Vec<String>,
    stalled: BTreeSet<String>,
    refuse: bool,
    pub log: Arc<Mutex<RemoteLog>>,
}

impl ScriptedConnector {
    pub fn new(files: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            files: Arc::new(files),
            ..Default::default()
        }
    }

    pub fn with_listing_noise(mut self, lines: &[&str]) -> Self {
        self.extra_listing = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Serve `name` so slowly that no realistic transfer timeout is long enough
    pub fn with_stalled(mut self, name: &str) -> Self {
        self.stalled.insert(name.to_string());
        self
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Default::default()
        }
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self) -> Result<Box<dyn RemoteSource>, CatalogError> {
        if self.refuse {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )
            .into());
        }
        self.log.lock().unwrap().connects += 1;
        Ok(Box::new(ScriptedSource {
            files: self.files.clone(),
            extra_listing: self.extra_listing.clone(),
            stalled: self.stalled.clone(),
            log: self.log.clone(),
        }))
    }
}

struct ScriptedSource {
    files: Arc<BTreeMap<String, Vec<u8>>>,
    extra_listing: Vec<String>,
    stalled: BTreeSet<String>,
    log: Arc<Mutex<RemoteLog>>,
}

/// Hands out one byte per read, after a pause
struct TrickleReader {
    inner: Cursor<Vec<u8>>,
    pause: Duration,
}

impl Read for TrickleReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::thread::sleep(self.pause);
        let end = buf.len().min(1);
        self.inner.read(&mut buf[..end])
    }
}

impl RemoteSource for ScriptedSource {
    fn list(&mut self) -> Result<Vec<String>, CatalogError> {
        let mut lines: Vec<String> = self.files.keys().map(|n| listing_line(n)).collect();
        lines.extend(self.extra_listing.iter().cloned());
        Ok(lines)
    }

    fn retrieve(
        &mut self,
        name: &str,
        sink: &mut dyn Write,
        deadline: &Deadline,
    ) -> Result<u64, TransferError> {
        self.log.lock().unwrap().retrieved.push(name.to_string());
        let bytes = self.files.get(name).cloned().ok_or_else(|| {
            TransferError::IOError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "550 file not found",
            ))
        })?;
        if self.stalled.contains(name) {
            let mut reader = TrickleReader {
                inner: Cursor::new(bytes),
                pause: Duration::from_millis(100),
            };
            return copy_until_deadline(&mut reader, sink, deadline, |_, _| Ok(()));
        }
        copy_until_deadline(&mut Cursor::new(bytes), sink, deadline, |_, _| Ok(()))
    }

    fn quit(&mut self) -> Result<(), CatalogError> {
        self.log.lock().unwrap().quits += 1;
        Ok(())
    }
}

/// A clock where every reading advances time by `tick`, and sleeping returns at once
pub struct FakeClock {
    base: Instant,
    offset: Cell<Duration>,
    tick: Duration,
    pub sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl FakeClock {
    pub fn new(tick: Duration) -> Self {
        Self {
            base: Instant::now(),
            offset: Cell::new(Duration::ZERO),
            tick,
            sleeps: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        let now = self.base + self.offset.get();
        self.offset.set(self.offset.get() + self.tick);
        now
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        self.sleeps.borrow_mut().push(duration);
        cancel.is_cancelled()
    }
}
