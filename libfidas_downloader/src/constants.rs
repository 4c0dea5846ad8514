use std::ops::Range;

use time::macros::datetime;
use time::PrimitiveDateTime;

// Naming convention of the Fidas monthly data files: DUSTMONITOR_..._YYYY_MM.txt
pub const DATA_FILE_PREFIX: &str = "DUSTMONITOR";
pub const DATA_FILE_SUFFIX: &str = ".txt";
pub const ARTIFACT_EXTENSION: &str = "nc";

/// (start, end) offsets counted back from the end of a data file name: `name[len-11..len-7]`
pub const YEAR_FROM_END: (usize, usize) = (11, 7);
pub const MONTH_FROM_END: (usize, usize) = (6, 4);

// Private names used while a file is in flight. Never read by consumers.
pub const STAGING_DOWNLOAD_NAME: &str = "temporary_dust_file.txt";
pub const STAGING_ARTIFACT_NAME: &str = "temporary_dust_file.nc";

pub const DEFAULT_FTP_PORT: u16 = 21;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60 * 10;
pub const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 60 * 3;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Transfer buffer size for a single read from the data connection
pub const TRANSFER_CHUNK_SIZE: usize = 8 * 1024;

/// Time in the artifact is stored as seconds elapsed from this instant, in the station's local frame
pub const BASETIME: PrimitiveDateTime = datetime!(2020-01-01 00:00:00);
pub const BASETIME_STR: &str = "2020-01-01T00:00:00";
pub const TIMEZONE: &str = "+04:00";

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "[day].[month].[year] [hour]:[minute]:[second]";

// Source columns carrying the timestamp. They are merged into a single column at index 0
// of the record layout, so every later column index shifts left by one.
pub const DATE_COLUMN: &str = "date";
pub const TIME_COLUMN: &str = "time";
pub const TIMESTAMP_COLUMN: &str = "date_time";

/// Size channel columns in the record layout (0-indexed, half open)
pub const SIZE_CHANNEL_COLUMNS: Range<usize> = 43..121;
/// Boolean error flag columns in the record layout, lowest bit first
pub const ERROR_FLAG_COLUMNS: Range<usize> = 11..19;
pub const ERROR_FLAG_WEIGHTS: [u8; 8] = [1, 2, 4, 8, 16, 32, 64, 128];

pub const TITLE_PREFIX: &str = "PALAS Fidas 200 S data - downloaded on";
