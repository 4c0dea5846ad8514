use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("RemoteCatalog failed due to FTP error: {0}")]
    FtpError(#[from] suppaftp::FtpError),
    #[error("RemoteCatalog failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("RemoteCatalog could not resolve host {0}")]
    UnresolvedHost(String),
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Timeout while downloading data file; gave up after {0:?}")]
    Timeout(Duration),
    #[error("Transfer was cancelled before it completed")]
    Cancelled,
    #[error("Refusing to transfer {0:?}: not a plain file name")]
    InvalidName(String),
    #[error("Transfer failed due to FTP error: {0}")]
    FtpError(#[from] suppaftp::FtpError),
    #[error("Transfer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TabularError {
    #[error("Failed to read tabular file {0:?} as it does not exist")]
    BadFilePath(PathBuf),
    #[error("Tabular file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Tabular file failed to parse delimited records: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Tabular file must start with the columns 'date' and 'time'")]
    MissingTimestampColumns,
    #[error("Invalid timestamp format description {0:?}: {1}")]
    BadTimestampFormat(String, time::error::InvalidFormatDescription),
    #[error("Failed to parse timestamp {value:?} in row {row}: {source}")]
    BadTimestamp {
        row: usize,
        value: String,
        source: time::error::Parse,
    },
    #[error("Tabular file has {found} columns; at least {expected} are required")]
    TooFewColumns { found: usize, expected: usize },
    #[error("Tabular file has no column named {0:?}")]
    MissingColumn(String),
    #[error("Size channel header {0:?} is not a number")]
    BadSizeLabel(String),
    #[error("Failed to parse value {value:?} in row {row}, column {column:?}")]
    BadValue {
        row: usize,
        column: String,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum NcWriterError {
    #[error("NcWriter failed due to NetCDF error: {0}")]
    NetCDFError(#[from] netcdf::Error),
    #[error("NcWriter was given a matrix which is not contiguous in memory")]
    NonContiguous,
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Conversion failed due to tabular parsing error: {0}")]
    TabularError(#[from] TabularError),
    #[error("Conversion failed due to NcWriter error: {0}")]
    WriterError(#[from] NcWriterError),
    #[error("Conversion failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Conversion refused {0:?}: expected a .txt data file name")]
    BadFileName(String),
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Cycle failed due to remote connection error: {0}")]
    ConnectionError(#[from] CatalogError),
    #[error("Data files not found in folder: {0}")]
    NoMatchingRemoteFiles(String),
    #[error("Cycle failed due to transfer error: {0}")]
    TransferError(#[from] TransferError),
    #[error("Cycle failed due to conversion error: {0}")]
    ConversionError(#[from] ConversionError),
    #[error("Cycle failed to scan the target directory: {0}")]
    LocalScanError(std::io::Error),
}

fn is_storage_full(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::StorageFull
}

impl NcWriterError {
    /// The NetCDF library passes system errors through as positive error codes
    pub fn is_storage_full(&self) -> bool {
        match self {
            Self::NetCDFError(netcdf::Error::Netcdf(code)) if *code > 0 => {
                is_storage_full(&std::io::Error::from_raw_os_error(*code))
            }
            _ => false,
        }
    }
}

impl ConversionError {
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::IOError(e) => is_storage_full(e),
            Self::TabularError(TabularError::IOError(e)) => is_storage_full(e),
            Self::WriterError(e) => e.is_storage_full(),
            _ => false,
        }
    }
}

impl CycleError {
    /// Errors from which retrying on the next cycle cannot recover (e.g. the disk is full).
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::TransferError(TransferError::IOError(e)) => is_storage_full(e),
            Self::ConversionError(e) => e.is_fatal(),
            Self::LocalScanError(e) => is_storage_full(e),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_os = "linux")]
    fn test_netcdf_disk_full_is_fatal() {
        // ENOSPC as reported through the NetCDF library
        let err = ConversionError::WriterError(NcWriterError::NetCDFError(
            netcdf::Error::Netcdf(28),
        ));
        assert!(err.is_fatal());
        assert!(CycleError::ConversionError(err).is_fatal());
    }

    #[test]
    fn test_netcdf_library_errors_are_not_fatal() {
        // Negative codes are the library's own (NC_EBADID)
        let err = ConversionError::WriterError(NcWriterError::NetCDFError(
            netcdf::Error::Netcdf(-33),
        ));
        assert!(!err.is_fatal());
        assert!(!ConversionError::WriterError(NcWriterError::NonContiguous).is_fatal());
    }
}
