use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::OffsetDateTime;

use super::artifact::StructuredArtifact;
use super::constants::{
    ARTIFACT_EXTENSION, DATA_FILE_SUFFIX, STAGING_ARTIFACT_NAME, STAGING_DOWNLOAD_NAME,
    TITLE_PREFIX,
};
use super::error::ConversionError;
use super::nc_writer::write_artifact;
use super::tabular::TabularTable;

/// Converts a downloaded tabular data file into a NetCDF artifact next to it.
///
/// The artifact is written under a staging name and renamed to `<stem>.nc` only once every
/// variable is on disk. Converting the same file again replaces the artifact in one step. The
/// source file is never touched.
#[derive(Debug, Clone)]
pub struct SchemaConverter {
    timestamp_format: String,
}

impl SchemaConverter {
    pub fn new(timestamp_format: &str) -> Self {
        Self {
            timestamp_format: timestamp_format.to_string(),
        }
    }

    /// Name of the artifact produced for `filename`
    pub fn artifact_name(filename: &str) -> Result<String, ConversionError> {
        match filename.strip_suffix(DATA_FILE_SUFFIX) {
            Some(stem) if !stem.is_empty() && filename != STAGING_DOWNLOAD_NAME => {
                Ok(format!("{stem}.{ARTIFACT_EXTENSION}"))
            }
            _ => Err(ConversionError::BadFileName(filename.to_string())),
        }
    }

    pub fn convert(&self, local_dir: &Path, filename: &str) -> Result<PathBuf, ConversionError> {
        let artifact_name = Self::artifact_name(filename)?;
        let source = local_dir.join(filename);
        let staging = local_dir.join(STAGING_ARTIFACT_NAME);
        let final_path = local_dir.join(artifact_name);

        let table = TabularTable::read(&source, &self.timestamp_format)?;
        let artifact = StructuredArtifact::from_table(&table)?;

        if let Err(e) = write_artifact(&staging, &title(), &artifact) {
            remove_staging(&staging);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&staging, &final_path) {
            remove_staging(&staging);
            return Err(e.into());
        }
        spdlog::info!(
            "Converted {} to {} ({} records)",
            filename,
            final_path.display(),
            artifact.n_times()
        );
        Ok(final_path)
    }
}

fn title() -> String {
    let now = OffsetDateTime::now_utc();
    // e.g. Tue Mar 28 13:49:00 2023
    let format = format_description!(
        "[weekday repr:short] [month repr:short] [day padding:space] [hour]:[minute]:[second] [year]"
    );
    match now.format(format) {
        Ok(stamp) => format!("{TITLE_PREFIX} {stamp}"),
        Err(_) => format!("{TITLE_PREFIX} {now}"),
    }
}

fn remove_staging(staging: &Path) {
    if staging.exists() {
        if let Err(e) = std::fs::remove_file(staging) {
            spdlog::warn!("Could not remove {}: {}", staging.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_artifact_name() {
        assert_eq!(
            SchemaConverter::artifact_name("DUSTMONITOR_0815_2024_03.txt").unwrap(),
            "DUSTMONITOR_0815_2024_03.nc"
        );
        assert_matches!(
            SchemaConverter::artifact_name("DUSTMONITOR_0815_2024_03.nc"),
            Err(ConversionError::BadFileName(_))
        );
        assert_matches!(
            SchemaConverter::artifact_name(".txt"),
            Err(ConversionError::BadFileName(_))
        );
        assert_matches!(
            SchemaConverter::artifact_name(STAGING_DOWNLOAD_NAME),
            Err(ConversionError::BadFileName(_))
        );
    }

    #[test]
    fn test_title() {
        let title = title();
        assert!(title.starts_with("PALAS Fidas 200 S data - downloaded on "));
        assert!(title.len() > TITLE_PREFIX.len() + 20);
    }

    #[test]
    fn test_missing_source_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let converter = SchemaConverter::new(crate::constants::DEFAULT_TIMESTAMP_FORMAT);
        let result = converter.convert(dir.path(), "DUSTMONITOR_0815_2024_03.txt");
        assert_matches!(result, Err(ConversionError::TabularError(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
