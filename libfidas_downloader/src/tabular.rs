use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use time::PrimitiveDateTime;

use super::constants::{DATE_COLUMN, TIMESTAMP_COLUMN, TIME_COLUMN};
use super::error::TabularError;

/// A fully parsed Fidas data file, held in the record layout.
///
/// The source file's `date` and `time` columns are merged into a single timestamp column at
/// index 0; every later column sits one position to the left of where it is in the file.
/// Cells other than the timestamp are kept as text and parsed on demand, so columns the
/// converter does not use never cause a failure.
#[derive(Debug, Clone)]
pub struct TabularTable {
    headers: Vec<String>,
    timestamps: Vec<PrimitiveDateTime>,
    rows: Vec<Vec<String>>,
}

impl TabularTable {
    /// Read a tab separated file with a header row
    pub fn read(path: &Path, timestamp_format: &str) -> Result<Self, TabularError> {
        if !path.exists() {
            return Err(TabularError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), timestamp_format)
    }

    /// Parse from any reader. Any row which fails to parse fails the whole table.
    pub fn from_reader<R: Read>(reader: R, timestamp_format: &str) -> Result<Self, TabularError> {
        let format = time::format_description::parse(timestamp_format)
            .map_err(|e| TabularError::BadTimestampFormat(timestamp_format.to_string(), e))?;

        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let raw_headers = rdr.headers()?.clone();
        if raw_headers.get(0) != Some(DATE_COLUMN) || raw_headers.get(1) != Some(TIME_COLUMN) {
            return Err(TabularError::MissingTimestampColumns);
        }
        let mut headers = Vec::with_capacity(raw_headers.len() - 1);
        headers.push(String::from(TIMESTAMP_COLUMN));
        headers.extend(raw_headers.iter().skip(2).map(String::from));

        let mut timestamps = Vec::new();
        let mut rows = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result?;
            let row = idx + 1;
            let joined = format!(
                "{} {}",
                record.get(0).unwrap_or_default(),
                record.get(1).unwrap_or_default()
            );
            let timestamp = PrimitiveDateTime::parse(&joined, &format).map_err(|source| {
                TabularError::BadTimestamp {
                    row,
                    value: joined.clone(),
                    source,
                }
            })?;
            let mut cells = Vec::with_capacity(headers.len());
            cells.push(joined);
            cells.extend(record.iter().skip(2).map(String::from));
            timestamps.push(timestamp);
            rows.push(cells);
        }

        Ok(Self {
            headers,
            timestamps,
            rows,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn timestamps(&self) -> &[PrimitiveDateTime] {
        &self.timestamps
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.headers.len()
    }

    /// Fail unless the record layout has at least `expected` columns
    pub fn require_columns(&self, expected: usize) -> Result<(), TabularError> {
        if self.n_columns() < expected {
            Err(TabularError::TooFewColumns {
                found: self.n_columns(),
                expected,
            })
        } else {
            Ok(())
        }
    }

    /// Position of the first column with the given header
    pub fn column_index(&self, name: &str) -> Result<usize, TabularError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| TabularError::MissingColumn(name.to_string()))
    }

    /// Every value of a column as f64. Empty cells are NaN.
    pub fn numeric_column(&self, column: usize) -> Result<Vec<f64>, TabularError> {
        self.require_columns(column + 1)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, cells)| {
                let cell = &cells[column];
                parse_number(cell).ok_or_else(|| TabularError::BadValue {
                    row: idx + 1,
                    column: self.headers[column].clone(),
                    value: cell.clone(),
                })
            })
            .collect()
    }

    pub fn float_column(&self, column: usize) -> Result<Vec<f32>, TabularError> {
        Ok(self
            .numeric_column(column)?
            .into_iter()
            .map(|v| v as f32)
            .collect())
    }

    /// A flag is set when its numeric value is neither zero nor missing
    pub fn flag_column(&self, column: usize) -> Result<Vec<bool>, TabularError> {
        Ok(self
            .numeric_column(column)?
            .into_iter()
            .map(|v| !v.is_nan() && v != 0.0)
            .collect())
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    if cell.eq_ignore_ascii_case("true") {
        return Some(1.0);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Some(0.0);
    }
    cell.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_TIMESTAMP_FORMAT;
    use assert_matches::assert_matches;
    use time::macros::datetime;

    const SAMPLE: &str = "date\ttime\tPM1\tflow err\tmodus\n\
                          28.03.2023\t13:49:00\t4.5\t0\t1\n\
                          28.03.2023\t13:50:00\t\tTrue\t2\n";

    fn sample() -> TabularTable {
        TabularTable::from_reader(SAMPLE.as_bytes(), DEFAULT_TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_timestamp_columns_are_merged() {
        let table = sample();
        assert_eq!(table.headers(), &["date_time", "PM1", "flow err", "modus"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(
            table.timestamps(),
            &[datetime!(2023-03-28 13:49:00), datetime!(2023-03-28 13:50:00)]
        );
        assert_eq!(table.column_index("modus").unwrap(), 3);
    }

    #[test]
    fn test_cell_parsing() {
        let table = sample();
        let pm1 = table.float_column(1).unwrap();
        assert_eq!(pm1[0], 4.5);
        assert!(pm1[1].is_nan());
        assert_eq!(table.flag_column(2).unwrap(), vec![false, true]);
        assert_eq!(table.numeric_column(3).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_bad_timestamp_fails_whole_file() {
        let text = "date\ttime\tPM1\n28.03.2023\t13:49:00\t1\n2023-03-28\t13:50:00\t2\n";
        let result = TabularTable::from_reader(text.as_bytes(), DEFAULT_TIMESTAMP_FORMAT);
        assert_matches!(result, Err(TabularError::BadTimestamp { row: 2, .. }));
    }

    #[test]
    fn test_header_must_start_with_date_and_time() {
        let text = "time\tdate\tPM1\n13:49:00\t28.03.2023\t1\n";
        let result = TabularTable::from_reader(text.as_bytes(), DEFAULT_TIMESTAMP_FORMAT);
        assert_matches!(result, Err(TabularError::MissingTimestampColumns));
    }

    #[test]
    fn test_ragged_row_fails() {
        let text = "date\ttime\tPM1\n28.03.2023\t13:49:00\t1\t99\n";
        let result = TabularTable::from_reader(text.as_bytes(), DEFAULT_TIMESTAMP_FORMAT);
        assert_matches!(result, Err(TabularError::CsvError(_)));
    }

    #[test]
    fn test_non_numeric_cell_names_row_and_column() {
        let text = "date\ttime\tPM1\n28.03.2023\t13:49:00\tn/a\n";
        let table = TabularTable::from_reader(text.as_bytes(), DEFAULT_TIMESTAMP_FORMAT).unwrap();
        let err = table.float_column(1).unwrap_err();
        assert_matches!(err, TabularError::BadValue { row: 1, ref column, .. } if column == "PM1");
        assert_matches!(
            table.column_index("PM10"),
            Err(TabularError::MissingColumn(_))
        );
        assert_matches!(
            table.require_columns(121),
            Err(TabularError::TooFewColumns { found: 2, expected: 121 })
        );
    }
}
