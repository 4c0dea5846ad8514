use std::ops::Range;

use ndarray::Array2;
use time::PrimitiveDateTime;

use super::constants::{BASETIME, BASETIME_STR, SIZE_CHANNEL_COLUMNS, TIMEZONE};
use super::error::TabularError;
use super::field_map::{mode_code, pack_error_bits, ColumnRef, FieldKind, FieldSpec, FIELD_MAP};
use super::tabular::TabularTable;

/// Typed values of one output variable
#[derive(Debug, Clone, PartialEq)]
pub enum VariableData {
    F32(Vec<f32>),
    I16(Vec<i16>),
    U8(Vec<u8>),
    /// (time, sizes)
    Matrix(Array2<f32>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactVariable {
    pub spec: &'static FieldSpec,
    pub data: VariableData,
}

/// The converted contents of one data file, ready to be written.
///
/// `sizes` keeps the header order of the size channels, which is also the order of the
/// second axis of `spectra`. `time` is seconds since BASETIME in the station's local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredArtifact {
    pub sizes: Vec<f32>,
    pub time: Vec<f64>,
    pub variables: Vec<ArtifactVariable>,
}

/// Units attribute of the time variable, e.g. `Seconds since 2020-01-01T00:00:00+04:00`
pub fn time_units() -> String {
    format!("Seconds since {BASETIME_STR}{TIMEZONE}")
}

/// Seconds from BASETIME to `timestamp`. No timezone shift is applied.
pub fn elapsed_seconds(timestamp: PrimitiveDateTime) -> f64 {
    (timestamp - BASETIME).as_seconds_f64()
}

impl StructuredArtifact {
    /// Apply FIELD_MAP to a parsed table
    pub fn from_table(table: &TabularTable) -> Result<Self, TabularError> {
        table.require_columns(SIZE_CHANNEL_COLUMNS.end)?;
        let sizes = table.headers()[SIZE_CHANNEL_COLUMNS]
            .iter()
            .map(|label| {
                label
                    .parse::<f32>()
                    .map_err(|_| TabularError::BadSizeLabel(label.clone()))
            })
            .collect::<Result<Vec<f32>, TabularError>>()?;
        let time = table
            .timestamps()
            .iter()
            .map(|t| elapsed_seconds(*t))
            .collect();

        let variables = FIELD_MAP
            .iter()
            .map(|spec| {
                Ok(ArtifactVariable {
                    spec,
                    data: Self::map_field(table, spec)?,
                })
            })
            .collect::<Result<Vec<ArtifactVariable>, TabularError>>()?;

        Ok(Self {
            sizes,
            time,
            variables,
        })
    }

    fn map_field(table: &TabularTable, spec: &FieldSpec) -> Result<VariableData, TabularError> {
        let columns = Self::resolve(table, &spec.source)?;
        let data = match spec.kind {
            FieldKind::Float => VariableData::F32(table.float_column(columns.start)?),
            FieldKind::Int16 => VariableData::I16(
                table
                    .numeric_column(columns.start)?
                    .into_iter()
                    .map(|v| v as i16)
                    .collect(),
            ),
            FieldKind::Mode => VariableData::U8(
                table
                    .numeric_column(columns.start)?
                    .into_iter()
                    .map(mode_code)
                    .collect(),
            ),
            FieldKind::ErrorBits => {
                let flags = columns
                    .map(|col| table.flag_column(col))
                    .collect::<Result<Vec<Vec<bool>>, TabularError>>()?;
                let mut row_flags = Vec::with_capacity(flags.len());
                let packed = (0..table.n_rows())
                    .map(|row| {
                        row_flags.clear();
                        row_flags.extend(flags.iter().map(|column| column[row]));
                        pack_error_bits(&row_flags)
                    })
                    .collect();
                VariableData::U8(packed)
            }
            FieldKind::Spectra => {
                let mut matrix = Array2::<f32>::zeros([table.n_rows(), columns.len()]);
                for (channel, col) in columns.enumerate() {
                    for (row, value) in table.float_column(col)?.into_iter().enumerate() {
                        matrix[[row, channel]] = value;
                    }
                }
                VariableData::Matrix(matrix)
            }
        };
        Ok(data)
    }

    fn resolve(table: &TabularTable, source: &ColumnRef) -> Result<Range<usize>, TabularError> {
        match source {
            ColumnRef::Named(name) => {
                let idx = table.column_index(name)?;
                Ok(idx..idx + 1)
            }
            ColumnRef::Block(range) => {
                table.require_columns(range.end)?;
                Ok(range.clone())
            }
        }
    }

    pub fn n_times(&self) -> usize {
        self.time.len()
    }

    pub fn variable(&self, name: &str) -> Option<&ArtifactVariable> {
        self.variables.iter().find(|v| v.spec.name == name)
    }
}
