use ndarray::Array2;
use std::path::{Path, PathBuf};

use super::artifact::{time_units, ArtifactVariable, StructuredArtifact, VariableData};
use super::error::NcWriterError;
use super::field_map::FieldSpec;

const SIZES_NAME: &str = "sizes";
const TIME_NAME: &str = "time";
const UNITS_ATTR: &str = "units";
const LONG_NAME_ATTR: &str = "long_name";

/// A thin wrapper around the netcdf library.
///
/// Creates a NetCDF file with two dimensions, a fixed `sizes` and an unlimited `time`, and
/// writes the coordinate variables followed by one variable per FIELD_MAP entry. Every variable
/// carries a `units` and a `long_name` attribute.
pub struct NcWriter {
    file: netcdf::FileMut,
    path: PathBuf,
    n_times: usize,
}

// Structure
// title (global attribute)
// sizes(sizes) - units, long_name
// time(time) - units, long_name
// <field>(time) - units, long_name
// spectra(time, sizes) - units, long_name

impl NcWriter {
    /// Create the file and write both coordinate variables
    pub fn create(
        path: &Path,
        title: &str,
        sizes: &[f32],
        time: &[f64],
    ) -> Result<Self, NcWriterError> {
        let mut file = netcdf::create(path)?;
        file.add_attribute("title", title)?;
        file.add_dimension(SIZES_NAME, sizes.len())?;
        file.add_unlimited_dimension(TIME_NAME)?;

        let mut sizes_var = file.add_variable::<f32>(SIZES_NAME, &[SIZES_NAME])?;
        sizes_var.put_attribute(UNITS_ATTR, "µm")?;
        sizes_var.put_attribute(LONG_NAME_ATTR, "size classes of dust particles")?;
        if !sizes.is_empty() {
            sizes_var.put_values(sizes, 0..sizes.len())?;
        }

        let mut time_var = file.add_variable::<f64>(TIME_NAME, &[TIME_NAME])?;
        time_var.put_attribute(UNITS_ATTR, time_units().as_str())?;
        time_var.put_attribute(LONG_NAME_ATTR, "time")?;
        if !time.is_empty() {
            time_var.put_values(time, 0..time.len())?;
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
            n_times: time.len(),
        })
    }

    pub fn write_variable(&mut self, variable: &ArtifactVariable) -> Result<(), NcWriterError> {
        match &variable.data {
            VariableData::F32(values) => self.write_series_f32(variable.spec, values),
            VariableData::I16(values) => self.write_series_i16(variable.spec, values),
            VariableData::U8(values) => self.write_series_u8(variable.spec, values),
            VariableData::Matrix(values) => self.write_spectra(variable.spec, values),
        }
    }

    fn write_series_f32(&mut self, spec: &FieldSpec, values: &[f32]) -> Result<(), NcWriterError> {
        let mut var = self.file.add_variable::<f32>(spec.name, &[TIME_NAME])?;
        var.put_attribute(UNITS_ATTR, spec.units)?;
        var.put_attribute(LONG_NAME_ATTR, spec.long_name)?;
        if self.n_times > 0 {
            var.put_values(values, 0..self.n_times)?;
        }
        Ok(())
    }

    fn write_series_i16(&mut self, spec: &FieldSpec, values: &[i16]) -> Result<(), NcWriterError> {
        let mut var = self.file.add_variable::<i16>(spec.name, &[TIME_NAME])?;
        var.put_attribute(UNITS_ATTR, spec.units)?;
        var.put_attribute(LONG_NAME_ATTR, spec.long_name)?;
        if self.n_times > 0 {
            var.put_values(values, 0..self.n_times)?;
        }
        Ok(())
    }

    fn write_series_u8(&mut self, spec: &FieldSpec, values: &[u8]) -> Result<(), NcWriterError> {
        let mut var = self.file.add_variable::<u8>(spec.name, &[TIME_NAME])?;
        var.put_attribute(UNITS_ATTR, spec.units)?;
        var.put_attribute(LONG_NAME_ATTR, spec.long_name)?;
        if self.n_times > 0 {
            var.put_values(values, 0..self.n_times)?;
        }
        Ok(())
    }

    fn write_spectra(&mut self, spec: &FieldSpec, values: &Array2<f32>) -> Result<(), NcWriterError> {
        let mut var = self
            .file
            .add_variable::<f32>(spec.name, &[TIME_NAME, SIZES_NAME])?;
        var.put_attribute(UNITS_ATTR, spec.units)?;
        var.put_attribute(LONG_NAME_ATTR, spec.long_name)?;
        if self.n_times > 0 {
            let data = values.as_slice().ok_or(NcWriterError::NonContiguous)?;
            var.put_values(data, (0..self.n_times, 0..values.ncols()))?;
        }
        Ok(())
    }

    /// Flush and close the file, returning its path
    pub fn close(self) -> Result<PathBuf, NcWriterError> {
        self.file.close()?;
        Ok(self.path)
    }
}

/// Write a whole artifact to `path`
pub fn write_artifact(
    path: &Path,
    title: &str,
    artifact: &StructuredArtifact,
) -> Result<PathBuf, NcWriterError> {
    let mut writer = NcWriter::create(path, title, &artifact.sizes, &artifact.time)?;
    for variable in artifact.variables.iter() {
        writer.write_variable(variable)?;
    }
    writer.close()
}
