// The Fidas 200 S writes a fixed tabular layout. Units and descriptions follow the
// manufacturer's column documentation for that layout. Everything the converter writes, apart
// from the two coordinate variables, is described by FIELD_MAP, in write order.
use std::ops::Range;

use super::constants::{ERROR_FLAG_COLUMNS, ERROR_FLAG_WEIGHTS, SIZE_CHANNEL_COLUMNS};

/// Where a variable's data lives in the record layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// A single column looked up by its header text
    Named(&'static str),
    /// A contiguous block of columns addressed by position
    Block(Range<usize>),
}

/// Output type and derivation of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// f32 copied from one column
    Float,
    /// i16 cast from one column
    Int16,
    /// u8 bit field packed from the boolean flag block
    ErrorBits,
    /// u8 cast from the operation mode column, unvalidated
    Mode,
    /// f32 matrix (time, sizes) copied from the size channel block
    Spectra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGroup {
    /// Concentrations and weather data
    Primary,
    /// Instrument health
    Diagnostic,
    /// Alternative PM definitions. Persisted, but not offered as time series.
    Alternative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub source: ColumnRef,
    pub kind: FieldKind,
    pub units: &'static str,
    pub long_name: &'static str,
    pub group: FieldGroup,
}

const fn float(
    name: &'static str,
    column: &'static str,
    units: &'static str,
    long_name: &'static str,
    group: FieldGroup,
) -> FieldSpec {
    FieldSpec {
        name,
        source: ColumnRef::Named(column),
        kind: FieldKind::Float,
        units,
        long_name,
        group,
    }
}

const CONCENTRATION: &str = "µg/m³";

pub static FIELD_MAP: &[FieldSpec] = &[
    float("PM1", "PM1", CONCENTRATION, "dust concentration up to 1 µm size", FieldGroup::Primary),
    float("PM2.5", "PM2.5", CONCENTRATION, "dust concentration up to 2.5 µm size", FieldGroup::Primary),
    float("PM4", "PM4", CONCENTRATION, "dust concentration up to 4 µm size", FieldGroup::Primary),
    float("PM10", "PM10", CONCENTRATION, "dust concentration up to 10 µm size", FieldGroup::Primary),
    float("PMtot", "PMtot", CONCENTRATION, "total dust concentration", FieldGroup::Primary),
    float("Cn", "Cn", "particles/cm³", "count number per volume", FieldGroup::Primary),
    float("rH", "rH", "%", "relative humidity", FieldGroup::Primary),
    float("dewT", "T_dew_point", "°C", "dew point temperature", FieldGroup::Primary),
    float("T", "T", "°C", "air temperature", FieldGroup::Primary),
    float("p", "p", "hPa", "atmospheric pressure", FieldGroup::Primary),
    float("Wspeed", "wind speed", "Km/h", "wind speed", FieldGroup::Primary),
    float("Wdir", "wind direction", "°", "wind direction", FieldGroup::Primary),
    float("Wq", "wind signal quality", "%", "wind signal quality", FieldGroup::Primary),
    float("prec", "prec. int.", "l/m²/h", "precipitation intensity", FieldGroup::Primary),
    FieldSpec {
        name: "ptype",
        source: ColumnRef::Named("prec. type"),
        kind: FieldKind::Int16,
        units: "",
        long_name: "precipitation type",
        group: FieldGroup::Primary,
    },
    FieldSpec {
        name: "spectra",
        source: ColumnRef::Block(SIZE_CHANNEL_COLUMNS),
        kind: FieldKind::Spectra,
        units: "particles/cm³",
        long_name: "size spectra: count number per volume in given size channel",
        group: FieldGroup::Primary,
    },
    float("flowrate", "flowrate", "l/min", "flowrate", FieldGroup::Diagnostic),
    float("velocity", "velocity", "m/s", "velocity", FieldGroup::Diagnostic),
    float("coincidence", "coincidence", "%", "coincidence", FieldGroup::Diagnostic),
    float("po", "pump output", "%", "pump output", FieldGroup::Diagnostic),
    float("IADS_T", "IADS T", "°C - 318=not activated", "IADS Temperature", FieldGroup::Diagnostic),
    float("cd", "channel deviation", "raw channels", "channel deviation", FieldGroup::Diagnostic),
    float("LED_T", "LED T", "°C", "LED Temperature", FieldGroup::Diagnostic),
    FieldSpec {
        name: "errors",
        source: ColumnRef::Block(ERROR_FLAG_COLUMNS),
        kind: FieldKind::ErrorBits,
        units: "",
        long_name: "errors: 1=flow; 2=coincidence; 4=pump; 8=weather station; 16=IADS; 32=channel deviation; 64=LED temperature; 128=operation mode",
        group: FieldGroup::Diagnostic,
    },
    FieldSpec {
        name: "mode",
        source: ColumnRef::Named("modus"),
        kind: FieldKind::Mode,
        units: "",
        long_name: "operation mode: 0=scope; 1=auto; 2=manual; 3=idle; 4=calib; 5=offset",
        group: FieldGroup::Diagnostic,
    },
    float("PM1a", "alt. PM#1", CONCENTRATION, "PM1 - ambient", FieldGroup::Alternative),
    float("PM2.5a", "alt. PM#2", CONCENTRATION, "PM2.5 - ambient", FieldGroup::Alternative),
    float("PM4a", "alt. PM#3", CONCENTRATION, "PM4 - ambient", FieldGroup::Alternative),
    float("PM10a", "alt. PM#4", CONCENTRATION, "PM10 - ambient", FieldGroup::Alternative),
    float("PMtota", "alt. PM#5", CONCENTRATION, "PMtot - ambient", FieldGroup::Alternative),
    float("PM1c", "alt. PM#6", CONCENTRATION, "PM1 - classic", FieldGroup::Alternative),
    float("PM2.5c", "alt. PM#7", CONCENTRATION, "PM2.5 - classic", FieldGroup::Alternative),
    float("PM4c", "alt. PM#8", CONCENTRATION, "PM4 - classic", FieldGroup::Alternative),
    float("PM10c", "alt. PM#9", CONCENTRATION, "PM10 - classic", FieldGroup::Alternative),
    float("PMtotc", "alt. PM#10", CONCENTRATION, "PMtot - classic", FieldGroup::Alternative),
    float("PMth", "alt. PM#11", CONCENTRATION, "PM thoracic", FieldGroup::Alternative),
    float("PMal", "alt. PM#12", CONCENTRATION, "PM alveolar", FieldGroup::Alternative),
    float("PMre", "alt. PM#13", CONCENTRATION, "PM respirable", FieldGroup::Alternative),
];

/// Look up a variable by its output name
pub fn field(name: &str) -> Option<&'static FieldSpec> {
    FIELD_MAP.iter().find(|f| f.name == name)
}

/// The one-dimensional variables a viewer should offer for plotting
pub fn time_series_fields() -> impl Iterator<Item = &'static FieldSpec> {
    FIELD_MAP
        .iter()
        .filter(|f| f.kind != FieldKind::Spectra && f.group != FieldGroup::Alternative)
}

/// Pack up to eight flags, lowest bit first, into one byte
pub fn pack_error_bits(flags: &[bool]) -> u8 {
    flags
        .iter()
        .zip(ERROR_FLAG_WEIGHTS)
        .filter(|(set, _)| **set)
        .fold(0u8, |acc, (_, weight)| acc | weight)
}

/// Cast the raw operation mode. 0..=5 are defined by the instrument; others pass through.
pub fn mode_code(raw: f64) -> u8 {
    raw as u8
}
