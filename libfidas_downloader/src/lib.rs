//! # fidas_downloader
//!
//! fidas_downloader fetches the monthly data files written by a PALAS Fidas 200 S dust
//! monitor over FTP, keeps a local copy of each one, and converts every fetched file from
//! the instrument's tab separated text format into a self-describing NetCDF file.
//!
//! ## Installation
//!
//! The only method of install is from source.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### NetCDF
//!
//! The netcdf crate links against the system netCDF-C library (and through it, HDF5). Install
//! both with your package manager (e.g. `apt install libnetcdf-dev`) before building. If the
//! library lives in a custom location, point `NETCDF_DIR` at it in `.cargo/config.toml`:
//!
//! ```toml
//! [env]
//! NETCDF_DIR="/path/to/my/netcdf/install/"
//! ```
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./fidas_downloader_cli` from the
//! top level repository.
//!
//! ## Usage
//!
//! ```text
//! fidas_downloader_cli -p config.yml new              # write a template configuration
//! fidas_downloader_cli -p config.yml                  # poll forever, Ctrl-C to stop
//! fidas_downloader_cli -p config.yml once             # run a single cycle
//! fidas_downloader_cli -p config.yml convert <file>   # convert a file already in target_path
//! ```
//!
//! Add `--log <file>` to also write the log to a file.
//!
//! ## Configuration
//!
//! ```yml
//! host: 192.168.1.20
//! port: 21
//! username: fidas
//! password: secret
//! remote_dir: /data
//! target_path: /srv/fidas
//! poll_interval_secs: 600
//! transfer_timeout_secs: 180
//! connect_timeout_secs: 30
//! keep_staging_on_timeout: true
//! file_prefix: DUSTMONITOR
//! timestamp_format: '[day].[month].[year] [hour]:[minute]:[second]'
//! ```
//!
//! - `target_path` must already exist, and nothing else may write into it while the
//! downloader runs.
//! - `transfer_timeout_secs` bounds a single file download. When it runs out the session is
//! abandoned and the cycle ends; the partial download is kept as `temporary_dust_file.txt`
//! unless `keep_staging_on_timeout` is false.
//! - `timestamp_format` uses the [time crate's format description syntax](https://time-rs.github.io/book/api/format-description.html)
//! and is applied to the `date` and `time` columns joined by a space.
//!
//! ## How a cycle works
//!
//! Every `poll_interval_secs` the downloader lists the remote directory and keeps the names
//! of the form `DUSTMONITOR*_YYYY_MM.txt`. The newest month is always downloaded, because the
//! instrument is still appending to it. Older months are then downloaded newest first until
//! one is reached that already exists locally; that month is downloaded a final time and the
//! walk stops. Each download is converted as soon as it lands.
//!
//! Files appear under their final names only through a rename, so a reader never sees a
//! partial `.txt` or `.nc` file.
//!
//! ## Output
//!
//! ```text
//! DUSTMONITOR_xxxx_2024_03.nc - title
//! |---- sizes(sizes) - units, long_name
//! |---- time(time) - units, long_name
//! |---- PM1, PM2.5, ..., LED_T (time) - units, long_name
//! |---- spectra(time, sizes) - units, long_name
//! |---- errors(time) - units, long_name
//! |---- mode(time) - units, long_name
//! |---- PM1a, ..., PMre (time) - units, long_name
//! ```
//!
//! `time` is in seconds since 2020-01-01T00:00:00 in the station's local time (UTC+4); the
//! offset is only recorded in the units attribute. `errors` packs the eight error flag
//! columns into one byte, see [`field_map::FIELD_MAP`] for the full variable list.
pub mod artifact;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod convert;
pub mod error;
pub mod field_map;
pub mod nc_writer;
pub mod poll_loop;
pub mod selection;
pub mod tabular;
pub mod transfer;
