use clap::{Arg, Command};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use libfidas_downloader::cancel::CancelToken;
use libfidas_downloader::catalog::FtpConnector;
use libfidas_downloader::config::Config;
use libfidas_downloader::convert::SchemaConverter;
use libfidas_downloader::poll_loop::{PollLoop, SystemClock};
use spdlog::formatter::{pattern, PatternFormatter};
use spdlog::sink::{FileSink, Sink, StdStream, StdStreamSink};

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

/// Log to stdout, and to `log_path` as well if given. Records from the log crate (the FTP
/// client logs through it) are forwarded to the same sinks.
fn init_logging(log_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(
        StdStreamSink::builder()
            .std_stream(StdStream::Stdout)
            .formatter(Box::new(PatternFormatter::new(pattern!(
                "[{date_short} {time_short}] - [{^{level}}] - {payload}{eol}"
            ))))
            .build()?,
    )];
    if let Some(path) = log_path {
        sinks.push(Arc::new(
            FileSink::builder()
                .path(path)
                .formatter(Box::new(PatternFormatter::new(pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ))))
                .truncate(false)
                .build()?,
        ));
    }
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sinks(sinks)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    spdlog::init_log_crate_proxy()?;
    log::set_max_level(log::LevelFilter::Info);
    Ok(())
}

fn load_config(config_path: &Path) -> Option<Config> {
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(config_path) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return None;
        }
    };
    if let Err(e) = config.validate() {
        spdlog::error!("{e}");
        return None;
    }
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("FTP server: {} in {}", config.address(), config.remote_dir);
    spdlog::info!("Target path: {}", config.target_path.to_string_lossy());
    spdlog::info!(
        "Poll interval: {} s Transfer timeout: {} s",
        config.poll_interval_secs,
        config.transfer_timeout_secs
    );
    Some(config)
}

fn main() -> ExitCode {
    // Create a cli
    let matches = Command::new("fidas_downloader_cli")
        .about("Download PALAS Fidas 200 S data files over FTP and convert them to NetCDF")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(Command::new("once").about("Run a single download cycle and exit"))
        .subcommand(
            Command::new("convert")
                .about("Convert a data file already present in the target path")
                .arg(Arg::new("file").required(true).help("Name of the data file")),
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .help("Also write the log to this file"),
        )
        .get_matches();

    let log_path = matches.get_one::<String>("log").map(PathBuf::from);
    if let Err(e) = init_logging(log_path.as_deref()) {
        eprintln!("Could not set up logging: {e}");
        return ExitCode::FAILURE;
    }

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        spdlog::error!("A configuration path is required");
        return ExitCode::FAILURE;
    };

    if let Some(("new", _)) = matches.subcommand() {
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        return match make_template_config(&config_path) {
            Ok(()) => {
                spdlog::info!("Done.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                spdlog::error!("Could not write template config: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let Some(config) = load_config(&config_path) else {
        return ExitCode::FAILURE;
    };

    if let Some(("convert", sub)) = matches.subcommand() {
        let Some(file) = sub.get_one::<String>("file") else {
            return ExitCode::FAILURE;
        };
        let converter = SchemaConverter::new(&config.timestamp_format);
        return match converter.convert(&config.target_path, file) {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                spdlog::error!("Conversion failed with error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        spdlog::warn!("Could not install the Ctrl-C handler: {e}");
    }

    let connector = FtpConnector::new(&config);
    let mut poll = PollLoop::new(&config, Box::new(connector), SystemClock, cancel);

    if let Some(("once", _)) = matches.subcommand() {
        return match poll.run_cycle() {
            Ok(report) if report.failed_conversions.is_empty() => {
                spdlog::info!("Done.");
                ExitCode::SUCCESS
            }
            Ok(report) => {
                for (name, e) in report.failed_conversions.iter() {
                    spdlog::error!("{name} was downloaded but not converted: {e}");
                }
                ExitCode::FAILURE
            }
            Err(e) => {
                spdlog::error!("Cycle failed with error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    spdlog::info!("Polling every {} s. Press Ctrl-C to stop.", config.poll_interval_secs);
    match poll.run() {
        Ok(()) => {
            spdlog::info!("Done.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            spdlog::error!("Downloader stopped with error: {e}");
            ExitCode::FAILURE
        }
    }
}
