//! rltail - serve compressed, periodically refreshed tails of a log directory.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use log::{info, warn};
use rltail::config::{SettingsFile, SettingsOverrides};
use rltail::{ConfigGate, DiskTailReader, FileCatalog, LogService, Poller, Settings};
use std::path::PathBuf;
use std::sync::Arc;

fn cli() -> Command {
    Command::new("rltail")
        .version(rltail::VERSION)
        .about("Serve the tails of every text log under a directory over HTTP")
        .long_about(
            "rltail keeps the last lines of each text file under a directory in memory, \
             compressed, refreshes them when the files change, and serves them together \
             with on-demand substring filters over HTTP.",
        )
        .arg(
            Arg::new("path")
                .long("path")
                .help("Directory containing the log files")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("lines")
                .long("lines")
                .help("Number of tail lines kept per file [default: 200]")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("maxlines")
                .long("maxlines")
                .help("Maximum number of lines examined by one filter [default: 100000]")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("sleep")
                .long("sleep")
                .help("Seconds between refresh cycles [default: 15]")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .help("Host name to bind [default: localhost]"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .help("Port to bind; 8081-8090 are tried if it is taken [default: 8080]")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("TOML settings file (defaults to <config dir>/rltail/config.toml)")
                .value_parser(value_parser!(PathBuf)),
        )
}

fn overrides(matches: &ArgMatches) -> SettingsOverrides {
    SettingsOverrides {
        root_path: matches.get_one::<PathBuf>("path").cloned(),
        tail_depth: matches.get_one::<usize>("lines").copied(),
        max_filter_lines: matches.get_one::<usize>("maxlines").copied(),
        poll_interval_secs: matches.get_one::<u64>("sleep").copied(),
        host: matches.get_one::<String>("host").cloned(),
        port: matches.get_one::<u16>("port").copied(),
    }
}

fn settings_file(matches: &ArgMatches) -> Result<SettingsFile> {
    if let Some(path) = matches.get_one::<PathBuf>("config") {
        return SettingsFile::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()));
    }
    match SettingsFile::default_location() {
        Some(path) if path.is_file() => SettingsFile::load(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        _ => Ok(SettingsFile::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let settings = Settings::resolve(settings_file(&matches)?, overrides(&matches))?;
    let catalog_config = settings.catalog.clone();

    let catalog = FileCatalog::discover(&catalog_config.root_path)
        .context("Unable to build the file catalog")?;

    let reader = Arc::new(DiskTailReader::new());
    let store = Arc::new(
        catalog
            .populate(reader.as_ref(), catalog_config.tail_depth)
            .await,
    );
    info!("Initial snapshots ready, tail depth {}", catalog_config.tail_depth);
    let gate = Arc::new(ConfigGate::new(catalog_config));

    let poller = Poller::new(Arc::clone(&store), Arc::clone(&gate), reader).spawn();
    let service = Arc::new(LogService::new(store, gate));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutting down");
    };
    let served = rltail::http::serve(service, &settings.server, shutdown).await;

    poller.shutdown().await;
    served.context("HTTP server stopped")?;
    Ok(())
}
