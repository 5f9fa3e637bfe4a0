use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use log::{LevelFilter, info};
use radiobar::app::{self, App};
use radiobar::catalog::Catalog;
use radiobar::config::Config;
use radiobar::errors::RadioError;
use radiobar::feed::FeedParser;
use radiobar::fetch::{Fetcher, HttpFetcher};
use radiobar::player::PlayerBackend;
use radiobar::resolver::StreamResolver;
use radiobar::session::Session;
use radiobar::station::{Category, Station};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "radiobar", version, about = "Korean radio, international streams and podcasts in the terminal")]
struct Cli {
    /// Config file (default: the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Station catalog TOML, overrides the config file
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// off, error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the station catalog
    List,
    /// Resolve the concrete stream URL of one station, or of all of them
    Resolve {
        /// Station name (case-insensitive)
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = Cli::parse();
    let config: Config = Config::load(cli.config.as_deref())?;

    let level_name: &str = cli.log_level.as_deref().unwrap_or(&config.log.level);
    let level: LevelFilter =
        level_name.parse().map_err(|_| anyhow!("invalid log level '{}'", level_name))?;

    match cli.command {
        None => init_file_logging(level, &config.log.file)?,
        Some(_) => init_console_logging(level),
    }

    let catalog_path: Option<&Path> = cli.catalog.as_deref().or(config.catalog.path.as_deref());
    let catalog: Catalog = Catalog::load(catalog_path)?;

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.http)?);
    let resolver = Arc::new(StreamResolver::new(fetcher.clone(), config.endpoints.clone()));
    let feeds = Arc::new(FeedParser::new(fetcher));

    match cli.command {
        Some(Command::List) => {
            list_stations(&catalog);
            Ok(())
        }
        Some(Command::Resolve { name }) => resolve_stations(&catalog, &resolver, &feeds, name).await,
        None => {
            let backend: Arc<dyn PlayerBackend> = player_backend(&config)?;
            let session = Session::new(resolver, feeds, backend, config.player.default_volume);
            let (handle, session_task) = session.spawn();
            let app = App::new(catalog.stations().to_vec(), handle);

            info!("Main: starting terminal UI with {} stations", catalog.len());
            tokio::task::spawn_blocking(move || app::start_ui(app)).await??;

            // The app dropped the last handle; the session stops on its own.
            session_task.await?;
            info!("Main: bye");
            Ok(())
        }
    }
}

// ===== logging

fn init_file_logging(level: LevelFilter, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(fern::log_file(path).with_context(|| format!("opening log file {}", path.display()))?)
        .apply()?;
    Ok(())
}

fn init_console_logging(level: LevelFilter) {
    env_logger::Builder::new().filter_level(level).parse_default_env().init();
}

// ===== player

#[cfg(unix)]
fn player_backend(config: &Config) -> Result<Arc<dyn PlayerBackend>> {
    Ok(Arc::new(radiobar::player::mpv::MpvBackend::new(config.player.mpv_binary.clone())))
}

#[cfg(not(unix))]
fn player_backend(_config: &Config) -> Result<Arc<dyn PlayerBackend>> {
    anyhow::bail!("playback drives mpv over a unix socket and is only available on unix")
}

// ===== subcommands

fn list_stations(catalog: &Catalog) {
    for category in Category::ALL {
        println!("{}", category);
        for station in catalog.in_category(category) {
            println!("  {:<28} {}", station.name(), station.url());
        }
    }
}

async fn resolve_station(
    resolver: &StreamResolver,
    feeds: &FeedParser,
    station: &Station,
) -> Result<String, RadioError> {
    match station.category() {
        Category::Podcast => {
            let episode = feeds.latest_episode(station.url()).await?;
            Ok(format!("{} ({})", episode.audio_url(), episode.display_title()))
        }
        Category::Korean | Category::International => {
            resolver.resolve(station).await.map(|url| url.to_string())
        }
    }
}

async fn resolve_stations(
    catalog: &Catalog,
    resolver: &StreamResolver,
    feeds: &FeedParser,
    name: Option<String>,
) -> Result<()> {
    let targets: Vec<&Arc<Station>> = match name {
        Some(name) => {
            let station = catalog.find(&name).ok_or_else(|| anyhow!("no station named '{}'", name))?;
            vec![station]
        }
        None => catalog.stations().iter().collect(),
    };

    let results = join_all(targets.iter().map(|s| resolve_station(resolver, feeds, s))).await;

    let mut failures: usize = 0;
    for (station, result) in targets.iter().zip(results) {
        match result {
            Ok(url) => println!("{:<28} {}", station.name(), url),
            Err(e) => {
                failures += 1;
                println!("{:<28} ERROR {}", station.name(), e);
            }
        }
    }

    if failures > 0 && targets.len() == 1 {
        return Err(anyhow!("could not resolve '{}'", targets[0].name()));
    }
    Ok(())
}
