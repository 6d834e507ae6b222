use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

mod auth;
mod chart;
mod client;
mod config;
mod error;
mod logging;
mod models;
mod playlist;
mod recommend;


use crate::chart::{ChartExtractor, ChartVariant, HttpPageRenderer};
use crate::client::{CatalogService, SpotifyClient};
use crate::config::{Config, load_config};
use crate::models::{AssemblyStatus, SongList};
use crate::playlist::{AssemblyOptions, PlaylistAssembler, SongSources, Source};
use crate::recommend::{FetchSettings, OpenAiClient, RecommendationContext, RecommendationFetcher};

#[derive(Parser)]
#[command(name = "chart-playlists")]
#[command(about = "Build Spotify playlists from music charts or free-text prompts")]
#[command(version)]
struct Args {
    /// Quiet mode - only warnings and errors are logged
    #[arg(short = 'q', long = "quiet", global = true)]
    quiet: bool,

    /// Verbose mode - include debug output
    #[arg(short = 'v', long = "verbose", global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a playlist from a supported chart (see `charts`)
    Chart {
        variant: String,
        #[command(flatten)]
        assembly: AssemblyArgs,
    },
    /// Build a playlist from model recommendations for a free-text prompt
    Prompt {
        text: String,
        #[command(flatten)]
        assembly: AssemblyArgs,
    },
    /// Build a playlist from a JSON song list (as printed by `--dry-run`)
    Songs {
        file: PathBuf,
        #[command(flatten)]
        assembly: AssemblyArgs,
    },
    /// List the supported chart variants
    Charts,
    /// Show the catalog account the credentials belong to
    Whoami,
    /// Count contributions per user in a shared playlist
    Insights { playlist_id: String },
}

#[derive(clap::Args)]
struct AssemblyArgs {
    /// Playlist name; derived from the source when omitted
    #[arg(long)]
    name: Option<String>,

    /// Playlist description; derived from the name when omitted
    #[arg(long)]
    description: Option<String>,

    /// Create the playlist as private
    #[arg(long)]
    private: bool,

    /// JPEG cover image to upload after creation
    #[arg(long, value_name = "PATH")]
    cover: Option<PathBuf>,

    /// Print the song list as JSON instead of creating a playlist
    #[arg(long = "dry-run")]
    dry_run: bool,
}

impl AssemblyArgs {
    fn options(&self) -> AssemblyOptions {
        AssemblyOptions {
            name: self.name.clone(),
            description: self.description.clone(),
            public: !self.private,
            cover_image: self.cover.clone(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.quiet, args.verbose);

    let config = load_config()?;

    match args.command {
        Command::Chart { variant, assembly } => {
            // an unknown key is fatal before any network activity
            let (variant, _) = chart::lookup(&variant)?;
            assemble(&config, Source::Chart(variant), &assembly)
        }
        Command::Prompt { text, assembly } => {
            config.openai_key()?;
            assemble(&config, Source::Prompt(text), &assembly)
        }
        Command::Songs { file, assembly } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read song list {}", file.display()))?;
            let songs = SongList::from_json(&text)
                .with_context(|| format!("invalid song list in {}", file.display()))?;
            assemble(&config, Source::Songs(songs), &assembly)
        }
        Command::Charts => {
            for variant in ChartVariant::ALL {
                println!("{:<28} {}", variant.key(), variant.schema().source_url);
            }
            Ok(())
        }
        Command::Whoami => {
            let catalog = SpotifyClient::new(config.catalog_credentials()?.clone());
            let identity = catalog.current_identity()?;
            println!("{}", serde_json::to_string_pretty(&identity)?);
            Ok(())
        }
        Command::Insights { playlist_id } => {
            let catalog = SpotifyClient::new(config.catalog_credentials()?.clone());
            let insights = playlist::collaborator_insights(&catalog, &playlist_id)?;
            println!("{}", serde_json::to_string_pretty(&insights)?);
            Ok(())
        }
    }
}

fn song_sources(config: &Config) -> SongSources {
    let extractor = ChartExtractor::new(Box::new(HttpPageRenderer::default()));

    let recommender = config.openai_api_key.as_ref().map(|key| {
        let context = Arc::new(RecommendationContext::new(
            config.min_request_interval,
            config.token_budget,
        ));
        let settings = FetchSettings {
            model: config.openai_model.clone(),
            ..FetchSettings::default()
        };
        RecommendationFetcher::new(Box::new(OpenAiClient::new(key.clone())), context, settings)
    });

    SongSources::new(extractor, recommender)
}

fn assemble(config: &Config, source: Source, assembly: &AssemblyArgs) -> Result<()> {
    let sources = song_sources(config);
    let prompted = matches!(source, Source::Prompt(_));

    if assembly.dry_run {
        let songs = sources.obtain(&source);
        if prompted {
            log_usage(&sources);
        }
        if songs.is_empty() {
            return Err(anyhow!("no songs found"));
        }
        println!("{}", songs.to_json()?);
        return Ok(());
    }

    let catalog = SpotifyClient::new(config.catalog_credentials()?.clone());
    let assembler =
        PlaylistAssembler::new(Box::new(catalog), sources).with_workers(config.catalog_workers);

    let result = assembler.assemble(source, &assembly.options());
    if prompted {
        log_usage(assembler.sources());
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    match result.status {
        AssemblyStatus::Failure => Err(anyhow!(result.message)),
        AssemblyStatus::PartialFailure => {
            warn!(
                failed = result.failed_records.len(),
                "some songs could not be matched"
            );
            Ok(())
        }
        AssemblyStatus::Success => Ok(()),
    }
}

fn log_usage(sources: &SongSources) {
    if let Some(recommender) = sources.recommender() {
        let usage = recommender.usage();
        info!(
            used = usage.used,
            limit = usage.limit,
            percent = usage.percent,
            "recommendation usage"
        );
    }
}
