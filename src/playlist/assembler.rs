use super::naming::PlaylistNaming;
use super::resolver::CatalogResolver;
use crate::chart::{ChartExtractor, ChartVariant};
use crate::client::CatalogService;
use crate::error::CatalogError;
use crate::models::{AssemblyStatus, CatalogMatch, PlaylistAssemblyResult, SongList, SongRecord};
use crate::recommend::RecommendationFetcher;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Most URIs the catalog accepts in one add-items call
pub const MAX_BATCH_SIZE: usize = 100;

/// Where the songs for a playlist come from
#[derive(Debug, Clone)]
pub enum Source {
    Chart(ChartVariant),
    Prompt(String),
    Songs(SongList),
}

impl Source {
    pub fn default_name(&self) -> String {
        match self {
            Source::Chart(variant) => PlaylistNaming::for_chart(*variant),
            Source::Prompt(_) | Source::Songs(_) => PlaylistNaming::CUSTOM_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    pub public: bool,
    pub cover_image: Option<PathBuf>,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            public: true,
            cover_image: None,
        }
    }
}

/// Upstream song providers: chart scraping and model recommendations
pub struct SongSources {
    extractor: ChartExtractor,
    recommender: Option<RecommendationFetcher>,
}

impl SongSources {
    pub fn new(extractor: ChartExtractor, recommender: Option<RecommendationFetcher>) -> Self {
        Self {
            extractor,
            recommender,
        }
    }

    pub fn recommender(&self) -> Option<&RecommendationFetcher> {
        self.recommender.as_ref()
    }

    /// Empty on any upstream failure; the cause is logged where it happened
    pub fn obtain(&self, source: &Source) -> SongList {
        match source {
            Source::Chart(variant) => {
                info!(variant = %variant, "obtaining songs from chart");
                self.extractor.extract(&variant.schema())
            }
            Source::Prompt(prompt) => match &self.recommender {
                Some(recommender) => recommender.fetch(prompt),
                None => {
                    error!("prompt-based playlists need a configured model client");
                    SongList::empty()
                }
            },
            Source::Songs(songs) => songs.clone(),
        }
    }
}

/// Per-record resolution results, split and kept in rank order
struct Resolution {
    uris: Vec<String>,
    failed: Vec<SongRecord>,
}

/// Builds a playlist from a song source: resolve every song, create the
/// playlist, add the matches in rank order.
pub struct PlaylistAssembler {
    catalog: Box<dyn CatalogService>,
    sources: SongSources,
    workers: usize,
}

impl PlaylistAssembler {
    pub fn new(catalog: Box<dyn CatalogService>, sources: SongSources) -> Self {
        Self {
            catalog,
            sources,
            workers: 1,
        }
    }

    /// Number of concurrent catalog lookups; 1 keeps them sequential
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn sources(&self) -> &SongSources {
        &self.sources
    }

    /// Never panics or errors: every failure is folded into the returned result
    pub fn assemble(&self, source: Source, options: &AssemblyOptions) -> PlaylistAssemblyResult {
        let songs = self.sources.obtain(&source);
        if songs.is_empty() {
            error!("no songs found");
            return PlaylistAssemblyResult::failure(None, "no songs found");
        }
        info!(count = songs.len(), "processing songs");

        let identity = match self.catalog.current_identity() {
            Ok(identity) => identity,
            Err(e) => {
                error!(error = %e, "failed to authenticate with catalog");
                return PlaylistAssemblyResult::failure(
                    None,
                    "failed to authenticate with the catalog service",
                );
            }
        };

        let name = options
            .name
            .clone()
            .unwrap_or_else(|| source.default_name());
        let description = options
            .description
            .clone()
            .unwrap_or_else(|| PlaylistNaming::description_for(&name));

        let playlist_id =
            match self
                .catalog
                .create_playlist(&identity.id, &name, &description, options.public)
            {
                Ok(id) => id,
                Err(e) => {
                    error!(error = %e, playlist_name = %name, "failed to create playlist");
                    return PlaylistAssemblyResult::failure(None, "failed to create playlist");
                }
            };

        if let Some(path) = &options.cover_image {
            self.upload_cover(&playlist_id, path);
        }

        let Resolution { uris, failed } = self.resolve_all(&songs);
        let total = songs.len();
        let matched_count = uris.len();
        let success_rate = matched_count as f32 / total as f32;

        if uris.is_empty() {
            // the empty playlist is left in place
            error!(%playlist_id, "no songs were found in the catalog");
            return PlaylistAssemblyResult {
                status: AssemblyStatus::Failure,
                playlist_id: Some(playlist_id),
                matched_count: 0,
                failed_records: failed,
                success_rate,
                message: "no songs were found in the catalog".to_string(),
            };
        }

        if let Err(e) = self.submit(&playlist_id, &uris) {
            error!(error = %e, %playlist_id, "failed to add tracks to playlist");
            return PlaylistAssemblyResult {
                status: AssemblyStatus::Failure,
                playlist_id: Some(playlist_id),
                matched_count,
                failed_records: failed,
                success_rate,
                message: format!("failed to add tracks to playlist: {e}"),
            };
        }

        let (status, message) = if failed.is_empty() {
            (
                AssemblyStatus::Success,
                format!("created playlist '{name}' with {matched_count} songs"),
            )
        } else {
            (
                AssemblyStatus::PartialFailure,
                format!(
                    "created playlist '{name}' with {matched_count} of {total} songs; {} not found",
                    failed.len()
                ),
            )
        };
        info!(%playlist_id, matched_count, failed = failed.len(), "{message}");

        PlaylistAssemblyResult {
            status,
            playlist_id: Some(playlist_id),
            matched_count,
            failed_records: failed,
            success_rate,
            message,
        }
    }

    fn resolve_all(&self, songs: &SongList) -> Resolution {
        let resolver = CatalogResolver::new(self.catalog.as_ref());
        let lookup = |(rank, record): (usize, &SongRecord)| (rank, resolve_one(&resolver, record));

        let mut outcomes: Vec<(usize, Option<String>)> = if self.workers > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
            {
                Ok(pool) => pool.install(|| {
                    songs
                        .as_slice()
                        .par_iter()
                        .enumerate()
                        .map(lookup)
                        .collect()
                }),
                Err(e) => {
                    warn!(error = %e, "could not start lookup pool, resolving sequentially");
                    songs.iter().enumerate().map(lookup).collect()
                }
            }
        } else {
            songs.iter().enumerate().map(lookup).collect()
        };
        outcomes.sort_by_key(|(rank, _)| *rank);

        let mut resolution = Resolution {
            uris: Vec::with_capacity(songs.len()),
            failed: Vec::new(),
        };
        for (rank, uri) in outcomes {
            match uri {
                Some(uri) => resolution.uris.push(uri),
                None => resolution.failed.push(songs.as_slice()[rank].clone()),
            }
        }
        resolution
    }

    /// Add URIs in rank order, at most `MAX_BATCH_SIZE` per call
    fn submit(&self, playlist_id: &str, uris: &[String]) -> Result<(), CatalogError> {
        for batch in uris.chunks(MAX_BATCH_SIZE) {
            self.catalog.add_items(playlist_id, batch)?;
            info!(playlist_id, count = batch.len(), "added batch of tracks");
        }
        Ok(())
    }

    /// Best-effort: failures are logged and never affect the result
    fn upload_cover(&self, playlist_id: &str, path: &Path) {
        let uploaded = encode_cover(path)
            .and_then(|data| self.catalog.upload_cover(playlist_id, &data));
        if let Err(e) = uploaded {
            warn!(playlist_id, path = %path.display(), error = %e, "cover image upload failed");
        }
    }
}

/// Base64 body for the cover upload endpoint
fn encode_cover(path: &Path) -> Result<String, CatalogError> {
    let bytes = std::fs::read(path)?;
    Ok(STANDARD.encode(bytes))
}

fn resolve_one(resolver: &CatalogResolver<'_>, record: &SongRecord) -> Option<String> {
    match resolver.resolve(record) {
        Ok(CatalogMatch::Found { catalog_uri }) => Some(catalog_uri),
        Ok(CatalogMatch::NotFound) => None,
        Err(e) => {
            error!(title = %record.title, artist = %record.artist, error = %e, "catalog lookup failed");
            None
        }
    }
}
