use serde::{Deserialize, Serialize};

/// Placeholder title for a chart entry whose title node is missing
pub const UNKNOWN_TITLE: &str = "Unknown Title";
/// Placeholder artist for a chart entry whose artist node is missing
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// A single (title, artist) pair taken from a chart or a recommendation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SongRecord {
    pub title: String,
    pub artist: String,
}

impl SongRecord {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        SongRecord {
            title: title.into(),
            artist: artist.into(),
        }
    }

    /// Lower-cased "title|artist" key used for duplicate detection
    pub fn normalized_key(&self) -> String {
        format!(
            "{}|{}",
            self.title.trim().to_lowercase(),
            self.artist.trim().to_lowercase()
        )
    }
}

/// Ordered collection of songs. Position is rank: index 0 is rank 1.
///
/// Duplicates are kept as-is; callers that need uniqueness filter explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongList {
    songs: Vec<SongRecord>,
}

impl SongList {
    pub fn new(songs: Vec<SongRecord>) -> Self {
        SongList { songs }
    }

    pub fn empty() -> Self {
        SongList::default()
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SongRecord> {
        self.songs.iter()
    }

    pub fn as_slice(&self) -> &[SongRecord] {
        &self.songs
    }

    pub fn into_vec(self) -> Vec<SongRecord> {
        self.songs
    }

    /// Serialize to the JSON exchange format: an array of `{title, artist}`
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl From<Vec<SongRecord>> for SongList {
    fn from(songs: Vec<SongRecord>) -> Self {
        SongList::new(songs)
    }
}

impl<'a> IntoIterator for &'a SongList {
    type Item = &'a SongRecord;
    type IntoIter = std::slice::Iter<'a, SongRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.songs.iter()
    }
}

/// Outcome of looking up one song in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogMatch {
    Found { catalog_uri: String },
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStatus {
    Success,
    PartialFailure,
    Failure,
}

/// Structured outcome of one playlist assembly run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistAssemblyResult {
    pub status: AssemblyStatus,
    pub playlist_id: Option<String>,
    pub matched_count: usize,
    pub failed_records: Vec<SongRecord>,
    pub success_rate: f32,
    pub message: String,
}

impl PlaylistAssemblyResult {
    /// A failure that happened before any song could be matched
    pub fn failure(playlist_id: Option<String>, message: impl Into<String>) -> Self {
        PlaylistAssemblyResult {
            status: AssemblyStatus::Failure,
            playlist_id,
            matched_count: 0,
            failed_records: Vec::new(),
            success_rate: 0.0,
            message: message.into(),
        }
    }
}

/// Account identity returned by the catalog service (`GET /me`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: Option<String>,
}

/// Response structure for the create-playlist call
#[derive(Debug, Deserialize)]
pub struct CreatedPlaylist {
    pub id: String,
    #[allow(dead_code)]
    pub name: Option<String>,
}

/// Response structure for the track search call
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
pub struct TrackPage {
    pub items: Vec<TrackHit>,
}

/// One search hit: only the fields the resolver needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackHit {
    pub uri: String,
    pub name: String,
}

/// Response structure for the playlist detail call
#[derive(Debug, Deserialize)]
pub struct PlaylistResponse {
    pub name: String,
    pub description: Option<String>,
    pub tracks: PlaylistItemsPage,
}

/// One page of playlist items; `next` is the absolute URL of the following page
#[derive(Debug, Deserialize)]
pub struct PlaylistItemsPage {
    pub items: Vec<PlaylistItem>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    pub added_by: Option<AddedBy>,
    pub track: Option<PlaylistTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddedBy {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct PlaylistTrack {
    pub name: String,
}

/// Flattened view of a playlist with every page of items collected
#[derive(Debug, Clone)]
pub struct PlaylistDetails {
    pub name: String,
    pub description: Option<String>,
    pub items: Vec<PlaylistItem>,
}

/// Response structure for the refresh-token grant
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}
