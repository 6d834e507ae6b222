use crate::auth::SpotifyAuth;
use crate::config::CatalogCredentials;
use crate::error::CatalogError;
use crate::models::{
    CreatedPlaylist, Identity, PlaylistDetails, PlaylistItemsPage, PlaylistResponse,
    SearchResponse, TrackHit,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};
use ureq::{Agent, Request};
use urlencoding::encode;

const API_BASE: &str = "https://api.spotify.com/v1";

/// Operations the playlist pipeline needs from the catalog/playlist service
#[cfg_attr(test, mockall::automock)]
pub trait CatalogService: Send + Sync {
    fn current_identity(&self) -> Result<Identity, CatalogError>;

    fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<String, CatalogError>;

    /// Append one batch of item URIs. Callers keep batches within the service limit.
    fn add_items(&self, playlist_id: &str, uris: &[String]) -> Result<(), CatalogError>;

    fn search(&self, query: &str, kind: &str, limit: u32) -> Result<Vec<TrackHit>, CatalogError>;

    fn upload_cover(&self, playlist_id: &str, base64_jpeg: &str) -> Result<(), CatalogError>;

    fn playlist_details(&self, playlist_id: &str) -> Result<PlaylistDetails, CatalogError>;
}

/// Spotify Web API client. Every call fetches a bearer token first, which
/// refreshes it transparently when expired.
pub struct SpotifyClient {
    agent: Agent,
    base_url: String,
    auth: SpotifyAuth,
}

impl SpotifyClient {
    pub fn new(credentials: CatalogCredentials) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        let auth = SpotifyAuth::new(agent.clone(), credentials);

        SpotifyClient {
            agent,
            base_url: API_BASE.to_string(),
            auth,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: Request) -> Result<Request, CatalogError> {
        let token = self.auth.bearer()?;
        Ok(request.set("Authorization", &format!("Bearer {token}")))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let mut request = self.authorized(self.agent.get(url))?;
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(|e| self.map_error(e))?;
        response
            .into_json()
            .map_err(|e| CatalogError::Decode(format!("GET {url}: {e}")))
    }

    fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<T, CatalogError> {
        let request = self.authorized(self.agent.post(url))?;
        let response = request.send_json(body).map_err(|e| self.map_error(e))?;
        response
            .into_json()
            .map_err(|e| CatalogError::Decode(format!("POST {url}: {e}")))
    }

    /// A 401 means the cached token was rejected; drop it so the next call refreshes
    fn map_error(&self, err: ureq::Error) -> CatalogError {
        let err = CatalogError::from(err);
        if matches!(err, CatalogError::Authentication(_)) {
            warn!("catalog rejected access token");
            self.auth.invalidate();
        }
        err
    }
}

impl CatalogService for SpotifyClient {
    fn current_identity(&self) -> Result<Identity, CatalogError> {
        let identity: Identity = self.get_json(&self.url("/me"), &[])?;
        info!(
            user_id = %identity.id,
            display_name = identity.display_name.as_deref().unwrap_or(""),
            "authenticated with catalog"
        );
        Ok(identity)
    }

    fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<String, CatalogError> {
        let url = self.url(&format!("/users/{}/playlists", encode(owner_id)));
        let created: CreatedPlaylist = self.post_json(
            &url,
            json!({
                "name": name,
                "description": description,
                "public": public,
            }),
        )?;
        info!(playlist_id = %created.id, playlist_name = name, "created playlist");
        Ok(created.id)
    }

    fn add_items(&self, playlist_id: &str, uris: &[String]) -> Result<(), CatalogError> {
        let url = self.url(&format!("/playlists/{}/tracks", encode(playlist_id)));
        // response carries only a snapshot id
        let _: serde_json::Value = self.post_json(&url, json!({ "uris": uris }))?;
        debug!(playlist_id, count = uris.len(), "added items");
        Ok(())
    }

    fn search(&self, query: &str, kind: &str, limit: u32) -> Result<Vec<TrackHit>, CatalogError> {
        let limit = limit.to_string();
        let response: SearchResponse = self.get_json(
            &self.url("/search"),
            &[("q", query), ("type", kind), ("limit", limit.as_str())],
        )?;
        Ok(response.tracks.items)
    }

    fn upload_cover(&self, playlist_id: &str, base64_jpeg: &str) -> Result<(), CatalogError> {
        let url = self.url(&format!("/playlists/{}/images", encode(playlist_id)));
        self.authorized(self.agent.put(&url))?
            .set("Content-Type", "image/jpeg")
            .send_string(base64_jpeg)
            .map_err(|e| self.map_error(e))?;
        info!(playlist_id, "uploaded cover image");
        Ok(())
    }

    fn playlist_details(&self, playlist_id: &str) -> Result<PlaylistDetails, CatalogError> {
        let url = self.url(&format!("/playlists/{}", encode(playlist_id)));
        let playlist: PlaylistResponse = self.get_json(&url, &[])?;

        let mut items = playlist.tracks.items;
        let mut next_page = playlist.tracks.next;
        while let Some(page_url) = next_page {
            debug!(url = %page_url, "fetching next page of playlist items");
            let page: PlaylistItemsPage = self.get_json(&page_url, &[])?;
            items.extend(page.items);
            next_page = page.next;
        }

        Ok(PlaylistDetails {
            name: playlist.name,
            description: playlist.description,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_decodes_hits() {
        let raw = r#"{"tracks": {"href": "x", "items": [
            {"uri": "spotify:track:1", "name": "Creep", "popularity": 80}
        ], "total": 1}}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.tracks.items,
            vec![TrackHit {
                uri: "spotify:track:1".into(),
                name: "Creep".into()
            }]
        );
    }

    #[test]
    fn playlist_response_decodes_pages() {
        let raw = r#"{
            "name": "Road Trip",
            "description": null,
            "tracks": {
                "items": [
                    {"added_by": {"id": "ana"}, "track": {"name": "Song A"}},
                    {"added_by": null, "track": null}
                ],
                "next": "https://api.spotify.com/v1/playlists/p1/tracks?offset=100"
            }
        }"#;
        let parsed: PlaylistResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.name, "Road Trip");
        assert_eq!(parsed.tracks.items.len(), 2);
        assert!(parsed.tracks.next.is_some());
    }

    #[test]
    fn urls_join_cleanly() {
        let client = SpotifyClient::new(CatalogCredentials::StaticToken("t".into()));
        assert_eq!(client.url("/me"), "https://api.spotify.com/v1/me");
    }

    fn refreshing_client() -> SpotifyClient {
        SpotifyClient::new(CatalogCredentials::RefreshToken {
            client_id: "id".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh".into(),
        })
    }

    fn status_error(status: u16) -> ureq::Error {
        let response = ureq::Response::new(status, "status", "rejected").unwrap();
        ureq::Error::Status(status, response)
    }

    #[test]
    fn unauthorized_drops_cached_token() {
        let client = refreshing_client();
        client.auth.seed_token("stale", 3600);

        let err = client.map_error(status_error(401));
        assert!(matches!(err, CatalogError::Authentication(_)));
        assert!(!client.auth.has_cached_token());
    }

    #[test]
    fn other_failures_keep_cached_token() {
        let client = refreshing_client();
        client.auth.seed_token("fresh", 3600);

        let err = client.map_error(status_error(500));
        assert!(matches!(err, CatalogError::Api { status: 500, .. }));
        assert!(client.auth.has_cached_token());
    }
}
