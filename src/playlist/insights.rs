use crate::client::CatalogService;
use crate::error::CatalogError;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

const UNKNOWN_CONTRIBUTOR: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollaboratorStats {
    pub songs_added: usize,
}

/// Who added what to a shared playlist
#[derive(Debug, Clone, Serialize)]
pub struct CollaboratorInsights {
    pub playlist_name: String,
    pub description: Option<String>,
    pub collaborator_stats: BTreeMap<String, CollaboratorStats>,
}

/// Count tracks per contributing user, across every page of the playlist
pub fn collaborator_insights(
    catalog: &dyn CatalogService,
    playlist_id: &str,
) -> Result<CollaboratorInsights, CatalogError> {
    let details = catalog.playlist_details(playlist_id)?;

    let mut collaborator_stats: BTreeMap<String, CollaboratorStats> = BTreeMap::new();
    // removed or unavailable tracks come back as null
    for item in details.items.iter().filter(|item| item.track.is_some()) {
        let contributor = item
            .added_by
            .as_ref()
            .map(|user| user.id.as_str())
            .filter(|id| !id.is_empty())
            .unwrap_or(UNKNOWN_CONTRIBUTOR);
        collaborator_stats
            .entry(contributor.to_string())
            .or_default()
            .songs_added += 1;
    }

    info!(
        playlist_id,
        collaborators = collaborator_stats.len(),
        "analyzed playlist contributions"
    );

    Ok(CollaboratorInsights {
        playlist_name: details.name,
        description: details.description,
        collaborator_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockCatalogService;
    use crate::models::{AddedBy, PlaylistDetails, PlaylistItem, PlaylistTrack};

    fn item(added_by: Option<&str>, track: Option<&str>) -> PlaylistItem {
        PlaylistItem {
            added_by: added_by.map(|id| AddedBy { id: id.to_string() }),
            track: track.map(|name| PlaylistTrack {
                name: name.to_string(),
            }),
        }
    }

    #[test]
    fn counts_tracks_per_contributor() {
        let mut catalog = MockCatalogService::new();
        catalog
            .expect_playlist_details()
            .withf(|id| id == "p1")
            .returning(|_| {
                Ok(PlaylistDetails {
                    name: "Road Trip".into(),
                    description: Some("shared".into()),
                    items: vec![
                        item(Some("ana"), Some("A")),
                        item(Some("ben"), Some("B")),
                        item(Some("ana"), Some("C")),
                        item(None, Some("D")),
                        item(Some("ben"), None),
                    ],
                })
            });

        let insights = collaborator_insights(&catalog, "p1").unwrap();
        assert_eq!(insights.playlist_name, "Road Trip");
        assert_eq!(insights.collaborator_stats["ana"].songs_added, 2);
        assert_eq!(insights.collaborator_stats["ben"].songs_added, 1);
        assert_eq!(insights.collaborator_stats["unknown"].songs_added, 1);
    }

    #[test]
    fn catalog_errors_propagate() {
        let mut catalog = MockCatalogService::new();
        catalog
            .expect_playlist_details()
            .returning(|_| Err(CatalogError::Api {
                status: 404,
                message: "not found".into(),
            }));
        assert!(collaborator_insights(&catalog, "missing").is_err());
    }
}
