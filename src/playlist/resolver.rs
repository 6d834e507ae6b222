use crate::client::CatalogService;
use crate::error::CatalogError;
use crate::models::{CatalogMatch, SongRecord};
use tracing::{debug, warn};

/// Looks up one song in the catalog, taking the first hit
pub struct CatalogResolver<'a> {
    catalog: &'a dyn CatalogService,
}

impl<'a> CatalogResolver<'a> {
    pub fn new(catalog: &'a dyn CatalogService) -> Self {
        Self { catalog }
    }

    /// Field-restricted query, not free text
    pub fn query_for(record: &SongRecord) -> String {
        format!("artist:{} track:{}", record.artist, record.title)
    }

    /// `NotFound` is a normal outcome; only transport or auth trouble is an `Err`
    pub fn resolve(&self, record: &SongRecord) -> Result<CatalogMatch, CatalogError> {
        let query = Self::query_for(record);
        let hits = self.catalog.search(&query, "track", 1)?;

        match hits.into_iter().next() {
            Some(hit) => {
                debug!(title = %record.title, artist = %record.artist, matched = %hit.name, uri = %hit.uri, "catalog match");
                Ok(CatalogMatch::Found {
                    catalog_uri: hit.uri,
                })
            }
            None => {
                warn!(title = %record.title, artist = %record.artist, "no catalog match");
                Ok(CatalogMatch::NotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockCatalogService;
    use crate::models::TrackHit;

    #[test]
    fn first_hit_wins() {
        let mut catalog = MockCatalogService::new();
        catalog
            .expect_search()
            .withf(|query, kind, limit| {
                query == "artist:Radiohead track:Creep" && kind == "track" && *limit == 1
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![
                    TrackHit {
                        uri: "spotify:track:first".into(),
                        name: "Creep".into(),
                    },
                    TrackHit {
                        uri: "spotify:track:second".into(),
                        name: "Creep (Acoustic)".into(),
                    },
                ])
            });

        let resolver = CatalogResolver::new(&catalog);
        let found = resolver
            .resolve(&SongRecord::new("Creep", "Radiohead"))
            .unwrap();
        assert_eq!(
            found,
            CatalogMatch::Found {
                catalog_uri: "spotify:track:first".into()
            }
        );
    }

    #[test]
    fn no_hits_is_not_found() {
        let mut catalog = MockCatalogService::new();
        catalog.expect_search().returning(|_, _, _| Ok(Vec::new()));

        let resolver = CatalogResolver::new(&catalog);
        let result = resolver.resolve(&SongRecord::new("Nope", "Nobody")).unwrap();
        assert_eq!(result, CatalogMatch::NotFound);
    }

    #[test]
    fn transport_errors_propagate() {
        let mut catalog = MockCatalogService::new();
        catalog
            .expect_search()
            .returning(|_, _, _| Err(CatalogError::Transport("connection reset".into())));

        let resolver = CatalogResolver::new(&catalog);
        assert!(matches!(
            resolver.resolve(&SongRecord::new("Creep", "Radiohead")),
            Err(CatalogError::Transport(_))
        ));
    }
}
