use anyhow::{Result, anyhow};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TOKEN_BUDGET: u64 = 100_000;
const DEFAULT_MIN_INTERVAL_MS: u64 = 1_000;

/// Credentials for the catalog service.
///
/// A refresh-token triple is preferred; a bare access token works until it expires.
#[derive(Debug, Clone)]
pub enum CatalogCredentials {
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    StaticToken(String),
}

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub catalog: Option<CatalogCredentials>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub token_budget: u64,
    pub min_request_interval: Duration,
    pub catalog_workers: usize,
}

impl Config {
    pub fn catalog_credentials(&self) -> Result<&CatalogCredentials> {
        self.catalog.as_ref().ok_or_else(|| {
            anyhow!(
                "catalog credentials missing: set SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET and \
                 SPOTIFY_REFRESH_TOKEN (or SPOTIFY_ACCESS_TOKEN)"
            )
        })
    }

    pub fn openai_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))
    }
}

/// Load configuration from `.env` and environment
pub fn load_config() -> Result<Config> {
    // Load `.env` file if present
    dotenv::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let var = |key: &str| {
        let value = lookup(key).filter(|v| !v.trim().is_empty());
        if value.is_some() {
            info!("{key} is set");
        } else {
            warn!("{key} is missing");
        }
        value
    };

    let catalog = match (
        var("SPOTIFY_CLIENT_ID"),
        var("SPOTIFY_CLIENT_SECRET"),
        var("SPOTIFY_REFRESH_TOKEN"),
    ) {
        (Some(client_id), Some(client_secret), Some(refresh_token)) => {
            Some(CatalogCredentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            })
        }
        _ => lookup("SPOTIFY_ACCESS_TOKEN")
            .filter(|v| !v.trim().is_empty())
            .map(CatalogCredentials::StaticToken),
    };

    let openai_api_key = var("OPENAI_API_KEY");
    let openai_model = lookup("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let token_budget = parse_or(&lookup, "RECOMMENDATION_TOKEN_BUDGET", DEFAULT_TOKEN_BUDGET)?;
    let interval_ms = parse_or(
        &lookup,
        "RECOMMENDATION_MIN_INTERVAL_MS",
        DEFAULT_MIN_INTERVAL_MS,
    )?;
    let catalog_workers = parse_or(&lookup, "CATALOG_WORKERS", 1usize)?.max(1);

    Ok(Config {
        catalog,
        openai_api_key,
        openai_model,
        token_budget,
        min_request_interval: Duration::from_millis(interval_ms),
        catalog_workers,
    })
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {key}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = from_lookup(lookup_from(&[])).unwrap();
        assert!(config.catalog.is_none());
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.token_budget, 100_000);
        assert_eq!(config.min_request_interval, Duration::from_secs(1));
        assert_eq!(config.catalog_workers, 1);
        assert!(config.catalog_credentials().is_err());
    }

    #[test]
    fn refresh_credentials_win_over_static_token() {
        let config = from_lookup(lookup_from(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
            ("SPOTIFY_REFRESH_TOKEN", "refresh"),
            ("SPOTIFY_ACCESS_TOKEN", "static"),
        ]))
        .unwrap();
        assert!(matches!(
            config.catalog,
            Some(CatalogCredentials::RefreshToken { .. })
        ));
    }

    #[test]
    fn static_token_used_without_refresh_credentials() {
        let config = from_lookup(lookup_from(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_ACCESS_TOKEN", "static"),
        ]))
        .unwrap();
        match config.catalog {
            Some(CatalogCredentials::StaticToken(token)) => assert_eq!(token, "static"),
            other => panic!("unexpected credentials: {other:?}"),
        }
    }

    #[test]
    fn numeric_overrides_are_parsed() {
        let config = from_lookup(lookup_from(&[
            ("RECOMMENDATION_TOKEN_BUDGET", "5000"),
            ("RECOMMENDATION_MIN_INTERVAL_MS", "250"),
            ("CATALOG_WORKERS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.token_budget, 5000);
        assert_eq!(config.min_request_interval, Duration::from_millis(250));
        assert_eq!(config.catalog_workers, 1);
    }

    #[test]
    fn invalid_number_is_an_error() {
        let result = from_lookup(lookup_from(&[("CATALOG_WORKERS", "many")]));
        assert!(result.is_err());
    }
}
