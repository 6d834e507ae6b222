use crate::config::CatalogCredentials;
use crate::error::CatalogError;
use crate::models::TokenResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Mutex;
use tracing::{debug, info};
use ureq::Agent;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Tokens this close to expiry are refreshed early
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

/// Supplies bearer tokens for catalog calls, refreshing them when expired.
///
/// Refresh is single-flight: the cache lock is held across the refresh request,
/// so concurrent callers wait for and then reuse the one new token.
pub struct SpotifyAuth {
    agent: Agent,
    credentials: CatalogCredentials,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl SpotifyAuth {
    pub fn new(agent: Agent, credentials: CatalogCredentials) -> Self {
        SpotifyAuth {
            agent,
            credentials,
            token_url: TOKEN_URL.to_string(),
            cached: Mutex::new(None),
        }
    }

    pub fn bearer(&self) -> Result<String, CatalogError> {
        let (client_id, client_secret, refresh_token) = match &self.credentials {
            CatalogCredentials::StaticToken(token) => return Ok(token.clone()),
            CatalogCredentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => (client_id, client_secret, refresh_token),
        };

        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired(Utc::now())) {
            debug!("access token still valid");
            return Ok(token.value.clone());
        }

        info!("access token missing or expired, refreshing");
        let fresh = self.refresh(client_id, client_secret, refresh_token)?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        info!("access token refreshed");
        Ok(value)
    }

    /// Drop the cached token so the next call refreshes. Used after a 401.
    pub fn invalidate(&self) {
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cached = None;
    }

    #[cfg(test)]
    pub(crate) fn seed_token(&self, value: &str, ttl_secs: i64) {
        *self.cached.lock().unwrap() = Some(CachedToken {
            value: value.to_string(),
            expires_at: Utc::now() + TimeDelta::seconds(ttl_secs),
        });
    }

    #[cfg(test)]
    pub(crate) fn has_cached_token(&self) -> bool {
        self.cached.lock().unwrap().is_some()
    }

    fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<CachedToken, CatalogError> {
        let basic = STANDARD.encode(format!("{client_id}:{client_secret}"));
        let response = self
            .agent
            .post(&self.token_url)
            .set("Authorization", &format!("Basic {basic}"))
            .send_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .map_err(|e| CatalogError::Authentication(format!("token refresh failed: {e}")))?;

        let token: TokenResponse = response
            .into_json()
            .map_err(|e| CatalogError::Decode(format!("token response: {e}")))?;

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + TimeDelta::seconds(token.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_expires_inside_the_margin() {
        let now = Utc::now();
        let token = CachedToken {
            value: "abc".into(),
            expires_at: now + TimeDelta::seconds(30),
        };
        assert!(token.is_expired(now));

        let token = CachedToken {
            expires_at: now + TimeDelta::seconds(3600),
            ..token
        };
        assert!(!token.is_expired(now));
    }

    #[test]
    fn static_token_is_returned_without_network() {
        let auth = SpotifyAuth::new(
            ureq::Agent::new(),
            CatalogCredentials::StaticToken("static-token".into()),
        );
        assert_eq!(auth.bearer().unwrap(), "static-token");
    }

    #[test]
    fn valid_cached_token_is_reused() {
        let auth = SpotifyAuth::new(
            ureq::Agent::new(),
            CatalogCredentials::RefreshToken {
                client_id: "id".into(),
                client_secret: "secret".into(),
                refresh_token: "refresh".into(),
            },
        );
        *auth.cached.lock().unwrap() = Some(CachedToken {
            value: "cached".into(),
            expires_at: Utc::now() + TimeDelta::seconds(3600),
        });
        assert_eq!(auth.bearer().unwrap(), "cached");

        auth.invalidate();
        assert!(auth.cached.lock().unwrap().is_none());
    }
}
