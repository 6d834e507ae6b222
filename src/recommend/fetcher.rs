use super::context::{RecommendationContext, UsageSnapshot};
use super::model::{Completion, ModelRequest, TextModel};
use crate::error::{ModelError, RecommendationError};
use crate::models::{SongList, SongRecord};
use rand::Rng;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Limits and call parameters for recommendation requests
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub model: String,
    pub temperature: f32,
    pub max_prompt_chars: usize,
    pub min_songs: usize,
    pub max_songs: usize,
    /// Total attempts per fetch, first call included
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_prompt_chars: 500,
            min_songs: 5,
            max_songs: 30,
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
        }
    }
}

/// Turns a free-text prompt into a validated song list via a generative model
pub struct RecommendationFetcher {
    model: Box<dyn TextModel>,
    context: Arc<RecommendationContext>,
    settings: FetchSettings,
}

impl RecommendationFetcher {
    pub fn new(
        model: Box<dyn TextModel>,
        context: Arc<RecommendationContext>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            model,
            context,
            settings,
        }
    }

    /// Fail-soft entry point: every validation or provider failure becomes an empty list
    pub fn fetch(&self, prompt: &str) -> SongList {
        match self.try_fetch(prompt) {
            Ok(songs) => songs,
            Err(e) => {
                error!(reason = %e, "recommendation request failed");
                SongList::empty()
            }
        }
    }

    pub fn try_fetch(&self, prompt: &str) -> Result<SongList, RecommendationError> {
        let prompt = normalize_prompt(prompt, self.settings.max_prompt_chars)?;
        info!(%prompt, "fetching recommendations");

        let request = ModelRequest {
            model: self.settings.model.clone(),
            system_instruction: system_instruction(self.settings.min_songs, self.settings.max_songs),
            user_prompt: user_prompt(&prompt, self.settings.min_songs, self.settings.max_songs),
            temperature: self.settings.temperature,
        };

        let completion = self.call_with_retry(&request)?;
        self.context.usage.record(completion.tokens_used);

        let entries = extract_json_array(&completion.text)?;
        let songs = validate_entries(entries, self.settings.min_songs, self.settings.max_songs)?;
        info!(count = songs.len(), "received recommendations");
        Ok(songs)
    }

    pub fn usage(&self) -> UsageSnapshot {
        self.context.usage.snapshot()
    }

    fn call_with_retry(&self, request: &ModelRequest) -> Result<Completion, ModelError> {
        let mut attempt = 1;
        loop {
            self.context.rate_gate.wait_turn();
            match self.model.complete(request) {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_transient() && attempt < self.settings.max_attempts => {
                    let delay = backoff_delay(self.settings.base_backoff, attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient model error, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Exponential backoff with up to 10% jitter
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    let jitter_ms = (exponential.as_millis() / 10) as u64;
    let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
    exponential + Duration::from_millis(jitter)
}

/// Collapse whitespace and enforce the length limit (in characters)
pub fn normalize_prompt(prompt: &str, max_chars: usize) -> Result<String, RecommendationError> {
    let normalized = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return Err(RecommendationError::InvalidPrompt);
    }
    let length = normalized.chars().count();
    if length > max_chars {
        return Err(RecommendationError::PromptTooLong {
            length,
            max: max_chars,
        });
    }
    Ok(normalized)
}

fn system_instruction(min: usize, max: usize) -> String {
    format!(
        "You are a music recommendation system. Respond only with a valid JSON array of \
         objects, each with non-empty string fields \"title\" and \"artist\". Return at least \
         {min} and at most {max} distinct songs."
    )
}

fn user_prompt(prompt: &str, min: usize, max: usize) -> String {
    format!(
        "Based on this request: \"{prompt}\"\n\
         Return a list of relevant songs in JSON format:\n\
         [{{\"title\": \"Song Name\", \"artist\": \"Artist Name\"}}, ...]\n\
         Provide between {min} and {max} songs that best match the request."
    )
}

/// Locate and parse the JSON array in a model reply that may be wrapped in prose
pub fn extract_json_array(text: &str) -> Result<Vec<Value>, RecommendationError> {
    let trimmed = text.trim();
    let candidate = if trimmed.starts_with('[') {
        trimmed
    } else {
        warn!("model reply is not a bare JSON array, searching for one");
        match (trimmed.find('['), trimmed.rfind(']')) {
            (Some(start), Some(end)) if end > start => &trimmed[start..=end],
            _ => {
                return Err(RecommendationError::MalformedResponse(
                    "no JSON array in reply".to_string(),
                ));
            }
        }
    };

    serde_json::from_str::<Vec<Value>>(candidate)
        .map_err(|e| RecommendationError::MalformedResponse(e.to_string()))
}

/// Apply the quality gate to parsed entries.
///
/// Entries without a non-empty title and artist are dropped with a warning;
/// count bounds are checked both before and after dropping.
pub fn validate_entries(
    entries: Vec<Value>,
    min: usize,
    max: usize,
) -> Result<SongList, RecommendationError> {
    if entries.is_empty() {
        return Err(RecommendationError::EmptyRecommendation);
    }
    check_quantity(entries.len(), min, max)?;

    let songs: Vec<SongRecord> = entries
        .iter()
        .filter_map(|entry| {
            let record = song_from_entry(entry);
            if record.is_none() {
                warn!(%entry, "dropping incomplete recommendation");
            }
            record
        })
        .collect();
    check_quantity(songs.len(), min, max)?;

    let mut seen = HashSet::new();
    for song in &songs {
        let key = song.normalized_key();
        if !seen.insert(key.clone()) {
            return Err(RecommendationError::DuplicateSongs(key));
        }
    }

    Ok(SongList::new(songs))
}

fn check_quantity(count: usize, min: usize, max: usize) -> Result<(), RecommendationError> {
    if count < min || count > max {
        return Err(RecommendationError::QuantityOutOfRange { count, min, max });
    }
    Ok(())
}

fn song_from_entry(entry: &Value) -> Option<SongRecord> {
    let field = |name: &str| {
        entry
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    Some(SongRecord::new(field("title")?, field("artist")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt_with_bounded_jitter() {
        let base = Duration::from_secs(1);

        let first = backoff_delay(base, 1);
        assert!(first >= Duration::from_secs(1), "first delay {first:?}");
        assert!(first <= Duration::from_millis(1100), "first delay {first:?}");

        let second = backoff_delay(base, 2);
        assert!(second >= Duration::from_secs(2), "second delay {second:?}");
        assert!(second <= Duration::from_millis(2200), "second delay {second:?}");
    }

    #[test]
    fn zero_base_means_no_wait() {
        assert_eq!(backoff_delay(Duration::ZERO, 3), Duration::ZERO);
    }
}
