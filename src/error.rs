use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("unsupported chart variant: {0}")]
    UnsupportedVariant(String),

    #[error("chart schema for {0} has an empty field")]
    InvalidSchema(String),

    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("chart source unavailable: {0}")]
    SourceUnavailable(String),
}

#[derive(Error, Debug)]
pub enum RecommendationError {
    #[error("prompt is empty")]
    InvalidPrompt,

    #[error("prompt is {length} characters, limit is {max}")]
    PromptTooLong { length: usize, max: usize },

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("model returned no songs")]
    EmptyRecommendation,

    #[error("model returned {count} songs, expected {min}..={max}")]
    QuantityOutOfRange { count: usize, min: usize, max: usize },

    #[error("model returned duplicate song: {0}")]
    DuplicateSongs(String),

    #[error("model provider error: {0}")]
    Provider(#[from] ModelError),
}

/// Failure reported by the generative model collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Throttling, server-side or connection trouble: worth retrying
    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("provider error: {0}")]
    Fatal(String),
}

impl ModelError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelError::Transient(_))
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("catalog API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode catalog response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ureq::Error> for CatalogError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(401, response) => {
                CatalogError::Authentication(response.into_string().unwrap_or_default())
            }
            ureq::Error::Status(status, response) => CatalogError::Api {
                status,
                message: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(transport) => CatalogError::Transport(transport.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: u16, body: &str) -> ureq::Error {
        let response = ureq::Response::new(status, "status", body).unwrap();
        ureq::Error::Status(status, response)
    }

    #[test]
    fn unauthorized_maps_to_authentication() {
        match CatalogError::from(status_error(401, "The access token expired")) {
            CatalogError::Authentication(message) => {
                assert_eq!(message, "The access token expired")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn other_statuses_map_to_api_errors() {
        for status in [403, 429, 500] {
            match CatalogError::from(status_error(status, "nope")) {
                CatalogError::Api {
                    status: mapped,
                    message,
                } => {
                    assert_eq!(mapped, status);
                    assert_eq!(message, "nope");
                }
                other => panic!("unexpected error for {status}: {other:?}"),
            }
        }
    }

    #[test]
    fn model_errors_know_when_to_retry() {
        assert!(ModelError::Transient("429".into()).is_transient());
        assert!(!ModelError::Fatal("401".into()).is_transient());
    }
}
