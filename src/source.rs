use crate::error::SourceError;
use crate::lang::LanguageCode;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// One entry of the suggestion menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub label: String,
    pub base_uri: String,
    pub uri_anchor: String,
}

/// Item as the autocomplete endpoint returns it.
#[derive(Debug, Deserialize)]
struct RawSuggestion {
    pref_label: String,
    base_uri: String,
    #[serde(default)]
    uri_anchor: String,
}

impl From<RawSuggestion> for Suggestion {
    fn from(raw: RawSuggestion) -> Self {
        Self {
            label: raw.pref_label,
            base_uri: raw.base_uri,
            uri_anchor: raw.uri_anchor,
        }
    }
}

/// Decodes an autocomplete response body into menu entries.
pub fn parse_suggestions(body: &[u8]) -> Result<Vec<Suggestion>, SourceError> {
    let raw: Vec<RawSuggestion> = serde_json::from_slice(body)?;
    Ok(raw.into_iter().map(Suggestion::from).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRequest {
    /// Fully built endpoint URL, query included.
    pub url: Url,
    pub term: String,
    pub lang: Option<LanguageCode>,
}

/// Supplies suggestions for the text typed so far.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn fetch(&self, request: &SuggestionRequest) -> Result<Vec<Suggestion>, SourceError>;
}

#[async_trait]
impl<T: SuggestionSource + ?Sized> SuggestionSource for std::sync::Arc<T> {
    async fn fetch(&self, request: &SuggestionRequest) -> Result<Vec<Suggestion>, SourceError> {
        (**self).fetch(request).await
    }
}

/// Suggestion source backed by the site's autocomplete endpoint.
#[derive(Clone, Default)]
pub struct HttpSuggestionSource {
    client: reqwest::Client,
}

impl HttpSuggestionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SuggestionSource for HttpSuggestionSource {
    async fn fetch(&self, request: &SuggestionRequest) -> Result<Vec<Suggestion>, SourceError> {
        let response = self
            .client
            .get(request.url.clone())
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        let suggestions = parse_suggestions(&body)?;
        debug!(url = %request.url, count = suggestions.len(), "Autocomplete response");
        Ok(suggestions)
    }
}
