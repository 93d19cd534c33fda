//! Client-side behaviour of the multilingual thesaurus site: picking the
//! display language for a page view and driving the type-ahead term search.

mod autocomplete;
mod error;
mod lang;
mod location;
mod page;
mod source;

pub use autocomplete::{AutocompleteController, AutocompleteOptions, SuggestionList};
pub use error::{ClientError, SourceError};
pub use lang::{
    DEFAULT_LANGUAGE, LANG_PARAM, LanguageCode, LanguageResolution, LanguageSource,
    SUPPORTED_LANGUAGES, language_param, primary_subtag, resolve_language,
};
pub use location::{EndpointConfig, path_and_query, query_param, with_query_param};
pub use page::{Page, SimulatedPage, ensure_language_param, switch_language};
pub use source::{
    HttpSuggestionSource, Suggestion, SuggestionRequest, SuggestionSource, parse_suggestions,
};

use std::sync::Arc;

/// Everything a deployment can tune about the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoints: EndpointConfig,
    pub autocomplete: AutocompleteOptions,
}

/// Runs the page-load sequence: normalise `lang` on the URL, then bind the
/// search box.
///
/// Returns `None` when the resolver had to navigate; the page is being
/// reloaded and the caller should start over on the new location.
pub fn load_page<S, P>(
    page: Arc<P>,
    source: S,
    config: &ClientConfig,
) -> Option<AutocompleteController<S, P>>
where
    S: SuggestionSource + 'static,
    P: Page + 'static,
{
    let resolution = ensure_language_param(page.as_ref());
    if resolution.requires_reload() {
        return None;
    }
    Some(AutocompleteController::bind(
        page,
        source,
        config.endpoints.clone(),
        config.autocomplete,
    ))
}
