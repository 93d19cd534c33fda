//! Type-ahead search bound to a page.
//!
//! Every accepted input bumps a generation counter. A lookup only fires once
//! the input has been stable for the configured delay, and its result is only
//! published if no newer input arrived while it was in flight, so the menu
//! always reflects the latest keystroke.

use crate::error::ClientError;
use crate::location::EndpointConfig;
use crate::page::Page;
use crate::source::{Suggestion, SuggestionRequest, SuggestionSource};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutocompleteOptions {
    /// Minimum number of characters before a lookup is made.
    pub min_length: usize,
    /// How long input must stay unchanged before a lookup is made.
    pub delay: Duration,
}

impl Default for AutocompleteOptions {
    fn default() -> Self {
        Self {
            min_length: 2,
            delay: Duration::from_millis(500),
        }
    }
}

/// Current contents of the suggestion menu. An empty list means the menu is
/// closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuggestionList {
    pub generation: u64,
    pub term: String,
    pub items: Vec<Suggestion>,
}

impl SuggestionList {
    pub fn is_open(&self) -> bool {
        !self.items.is_empty()
    }
}

pub struct AutocompleteController<S, P> {
    shared: Arc<Shared<S, P>>,
}

struct Shared<S, P> {
    source: S,
    page: Arc<P>,
    endpoints: EndpointConfig,
    options: AutocompleteOptions,
    generation: AtomicU64,
    last_input: Mutex<Option<String>>,
    menu: watch::Sender<SuggestionList>,
}

impl<S, P> Clone for AutocompleteController<S, P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S, P> AutocompleteController<S, P>
where
    S: SuggestionSource + 'static,
    P: Page + 'static,
{
    pub fn bind(
        page: Arc<P>,
        source: S,
        endpoints: EndpointConfig,
        options: AutocompleteOptions,
    ) -> Self {
        let (menu, _) = watch::channel(SuggestionList::default());
        Self {
            shared: Arc::new(Shared {
                source,
                page,
                endpoints,
                options,
                generation: AtomicU64::new(0),
                last_input: Mutex::new(None),
                menu,
            }),
        }
    }

    pub fn options(&self) -> AutocompleteOptions {
        self.shared.options
    }

    /// Receiver that sees every published menu state.
    pub fn subscribe(&self) -> watch::Receiver<SuggestionList> {
        self.shared.menu.subscribe()
    }

    pub fn suggestions(&self) -> SuggestionList {
        self.shared.menu.borrow().clone()
    }

    /// Feeds the input's current value. Lookups run on the current tokio
    /// runtime; without one, input long enough to search is dropped.
    pub fn input(&self, text: &str) {
        let generation = {
            let mut last = self.shared.last_input.lock();
            if last.as_deref() == Some(text) {
                return;
            }
            *last = Some(text.to_string());
            self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        if text.chars().count() < self.shared.options.min_length {
            self.shared.publish(SuggestionList {
                generation,
                term: text.to_string(),
                items: Vec::new(),
            });
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(generation, term = text, "No tokio runtime, skipping lookup");
            return;
        };
        let shared = Arc::clone(&self.shared);
        let term = text.to_string();
        runtime.spawn(async move {
            tokio::time::sleep(shared.options.delay).await;
            if !shared.is_current(generation) {
                return;
            }
            shared.lookup(generation, term).await;
        });
    }

    /// Navigates to the detail page of `item`, using the language the page
    /// carries right now. Returns the target.
    pub fn select(&self, item: &Suggestion) -> Result<Url, ClientError> {
        let page = &self.shared.page;
        let lang = page.language().code;
        let target = self.shared.endpoints.term_url(
            &page.location(),
            &lang,
            &item.base_uri,
            &item.uri_anchor,
        )?;
        debug!(label = %item.label, %target, "Opening term page");
        page.navigate(target.clone());
        Ok(target)
    }
}

impl<S, P> Shared<S, P>
where
    S: SuggestionSource,
    P: Page,
{
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Replaces the menu unless a newer generation is already showing.
    fn publish(&self, list: SuggestionList) {
        self.menu.send_if_modified(|current| {
            if current.generation > list.generation {
                return false;
            }
            *current = list;
            true
        });
    }

    async fn lookup(&self, generation: u64, term: String) {
        let lang = self.page.language().code;
        let url = match self
            .endpoints
            .autocomplete_url(&self.page.location(), Some(&lang), &term)
        {
            Ok(url) => url,
            Err(err) => {
                warn!(
                    generation,
                    error = %err,
                    path = %self.endpoints.autocomplete_path,
                    "Cannot build autocomplete url"
                );
                if self.is_current(generation) {
                    self.publish(SuggestionList {
                        generation,
                        term,
                        items: Vec::new(),
                    });
                }
                return;
            }
        };
        let request = SuggestionRequest {
            url,
            term,
            lang: self.endpoints.send_language.then_some(lang),
        };
        debug!(generation, url = %request.url, "Fetching suggestions");

        let items = match self.source.fetch(&request).await {
            Ok(items) => items,
            Err(err) => {
                warn!(generation, error = %err, "Autocomplete lookup failed");
                Vec::new()
            }
        };

        if !self.is_current(generation) {
            debug!(generation, term = %request.term, "Dropping stale suggestions");
            return;
        }
        self.publish(SuggestionList {
            generation,
            term: request.term,
            items,
        });
    }
}
