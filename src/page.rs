//! The browser page as seen by the client: where it is, what locale the
//! browser reports, and how to navigate away.

use crate::lang::{LANG_PARAM, LanguageResolution, resolve_language};
use crate::location::with_query_param;
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

pub trait Page: Send + Sync {
    /// The page's current URL.
    fn location(&self) -> Url;

    /// The browser's declared locale, e.g. `ar-SA`.
    fn browser_locale(&self) -> Option<String>;

    /// Leaves the current page for `target`. All in-memory state of the old
    /// page is considered discarded afterwards.
    fn navigate(&self, target: Url);

    /// Resolves the display language from the current location.
    fn language(&self) -> LanguageResolution {
        let location = self.location();
        let locale = self.browser_locale();
        resolve_language(location.query(), locale.as_deref())
    }
}

/// Makes sure the page URL carries an explicit `lang`.
///
/// When the language had to be derived from the browser locale (or the
/// default), the page is navigated to its own URL with `lang` added. On a page
/// that already has the parameter this is a no-op.
pub fn ensure_language_param<P: Page + ?Sized>(page: &P) -> LanguageResolution {
    let resolution = page.language();
    if resolution.requires_reload() {
        let target = with_query_param(&page.location(), LANG_PARAM, resolution.code.as_str());
        debug!(
            lang = %resolution.code,
            source = %resolution.source,
            %target,
            "Reloading with language parameter"
        );
        page.navigate(target);
    }
    resolution
}

/// Handles a click on a language link whose id is `target_lang`: rewrites
/// `lang` on the current URL and reloads. Returns the new location.
pub fn switch_language<P: Page + ?Sized>(page: &P, target_lang: &str) -> Url {
    let target = with_query_param(&page.location(), LANG_PARAM, target_lang);
    debug!(lang = target_lang, %target, "Switching display language");
    page.navigate(target.clone());
    target
}

/// In-memory page used by the CLI and tests. Navigation replaces the current
/// location immediately, as if the target had finished loading.
#[derive(Debug)]
pub struct SimulatedPage {
    locale: Option<String>,
    state: Mutex<SimulatedState>,
}

#[derive(Debug)]
struct SimulatedState {
    location: Url,
    history: Vec<Url>,
}

impl SimulatedPage {
    pub fn new(location: Url, locale: Option<String>) -> Self {
        Self {
            locale,
            state: Mutex::new(SimulatedState {
                location,
                history: Vec::new(),
            }),
        }
    }

    /// Every navigation performed so far, oldest first.
    pub fn navigations(&self) -> Vec<Url> {
        self.state.lock().history.clone()
    }

    pub fn last_navigation(&self) -> Option<Url> {
        self.state.lock().history.last().cloned()
    }
}

impl Page for SimulatedPage {
    fn location(&self) -> Url {
        self.state.lock().location.clone()
    }

    fn browser_locale(&self) -> Option<String> {
        self.locale.clone()
    }

    fn navigate(&self, target: Url) {
        let mut state = self.state.lock();
        state.history.push(target.clone());
        state.location = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::LanguageSource;

    fn page(url: &str, locale: Option<&str>) -> SimulatedPage {
        SimulatedPage::new(Url::parse(url).unwrap(), locale.map(str::to_string))
    }

    #[test]
    fn missing_lang_triggers_single_reload() {
        let page = page("http://h.test/?aspect=Domain", Some("ar-SA"));
        let resolution = ensure_language_param(&page);
        assert_eq!(resolution.code.as_str(), "ar");
        assert_eq!(resolution.source, LanguageSource::BrowserLocale);
        assert_eq!(
            page.location().as_str(),
            "http://h.test/?aspect=Domain&lang=ar"
        );

        let again = ensure_language_param(&page);
        assert_eq!(again.source, LanguageSource::Url);
        assert_eq!(page.navigations().len(), 1);
    }

    #[test]
    fn unsupported_locale_reloads_with_english() {
        let page = page("http://h.test/", Some("de-DE"));
        ensure_language_param(&page);
        assert_eq!(
            page.last_navigation().map(|url| url.to_string()),
            Some("http://h.test/?lang=en".to_string())
        );
    }

    #[test]
    fn present_lang_never_navigates() {
        let page = page("http://h.test/term?lang=fr&base_uri=x", Some("ar-SA"));
        let resolution = ensure_language_param(&page);
        assert_eq!(resolution.code.as_str(), "fr");
        assert!(page.navigations().is_empty());
    }

    #[test]
    fn language_link_rewrites_lang_and_reloads() {
        let page = page("http://h.test/?lang=en&other=1", None);
        let target = switch_language(&page, "es");
        assert_eq!(target.query(), Some("lang=es&other=1"));
        assert_eq!(page.navigations(), vec![target]);
        assert_eq!(page.language().code.as_str(), "es");
    }
}
