use serde::Serialize;
use std::fmt;
use url::form_urlencoded;

/// Name of the query parameter that carries the display language.
pub const LANG_PARAM: &str = "lang";

/// Languages the site translates into, in the order the site lists them.
pub const SUPPORTED_LANGUAGES: [&str; 6] = ["ar", "zh", "en", "fr", "ru", "es"];

pub const DEFAULT_LANGUAGE: &str = "en";

/// A display language code such as `en` or `zh`.
///
/// Codes taken from the URL are kept verbatim, even when they fall outside
/// [`SUPPORTED_LANGUAGES`]; only codes derived from the browser locale are
/// checked against the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_LANGUAGES.contains(&self.0.as_str())
    }
}

impl Default for LanguageCode {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LanguageCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where a resolved language came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageSource {
    Url,
    BrowserLocale,
    Fallback,
}

impl fmt::Display for LanguageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageSource::Url => write!(f, "url"),
            LanguageSource::BrowserLocale => write!(f, "browser-locale"),
            LanguageSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageResolution {
    pub code: LanguageCode,
    pub source: LanguageSource,
}

impl LanguageResolution {
    /// True when the URL did not already carry the language, so the page has
    /// to be reloaded with `lang` written into its query.
    pub fn requires_reload(&self) -> bool {
        self.source != LanguageSource::Url
    }
}

/// Resolves the display language for a page view.
///
/// `url_query` is the raw query string without the leading `?`.
/// A non-empty `lang` parameter always wins. Otherwise the primary subtag of
/// `browser_locale` is used if the site supports it, and `en` if not.
pub fn resolve_language(
    url_query: Option<&str>,
    browser_locale: Option<&str>,
) -> LanguageResolution {
    if let Some(code) = url_query.and_then(language_param) {
        return LanguageResolution {
            code: LanguageCode(code),
            source: LanguageSource::Url,
        };
    }

    match browser_locale.and_then(supported_subtag) {
        Some(code) => LanguageResolution {
            code: LanguageCode::new(code),
            source: LanguageSource::BrowserLocale,
        },
        None => LanguageResolution {
            code: LanguageCode::default(),
            source: LanguageSource::Fallback,
        },
    }
}

/// Returns the first non-empty `lang` value of a query string.
pub fn language_param(query: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == LANG_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Leading subtag of a locale such as `ar-SA`, lowercased.
pub fn primary_subtag(locale: &str) -> Option<String> {
    let subtag = locale.trim().split('-').next()?;
    if subtag.is_empty() {
        None
    } else {
        Some(subtag.to_ascii_lowercase())
    }
}

fn supported_subtag(locale: &str) -> Option<&'static str> {
    let subtag = primary_subtag(locale)?;
    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|code| *code == subtag)
}
