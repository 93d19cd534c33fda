//! URL plumbing shared by the resolver and the autocomplete controller.

use crate::lang::{LANG_PARAM, LanguageCode};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use url::{Url, form_urlencoded};

/// Characters that would change the shape of a query string. Everything else,
/// including `:` and `/`, is left as-is so term links stay readable.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>');

/// Paths of the two server endpoints the page talks to.
///
/// Paths are joined onto the current page URL, so a leading slash makes them
/// site-absolute and its absence makes them relative to the page directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub autocomplete_path: String,
    pub term_path: String,
    /// Whether autocomplete requests carry the `lang` parameter.
    pub send_language: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            autocomplete_path: "/autocomplete".to_string(),
            term_path: "/term".to_string(),
            send_language: true,
        }
    }
}

impl EndpointConfig {
    /// Page-relative endpoints, for deployments mounted under a sub-path.
    pub fn relative() -> Self {
        Self {
            autocomplete_path: "autocomplete".to_string(),
            term_path: "term".to_string(),
            send_language: true,
        }
    }

    pub fn autocomplete_url(
        &self,
        page: &Url,
        lang: Option<&LanguageCode>,
        term: &str,
    ) -> Result<Url, url::ParseError> {
        let mut url = page.join(&self.autocomplete_path)?;
        url.set_fragment(None);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            if let Some(lang) = lang.filter(|_| self.send_language) {
                pairs.append_pair(LANG_PARAM, lang.as_str());
            }
            pairs.append_pair("q", term);
        }
        Ok(url)
    }

    pub fn term_url(
        &self,
        page: &Url,
        lang: &LanguageCode,
        base_uri: &str,
        uri_anchor: &str,
    ) -> Result<Url, url::ParseError> {
        let mut url = page.join(&self.term_path)?;
        url.set_fragment(None);
        let query = format!(
            "{LANG_PARAM}={}&base_uri={}&uri_anchor={}",
            encode_value(lang.as_str()),
            encode_value(base_uri),
            encode_value(uri_anchor),
        );
        url.set_query(Some(&query));
        Ok(url)
    }
}

fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// First value of `name` in the URL's query, like `URLSearchParams.get`.
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Returns `url` with `name` set to `value`, like `URLSearchParams.set`.
///
/// The first occurrence keeps its position, later duplicates are removed and
/// a missing parameter is appended. Other parameters keep their order.
pub fn with_query_param(url: &Url, name: &str, value: &str) -> Url {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, val)| (key.into_owned(), val.into_owned()))
        .collect();

    let mut replaced = false;
    pairs.retain_mut(|(key, val)| {
        if key != name {
            return true;
        }
        if replaced {
            return false;
        }
        *val = value.to_string();
        replaced = true;
        true
    });
    if !replaced {
        pairs.push((name.to_string(), value.to_string()));
    }

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish();
    let mut target = url.clone();
    target.set_query(Some(&query));
    target
}

/// Path plus query, the part of a URL a page would put in an `href`.
pub fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("http://thesaurus.test/thesaurus/index?lang=en&page=2#top").unwrap()
    }

    #[test]
    fn set_replaces_in_place_and_keeps_other_params() {
        let url = Url::parse("http://h.test/?lang=en&other=1").unwrap();
        let updated = with_query_param(&url, "lang", "es");
        assert_eq!(updated.query(), Some("lang=es&other=1"));
    }

    #[test]
    fn set_appends_when_missing_and_drops_duplicates() {
        let url = Url::parse("http://h.test/?aspect=Concept").unwrap();
        assert_eq!(
            with_query_param(&url, "lang", "ar").query(),
            Some("aspect=Concept&lang=ar")
        );

        let url = Url::parse("http://h.test/?lang=en&page=1&lang=fr").unwrap();
        assert_eq!(
            with_query_param(&url, "lang", "zh").query(),
            Some("lang=zh&page=1")
        );
    }

    #[test]
    fn set_on_bare_url_adds_query() {
        let url = Url::parse("http://h.test/term").unwrap();
        let updated = with_query_param(&url, "lang", "ru");
        assert_eq!(updated.as_str(), "http://h.test/term?lang=ru");
    }

    #[test]
    fn query_param_decodes_first_value() {
        let url = Url::parse("http://h.test/?q=a+b%26c&q=zzz").unwrap();
        assert_eq!(query_param(&url, "q").as_deref(), Some("a b&c"));
        assert_eq!(query_param(&url, "lang"), None);
    }

    #[test]
    fn absolute_autocomplete_url_carries_lang_and_query() {
        let endpoints = EndpointConfig::default();
        let lang = LanguageCode::new("fr");
        let url = endpoints
            .autocomplete_url(&page(), Some(&lang), "chat noir")
            .unwrap();
        assert_eq!(url.as_str(), "http://thesaurus.test/autocomplete?lang=fr&q=chat+noir");
    }

    #[test]
    fn relative_autocomplete_url_without_lang() {
        let endpoints = EndpointConfig {
            send_language: false,
            ..EndpointConfig::relative()
        };
        let lang = LanguageCode::new("fr");
        let url = endpoints.autocomplete_url(&page(), Some(&lang), "ca").unwrap();
        assert_eq!(url.as_str(), "http://thesaurus.test/thesaurus/autocomplete?q=ca");
    }

    #[test]
    fn term_url_keeps_uris_readable() {
        let endpoints = EndpointConfig::default();
        let url = endpoints
            .term_url(&page(), &LanguageCode::new("en"), "http://x/animal", "cat")
            .unwrap();
        assert_eq!(
            path_and_query(&url),
            "/term?lang=en&base_uri=http://x/animal&uri_anchor=cat"
        );
    }

    #[test]
    fn term_url_escapes_query_delimiters() {
        let endpoints = EndpointConfig::relative();
        let url = endpoints
            .term_url(&page(), &LanguageCode::new("es"), "http://x/a?b=1&c", "d#e")
            .unwrap();
        assert_eq!(
            path_and_query(&url),
            "/thesaurus/term?lang=es&base_uri=http://x/a?b%3D1%26c&uri_anchor=d%23e"
        );
        assert_eq!(query_param(&url, "base_uri").as_deref(), Some("http://x/a?b=1&c"));
        assert_eq!(query_param(&url, "uri_anchor").as_deref(), Some("d#e"));
    }
}
