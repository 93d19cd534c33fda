use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use atty::Stream;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use thesaurus_client::{
    AutocompleteOptions, ClientConfig, EndpointConfig, HttpSuggestionSource, LANG_PARAM,
    LanguageCode, LanguageResolution, Page, SimulatedPage, Suggestion, SuggestionList,
    SuggestionRequest, SuggestionSource, load_page, path_and_query, resolve_language,
    switch_language, with_query_param,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "thesaurus-client",
    about = "Resolve display languages and search terms on the thesaurus site",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct PageArgs {
    /// URL of the page being loaded.
    #[arg(long)]
    url: Url,
    /// Browser locale, e.g. `ar-SA`. Defaults to LC_ALL / LANG, then the OS locale.
    #[arg(long)]
    locale: Option<String>,
}

impl PageArgs {
    fn locale(&self) -> Option<String> {
        self.locale.clone().or_else(system_locale)
    }

    fn page(&self) -> SimulatedPage {
        SimulatedPage::new(self.url.clone(), self.locale())
    }
}

#[derive(Args, Debug)]
struct EndpointArgs {
    /// Resolve endpoints relative to the page instead of the site root.
    #[arg(long)]
    relative_endpoints: bool,
    /// Do not send `lang` with autocomplete requests.
    #[arg(long)]
    omit_lang: bool,
    /// Give up on an autocomplete request after this many seconds.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

impl EndpointArgs {
    fn config(&self) -> EndpointConfig {
        let base = if self.relative_endpoints {
            EndpointConfig::relative()
        } else {
            EndpointConfig::default()
        };
        EndpointConfig {
            send_language: !self.omit_lang,
            ..base
        }
    }

    fn source(&self) -> Result<HttpSuggestionSource, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;
        Ok(HttpSuggestionSource::with_client(client))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the display language for a page load.
    Resolve {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Follow a language link: rewrite `lang` on the page URL.
    Switch {
        /// Page the link was clicked on.
        #[arg(long)]
        url: Url,
        /// Target language code (the link's id).
        lang: String,
    },
    /// Build the term page URL a suggestion links to.
    TermUrl {
        #[command(flatten)]
        page: PageArgs,
        #[command(flatten)]
        endpoints: EndpointArgs,
        #[arg(long)]
        base_uri: String,
        #[arg(long, default_value = "")]
        uri_anchor: String,
    },
    /// Run a single autocomplete lookup against the site.
    Suggest {
        #[command(flatten)]
        page: PageArgs,
        #[command(flatten)]
        endpoints: EndpointArgs,
        /// Text typed into the search box.
        query: String,
    },
    /// Type into the search box interactively. Each line replaces the input;
    /// `:select N`, `:lang CODE` and `:quit` act on the page.
    Session {
        #[command(flatten)]
        page: PageArgs,
        #[command(flatten)]
        endpoints: EndpointArgs,
        /// Minimum characters before a lookup.
        #[arg(long, default_value_t = 2)]
        min_length: usize,
        /// Debounce delay in milliseconds.
        #[arg(long, default_value_t = 500)]
        delay_ms: u64,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Resolve { page } => handle_resolve(page, cli.json),
        Command::Switch { url, lang } => handle_switch(url, lang, cli.json),
        Command::TermUrl {
            page,
            endpoints,
            base_uri,
            uri_anchor,
        } => handle_term_url(page, endpoints, base_uri, uri_anchor, cli.json),
        Command::Suggest {
            page,
            endpoints,
            query,
        } => runtime()?.block_on(handle_suggest(page, endpoints, query, cli.json)),
        Command::Session {
            page,
            endpoints,
            min_length,
            delay_ms,
        } => {
            let source = endpoints.source()?;
            let config = ClientConfig {
                endpoints: endpoints.config(),
                autocomplete: AutocompleteOptions {
                    min_length,
                    delay: Duration::from_millis(delay_ms),
                },
            };
            runtime()?.block_on(handle_session(page, source, config, cli.json))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn Error>> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Stand-in for the browser locale when `--locale` is not given.
fn system_locale() -> Option<String> {
    detect_locale(|key| std::env::var(key).ok(), sys_locale::get_locale)
}

/// Resolution order:
/// 1. `LC_ALL`, then `LANG`
/// 2. The operating system locale via `sys-locale`
///
/// Values are normalised to browser form (`en_US.UTF-8` → `en-US`).
fn detect_locale(
    env: impl Fn(&str) -> Option<String>,
    system: impl FnOnce() -> Option<String>,
) -> Option<String> {
    let from_env = ["LC_ALL", "LANG"]
        .iter()
        .filter_map(|key| env(key))
        .find_map(|value| normalize_env_locale(&value));
    if from_env.is_some() {
        return from_env;
    }
    system().and_then(|value| normalize_env_locale(&value))
}

fn normalize_env_locale(value: &str) -> Option<String> {
    let base = value.split(['.', '@']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-"))
}

fn handle_resolve(args: PageArgs, as_json: bool) -> Result<(), Box<dyn Error>> {
    let locale = args.locale();
    let resolution = resolve_language(args.url.query(), locale.as_deref());
    let reload = resolution
        .requires_reload()
        .then(|| with_query_param(&args.url, LANG_PARAM, resolution.code.as_str()));

    if as_json {
        let payload = json!({
            "url": args.url.as_str(),
            "locale": locale,
            "lang": resolution.code,
            "supported": resolution.code.is_supported(),
            "source": resolution.source,
            "reload": reload.as_ref().map(Url::as_str),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_resolution(&resolution, locale.as_deref(), reload.as_ref());
    }
    Ok(())
}

fn handle_switch(url: Url, lang: String, as_json: bool) -> Result<(), Box<dyn Error>> {
    if lang.trim().is_empty() {
        return Err("Language code cannot be empty".into());
    }
    if !LanguageCode::new(lang.as_str()).is_supported() {
        eprintln!("warning: {lang:?} is not one of the site's languages");
    }
    let page = SimulatedPage::new(url, None);
    let target = switch_language(&page, &lang);
    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "lang": lang, "navigate": target.as_str() }))?
        );
    } else {
        println!("Navigate to {target}");
    }
    Ok(())
}

fn handle_term_url(
    args: PageArgs,
    endpoints: EndpointArgs,
    base_uri: String,
    uri_anchor: String,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let page = args.page();
    let lang = page.language().code;
    let target = endpoints
        .config()
        .term_url(&page.location(), &lang, &base_uri, &uri_anchor)?;
    if as_json {
        let payload = json!({
            "lang": lang,
            "url": target.as_str(),
            "href": path_and_query(&target),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{target}");
    }
    Ok(())
}

async fn handle_suggest(
    args: PageArgs,
    endpoints: EndpointArgs,
    query: String,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let min_length = AutocompleteOptions::default().min_length;
    if query.chars().count() < min_length {
        return Err(format!("Query must be at least {min_length} characters").into());
    }
    let page = args.page();
    let source = endpoints.source()?;
    let endpoints = endpoints.config();
    let lang = page.language().code;
    let url = endpoints.autocomplete_url(&page.location(), Some(&lang), &query)?;
    let request = SuggestionRequest {
        url,
        term: query,
        lang: endpoints.send_language.then_some(lang),
    };
    let items = source.fetch(&request).await?;

    if as_json {
        let payload = json!({
            "request": request.url.as_str(),
            "term": request.term,
            "results": items,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_suggestions(&request.term, &items);
    }
    Ok(())
}

enum SessionStep {
    Navigated,
    Quit,
}

async fn handle_session(
    args: PageArgs,
    source: HttpSuggestionSource,
    config: ClientConfig,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let page = Arc::new(args.page());
    let source = Arc::new(source);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let interactive = atty::is(Stream::Stdin);

    loop {
        let Some(controller) = load_page(Arc::clone(&page), Arc::clone(&source), &config) else {
            println!("Reloading {}", page.location());
            continue;
        };
        let options = controller.options();
        println!(
            "Page {} (lang={}, search after {} chars and {} ms)",
            page.location(),
            page.language().code,
            options.min_length,
            options.delay.as_millis()
        );

        let mut menu = controller.subscribe();
        let printer = tokio::spawn(async move {
            while menu.changed().await.is_ok() {
                let list = menu.borrow_and_update().clone();
                print_menu(&list, as_json);
            }
        });

        let step = loop {
            if interactive {
                print!("> ");
                std::io::stdout().flush()?;
            }
            let Some(line) = lines.next_line().await? else {
                break SessionStep::Quit;
            };
            if let Some(step) = session_command(&line, page.as_ref(), &controller)? {
                break step;
            }
        };
        printer.abort();

        match step {
            SessionStep::Quit => return Ok(()),
            SessionStep::Navigated => println!("Navigated to {}", page.location()),
        }
    }
}

fn session_command<P: Page + 'static>(
    line: &str,
    page: &P,
    controller: &thesaurus_client::AutocompleteController<Arc<HttpSuggestionSource>, P>,
) -> Result<Option<SessionStep>, Box<dyn Error>> {
    let Some(command) = line.strip_prefix(':') else {
        controller.input(line);
        return Ok(None);
    };
    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("quit"), _) => Ok(Some(SessionStep::Quit)),
        (Some("lang"), Some(code)) => {
            switch_language(page, code);
            Ok(Some(SessionStep::Navigated))
        }
        (Some("select"), Some(index)) => {
            let index: usize = index
                .parse()
                .map_err(|_| format!("Failed to parse suggestion number from {index:?}"))?;
            let list = controller.suggestions();
            match index.checked_sub(1).and_then(|i| list.items.get(i)) {
                Some(item) => {
                    controller.select(item)?;
                    Ok(Some(SessionStep::Navigated))
                }
                None => {
                    eprintln!("No suggestion #{index} for \"{}\"", list.term);
                    Ok(None)
                }
            }
        }
        _ => {
            eprintln!("Commands: :select N, :lang CODE, :quit");
            Ok(None)
        }
    }
}

fn print_resolution(resolution: &LanguageResolution, locale: Option<&str>, reload: Option<&Url>) {
    let note = if resolution.code.is_supported() { "" } else { ", not a site language" };
    println!("Language: {} (from {}{note})", resolution.code, resolution.source);
    println!("Locale:   {}", locale.unwrap_or("<none>"));
    match reload {
        Some(target) => println!("Reload:   {target}"),
        None => println!("Reload:   not needed"),
    }
}

fn print_menu(list: &SuggestionList, as_json: bool) {
    if as_json {
        match serde_json::to_string(list) {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("error: {err}"),
        }
        return;
    }
    if list.is_open() {
        print_suggestions(&list.term, &list.items);
    }
}

fn print_suggestions(term: &str, rows: &[Suggestion]) {
    if rows.is_empty() {
        println!("No suggestions for \"{term}\".");
        return;
    }
    let width = rows
        .iter()
        .map(|row| row.label.chars().count())
        .max()
        .unwrap_or(term.len())
        .max("LABEL".len());
    println!("Suggestions for \"{term}\":");
    println!("{:>3}  {:<width$}  {}", "#", "LABEL", "URI", width = width);
    println!("{:->3}  {:-<width$}  {}", "", "", "---", width = width);
    for (index, row) in rows.iter().enumerate() {
        let uri = if row.uri_anchor.is_empty() {
            row.base_uri.clone()
        } else {
            format!("{}#{}", row.base_uri, row.uri_anchor)
        };
        println!("{:>3}  {:<width$}  {}", index + 1, row.label, uri, width = width);
    }
}
