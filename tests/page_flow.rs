use axum::{Json, Router, extract::Query, routing::get};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thesaurus_client::{
    AutocompleteOptions, ClientConfig, HttpSuggestionSource, Page, SimulatedPage, load_page,
    path_and_query, switch_language,
};
use tokio::net::TcpListener;
use url::Url;

async fn autocomplete(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let lang = params.get("lang").map(String::as_str).unwrap_or("none");
    match (params.get("q").map(String::as_str), lang) {
        (Some("ca"), "en") => Json(json!([
            {"pref_label": "Cat", "base_uri": "http://x/animal", "uri_anchor": "cat"}
        ])),
        (Some("ca"), "ar") => Json(json!([
            {"pref_label": "قط", "base_uri": "http://x/animal", "uri_anchor": "cat"}
        ])),
        _ => Json(json!([])),
    }
}

async fn spawn_site() -> Url {
    let router = Router::new().route("/autocomplete", get(autocomplete));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

fn config() -> ClientConfig {
    ClientConfig {
        autocomplete: AutocompleteOptions {
            min_length: 2,
            delay: Duration::from_millis(20),
        },
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn first_visit_reloads_then_searches_and_opens_term() {
    let site = spawn_site().await;
    let page = Arc::new(SimulatedPage::new(site.clone(), Some("ar-SA".to_string())));
    let source = Arc::new(HttpSuggestionSource::new());

    assert!(load_page(Arc::clone(&page), Arc::clone(&source), &config()).is_none());
    assert_eq!(page.location().query(), Some("lang=ar"));

    let controller = load_page(Arc::clone(&page), source, &config()).expect("lang present");
    let mut menu = controller.subscribe();
    controller.input("c");
    controller.input("ca");

    let list = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            menu.changed().await.unwrap();
            let list = menu.borrow_and_update().clone();
            if list.is_open() {
                break list;
            }
        }
    })
    .await
    .expect("suggestions arrive");
    assert_eq!(list.term, "ca");
    assert_eq!(list.items[0].label, "قط");

    let target = controller.select(&list.items[0]).unwrap();
    assert_eq!(
        path_and_query(&target),
        "/term?lang=ar&base_uri=http://x/animal&uri_anchor=cat"
    );
    assert_eq!(page.navigations().len(), 2);
}

#[tokio::test]
async fn language_link_reload_rebinds_with_new_language() {
    let site = spawn_site().await;
    let start = site.join("?lang=en&other=1").unwrap();
    let page = Arc::new(SimulatedPage::new(start, Some("de-DE".to_string())));
    let source = Arc::new(HttpSuggestionSource::new());

    let controller =
        load_page(Arc::clone(&page), Arc::clone(&source), &config()).expect("lang present");
    assert!(page.navigations().is_empty());
    drop(controller);

    let target = switch_language(page.as_ref(), "es");
    assert_eq!(target.query(), Some("lang=es&other=1"));

    let controller = load_page(Arc::clone(&page), source, &config()).expect("lang present");
    let target = controller
        .select(&thesaurus_client::Suggestion {
            label: "Gato".to_string(),
            base_uri: "http://x/animal".to_string(),
            uri_anchor: "cat".to_string(),
        })
        .unwrap();
    assert_eq!(
        path_and_query(&target),
        "/term?lang=es&base_uri=http://x/animal&uri_anchor=cat"
    );
}
