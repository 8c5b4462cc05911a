//! Integration tests for the catalog lifecycle: subscribe, list, tag, refresh,
//! delete.
//!
//! Feeds are served by wiremock. Each test uses its own store, either in
//! memory or in a private temp directory.

use podshelf::catalog::{Catalog, EpisodeFilter};
use podshelf::feed::HttpFetcher;
use podshelf::storage::{JsonFileStore, MemoryStore, SqliteStore, Store};
use podshelf::util::HostPolicy;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss(show: &str, items: &[(&str, &str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(guid, title, date)| {
            format!(
                "<item><guid>{}</guid><title>{}</title><pubDate>{}</pubDate>\
                 <description>{} notes</description></item>",
                guid, title, date, title
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>{}</title>{}</channel></rss>"#,
        show, items
    )
}

async fn mount(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn catalog_with(store: Arc<dyn Store>) -> Catalog {
    Catalog::new(store, Arc::new(HttpFetcher::new(reqwest::Client::new())))
        .host_policy(HostPolicy::AllowPrivate)
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("podshelf_lifecycle_{}", name));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Two shows: "Tech Weekly" (t1, t2) and "Kitchen" (k1).
async fn two_shows() -> (MockServer, String, String) {
    let server = MockServer::start().await;
    mount(
        &server,
        "/tech.xml",
        rss(
            "Tech Weekly",
            &[
                ("t1", "Chips", "Mon, 05 Jan 2026 10:00:00 GMT"),
                ("t2", "Compilers", "Wed, 07 Jan 2026 10:00:00 GMT"),
            ],
        ),
    )
    .await;
    mount(
        &server,
        "/kitchen.xml",
        rss("Kitchen", &[("k1", "Sourdough", "Tue, 06 Jan 2026 10:00:00 GMT")]),
    )
    .await;
    let tech = format!("{}/tech.xml", server.uri());
    let kitchen = format!("{}/kitchen.xml", server.uri());
    (server, tech, kitchen)
}

#[tokio::test]
async fn test_added_feeds_list_newest_first() {
    let (_server, tech, kitchen) = two_shows().await;
    let catalog = catalog_with(Arc::new(MemoryStore::new()));

    catalog.add_feed(&tech).await.unwrap();
    catalog.add_feed(&kitchen).await.unwrap();

    let episodes = catalog
        .list_episodes(&EpisodeFilter::default())
        .await
        .unwrap();
    let ids: Vec<_> = episodes.iter().map(|e| e.episode_id.as_str()).collect();
    assert_eq!(ids, vec!["t2", "k1", "t1"]);
    assert_eq!(episodes[1].podcast_title, "Kitchen");
    assert_eq!(episodes[1].description, "Sourdough notes");
}

#[tokio::test]
async fn test_duplicate_add_is_conflict() {
    let (_server, tech, _kitchen) = two_shows().await;
    let catalog = catalog_with(Arc::new(MemoryStore::new()));

    catalog.add_feed(&tech).await.unwrap();
    let err = catalog.add_feed(&tech).await.unwrap_err();
    assert_eq!(err.kind(), "conflict");
    assert_eq!(catalog.list_feeds().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_tag_filter_returns_only_tagged_episode() {
    let (_server, tech, kitchen) = two_shows().await;
    let catalog = catalog_with(Arc::new(MemoryStore::new()));
    catalog.add_feed(&tech).await.unwrap();
    catalog.add_feed(&kitchen).await.unwrap();

    catalog
        .set_episode_tags("t2", vec!["AI".into(), "deep-dive".into()])
        .await
        .unwrap();
    catalog
        .set_episode_tags("k1", vec!["food".into()])
        .await
        .unwrap();

    let tagged = catalog
        .list_episodes(&EpisodeFilter::default().tag("AI"))
        .await
        .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].episode_id, "t2");
    assert_eq!(tagged[0].tags, vec!["AI", "deep-dive"]);
}

#[tokio::test]
async fn test_delete_feed_removes_its_tags() {
    let (_server, tech, kitchen) = two_shows().await;
    let catalog = catalog_with(Arc::new(MemoryStore::new()));
    let tech_feed = catalog.add_feed(&tech).await.unwrap();
    catalog.add_feed(&kitchen).await.unwrap();

    catalog
        .set_episode_tags("t1", vec!["hardware".into()])
        .await
        .unwrap();
    catalog
        .set_episode_tags("t2", vec!["languages".into(), "shared".into()])
        .await
        .unwrap();
    catalog
        .set_episode_tags("k1", vec!["shared".into()])
        .await
        .unwrap();
    assert_eq!(
        catalog.list_tags().await.unwrap(),
        vec!["hardware", "languages", "shared"]
    );

    catalog.delete_feed(&tech_feed.id).await.unwrap();

    assert_eq!(catalog.list_tags().await.unwrap(), vec!["shared"]);
    let index = catalog.tag_index().await.unwrap();
    assert!(!index.contains("t1"));
    assert!(!index.contains("t2"));
    assert!(index.contains("k1"));

    let remaining = catalog
        .list_episodes(&EpisodeFilter::default())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn test_refresh_picks_up_new_episodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/show.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(
            "Show",
            &[("s1", "One", "Mon, 05 Jan 2026 10:00:00 GMT")],
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount(
        &server,
        "/show.xml",
        rss(
            "Show",
            &[
                ("s2", "Two", "Mon, 12 Jan 2026 10:00:00 GMT"),
                ("s1", "One", "Mon, 05 Jan 2026 10:00:00 GMT"),
            ],
        ),
    )
    .await;

    let catalog = catalog_with(Arc::new(MemoryStore::new()));
    let url = format!("{}/show.xml", server.uri());
    let added = catalog.add_feed(&url).await.unwrap();
    assert_eq!(added.episodes.len(), 1);

    let refreshed = catalog.refresh_feed(&added.id).await.unwrap();
    assert_eq!(refreshed.id, added.id);
    assert_eq!(refreshed.episodes.len(), 2);

    let feeds = catalog.list_feeds().await.unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].episode_count, 2);
}

#[tokio::test]
async fn test_public_only_policy_rejects_mock_host() {
    let (_server, tech, _kitchen) = two_shows().await;
    let catalog = Catalog::new(
        Arc::new(MemoryStore::new()),
        Arc::new(HttpFetcher::new(reqwest::Client::new())),
    );

    let err = catalog.add_feed(&tech).await.unwrap_err();
    assert_eq!(err.kind(), "validation_error");
}

#[tokio::test]
async fn test_json_store_survives_restart() {
    let (_server, tech, _kitchen) = two_shows().await;
    let dir = temp_dir("json_restart");

    {
        let catalog = catalog_with(Arc::new(JsonFileStore::new(&dir)));
        catalog.add_feed(&tech).await.unwrap();
        catalog
            .set_episode_tags("t1", vec!["keep".into()])
            .await
            .unwrap();
    }

    let catalog = catalog_with(Arc::new(JsonFileStore::new(&dir)));
    let feeds = catalog.list_feeds().await.unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].url, tech);
    assert_eq!(catalog.list_tags().await.unwrap(), vec!["keep"]);

    let raw = std::fs::read_to_string(dir.join("tags.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["tagsByEpisodeId"]["t1"], serde_json::json!(["keep"]));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_sqlite_store_backs_catalog() {
    let (_server, tech, kitchen) = two_shows().await;
    let store = SqliteStore::open(":memory:").await.unwrap();
    let catalog = catalog_with(Arc::new(store));

    catalog.add_feed(&tech).await.unwrap();
    catalog.add_feed(&kitchen).await.unwrap();
    catalog
        .set_episode_tags("k1", vec!["food".into()])
        .await
        .unwrap();

    let kitchen_only = catalog
        .list_episodes(&EpisodeFilter::default().query("SOURDOUGH"))
        .await
        .unwrap();
    assert_eq!(kitchen_only.len(), 1);
    assert_eq!(kitchen_only[0].tags, vec!["food"]);
}
