//! Tests

#[cfg(test)]
mod tests {
    use crate::config::{CrawlConfig, StoreConfig};
    use crate::engine::{Engine, PageFetcher};
    use crate::error::{CatscrapeError, FetchError, StoreError};
    use crate::services::log::ActivityLogger;
    use crate::services::store::{BlobStore, MemoryStore};
    use crate::tools::fetch::{FetchOptions, HttpFetcher};
    use crate::types::{Department, LinkStatus, Page, Stage, UploadRecord};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const BASE: &str = "https://catalogue.example.edu/en/undergraduate/";

    const BASE_PAGE: &str = r#"
        <html><body>
          <nav><a href="/en/undergraduate/">Home</a></nav>
          <ul>
            <li><a href="/en/undergraduate/science/programs/biology/biology-bsc/">Biology</a></li>
            <li><a href="/en/undergraduate/science/programs/physics/physics-bsc/">Physics</a></li>
            <li><a href="/en/undergraduate/arts/programs/history/history-ba/">History</a></li>
            <li><a href="/en/undergraduate/science/programs/empty/">Empty</a></li>
          </ul>
        </body></html>
    "#;

    fn program_page(text: &str) -> String {
        format!(
            r#"<html><body><div id="programoverviewtextcontainer">{text}</div></body></html>"#
        )
    }

    /// Serves canned bodies or errors by absolute URL.
    struct StaticFetcher {
        pages: HashMap<String, Result<String, FetchError>>,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn catalogue() -> Self {
            let mut pages = HashMap::new();
            pages.insert(BASE.to_string(), Ok(BASE_PAGE.to_string()));
            pages.insert(
                format!("{BASE}science/programs/biology/biology-bsc/"),
                Ok(program_page("Required: BIOL 111<br/>BIOL 112")),
            );
            pages.insert(
                format!("{BASE}science/programs/physics/physics-bsc/"),
                Err(FetchError::HttpStatus(404)),
            );
            pages.insert(
                format!("{BASE}arts/programs/history/history-ba/"),
                Ok(program_page("Complementary: <em>HIST 200</em>")),
            );
            pages.insert(
                format!("{BASE}science/programs/empty/"),
                Ok("<html><body><p>Nothing here</p></body></html>".to_string()),
            );
            Self {
                pages,
                calls: AtomicUsize::new(0),
            }
        }

        fn with(mut self, url: &str, page: Result<String, FetchError>) -> Self {
            self.pages.insert(url.to_string(), page);
            self
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.pages.get(url) {
                Some(Ok(body)) => Ok(Page::parse(url, body.clone())),
                Some(Err(e)) => Err(e.clone()),
                None => Err(FetchError::ConnectionFailed),
            }
        }
    }

    struct RejectingStore;

    #[async_trait]
    impl BlobStore for RejectingStore {
        fn name(&self) -> &'static str {
            "rejecting"
        }

        async fn write(&self, _: &str, _: &str, _: Vec<u8>) -> Result<(), StoreError> {
            Err(StoreError::Status {
                code: 403,
                body: "denied".into(),
            })
        }
    }

    fn config() -> CrawlConfig {
        CrawlConfig {
            base_url: BASE.to_string(),
            departments: vec![
                Department::new("science", "undergraduate/science/programs"),
                Department::new("arts", "undergraduate/arts/programs"),
                Department::new("music", "undergraduate/music/programs"),
            ],
            store: StoreConfig::Memory,
            ..CrawlConfig::default()
        }
    }

    fn record(store: &MemoryStore, blob: &str) -> UploadRecord {
        UploadRecord::from_json_bytes(&store.get("rawscrape", blob).expect("blob written")).unwrap()
    }

    #[tokio::test]
    async fn test_run_uploads_and_isolates_failures() {
        let store = MemoryStore::new();
        let engine = Engine::new(
            config(),
            Arc::new(StaticFetcher::catalogue()),
            Arc::new(store.clone()),
        );

        let report = engine.run().await.unwrap();

        assert_eq!(report.discovered["science"], 3);
        assert_eq!(report.discovered["arts"], 1);
        assert_eq!(report.discovered["music"], 0);
        assert_eq!(report.container, "rawscrape");

        // Department order first, then document order.
        let links: Vec<_> = report.outcomes.iter().map(|o| o.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "/en/undergraduate/science/programs/biology/biology-bsc/",
                "/en/undergraduate/science/programs/physics/physics-bsc/",
                "/en/undergraduate/science/programs/empty/",
                "/en/undergraduate/arts/programs/history/history-ba/",
            ]
        );

        assert!(report.outcomes[0].is_uploaded());
        assert_eq!(
            report.outcomes[1].status,
            LinkStatus::Failed {
                stage: Stage::Fetch,
                error: "http status 404".into()
            }
        );
        assert!(matches!(
            report.outcomes[2].status,
            LinkStatus::Failed {
                stage: Stage::Extract,
                ..
            }
        ));
        assert!(report.outcomes[3].is_uploaded());
        assert_eq!(report.uploaded().count(), 2);
        assert_eq!(report.failed().count(), 2);

        assert_eq!(
            store.names("rawscrape"),
            vec![
                "arts.programs.history.history-ba".to_string(),
                "science.programs.biology.biology-bsc".to_string(),
            ]
        );
        let biology = record(&store, "science.programs.biology.biology-bsc");
        assert_eq!(biology.link, format!("{BASE}science/programs/biology/biology-bsc/"));
        assert_eq!(biology.html, "Required: BIOL 111BIOL 112");
        assert_eq!(
            record(&store, "arts.programs.history.history-ba").html,
            "Complementary: HIST 200"
        );
    }

    #[tokio::test]
    async fn test_run_fails_when_base_page_fails() {
        let fetcher = StaticFetcher::catalogue().with(BASE, Err(FetchError::HttpStatus(500)));
        let engine = Engine::new(config(), Arc::new(fetcher), Arc::new(MemoryStore::new()));

        let err = engine.run().await.unwrap_err();
        assert!(matches!(
            err,
            CatscrapeError::Fetch(FetchError::HttpStatus(500))
        ));
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let cfg = CrawlConfig {
            base_url: "::not a url::".into(),
            ..config()
        };
        let engine = Engine::new(
            cfg,
            Arc::new(StaticFetcher::catalogue()),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(
            engine.run().await,
            Err(CatscrapeError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_recorded_per_link() {
        let engine = Engine::new(
            config(),
            Arc::new(StaticFetcher::catalogue()),
            Arc::new(RejectingStore),
        );

        let report = engine.run().await.unwrap();
        let biology = &report.outcomes[0];
        assert_eq!(
            biology.blob_name.as_deref(),
            Some("science.programs.biology.biology-bsc")
        );
        assert!(matches!(
            biology.status,
            LinkStatus::Failed {
                stage: Stage::Store,
                ..
            }
        ));
        assert_eq!(report.uploaded().count(), 0);
        assert_eq!(report.outcomes.len(), 4);
    }

    #[tokio::test]
    async fn test_unresolvable_link_fails_at_resolve() {
        let base_page = r#"<a href="http://[::1/en/undergraduate/science/programs/x">broken</a>
            <a href="/en/undergraduate/science/programs/biology/biology-bsc/">ok</a>"#;
        let fetcher = StaticFetcher::catalogue().with(BASE, Ok(base_page.to_string()));
        let engine = Engine::new(config(), Arc::new(fetcher), Arc::new(MemoryStore::new()));

        let report = engine.run().await.unwrap();
        assert!(matches!(
            report.outcomes[0].status,
            LinkStatus::Failed {
                stage: Stage::Resolve,
                ..
            }
        ));
        assert!(report.outcomes[0].url.is_none());
        assert!(report.outcomes[1].is_uploaded());
    }

    #[tokio::test]
    async fn test_concurrent_run_matches_sequential() {
        let sequential = Engine::new(
            config(),
            Arc::new(StaticFetcher::catalogue()),
            Arc::new(MemoryStore::new()),
        )
        .run()
        .await
        .unwrap();

        let parallel = Engine::new(
            CrawlConfig {
                concurrency: 4,
                ..config()
            },
            Arc::new(StaticFetcher::catalogue()),
            Arc::new(MemoryStore::new()),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(sequential.outcomes, parallel.outcomes);
    }

    #[tokio::test]
    async fn test_single_attempt_per_page_by_default() {
        let fetcher = Arc::new(StaticFetcher::catalogue());
        let engine = Engine::new(
            config(),
            Arc::clone(&fetcher) as Arc<dyn PageFetcher>,
            Arc::new(MemoryStore::new()),
        );
        engine.run().await.unwrap();
        // Base page plus four program pages.
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_activity_log_gets_one_line_per_link() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("activity.log");
        let engine = Engine::new(
            config(),
            Arc::new(StaticFetcher::catalogue()),
            Arc::new(MemoryStore::new()),
        )
        .with_activity_log(ActivityLogger::at(&log_path));

        engine.run().await.unwrap();

        let reader = ActivityLogger::at(&log_path);
        assert_eq!(reader.read_logs(None, false).unwrap().len(), 4);
        assert_eq!(reader.read_logs(None, true).unwrap().len(), 2);
        assert_eq!(reader.read_logs(Some("arts"), false).unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_activity_log_under_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("activity.log");
        let engine = Engine::new(
            CrawlConfig {
                concurrency: 4,
                ..config()
            },
            Arc::new(StaticFetcher::catalogue()),
            Arc::new(MemoryStore::new()),
        )
        .with_activity_log(ActivityLogger::at(&log_path));

        let report = engine.run().await.unwrap();

        let lines = ActivityLogger::at(&log_path).read_logs(None, false).unwrap();
        assert_eq!(lines.len(), report.outcomes.len());
        assert_eq!(
            ActivityLogger::at(&log_path)
                .read_logs(Some("science"), true)
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_links_sharing_a_blob_name_are_reported() {
        let other = "https://mirror.example.org/en/undergraduate/science/programs/biology/biology-bsc/";
        let base_page = format!(
            r#"<a href="/en/undergraduate/science/programs/biology/biology-bsc/">Biology</a>
               <a href="{other}">Biology (mirror)</a>
               <a href="/en/undergraduate/science/programs/physics/physics-bsc/">Physics</a>"#
        );
        let fetcher = StaticFetcher::catalogue()
            .with(BASE, Ok(base_page))
            .with(other, Ok(program_page("Mirror copy")))
            .with(
                &format!("{BASE}science/programs/physics/physics-bsc/"),
                Ok(program_page("Required: PHYS 101")),
            );
        let store = MemoryStore::new();
        let report = Engine::new(config(), Arc::new(fetcher), Arc::new(store.clone()))
            .run()
            .await
            .unwrap();

        assert_eq!(report.uploaded().count(), 3);
        let shared = report.shared_blob_names();
        assert_eq!(shared.len(), 1);
        assert_eq!(
            shared["science.programs.biology.biology-bsc"],
            vec![
                format!("{BASE}science/programs/biology/biology-bsc/").as_str(),
                other,
            ]
        );
        // Later upload wins.
        assert_eq!(
            record(&store, "science.programs.biology.biology-bsc").html,
            "Mirror copy"
        );
    }

    #[tokio::test]
    async fn test_end_to_end_over_http() {
        let mut server = mockito::Server::new_async().await;
        let base = format!("{}/en/undergraduate/", server.url());

        server
            .mock("GET", "/en/undergraduate/")
            .with_status(200)
            .with_body(
                r#"<a href="/en/undergraduate/science/programs/cs/">CS</a>
                   <a href="/en/undergraduate/science/programs/gone/">Gone</a>"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/en/undergraduate/science/programs/cs/")
            .with_status(200)
            .with_body(program_page("Required: COMP 202<br/>COMP 250"))
            .create_async()
            .await;
        server
            .mock("GET", "/en/undergraduate/science/programs/gone/")
            .with_status(404)
            .create_async()
            .await;

        let cfg = CrawlConfig {
            base_url: base.clone(),
            departments: vec![Department::new("science", "science/programs")],
            timeout_ms: 5_000,
            store: StoreConfig::Memory,
            ..CrawlConfig::default()
        };
        let fetcher = HttpFetcher::new(FetchOptions::default().with_timeout(Duration::from_secs(5)))
            .unwrap();
        let store = MemoryStore::new();
        let report = Engine::new(cfg, Arc::new(fetcher), Arc::new(store.clone()))
            .run()
            .await
            .unwrap();

        assert_eq!(report.uploaded().count(), 1);
        assert_eq!(
            report.outcomes[1].status,
            LinkStatus::Failed {
                stage: Stage::Fetch,
                error: "http status 404".into()
            }
        );
        let cs = record(&store, "science.programs.cs");
        assert_eq!(cs.link, format!("{base}science/programs/cs/"));
        assert_eq!(cs.html, "Required: COMP 202COMP 250");
    }
}
