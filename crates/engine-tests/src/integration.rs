#[cfg(test)]
mod tests {
    use crate::{
        ACCESS_TOKEN,
        utils::{
            PagedApi, cursor_for, driver, page_body, page_key, read_checkpoint, settings,
            state_key, throttled,
        },
    };
    use engine_core::blob::{fs::FsBlobStore, memory::MemoryBlobStore, sled_store::SledBlobStore};
    use engine_processing::{driver::DriverPhase, logger::JobLogger, report::RunOutcome};
    use std::sync::Arc;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    // Scenario: three pages, page 2 is throttled twice before it succeeds.
    // Expected Outcome:
    // - All three pages are persisted, page 2 exactly once.
    // - The default stride of 100 is never reached, so the only checkpoint
    //   write is the final one, pointing past the last page.
    // - Nothing is logged at ERROR.
    #[traced_test]
    #[tokio::test]
    async fn three_pages_with_throttling() {
        let api = PagedApi::new(3);
        api.fail_page(2, throttled());
        api.fail_page(2, throttled());
        let blobs = Arc::new(MemoryBlobStore::new());

        let mut driver = driver(settings(), api.clone(), blobs.clone());
        let report = driver.run().await;

        assert!(report.is_success(), "run failed: {:?}", report.error);
        assert_eq!(report.exit_code().as_i32(), 0);
        assert_eq!(driver.phase(), DriverPhase::Done);
        assert_eq!(report.pages_fetched, 3);
        assert_eq!(report.pages_written, 3);

        assert_eq!(api.requested_pages(), vec![1, 2, 2, 2, 3]);
        assert_eq!(
            blobs.keys(),
            vec![page_key(1), page_key(2), page_key(3), state_key()]
        );
        assert_eq!(blobs.put_count(&page_key(2)), 1);
        assert_eq!(blobs.get(&page_key(2)).unwrap(), page_body(2, 3).as_bytes());

        assert_eq!(blobs.put_count(&state_key()), 1);
        let checkpoint = read_checkpoint(&blobs.get(&state_key()).unwrap());
        assert_eq!(checkpoint["page_number"], 4);
        assert_eq!(checkpoint["after"], "");

        assert!(logs_contain("Recoverable failure, backing off"));
        assert!(logs_contain("page=2"));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains("ERROR")).count() {
                0 => Ok(()),
                n => Err(format!("expected no ERROR events, found {n}")),
            }
        });
    }

    // Scenario: the access token travels as a query parameter on every request.
    // Expected Outcome: it never reaches the checkpoint, a page key or the logs.
    #[traced_test]
    #[tokio::test]
    async fn credential_stays_out_of_storage_and_logs() {
        let api = PagedApi::new(2);
        api.fail_page(1, throttled());
        let blobs = Arc::new(MemoryBlobStore::new());

        let report = driver(settings(), api.clone(), blobs.clone()).run().await;
        assert_eq!(report.outcome, RunOutcome::Done);

        for query in api.requests() {
            assert!(query.contains(&("access_token".to_string(), ACCESS_TOKEN.to_string())));
            assert!(query.contains(&("fields".to_string(), "id,name".to_string())));
        }

        let checkpoint = blobs.get(&state_key()).unwrap();
        assert!(!String::from_utf8_lossy(&checkpoint).contains(ACCESS_TOKEN));
        assert!(blobs.keys().iter().all(|k| !k.contains(ACCESS_TOKEN)));
        assert!(!logs_contain(ACCESS_TOKEN));
        assert!(!format!("{:?}", settings()).contains(ACCESS_TOKEN));
    }

    // Scenario: each request after the first carries the cursor returned by
    // the previous page.
    #[traced_test]
    #[tokio::test]
    async fn cursor_chains_between_pages() {
        let api = PagedApi::new(3);
        let blobs = Arc::new(MemoryBlobStore::new());

        driver(settings(), api.clone(), blobs).run().await;

        let requests = api.requests();
        assert!(requests[0].iter().all(|(k, _)| k != "after"));
        assert!(requests[1].contains(&("after".to_string(), cursor_for(2))));
        assert!(requests[2].contains(&("after".to_string(), cursor_for(3))));
    }

    // Scenario: same run against a directory-backed store.
    // Expected Outcome: pages and checkpoint exist as files, no temp files remain.
    #[traced_test]
    #[tokio::test]
    async fn persists_to_filesystem() {
        let dir = tempdir().unwrap();
        let blobs = Arc::new(FsBlobStore::new(dir.path()));
        let api = PagedApi::new(3);

        let report = driver(settings(), api, blobs).run().await;
        assert!(report.is_success());

        let job_dir = dir.path().join("ads");
        let mut files: Vec<String> = std::fs::read_dir(&job_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(files, vec!["1.json", "2.json", "3.json", "_state.json"]);

        let page = std::fs::read_to_string(job_dir.join("3.json")).unwrap();
        assert_eq!(page, page_body(3, 3));

        let checkpoint = std::fs::read(job_dir.join("_state.json")).unwrap();
        assert_eq!(read_checkpoint(&checkpoint)["page_number"], 4);
    }

    // Scenario: a second process opens the same sled database after the first
    // one finished.
    // Expected Outcome: the final checkpoint marks the stream as complete, so
    // the second run fetches nothing and leaves the stored pages alone.
    #[traced_test]
    #[tokio::test]
    async fn sled_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blobs");

        {
            let blobs = Arc::new(SledBlobStore::open(&path).unwrap());
            let report = driver(settings(), PagedApi::new(2), blobs).run().await;
            assert!(report.is_success());
        }

        let blobs = Arc::new(SledBlobStore::open(&path).unwrap());
        let api = PagedApi::new(2);
        let report = driver(settings(), api.clone(), blobs).run().await;

        assert!(logs_contain("Resuming from page 3"));
        assert!(logs_contain("nothing to fetch"));
        assert!(api.requests().is_empty());
        assert!(report.is_success());
        assert_eq!(report.pages_fetched, 0);
    }

    // Scenario: the host supplies its own logger tag for a backfill run.
    // Expected Outcome: driver events carry the host's tag and the page.
    #[traced_test]
    #[tokio::test]
    async fn host_logger_tags_events() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let api = PagedApi::new(2);

        let report = driver(settings(), api, blobs)
            .with_logger(JobLogger::new("ads-backfill"))
            .run()
            .await;

        assert!(report.is_success());
        assert!(logs_contain("job=ads-backfill"));
        logs_assert(|lines: &[&str]| {
            let tagged = lines
                .iter()
                .filter(|l| l.contains("Persisted page") && l.contains("job=ads-backfill"))
                .count();
            match tagged {
                2 => Ok(()),
                n => Err(format!("expected 2 tagged page events, found {n}")),
            }
        });
    }
}
