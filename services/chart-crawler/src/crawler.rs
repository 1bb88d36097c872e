//!
//! src/crawler.rs  Andrew Belles  Oct 5th, 2025
//!
//! Defines the crawler: one serialized fetch -> load -> merge -> retain ->
//! persist cycle, and the periodic loop that drives it.
//!
//! Nothing inside a cycle escapes as an error. A failed fetch degrades to
//! zero candidates, a failed persist is logged and reported, and the next
//! tick retries naturally.
//!

use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio::{sync::Mutex, time::{interval, timeout, MissedTickBehavior}};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::fetch::SourceProvider;
use crate::matcher::Roster;
use crate::merge::{merge, MergeStats};
use crate::notify::{spawn_notify, Notifier};
use crate::retention::RetentionPolicy;
use crate::store::RecordStore;
use crate::types::RawCandidate;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub source_ok: bool,
    pub merge: MergeStats,
    pub dropped: usize,
    pub kept: usize,
    pub persisted: bool
}

pub struct Crawler {
    source: Arc<dyn SourceProvider>,
    store: RecordStore,
    roster: Arc<Roster>,
    policy: Arc<dyn RetentionPolicy>,
    clock: Arc<dyn Clock>,
    notifier: Option<Arc<dyn Notifier>>,
    fetch_timeout: Duration,

    // one cycle at a time: the store is read-modify-write
    cycle_lock: Mutex<()>,
    shutdown: CancellationToken
}

impl Crawler {
    pub fn new(
        source: Arc<dyn SourceProvider>,
        store: RecordStore,
        roster: Roster,
        policy: Arc<dyn RetentionPolicy>,
        clock: Arc<dyn Clock>,
        fetch_timeout: Duration
    ) -> Self {
        Self {
            source,
            store,
            roster: Arc::new(roster),
            policy,
            clock,
            notifier: None,
            fetch_timeout,
            cycle_lock: Mutex::new(()),
            shutdown: CancellationToken::new()
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn shutdown(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    async fn fetch_candidates(&self) -> Option<Vec<RawCandidate>> {
        match timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(Ok(rows)) => Some(rows),
            Ok(Err(e)) => {
                warn!(error = %e, "crawler.fetch.failed");
                None
            }
            Err(_) => {
                warn!(timeout_ms = self.fetch_timeout.as_millis() as u64, "crawler.fetch.timeout");
                None
            }
        }
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let span = info_span!("cycle", run_id = %Uuid::new_v4());
        async {
            let _guard = self.cycle_lock.lock().await;
            info!("crawler.cycle.start");

            let fetched = self.fetch_candidates().await;
            let source_ok = fetched.is_some();
            let fetched = fetched.unwrap_or_default();

            let existing = self.store.load();
            let now = self.clock.now();
            let (merged, stats) = merge(existing, &fetched, &self.roster, &now);

            let before = merged.releases.len();
            let mut snapshot = merged;
            snapshot.releases = self.policy.apply(snapshot.releases, &now);

            let mut report = CycleReport {
                fetched: fetched.len(),
                source_ok,
                merge: stats,
                dropped: before - snapshot.releases.len(),
                kept: snapshot.releases.len(),
                persisted: false
            };

            match self.store.save(&snapshot) {
                Ok(()) => {
                    report.persisted = true;
                    if let Some(notifier) = &self.notifier {
                        spawn_notify(
                            notifier.clone(),
                            PathBuf::from(self.store.path()),
                            snapshot.updated_at.clone()
                        );
                    }
                }
                Err(e) => {
                    error!(error = %e, path = %self.store.path().display(), "crawler.persist.failed");
                }
            }

            info!(
                fetched = report.fetched,
                source_ok = report.source_ok,
                added = report.merge.added,
                duplicates = report.merge.duplicates,
                malformed = report.merge.malformed,
                dropped = report.dropped,
                kept = report.kept,
                persisted = report.persisted,
                "crawler.cycle.done"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Cycle now, then every `every` until cancelled or Ctrl-C
    pub async fn run(self: Arc<Self>, every: Duration) {
        info!(interval_secs = every.as_secs(), "crawler.start");

        let shutdown = self.shutdown.clone();
        let trigger = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(msg = "shutting crawler daemon down", "crawler.signal");
                shutdown.cancel();
            }
        });

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(reason = "shutdown token", "crawler.stop");
                    break;
                }
                _ = ticker.tick() => {
                    let _ = self.run_cycle().await;
                }
            }
        }

        trigger.abort();
        info!("crawler.exit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{localize, FixedClock, RefTime};
    use crate::errors::CrawlerError;
    use crate::matcher::NameRule;
    use crate::retention::AgingPolicy;
    use crate::types::{Release, Snapshot};
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StubSource(Vec<RawCandidate>);

    #[async_trait]
    impl SourceProvider for StubSource {
        async fn fetch(&self) -> Result<Vec<RawCandidate>, CrawlerError> {
            Ok(self.0.clone())
        }
    }

    struct DownSource;

    #[async_trait]
    impl SourceProvider for DownSource {
        async fn fetch(&self) -> Result<Vec<RawCandidate>, CrawlerError> {
            Err(CrawlerError::Source("listing returned 503".to_string()))
        }
    }

    struct SlowSource;

    #[async_trait]
    impl SourceProvider for SlowSource {
        async fn fetch(&self) -> Result<Vec<RawCandidate>, CrawlerError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    struct CountingNotifier(AtomicUsize);

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(&self, _: &std::path::Path, _: &str) -> Result<(), CrawlerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn now() -> RefTime {
        localize(
            &NaiveDateTime::parse_from_str("2025-10-05 09:30:12", "%Y-%m-%d %H:%M:%S").unwrap()
        ).unwrap()
    }

    fn candidate(key: &str, artist: &str) -> RawCandidate {
        RawCandidate {
            artist_raw: Some(artist.to_string()),
            title_raw: Some(format!("TITLE {key}")),
            image_url: Some("https://image.example/c.jpg".to_string()),
            identity_key: Some(key.to_string()),
        }
    }

    fn crawler(source: Arc<dyn SourceProvider>, dir: &TempDir) -> Crawler {
        Crawler::new(
            source,
            RecordStore::new(dir.path().join("songs_data.json")),
            Roster::new(vec!["IU".into()], vec![NameRule::new("IU", "아이유")]),
            Arc::new(AgingPolicy::default()),
            Arc::new(FixedClock(now())),
            Duration::from_millis(200)
        )
    }

    fn stored(key: &str, found_at: &str, tracked: bool) -> Release {
        Release {
            artist_display: "someone".to_string(),
            title: "t".to_string(),
            image_url: String::new(),
            identity_key: key.to_string(),
            discovered_at: found_at.to_string(),
            is_tracked: tracked,
            artist_raw: None,
        }
    }

    #[tokio::test]
    async fn first_cycle_on_empty_store() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(StubSource(vec![candidate("k1", "IU"), candidate("k2", "XIUMIN")]));
        let crawler = crawler(source, &dir);

        let report = crawler.run_cycle().await;
        assert!(report.source_ok && report.persisted);
        assert_eq!(report.merge.added, 2);

        let snap = crawler.store().load();
        assert_eq!(snap.updated_at, "2025-10-05 09:30:12");
        assert_eq!(snap.releases.len(), 2);
        assert!(snap.releases[0].is_tracked);
        assert_eq!(snap.releases[0].artist_display, "아이유");
        assert_eq!(snap.releases[0].title, "k1");
        assert!(!snap.releases[1].is_tracked);
        assert_eq!(snap.releases[1].artist_display, "XIUMIN");
    }

    #[tokio::test]
    async fn repeated_cycles_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(StubSource(vec![candidate("k1", "IU"), candidate("k2", "aespa")]));
        let crawler = crawler(source, &dir);

        crawler.run_cycle().await;
        let first = crawler.store().load();
        let report = crawler.run_cycle().await;

        assert_eq!(report.merge.added, 0);
        assert_eq!(report.merge.duplicates, 2);
        assert_eq!(crawler.store().load().releases, first.releases);
    }

    #[tokio::test]
    async fn failed_fetch_still_applies_retention() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path().join("songs_data.json"));
        store.save(&Snapshot {
            updated_at: "2025-10-04 22:00:00".to_string(),
            tracked_artist_names: Vec::new(),
            releases: vec![
                stored("yesterday", "2025-10-04 22:00", false),
                stored("today", "2025-10-05 08:00", false),
                stored("tracked", "2025-08-01 08:00", true),
                stored("ancient", "2025-01-01 08:00", true),
                stored("garbled", "last tuesday", false),
            ],
        }).unwrap();

        let crawler = crawler(Arc::new(DownSource), &dir);
        let report = crawler.run_cycle().await;

        assert!(!report.source_ok);
        assert!(report.persisted);
        assert_eq!(report.dropped, 2);

        let keys: Vec<_> = crawler.store().load().releases
            .into_iter().map(|r| r.identity_key).collect();
        assert_eq!(keys, vec!["today", "tracked", "garbled"]);
    }

    #[tokio::test]
    async fn slow_source_times_out_to_empty() {
        let dir = TempDir::new().unwrap();
        let crawler = crawler(Arc::new(SlowSource), &dir);
        let report = crawler.run_cycle().await;
        assert!(!report.source_ok);
        assert_eq!(report.fetched, 0);
        assert!(report.persisted);
    }

    #[tokio::test]
    async fn corrupt_store_starts_fresh() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("songs_data.json"), "not json").unwrap();
        let crawler = crawler(Arc::new(StubSource(vec![candidate("k1", "IU")])), &dir);

        let report = crawler.run_cycle().await;
        assert!(report.persisted);
        assert_eq!(crawler.store().load().releases.len(), 1);
    }

    #[tokio::test]
    async fn persist_failure_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a dir").unwrap();

        let notifier = Arc::new(CountingNotifier(AtomicUsize::new(0)));
        let crawler = Crawler::new(
            Arc::new(StubSource(vec![candidate("k1", "IU")])),
            RecordStore::new(blocker.join("songs_data.json")),
            Roster::default(),
            Arc::new(AgingPolicy::default()),
            Arc::new(FixedClock(now())),
            Duration::from_millis(200)
        ).with_notifier(notifier.clone());

        let report = crawler.run_cycle().await;
        assert!(!report.persisted);
        tokio::task::yield_now().await;
        assert_eq!(notifier.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_cycles_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(StubSource(vec![candidate("k1", "IU"), candidate("k2", "IU")]));
        let crawler = Arc::new(crawler(source, &dir));

        let (a, b) = tokio::join!(crawler.run_cycle(), crawler.run_cycle());
        assert_eq!(a.merge.added + b.merge.added, 2);
        assert_eq!(crawler.store().load().releases.len(), 2);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let crawler = Arc::new(crawler(Arc::new(StubSource(vec![candidate("k1", "IU")])), &dir));
        let shutdown = crawler.shutdown();

        let handle = tokio::spawn(crawler.clone().run(Duration::from_secs(3600)));
        // first tick fires immediately; wait for it to land on disk
        for _ in 0..100 {
            if crawler.store().path().exists() { break; }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(crawler.store().load().releases.len(), 1);
    }
}
