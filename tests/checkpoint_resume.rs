//! An interrupted harvest picks up from its stored final document.

use async_trait::async_trait;
use resilient_harvest::pipeline::{final_name, AcquisitionPipeline, RetryPolicy};
use resilient_harvest::resilience::circuit_breaker::CircuitBreakerConfig;
use resilient_harvest::source::{PageFetch, SourceAdapter};
use resilient_harvest::store::{Completion, DurableStore, HarvestDocument};
use resilient_harvest::transport::TransportError;
use resilient_harvest::types::Record;
use resilient_harvest::{Error, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A ranking of `total` rows served `page_size` at a time. Pages listed in
/// `broken` always time out.
struct Ranking {
    total: usize,
    page_size: usize,
    broken: Mutex<HashSet<u32>>,
    requested: Mutex<Vec<u32>>,
}

impl Ranking {
    fn new(total: usize, page_size: usize, broken: &[u32]) -> Self {
        Self {
            total,
            page_size,
            broken: Mutex::new(broken.iter().copied().collect()),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn heal(&self) {
        self.broken.lock().unwrap().clear();
    }
}

#[async_trait]
impl SourceAdapter for Ranking {
    async fn fetch_page(&self, _source_id: &str, page: u32) -> Result<PageFetch> {
        self.requested.lock().unwrap().push(page);
        if self.broken.lock().unwrap().contains(&page) {
            return Err(Error::Transport(TransportError::Timeout("upstream stalled".into())));
        }
        let start = (page as usize - 1) * self.page_size;
        let end = (start + self.page_size).min(self.total);
        let records = (start..end)
            .map(|i| {
                Record::new()
                    .with("username", format!("user{}", i + 1))
                    .with("rank", (i + 1) as u64)
            })
            .collect();
        Ok(PageFetch::new(records))
    }

    fn name(&self) -> &str {
        "ranking"
    }
}

fn pipeline(source: Arc<Ranking>, store: Arc<DurableStore>) -> AcquisitionPipeline {
    AcquisitionPipeline::builder()
        .source(source)
        .store(store)
        .checkpoint_every(2)
        .circuit_breaker(CircuitBreakerConfig::new().with_failure_threshold(50))
        .retry_policy(
            RetryPolicy::new()
                .with_max_retries(1)
                .with_base_delay(Duration::from_secs(2)),
        )
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_resume_after_retry_budget_exhaustion() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DurableStore::open(dir.path()).unwrap());
    let source = Arc::new(Ranking::new(110, 25, &[4]));

    let first = pipeline(source.clone(), store.clone())
        .run("biweekly-contest-150", 25, 100)
        .await
        .unwrap();
    assert_eq!(first.records.len(), 75);
    assert!(matches!(
        first.completion,
        Some(Completion::RetryBudgetExhausted { page: 4, attempts: 2, .. })
    ));

    let stored: HarvestDocument = store.read(&final_name("biweekly-contest-150")).unwrap();
    assert!(!stored.is_complete());
    assert_eq!(stored.total_records, 75);
    assert!(store.path_of("biweekly-contest-150-progress-page-2.json").exists());

    source.heal();
    source.requested.lock().unwrap().clear();

    let second = pipeline(source.clone(), store.clone())
        .resume(stored, 100)
        .await
        .unwrap();
    assert_eq!(*source.requested.lock().unwrap(), vec![4, 5]);
    assert_eq!(second.records.len(), 110);
    assert!(second.is_complete());
    assert_eq!(second.run_id, first.run_id);

    // counters cover both segments of the run
    assert_eq!(first.stats.requests, 5);
    assert_eq!(first.stats.errors, 2);
    assert_eq!(second.stats.pages, 5);
    assert_eq!(second.stats.requests, 7);
    assert_eq!(second.stats.errors, 2);
    assert_eq!(second.stats.started_at, first.stats.started_at);

    let ranks: Vec<u64> = second.records.iter().filter_map(Record::rank).collect();
    assert_eq!(ranks, (1..=110).collect::<Vec<u64>>());

    // the earlier incomplete final document was backed up before being replaced
    assert_eq!(store.backups(&final_name("biweekly-contest-150")).len(), 1);
    let fin: HarvestDocument = store.read(&final_name("biweekly-contest-150")).unwrap();
    assert!(fin.is_complete());
    assert_eq!(fin.stats.requests, 7);
}
