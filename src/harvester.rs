//!
//! src/harvester.rs  Andrew Belles  Oct 5th, 2025
//!
//! Runs one harvest pass: partitions the work across the credential pool,
//! drives one worker per credential through its shard and joins them all
//! before the accumulated records are handed back
//!

use std::{sync::Arc, time::Duration};

use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::accumulator::{Accumulator, Appender};
use crate::backoff::{BackoffPolicy, RetryBudget};
use crate::credential::{Credential, CredentialPool};
use crate::errors::HarvestError;
use crate::fetch::CatalogClient;
use crate::partition::{partition, WorkShard};
use crate::types::SourceRecordSet;

#[derive(Debug)]
enum ItemOutcome {
    Success { records: usize },
    Exhausted(HarvestError)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardReport {
    pub shard: usize,
    pub credential: String,
    pub items: usize,
    pub succeeded: usize,
    pub exhausted: usize,
    pub attempts: u32,
    pub records: usize,
    /// `RetryBudgetExhausted` messages, one per skipped item
    pub exhausted_items: Vec<String>
}

impl ShardReport {
    pub fn retry_exceeded(&self) -> bool {
        self.exhausted > 0
    }
}

#[derive(Debug)]
pub struct PassReport<R> {
    pub pass_id: Uuid,
    pub records: SourceRecordSet<R>,
    pub shards: Vec<ShardReport>,
    pub retry_exceeded: bool
}

impl<R> PassReport<R> {
    pub fn exhausted(&self) -> usize {
        self.shards.iter().map(|s| s.exhausted).sum()
    }

    /// `label=exhausted` per shard, in shard order
    pub fn exhausted_by_shard(&self) -> String {
        self.shards.iter()
            .map(|s| format!("{}={}", s.credential, s.exhausted))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Empty harvests are reported, never raised
    pub fn outcome(&self) -> Result<(), HarvestError> {
        if self.records.is_empty() {
            Err(HarvestError::EmptyResult)
        } else {
            Ok(())
        }
    }

    pub fn into_records(self) -> SourceRecordSet<R> {
        self.records
    }
}

pub struct Harvester<C: CatalogClient> {
    client: Arc<C>,
    policy: BackoffPolicy,
    quiescence: Duration
}

impl<C: CatalogClient> Clone for Harvester<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            policy: self.policy.clone(),
            quiescence: self.quiescence
        }
    }
}

impl<C: CatalogClient> Harvester<C> {
    pub fn new(client: Arc<C>, policy: BackoffPolicy, quiescence: Duration) -> Self {
        Self { client, policy, quiescence }
    }

    /// Fan out one worker per credential, join them all, then drain
    pub async fn run_pass(&self, pool: &CredentialPool, items: Vec<C::Item>) ->
        PassReport<C::Record> {
        let pass_id = Uuid::new_v4();
        let source = self.client.source();
        let total = items.len();
        info!(%pass_id, %source, items = total, credentials = pool.len(), "harvest.pass.start");

        let (accumulator, appender) = Accumulator::new(source);
        let mut workers = JoinSet::new();
        for (shard, credential) in partition(items, pool.len()).into_iter().zip(pool.iter()) {
            let this = self.clone();
            let appender = appender.clone();
            let credential = credential.clone();
            let span = info_span!("harvest.shard", %pass_id, shard = shard.index,
                credential = credential.label());
            workers.spawn(
                async move { this.harvest_shard(&credential, shard, appender).await }
                    .instrument(span)
            );
        }
        drop(appender);

        // barrier: nothing is drained until every worker has returned
        let mut shards = Vec::with_capacity(pool.len());
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => shards.push(report),
                Err(e) => error!(%pass_id, error = %e, "harvest.shard.aborted")
            }
        }
        shards.sort_by_key(|r| r.shard);

        let records = accumulator.drain().await;
        let retry_exceeded = shards.iter().any(ShardReport::retry_exceeded);
        info!(
            %pass_id, %source, items = total, records = records.len(),
            retry_exceeded, "harvest.pass.done"
        );

        let report = PassReport { pass_id, records, shards, retry_exceeded };
        info!(%pass_id, exhausted = report.exhausted(),
            by_shard = %report.exhausted_by_shard(), "harvest.pass.exhausted");
        report
    }

    /// Sequentially works one shard on one credential; never fails
    pub async fn harvest_shard(
        &self,
        credential: &Credential,
        shard: WorkShard<C::Item>,
        appender: Appender<C::Record>
    ) -> ShardReport {
        let mut report = ShardReport {
            shard: shard.index,
            credential: credential.label().to_string(),
            items: shard.items.len(),
            ..ShardReport::default()
        };

        for item in &shard.items {
            let mut budget = RetryBudget::new(self.policy.retry_budget());
            match self.harvest_item(credential, item, &appender, &mut budget).await {
                ItemOutcome::Success { records } => {
                    report.succeeded += 1;
                    report.records += records;
                }
                ItemOutcome::Exhausted(error) => {
                    report.exhausted += 1;
                    report.exhausted_items.push(error.to_string());
                }
            }
            report.attempts += budget.attempts();
        }

        debug!(
            credential = credential.label(), items = report.items,
            succeeded = report.succeeded, exhausted = report.exhausted,
            records = report.records, "harvest.shard.done"
        );
        report
    }

    /// Pending -> Fetching -> {Success, Retrying -> Fetching, RetryExhausted}
    async fn harvest_item(
        &self,
        credential: &Credential,
        item: &C::Item,
        appender: &Appender<C::Record>,
        budget: &mut RetryBudget
    ) -> ItemOutcome {
        loop {
            credential.gate().wait().await;
            let attempt = budget.begin_attempt();
            debug!(credential = credential.label(), %item, attempt, "harvest.attempt");

            match self.client.fetch_batch(item, credential).await {
                Ok(records) => {
                    let records = appender.extend(records);
                    debug!(credential = credential.label(), %item, attempt, records,
                        "harvest.item.done");
                    credential.gate().defer(self.quiescence).await;
                    return ItemOutcome::Success { records };
                }
                Err(failure) => {
                    let error = self.policy.classify(failure);
                    let cooldown = self.policy.cooldown(&error);
                    credential.gate().defer(cooldown).await;

                    if !error.is_retryable() || !budget.try_consume() {
                        let exhausted = HarvestError::RetryBudgetExhausted {
                            item: item.to_string(),
                            attempts: attempt
                        };
                        error!(
                            credential = credential.label(), %item, attempts = attempt,
                            status = ?error.status(), last_error = %error,
                            error = %exhausted, "harvest.item.exhausted"
                        );
                        return ItemOutcome::Exhausted(exhausted);
                    }
                    warn!(
                        credential = credential.label(), %item, attempt,
                        status = ?error.status(), cooldown_ms = cooldown.as_millis() as u64,
                        error = %error, "harvest.retry"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::backoff::FetchFailure;
    use crate::config::{ClientSecretPair, CooldownConfig};
    use crate::types::SourceTag;

    /// Replays a per-item script of statuses; items without a script succeed
    struct ScriptedCatalog {
        script: Mutex<HashMap<String, Vec<Option<u16>>>>,
        always_fail: HashMap<String, u16>,
        calls: Mutex<Vec<(String, String, Instant)>>
    }

    impl ScriptedCatalog {
        fn new() -> Self {
            Self {
                script: Mutex::new(HashMap::new()),
                always_fail: HashMap::new(),
                calls: Mutex::new(Vec::new())
            }
        }

        fn failing_then_ok(self, item: &str, statuses: &[u16]) -> Self {
            let steps = statuses.iter().copied().map(Some).collect();
            self.script.lock().unwrap().insert(item.to_string(), steps);
            self
        }

        fn always(mut self, item: &str, status: u16) -> Self {
            self.always_fail.insert(item.to_string(), status);
            self
        }

        fn calls(&self) -> Vec<(String, String, Instant)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CatalogClient for ScriptedCatalog {
        type Item = String;
        type Record = String;

        fn source(&self) -> SourceTag { SourceTag::Spotify }

        async fn fetch_batch(&self, item: &String, credential: &Credential) ->
            Result<Vec<String>, FetchFailure> {
            self.calls.lock().unwrap()
                .push((credential.label().to_string(), item.clone(), Instant::now()));

            if let Some(status) = self.always_fail.get(item) {
                return Err(FetchFailure::status(*status, "scripted"));
            }
            let next = self.script.lock().unwrap()
                .get_mut(item)
                .and_then(|steps| if steps.is_empty() { None } else { Some(steps.remove(0)) })
                .flatten();
            match next {
                Some(status) => Err(FetchFailure::status(status, "scripted")),
                None => Ok(vec![format!("{item}-a"), format!("{item}-b")])
            }
        }
    }

    fn pool(n: usize) -> CredentialPool {
        CredentialPool::new((1..=n)
            .map(|i| Credential::new(
                format!("client-{i}"),
                &ClientSecretPair { client_id: format!("id{i}"), client_secret: "s".into() },
                Duration::ZERO
            ))
            .collect())
    }

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(
            CooldownConfig {
                rate_limited: Duration::from_secs(5),
                unavailable: Duration::from_secs(3),
                unclassified: Duration::from_secs(10)
            },
            10
        )
    }

    fn items(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn two_items_two_credentials_yield_both_batches() {
        let client = Arc::new(ScriptedCatalog::new());
        let harvester = Harvester::new(client.clone(), policy(), Duration::from_millis(8500));

        let report = harvester.run_pass(&pool(2), items(&["p1", "p2"])).await;
        assert!(report.outcome().is_ok());
        assert_eq!(report.records.len(), 4);
        assert!(!report.retry_exceeded);

        let mut calls: Vec<(String, String)> = client.calls().into_iter()
            .map(|(c, i, _)| (c, i))
            .collect();
        calls.sort();
        assert_eq!(calls, vec![
            ("client-1".to_string(), "p1".to_string()),
            ("client-2".to_string(), "p2".to_string())
        ]);
        assert_eq!(report.shards.len(), 2);
        assert!(report.shards.iter().all(|s| s.items == 1 && s.succeeded == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_the_same_item_after_cooldown() {
        let client = Arc::new(ScriptedCatalog::new().failing_then_ok("p1", &[500, 404]));
        let harvester = Harvester::new(client.clone(), policy(), Duration::ZERO);
        let start = Instant::now();

        let report = harvester.run_pass(&pool(1), items(&["p1"])).await;
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.shards[0].attempts, 3);
        assert_eq!(report.shards[0].succeeded, 1);
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_item_is_skipped_and_the_shard_continues() {
        let client = Arc::new(ScriptedCatalog::new().always("bad", 429));
        let harvester = Harvester::new(client.clone(), policy(), Duration::ZERO);

        let report = harvester.run_pass(&pool(1), items(&["p0", "bad", "p2"])).await;
        assert!(report.outcome().is_ok());
        assert!(report.retry_exceeded);

        let shard = &report.shards[0];
        assert_eq!(shard.exhausted, 1);
        assert_eq!(shard.succeeded, 2);
        assert_eq!(report.records.len(), 4);

        let bad_calls = client.calls().iter().filter(|(_, i, _)| i == "bad").count();
        assert_eq!(bad_calls, 11);
        assert!(client.calls().iter().any(|(_, i, _)| i == "p2"));
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
    }

    impl CapturedLog {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn next_item_waits_out_the_cooldown_of_an_exhausted_one() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        let _log_guard = tracing::subscriber::set_default(subscriber);

        let client = Arc::new(ScriptedCatalog::new().always("bad", 429));
        let harvester = Harvester::new(client.clone(), policy(), Duration::ZERO);

        let report = harvester.run_pass(&pool(1), items(&["bad", "next"])).await;
        assert_eq!(report.exhausted(), 1);
        assert_eq!(report.exhausted_by_shard(), "client-1=1");

        let calls = client.calls();
        let last_bad = calls.iter().filter(|(_, i, _)| i == "bad").last()
            .map(|(_, _, t)| *t)
            .unwrap();
        let next_at = calls.iter().find(|(_, i, _)| i == "next").map(|(_, _, t)| *t).unwrap();
        assert!(next_at.duration_since(last_bad) >= Duration::from_secs(5));

        let shard = &report.shards[0];
        assert_eq!(shard.exhausted_items.len(), 1);
        assert!(shard.exhausted_items[0].starts_with("retry budget exhausted for bad"));

        let text = log.text();
        assert!(text.contains("harvest.item.exhausted"));
        assert!(text.contains("retry budget exhausted for bad"));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_item_retries_after_cooldown_before_the_next_item() {
        let client = Arc::new(ScriptedCatalog::new().failing_then_ok("p1", &[429]));
        let harvester = Harvester::new(client.clone(), policy(), Duration::ZERO);

        harvester.run_pass(&pool(1), items(&["p1", "p2"])).await;
        let calls = client.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].1, "p2");
        assert!(calls[1].2.duration_since(calls[0].2) >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_throttles_only_its_own_credential() {
        let client = Arc::new(ScriptedCatalog::new().failing_then_ok("slow", &[429]));
        let harvester = Harvester::new(client.clone(), policy(), Duration::ZERO);
        let start = Instant::now();

        let report = harvester.run_pass(&pool(2), items(&["slow", "fast"])).await;
        assert_eq!(report.records.len(), 4);

        let calls = client.calls();
        let fast_at = calls.iter().find(|(_, i, _)| i == "fast").map(|(_, _, t)| *t).unwrap();
        assert!(fast_at.duration_since(start) < Duration::from_secs(1));

        let slow_retry = calls.iter().filter(|(_, i, _)| i == "slow").nth(1)
            .map(|(_, _, t)| *t)
            .unwrap();
        assert!(slow_retry.duration_since(start) >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn quiescence_spaces_consecutive_items() {
        let client = Arc::new(ScriptedCatalog::new());
        let harvester = Harvester::new(client.clone(), policy(), Duration::from_secs(20));

        harvester.run_pass(&pool(1), items(&["a", "b"])).await;
        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].2.duration_since(calls[0].2) >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_work_reports_empty_result() {
        let client = Arc::new(ScriptedCatalog::new());
        let harvester = Harvester::new(client, policy(), Duration::ZERO);

        let report = harvester.run_pass(&pool(3), Vec::new()).await;
        assert!(matches!(report.outcome(), Err(HarvestError::EmptyResult)));
        assert_eq!(report.shards.len(), 3);
        assert!(report.shards.iter().all(|s| s.items == 0 && s.attempts == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn fewer_items_than_credentials_is_not_an_error() {
        let client = Arc::new(ScriptedCatalog::new());
        let harvester = Harvester::new(client, policy(), Duration::ZERO);

        let report = harvester.run_pass(&pool(4), items(&["only"])).await;
        assert!(report.outcome().is_ok());
        assert_eq!(report.shards.iter().filter(|s| s.items == 0).count(), 3);
    }
}
