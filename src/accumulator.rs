//!
//! src/accumulator.rs  Andrew Belles  Oct 3rd, 2025
//!
//! Channel-backed sink that every harvester of a pass appends into;
//! drained once, after the pass' join barrier
//!

use tokio::sync::mpsc;

use crate::types::{SourceRecordSet, SourceTag};

/// Cloned into each worker; sending never blocks
#[derive(Debug)]
pub struct Appender<R> {
    tx: mpsc::UnboundedSender<R>
}

impl<R> Clone for Appender<R> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<R> Appender<R> {
    /// Only fails if the accumulator was already dropped, in which case
    /// nobody is left to read the record
    pub fn append(&self, record: R) -> bool {
        self.tx.send(record).is_ok()
    }

    pub fn extend<I: IntoIterator<Item = R>>(&self, records: I) -> usize {
        records.into_iter().map(|r| self.append(r)).filter(|sent| *sent).count()
    }
}

#[derive(Debug)]
pub struct Accumulator<R> {
    source: SourceTag,
    rx: mpsc::UnboundedReceiver<R>
}

impl<R> Accumulator<R> {
    pub fn new(source: SourceTag) -> (Self, Appender<R>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { source, rx }, Appender { tx })
    }

    /// Resolves once every appender has been dropped
    pub async fn drain(mut self) -> SourceRecordSet<R> {
        let mut set = SourceRecordSet::new(self.source);
        while let Some(record) = self.rx.recv().await {
            set.records.push(record);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_waits_for_every_appender() {
        let (acc, appender) = Accumulator::new(SourceTag::Spotify);
        let second = appender.clone();
        assert!(appender.append(1));
        drop(appender);
        assert_eq!(second.extend([2, 3]), 2);
        drop(second);

        let mut set = acc.drain().await;
        set.records.sort();
        assert_eq!(set.records, vec![1, 2, 3]);
        assert_eq!(set.source, SourceTag::Spotify);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_lose_nothing() {
        let (acc, appender) = Accumulator::new(SourceTag::Spotify);
        let mut handles = Vec::new();
        for worker in 0..8_u32 {
            let appender = appender.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..250_u32 {
                    appender.append(worker * 1000 + i);
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        drop(appender);
        for h in handles {
            h.await.unwrap();
        }

        let mut concurrent = acc.drain().await.records;
        concurrent.sort();

        let (acc, appender) = Accumulator::new(SourceTag::Spotify);
        for worker in 0..8_u32 {
            appender.extend((0..250_u32).map(|i| worker * 1000 + i));
        }
        drop(appender);
        let mut sequential = acc.drain().await.records;
        sequential.sort();

        assert_eq!(concurrent.len(), 2000);
        assert_eq!(concurrent, sequential);
    }
}
