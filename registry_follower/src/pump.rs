use changes_stream2::{ChangeEvent, Event};
use chrono::Utc;
use futures_util::stream::{Stream, StreamExt};
use log::{debug, error, warn};
use std::fmt::Debug;
use std::io::Write;
use thiserror::Error;

use crate::bound::sequence_number;
use crate::entry::PackageEntry;
use crate::normalize::normalize_document;
use crate::progress::{ProgressReporter, PumpStats};
use crate::relevance::is_relevant;
use crate::sink::{DetachedWriter, EntrySink};

#[derive(Debug, Error)]
pub enum PumpError {
    #[error("feed finished at {last_seq} before reaching seq {end_sequence}")]
    FeedFinished { last_seq: String, end_sequence: u64 },
    #[error("feed error: {0}")]
    Feed(String),
    #[error("feed closed before reaching seq {0}")]
    FeedClosed(u64),
}

/// Where accepted entries go.
pub enum Persistence {
    /// Queued to a background writer; counted as stored once queued.
    Detached(DetachedWriter),
    /// Written before the next event is handled; counted as stored only on success.
    Awaited(Box<dyn EntrySink>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Done,
}

pub struct StreamPump<W: Write> {
    end_sequence: u64,
    stats: PumpStats,
    persistence: Persistence,
    reporter: ProgressReporter<W>,
    done: bool,
}

impl<W: Write> StreamPump<W> {
    pub fn new(end_sequence: u64, persistence: Persistence, reporter: ProgressReporter<W>) -> Self {
        StreamPump {
            end_sequence,
            stats: PumpStats::new(Utc::now()),
            persistence,
            reporter,
            done: false,
        }
    }

    pub fn stats(&self) -> &PumpStats {
        &self.stats
    }

    pub fn reporter(&self) -> &ProgressReporter<W> {
        &self.reporter
    }

    /// Consumes the feed until a change at or past the end sequence arrives.
    pub async fn run<S, E>(&mut self, mut feed: S) -> Result<PumpStats, PumpError>
    where
        S: Stream<Item = Result<Event, E>> + Unpin,
        E: Debug,
    {
        while let Some(event) = feed.next().await {
            match event {
                Ok(Event::Change(change)) => {
                    if self.handle_change(change).await == Step::Done {
                        return Ok(self.stats);
                    }
                }
                Ok(Event::Finished(finished)) => {
                    return Err(PumpError::FeedFinished {
                        last_seq: finished.last_seq.to_string(),
                        end_sequence: self.end_sequence,
                    });
                }
                Err(err) => return Err(PumpError::Feed(format!("{:?}", err))),
            }
        }
        Err(PumpError::FeedClosed(self.end_sequence))
    }

    pub async fn handle_change(&mut self, change: ChangeEvent) -> Step {
        if self.done {
            return Step::Done;
        }
        self.stats.processed += 1;

        match sequence_number(&change.seq) {
            Some(seq) if seq >= self.end_sequence => {
                self.done = true;
                if let Err(e) = self.reporter.finish(&self.stats) {
                    warn!("Failed to write completion message: {}", e);
                }
                return Step::Done;
            }
            Some(seq) => self.ingest(seq, &change).await,
            None => error!("Change for {} has an unreadable seq: {}", change.id, change.seq),
        }

        if let Err(e) = self.reporter.tick(&self.stats) {
            warn!("Failed to write progress: {}", e);
        }
        Step::Continue
    }

    async fn ingest(&mut self, seq: u64, change: &ChangeEvent) {
        let doc = match &change.doc {
            Some(doc) if !change.deleted => doc,
            _ => {
                debug!("Skipping deleted package {} (seq = {})", change.id, seq);
                return;
            }
        };
        if change.id.starts_with("_design/") {
            debug!("Skipping design document {} (seq = {})", change.id, seq);
            return;
        }

        match normalize_document(doc) {
            Ok(Some(entry)) if is_relevant(Some(&entry)) => self.persist(seq, entry).await,
            Ok(_) => {}
            Err(e) => error!(
                "Failed to normalize {} (seq = {}): {}\n{}",
                change.id,
                seq,
                e,
                serde_json::to_string(doc).unwrap_or_default()
            ),
        }
    }

    async fn persist(&mut self, seq: u64, entry: PackageEntry) {
        let id = entry.id.clone();
        let stored = match &mut self.persistence {
            Persistence::Detached(writer) => writer.submit(entry),
            Persistence::Awaited(sink) => sink.store(&entry).await,
        };
        match stored {
            Ok(()) => self.stats.stored += 1,
            Err(e) => error!("Failed to store {} (seq = {}): {}", id, seq, e),
        }
    }
}
