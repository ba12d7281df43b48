//! A line-delimited file source (§6 "File source persistence"): reads
//! newline-terminated records from a file, optionally persisting a
//! sibling `<data>.readpointer` file so a `Committed` reader resumes where
//! a previous run left off.
//!
//! Minimal and line-oriented by design — this exists only to exercise the
//! replay-strategy invariants in §8 scenarios #3 and #4, not as a general
//! file-tailing library.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::lifecycle::LifecycleHooks;
use crate::publisher::QueuePublisher;
use crate::source::{EventSource, SourceLifecycle, SourceObject, SourceState, WorkerSource};
use crate::subscription::SubscriptionKey;

/// §6 / §9: five read strategies, including the documented `OnceLatest`
/// quirk — preserved as tested, not "fixed" (§9 open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    Earliest,
    Committed,
    Latest,
    OnceEarliest,
    OnceLatest,
}

fn read_pointer_path(data_path: &Path) -> PathBuf {
    let mut name = data_path.as_os_str().to_owned();
    name.push(".readpointer");
    PathBuf::from(name)
}

/// Reads newline-delimited lines from `path`, publishing each as a raw
/// `String` event. Driven by a hosting agent's `doWork` loop
/// (`WorkerSource::do_work`).
pub struct FileSource {
    path: PathBuf,
    strategy: ReadStrategy,
    offset: u64,
    exhausted: bool,
    publisher: Option<Arc<QueuePublisher<String>>>,
    lifecycle: SourceLifecycle,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, strategy: ReadStrategy) -> Self {
        FileSource {
            path: path.into(),
            strategy,
            offset: 0,
            exhausted: false,
            publisher: None,
            lifecycle: SourceLifecycle::new(),
        }
    }

    fn commit_offset(&self) {
        if self.strategy != ReadStrategy::Committed {
            return;
        }
        if let Ok(mut f) = File::create(read_pointer_path(&self.path)) {
            let _ = write!(f, "{}", self.offset);
        }
    }

    fn load_committed_offset(&self) -> u64 {
        fs::read_to_string(read_pointer_path(&self.path))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }
}

impl LifecycleHooks for FileSource {
    fn start(&mut self) {
        self.offset = match self.strategy {
            ReadStrategy::Earliest | ReadStrategy::OnceEarliest => 0,
            ReadStrategy::Committed => self.load_committed_offset(),
            ReadStrategy::Latest => fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
            ReadStrategy::OnceLatest => {
                self.exhausted = true;
                fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
            }
        };
        self.lifecycle.set(SourceState::Started);
    }

    fn start_complete(&mut self) {
        self.lifecycle.set(SourceState::StartCompleted);
        if let Some(publisher) = &self.publisher {
            publisher.mark_start_complete();
        }
    }

    fn stop(&mut self) {
        self.commit_offset();
        self.lifecycle.set(SourceState::Stopped);
    }

    fn tear_down(&mut self) {
        self.lifecycle.set(SourceState::TornDown);
    }
}

impl EventSource<String> for FileSource {
    fn subscribe(&mut self, _key: &SubscriptionKey) {}
    fn unsubscribe(&mut self, _key: &SubscriptionKey) {}

    fn set_publisher(&mut self, publisher: Arc<QueuePublisher<String>>) {
        self.publisher = Some(publisher);
    }
}

impl WorkerSource for FileSource {
    fn do_work(&mut self) -> usize {
        if self.exhausted {
            return 0;
        }
        let Some(publisher) = self.publisher.clone() else {
            return 0;
        };

        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return 0,
        };
        if file.seek(SeekFrom::Start(self.offset)).is_err() {
            return 0;
        }
        let mut buf = String::new();
        if file.read_to_string(&mut buf).is_err() {
            return 0;
        }
        if buf.is_empty() {
            return 0;
        }

        // Only complete (newline-terminated) lines are consumed; a
        // trailing partial line is left for the next cycle.
        let complete_len = match buf.rfind('\n') {
            Some(idx) => idx + 1,
            None => return 0,
        };
        let mut count = 0;
        for line in buf[..complete_len].lines() {
            publisher.publish(line.to_string());
            count += 1;
        }
        self.offset += complete_len as u64;
        self.commit_offset();

        if matches!(self.strategy, ReadStrategy::OnceEarliest) {
            self.exhausted = true;
        }
        count
    }
}

impl SourceObject<String> for FileSource {
    fn as_worker(&mut self) -> Option<&mut dyn WorkerSource> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::queue;
    use crate::event::Dispatched;
    use std::io::Write as _;

    fn publisher_with_sink() -> (Arc<QueuePublisher<String>>, queue::QueueConsumer<Dispatched<String>>) {
        let publisher = Arc::new(QueuePublisher::new("file-feed", None));
        let (producer, consumer) = queue::bounded(64);
        publisher.add_target_queue("consumer", producer);
        (publisher, consumer)
    }

    #[test]
    fn earliest_strategy_drains_across_two_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.log");
        fs::write(&path, "a1\na2\n").unwrap();

        let mut source = FileSource::new(&path, ReadStrategy::Earliest);
        let (publisher, consumer) = publisher_with_sink();
        source.set_publisher(publisher);
        source.start();
        source.start_complete();

        source.do_work();
        let mut first = Vec::new();
        consumer.drain_to(10, |d| first.push(d.into_inner()));
        assert_eq!(first, vec!["a1", "a2"]);

        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "a3").unwrap();
        writeln!(f, "a4").unwrap();

        source.do_work();
        let mut second = Vec::new();
        consumer.drain_to(10, |d| second.push(d.into_inner()));
        assert_eq!(second, vec!["a3", "a4"]);
    }

    #[test]
    fn committed_strategy_resumes_from_persisted_offset_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.log");
        fs::write(&path, "c1\nc2\nc3\n").unwrap();

        {
            let mut run1 = FileSource::new(&path, ReadStrategy::Committed);
            let (publisher, consumer) = publisher_with_sink();
            run1.set_publisher(publisher);
            run1.start();
            run1.start_complete();
            run1.do_work();
            let mut drained = Vec::new();
            consumer.drain_to(10, |d| drained.push(d.into_inner()));
            assert_eq!(drained, vec!["c1", "c2", "c3"]);
            run1.stop();
        }

        let mut run2 = FileSource::new(&path, ReadStrategy::Committed);
        let (publisher, consumer) = publisher_with_sink();
        run2.set_publisher(publisher);
        run2.start();
        run2.start_complete();

        run2.do_work();
        assert!(consumer.is_empty(), "nothing new before the append");

        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "c4").unwrap();

        run2.do_work();
        let mut drained = Vec::new();
        consumer.drain_to(10, |d| drained.push(d.into_inner()));
        assert_eq!(drained, vec!["c4"]);
    }

    #[test]
    fn once_latest_never_emits_even_after_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.log");
        fs::write(&path, "z1\n").unwrap();

        let mut source = FileSource::new(&path, ReadStrategy::OnceLatest);
        let (publisher, consumer) = publisher_with_sink();
        source.set_publisher(publisher);
        source.start();
        source.start_complete();

        source.do_work();
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "z2").unwrap();
        source.do_work();

        assert!(consumer.is_empty());
    }
}
