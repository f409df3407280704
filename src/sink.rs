//! Result sinks: reassemble per-chunk results into file order.
//!
//! Workers finish chunks in arbitrary order; sinks restore the global
//! order using the chunk index as the sole key. The ordered sinks keep a
//! `next_expected` counter and buffer early arrivals until the gap fills.
//! Every chunk index must be pushed exactly once, even with zero results,
//! so the counter always advances; the executor guarantees this.
//!
//! A sink is `OPEN` while readers are still producing, `DRAINING` once
//! the input is exhausted, and `CLOSED` after [`Sink::finish`]. Pushes
//! are valid in the first two states only.

use crate::error::{Result, SearchError};
use crate::output::OutputFormat;
use crate::searcher::{Match, Pattern};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Terminal stage of the pipeline.
pub trait Sink: Send + Sync {
    /// Per-chunk result type accepted by this sink.
    type Item: Send;

    /// Accept the results of chunk `index`. Arbitrary arrival order;
    /// emission order is by index.
    fn push(&self, results: Self::Item, index: u64) -> Result<()>;

    /// The input side is exhausted; only already-queued chunks remain.
    fn begin_drain(&self) {}

    /// Quiesce the sink. After this, further pushes are errors.
    fn finish(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Draining,
    Closed,
}

/// Shared ordering core for the ordered sinks: counter, buffer, phase.
struct Ordered<T> {
    next_expected: u64,
    pending: BTreeMap<u64, T>,
    phase: Phase,
}

impl<T> Ordered<T> {
    fn new() -> Self {
        Ordered {
            next_expected: 0,
            pending: BTreeMap::new(),
            phase: Phase::Open,
        }
    }

    /// Accept chunk `index`; call `emit` for it and any contiguous run it
    /// releases. Returns whether the counter advanced.
    fn accept(
        &mut self,
        index: u64,
        item: T,
        mut emit: impl FnMut(T) -> Result<()>,
    ) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(SearchError::Internal(format!(
                "result for chunk {} pushed after close",
                index
            )));
        }
        if index < self.next_expected || self.pending.contains_key(&index) {
            return Err(SearchError::Internal(format!(
                "duplicate result for chunk {}",
                index
            )));
        }

        if index != self.next_expected {
            self.pending.insert(index, item);
            return Ok(false);
        }

        emit(item)?;
        self.next_expected += 1;
        while let Some(item) = self.pending.remove(&self.next_expected) {
            emit(item)?;
            self.next_expected += 1;
        }
        Ok(true)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(&missing) = self.pending.keys().next() {
            return Err(SearchError::Internal(format!(
                "sink closed while chunk {} is still outstanding (expected {})",
                missing, self.next_expected
            )));
        }
        self.phase = Phase::Closed;
        Ok(())
    }
}

/// Streaming sink: renders matches and writes them in file order.
///
/// Rendering happens before the lock is taken; workers hold the mutex
/// only to splice their already-formatted bytes into the output stream.
pub struct StreamSink<W: Write + Send> {
    format: OutputFormat,
    pattern: Option<Arc<Pattern>>,
    matched: AtomicU64,
    state: Mutex<StreamState<W>>,
    advanced: Condvar,
}

struct StreamState<W> {
    writer: W,
    ordered: Ordered<Vec<u8>>,
}

impl<W: Write + Send> StreamSink<W> {
    /// Create a streaming sink writing rendered results to `writer`.
    /// `pattern` enables occurrence highlighting when color is on.
    pub fn new(writer: W, format: OutputFormat, pattern: Option<Arc<Pattern>>) -> Self {
        StreamSink {
            format,
            pattern,
            matched: AtomicU64::new(0),
            state: Mutex::new(StreamState {
                writer,
                ordered: Ordered::new(),
            }),
            advanced: Condvar::new(),
        }
    }

    /// Number of match records written so far.
    pub fn matched(&self) -> u64 {
        self.matched.load(Ordering::Relaxed)
    }

    /// Block until every chunk up to and including `index` has been
    /// written, or the sink closes.
    pub fn wait_emitted(&self, index: u64) {
        let mut st = self.state.lock().unwrap();
        while st.ordered.next_expected <= index && st.ordered.phase != Phase::Closed {
            st = self.advanced.wait(st).unwrap();
        }
    }

    /// Recover the writer after the pipeline has quiesced.
    pub fn into_writer(self) -> W {
        self.state.into_inner().unwrap().writer
    }
}

impl<W: Write + Send> Sink for StreamSink<W> {
    type Item = Vec<Match>;

    fn push(&self, results: Vec<Match>, index: u64) -> Result<()> {
        let mut buf = Vec::new();
        for m in &results {
            self.format.render(&mut buf, m, self.pattern.as_deref());
        }
        self.matched.fetch_add(results.len() as u64, Ordering::Relaxed);

        let mut st = self.state.lock().unwrap();
        let StreamState { writer, ordered } = &mut *st;
        let advanced = ordered.accept(index, buf, |bytes| {
            writer
                .write_all(&bytes)
                .map_err(|e| SearchError::Io(e.to_string()))
        })?;
        if advanced {
            self.advanced.notify_all();
        }
        Ok(())
    }

    fn begin_drain(&self) {
        let mut st = self.state.lock().unwrap();
        if st.ordered.phase == Phase::Open {
            st.ordered.phase = Phase::Draining;
        }
    }

    fn finish(&self) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        st.ordered.close()?;
        st.writer
            .flush()
            .map_err(|e| SearchError::Io(e.to_string()))?;
        self.advanced.notify_all();
        Ok(())
    }
}

/// In-memory sink: collects matches into one ordered container.
pub struct ContainerSink {
    state: Mutex<ContainerState>,
    advanced: Condvar,
}

struct ContainerState {
    results: Vec<Match>,
    ordered: Ordered<Vec<Match>>,
}

impl ContainerSink {
    /// Create an empty container sink.
    pub fn new() -> Self {
        ContainerSink {
            state: Mutex::new(ContainerState {
                results: Vec::new(),
                ordered: Ordered::new(),
            }),
            advanced: Condvar::new(),
        }
    }

    /// Drain the accumulated, globally ordered results.
    pub fn take_results(&self) -> Vec<Match> {
        std::mem::take(&mut self.state.lock().unwrap().results)
    }
}

impl Default for ContainerSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ContainerSink {
    type Item = Vec<Match>;

    fn push(&self, results: Vec<Match>, index: u64) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        let ContainerState { results: out, ordered } = &mut *st;
        let advanced = ordered.accept(index, results, |mut batch| {
            out.append(&mut batch);
            Ok(())
        })?;
        if advanced {
            self.advanced.notify_all();
        }
        Ok(())
    }

    fn begin_drain(&self) {
        let mut st = self.state.lock().unwrap();
        if st.ordered.phase == Phase::Open {
            st.ordered.phase = Phase::Draining;
        }
    }

    fn finish(&self) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        st.ordered.close()?;
        self.advanced.notify_all();
        Ok(())
    }
}

/// Counting sink: a thread-safe accumulator of per-chunk counts.
///
/// Counts are order-independent, so there is no reordering buffer.
pub struct CountSink {
    total: AtomicU64,
    closed: Mutex<bool>,
}

impl CountSink {
    /// Create a zeroed counting sink.
    pub fn new() -> Self {
        CountSink {
            total: AtomicU64::new(0),
            closed: Mutex::new(false),
        }
    }

    /// The accumulated count.
    pub fn value(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for CountSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for CountSink {
    type Item = u64;

    fn push(&self, count: u64, index: u64) -> Result<()> {
        if *self.closed.lock().unwrap() {
            return Err(SearchError::Internal(format!(
                "count for chunk {} pushed after close",
                index
            )));
        }
        self.total.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(line: i64, text: &str) -> Match {
        Match {
            byte_position: -1,
            line_number: line,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_container_orders_out_of_order_pushes() {
        let sink = ContainerSink::new();
        sink.push(vec![m(3, "late")], 2).unwrap();
        sink.push(vec![m(1, "first")], 0).unwrap();
        sink.push(vec![], 1).unwrap();
        sink.finish().unwrap();

        let results = sink.take_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "first");
        assert_eq!(results[1].text, "late");
    }

    #[test]
    fn test_empty_results_advance_counter() {
        let sink = ContainerSink::new();
        sink.push(vec![], 0).unwrap();
        sink.push(vec![], 1).unwrap();
        sink.push(vec![m(1, "x")], 2).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.take_results().len(), 1);
    }

    #[test]
    fn test_duplicate_index_is_internal_error() {
        let sink = ContainerSink::new();
        sink.push(vec![], 0).unwrap();
        assert!(matches!(
            sink.push(vec![], 0),
            Err(SearchError::Internal(_))
        ));

        let sink = ContainerSink::new();
        sink.push(vec![], 1).unwrap();
        assert!(matches!(
            sink.push(vec![], 1),
            Err(SearchError::Internal(_))
        ));
    }

    #[test]
    fn test_finish_with_gap_fails() {
        let sink = ContainerSink::new();
        sink.push(vec![], 1).unwrap();
        assert!(matches!(sink.finish(), Err(SearchError::Internal(_))));
    }

    #[test]
    fn test_push_after_close_fails() {
        let sink = ContainerSink::new();
        sink.finish().unwrap();
        assert!(matches!(
            sink.push(vec![], 0),
            Err(SearchError::Internal(_))
        ));
    }

    #[test]
    fn test_stream_sink_writes_in_index_order() {
        let sink = StreamSink::new(Vec::new(), OutputFormat::default(), None);
        sink.push(vec![m(-1, "second")], 1).unwrap();
        sink.push(vec![m(-1, "first")], 0).unwrap();
        sink.push(vec![m(-1, "third")], 2).unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.matched(), 3);
        let written = sink.into_writer();
        assert_eq!(written, b"first\nsecond\nthird\n");
    }

    #[test]
    fn test_stream_sink_wait_emitted() {
        let sink = Arc::new(StreamSink::new(Vec::new(), OutputFormat::default(), None));
        let waiter = Arc::clone(&sink);
        let handle = std::thread::spawn(move || waiter.wait_emitted(1));

        sink.push(vec![], 0).unwrap();
        sink.push(vec![], 1).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_count_sink_accumulates() {
        let sink = CountSink::new();
        sink.push(7, 0).unwrap();
        sink.push(0, 1).unwrap();
        sink.push(3, 2).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.value(), 10);
        assert!(sink.push(1, 3).is_err());
    }
}
