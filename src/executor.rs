//! The pipeline driver: readers → bounded chunk queue → workers → sink.
//!
//! The executor launches reader and worker threads at construction and
//! runs the pipeline until the source is exhausted. A bounded channel of
//! capacity `2 × worker_threads` sits between the stages: enough slack to
//! keep workers busy, small enough that the reader cannot race ahead and
//! bloat memory. A full queue blocks readers; a closed, empty queue tells
//! workers to exit.
//!
//! Failure policy: the first error is recorded on the executor and
//! surfaced at [`Executor::join`]. A reader error closes the queue but
//! workers still drain what was queued. A searcher error costs only that
//! chunk's results; an empty result set is pushed in its place so the
//! sink's ordering counter keeps advancing.

use crate::chunk::DataChunk;
use crate::error::{Result, SearchError};
use crate::processor::InplaceProcessor;
use crate::reader::ChunkReader;
use crate::searcher::ChunkSearcher;
use crate::sink::Sink;
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Drives a search pipeline to completion over one input source.
pub struct Executor<K: Sink> {
    sink: Arc<K>,
    cancelled: Arc<AtomicBool>,
    error: Arc<Mutex<Option<SearchError>>>,
    reader_handles: Vec<JoinHandle<()>>,
    worker_handles: Vec<JoinHandle<()>>,
    joined: bool,
}

/// Keep the first error; later ones are casualties of the shutdown.
fn record_error(slot: &Mutex<Option<SearchError>>, err: SearchError) {
    let mut guard = slot.lock().unwrap();
    if guard.is_none() {
        *guard = Some(err);
    }
}

impl<K: Sink + 'static> Executor<K> {
    /// Construct the pipeline and start it.
    ///
    /// `make_processors` is called once per worker thread, so processors
    /// may keep per-worker scratch state. The searcher is shared
    /// read-only. Thread counts are clamped to at least 1.
    pub fn new<S, F>(
        worker_threads: usize,
        reader_threads: usize,
        reader: Arc<dyn ChunkReader>,
        make_processors: F,
        searcher: Arc<S>,
        sink: Arc<K>,
    ) -> Self
    where
        S: ChunkSearcher<Output = K::Item> + 'static,
        F: Fn() -> Vec<Box<dyn InplaceProcessor>> + Send + Sync + 'static,
        K::Item: Default,
    {
        let worker_threads = worker_threads.max(1);
        let reader_threads = reader_threads.max(1);

        let (tx, rx) = bounded::<(DataChunk, u64)>(2 * worker_threads);
        let cancelled = Arc::new(AtomicBool::new(false));
        let error = Arc::new(Mutex::new(None));
        let live_readers = Arc::new(AtomicUsize::new(reader_threads));

        let mut reader_handles = Vec::with_capacity(reader_threads);
        for _ in 0..reader_threads {
            let reader = Arc::clone(&reader);
            let tx = tx.clone();
            let cancelled = Arc::clone(&cancelled);
            let error = Arc::clone(&error);
            let live_readers = Arc::clone(&live_readers);
            let sink = Arc::clone(&sink);

            reader_handles.push(std::thread::spawn(move || {
                while !cancelled.load(Ordering::Relaxed) {
                    match reader.next_chunk() {
                        Ok(Some(pair)) => {
                            // Blocks when the queue is full; fails only if
                            // every worker is gone.
                            if tx.send(pair).is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            record_error(&error, err);
                            break;
                        }
                    }
                }
                drop(tx);
                if live_readers.fetch_sub(1, Ordering::AcqRel) == 1 {
                    sink.begin_drain();
                }
            }));
        }
        drop(tx);

        let make_processors = Arc::new(make_processors);
        let mut worker_handles = Vec::with_capacity(worker_threads);
        for _ in 0..worker_threads {
            let rx = rx.clone();
            let sink = Arc::clone(&sink);
            let searcher = Arc::clone(&searcher);
            let error = Arc::clone(&error);
            let make_processors = Arc::clone(&make_processors);

            worker_handles.push(std::thread::spawn(move || {
                let mut processors = make_processors();
                for (mut chunk, index) in rx.iter() {
                    let mut chunk_failed = false;
                    for processor in processors.iter_mut() {
                        if let Err(err) = processor.process(&mut chunk) {
                            record_error(&error, err);
                            chunk_failed = true;
                            break;
                        }
                    }

                    let results = if chunk_failed {
                        S::Output::default()
                    } else {
                        match searcher.process(&chunk) {
                            Ok(results) => results,
                            Err(err) => {
                                record_error(&error, err);
                                S::Output::default()
                            }
                        }
                    };

                    // A failed chunk still pushes an empty result so the
                    // sink's counter advances past its index.
                    if let Err(err) = sink.push(results, index) {
                        record_error(&error, err);
                    }
                }
            }));
        }

        Executor {
            sink,
            cancelled,
            error,
            reader_handles,
            worker_handles,
            joined: false,
        }
    }

    /// Request cooperative shutdown: readers stop after their current
    /// chunk, workers drain what is already queued.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Block until the source is exhausted, all in-flight chunks are
    /// drained, and the sink has quiesced. Idempotent; returns the first
    /// error recorded anywhere in the pipeline.
    pub fn join(&mut self) -> Result<()> {
        if !self.joined {
            self.joined = true;
            for handle in self.reader_handles.drain(..) {
                let _ = handle.join();
            }
            for handle in self.worker_handles.drain(..) {
                let _ = handle.join();
            }
            if let Err(err) = self.sink.finish() {
                record_error(&self.error, err);
            }
        }

        match &*self.error.lock().unwrap() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// The sink, for result retrieval. Call after [`Executor::join`].
    pub fn sink(&self) -> &K {
        &self.sink
    }
}

impl<K: Sink> Drop for Executor<K> {
    fn drop(&mut self) {
        if !self.joined {
            self.cancelled.store(true, Ordering::Relaxed);
            for handle in self.reader_handles.drain(..) {
                let _ = handle.join();
            }
            for handle in self.worker_handles.drain(..) {
                let _ = handle.join();
            }
        }
    }
}
