//! Searchy - Parallel Chunk-Oriented Text Search
//!
//! Searchy is a grep-compatible search engine built around a three-stage
//! parallel pipeline: a reader slices the input into ordered, line-aligned
//! chunks, a pool of workers runs per-chunk processors and the pattern
//! search, and an ordered sink reassembles per-chunk results into file
//! order while memory stays bounded by a small chunk queue.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use searchy::Grep;
//!
//! let grep = Grep::builder("She[r ]lock", "big.log")
//!     .line_number(true)
//!     .build()?;
//!
//! for m in grep.search()? {
//!     println!("{}: {}", m.line_number, m.text);
//! }
//!
//! // Or just count matching lines, bypassing match materialization:
//! let total = grep.count()?;
//! println!("{} matching lines", total);
//! # Ok::<(), searchy::SearchError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! [Reader threads] --chunks--> [bounded queue] --> [Worker pool]
//!   line-aligned                2 x workers         processors + searcher
//!   chunk_index 0,1,2...                                 |
//!                                                        v
//!                              [Ordered sink] <--(results, chunk_index)
//!                                emits strictly in chunk_index order
//! ```
//!
//! Chunks never split lines, so a match is always wholly inside one chunk
//! and workers need no cross-chunk coordination. The chunk index assigned
//! at read time is the sole ordering key; the sink buffers early arrivals
//! until the gap fills.
//!
//! # Key Features
//!
//! - **Line-aligned chunking**: streamed, memory-mapped, and partitioned
//!   readers; gzip input via transparent decompression
//! - **SIMD fast paths**: substring search and newline indexing through
//!   `memchr`, ASCII case-folding with SSE2/NEON
//! - **Regex support**: byte-oriented regexes with Unicode case-folding
//!   delegated to the regex engine
//! - **Ordered streaming output**: grep-style rendering with ANSI color,
//!   strictly in file order, under one small mutex
//! - **Deterministic results**: output is bytewise identical for any
//!   worker count

#![warn(missing_docs)]
#![warn(clippy::all)]

// Module declarations
/// Line-aligned chunks and byte-to-line mapping
pub mod chunk;
/// Error types for search pipeline operations
pub mod error;
/// The pipeline driver
pub mod executor;
/// ASCII case-folding fast path
pub mod fold;
/// The high-level grep façade
pub mod grep;
/// Grep-style result rendering
pub mod output;
/// Per-chunk in-place transforms
pub mod processor;
/// Chunk readers (streamed, mmap, partitioned)
pub mod reader;
/// Pattern compilation and chunk searchers
pub mod searcher;
/// Ordered, counting, and container sinks
pub mod sink;

// Re-exports for the common paths

/// High-level search entry point
pub use crate::grep::{ColorChoice, Grep, GrepBuilder, GrepOptions};

/// Pipeline building blocks
pub use crate::chunk::DataChunk;
pub use crate::executor::Executor;
pub use crate::processor::{GzipDecompressor, InplaceProcessor, NewlineIndexer};
pub use crate::reader::{
    ChunkReader, FileBlockReader, MmapBlockReader, Partition, PartitionedReader,
    DEFAULT_BLOCK_SIZE,
};
pub use crate::searcher::{ChunkSearcher, GrepSearcher, LineCounter, Locale, Match, Pattern};
pub use crate::sink::{ContainerSink, CountSink, Sink, StreamSink};

/// Error handling
pub use crate::error::{Result, SearchError};
