//! High-level grep façade: options in, pipeline out.
//!
//! [`Grep`] owns the validated options and a compiled pattern and exposes
//! the three ways to run a search: [`Grep::count`] (counting sink),
//! [`Grep::search`] (in-memory container sink), and [`Grep::write_to`]
//! (ordered streaming sink with grep-style rendering). Each call builds a
//! fresh pipeline over the configured input.

use crate::error::Result;
use crate::executor::Executor;
use crate::output::OutputFormat;
use crate::processor::{InplaceProcessor, NewlineIndexer};
use crate::reader::{ChunkReader, FileBlockReader, MmapBlockReader, DEFAULT_BLOCK_SIZE};
use crate::searcher::{ChunkSearcher, GrepSearcher, LineCounter, Locale, Match, Pattern};
use crate::sink::{ContainerSink, CountSink, Sink, StreamSink};
use std::io::Write;
use std::sync::Arc;

/// Colored output switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Resolve from the terminal before running; the library side of
    /// `Auto` is `Off` since only the caller knows where output goes.
    #[default]
    Auto,
    /// Always emit ANSI color.
    On,
    /// Never emit color.
    Off,
}

/// Everything a search run needs to know. Immutable once a pipeline is
/// constructed.
#[derive(Debug, Clone)]
pub struct GrepOptions {
    /// The pattern to search for.
    pub pattern: String,
    /// Input path; `"-"` or empty reads standard input.
    pub file: String,
    /// Only count matching lines.
    pub count: bool,
    /// Treat the pattern as a fixed string even if it looks like a regex.
    pub fixed_string: bool,
    /// Report 1-based line numbers.
    pub line_number: bool,
    /// Report absolute byte offsets.
    pub byte_offset: bool,
    /// Report each occurrence instead of each matching line.
    pub only_matching: bool,
    /// Case-insensitive matching.
    pub ignore_case: bool,
    /// Pattern encoding; `Auto` decides from the pattern bytes.
    pub locale: Locale,
    /// Colored output.
    pub color: ColorChoice,
    /// Prefix results with the file path.
    pub print_file_path: bool,
    /// Memory-map regular files instead of streaming them.
    pub use_mmap: bool,
    /// Target chunk size in bytes; chunks extend to the next newline.
    pub chunk_size: usize,
    /// Worker thread count; 0 picks a default from the hardware.
    pub worker_threads: usize,
    /// Reader thread count; clamped to at least 1.
    pub reader_threads: usize,
}

impl Default for GrepOptions {
    fn default() -> Self {
        GrepOptions {
            pattern: String::new(),
            file: "-".to_string(),
            count: false,
            fixed_string: false,
            line_number: false,
            byte_offset: false,
            only_matching: false,
            ignore_case: false,
            locale: Locale::Auto,
            color: ColorChoice::Auto,
            print_file_path: false,
            use_mmap: true,
            chunk_size: DEFAULT_BLOCK_SIZE,
            worker_threads: 0,
            reader_threads: 1,
        }
    }
}

/// Worker count resolution: half the hardware concurrency (SMT assumed),
/// never below 2 by default; explicit requests are capped at the physical
/// core estimate.
pub(crate) fn resolve_worker_threads(requested: usize, hardware_concurrency: usize) -> usize {
    let physical = (hardware_concurrency / 2).max(1);
    if requested == 0 {
        physical.max(2)
    } else {
        requested.clamp(1, physical)
    }
}

/// Option fields after run-time resolution.
struct Resolved {
    line_number: bool,
    byte_offset: bool,
    worker_threads: usize,
    reader_threads: usize,
}

/// A configured search over one input. See the module docs.
#[derive(Debug)]
pub struct Grep {
    options: GrepOptions,
    pattern: Arc<Pattern>,
}

impl Grep {
    /// Validate options and compile the pattern.
    ///
    /// Pattern problems surface here, before any pipeline starts.
    pub fn new(options: GrepOptions) -> Result<Self> {
        let pattern = Pattern::compile(
            &options.pattern,
            options.fixed_string,
            options.ignore_case,
            options.locale,
        )?;
        Ok(Grep {
            options,
            pattern: Arc::new(pattern),
        })
    }

    /// Start building a search for `pattern` over `file`.
    pub fn builder(pattern: impl Into<String>, file: impl Into<String>) -> GrepBuilder {
        GrepBuilder {
            options: GrepOptions {
                pattern: pattern.into(),
                file: file.into(),
                ..GrepOptions::default()
            },
        }
    }

    /// The options this search was built with.
    pub fn options(&self) -> &GrepOptions {
        &self.options
    }

    fn resolve(&self) -> Resolved {
        let hardware = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Resolved {
            // Counting bypasses match materialization entirely, so the
            // per-match fields are forced off.
            line_number: self.options.line_number && !self.options.count,
            byte_offset: self.options.byte_offset && !self.options.count,
            worker_threads: resolve_worker_threads(self.options.worker_threads, hardware),
            reader_threads: self.options.reader_threads.max(1),
        }
    }

    fn build_reader(&self, track_lines: bool) -> Result<Arc<dyn ChunkReader>> {
        let options = &self.options;
        if options.file.is_empty() || options.file == "-" {
            return Ok(Arc::new(
                FileBlockReader::stdin(options.chunk_size).track_lines(track_lines),
            ));
        }

        let is_gzip = options
            .file
            .rsplit('.')
            .next()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);

        if options.use_mmap && !is_gzip {
            Ok(Arc::new(
                MmapBlockReader::open(&options.file, options.chunk_size)?.track_lines(track_lines),
            ))
        } else {
            Ok(Arc::new(
                FileBlockReader::open(&options.file, options.chunk_size)?.track_lines(track_lines),
            ))
        }
    }

    fn run<S, K>(&self, resolved: &Resolved, searcher: Arc<S>, sink: Arc<K>) -> Result<()>
    where
        S: ChunkSearcher<Output = K::Item> + 'static,
        K: Sink + 'static,
        K::Item: Default,
    {
        let reader = self.build_reader(resolved.line_number)?;
        let index_lines = resolved.line_number;
        let make_processors = move || -> Vec<Box<dyn InplaceProcessor>> {
            if index_lines {
                vec![Box::new(NewlineIndexer)]
            } else {
                Vec::new()
            }
        };

        let mut executor = Executor::new(
            resolved.worker_threads,
            resolved.reader_threads,
            reader,
            make_processors,
            searcher,
            sink,
        );
        executor.join()
    }

    /// Count matching lines.
    pub fn count(&self) -> Result<u64> {
        let resolved = self.resolve();
        let sink = Arc::new(CountSink::new());
        let searcher = Arc::new(LineCounter::new(Arc::clone(&self.pattern)));
        self.run(&resolved, searcher, Arc::clone(&sink))?;
        Ok(sink.value())
    }

    /// Collect all matches into an ordered in-memory vector.
    pub fn search(&self) -> Result<Vec<Match>> {
        let resolved = self.resolve();
        let sink = Arc::new(ContainerSink::new());
        let searcher = Arc::new(GrepSearcher::new(
            Arc::clone(&self.pattern),
            resolved.line_number,
            resolved.byte_offset,
            self.options.only_matching,
        ));
        self.run(&resolved, searcher, Arc::clone(&sink))?;
        Ok(sink.take_results())
    }

    /// Stream rendered results to `writer` in file order.
    ///
    /// Returns the number of match records (count mode: matching lines)
    /// together with the writer. `ColorChoice::Auto` renders uncolored;
    /// resolve it against the terminal before building when color is
    /// wanted.
    pub fn write_to<W: Write + Send + 'static>(&self, writer: W) -> Result<(u64, W)> {
        let color = self.options.color == ColorChoice::On;
        let mut format = OutputFormat {
            file_path: self
                .options
                .print_file_path
                .then(|| self.options.file.clone()),
            line_number: self.options.line_number,
            byte_offset: self.options.byte_offset,
            only_matching: self.options.only_matching,
            color,
        };

        if self.options.count {
            let total = self.count()?;
            let mut writer = writer;
            let mut buf = Vec::new();
            format.render_count(&mut buf, total);
            writer
                .write_all(&buf)
                .map_err(|e| crate::SearchError::Io(e.to_string()))?;
            return Ok((total, writer));
        }

        let resolved = self.resolve();
        format.line_number = resolved.line_number;
        format.byte_offset = resolved.byte_offset;

        let highlight = (color && !self.options.only_matching).then(|| Arc::clone(&self.pattern));
        let sink = Arc::new(StreamSink::new(writer, format, highlight));
        let searcher = Arc::new(GrepSearcher::new(
            Arc::clone(&self.pattern),
            resolved.line_number,
            resolved.byte_offset,
            self.options.only_matching,
        ));
        self.run(&resolved, searcher, Arc::clone(&sink))?;

        let sink = Arc::try_unwrap(sink).map_err(|_| {
            crate::SearchError::Internal("stream sink still shared after join".to_string())
        })?;
        let matched = sink.matched();
        Ok((matched, sink.into_writer()))
    }
}

/// Chainable builder for [`Grep`].
pub struct GrepBuilder {
    options: GrepOptions,
}

impl GrepBuilder {
    /// Only count matching lines.
    pub fn count(mut self, value: bool) -> Self {
        self.options.count = value;
        self
    }

    /// Treat the pattern as a fixed string.
    pub fn fixed_string(mut self, value: bool) -> Self {
        self.options.fixed_string = value;
        self
    }

    /// Report 1-based line numbers.
    pub fn line_number(mut self, value: bool) -> Self {
        self.options.line_number = value;
        self
    }

    /// Report absolute byte offsets.
    pub fn byte_offset(mut self, value: bool) -> Self {
        self.options.byte_offset = value;
        self
    }

    /// Report occurrences instead of whole lines.
    pub fn only_matching(mut self, value: bool) -> Self {
        self.options.only_matching = value;
        self
    }

    /// Case-insensitive matching.
    pub fn ignore_case(mut self, value: bool) -> Self {
        self.options.ignore_case = value;
        self
    }

    /// Force the pattern encoding.
    pub fn locale(mut self, value: Locale) -> Self {
        self.options.locale = value;
        self
    }

    /// Colored output.
    pub fn color(mut self, value: ColorChoice) -> Self {
        self.options.color = value;
        self
    }

    /// Prefix results with the file path.
    pub fn print_file_path(mut self, value: bool) -> Self {
        self.options.print_file_path = value;
        self
    }

    /// Memory-map regular files. True means mmap.
    pub fn use_mmap(mut self, value: bool) -> Self {
        self.options.use_mmap = value;
        self
    }

    /// Target chunk size in bytes.
    pub fn chunk_size(mut self, value: usize) -> Self {
        self.options.chunk_size = value;
        self
    }

    /// Worker thread count; 0 picks a hardware default.
    pub fn worker_threads(mut self, value: usize) -> Self {
        self.options.worker_threads = value;
        self
    }

    /// Reader thread count.
    pub fn reader_threads(mut self, value: usize) -> Self {
        self.options.reader_threads = value;
        self
    }

    /// Compile the pattern and finish the build.
    pub fn build(self) -> Result<Grep> {
        Grep::new(self.options)
    }
}
