//! Pattern matching over chunks: literal fast path, regex path, counting.
//!
//! Mode selection mirrors grep: a pattern containing regex metacharacters
//! (unless `--fixed-strings`) compiles to a regex; case-insensitive
//! matching of non-ASCII patterns also goes through the regex engine,
//! which owns Unicode case-folding. Everything else takes the literal
//! path: a SIMD substring search, with a byte-level ASCII lower-case fold
//! of both pattern and chunk for case-insensitive search.

use crate::chunk::DataChunk;
use crate::error::Result;
use crate::fold::ascii_lower_into;
use memchr::memmem;
use std::sync::Arc;

/// One search result record.
///
/// `byte_position` is an absolute offset in the logical stream: the start
/// of the containing line in full-line mode, the start of the occurrence
/// in only-matching mode. Both numeric fields are `-1` when the caller
/// did not request them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Absolute byte offset, or -1 when not requested.
    pub byte_position: i64,
    /// 1-based line number, or -1 when not requested.
    pub line_number: i64,
    /// The full containing line (full-line mode) or the matched substring
    /// (only-matching mode). Invalid UTF-8 is replaced lossily.
    pub text: String,
}

/// Text encoding the pattern is matched under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    /// Decide from the pattern: ASCII patterns get the byte-level paths,
    /// anything else is treated as UTF-8.
    #[default]
    Auto,
    /// Byte-level ASCII; case-insensitivity is a byte fold.
    Ascii,
    /// UTF-8; case-insensitivity is delegated to the regex engine.
    Utf8,
}

/// How occurrences are found inside a chunk.
#[derive(Debug)]
enum Engine {
    /// Empty pattern: every line matches.
    MatchAll,
    /// SIMD substring search; `fold` lower-cases the haystack first.
    Literal {
        finder: memmem::Finder<'static>,
        fold: bool,
    },
    Regex(regex::bytes::Regex),
}

/// A compiled search pattern, shared read-only across worker threads.
#[derive(Debug)]
pub struct Pattern {
    engine: Engine,
}

impl Pattern {
    /// Compile `pattern` according to the grep mode-selection rules.
    ///
    /// Returns [`SearchError::BadPattern`] when the regex path is chosen
    /// and the pattern does not compile.
    ///
    /// [`SearchError::BadPattern`]: crate::SearchError::BadPattern
    pub fn compile(
        pattern: &str,
        fixed_string: bool,
        ignore_case: bool,
        locale: Locale,
    ) -> Result<Self> {
        if pattern.is_empty() {
            return Ok(Pattern {
                engine: Engine::MatchAll,
            });
        }

        let locale = match locale {
            Locale::Auto => {
                if pattern.is_ascii() {
                    Locale::Ascii
                } else {
                    Locale::Utf8
                }
            }
            other => other,
        };

        let regex_mode = !fixed_string && has_regex_metachars(pattern);
        if regex_mode || (ignore_case && locale == Locale::Utf8) {
            let source = if regex_mode {
                pattern.to_string()
            } else {
                // Case-insensitive UTF-8 literal: escape, then group.
                format!("({})", regex::escape(pattern))
            };
            let re = regex::bytes::RegexBuilder::new(&source)
                .case_insensitive(ignore_case)
                .build()?;
            return Ok(Pattern {
                engine: Engine::Regex(re),
            });
        }

        let needle = if ignore_case {
            let mut lowered = Vec::new();
            ascii_lower_into(pattern.as_bytes(), &mut lowered);
            lowered
        } else {
            pattern.as_bytes().to_vec()
        };
        Ok(Pattern {
            engine: Engine::Literal {
                finder: memmem::Finder::new(&needle).into_owned(),
                fold: ignore_case,
            },
        })
    }

    /// True when the pattern went down the regex path.
    pub fn is_regex(&self) -> bool {
        matches!(self.engine, Engine::Regex(_))
    }

    /// True for the empty pattern, which matches every line.
    pub fn matches_everything(&self) -> bool {
        matches!(self.engine, Engine::MatchAll)
    }

    /// All `(start, len)` occurrences in `hay`, ascending by start.
    ///
    /// Literal occurrences resume one byte past each hit, so a hit may
    /// overlap its predecessor; the regex engine resumes past the match
    /// end. `scratch` holds the case-folded haystack copy when the
    /// literal fold is active and may be reused across calls.
    pub fn occurrences(&self, hay: &[u8], scratch: &mut Vec<u8>) -> Vec<(usize, usize)> {
        match &self.engine {
            Engine::MatchAll => Vec::new(),
            Engine::Literal { finder, fold } => {
                let hay = if *fold {
                    ascii_lower_into(hay, scratch);
                    scratch.as_slice()
                } else {
                    hay
                };
                let nlen = finder.needle().len();
                let mut out = Vec::new();
                let mut at = 0;
                while at <= hay.len() {
                    match finder.find(&hay[at..]) {
                        Some(rel) => {
                            let pos = at + rel;
                            out.push((pos, nlen));
                            at = pos + 1;
                        }
                        None => break,
                    }
                }
                out
            }
            Engine::Regex(re) => re
                .find_iter(hay)
                .map(|m| (m.start(), m.len()))
                .collect(),
        }
    }
}

/// Does `pattern` contain characters the regex engine treats specially?
fn has_regex_metachars(pattern: &str) -> bool {
    pattern
        .bytes()
        .any(|b| matches!(b, b'.' | b'^' | b'$' | b'*' | b'+' | b'?' | b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'|' | b'\\'))
}

/// A per-chunk processor returning search results to the sink.
///
/// Implementations are immutable after construction and shared across
/// workers. `Output` must be `Default` so the executor can substitute an
/// empty result when a single chunk fails, keeping the ordering counter
/// moving.
pub trait ChunkSearcher: Send + Sync {
    /// Per-chunk result type.
    type Output: Send + Default;

    /// Search one chunk.
    fn process(&self, chunk: &DataChunk) -> Result<Self::Output>;
}

/// The grep searcher: returns one [`Match`] per matching line (full-line
/// mode) or per occurrence (only-matching mode).
pub struct GrepSearcher {
    pattern: Arc<Pattern>,
    line_number: bool,
    byte_offset: bool,
    only_matching: bool,
}

impl GrepSearcher {
    /// Build a searcher over a compiled pattern.
    pub fn new(
        pattern: Arc<Pattern>,
        line_number: bool,
        byte_offset: bool,
        only_matching: bool,
    ) -> Self {
        GrepSearcher {
            pattern,
            line_number,
            byte_offset,
            only_matching,
        }
    }

    fn make_match(&self, chunk: &DataChunk, local: usize, text: &[u8]) -> Match {
        Match {
            byte_position: if self.byte_offset {
                (chunk.actual_offset() + local as u64) as i64
            } else {
                -1
            },
            line_number: if self.line_number {
                chunk.line_number_at(local) as i64
            } else {
                -1
            },
            text: String::from_utf8_lossy(text).into_owned(),
        }
    }
}

impl ChunkSearcher for GrepSearcher {
    type Output = Vec<Match>;

    fn process(&self, chunk: &DataChunk) -> Result<Vec<Match>> {
        let bytes = chunk.bytes();
        let mut results = Vec::new();

        if self.pattern.matches_everything() {
            for_each_line(chunk, |start, end| {
                let text = if self.only_matching {
                    &bytes[start..start]
                } else {
                    &bytes[start..end]
                };
                results.push(self.make_match(chunk, start, text));
            });
            return Ok(results);
        }

        let mut scratch = Vec::new();
        let occurrences = self.pattern.occurrences(bytes, &mut scratch);

        if self.only_matching {
            for (start, len) in occurrences {
                results.push(self.make_match(chunk, start, &bytes[start..start + len]));
            }
        } else {
            // One record per matching line, deduplicated by line start.
            let mut last_line_start = None;
            for (start, _) in occurrences {
                let (line_start, line_end) = chunk.line_span(start);
                if last_line_start == Some(line_start) {
                    continue;
                }
                last_line_start = Some(line_start);
                results.push(self.make_match(chunk, line_start, &bytes[line_start..line_end]));
            }
        }

        Ok(results)
    }
}

/// Counting searcher: number of matching lines per chunk, with no
/// [`Match`] materialization.
pub struct LineCounter {
    pattern: Arc<Pattern>,
}

impl LineCounter {
    /// Build a counter over a compiled pattern.
    pub fn new(pattern: Arc<Pattern>) -> Self {
        LineCounter { pattern }
    }
}

impl ChunkSearcher for LineCounter {
    type Output = u64;

    fn process(&self, chunk: &DataChunk) -> Result<u64> {
        if self.pattern.matches_everything() {
            let mut lines = 0u64;
            for_each_line(chunk, |_, _| lines += 1);
            return Ok(lines);
        }

        let mut scratch = Vec::new();
        let mut count = 0u64;
        let mut last_line_start = None;
        for (start, _) in self.pattern.occurrences(chunk.bytes(), &mut scratch) {
            let (line_start, _) = chunk.line_span(start);
            if last_line_start == Some(line_start) {
                continue;
            }
            last_line_start = Some(line_start);
            count += 1;
        }
        Ok(count)
    }
}

/// Visit every line `[start, end)` of the chunk, excluding terminators.
/// The trailing unterminated line, if any, is included.
fn for_each_line(chunk: &DataChunk, mut f: impl FnMut(usize, usize)) {
    let bytes = chunk.bytes();
    let mut start = 0;
    match chunk.newline_index() {
        Some(index) => {
            for &nl in index {
                f(start, nl);
                start = nl + 1;
            }
        }
        None => {
            for nl in memchr::memchr_iter(b'\n', bytes) {
                f(start, nl);
                start = nl + 1;
            }
        }
    }
    if start < bytes.len() {
        f(start, bytes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{InplaceProcessor, NewlineIndexer};

    const SAMPLE: &[u8] = b"This is a sample datachunk object\nwith Sherlock\nand She lock.\n";

    fn sample_chunk() -> DataChunk {
        let mut chunk = DataChunk::new(SAMPLE.to_vec(), 0);
        chunk.set_first_line_number(1);
        NewlineIndexer.process(&mut chunk).unwrap();
        chunk
    }

    fn literal(pattern: &str) -> Arc<Pattern> {
        Arc::new(Pattern::compile(pattern, false, false, Locale::Auto).unwrap())
    }

    #[test]
    fn test_literal_full_line() {
        let chunk = sample_chunk();
        for (line_number, byte_offset) in
            [(false, false), (false, true), (true, false), (true, true)]
        {
            let searcher = GrepSearcher::new(literal("Sherlock"), line_number, byte_offset, false);
            let res = searcher.process(&chunk).unwrap();
            assert_eq!(res.len(), 1);
            assert_eq!(res[0].line_number, if line_number { 2 } else { -1 });
            assert_eq!(res[0].byte_position, if byte_offset { 34 } else { -1 });
            assert_eq!(res[0].text, "with Sherlock");
        }
    }

    #[test]
    fn test_regex_full_line() {
        let chunk = sample_chunk();
        let pattern = literal("She[r ]lock");
        assert!(pattern.is_regex());

        let searcher = GrepSearcher::new(pattern, true, true, false);
        let res = searcher.process(&chunk).unwrap();
        assert_eq!(res.len(), 2);
        assert_eq!(res[0].line_number, 2);
        assert_eq!(res[0].byte_position, 34);
        assert_eq!(res[0].text, "with Sherlock");
        assert_eq!(res[1].line_number, 3);
        assert_eq!(res[1].byte_position, 48);
        assert_eq!(res[1].text, "and She lock.");
    }

    #[test]
    fn test_ignore_case_literal_only_matching() {
        let chunk = sample_chunk();
        let pattern =
            Arc::new(Pattern::compile("sherlock", false, true, Locale::Ascii).unwrap());
        assert!(!pattern.is_regex());

        let searcher = GrepSearcher::new(pattern, false, false, true);
        let res = searcher.process(&chunk).unwrap();
        assert_eq!(res.len(), 1);
        // Reported text comes from the original bytes, not the folded copy.
        assert_eq!(res[0].text, "Sherlock");
        assert_eq!(res[0].byte_position, -1);
        assert_eq!(res[0].line_number, -1);
    }

    #[test]
    fn test_only_matching_byte_position() {
        let chunk = sample_chunk();
        let searcher = GrepSearcher::new(literal("Sherlock"), false, true, true);
        let res = searcher.process(&chunk).unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].byte_position, 39);
    }

    #[test]
    fn test_overlapping_occurrences() {
        let mut chunk = DataChunk::new(b"aaa\naaa\n".to_vec(), 0);
        NewlineIndexer.process(&mut chunk).unwrap();

        let searcher = GrepSearcher::new(literal("aa"), false, false, true);
        let res = searcher.process(&chunk).unwrap();
        assert_eq!(res.len(), 4);

        // Full-line mode collapses them to one record per line.
        let searcher = GrepSearcher::new(literal("aa"), false, false, false);
        let res = searcher.process(&chunk).unwrap();
        assert_eq!(res.len(), 2);
    }

    #[test]
    fn test_multiple_hits_one_line_dedup() {
        let mut chunk = DataChunk::new(b"foo bar foo\nplain line\nfoo\n".to_vec(), 0);
        chunk.set_first_line_number(1);
        NewlineIndexer.process(&mut chunk).unwrap();

        let searcher = GrepSearcher::new(literal("foo"), true, false, false);
        let res = searcher.process(&chunk).unwrap();
        assert_eq!(res.len(), 2);
        assert_eq!(res[0].line_number, 1);
        assert_eq!(res[1].line_number, 3);
    }

    #[test]
    fn test_chunk_offset_is_absolute() {
        // A chunk that starts mid-file reports file-absolute positions.
        let mut chunk = DataChunk::new(b"with Sherlock\n".to_vec(), 34);
        chunk.set_first_line_number(2);
        NewlineIndexer.process(&mut chunk).unwrap();

        let searcher = GrepSearcher::new(literal("Sherlock"), true, true, false);
        let res = searcher.process(&chunk).unwrap();
        assert_eq!(res[0].byte_position, 34);
        assert_eq!(res[0].line_number, 2);
    }

    #[test]
    fn test_utf8_ignore_case_goes_through_regex() {
        let pattern = Pattern::compile("Stra\u{df}e", false, true, Locale::Auto).unwrap();
        assert!(pattern.is_regex());

        let mut chunk = DataChunk::new("die STRA\u{1e9e}E hier\n".as_bytes().to_vec(), 0);
        NewlineIndexer.process(&mut chunk).unwrap();
        let searcher = GrepSearcher::new(Arc::new(pattern), false, false, false);
        let res = searcher.process(&chunk).unwrap();
        assert_eq!(res.len(), 1);
    }

    #[test]
    fn test_literal_and_escaped_regex_agree() {
        let chunk = sample_chunk();
        let lit = GrepSearcher::new(literal("She lock"), true, true, false);
        let re = GrepSearcher::new(
            Arc::new(
                Pattern::compile(&regex::escape("She lock"), false, false, Locale::Auto).unwrap(),
            ),
            true,
            true,
            false,
        );
        assert_eq!(lit.process(&chunk).unwrap(), re.process(&chunk).unwrap());
    }

    #[test]
    fn test_bad_pattern() {
        assert!(Pattern::compile("a(b", false, false, Locale::Auto).is_err());
    }

    #[test]
    fn test_fixed_string_disables_regex() {
        let pattern = Pattern::compile("She[r ]lock", true, false, Locale::Auto).unwrap();
        assert!(!pattern.is_regex());

        let chunk = sample_chunk();
        let searcher = GrepSearcher::new(Arc::new(pattern), false, false, false);
        assert!(searcher.process(&chunk).unwrap().is_empty());
    }

    #[test]
    fn test_line_counter() {
        let chunk = sample_chunk();
        let counter = LineCounter::new(literal("lock"));
        assert_eq!(counter.process(&chunk).unwrap(), 2);

        let counter = LineCounter::new(literal("nowhere"));
        assert_eq!(counter.process(&chunk).unwrap(), 0);
    }

    #[test]
    fn test_empty_pattern_matches_every_line() {
        let chunk = sample_chunk();
        let counter = LineCounter::new(literal(""));
        assert_eq!(counter.process(&chunk).unwrap(), 3);

        let searcher = GrepSearcher::new(literal(""), false, false, false);
        assert_eq!(searcher.process(&chunk).unwrap().len(), 3);
    }

    #[test]
    fn test_unterminated_last_line_counts() {
        let chunk = DataChunk::new(b"tail has match".to_vec(), 0);
        let counter = LineCounter::new(literal("match"));
        assert_eq!(counter.process(&chunk).unwrap(), 1);
    }
}
