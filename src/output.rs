//! Grep-style result rendering with optional ANSI color.
//!
//! The color scheme is fixed and part of the output contract: file paths
//! magenta, separators cyan, line numbers and byte offsets green, matched
//! text red. Only SGR sequences are emitted.

use crate::searcher::{Match, Pattern};

const SGR_FILE: &str = "\x1b[35m";
const SGR_SEPARATOR: &str = "\x1b[36m";
const SGR_NUMBER: &str = "\x1b[32m";
const SGR_MATCH: &str = "\x1b[31m";
const SGR_RESET: &str = "\x1b[0m";

/// Field selection and color switch for the streaming sink.
#[derive(Debug, Clone, Default)]
pub struct OutputFormat {
    /// Prefix each result with this path (`F:`).
    pub file_path: Option<String>,
    /// Emit the `L:` line-number field.
    pub line_number: bool,
    /// Emit the `B:` byte-offset field.
    pub byte_offset: bool,
    /// The searcher emitted occurrence substrings, not whole lines.
    pub only_matching: bool,
    /// Emit ANSI SGR color sequences.
    pub color: bool,
}

impl OutputFormat {
    fn push_separator(&self, out: &mut Vec<u8>) {
        if self.color {
            out.extend_from_slice(SGR_SEPARATOR.as_bytes());
            out.push(b':');
            out.extend_from_slice(SGR_RESET.as_bytes());
        } else {
            out.push(b':');
        }
    }

    fn push_number(&self, out: &mut Vec<u8>, value: i64) {
        if self.color {
            out.extend_from_slice(SGR_NUMBER.as_bytes());
        }
        out.extend_from_slice(value.to_string().as_bytes());
        if self.color {
            out.extend_from_slice(SGR_RESET.as_bytes());
        }
        self.push_separator(out);
    }

    fn push_prefix(&self, out: &mut Vec<u8>, m: &Match) {
        if let Some(path) = &self.file_path {
            if self.color {
                out.extend_from_slice(SGR_FILE.as_bytes());
                out.extend_from_slice(path.as_bytes());
                out.extend_from_slice(SGR_RESET.as_bytes());
            } else {
                out.extend_from_slice(path.as_bytes());
            }
            self.push_separator(out);
        }
        if self.line_number && m.line_number >= 0 {
            self.push_number(out, m.line_number);
        }
        if self.byte_offset && m.byte_position >= 0 {
            self.push_number(out, m.byte_position);
        }
    }

    /// Render one match record, terminated with `\n`.
    ///
    /// With color on, full-line mode highlights every occurrence of the
    /// pattern inside the line; only-matching mode paints the whole
    /// substring.
    pub fn render(&self, out: &mut Vec<u8>, m: &Match, pattern: Option<&Pattern>) {
        self.push_prefix(out, m);

        let text = m.text.as_bytes();
        if !self.color {
            out.extend_from_slice(text);
        } else if self.only_matching {
            out.extend_from_slice(SGR_MATCH.as_bytes());
            out.extend_from_slice(text);
            out.extend_from_slice(SGR_RESET.as_bytes());
        } else {
            match pattern {
                Some(pattern) if !pattern.matches_everything() => {
                    let mut scratch = Vec::new();
                    let mut at = 0;
                    for (start, len) in pattern.occurrences(text, &mut scratch) {
                        if start < at {
                            // Overlapping literal hit; already painted.
                            continue;
                        }
                        out.extend_from_slice(&text[at..start]);
                        out.extend_from_slice(SGR_MATCH.as_bytes());
                        out.extend_from_slice(&text[start..start + len]);
                        out.extend_from_slice(SGR_RESET.as_bytes());
                        at = start + len;
                    }
                    out.extend_from_slice(&text[at..]);
                }
                _ => out.extend_from_slice(text),
            }
        }
        out.push(b'\n');
    }

    /// Render a count-mode result line: `N` or `F:N`.
    pub fn render_count(&self, out: &mut Vec<u8>, count: u64) {
        if let Some(path) = &self.file_path {
            if self.color {
                out.extend_from_slice(SGR_FILE.as_bytes());
                out.extend_from_slice(path.as_bytes());
                out.extend_from_slice(SGR_RESET.as_bytes());
            } else {
                out.extend_from_slice(path.as_bytes());
            }
            self.push_separator(out);
        }
        out.extend_from_slice(count.to_string().as_bytes());
        out.push(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searcher::Locale;
    use std::sync::Arc;

    fn sample_match() -> Match {
        Match {
            byte_position: 34,
            line_number: 2,
            text: "with Sherlock".to_string(),
        }
    }

    fn render_plain(format: &OutputFormat, m: &Match) -> String {
        let mut out = Vec::new();
        format.render(&mut out, m, None);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_plain_line() {
        let format = OutputFormat::default();
        assert_eq!(render_plain(&format, &sample_match()), "with Sherlock\n");
    }

    #[test]
    fn test_prefix_fields() {
        let format = OutputFormat {
            line_number: true,
            byte_offset: true,
            ..Default::default()
        };
        assert_eq!(render_plain(&format, &sample_match()), "2:34:with Sherlock\n");
    }

    #[test]
    fn test_file_prefix() {
        let format = OutputFormat {
            file_path: Some("notes.txt".to_string()),
            line_number: true,
            ..Default::default()
        };
        assert_eq!(
            render_plain(&format, &sample_match()),
            "notes.txt:2:with Sherlock\n"
        );
    }

    #[test]
    fn test_fields_suppressed_when_sentinel() {
        // -1 means the searcher was not asked for the field.
        let format = OutputFormat {
            line_number: true,
            byte_offset: true,
            ..Default::default()
        };
        let m = Match {
            byte_position: -1,
            line_number: -1,
            text: "plain".to_string(),
        };
        assert_eq!(render_plain(&format, &m), "plain\n");
    }

    #[test]
    fn test_color_highlights_occurrences() {
        let pattern =
            Arc::new(Pattern::compile("Sherlock", false, false, Locale::Auto).unwrap());
        let format = OutputFormat {
            color: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        format.render(&mut out, &sample_match(), Some(&pattern));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "with \x1b[31mSherlock\x1b[0m\n"
        );
    }

    #[test]
    fn test_color_only_matching() {
        let format = OutputFormat {
            only_matching: true,
            color: true,
            ..Default::default()
        };
        let m = Match {
            byte_position: -1,
            line_number: -1,
            text: "Sherlock".to_string(),
        };
        let mut out = Vec::new();
        format.render(&mut out, &m, None);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\x1b[31mSherlock\x1b[0m\n"
        );
    }

    #[test]
    fn test_count_line() {
        let format = OutputFormat::default();
        let mut out = Vec::new();
        format.render_count(&mut out, 10000);
        assert_eq!(out, b"10000\n");

        let format = OutputFormat {
            file_path: Some("big.log".to_string()),
            ..Default::default()
        };
        let mut out = Vec::new();
        format.render_count(&mut out, 3);
        assert_eq!(out, b"big.log:3\n");
    }
}
