//! Source map for the single buffer the core compiles.
//!
//! The driver feeds exactly one `.pim` file to the pipeline per invocation
//! (spec §1/§6), so unlike a multi-file compiler's source map this tracks
//! one buffer's line table, not a registry of file ids.

use super::Span;

/// Line table over a single source buffer, used to render the
/// `<path>:<line>` + snippet + caret diagnostics every `CompileError`
/// produces (spec §7).
///
/// # Examples
///
/// ```
/// use pimoc_util::span::{SourceMap, Span};
///
/// let map = SourceMap::new("main.pim", "func main:\n  return 0\n");
/// assert_eq!(map.line_at(2), Some("  return 0"));
/// let rendered = map.format_span(Span::new(2));
/// assert!(rendered.contains("main.pim:2"));
/// ```
#[derive(Clone)]
pub struct SourceMap {
    path: String,
    text: String,
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = Self::compute_line_starts(&text);
        Self {
            path: path.into(),
            text,
            line_starts,
        }
    }

    fn compute_line_starts(text: &str) -> Vec<usize> {
        let mut line_starts = vec![0];
        for (i, ch) in text.char_indices() {
            if ch == '\n' {
                line_starts.push(i + 1);
            }
        }
        line_starts
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Total number of lines, at least 1 even for empty input.
    #[inline]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Returns the text of a 1-based line, without its trailing newline.
    pub fn line_at(&self, line: u32) -> Option<&str> {
        let idx = line.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&s| s.saturating_sub(1))
            .unwrap_or(self.text.len());
        self.text
            .get(start..end)
            .map(|s| s.trim_end_matches('\r'))
    }

    /// Renders `<path>:<line>` plus the offending source line and a caret
    /// underneath it, the snippet format `CompileError`'s `Display` embeds.
    pub fn format_span(&self, span: Span) -> String {
        let header = format!("{}:{}", self.path, span.line());
        match self.line_at(span.line()) {
            Some(line_text) => {
                let caret_len = line_text.trim_end().chars().count().max(1);
                let gutter = span.line().to_string();
                format!(
                    "{header}\n  {gutter} | {text}\n  {pad} | {carets}",
                    header = header,
                    gutter = gutter,
                    text = line_text,
                    pad = " ".repeat(gutter.len()),
                    carets = "^".repeat(caret_len),
                )
            }
            None => header,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_buffer_reports_one_line() {
        let map = SourceMap::new("a.pim", "func main:");
        assert_eq!(map.line_count(), 1);
        assert_eq!(map.line_at(1), Some("func main:"));
    }

    #[test]
    fn format_span_includes_path_line_and_caret() {
        let map = SourceMap::new("a.pim", "x = 1\ny = 2\n");
        let rendered = map.format_span(Span::new(2));
        assert!(rendered.contains("a.pim:2"));
        assert!(rendered.contains("y = 2"));
        assert!(rendered.contains('^'));
    }

    #[test]
    fn line_at_out_of_range_is_none() {
        let map = SourceMap::new("a.pim", "x = 1\n");
        assert!(map.line_at(99).is_none());
    }

    #[test]
    fn empty_buffer_has_one_empty_line() {
        let map = SourceMap::new("empty.pim", "");
        assert_eq!(map.line_count(), 1);
        assert_eq!(map.line_at(1), Some(""));
    }
}
