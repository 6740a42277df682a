//! Span detection for begin/end delimited blocks.
//!
//! A block is `\begin{KIND}{ID}{TITLE} BODY \end{KIND}`. Marker arguments
//! are parsed with balanced braces; the body is opaque text. Nested blocks
//! of the same kind are not supported: the first `\end{KIND}` closes.
//!
//! Callers go through the [`BlockLocator`] trait so the pattern-based
//! scanner can be swapped for a real parser.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::ContentKind;

/// Environment used when wrapping raw selections
pub const GENERIC_KIND: &str = "unit";

fn begin_marker() -> &'static Regex {
    static BEGIN: OnceLock<Regex> = OnceLock::new();
    BEGIN.get_or_init(|| Regex::new(r"\\begin\{([A-Za-z]+\*?)\}").expect("valid begin regex"))
}

/// What to look for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDescriptor {
    pub kind: String,
    pub identifier: String,
    pub title: Option<String>,
}

impl BlockDescriptor {
    pub fn new(kind: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            identifier: identifier.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn matches(&self, block: &Block<'_>) -> bool {
        block.kind == self.kind
            && block.identifier == self.identifier
            && block.title == self.title.as_deref()
    }
}

/// A located block, borrowing from the scanned text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block<'t> {
    pub kind: &'t str,
    pub identifier: &'t str,
    pub title: Option<&'t str>,
    /// Raw body between the marker arguments and `\end{KIND}`
    #[serde(skip)]
    pub raw_body: &'t str,
    /// Whole `\begin...\end` construct
    pub span: Range<usize>,
    pub body_span: Range<usize>,
}

impl<'t> Block<'t> {
    /// Body with surrounding whitespace removed
    pub fn body(&self) -> &'t str {
        self.raw_body.trim()
    }
}

/// First match plus how many blocks matched in total
#[derive(Debug, Clone)]
pub struct BlockMatch<'t> {
    pub block: Block<'t>,
    pub match_count: usize,
}

impl BlockMatch<'_> {
    pub fn is_ambiguous(&self) -> bool {
        self.match_count > 1
    }
}

/// Structural block detection over raw text
pub trait BlockLocator {
    /// First block of a recognised kind starting at or after `from`.
    fn next_block<'t>(&self, text: &'t str, from: usize) -> Option<Block<'t>>;

    /// First block of `desc.kind` at or after `from` whose marker arguments
    /// equal the descriptor. Blocks nested inside other blocks are found too.
    fn next_match<'t>(&self, text: &'t str, from: usize, desc: &BlockDescriptor)
        -> Option<Block<'t>>;
}

/// Read a `{...}` group starting exactly at `pos`. Escaped braces (`\{`)
/// do not count towards nesting. Returns the inner range and the position
/// after the closing brace.
fn brace_group(text: &str, pos: usize) -> Option<(Range<usize>, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(pos) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut i = pos;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((pos + 1..i, i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Regex-assisted scanner for a fixed set of environment kinds.
#[derive(Debug, Clone)]
pub struct PatternLocator {
    /// Kinds whose begin marker carries `{ID}{TITLE}`
    titled: HashSet<String>,
    /// Kinds whose begin marker carries only `{ID}`
    untitled: HashSet<String>,
}

impl Default for PatternLocator {
    fn default() -> Self {
        Self::new(ContentKind::ALL.iter().map(|k| k.env_name()), [GENERIC_KIND])
    }
}

impl PatternLocator {
    pub fn new(
        titled: impl IntoIterator<Item = impl Into<String>>,
        untitled: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            titled: titled.into_iter().map(Into::into).collect(),
            untitled: untitled.into_iter().map(Into::into).collect(),
        }
    }

    /// Recognise additional titled kinds
    pub fn with_titled_kinds(mut self, kinds: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.titled.extend(kinds.into_iter().map(Into::into));
        self
    }

    fn is_known(&self, kind: &str) -> bool {
        self.titled.contains(kind) || self.untitled.contains(kind)
    }

    /// Parse marker arguments and find the end marker for a block whose
    /// `\begin{kind}` spans `start..args_at`.
    fn parse_block<'t>(
        &self,
        text: &'t str,
        start: usize,
        args_at: usize,
        kind: &'t str,
    ) -> Option<Block<'t>> {
        let (id_range, mut pos) = brace_group(text, args_at)?;

        let mut title = None;
        if !self.untitled.contains(kind) {
            if let Some((title_range, next)) = brace_group(text, pos) {
                title = Some(&text[title_range]);
                pos = next;
            }
        }

        let end_marker = format!("\\end{{{}}}", kind);
        let end_at = pos + text[pos..].find(&end_marker)?;

        Some(Block {
            kind,
            identifier: &text[id_range],
            title,
            raw_body: &text[pos..end_at],
            span: start..end_at + end_marker.len(),
            body_span: pos..end_at,
        })
    }
}

impl BlockLocator for PatternLocator {
    fn next_block<'t>(&self, text: &'t str, from: usize) -> Option<Block<'t>> {
        let mut cursor = from;
        while let Some(caps) = begin_marker().captures_at(text, cursor) {
            let marker = caps.get(0)?;
            let kind = caps.get(1)?.as_str();
            cursor = marker.end();

            if !self.is_known(kind) {
                continue;
            }
            if let Some(block) = self.parse_block(text, marker.start(), marker.end(), kind) {
                return Some(block);
            }
        }
        None
    }

    fn next_match<'t>(
        &self,
        text: &'t str,
        from: usize,
        desc: &BlockDescriptor,
    ) -> Option<Block<'t>> {
        let begin = format!("\\begin{{{}}}", desc.kind);
        let mut cursor = from;

        while let Some(offset) = text.get(cursor..)?.find(&begin) {
            let start = cursor + offset;
            let args_at = start + begin.len();
            cursor = args_at;

            let kind = &text[start + "\\begin{".len()..args_at - 1];
            if let Some(block) = self.parse_block(text, start, args_at, kind) {
                if desc.matches(&block) {
                    return Some(block);
                }
            }
        }
        None
    }
}

/// Lazy, restartable sequence of top-level blocks
pub struct Blocks<'l, 't> {
    locator: &'l dyn BlockLocator,
    text: &'t str,
    cursor: usize,
}

impl<'l, 't> Blocks<'l, 't> {
    pub fn new(locator: &'l dyn BlockLocator, text: &'t str) -> Self {
        Self {
            locator,
            text,
            cursor: 0,
        }
    }
}

impl<'t> Iterator for Blocks<'_, 't> {
    type Item = Block<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.locator.next_block(self.text, self.cursor)?;
        self.cursor = block.span.end;
        Some(block)
    }
}

/// Locate the first block matching `desc`, counting all matches.
pub fn locate<'t>(
    locator: &dyn BlockLocator,
    text: &'t str,
    desc: &BlockDescriptor,
) -> Option<BlockMatch<'t>> {
    let first = locator.next_match(text, 0, desc)?;

    let mut match_count = 1;
    let mut cursor = first.span.end;
    while let Some(next) = locator.next_match(text, cursor, desc) {
        match_count += 1;
        cursor = next.span.end;
    }

    Some(BlockMatch {
        block: first,
        match_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r"\section{Limits}
\begin{DEF}{EFT1-K25-01-01}{Limit of a sequence}
A sequence $(a_n)$ converges to $a$ if ...
\end{DEF}

\begin{tabular}{cc} a & b \end{tabular}

\begin{THEO}{EFT1-K25-01-02}{Squeeze $\{x\}$ {nested}}
Body.
\begin{REM}{EFT1-K25-01-03}{Inner}
inner
\end{REM}
\end{THEO}
";

    #[test]
    fn test_brace_group_balanced() {
        let text = "{a{b}c}{d}";
        let (inner, next) = brace_group(text, 0).unwrap();
        assert_eq!(&text[inner], "a{b}c");
        assert_eq!(next, 7);
        assert!(brace_group(text, 1).is_none());
        assert!(brace_group("{open", 0).is_none());
    }

    #[test]
    fn test_top_level_blocks_only() {
        let locator = PatternLocator::default();
        let blocks: Vec<_> = Blocks::new(&locator, DOC).collect();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, "DEF");
        assert_eq!(blocks[0].title, Some("Limit of a sequence"));
        assert_eq!(blocks[0].body(), "A sequence $(a_n)$ converges to $a$ if ...");
        assert_eq!(blocks[1].identifier, "EFT1-K25-01-02");
        assert_eq!(blocks[1].title, Some(r"Squeeze $\{x\}$ {nested}"));
        assert!(blocks[1].body().contains(r"\begin{REM}"));
    }

    #[test]
    fn test_locate_exact_span() {
        let locator = PatternLocator::default();
        let desc = BlockDescriptor::new("DEF", "EFT1-K25-01-01").with_title("Limit of a sequence");

        let found = locate(&locator, DOC, &desc).unwrap();
        assert!(!found.is_ambiguous());
        let span = &DOC[found.block.span.clone()];
        assert!(span.starts_with(r"\begin{DEF}{EFT1-K25-01-01}"));
        assert!(span.ends_with(r"\end{DEF}"));
    }

    #[test]
    fn test_locate_nested_and_mismatch() {
        let locator = PatternLocator::default();

        let nested = BlockDescriptor::new("REM", "EFT1-K25-01-03").with_title("Inner");
        assert_eq!(locate(&locator, DOC, &nested).unwrap().block.body(), "inner");

        let wrong_title = BlockDescriptor::new("DEF", "EFT1-K25-01-01").with_title("Limit");
        assert!(locate(&locator, DOC, &wrong_title).is_none());

        let no_title = BlockDescriptor::new("DEF", "EFT1-K25-01-01");
        assert!(locate(&locator, DOC, &no_title).is_none());
    }

    #[test]
    fn test_duplicates_counted() {
        let text = "\\begin{unit}{A-1-01-01}\nx\n\\end{unit}\n\\begin{unit}{A-1-01-01}\ny\n\\end{unit}";
        let locator = PatternLocator::default();
        let found = locate(&locator, text, &BlockDescriptor::new("unit", "A-1-01-01")).unwrap();

        assert_eq!(found.match_count, 2);
        assert_eq!(found.block.body(), "x");
    }

    #[test]
    fn test_unterminated_block_skipped() {
        let text = "\\begin{DEF}{A-1-01-01}{t}\nno end\n\\begin{EXA}{A-1-01-02}{e}\nok\n\\end{EXA}";
        let locator = PatternLocator::default();
        let blocks: Vec<_> = Blocks::new(&locator, text).collect();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, "EXA");
    }
}
