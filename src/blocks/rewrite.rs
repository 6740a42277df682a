//! Block rewrites over raw document text.
//!
//! All functions are pure: they take the current text and return the new
//! text. Persisting the result is the caller's job.

use tracing::{debug, warn};

use super::locator::{locate, BlockDescriptor, BlockLocator, Blocks};
use crate::error::{DeckError, DeckResult};

/// Render a complete block with a trimmed body
pub fn render_block(kind: &str, identifier: &str, title: Option<&str>, body: &str) -> String {
    let mut out = format!("\\begin{{{}}}{{{}}}", kind, identifier);
    if let Some(title) = title {
        out.push_str(&format!("{{{}}}", title));
    }
    out.push('\n');
    let body = body.trim();
    if !body.is_empty() {
        out.push_str(body);
        out.push('\n');
    }
    out.push_str(&format!("\\end{{{}}}", kind));
    out
}

/// Replace the body of the first block matching `desc`, keeping its
/// kind, identifier and title.
pub fn replace_body(
    locator: &dyn BlockLocator,
    text: &str,
    desc: &BlockDescriptor,
    new_body: &str,
) -> DeckResult<String> {
    let found = locate(locator, text, desc).ok_or_else(|| DeckError::BlockNotFound {
        kind: desc.kind.clone(),
        identifier: desc.identifier.clone(),
    })?;

    if found.is_ambiguous() {
        warn!(
            identifier = %desc.identifier,
            matches = found.match_count,
            "Several blocks match, rewriting the first"
        );
    }

    let block = found.block;
    let rendered = render_block(block.kind, block.identifier, block.title, new_body);

    let mut out = String::with_capacity(text.len() + new_body.len());
    out.push_str(&text[..block.span.start]);
    out.push_str(&rendered);
    out.push_str(&text[block.span.end..]);

    debug!(identifier = %desc.identifier, "Replaced block body");
    Ok(out)
}

/// Wrap the first literal occurrence of `selection` in a block of
/// `kind` carrying `identifier`. Matching is exact, whitespace included,
/// and the selection is written into the block unchanged.
pub fn wrap_selection(
    text: &str,
    selection: &str,
    identifier: &str,
    kind: &str,
) -> DeckResult<String> {
    if selection.is_empty() {
        return Err(DeckError::SelectionNotFound);
    }
    let start = text.find(selection).ok_or(DeckError::SelectionNotFound)?;
    let end = start + selection.len();

    let mut out = String::with_capacity(text.len() + identifier.len() + 32);
    out.push_str(&text[..start]);
    out.push_str(&format!("\\begin{{{}}}{{{}}}\n", kind, identifier));
    out.push_str(selection);
    if !selection.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&format!("\\end{{{}}}", kind));
    out.push_str(&text[end..]);

    debug!(identifier, "Wrapped selection");
    Ok(out)
}

/// Every top-level block of a recognised kind, in document order
pub fn extract_all<'l, 't>(locator: &'l dyn BlockLocator, text: &'t str) -> Blocks<'l, 't> {
    Blocks::new(locator, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::locator::{PatternLocator, GENERIC_KIND};

    const DOC: &str = "intro\n\\begin{DEF}{EFT1-K25-01-01}{Limit}\n% TODO: fill in content\n\\end{DEF}\noutro\n";

    #[test]
    fn test_replace_body_round_trip() {
        let locator = PatternLocator::default();
        let desc = BlockDescriptor::new("DEF", "EFT1-K25-01-01").with_title("Limit");

        let updated = replace_body(&locator, DOC, &desc, "  $a_n \\to a$  \n").unwrap();
        let found = locate(&locator, &updated, &desc).unwrap();

        assert_eq!(found.block.body(), "$a_n \\to a$");
        assert_eq!(found.block.title, Some("Limit"));
        assert!(updated.starts_with("intro\n"));
        assert!(updated.ends_with("\\end{DEF}\noutro\n"));
    }

    #[test]
    fn test_replace_body_missing_block() {
        let locator = PatternLocator::default();
        let desc = BlockDescriptor::new("DEF", "EFT1-K25-01-09").with_title("Limit");

        assert!(matches!(
            replace_body(&locator, DOC, &desc, "x"),
            Err(DeckError::BlockNotFound { .. })
        ));
    }

    #[test]
    fn test_wrap_selection() {
        let text = "Some prose.\nLet f be continuous.\nMore prose.";
        let wrapped = wrap_selection(text, "Let f be continuous.", "A-1-02-03", GENERIC_KIND).unwrap();

        assert_eq!(
            wrapped,
            "Some prose.\n\\begin{unit}{A-1-02-03}\nLet f be continuous.\n\\end{unit}\nMore prose."
        );

        let locator = PatternLocator::default();
        let found = locate(&locator, &wrapped, &BlockDescriptor::new("unit", "A-1-02-03")).unwrap();
        assert_eq!(found.block.body(), "Let f be continuous.");
    }

    #[test]
    fn test_wrap_selection_keeps_whitespace() {
        let text = "Intro:\n    indented line\n  second\nOutro.";
        let wrapped =
            wrap_selection(text, "    indented line\n  second\n", "A-1-02-04", GENERIC_KIND).unwrap();

        assert_eq!(
            wrapped,
            "Intro:\n\\begin{unit}{A-1-02-04}\n    indented line\n  second\n\\end{unit}Outro."
        );
    }

    #[test]
    fn test_wrap_selection_is_exact() {
        let text = "Let f be continuous.";
        assert!(matches!(
            wrap_selection(text, " Let f be continuous.", "A-1-02-03", GENERIC_KIND),
            Err(DeckError::SelectionNotFound)
        ));
        assert!(matches!(
            wrap_selection(text, "", "A-1-02-03", GENERIC_KIND),
            Err(DeckError::SelectionNotFound)
        ));
    }

    #[test]
    fn test_extract_all_is_restartable() {
        let locator = PatternLocator::default();
        let first: Vec<_> = extract_all(&locator, DOC).map(|b| b.identifier).collect();
        let second: Vec<_> = extract_all(&locator, DOC).map(|b| b.identifier).collect();

        assert_eq!(first, vec!["EFT1-K25-01-01"]);
        assert_eq!(first, second);
    }
}
