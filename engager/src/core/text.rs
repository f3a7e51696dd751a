//! Text assembly for extracted feed items.

/// Assemble item text from raw DOM fragments.
///
/// Fragments are trimmed, dropped when shorter than `min_fragment_chars`
/// (filters UI chrome like "Like" / "Reply"), and de-duplicated: a fragment
/// that repeats, or is wholly contained in an already-kept fragment, is
/// skipped (platforms duplicate visible text into accessibility nodes).
/// Kept fragments join with newlines; the author name, if present, prefixes
/// the result on its own line.
pub fn assemble_text(
    author: Option<&str>,
    fragments: &[String],
    min_fragment_chars: usize,
) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for fragment in fragments {
        let trimmed = fragment.trim();
        if trimmed.chars().count() < min_fragment_chars {
            continue;
        }
        if kept.iter().any(|seen| seen.contains(trimmed)) {
            continue;
        }
        kept.push(trimmed);
    }

    let body = kept.join("\n");
    match author.map(str::trim).filter(|a| !a.is_empty()) {
        Some(author) if !body.is_empty() => format!("{author}\n{body}"),
        Some(author) => author.to_string(),
        None => body,
    }
}

/// First `max_chars` characters of `text`, respecting char boundaries.
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
