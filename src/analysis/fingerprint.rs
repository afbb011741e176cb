//! Stable interface/body fingerprints over normalized token streams.
//!
//! Both hashes are SHA-256 digests (truncated to 128 bits) of the tokens
//! of a syntax fragment. Tokens are the leaf texts of the tree-sitter
//! fragment with comments dropped, so whitespace and comment edits never
//! move a hash. Callers strip parameter names before building the
//! interface parts; types, modifiers, order and variadic markers stay.

use sha2::{Digest, Sha256};

/// Body hash of a construct that has no body at all (abstract method,
/// annotation-only field). Never equal to a hex digest.
pub const NO_BODY_HASH: &str = "no-body";

/// Node kinds treated as comments by every supported grammar.
const COMMENT_KINDS: &[&str] = &["comment", "line_comment", "block_comment"];

/// Literal node kinds emitted verbatim so whitespace inside them counts.
const ATOMIC_KINDS: &[&str] = &[
    "string",
    "concatenated_string",
    "string_literal",
    "character_literal",
    "text_block",
];

const SEPARATOR: u8 = 0x1f;

/// Hash an ordered list of parts with a domain tag.
fn digest(domain: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    for part in parts {
        hasher.update([SEPARATOR]);
        hasher.update(part.as_bytes());
    }
    hasher.finalize()[..16]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Fingerprint of a construct's externally visible signature.
///
/// `annotation` is the normalized return/declared type plus non-annotation
/// modifiers, `decorators` are decorator/annotation texts in source order,
/// `params` are normalized parameter entries (or base-class entries for
/// type constructs) with names already removed.
pub fn interface_hash(
    kind: &str,
    annotation: Option<&str>,
    decorators: &[String],
    params: &[String],
) -> String {
    let decorators = decorators.join("\u{1e}");
    let params = params.join("\u{1e}");
    digest(
        "iface",
        &[kind, annotation.unwrap_or(""), &decorators, &params],
    )
}

/// Fingerprint of a construct's implementation. `None` is "no body".
pub fn body_hash(body: Option<&str>) -> String {
    match body {
        Some(tokens) => digest("body", &[tokens]),
        None => NO_BODY_HASH.to_string(),
    }
}

/// Collapse whitespace runs to single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove all whitespace (used for signature text inside qualnames).
pub fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Erase generic arguments from a type reference: `List<T>` -> `List`,
/// `Generic[T]` -> `Generic`, `a.Base<K, V>` -> `a.Base`.
pub fn erase_generics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for ch in text.chars() {
        match ch {
            '<' | '[' => depth += 1,
            '>' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 && !ch.is_whitespace() => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Normalized token stream of a syntax fragment.
///
/// `scope_kinds` lists node kinds whose extent must be marked explicitly
/// because the grammar encodes nesting by indentation (Python `block`).
pub fn node_tokens(node: tree_sitter::Node, source: &[u8], scope_kinds: &[&str]) -> String {
    let mut tokens = Vec::new();
    collect_tokens(node, source, scope_kinds, &mut tokens);
    tokens.join(" ")
}

fn collect_tokens(
    node: tree_sitter::Node,
    source: &[u8],
    scope_kinds: &[&str],
    tokens: &mut Vec<String>,
) {
    let kind = node.kind();
    if COMMENT_KINDS.contains(&kind) {
        return;
    }
    if node.child_count() == 0 || ATOMIC_KINDS.contains(&kind) {
        let text = node.utf8_text(source).unwrap_or("");
        if ATOMIC_KINDS.contains(&kind) {
            tokens.push(text.to_string());
        } else {
            tokens.extend(text.split_whitespace().map(str::to_string));
        }
        return;
    }

    let scoped = scope_kinds.contains(&kind);
    if scoped {
        tokens.push("{".to_string());
    }

    // Text between children (not covered by any leaf) still counts.
    let mut cursor = node.walk();
    let mut last_end = node.start_byte();
    for child in node.children(&mut cursor) {
        push_gap(source, last_end, child.start_byte(), tokens);
        collect_tokens(child, source, scope_kinds, tokens);
        last_end = child.end_byte();
    }
    push_gap(source, last_end, node.end_byte(), tokens);

    if scoped {
        tokens.push("}".to_string());
    }
}

fn push_gap(source: &[u8], start: usize, end: usize, tokens: &mut Vec<String>) {
    if end <= start || end > source.len() {
        return;
    }
    if let Ok(gap) = std::str::from_utf8(&source[start..end]) {
        tokens.extend(gap.split_whitespace().map(str::to_string));
    }
}
