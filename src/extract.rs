//! Fenced code block extraction
//!
//! Pulls triple-backtick regions out of finished assistant text so callers
//! can push them into an editor. Pure and deterministic: no I/O.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Separator placed between blocks when they are joined
const BLOCK_SEPARATOR: &str = "\n\n";

/// One fenced region, delimiters included
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    /// Language tag following the opening fence, if any
    pub language: Option<String>,
    /// The full matched region including both fences
    pub fenced: String,
    /// Text between the fences, without the language tag line
    pub body: String,
}

// Non-greedy so each opening fence pairs with the next closing fence.
static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").expect("fence regex is valid"));

/// Extract fenced code blocks in order of appearance.
///
/// An opening fence with no closing fence is not a block.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    FENCE
        .captures_iter(text)
        .map(|caps| {
            let fenced = caps.get(0).map_or("", |m| m.as_str()).to_string();
            let inner = caps.get(1).map_or("", |m| m.as_str());
            let (language, body) = split_language_tag(inner);
            CodeBlock {
                language,
                fenced,
                body,
            }
        })
        .collect()
}

/// Join blocks with a blank line between them; `None` when there are none
pub fn join_code_blocks(blocks: &[CodeBlock]) -> Option<String> {
    if blocks.is_empty() {
        return None;
    }
    Some(
        blocks
            .iter()
            .map(|b| b.fenced.as_str())
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR),
    )
}

/// Convenience for the common "give me the code, if any" case
pub fn extract_code(text: &str) -> Option<String> {
    join_code_blocks(&extract_code_blocks(text))
}

/// Split `js\nconsole.log(1)\n` into (`Some("js")`, `console.log(1)\n`).
///
/// Only a tag on the same line as the opening fence counts; inline fences
/// such as ```` ```x``` ```` have no tag and keep their text as the body.
fn split_language_tag(inner: &str) -> (Option<String>, String) {
    match inner.split_once('\n') {
        Some((first, rest)) => {
            let tag = first.trim();
            let language = (!tag.is_empty() && !tag.contains(char::is_whitespace))
                .then(|| tag.to_string());
            if language.is_some() || tag.is_empty() {
                (language, rest.to_string())
            } else {
                (None, inner.to_string())
            }
        }
        None => (None, inner.to_string()),
    }
}
