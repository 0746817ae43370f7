//! Exact-match SEARCH/REPLACE patch application.
//!
//! Suggestion text may contain any number of blocks of the form
//!
//! ```text
//! <<<<<<< SEARCH
//! <verbatim original text>
//! =======
//! <replacement text>
//! >>>>>>> REPLACE
//! ```
//!
//! surrounded by arbitrary prose, which is ignored. Blocks are applied in
//! emission order, each against the output of the previous one. Every
//! non-overlapping occurrence of a block's search text is replaced. A block
//! that does not match, or whose search text is empty, is skipped with a
//! warning; application never fails.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{PatchBlock, PatchSet};

pub const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
pub const DIVIDER_MARKER: &str = "=======";
pub const REPLACE_MARKER: &str = ">>>>>>> REPLACE";

/// What happened to one block during application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockOutcome {
    /// The search text was found and every occurrence replaced.
    Applied { index: usize, occurrences: usize },
    /// The search text does not occur in the current content.
    NotFound { index: usize },
    /// The block had an empty search text and was rejected.
    EmptySearch { index: usize },
}

impl BlockOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, BlockOutcome::Applied { .. })
    }
}

/// Result of applying a patch set to a piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchApplication {
    pub content: String,
    pub blocks: Vec<BlockOutcome>,
}

impl PatchApplication {
    pub fn applied_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_applied()).count()
    }
}

enum ParseState {
    Outside,
    Search { search: String },
    Replace { search: String, replace: String },
}

/// Marker lines are compared after trimming trailing whitespace and line endings.
fn marker_of(line: &str) -> &str {
    line.trim_end()
}

/// Drop the line terminator that precedes the next marker line.
fn strip_terminator(mut text: String) -> String {
    if text.ends_with("\r\n") {
        text.truncate(text.len() - 2);
    } else if text.ends_with('\n') {
        text.truncate(text.len() - 1);
    }
    text
}

/// Extract the ordered blocks from suggestion text.
///
/// Text outside recognized blocks is ignored. A block left open at the end of
/// the text is discarded.
pub fn parse_patch_set(text: &str) -> PatchSet {
    let mut blocks = Vec::new();
    let mut state = ParseState::Outside;

    for line in text.split_inclusive('\n') {
        let marker = marker_of(line);
        state = match state {
            ParseState::Outside => {
                if marker == SEARCH_MARKER {
                    ParseState::Search {
                        search: String::new(),
                    }
                } else {
                    ParseState::Outside
                }
            }
            ParseState::Search { mut search } => {
                if marker == DIVIDER_MARKER {
                    ParseState::Replace {
                        search,
                        replace: String::new(),
                    }
                } else if marker == SEARCH_MARKER {
                    warn!("patch block restarted before its divider; discarding partial block");
                    ParseState::Search {
                        search: String::new(),
                    }
                } else {
                    search.push_str(line);
                    ParseState::Search { search }
                }
            }
            ParseState::Replace {
                search,
                mut replace,
            } => {
                if marker == REPLACE_MARKER {
                    blocks.push(PatchBlock::new(
                        strip_terminator(search),
                        strip_terminator(replace),
                    ));
                    ParseState::Outside
                } else {
                    replace.push_str(line);
                    ParseState::Replace { search, replace }
                }
            }
        };
    }

    if !matches!(state, ParseState::Outside) {
        warn!("suggestion ended inside an unterminated patch block; block discarded");
    }

    PatchSet::new(blocks)
}

/// Applies SEARCH/REPLACE suggestions to file content.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchApplier;

impl PatchApplier {
    /// Parse `suggestion` and apply its blocks to `content`.
    ///
    /// Returns content identical to the input when nothing applied.
    pub fn apply(content: &str, suggestion: &str) -> String {
        Self::apply_with_report(content, suggestion).content
    }

    /// Like [`PatchApplier::apply`], also reporting what each block did.
    pub fn apply_with_report(content: &str, suggestion: &str) -> PatchApplication {
        let set = parse_patch_set(suggestion);
        if set.is_empty() {
            debug!("suggestion contained no patch blocks");
        }
        Self::apply_set(content, &set)
    }

    /// Apply an already-parsed patch set.
    pub fn apply_set(content: &str, set: &PatchSet) -> PatchApplication {
        let mut current = content.to_string();
        let mut outcomes = Vec::with_capacity(set.len());

        for (index, block) in set.iter().enumerate() {
            if block.is_malformed() {
                warn!(block = index + 1, "patch block has empty search text; skipped");
                outcomes.push(BlockOutcome::EmptySearch { index });
                continue;
            }

            let occurrences = current.matches(block.search_text.as_str()).count();
            if occurrences == 0 {
                warn!(
                    block = index + 1,
                    search = %truncate_for_log(&block.search_text),
                    "patch block search text not found; exact match required"
                );
                outcomes.push(BlockOutcome::NotFound { index });
                continue;
            }

            current = current.replace(block.search_text.as_str(), &block.replace_text);
            outcomes.push(BlockOutcome::Applied { index, occurrences });
        }

        PatchApplication {
            content: current,
            blocks: outcomes,
        }
    }
}

/// Truncate a string for log output (UTF-8 safe).
pub fn truncate_for_log(s: &str) -> String {
    const MAX_CHARS: usize = 100;
    if s.chars().count() <= MAX_CHARS {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(MAX_CHARS).collect::<String>())
    }
}

/// Render a single-hunk unified diff between two versions of a file.
///
/// Lines shared at the start and end are elided; everything between is shown
/// as removed then added. Returns an empty string when the inputs are equal.
pub fn unified_diff(path: &str, original: &str, candidate: &str) -> String {
    if original == candidate {
        return String::new();
    }

    let old: Vec<&str> = original.split_inclusive('\n').collect();
    let new: Vec<&str> = candidate.split_inclusive('\n').collect();

    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let removed = &old[prefix..old.len() - suffix];
    let added = &new[prefix..new.len() - suffix];

    let mut out = format!(
        "--- a/{path}\n+++ b/{path}\n@@ -{},{} +{},{} @@\n",
        prefix + 1,
        removed.len(),
        prefix + 1,
        added.len()
    );
    for line in removed {
        out.push('-');
        out.push_str(line);
        if !line.ends_with('\n') {
            out.push('\n');
        }
    }
    for line in added {
        out.push('+');
        out.push_str(line);
        if !line.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}
