//! Patch blocks as emitted by the suggestion oracle.

use serde::{Deserialize, Serialize};

/// An exact-match search/replace instruction.
///
/// The target location is identified only by the literal bytes of
/// `search_text`; there is no line anchoring and no pattern syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchBlock {
    pub search_text: String,
    pub replace_text: String,
}

impl PatchBlock {
    pub fn new(search_text: impl Into<String>, replace_text: impl Into<String>) -> Self {
        Self {
            search_text: search_text.into(),
            replace_text: replace_text.into(),
        }
    }

    /// A block with an empty search text would match everywhere.
    pub fn is_malformed(&self) -> bool {
        self.search_text.is_empty()
    }
}

/// Ordered blocks for a single finding, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSet {
    pub blocks: Vec<PatchBlock>,
}

impl PatchSet {
    pub fn new(blocks: Vec<PatchBlock>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchBlock> {
        self.blocks.iter()
    }
}

impl FromIterator<PatchBlock> for PatchSet {
    fn from_iter<I: IntoIterator<Item = PatchBlock>>(iter: I) -> Self {
        Self {
            blocks: iter.into_iter().collect(),
        }
    }
}
