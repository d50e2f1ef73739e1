//! Shared annotation data model: entity mentions and relation candidates.
//!
//! Offsets are character offsets (Unicode scalar values), half-open.

use serde::{Deserialize, Serialize};

/// Class id of the protein/location "located in" relation.
pub const REL_PRO_LOC_ID: &str = "r_5";

/// Semantic class of an entity mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityClass {
    Protein,
    Location,
    Organism,
}

impl EntityClass {
    pub fn class_id(&self) -> &'static str {
        match self {
            EntityClass::Protein => "e_1",
            EntityClass::Location => "e_2",
            EntityClass::Organism => "e_3",
        }
    }

    pub fn from_class_id(class_id: &str) -> Option<Self> {
        match class_id {
            "e_1" => Some(EntityClass::Protein),
            "e_2" => Some(EntityClass::Location),
            "e_3" => Some(EntityClass::Organism),
            _ => None,
        }
    }
}

/// A recognized span of text with its class and normalization ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub class: EntityClass,
    pub text: String,
    pub offset: usize,
    #[serde(default)]
    pub norms: Vec<String>,
}

impl Entity {
    pub fn new(class: EntityClass, text: impl Into<String>, offset: usize, norms: Vec<String>) -> Self {
        Self {
            class,
            text: text.into(),
            offset,
            norms,
        }
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Exclusive end offset, `None` on overflow.
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.len())
    }
}

/// A predicted link between two entity mentions.
///
/// Side order follows production order, not class: either side may be the protein.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub entity1: Entity,
    pub entity2: Entity,
    pub class_id: String,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the character at `char_idx`, or `text.len()` past the end.
pub fn byte_index(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

/// Slice `text` by half-open character offsets.
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let start_byte = byte_index(text, start);
    let end_byte = byte_index(text, end);
    &text[start_byte..end_byte.max(start_byte)]
}
