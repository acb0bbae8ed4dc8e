//! Keyboard layout: 27 symbols split into two scan groups.
//!
//! Group A (LEFT) holds the first `split` letters, group B (RIGHT) holds the
//! remaining letters followed by SPACE. With the default split of 14 that is
//! A..N on the left and O..Z plus SPACE on the right.

use crate::types::{ScanGroup, Zone};
use serde::{Deserialize, Serialize};

pub const SYMBOL_COUNT: usize = 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeySymbol {
    Letter(char),
    Space,
}

impl KeySymbol {
    /// Symbol at position `index` of the full alphabet (A..Z, SPACE)
    pub fn from_alphabet_index(index: usize) -> Option<Self> {
        match index {
            0..=25 => Some(Self::Letter((b'A' + index as u8) as char)),
            26 => Some(Self::Space),
            _ => None,
        }
    }

    /// Character appended to the text buffer
    pub fn text(&self) -> char {
        match self {
            Self::Letter(c) => *c,
            Self::Space => ' ',
        }
    }

    /// What the speech collaborator should say
    pub fn spoken(&self) -> String {
        match self {
            Self::Letter(c) => c.to_string(),
            Self::Space => "space".to_string(),
        }
    }

    /// Key cap label for the renderer
    pub fn label(&self) -> String {
        match self {
            Self::Letter(c) => c.to_string(),
            Self::Space => "SPACE".to_string(),
        }
    }
}

impl std::fmt::Display for KeySymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardLayout {
    split: usize,
}

impl Default for KeyboardLayout {
    fn default() -> Self {
        Self { split: 14 }
    }
}

impl KeyboardLayout {
    /// `split` is clamped to leave at least one key in each group
    pub fn with_split(split: usize) -> Self {
        Self {
            split: split.clamp(1, SYMBOL_COUNT - 1),
        }
    }

    pub fn split(&self) -> usize {
        self.split
    }

    pub fn group_size(&self, group: ScanGroup) -> usize {
        match group {
            ScanGroup::A => self.split,
            ScanGroup::B => SYMBOL_COUNT - self.split,
        }
    }

    /// Symbol at `index` within `group`; the index wraps at the group size
    pub fn symbol_at(&self, group: ScanGroup, index: usize) -> KeySymbol {
        let offset = index % self.group_size(group);
        let absolute = match group {
            ScanGroup::A => offset,
            ScanGroup::B => self.split + offset,
        };
        KeySymbol::from_alphabet_index(absolute).unwrap_or(KeySymbol::Space)
    }

    /// Zone-level convenience; CENTER has no keys
    pub fn zone_symbol(&self, zone: Zone, index: usize) -> Option<KeySymbol> {
        zone.scan_group().map(|group| self.symbol_at(group, index))
    }

    pub fn group(&self, group: ScanGroup) -> impl Iterator<Item = KeySymbol> + '_ {
        (0..self.group_size(group)).map(move |i| self.symbol_at(group, i))
    }
}
