//! Clipboard and drag-and-drop payloads.

use std::ops::BitOr;

use stowage_core::ItemReference;

/// Operations a paste or drop allows, as a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OperationFlags(u8);

impl OperationFlags {
    pub const NONE: Self = Self(0);
    pub const COPY: Self = Self(1);
    pub const MOVE: Self = Self(1 << 1);
    pub const LINK: Self = Self(1 << 2);

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Whether no bits are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for OperationFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Content offered by a clipboard or drag source.
#[derive(Debug, Clone, Default)]
pub struct ClipboardPayload {
    /// Storage items (may include pathless virtual items).
    pub items: Vec<ItemReference>,
    /// Encoded PNG image.
    pub bitmap: Option<Vec<u8>>,
    /// Plain text.
    pub text: Option<String>,
}

impl ClipboardPayload {
    /// Payload of storage items.
    pub fn items(items: Vec<ItemReference>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Payload holding only an image.
    pub fn bitmap(png: Vec<u8>) -> Self {
        Self {
            bitmap: Some(png),
            ..Self::default()
        }
    }

    /// Whether there is nothing to paste.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.bitmap.is_none() && self.text.is_none()
    }
}
