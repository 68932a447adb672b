// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The 16-byte on-disk key and its two tail encodings (spec. §3, "Key").
//!
//! The format of a key is never stored in the key itself; it travels
//! alongside it (an item header's `version` field, or a guess for a
//! standalone key). [`VKey`] is the format-tagged, logical view: comparisons
//! operate on `(dir_id, object_id, offset)` unless the type is explicitly
//! requested too, mirroring `Key`/`VKey` in the source this is grounded on.

use crate::format::RawKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyFormat {
    V1,
    V2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemType {
    StatData,
    Indirect,
    Direct,
    DirEntry,
    Any,
}

impl ItemType {
    fn from_v1_uniqueness(uniqueness: u32) -> ItemType {
        match uniqueness {
            0 => ItemType::StatData,
            0xFFFF_FFFE => ItemType::Indirect,
            0xFFFF_FFFF => ItemType::Direct,
            500 => ItemType::DirEntry,
            _ => ItemType::Any,
        }
    }

    fn to_v1_uniqueness(self) -> u32 {
        match self {
            ItemType::StatData => 0,
            ItemType::Indirect => 0xFFFF_FFFE,
            ItemType::Direct => 0xFFFF_FFFF,
            ItemType::DirEntry => 500,
            ItemType::Any => 555,
        }
    }

    fn from_v2_type(type_bits: u64) -> ItemType {
        match type_bits {
            0 => ItemType::StatData,
            1 => ItemType::Indirect,
            2 => ItemType::Direct,
            3 => ItemType::DirEntry,
            _ => ItemType::Any,
        }
    }

    fn to_v2_type(self) -> u64 {
        match self {
            ItemType::StatData => 0,
            ItemType::Indirect => 1,
            ItemType::Direct => 2,
            ItemType::DirEntry => 3,
            ItemType::Any => 15,
        }
    }

    fn is_known_v2_type(type_bits: u64) -> bool {
        matches!(type_bits, 0 | 1 | 2 | 3 | 15)
    }
}

const V2_OFFSET_MASK: u64 = (1 << 60) - 1;

/// A raw key together with a known format. Does not itself implement
/// ordering; use [`VKey`] for that.
#[derive(Clone, Copy, Debug)]
pub struct Key {
    pub dir_id: u32,
    pub object_id: u32,
    raw_tail: u64,
}

impl Key {
    pub fn from_raw(raw: &RawKey) -> Key {
        Key {
            dir_id: raw.dir_id.get(),
            object_id: raw.object_id.get(),
            raw_tail: raw.tail.get(),
        }
    }

    /// "3.6 if the packed type is a known v2 type, else 3.5" (spec. §3).
    pub fn guess_format(&self) -> KeyFormat {
        let v2_type = self.raw_tail >> 60;
        if ItemType::is_known_v2_type(v2_type) {
            KeyFormat::V2
        } else {
            KeyFormat::V1
        }
    }

    pub fn offset(&self, format: KeyFormat) -> u64 {
        match format {
            KeyFormat::V1 => self.raw_tail & 0xFFFF_FFFF,
            KeyFormat::V2 => self.raw_tail & V2_OFFSET_MASK,
        }
    }

    pub fn item_type(&self, format: KeyFormat) -> ItemType {
        match format {
            KeyFormat::V1 => ItemType::from_v1_uniqueness((self.raw_tail >> 32) as u32),
            KeyFormat::V2 => ItemType::from_v2_type(self.raw_tail >> 60),
        }
    }

    pub fn to_vkey(&self, format: KeyFormat) -> VKey {
        VKey {
            dir_id: self.dir_id,
            object_id: self.object_id,
            offset: self.offset(format),
            item_type: self.item_type(format),
            format,
        }
    }
}

/// A versioned, logical key: `(dir_id, object_id, offset[, type])`, format
/// already resolved. This is what the tree navigator and iterators compare
/// and search with.
#[derive(Clone, Copy, Debug)]
pub struct VKey {
    pub dir_id: u32,
    pub object_id: u32,
    pub offset: u64,
    pub item_type: ItemType,
    pub format: KeyFormat,
}

impl VKey {
    pub fn new(dir_id: u32, object_id: u32, offset: u64, item_type: ItemType, format: KeyFormat) -> VKey {
        VKey { dir_id, object_id, offset, item_type, format }
    }

    pub fn to_raw(&self) -> RawKey {
        let tail = match self.format {
            KeyFormat::V1 => (self.offset & 0xFFFF_FFFF) | (self.item_type.to_v1_uniqueness() as u64) << 32,
            KeyFormat::V2 => (self.offset & V2_OFFSET_MASK) | (self.item_type.to_v2_type() << 60),
        };
        RawKey {
            dir_id: self.dir_id.into(),
            object_id: self.object_id.into(),
            tail: tail.into(),
        }
    }

    /// Compares `(dir_id, object_id, offset)`, and `type` only if
    /// `compare_types` is set — matching `VKey::Compare` in the source,
    /// whose bare `<`/`==` operators never look at type.
    pub fn compare(&self, other: &VKey, compare_types: bool) -> core::cmp::Ordering {
        use core::cmp::Ordering;
        match self.dir_id.cmp(&other.dir_id) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.object_id.cmp(&other.object_id) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.offset.cmp(&other.offset) {
            Ordering::Equal => {}
            ord => return ord,
        }
        if compare_types {
            (self.item_type.to_v2_type()).cmp(&other.item_type.to_v2_type())
        } else {
            Ordering::Equal
        }
    }
}

impl PartialEq for VKey {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other, false) == core::cmp::Ordering::Equal
    }
}
impl Eq for VKey {}

impl PartialOrd for VKey {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for VKey {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.compare(other, false)
    }
}
