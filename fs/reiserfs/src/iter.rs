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

//! Item-level iteration above the tree navigator: every item in key order
//! ([`ItemIterator`]), every item belonging to one object
//! ([`ObjectItemIterator`]), and every directory entry belonging to one
//! directory, optionally restricted to a single name hash
//! ([`DirEntryIterator`]) (spec. §4.5).

use crate::block::RawBlockSource;
use crate::error::Result;
use crate::hash::hash_value_of_offset;
use crate::item::DirItem;
use crate::key::{ItemType, Key, KeyFormat, VKey};
use crate::tree::{Tree, TreePath};

/// Walks every item in the tree in key order, starting from the first item
/// not less than a given key.
pub struct ItemIterator<'a, S: RawBlockSource> {
    tree: &'a Tree<'a, S>,
    path: Option<TreePath<'a, S>>,
}

impl<'a, S: RawBlockSource> ItemIterator<'a, S> {
    pub fn starting_at(tree: &'a Tree<'a, S>, key: &VKey, compare_types: bool) -> Result<ItemIterator<'a, S>> {
        let path = tree.search(key, compare_types)?;
        Ok(ItemIterator { tree, path: Some(path) })
    }

    pub fn is_valid(&self) -> bool {
        self.path.is_some()
    }

    pub fn key(&self) -> Result<Key> {
        let path = self.path.as_ref().expect("advance past the end before reading");
        path.leaf_node()?.key(path.item_index)
    }

    pub fn body(&self) -> Result<&[u8]> {
        let path = self.path.as_ref().expect("advance past the end before reading");
        path.leaf_node()?.item_body(path.item_index)
    }

    /// The entry-count field every directory item's header stores in place
    /// of the unused "free space reserved" field for other item types.
    pub fn entry_count(&self) -> Result<usize> {
        let path = self.path.as_ref().expect("advance past the end before reading");
        let ih = path.leaf_node()?.item_head(path.item_index)?;
        Ok(ih.free_space_reserved_or_entry_count.get() as usize)
    }

    /// Steps to the next item in key order, crossing leaf boundaries as
    /// needed. Returns `false` once the tree is exhausted.
    pub fn advance(&mut self) -> Result<bool> {
        let Some(mut path) = self.path.take() else {
            return Ok(false);
        };
        let count = path.leaf_node()?.item_count();
        if path.item_index + 1 < count {
            path.item_index += 1;
            self.path = Some(path);
            return Ok(true);
        }
        match self.tree.next_leaf(&path)? {
            Some(next) => {
                self.path = Some(next);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Walks every item belonging to a single object, in offset order, starting
/// from its stat-data item.
pub struct ObjectItemIterator<'a, S: RawBlockSource> {
    inner: ItemIterator<'a, S>,
    dir_id: u32,
    object_id: u32,
}

impl<'a, S: RawBlockSource> ObjectItemIterator<'a, S> {
    pub fn new(tree: &'a Tree<'a, S>, dir_id: u32, object_id: u32, format: KeyFormat) -> Result<ObjectItemIterator<'a, S>> {
        let start = VKey::new(dir_id, object_id, crate::SD_OFFSET, ItemType::StatData, format);
        let mut inner = ItemIterator::starting_at(tree, &start, false)?;
        if inner.is_valid() {
            let key = inner.key()?;
            if key.dir_id != dir_id || key.object_id != object_id {
                inner.path = None;
            }
        }
        Ok(ObjectItemIterator { inner, dir_id, object_id })
    }

    pub fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    pub fn key(&self) -> Result<Key> {
        self.inner.key()
    }

    pub fn body(&self) -> Result<&[u8]> {
        self.inner.body()
    }

    pub fn entry_count(&self) -> Result<usize> {
        self.inner.entry_count()
    }

    pub fn advance(&mut self) -> Result<bool> {
        if !self.inner.advance()? {
            return Ok(false);
        }
        let key = self.inner.key()?;
        if key.dir_id != self.dir_id || key.object_id != self.object_id {
            self.inner.path = None;
            return Ok(false);
        }
        Ok(true)
    }
}

/// A single directory entry together with its owning item's name-hash
/// format, for listing or lookup.
pub struct DirEntryIterator<'a, S: RawBlockSource> {
    items: ObjectItemIterator<'a, S>,
    entry_index: usize,
    /// Restricts iteration to entries whose key offset carries this hash
    /// value, for a by-name lookup; `None` lists every entry (spec. §4.5).
    fixed_hash: Option<u32>,
}

impl<'a, S: RawBlockSource> DirEntryIterator<'a, S> {
    pub fn new(tree: &'a Tree<'a, S>, dir_id: u32, object_id: u32, format: KeyFormat) -> Result<DirEntryIterator<'a, S>> {
        let mut items = ObjectItemIterator::new(tree, dir_id, object_id, format)?;
        Self::skip_to_dir_item(&mut items)?;
        Ok(DirEntryIterator { items, entry_index: 0, fixed_hash: None })
    }

    /// Positions the iterator at the first directory entry whose offset
    /// carries `hash_value`, by linear-scanning entries in their stored
    /// (ascending-offset) order; entries are restricted to that hash bucket
    /// from here on.
    pub fn starting_at_hash(tree: &'a Tree<'a, S>, dir_id: u32, object_id: u32, format: KeyFormat, hash_value: u32) -> Result<DirEntryIterator<'a, S>> {
        let mut it = DirEntryIterator::new(tree, dir_id, object_id, format)?;
        while it.is_valid() {
            let offset = it.current_key_offset()?;
            if hash_value_of_offset(offset as u32) >= hash_value {
                break;
            }
            if !it.step()? {
                break;
            }
        }
        it.fixed_hash = Some(hash_value);
        Ok(it)
    }

    fn step(&mut self) -> Result<bool> {
        let count = self.items.entry_count()?;
        if self.entry_index + 1 < count {
            self.entry_index += 1;
            Ok(true)
        } else if self.items.advance()? {
            self.entry_index = 0;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// An object's first item is always its stat data, at `SD_OFFSET`; a
    /// directory's remaining items are all directory items, so a single
    /// step past it lands on the first one (if any).
    fn skip_to_dir_item(items: &mut ObjectItemIterator<'a, S>) -> Result<()> {
        if items.is_valid() {
            items.advance()?;
        }
        Ok(())
    }

    fn current_key_offset(&self) -> Result<u64> {
        Ok(self.current()?.offset() as u64)
    }

    pub fn is_valid(&self) -> bool {
        self.items.is_valid()
    }

    pub fn current(&self) -> Result<crate::item::DirEntry<'_>> {
        let body = self.items.body()?;
        let count = self.items.entry_count()?;
        DirItem::new(body, count).entry(self.entry_index)
    }

    pub fn advance(&mut self) -> Result<bool> {
        if !self.step()? {
            return Ok(false);
        }
        if let Some(hash_value) = self.fixed_hash {
            let offset = self.current_key_offset()?;
            if hash_value_of_offset(offset as u32) != hash_value {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
