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

//! Zero-copy views over a formatted block: an internal node's key/child
//! arrays, or a leaf node's item-head/item-body arrays (spec. §4.2).

use zerocopy::FromBytes;

use crate::error::{Error, Result};
use crate::format::{BlockHead, DiskChild, ItemHead, RawKey, BLOCK_HEAD_SIZE, DISK_CHILD_SIZE, ITEM_HEAD_SIZE};
use crate::key::Key;

/// The level value a leaf carries; every internal node has a strictly
/// greater level, root down to leaves.
pub const DISK_LEAF_NODE_LEVEL: u16 = 1;

pub(crate) fn block_head(data: &[u8]) -> Result<&BlockHead> {
    let prefix = data.get(..BLOCK_HEAD_SIZE).ok_or(Error::BadData)?;
    BlockHead::ref_from_bytes(prefix).map_err(|_| Error::BadData)
}

/// A leaf node: `item_count` fixed-size item headers immediately following
/// the block header, and the item bodies they reference, packed toward the
/// end of the block.
pub struct LeafNode<'a> {
    data: &'a [u8],
    head: &'a BlockHead,
}

impl<'a> LeafNode<'a> {
    pub fn new(data: &'a [u8]) -> Result<LeafNode<'a>> {
        Ok(LeafNode { data, head: block_head(data)? })
    }

    pub fn level(&self) -> u16 {
        self.head.level.get()
    }

    pub fn item_count(&self) -> usize {
        self.head.item_count.get() as usize
    }

    pub fn item_head(&self, index: usize) -> Result<&'a ItemHead> {
        if index >= self.item_count() {
            return Err(Error::BadData);
        }
        let start = BLOCK_HEAD_SIZE + index * ITEM_HEAD_SIZE;
        let slice = self.data.get(start..start + ITEM_HEAD_SIZE).ok_or(Error::BadData)?;
        ItemHead::ref_from_bytes(slice).map_err(|_| Error::BadData)
    }

    pub fn key(&self, index: usize) -> Result<Key> {
        Ok(Key::from_raw(&self.item_head(index)?.key))
    }

    pub fn item_body(&self, index: usize) -> Result<&'a [u8]> {
        let ih = self.item_head(index)?;
        let location = ih.item_location.get() as usize;
        let len = ih.item_len.get() as usize;
        self.data.get(location..location + len).ok_or(Error::BadData)
    }

    /// The structural check the block cache runs once per residency before
    /// a block is ever treated as a leaf (spec. §4.1/§4.2): level tag,
    /// header array in bounds, and every item body in bounds and
    /// non-overlapping.
    pub fn check(data: &[u8], block_size: u32) -> Result<()> {
        let node = LeafNode::new(data)?;
        if node.level() != DISK_LEAF_NODE_LEVEL {
            return Err(Error::BadData);
        }
        let count = node.item_count();
        if BLOCK_HEAD_SIZE + count * ITEM_HEAD_SIZE > block_size as usize {
            return Err(Error::BadData);
        }
        let mut prev_start = block_size as usize;
        for i in 0..count {
            let ih = node.item_head(i)?;
            let location = ih.item_location.get() as usize;
            let len = ih.item_len.get() as usize;
            let end = location.checked_add(len).ok_or(Error::BadData)?;
            if end > block_size as usize || end > prev_start {
                return Err(Error::BadData);
            }
            prev_start = location;
        }
        Ok(())
    }
}

/// An internal node: `key_count` keys immediately following the block
/// header, then `key_count + 1` child pointers immediately following the
/// keys.
pub struct InternalNode<'a> {
    data: &'a [u8],
    head: &'a BlockHead,
}

impl<'a> InternalNode<'a> {
    pub fn new(data: &'a [u8]) -> Result<InternalNode<'a>> {
        Ok(InternalNode { data, head: block_head(data)? })
    }

    pub fn level(&self) -> u16 {
        self.head.level.get()
    }

    pub fn key_count(&self) -> usize {
        self.head.item_count.get() as usize
    }

    pub fn key(&self, index: usize) -> Result<Key> {
        if index >= self.key_count() {
            return Err(Error::BadData);
        }
        let start = BLOCK_HEAD_SIZE + index * core::mem::size_of::<RawKey>();
        let slice = self
            .data
            .get(start..start + core::mem::size_of::<RawKey>())
            .ok_or(Error::BadData)?;
        let raw = RawKey::ref_from_bytes(slice).map_err(|_| Error::BadData)?;
        Ok(Key::from_raw(raw))
    }

    /// `index` ranges over `0..=key_count()`: the child left of `key(0)`,
    /// between successive keys, and right of the last key.
    pub fn child(&self, index: usize) -> Result<DiskChild> {
        if index > self.key_count() {
            return Err(Error::BadData);
        }
        let keys_end = BLOCK_HEAD_SIZE + self.key_count() * core::mem::size_of::<RawKey>();
        let start = keys_end + index * DISK_CHILD_SIZE;
        let slice = self.data.get(start..start + DISK_CHILD_SIZE).ok_or(Error::BadData)?;
        let child = DiskChild::ref_from_bytes(slice).map_err(|_| Error::BadData)?;
        Ok(*child)
    }

    pub fn check(data: &[u8], block_size: u32) -> Result<()> {
        let node = InternalNode::new(data)?;
        if node.level() <= DISK_LEAF_NODE_LEVEL {
            return Err(Error::BadData);
        }
        let n_children = node.key_count() + 1;
        let end = BLOCK_HEAD_SIZE
            + node.key_count() * core::mem::size_of::<RawKey>()
            + n_children * DISK_CHILD_SIZE;
        if end > block_size as usize {
            return Err(Error::BadData);
        }
        for i in 0..n_children {
            let child = node.child(i)?;
            if child.block_number.get() == 0 {
                return Err(Error::BadData);
            }
        }
        Ok(())
    }
}
