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

//! The S+tree navigator: root-to-leaf search, and stepping to the next or
//! previous leaf without re-searching from the root (spec. §4.4).

use core::cmp::Ordering;

use crate::block::{BlockCache, BlockHandle, BlockKind, RawBlockSource};
use crate::error::Result;
use crate::key::VKey;
use crate::node::{block_head, InternalNode, LeafNode, DISK_LEAF_NODE_LEVEL};

pub struct Tree<'a, S: RawBlockSource> {
    cache: &'a BlockCache<S>,
    root_block: u32,
}

impl<'a, S: RawBlockSource> Tree<'a, S> {
    pub fn new(cache: &'a BlockCache<S>, root_block: u32) -> Tree<'a, S> {
        Tree { cache, root_block }
    }

    pub fn cache(&self) -> &'a BlockCache<S> {
        self.cache
    }

    fn level_of(data: &[u8]) -> Result<u16> {
        Ok(block_head(data)?.level.get())
    }

    /// The smallest index in `0..count` for which `before(index)` is false,
    /// or `count` if every index is "before" -- a bisection equivalent of
    /// scanning left to right and stopping at the first non-`before` index
    /// (spec. §4.4, node-local binary search).
    fn partition_point<F>(count: usize, mut before: F) -> Result<usize>
    where
        F: FnMut(usize) -> Result<bool>,
    {
        let mut lo = 0;
        let mut hi = count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if before(mid)? {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Fetches `number`, classifying and (once per residency) validating it
    /// as the node kind its block header claims to be.
    fn get_formatted(&self, number: u32) -> Result<BlockHandle<'a, S>> {
        let handle = self.cache.get(number as u64)?;
        let block_size = self.cache.block_size();
        let level = Self::level_of(handle.data())?;
        if level == DISK_LEAF_NODE_LEVEL {
            self.cache
                .classify_and_check(&handle, BlockKind::Formatted, |d| LeafNode::check(d, block_size))?;
        } else {
            self.cache
                .classify_and_check(&handle, BlockKind::Formatted, |d| InternalNode::check(d, block_size))?;
        }
        Ok(handle)
    }

    /// Descends from the root to the leaf that would hold `target`. Returns
    /// a path positioned at the first item whose key is not less than
    /// `target`; `found` reports whether that item's key is exactly equal
    /// (per `compare_types`).
    pub fn search(&self, target: &VKey, compare_types: bool) -> Result<TreePath<'a, S>> {
        let mut nodes = Vec::new();
        let mut child_indices = Vec::new();
        let mut block_number = self.root_block;

        loop {
            let handle = self.get_formatted(block_number)?;
            let level = Self::level_of(handle.data())?;
            if level == DISK_LEAF_NODE_LEVEL {
                let leaf = LeafNode::new(handle.data())?;
                let count = leaf.item_count();
                let item_index = Self::partition_point(count, |i| {
                    Ok(leaf.key(i)?.to_vkey(target.format).compare(target, compare_types) == Ordering::Less)
                })?;
                let found = item_index < count
                    && leaf.key(item_index)?.to_vkey(target.format).compare(target, compare_types) == Ordering::Equal;
                nodes.push(handle);
                return Ok(TreePath { nodes, child_indices, item_index, found });
            }

            let internal = InternalNode::new(handle.data())?;
            let count = internal.key_count();
            let child_index = Self::partition_point(count, |i| {
                Ok(internal.key(i)?.to_vkey(target.format).compare(target, compare_types) != Ordering::Greater)
            })?;
            let child = internal.child(child_index)?;
            nodes.push(handle);
            child_indices.push(child_index);
            block_number = child.block_number.get();
        }
    }

    fn descend_leftmost(&self, mut block_number: u32, nodes: &mut Vec<BlockHandle<'a, S>>, child_indices: &mut Vec<usize>) -> Result<()> {
        loop {
            let handle = self.get_formatted(block_number)?;
            if Self::level_of(handle.data())? == DISK_LEAF_NODE_LEVEL {
                nodes.push(handle);
                return Ok(());
            }
            let internal = InternalNode::new(handle.data())?;
            let child = internal.child(0)?;
            nodes.push(handle);
            child_indices.push(0);
            block_number = child.block_number.get();
        }
    }

    fn descend_rightmost(&self, mut block_number: u32, nodes: &mut Vec<BlockHandle<'a, S>>, child_indices: &mut Vec<usize>) -> Result<()> {
        loop {
            let handle = self.get_formatted(block_number)?;
            if Self::level_of(handle.data())? == DISK_LEAF_NODE_LEVEL {
                nodes.push(handle);
                return Ok(());
            }
            let internal = InternalNode::new(handle.data())?;
            let last = internal.key_count();
            let child = internal.child(last)?;
            nodes.push(handle);
            child_indices.push(last);
            block_number = child.block_number.get();
        }
    }

    /// The leaf to the right of `path`'s leaf, with its item cursor at 0.
    /// `None` once the rightmost leaf in the tree has been passed.
    pub fn next_leaf(&self, path: &TreePath<'a, S>) -> Result<Option<TreePath<'a, S>>> {
        if path.nodes.len() < 2 {
            return Ok(None);
        }
        let mut level = path.nodes.len() - 2;
        loop {
            let internal = InternalNode::new(path.nodes[level].data())?;
            let taken = path.child_indices[level];
            if taken < internal.key_count() {
                let mut nodes = path.nodes[..=level].to_vec();
                let mut child_indices = path.child_indices[..level].to_vec();
                child_indices.push(taken + 1);
                let next_child = internal.child(taken + 1)?.block_number.get();
                self.descend_leftmost(next_child, &mut nodes, &mut child_indices)?;
                return Ok(Some(TreePath { nodes, child_indices, item_index: 0, found: false }));
            }
            if level == 0 {
                return Ok(None);
            }
            level -= 1;
        }
    }

    /// The leaf to the left of `path`'s leaf, with its item cursor at its
    /// last item. `None` once the leftmost leaf has been passed.
    pub fn previous_leaf(&self, path: &TreePath<'a, S>) -> Result<Option<TreePath<'a, S>>> {
        if path.nodes.len() < 2 {
            return Ok(None);
        }
        let mut level = path.nodes.len() - 2;
        loop {
            let taken = path.child_indices[level];
            if taken > 0 {
                let internal = InternalNode::new(path.nodes[level].data())?;
                let mut nodes = path.nodes[..=level].to_vec();
                let mut child_indices = path.child_indices[..level].to_vec();
                child_indices.push(taken - 1);
                let prev_child = internal.child(taken - 1)?.block_number.get();
                self.descend_rightmost(prev_child, &mut nodes, &mut child_indices)?;
                let item_index = LeafNode::new(nodes.last().unwrap().data())?.item_count().saturating_sub(1);
                return Ok(Some(TreePath { nodes, child_indices, item_index, found: false }));
            }
            if level == 0 {
                return Ok(None);
            }
            level -= 1;
        }
    }
}

/// A root-to-leaf path plus a cursor into the leaf's item array. Holds a
/// block handle per tree level for the lifetime of the path; dropping it
/// (or replacing it via `next_leaf`/`previous_leaf`, which only keeps the
/// shared ancestor prefix) releases the handles below the point of reuse.
pub struct TreePath<'a, S: RawBlockSource> {
    nodes: Vec<BlockHandle<'a, S>>,
    child_indices: Vec<usize>,
    pub item_index: usize,
    pub found: bool,
}

impl<'a, S: RawBlockSource> TreePath<'a, S> {
    pub fn leaf(&self) -> &BlockHandle<'a, S> {
        self.nodes.last().expect("a path always has at least a leaf")
    }

    pub fn leaf_node(&self) -> Result<LeafNode<'_>> {
        LeafNode::new(self.leaf().data())
    }

    pub fn depth(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::DataStorageSource;
    use crate::format::{BlockHead, DiskChild, ItemHead, BLOCK_HEAD_SIZE, DISK_CHILD_SIZE, ITEM_HEAD_SIZE};
    use crate::key::{ItemType, KeyFormat};
    use zerocopy::IntoBytes;

    const BLOCK_SIZE: u32 = 128;

    struct TestStorage {
        blocks: std::sync::Mutex<Vec<Vec<u8>>>,
    }
    impl hyrax_ds::DataStorage for TestStorage {
        fn read(&self, offset: u64, buffer: &mut [u8]) -> hyrax_ds::Result<()> {
            let blocks = self.blocks.lock().unwrap();
            let number = offset / BLOCK_SIZE as u64;
            let block = blocks.get(number as usize).ok_or(hyrax_ds::Error::Io)?;
            buffer.copy_from_slice(block);
            Ok(())
        }
        fn write(&self, _offset: u64, _buffer: &[u8]) -> hyrax_ds::Result<()> {
            unreachable!("read-only driver never writes")
        }
    }

    fn leaf_block(entries: &[(u32, u32, u64)]) -> Vec<u8> {
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        let head = BlockHead {
            level: DISK_LEAF_NODE_LEVEL.into(),
            item_count: (entries.len() as u16).into(),
            free_space: 0u16.into(),
            reserved: 0u16.into(),
            right_delim_key: crate::key::VKey::new(0, 0, 0, ItemType::Any, KeyFormat::V2).to_raw(),
        };
        buf[..BLOCK_HEAD_SIZE].copy_from_slice(head.as_bytes());
        for (i, (dir_id, object_id, offset)) in entries.iter().enumerate() {
            let ih = ItemHead {
                key: crate::key::VKey::new(*dir_id, *object_id, *offset, ItemType::StatData, KeyFormat::V2).to_raw(),
                free_space_reserved_or_entry_count: 0u16.into(),
                item_len: 0u16.into(),
                item_location: (BLOCK_SIZE as u16).into(),
                version: 0u16.into(),
            };
            let start = BLOCK_HEAD_SIZE + i * ITEM_HEAD_SIZE;
            buf[start..start + ITEM_HEAD_SIZE].copy_from_slice(ih.as_bytes());
        }
        buf
    }

    fn internal_block(keys: &[(u32, u32, u64)], children: &[u32]) -> Vec<u8> {
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        let head = BlockHead {
            level: 2u16.into(),
            item_count: (keys.len() as u16).into(),
            free_space: 0u16.into(),
            reserved: 0u16.into(),
            right_delim_key: crate::key::VKey::new(0, 0, 0, ItemType::Any, KeyFormat::V2).to_raw(),
        };
        buf[..BLOCK_HEAD_SIZE].copy_from_slice(head.as_bytes());
        let mut offset = BLOCK_HEAD_SIZE;
        for (dir_id, object_id, key_offset) in keys {
            let raw = crate::key::VKey::new(*dir_id, *object_id, *key_offset, ItemType::StatData, KeyFormat::V2).to_raw();
            buf[offset..offset + 16].copy_from_slice(raw.as_bytes());
            offset += 16;
        }
        for block_number in children {
            let dc = DiskChild { block_number: (*block_number).into(), size: 0u16.into(), reserved: 0u16.into() };
            buf[offset..offset + DISK_CHILD_SIZE].copy_from_slice(dc.as_bytes());
            offset += DISK_CHILD_SIZE;
        }
        buf
    }

    fn two_leaf_tree() -> BlockCache<DataStorageSource<TestStorage>> {
        let leaf0 = leaf_block(&[(1, 2, 0), (1, 2, 10)]);
        let leaf1 = leaf_block(&[(1, 2, 20), (1, 2, 30)]);
        let root = internal_block(&[(1, 2, 20)], &[1, 2]);
        let storage = TestStorage { blocks: std::sync::Mutex::new(vec![root, leaf0, leaf1]) };
        BlockCache::new(DataStorageSource::new(storage), BLOCK_SIZE)
    }

    #[test]
    fn search_finds_exact_item() {
        let cache = two_leaf_tree();
        let tree = Tree::new(&cache, 0);
        let target = crate::key::VKey::new(1, 2, 10, ItemType::StatData, KeyFormat::V2);
        let path = tree.search(&target, false).unwrap();
        assert!(path.found);
        assert_eq!(path.item_index, 1);
    }

    #[test]
    fn search_in_a_wide_leaf_finds_every_item() {
        const WIDE_BLOCK_SIZE: u32 = 256;
        let leaf = {
            let mut buf = vec![0u8; WIDE_BLOCK_SIZE as usize];
            let entries = [(1, 2, 0), (1, 2, 10), (1, 2, 20), (1, 2, 30), (1, 2, 40), (1, 2, 50)];
            let head = BlockHead {
                level: DISK_LEAF_NODE_LEVEL.into(),
                item_count: (entries.len() as u16).into(),
                free_space: 0u16.into(),
                reserved: 0u16.into(),
                right_delim_key: crate::key::VKey::new(0, 0, 0, ItemType::Any, KeyFormat::V2).to_raw(),
            };
            buf[..BLOCK_HEAD_SIZE].copy_from_slice(head.as_bytes());
            for (i, (dir_id, object_id, offset)) in entries.iter().enumerate() {
                let ih = ItemHead {
                    key: crate::key::VKey::new(*dir_id, *object_id, *offset, ItemType::StatData, KeyFormat::V2).to_raw(),
                    free_space_reserved_or_entry_count: 0u16.into(),
                    item_len: 0u16.into(),
                    item_location: (WIDE_BLOCK_SIZE as u16).into(),
                    version: 0u16.into(),
                };
                let start = BLOCK_HEAD_SIZE + i * ITEM_HEAD_SIZE;
                buf[start..start + ITEM_HEAD_SIZE].copy_from_slice(ih.as_bytes());
            }
            buf
        };
        let storage = TestStorage { blocks: std::sync::Mutex::new(vec![leaf]) };
        let cache = BlockCache::new(DataStorageSource::new(storage), WIDE_BLOCK_SIZE);
        let tree = Tree::new(&cache, 0);
        for (i, offset) in [0, 10, 20, 30, 40, 50].into_iter().enumerate() {
            let target = crate::key::VKey::new(1, 2, offset, ItemType::StatData, KeyFormat::V2);
            let path = tree.search(&target, false).unwrap();
            assert!(path.found);
            assert_eq!(path.item_index, i);
        }
        let between = crate::key::VKey::new(1, 2, 25, ItemType::StatData, KeyFormat::V2);
        let path = tree.search(&between, false).unwrap();
        assert!(!path.found);
        assert_eq!(path.item_index, 3);
    }

    #[test]
    fn next_leaf_walks_across_tree() {
        let cache = two_leaf_tree();
        let tree = Tree::new(&cache, 0);
        let target = crate::key::VKey::new(1, 2, 0, ItemType::StatData, KeyFormat::V2);
        let path = tree.search(&target, false).unwrap();
        let next = tree.next_leaf(&path).unwrap().expect("a second leaf exists");
        let leaf = next.leaf_node().unwrap();
        assert_eq!(leaf.key(0).unwrap().offset(KeyFormat::V2), 20);
        assert!(tree.next_leaf(&next).unwrap().is_none());
    }

    #[test]
    fn previous_leaf_walks_back() {
        let cache = two_leaf_tree();
        let tree = Tree::new(&cache, 0);
        let target = crate::key::VKey::new(1, 2, 30, ItemType::StatData, KeyFormat::V2);
        let path = tree.search(&target, false).unwrap();
        let prev = tree.previous_leaf(&path).unwrap().expect("a first leaf exists");
        let leaf = prev.leaf_node().unwrap();
        assert_eq!(leaf.key(0).unwrap().offset(KeyFormat::V2), 0);
    }
}
