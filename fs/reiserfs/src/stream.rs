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

//! Reads a file's logical byte stream out of its direct and indirect items
//! (spec. §4.6). A forward seek continues scanning from wherever the reader
//! last stopped; a backward seek re-searches from the object's first data
//! item. Neither ever re-searches the tree from the root mid-scan.

use crate::block::{BlockKind, RawBlockSource};
use crate::error::{Error, Result};
use crate::item::IndirectItem;
use crate::iter::ObjectItemIterator;
use crate::key::{ItemType, Key, KeyFormat};
use crate::tree::Tree;

struct Cursor<'a, S: RawBlockSource> {
    items: ObjectItemIterator<'a, S>,
    /// Logical start offset, in bytes, of the item `items` currently points
    /// to (or of the position one past the last item's end, once `items`
    /// has been exhausted).
    item_start: u64,
}

pub struct StreamReader<'a, S: RawBlockSource> {
    tree: &'a Tree<'a, S>,
    dir_id: u32,
    object_id: u32,
    format: KeyFormat,
    block_size: u32,
    size: u64,
    cursor: Option<Cursor<'a, S>>,
}

impl<'a, S: RawBlockSource> StreamReader<'a, S> {
    pub fn new(
        tree: &'a Tree<'a, S>,
        dir_id: u32,
        object_id: u32,
        format: KeyFormat,
        block_size: u32,
        size: u64,
    ) -> StreamReader<'a, S> {
        StreamReader { tree, dir_id, object_id, format, block_size, size, cursor: None }
    }

    fn item_logical_start(key: &Key) -> u64 {
        let format = key.guess_format();
        key.offset(format).saturating_sub(1)
    }

    fn reinit(&mut self) -> Result<()> {
        let mut items = ObjectItemIterator::new(self.tree, self.dir_id, self.object_id, self.format)?;
        items.advance()?; // past the stat-data item, onto the first body item (if any)
        let item_start = if items.is_valid() { Self::item_logical_start(&items.key()?) } else { self.size };
        self.cursor = Some(Cursor { items, item_start });
        Ok(())
    }

    /// `[start, end)` of the item's logical byte range, in whatever unit
    /// its type uses (direct: its own length; indirect: one block per
    /// listed block number, zero meaning a hole).
    fn item_range(&self, key: &Key, body: &[u8], start: u64) -> Result<u64> {
        match key.item_type(key.guess_format()) {
            ItemType::Direct => Ok(start + body.len() as u64),
            ItemType::Indirect => Ok(start + IndirectItem::new(body)?.len() as u64 * self.block_size as u64),
            _ => Err(Error::BadData),
        }
    }

    fn copy_within_item(&self, key: &Key, body: &[u8], item_start: u64, target: u64, out: &mut [u8]) -> Result<usize> {
        match key.item_type(key.guess_format()) {
            ItemType::Direct => {
                let within = (target - item_start) as usize;
                let n = (body.len() - within).min(out.len());
                out[..n].copy_from_slice(&body[within..within + n]);
                Ok(n)
            }
            ItemType::Indirect => {
                let indirect = IndirectItem::new(body)?;
                let block_size = self.block_size as u64;
                let block_index = ((target - item_start) / block_size) as usize;
                let block_offset = ((target - item_start) % block_size) as usize;
                let n = (self.block_size as usize - block_offset).min(out.len());
                let block_number = indirect.block_number(block_index)?;
                if block_number == 0 {
                    out[..n].fill(0);
                } else {
                    let handle = self.tree.cache().get(block_number as u64)?;
                    self.tree.cache().classify_and_check(&handle, BlockKind::Unformatted, |_| Ok(()))?;
                    out[..n].copy_from_slice(&handle.data()[block_offset..block_offset + n]);
                }
                Ok(n)
            }
            _ => Err(Error::BadData),
        }
    }

    /// Reads up to `buf.len()` bytes starting at `offset`, clamped to the
    /// object's size. Returns the number of bytes actually copied, `0` at
    /// or past end of file.
    pub fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min((self.size - offset) as usize);

        let needs_reinit = match &self.cursor {
            None => true,
            Some(cursor) => offset < cursor.item_start,
        };
        if needs_reinit {
            self.reinit()?;
        }

        let mut copied = 0usize;
        while copied < want {
            let target = offset + copied as u64;
            let is_valid = self.cursor.as_ref().expect("just (re)initialized").items.is_valid();
            if !is_valid {
                // Past the last stored item but still within the object's
                // stated size: a sparse trailing hole.
                let gap = want - copied;
                buf[copied..copied + gap].fill(0);
                copied += gap;
                break;
            }

            let cursor = self.cursor.as_ref().expect("just (re)initialized");
            let key = cursor.items.key()?;
            let body = cursor.items.body()?;
            let item_start = cursor.item_start;
            let item_end = self.item_range(&key, body, item_start)?;

            if target < item_start {
                let gap = ((item_start - target) as usize).min(want - copied);
                buf[copied..copied + gap].fill(0);
                copied += gap;
                continue;
            }
            if target >= item_end {
                let cursor = self.cursor.as_mut().expect("just (re)initialized");
                cursor.items.advance()?;
                cursor.item_start = item_end;
                continue;
            }
            let n = self.copy_within_item(&key, body, item_start, target, &mut buf[copied..copied + (want - copied).min((item_end - target) as usize)])?;
            copied += n;
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockCache, DataStorageSource};
    use crate::format::{BlockHead, ItemHead, BLOCK_HEAD_SIZE, ITEM_HEAD_SIZE};
    use crate::key::VKey;
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
            unreachable!()
        }
    }

    /// One leaf holding `StatData`, then one direct item with `body`.
    fn object_with_direct_tail(body: &[u8]) -> BlockCache<DataStorageSource<TestStorage>> {
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        let head = BlockHead {
            level: crate::node::DISK_LEAF_NODE_LEVEL.into(),
            item_count: 2u16.into(),
            free_space: 0u16.into(),
            reserved: 0u16.into(),
            right_delim_key: VKey::new(0, 0, 0, ItemType::Any, KeyFormat::V2).to_raw(),
        };
        buf[..BLOCK_HEAD_SIZE].copy_from_slice(head.as_bytes());

        let sd_ih = ItemHead {
            key: VKey::new(1, 5, crate::SD_OFFSET, ItemType::StatData, KeyFormat::V2).to_raw(),
            free_space_reserved_or_entry_count: 0u16.into(),
            item_len: 0u16.into(),
            item_location: (BLOCK_SIZE as u16).into(),
            version: 0u16.into(),
        };
        buf[BLOCK_HEAD_SIZE..BLOCK_HEAD_SIZE + ITEM_HEAD_SIZE].copy_from_slice(sd_ih.as_bytes());

        let body_location = BLOCK_SIZE as usize - body.len();
        let direct_ih = ItemHead {
            key: VKey::new(1, 5, 1, ItemType::Direct, KeyFormat::V2).to_raw(),
            free_space_reserved_or_entry_count: 0u16.into(),
            item_len: (body.len() as u16).into(),
            item_location: (body_location as u16).into(),
            version: 0u16.into(),
        };
        buf[BLOCK_HEAD_SIZE + ITEM_HEAD_SIZE..BLOCK_HEAD_SIZE + 2 * ITEM_HEAD_SIZE].copy_from_slice(direct_ih.as_bytes());
        buf[body_location..].copy_from_slice(body);

        let storage = TestStorage { blocks: std::sync::Mutex::new(vec![buf]) };
        BlockCache::new(DataStorageSource::new(storage), BLOCK_SIZE)
    }

    #[test]
    fn reads_whole_direct_tail() {
        let cache = object_with_direct_tail(b"hello world");
        let tree = Tree::new(&cache, 0);
        let mut reader = StreamReader::new(&tree, 1, 5, KeyFormat::V2, BLOCK_SIZE, 11);
        let mut buf = [0u8; 11];
        let n = reader.read(0, &mut buf).unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn reads_from_middle_offset() {
        let cache = object_with_direct_tail(b"hello world");
        let tree = Tree::new(&cache, 0);
        let mut reader = StreamReader::new(&tree, 1, 5, KeyFormat::V2, BLOCK_SIZE, 11);
        let mut buf = [0u8; 5];
        let n = reader.read(6, &mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn read_past_end_of_file_returns_zero() {
        let cache = object_with_direct_tail(b"hi");
        let tree = Tree::new(&cache, 0);
        let mut reader = StreamReader::new(&tree, 1, 5, KeyFormat::V2, BLOCK_SIZE, 2);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(2, &mut buf).unwrap(), 0);
    }
}
