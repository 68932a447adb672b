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

//! The block cache layer (spec. §4.1): reference counting, kind tagging and
//! the validate-once discipline, above a host-provided raw block source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use hyrax_ds::DataStorage;

use crate::error::{Error, Result};

/// What the tree layer has determined a block to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Unknown,
    Formatted,
    Unformatted,
}

/// The host-provided raw block source this cache is layered above. Kept
/// minimal and block-number-addressed, the interface spec. §6 describes as
/// `block_cache_get`/`block_cache_put`.
pub trait RawBlockSource {
    fn read_block(&self, block_number: u64, block_size: u32) -> Result<Vec<u8>>;
}

/// Adapts a byte-addressable [`DataStorage`] (the interface every other
/// `hyrax_fs_*` driver in this workspace is generic over) into a
/// block-number-addressed [`RawBlockSource`].
pub struct DataStorageSource<DS: DataStorage> {
    storage: DS,
}

impl<DS: DataStorage> DataStorageSource<DS> {
    pub fn new(storage: DS) -> Self {
        Self { storage }
    }
}

impl<DS: DataStorage> RawBlockSource for DataStorageSource<DS> {
    fn read_block(&self, block_number: u64, block_size: u32) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; block_size as usize];
        self.storage.read(block_number * block_size as u64, &mut buffer)?;
        Ok(buffer)
    }
}

struct Slot {
    data: Arc<[u8]>,
    kind: BlockKind,
    checked: bool,
    ref_count: u32,
}

pub struct BlockCache<S: RawBlockSource> {
    source: S,
    block_size: u32,
    slots: Mutex<HashMap<u64, Slot>>,
}

impl<S: RawBlockSource> BlockCache<S> {
    pub fn new(source: S, block_size: u32) -> Self {
        Self {
            source,
            block_size,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// `get`: a block already resident gets its reference count bumped and a
    /// fresh handle; a non-resident block is fetched from the host source,
    /// wrapped as `Unknown`-kind with reference count 1.
    pub fn get(&self, number: u64) -> Result<BlockHandle<'_, S>> {
        {
            let mut slots = self.slots.lock().unwrap();
            if let Some(slot) = slots.get_mut(&number) {
                slot.ref_count += 1;
                let data = slot.data.clone();
                return Ok(BlockHandle { cache: self, number, data });
            }
        }
        // Fetching from the host source is a blocking point (spec. §5); the
        // mutex is not held across it.
        let bytes = self
            .source
            .read_block(number, self.block_size)
            .map_err(|_| Error::NotFound)?;
        let data: Arc<[u8]> = Arc::from(bytes.into_boxed_slice());

        let mut slots = self.slots.lock().unwrap();
        let slot = slots.entry(number).or_insert_with(|| Slot {
            data: data.clone(),
            kind: BlockKind::Unknown,
            checked: false,
            ref_count: 0,
        });
        slot.ref_count += 1;
        let data = slot.data.clone();
        Ok(BlockHandle { cache: self, number, data })
    }

    fn retain(&self, number: u64) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(&number) {
            slot.ref_count += 1;
        }
    }

    fn release(&self, number: u64) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(&number) {
            slot.ref_count -= 1;
            if slot.ref_count == 0 {
                slots.remove(&number);
            }
        }
    }

    /// Visible only for invariant testing (spec. §8 invariant 2).
    #[cfg(test)]
    pub fn ref_count(&self, number: u64) -> u32 {
        self.slots
            .lock()
            .unwrap()
            .get(&number)
            .map(|s| s.ref_count)
            .unwrap_or(0)
    }

    pub fn kind(&self, number: u64) -> BlockKind {
        self.slots
            .lock()
            .unwrap()
            .get(&number)
            .map(|s| s.kind)
            .unwrap_or(BlockKind::Unknown)
    }

    /// Marks `handle`'s block with `kind`. If this is a promotion to
    /// `Formatted` and the block hasn't been validated yet, runs `check`
    /// once; subsequent calls with the block already checked are no-ops. A
    /// failing check does not set the checked flag, so a later `get` (once
    /// every handle has been dropped and the slot evicted) retries the
    /// underlying read and re-validates (spec. §4.1).
    pub fn classify_and_check<F>(&self, handle: &BlockHandle<'_, S>, kind: BlockKind, check: F) -> Result<()>
    where
        F: FnOnce(&[u8]) -> Result<()>,
    {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots
            .get_mut(&handle.number)
            .expect("a live handle always has a resident slot");
        slot.kind = kind;
        if kind != BlockKind::Formatted || slot.checked {
            return Ok(());
        }
        check(&handle.data)?;
        slot.checked = true;
        Ok(())
    }
}

/// A reference-counted handle to a cached block. Dropping it decrements the
/// cache's reference count for that block number; the buffer is released to
/// the underlying host cache once the count falls to zero.
pub struct BlockHandle<'a, S: RawBlockSource> {
    cache: &'a BlockCache<S>,
    number: u64,
    data: Arc<[u8]>,
}

impl<'a, S: RawBlockSource> BlockHandle<'a, S> {
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn block_size(&self) -> u32 {
        self.cache.block_size
    }

    pub fn kind(&self) -> BlockKind {
        self.cache.kind(self.number)
    }
}

impl<'a, S: RawBlockSource> Clone for BlockHandle<'a, S> {
    fn clone(&self) -> Self {
        self.cache.retain(self.number);
        BlockHandle { cache: self.cache, number: self.number, data: self.data.clone() }
    }
}

impl<'a, S: RawBlockSource> Drop for BlockHandle<'a, S> {
    fn drop(&mut self) {
        self.cache.release(self.number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemSource {
        blocks: Vec<Vec<u8>>,
    }
    impl RawBlockSource for MemSource {
        fn read_block(&self, block_number: u64, block_size: u32) -> Result<Vec<u8>> {
            self.blocks
                .get(block_number as usize)
                .cloned()
                .filter(|b| b.len() == block_size as usize)
                .ok_or(Error::NotFound)
        }
    }

    #[test]
    fn ref_count_tracks_outstanding_handles() {
        let cache = BlockCache::new(MemSource { blocks: vec![vec![0u8; 16]] }, 16);
        assert_eq!(cache.ref_count(0), 0);
        let h1 = cache.get(0).unwrap();
        assert_eq!(cache.ref_count(0), 1);
        let h2 = h1.clone();
        assert_eq!(cache.ref_count(0), 2);
        drop(h1);
        assert_eq!(cache.ref_count(0), 1);
        drop(h2);
        assert_eq!(cache.ref_count(0), 0);
    }

    #[test]
    fn missing_block_is_not_found() {
        let cache = BlockCache::new(MemSource { blocks: vec![] }, 16);
        assert!(matches!(cache.get(0), Err(Error::NotFound)));
    }

    #[test]
    fn check_runs_once_per_residency() {
        let cache = BlockCache::new(MemSource { blocks: vec![vec![0u8; 16]] }, 16);
        let h = cache.get(0).unwrap();
        let mut calls = 0;
        cache.classify_and_check(&h, BlockKind::Formatted, |_| { calls += 1; Ok(()) }).unwrap();
        cache.classify_and_check(&h, BlockKind::Formatted, |_| { calls += 1; Ok(()) }).unwrap();
        assert_eq!(calls, 1);
        assert_eq!(h.kind(), BlockKind::Formatted);
    }

    #[test]
    fn failed_check_does_not_stick() {
        let cache = BlockCache::new(MemSource { blocks: vec![vec![0u8; 16]] }, 16);
        let h = cache.get(0).unwrap();
        let result = cache.classify_and_check(&h, BlockKind::Formatted, |_| Err(Error::BadData));
        assert!(result.is_err());
        let mut calls = 0;
        let _ = cache.classify_and_check(&h, BlockKind::Formatted, |_| { calls += 1; Ok(()) });
        assert_eq!(calls, 1);
    }
}
