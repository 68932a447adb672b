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

//! Mount, superblock recognition, hash auto-detection, path-component
//! lookup and directory listing (spec. §4.7).

use log::{error, warn};
use zerocopy::FromBytes;

use hyrax_ds::DataStorage;

use crate::block::{BlockCache, DataStorageSource, RawBlockSource};
use crate::error::{Error, Result};
use crate::format::{
    SuperBlockV1, SuperBlockV2, REISER2FS_SUPER_MAGIC_STRING, REISERFS_DISK_OFFSET_IN_BYTES,
    REISERFS_OLD_DISK_OFFSET_IN_BYTES, REISERFS_SUPER_MAGIC_STRING, REISERFS_VALID_FS,
};
use crate::hash::{self, HashFn};
use crate::item::StatData;
use crate::iter::{DirEntryIterator, ObjectItemIterator};
use crate::key::KeyFormat;
use crate::settings::Settings;
use crate::stream::StreamReader;
use crate::tree::Tree;
use crate::vnode::{Stat, VNode, VNodeId};
use crate::{DOT_DOT_OFFSET, DOT_OFFSET, REISERFS_ROOT_OBJECTID, REISERFS_ROOT_PARENT_OBJECTID, SD_OFFSET};

/// One listed directory entry, ready to be projected onto a host VFS
/// directory stream.
pub struct DirListEntry {
    pub id: VNodeId,
    pub name: Vec<u8>,
    pub size: u64,
}

/// Mirrors `read_fs_stat` in spec.md §6: the fields a host reports for
/// `statvfs`-style queries.
pub struct FsStat {
    pub block_size: u32,
    pub optimal_io_size: u32,
    pub block_count: u32,
    pub free_blocks: u32,
    pub volume_name: String,
}

fn try_read_super_block_v1<DS: DataStorage>(storage: &DS, byte_offset: u64, magic: &[u8]) -> Result<Option<SuperBlockV1>> {
    let mut buf = [0u8; size_of::<SuperBlockV1>()];
    if storage.read(byte_offset, &mut buf).is_err() {
        return Ok(None);
    }
    let sb = SuperBlockV1::ref_from_bytes(&buf).map_err(|_| Error::BadData)?;
    if !sb.magic.starts_with(magic) {
        return Ok(None);
    }
    Ok(Some(*sb))
}

/// Reads the full 3.6 super block, so `label` is recovered too -- the old
/// `SuperBlockV1`-sized read at this offset only ever covered the v1
/// prefix and silently dropped it.
fn try_read_super_block_v2<DS: DataStorage>(storage: &DS, byte_offset: u64, magic: &[u8]) -> Result<Option<SuperBlockV2>> {
    let mut buf = [0u8; size_of::<SuperBlockV2>()];
    if storage.read(byte_offset, &mut buf).is_err() {
        return Ok(None);
    }
    let sb = SuperBlockV2::ref_from_bytes(&buf).map_err(|_| Error::BadData)?;
    if !sb.v1.magic.starts_with(magic) {
        return Ok(None);
    }
    Ok(Some(*sb))
}

/// The on-disk volume label, NUL-clamped and dropped if empty or not valid
/// UTF-8 (`UpdateName()`'s on-disk-label branch in the source).
fn decode_label(label: &[u8; 16]) -> Option<String> {
    let end = label.iter().position(|&b| b == 0).unwrap_or(label.len());
    let text = core::str::from_utf8(&label[..end]).ok()?;
    (!text.is_empty()).then(|| text.to_string())
}

fn stat_item<'t, S: RawBlockSource>(tree: &'t Tree<'t, S>, dir_id: u32, object_id: u32, format: KeyFormat) -> Result<StatData> {
    let items = ObjectItemIterator::new(tree, dir_id, object_id, format)?;
    if !items.is_valid() {
        return Err(Error::NotFound);
    }
    let key = items.key()?;
    if key.offset(format) != SD_OFFSET {
        return Err(Error::NotFound);
    }
    StatData::parse(items.body()?)
}

fn scan_for_name<'t, S: RawBlockSource>(tree: &'t Tree<'t, S>, format: KeyFormat, dir: VNodeId, name: &[u8]) -> Result<VNodeId> {
    let mut it = DirEntryIterator::new(tree, dir.dir_id, dir.object_id, format)?;
    while it.is_valid() {
        let e = it.current()?;
        if e.visible() && e.name == name {
            return Ok(VNodeId::new(e.dir_id(), e.object_id()));
        }
        if !it.advance()? {
            break;
        }
    }
    Err(Error::NotFound)
}

fn find_by_hash<'t, S: RawBlockSource>(tree: &'t Tree<'t, S>, format: KeyFormat, dir: VNodeId, hash_fn: HashFn, name: &[u8]) -> Result<VNodeId> {
    let target_hash = hash::hash_value_of_offset(hash::key_offset_for_name(hash_fn, name));
    let mut it = DirEntryIterator::starting_at_hash(tree, dir.dir_id, dir.object_id, format, target_hash)?;
    while it.is_valid() {
        let e = it.current()?;
        if e.visible() && e.name == name {
            return Ok(VNodeId::new(e.dir_id(), e.object_id()));
        }
        if !it.advance()? {
            break;
        }
    }
    Err(Error::NotFound)
}

/// The longest path component this driver will resolve, matching the
/// source's `B_FILE_NAME_LENGTH` (Haiku's per-component name limit,
/// including the terminating NUL).
const MAX_NAME_LENGTH: usize = 256;

/// Resolves one path component against `dir`, handling `.`, `..` (including
/// the root's synthesized parent) and the hash fast path / linear scan
/// (spec. §4.7, "FindDirEntry fast path").
fn lookup_one<'t, S: RawBlockSource>(
    tree: &'t Tree<'t, S>,
    format: KeyFormat,
    hash_fn: Option<HashFn>,
    root: VNodeId,
    dir: VNodeId,
    name: &[u8],
) -> Result<VNodeId> {
    if name.len() >= MAX_NAME_LENGTH {
        return Err(Error::NameTooLong);
    }
    if name.is_empty() || name == b"." {
        return Ok(dir);
    }
    if name == b".." {
        if dir == root {
            return Ok(root);
        }
        return scan_for_name(tree, format, dir, name);
    }
    match hash_fn {
        Some(hash_fn) => find_by_hash(tree, format, dir, hash_fn, name),
        None => scan_for_name(tree, format, dir, name),
    }
}

/// Verifies a declared hash function against every root-directory entry past
/// `..` (spec. §4.7): every entry's offset-hash must match what hashing its
/// own name with `candidate` would produce.
fn verify_hash<'t, S: RawBlockSource>(tree: &'t Tree<'t, S>, format: KeyFormat, candidate: HashFn) -> Result<bool> {
    let mut it = DirEntryIterator::new(tree, REISERFS_ROOT_PARENT_OBJECTID, REISERFS_ROOT_OBJECTID, format)?;
    while it.is_valid() {
        let e = it.current()?;
        if e.offset() as u64 > DOT_DOT_OFFSET {
            let want = hash::hash_value_of_offset(hash::key_offset_for_name(candidate, e.name));
            if hash::hash_value_of_offset(e.offset()) != want {
                return Ok(false);
            }
        }
        if !it.advance()? {
            break;
        }
    }
    Ok(true)
}

/// The trial-and-error fallback: the candidate that matches exactly one
/// entry's hash bits, skipping ambiguous entries that more than one
/// candidate (or none) explain (spec. §4.7).
fn detect_hash<'t, S: RawBlockSource>(tree: &'t Tree<'t, S>, format: KeyFormat) -> Result<Option<HashFn>> {
    let mut it = DirEntryIterator::new(tree, REISERFS_ROOT_PARENT_OBJECTID, REISERFS_ROOT_OBJECTID, format)?;
    while it.is_valid() {
        let e = it.current()?;
        if e.offset() as u64 > DOT_DOT_OFFSET {
            let mut matching = hash::ALL_HASHES.iter().copied().filter(|&f| {
                hash::hash_value_of_offset(e.offset()) == hash::hash_value_of_offset(hash::key_offset_for_name(f, e.name))
            });
            if let (Some(only), None) = (matching.next(), matching.next()) {
                return Ok(Some(only));
            }
        }
        if !it.advance()? {
            break;
        }
    }
    Ok(None)
}

pub struct Volume<S: RawBlockSource> {
    cache: BlockCache<S>,
    root_block: u32,
    block_size: u32,
    block_count: u32,
    free_blocks: u32,
    format: KeyFormat,
    hash_fn: Option<HashFn>,
    root: VNodeId,
    settings: Settings,
    /// The on-disk `s_label`, if the superblock carried a non-empty one
    /// (spec. §6, "read_fs_stat"). Preferred over the settings-configured
    /// name in `fs_stat`, matching `UpdateName()`'s precedence in the
    /// source.
    volume_label: Option<String>,
    /// Resolved at mount time from `settings.hidden_entries()` (spec. §4.7,
    /// "Negative entries"): an id, not a name, is what gets hidden from
    /// here on, matching `Volume::_InitNegativeEntries`/`IsNegativeEntry` in
    /// the source.
    negative_entries: Vec<VNodeId>,
}

impl<DS: DataStorage> Volume<DataStorageSource<DS>> {
    /// Mounts a volume over byte-addressable storage (spec. §4.7, "Mount").
    /// Fatal per spec. §7: superblock magic mismatch, state != valid,
    /// version > 2, bad block size, root stat item not found.
    pub fn mount(storage: DS, settings: Settings) -> Result<Self> {
        let (sb, format, volume_label) = match try_read_super_block_v1(&storage, REISERFS_OLD_DISK_OFFSET_IN_BYTES, REISERFS_SUPER_MAGIC_STRING)? {
            Some(sb) => (sb, KeyFormat::V1, None),
            None => match try_read_super_block_v2(&storage, REISERFS_DISK_OFFSET_IN_BYTES, REISER2FS_SUPER_MAGIC_STRING)? {
                Some(sb) => (sb.v1, KeyFormat::V2, decode_label(&sb.label)),
                None => {
                    error!("no ReiserFS superblock found at either fixed offset");
                    return Err(Error::BadData);
                }
            },
        };
        if sb.fs_state.get() != REISERFS_VALID_FS {
            error!("volume state ({}) is not valid; journal replay would be required", sb.fs_state.get());
            return Err(Error::BadData);
        }
        if sb.version.get() > 2 {
            error!("superblock version ({}) is newer than this driver understands", sb.version.get());
            return Err(Error::BadData);
        }
        let block_size = sb.block_size.get() as u32;
        if !block_size.is_power_of_two() || block_size < 512 {
            error!("block size ({block_size}) must be a power of two and at least 512");
            return Err(Error::BadData);
        }

        let cache = BlockCache::new(DataStorageSource::new(storage), block_size);
        let root_block = sb.root_block.get();
        let root = VNodeId::new(REISERFS_ROOT_PARENT_OBJECTID, REISERFS_ROOT_OBJECTID);

        {
            let tree = Tree::new(&cache, root_block);
            if let Err(e) = stat_item(&tree, root.dir_id, root.object_id, format) {
                error!("root stat item not found: {e}");
                return Err(e);
            }
        }

        let hash_fn = {
            let tree = Tree::new(&cache, root_block);
            let declared = hash::by_code(sb.hash_function_code.get());
            match declared {
                Some(f) if verify_hash(&tree, format, f)? => Some(f),
                other => {
                    if other.is_some() {
                        warn!("declared hash function failed verification against root directory; auto-detecting");
                    }
                    let detected = detect_hash(&tree, format)?;
                    if detected.is_none() {
                        warn!("hash function undetermined; directory lookups fall back to linear scan");
                    }
                    detected
                }
            }
        };

        let negative_entries = {
            let tree = Tree::new(&cache, root_block);
            let mut resolved = Vec::new();
            for name in settings.hidden_entries() {
                match lookup_one(&tree, format, hash_fn, root, root, name.as_bytes()) {
                    Ok(id) => resolved.push(id),
                    Err(_) => warn!("configured hidden entry {name:?} was not found under the root directory; ignoring"),
                }
            }
            resolved
        };

        Ok(Volume {
            cache,
            root_block,
            block_size,
            block_count: sb.block_count.get(),
            free_blocks: sb.free_blocks.get(),
            format,
            hash_fn,
            root,
            settings,
            volume_label,
            negative_entries,
        })
    }
}

impl<S: RawBlockSource> Volume<S> {
    fn tree(&self) -> Tree<'_, S> {
        Tree::new(&self.cache, self.root_block)
    }

    pub fn root(&self) -> VNodeId {
        self.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fs_stat(&self) -> FsStat {
        let volume_name = match &self.volume_label {
            Some(label) => label.clone(),
            None => self.settings.volume_name().to_string(),
        };
        FsStat {
            block_size: self.block_size,
            optimal_io_size: 65536,
            block_count: self.block_count,
            free_blocks: self.free_blocks,
            volume_name,
        }
    }

    pub fn stat(&self, id: VNodeId) -> Result<Stat> {
        let tree = self.tree();
        let sd = stat_item(&tree, id.dir_id, id.object_id, self.format)?;
        Ok(Stat::from_item(&sd))
    }

    pub fn read_vnode(&self, id: VNodeId) -> Result<VNode> {
        let stat = self.stat(id)?;
        let parent = if stat.is_dir() {
            self.dot_dot_parent(id).unwrap_or(VNodeId::new(0, 0))
        } else {
            VNodeId::new(0, 0)
        };
        Ok(VNode { id, parent, stat })
    }

    fn dot_dot_parent(&self, dir: VNodeId) -> Result<VNodeId> {
        if dir == self.root {
            return Ok(self.root);
        }
        let tree = self.tree();
        let mut it = DirEntryIterator::new(&tree, dir.dir_id, dir.object_id, self.format)?;
        while it.is_valid() {
            let e = it.current()?;
            if e.offset() as u64 == DOT_DOT_OFFSET {
                return Ok(VNodeId::new(e.dir_id(), e.object_id()));
            }
            if !it.advance()? {
                break;
            }
        }
        Err(Error::NotFound)
    }

    /// One path-component lookup (spec. §6, "lookup"): hides entries whose
    /// id is a configured negative entry, and (if requested) esoteric
    /// targets.
    pub fn lookup(&self, dir: VNodeId, name: &[u8]) -> Result<VNodeId> {
        let tree = self.tree();
        let found = lookup_one(&tree, self.format, self.hash_fn, self.root, dir, name)?;
        if name == b"." || name == b".." {
            return Ok(found);
        }
        if self.negative_entries.contains(&found) {
            return Err(Error::NotFound);
        }
        if self.settings.hide_esoteric() {
            let stat = self.stat(found)?;
            if !stat.is_dir() && !stat.is_regular() && !stat.is_symlink() {
                return Err(Error::NotFound);
            }
        }
        Ok(found)
    }

    /// Directory listing (spec. §6, "read_dir"): every visible entry not
    /// hidden or esoteric, `.` omitted, and the root's `..` synthesized to
    /// itself rather than read off disk.
    pub fn read_dir(&self, dir: VNodeId) -> Result<Vec<DirListEntry>> {
        let tree = self.tree();
        let mut out = Vec::new();
        let mut it = DirEntryIterator::new(&tree, dir.dir_id, dir.object_id, self.format)?;
        while it.is_valid() {
            let e = it.current()?;
            let offset = e.offset() as u64;
            if offset == DOT_OFFSET {
                // "." carries no useful information in a listing; skipped.
            } else if offset == DOT_DOT_OFFSET && dir == self.root {
                let stat = self.stat(self.root)?;
                out.push(DirListEntry { id: self.root, name: b"..".to_vec(), size: stat.size });
            } else if e.visible() {
                let target = VNodeId::new(e.dir_id(), e.object_id());
                if !self.negative_entries.contains(&target) {
                    let stat = self.stat(target)?;
                    let esoteric = !stat.is_dir() && !stat.is_regular() && !stat.is_symlink();
                    if !(self.settings.hide_esoteric() && esoteric) {
                        out.push(DirListEntry { id: target, name: e.name.to_vec(), size: stat.size });
                    }
                }
            }
            if !it.advance()? {
                break;
            }
        }
        Ok(out)
    }

    pub fn read(&self, id: VNodeId, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let stat = self.stat(id)?;
        if !stat.is_regular() {
            return Err(Error::BadValue);
        }
        let tree = self.tree();
        let mut reader = StreamReader::new(&tree, id.dir_id, id.object_id, self.format, self.block_size, stat.size);
        reader.read(offset, buf)
    }

    /// Reads the symlink target into `buf`. Returns bytes actually copied,
    /// truncated silently if `buf` is shorter than the target (Open Question
    /// decision: no untruncated length is reported back).
    pub fn read_symlink(&self, id: VNodeId, buf: &mut [u8]) -> Result<usize> {
        let stat = self.stat(id)?;
        if !stat.is_symlink() {
            return Err(Error::BadValue);
        }
        let tree = self.tree();
        let mut reader = StreamReader::new(&tree, id.dir_id, id.object_id, self.format, self.block_size, stat.size);
        reader.read(0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{BlockHead, DeHead, ItemHead, JournalParams, StatDataV2, BLOCK_HEAD_SIZE, DE_HEAD_SIZE, ITEM_HEAD_SIZE};
    use crate::key::{ItemType, VKey};
    use zerocopy::IntoBytes;

    const BLOCK_SIZE: u32 = 512;

    struct TestStorage {
        bytes: std::sync::Mutex<Vec<u8>>,
    }
    impl DataStorage for TestStorage {
        fn read(&self, offset: u64, buffer: &mut [u8]) -> hyrax_ds::Result<()> {
            let bytes = self.bytes.lock().unwrap();
            let start = offset as usize;
            let end = start + buffer.len();
            let slice = bytes.get(start..end).ok_or(hyrax_ds::Error::Io)?;
            buffer.copy_from_slice(slice);
            Ok(())
        }
        fn write(&self, _offset: u64, _buffer: &[u8]) -> hyrax_ds::Result<()> {
            unreachable!("read-only driver never writes")
        }
    }

    /// Packs a directory item body: fixed-size entry heads in `entries`'
    /// order, followed by their names packed backward from the item's end,
    /// matching `DirItem::entry`'s addressing.
    fn pack_dir_item(entries: &[(u32, u32, u32, &[u8])]) -> Vec<u8> {
        let heads_len = entries.len() * DE_HEAD_SIZE;
        let name_len: usize = entries.iter().map(|(_, _, _, n)| n.len()).sum();
        let item_len = heads_len + name_len;
        let mut body = vec![0u8; item_len];
        let mut end = item_len;
        let mut locations = Vec::with_capacity(entries.len());
        for (_, _, _, name) in entries {
            locations.push(end - name.len());
            end -= name.len();
        }
        for (i, (offset, dir_id, object_id, name)) in entries.iter().enumerate() {
            let de = DeHead {
                offset: (*offset).into(),
                dir_id: (*dir_id).into(),
                object_id: (*object_id).into(),
                location: (locations[i] as u16).into(),
                state: crate::format::DEH_VISIBLE_BIT.into(),
            };
            body[i * DE_HEAD_SIZE..(i + 1) * DE_HEAD_SIZE].copy_from_slice(de.as_bytes());
            body[locations[i]..locations[i] + name.len()].copy_from_slice(name);
        }
        body
    }

    fn stat_data(mode: u16, size: u64) -> StatDataV2 {
        StatDataV2 {
            mode: mode.into(),
            reserved: 0u16.into(),
            nlink: 1u32.into(),
            size: size.into(),
            uid: 0u32.into(),
            gid: 0u32.into(),
            atime: 0u32.into(),
            mtime: 0u32.into(),
            ctime: 0u32.into(),
            blocks: 0u32.into(),
            rdev_or_generation: 0u32.into(),
        }
    }

    /// Builds a one-leaf root block: stat data for the root directory, a
    /// directory item (`.`, `..`, one child entry), and the child's own stat
    /// data, in ascending key order.
    fn root_leaf_with_child(name: &[u8], child_object_id: u32) -> Vec<u8> {
        let mut buf = vec![0u8; BLOCK_SIZE as usize];

        let dir_item = pack_dir_item(&[
            (DOT_OFFSET as u32, REISERFS_ROOT_PARENT_OBJECTID, REISERFS_ROOT_OBJECTID, b"."),
            (DOT_DOT_OFFSET as u32, REISERFS_ROOT_PARENT_OBJECTID, REISERFS_ROOT_PARENT_OBJECTID, b".."),
            (hash::key_offset_for_name(hash::r5, name), REISERFS_ROOT_PARENT_OBJECTID, child_object_id, name),
        ]);

        let root_sd = stat_data(crate::item::S_IFDIR, 0);
        let child_sd = stat_data(crate::item::S_IFREG, 4);

        // Item bodies pack backward from the block's end in item-head
        // order: item 0 sits nearest the end, each later item directly
        // abuts the one before it.
        let root_sd_location = BLOCK_SIZE as usize - size_of::<StatDataV2>();
        let dir_item_location = root_sd_location - dir_item.len();
        let child_sd_location = dir_item_location - size_of::<StatDataV2>();

        let head = BlockHead {
            level: crate::node::DISK_LEAF_NODE_LEVEL.into(),
            item_count: 3u16.into(),
            free_space: 0u16.into(),
            reserved: 0u16.into(),
            right_delim_key: VKey::new(0, 0, 0, ItemType::Any, KeyFormat::V2).to_raw(),
        };
        buf[..BLOCK_HEAD_SIZE].copy_from_slice(head.as_bytes());

        let ih0 = ItemHead {
            key: VKey::new(REISERFS_ROOT_PARENT_OBJECTID, REISERFS_ROOT_OBJECTID, SD_OFFSET, ItemType::StatData, KeyFormat::V2).to_raw(),
            free_space_reserved_or_entry_count: 0u16.into(),
            item_len: (size_of::<StatDataV2>() as u16).into(),
            item_location: (root_sd_location as u16).into(),
            version: 0u16.into(),
        };
        buf[BLOCK_HEAD_SIZE..BLOCK_HEAD_SIZE + ITEM_HEAD_SIZE].copy_from_slice(ih0.as_bytes());
        buf[root_sd_location..root_sd_location + size_of::<StatDataV2>()].copy_from_slice(root_sd.as_bytes());

        let ih1 = ItemHead {
            key: VKey::new(REISERFS_ROOT_PARENT_OBJECTID, REISERFS_ROOT_OBJECTID, crate::FIRST_ITEM_OFFSET, ItemType::DirEntry, KeyFormat::V2).to_raw(),
            free_space_reserved_or_entry_count: 3u16.into(),
            item_len: (dir_item.len() as u16).into(),
            item_location: (dir_item_location as u16).into(),
            version: 0u16.into(),
        };
        buf[BLOCK_HEAD_SIZE + ITEM_HEAD_SIZE..BLOCK_HEAD_SIZE + 2 * ITEM_HEAD_SIZE].copy_from_slice(ih1.as_bytes());
        buf[dir_item_location..dir_item_location + dir_item.len()].copy_from_slice(&dir_item);

        let ih2 = ItemHead {
            key: VKey::new(REISERFS_ROOT_PARENT_OBJECTID, child_object_id, SD_OFFSET, ItemType::StatData, KeyFormat::V2).to_raw(),
            free_space_reserved_or_entry_count: 0u16.into(),
            item_len: (size_of::<StatDataV2>() as u16).into(),
            item_location: (child_sd_location as u16).into(),
            version: 0u16.into(),
        };
        buf[BLOCK_HEAD_SIZE + 2 * ITEM_HEAD_SIZE..BLOCK_HEAD_SIZE + 3 * ITEM_HEAD_SIZE].copy_from_slice(ih2.as_bytes());
        buf[child_sd_location..child_sd_location + size_of::<StatDataV2>()].copy_from_slice(child_sd.as_bytes());

        buf
    }

    fn super_block_bytes(root_block: u32, block_size: u16, hash_code: u32) -> Vec<u8> {
        let sb = SuperBlockV1 {
            block_count: 16u32.into(),
            free_blocks: 8u32.into(),
            root_block: root_block.into(),
            journal: JournalParams {
                journal_1st_block: 0u32.into(),
                journal_dev: 0u32.into(),
                journal_size: 0u32.into(),
                journal_trans_max: 0u32.into(),
                journal_magic: 0u32.into(),
                journal_max_batch: 0u32.into(),
                journal_max_commit_age: 0u32.into(),
                journal_max_trans_age: 0u32.into(),
            },
            block_size: block_size.into(),
            oid_max_size: 0u16.into(),
            oid_cur_size: 0u16.into(),
            state: 1u16.into(),
            magic: {
                let mut m = [0u8; 10];
                m[..REISER2FS_SUPER_MAGIC_STRING.len()].copy_from_slice(REISER2FS_SUPER_MAGIC_STRING);
                m
            },
            fs_state: REISERFS_VALID_FS.into(),
            hash_function_code: hash_code.into(),
            tree_height: 2u16.into(),
            bmap_nr: 1u16.into(),
            version: 2u16.into(),
            reserved_for_journal: 0u16.into(),
        };
        let sb2 = SuperBlockV2 { v1: sb, inode_generation: 0u32.into(), flags: 0u32.into(), uuid: [0u8; 16], label: [0u8; 16], unused: [0u8; 88] };
        sb2.as_bytes().to_vec()
    }

    fn one_block_volume(name: &[u8], child_object_id: u32, hash_code: u32) -> TestStorage {
        let leaf = root_leaf_with_child(name, child_object_id);
        let sb_bytes = super_block_bytes(0, BLOCK_SIZE as u16, hash_code);
        let sb_off = REISERFS_DISK_OFFSET_IN_BYTES as usize;
        let total = (sb_off + sb_bytes.len()).max(leaf.len());
        let mut bytes = vec![0u8; total];
        bytes[..leaf.len()].copy_from_slice(&leaf);
        bytes[sb_off..sb_off + sb_bytes.len()].copy_from_slice(&sb_bytes);
        TestStorage { bytes: std::sync::Mutex::new(bytes) }
    }

    #[test]
    fn mounts_and_finds_root() {
        let storage = one_block_volume(b"hello", 100, hash::HASH_R5);
        let volume = Volume::mount(storage, Settings::default()).unwrap();
        let stat = volume.stat(volume.root()).unwrap();
        assert!(stat.is_dir());
    }

    #[test]
    fn lookup_finds_child_by_hash() {
        let storage = one_block_volume(b"hello", 100, hash::HASH_R5);
        let volume = Volume::mount(storage, Settings::default()).unwrap();
        let id = volume.lookup(volume.root(), b"hello").unwrap();
        assert_eq!(id.object_id, 100);
        let stat = volume.stat(id).unwrap();
        assert!(stat.is_regular());
        assert_eq!(stat.size, 4);
    }

    #[test]
    fn lookup_missing_name_is_not_found() {
        let storage = one_block_volume(b"hello", 100, hash::HASH_R5);
        let volume = Volume::mount(storage, Settings::default()).unwrap();
        assert!(matches!(volume.lookup(volume.root(), b"nope"), Err(Error::NotFound)));
    }

    #[test]
    fn lookup_name_over_limit_is_name_too_long() {
        let storage = one_block_volume(b"hello", 100, hash::HASH_R5);
        let volume = Volume::mount(storage, Settings::default()).unwrap();
        let long_name = vec![b'a'; MAX_NAME_LENGTH];
        assert!(matches!(volume.lookup(volume.root(), &long_name), Err(Error::NameTooLong)));
    }

    #[test]
    fn dot_dot_at_root_resolves_to_root() {
        let storage = one_block_volume(b"hello", 100, hash::HASH_R5);
        let volume = Volume::mount(storage, Settings::default()).unwrap();
        let parent = volume.lookup(volume.root(), b"..").unwrap();
        assert_eq!(parent, volume.root());
    }

    #[test]
    fn read_dir_lists_child_and_synthesizes_dot_dot() {
        let storage = one_block_volume(b"hello", 100, hash::HASH_R5);
        let volume = Volume::mount(storage, Settings::default()).unwrap();
        let entries = volume.read_dir(volume.root()).unwrap();
        let names: Vec<&[u8]> = entries.iter().map(|e| e.name.as_slice()).collect();
        assert!(names.contains(&&b".."[..]));
        assert!(names.contains(&&b"hello"[..]));
        assert!(!names.contains(&&b"."[..]));
    }

    #[test]
    fn hidden_entry_name_is_not_found_and_not_listed() {
        let storage = one_block_volume(b"hello", 100, hash::HASH_R5);
        let top = crate::settings::parse("volume v {\n    hide_entries hello\n}\n").unwrap();
        let settings = Settings::from_parameters(&top, Some("v"));
        let volume = Volume::mount(storage, settings).unwrap();
        assert!(matches!(volume.lookup(volume.root(), b"hello"), Err(Error::NotFound)));
        let entries = volume.read_dir(volume.root()).unwrap();
        assert!(!entries.iter().any(|e| e.name == b"hello"));
    }
}
