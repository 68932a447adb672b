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

//! Little-endian on-disk structures. Every struct here is a direct view over
//! bytes read from the device; no field is ever byte-swapped by hand, the
//! `zerocopy::little_endian` wrappers do it on access.

use zerocopy::{
    little_endian::{U16, U32, U64},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

pub const BLOCK_HEAD_SIZE: usize = 24;
pub const ITEM_HEAD_SIZE: usize = 24;
pub const DISK_CHILD_SIZE: usize = 8;
pub const DE_HEAD_SIZE: usize = 16;
pub const STAT_DATA_V1_SIZE: usize = 32;
pub const STAT_DATA_V2_SIZE: usize = 44;

/// The raw 16-byte key. The last 8 bytes ("tail") carry one of two logical
/// encodings depending on format, see [`crate::key`].
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawKey {
    pub dir_id: U32,
    pub object_id: U32,
    pub tail: U64,
}
const _: () = assert!(size_of::<RawKey>() == 16);

/// The block header found at the start of every formatted block.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct BlockHead {
    pub level: U16,
    pub item_count: U16,
    pub free_space: U16,
    pub reserved: U16,
    /// Right delimiting key, format 3.6 only; unused by a read-only driver.
    pub right_delim_key: RawKey,
}
const _: () = assert!(size_of::<BlockHead>() == BLOCK_HEAD_SIZE);

/// A leaf item header. `free_space_reserved`/`entry_count` share on-disk
/// storage the way the source's `u` union does: indirect items use the
/// former, directory items the latter, everything else leaves it unused.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ItemHead {
    pub key: RawKey,
    pub free_space_reserved_or_entry_count: U16,
    pub item_len: U16,
    pub item_location: U16,
    pub version: U16,
}
const _: () = assert!(size_of::<ItemHead>() == ITEM_HEAD_SIZE);

/// An internal node's child pointer.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct DiskChild {
    pub block_number: U32,
    pub size: U16,
    pub reserved: U16,
}
const _: () = assert!(size_of::<DiskChild>() == DISK_CHILD_SIZE);

/// A directory-entry head, found in the entry-head array at the start of a
/// directory item.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct DeHead {
    pub offset: U32,
    pub dir_id: U32,
    pub object_id: U32,
    pub location: U16,
    pub state: U16,
}
const _: () = assert!(size_of::<DeHead>() == DE_HEAD_SIZE);

/// The visibility bit within [`DeHead::state`].
pub const DEH_VISIBLE_BIT: u16 = 1 << 2;

/// Stat data, format 3.5 (32 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct StatDataV1 {
    pub mode: U16,
    pub nlink: U16,
    pub uid: U16,
    pub gid: U16,
    pub size: U32,
    pub atime: U32,
    pub mtime: U32,
    pub ctime: U32,
    /// Either `rdev` or `blocks`, matching the source's union.
    pub blocks_or_rdev: U32,
    pub first_direct_byte: U32,
}
const _: () = assert!(size_of::<StatDataV1>() == STAT_DATA_V1_SIZE);

/// Stat data, format 3.6 (44 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct StatDataV2 {
    pub mode: U16,
    pub reserved: U16,
    pub nlink: U32,
    pub size: U64,
    pub uid: U32,
    pub gid: U32,
    pub atime: U32,
    pub mtime: U32,
    pub ctime: U32,
    pub blocks: U32,
    /// Either `rdev` or `generation`, matching the source's union.
    pub rdev_or_generation: U32,
}
const _: () = assert!(size_of::<StatDataV2>() == STAT_DATA_V2_SIZE);

/// Journal parameters embedded in the super block; unused by a read-only
/// driver beyond sizing the struct correctly so `magic` lands at the right
/// offset.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct JournalParams {
    pub journal_1st_block: U32,
    pub journal_dev: U32,
    pub journal_size: U32,
    pub journal_trans_max: U32,
    pub journal_magic: U32,
    pub journal_max_batch: U32,
    pub journal_max_commit_age: U32,
    pub journal_max_trans_age: U32,
}
const _: () = assert!(size_of::<JournalParams>() == 32);

/// Prefix shared by both super block formats. `magic` sits at byte offset 52
/// in both, per spec.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SuperBlockV1 {
    pub block_count: U32,
    pub free_blocks: U32,
    pub root_block: U32,
    pub journal: JournalParams,
    pub block_size: U16,
    pub oid_max_size: U16,
    pub oid_cur_size: U16,
    pub state: U16,
    pub magic: [u8; 10],
    pub fs_state: U16,
    pub hash_function_code: U32,
    pub tree_height: U16,
    pub bmap_nr: U16,
    pub version: U16,
    pub reserved_for_journal: U16,
}
const _: () = assert!(size_of::<SuperBlockV1>() == 76);
const _: () = assert!(memoffset_magic() == 52);

const fn memoffset_magic() -> usize {
    // block_count + free_blocks + root_block + journal + block_size
    // + oid_max_size + oid_cur_size + state
    4 + 4 + 4 + 32 + 2 + 2 + 2 + 2
}

/// Format 3.6 super block: the v1 prefix plus the fields current volumes add.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SuperBlockV2 {
    pub v1: SuperBlockV1,
    pub inode_generation: U32,
    pub flags: U32,
    pub uuid: [u8; 16],
    pub label: [u8; 16],
    pub unused: [u8; 88],
}
const _: () = assert!(size_of::<SuperBlockV2>() == 204);

pub const REISERFS_SUPER_MAGIC_STRING: &[u8] = b"ReIsErFs";
pub const REISER2FS_SUPER_MAGIC_STRING: &[u8] = b"ReIsEr2Fs";

pub const REISERFS_OLD_DISK_OFFSET_IN_BYTES: u64 = 8 * 1024;
pub const REISERFS_DISK_OFFSET_IN_BYTES: u64 = 64 * 1024;

pub const REISERFS_VALID_FS: u16 = 1;
