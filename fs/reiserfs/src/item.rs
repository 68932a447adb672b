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

//! Item bodies: stat data (both on-disk formats), directory entries,
//! indirect block lists, and the direct (tail) item which is just bytes
//! (spec. §4.3).

use zerocopy::little_endian::U32;
use zerocopy::FromBytes;

use crate::error::{Error, Result};
use crate::format::{DeHead, StatDataV1, StatDataV2, DE_HEAD_SIZE, STAT_DATA_V1_SIZE, STAT_DATA_V2_SIZE, DEH_VISIBLE_BIT};

pub const S_IFMT: u16 = 0o170000;
pub const S_IFDIR: u16 = 0o040000;
pub const S_IFREG: u16 = 0o100000;
pub const S_IFLNK: u16 = 0o120000;

/// Stat data in whichever on-disk format the volume uses. The two formats
/// differ in field width, not in which fields exist (spec. §3, "StatData").
#[derive(Clone, Copy, Debug)]
pub enum StatData {
    V1(StatDataV1),
    V2(StatDataV2),
}

impl StatData {
    pub fn parse(body: &[u8]) -> Result<StatData> {
        match body.len() {
            STAT_DATA_V1_SIZE => {
                let sd = StatDataV1::ref_from_bytes(body).map_err(|_| Error::BadData)?;
                Ok(StatData::V1(*sd))
            }
            STAT_DATA_V2_SIZE => {
                let sd = StatDataV2::ref_from_bytes(body).map_err(|_| Error::BadData)?;
                Ok(StatData::V2(*sd))
            }
            _ => Err(Error::BadData),
        }
    }

    pub fn mode(&self) -> u16 {
        match self {
            StatData::V1(sd) => sd.mode.get(),
            StatData::V2(sd) => sd.mode.get(),
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            StatData::V1(sd) => sd.size.get() as u64,
            StatData::V2(sd) => sd.size.get(),
        }
    }

    pub fn nlink(&self) -> u32 {
        match self {
            StatData::V1(sd) => sd.nlink.get() as u32,
            StatData::V2(sd) => sd.nlink.get(),
        }
    }

    pub fn uid(&self) -> u32 {
        match self {
            StatData::V1(sd) => sd.uid.get() as u32,
            StatData::V2(sd) => sd.uid.get(),
        }
    }

    pub fn gid(&self) -> u32 {
        match self {
            StatData::V1(sd) => sd.gid.get() as u32,
            StatData::V2(sd) => sd.gid.get(),
        }
    }

    pub fn mtime(&self) -> u32 {
        match self {
            StatData::V1(sd) => sd.mtime.get(),
            StatData::V2(sd) => sd.mtime.get(),
        }
    }

    pub fn atime(&self) -> u32 {
        match self {
            StatData::V1(sd) => sd.atime.get(),
            StatData::V2(sd) => sd.atime.get(),
        }
    }

    pub fn ctime(&self) -> u32 {
        match self {
            StatData::V1(sd) => sd.ctime.get(),
            StatData::V2(sd) => sd.ctime.get(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode() & S_IFMT == S_IFDIR
    }

    pub fn is_regular(&self) -> bool {
        self.mode() & S_IFMT == S_IFREG
    }

    pub fn is_symlink(&self) -> bool {
        self.mode() & S_IFMT == S_IFLNK
    }
}

/// The directory-item body: an array of fixed-size entry headers followed
/// by the packed name bytes, one item of which may span at most one leaf
/// block (spec. §4.3, "DirEntry").
pub struct DirItem<'a> {
    body: &'a [u8],
    entry_count: usize,
}

impl<'a> DirItem<'a> {
    pub fn new(body: &'a [u8], entry_count: usize) -> DirItem<'a> {
        DirItem { body, entry_count }
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    fn de_head(&self, index: usize) -> Result<&'a DeHead> {
        if index >= self.entry_count {
            return Err(Error::BadData);
        }
        let start = index * DE_HEAD_SIZE;
        let slice = self.body.get(start..start + DE_HEAD_SIZE).ok_or(Error::BadData)?;
        DeHead::ref_from_bytes(slice).map_err(|_| Error::BadData)
    }

    /// The entry's name, NUL-clamped: the on-disk name field may be padded
    /// past an embedded NUL for the old-style `.`/`..` entries. Entries are
    /// packed from the end of the item backward, so entry 0's name ends at
    /// the item's own length and every later entry's name ends where its
    /// predecessor's begins.
    pub fn entry(&self, index: usize) -> Result<DirEntry<'a>> {
        let head = self.de_head(index)?;
        let start = head.location.get() as usize;
        let end = if index == 0 {
            self.body.len()
        } else {
            self.de_head(index - 1)?.location.get() as usize
        };
        let raw = self.body.get(start..end).ok_or(Error::BadData)?;
        let name = match raw.iter().position(|&b| b == 0) {
            Some(nul) => &raw[..nul],
            None => raw,
        };
        Ok(DirEntry { head: *head, name })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DirEntry<'a> {
    head: DeHead,
    pub name: &'a [u8],
}

impl<'a> DirEntry<'a> {
    pub fn offset(&self) -> u32 {
        self.head.offset.get()
    }

    pub fn dir_id(&self) -> u32 {
        self.head.dir_id.get()
    }

    pub fn object_id(&self) -> u32 {
        self.head.object_id.get()
    }

    /// A "negative" (deleted-but-not-yet-compacted) entry is hidden from
    /// directory listings and lookups.
    pub fn visible(&self) -> bool {
        self.head.state.get() & DEH_VISIBLE_BIT != 0
    }
}

/// An indirect item body: an array of block numbers, one per logical block
/// of file data it covers. A zero entry is a hole.
pub struct IndirectItem<'a> {
    body: &'a [U32],
}

impl<'a> IndirectItem<'a> {
    pub fn new(body: &'a [u8]) -> Result<IndirectItem<'a>> {
        let entries = <[U32]>::ref_from_bytes(body).map_err(|_| Error::BadData)?;
        Ok(IndirectItem { body: entries })
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn block_number(&self, index: usize) -> Result<u32> {
        self.body.get(index).map(|v| v.get()).ok_or(Error::BadData)
    }
}
