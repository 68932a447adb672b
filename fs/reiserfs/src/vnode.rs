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

//! The VNode model: every object is addressed by `(dir_id, object_id)`, the
//! same pair carried in every key belonging to it (spec. §3, "VNode").

use crate::item::StatData;

/// The object identity the host VFS hands back to every other call once a
/// lookup resolves it. Collapsed to a single `u64` for the host's inode
/// number; `dir_id` and `object_id` are recoverable from it, which is what
/// lets `read_vnode` work from the number alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VNodeId {
    pub dir_id: u32,
    pub object_id: u32,
}

impl VNodeId {
    pub fn new(dir_id: u32, object_id: u32) -> VNodeId {
        VNodeId { dir_id, object_id }
    }

    pub fn to_ino(&self) -> u64 {
        (self.dir_id as u64) << 32 | self.object_id as u64
    }

    pub fn from_ino(ino: u64) -> VNodeId {
        VNodeId { dir_id: (ino >> 32) as u32, object_id: ino as u32 }
    }
}

/// A format-independent snapshot of an object's stat data, read once out of
/// whichever on-disk format ([`StatDataV1`](crate::format::StatDataV1) or
/// [`StatDataV2`](crate::format::StatDataV2)) the volume stores.
#[derive(Clone, Copy, Debug)]
pub struct Stat {
    pub mode: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}

impl Stat {
    pub fn from_item(sd: &StatData) -> Stat {
        Stat {
            mode: sd.mode(),
            nlink: sd.nlink(),
            uid: sd.uid(),
            gid: sd.gid(),
            size: sd.size(),
            atime: sd.atime(),
            mtime: sd.mtime(),
            ctime: sd.ctime(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & crate::item::S_IFMT == crate::item::S_IFDIR
    }

    pub fn is_regular(&self) -> bool {
        self.mode & crate::item::S_IFMT == crate::item::S_IFREG
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & crate::item::S_IFMT == crate::item::S_IFLNK
    }
}

/// A resolved object: its identity, its parent directory (needed to resolve
/// `..` without a tree search), and its stat snapshot.
#[derive(Clone, Copy, Debug)]
pub struct VNode {
    pub id: VNodeId,
    pub parent: VNodeId,
    pub stat: Stat,
}
