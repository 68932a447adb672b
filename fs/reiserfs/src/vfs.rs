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

//! Adapts [`Volume`] to the host's [`FileSystem`] trait: `index` is a
//! [`VNodeId`] packed with [`VNodeId::to_ino`], `0` standing for the volume
//! root by convention (spec. §6). Directory reads serialize one
//! [`hyrax_fs::Entry`] per visible child into the caller's buffer; `write`
//! is always rejected, this driver never touches the device.

use std::mem::offset_of;

use hyrax_fs::{Entry, Error as HyraxError, FileSystem, FsError, IoError, Result as HyraxResult};
use zerocopy::TryFromBytes;

use crate::block::{DataStorageSource, RawBlockSource};
use crate::error::Error;
use crate::vnode::VNodeId;
use crate::volume::Volume;

impl From<Error> for HyraxError {
    fn from(error: Error) -> HyraxError {
        match error {
            Error::BadValue => HyraxError::Fs(FsError::BadValue),
            Error::NotFound => HyraxError::Fs(FsError::NotFound),
            Error::BadData => HyraxError::Fs(FsError::Inconsistent),
            Error::Io(_) => HyraxError::Io(IoError::Read),
            Error::NoMemory => HyraxError::NoMemory,
            Error::ReadOnlyDevice => HyraxError::Io(IoError::ReadOnly),
            Error::NotAllowed => HyraxError::NotAllowed,
            Error::NameTooLong => HyraxError::Fs(FsError::NameTooLong),
        }
    }
}

fn ino_of(volume: &Volume<impl RawBlockSource>, index: u64) -> VNodeId {
    if index == 0 {
        volume.root()
    } else {
        VNodeId::from_ino(index)
    }
}

impl<DS: hyrax_ds::DataStorage> Volume<DataStorageSource<DS>> {
    /// One path-component resolution (spec. §6, "lookup"): `parent_index`
    /// follows the same packed-`VNodeId`/`0`-is-root convention `stat` and
    /// `read` use, `name` is the component to resolve, and the result is
    /// the child's packed id. This is the adapter's one production entry
    /// point onto [`Volume::lookup`]'s name-hash fast path -- `hyrax_fs::FileSystem`
    /// has no dedicated lookup operation, so a host resolves paths through
    /// this method rather than by listing via `stat` and scanning by hand.
    pub fn lookup_by_name(&self, parent_index: u64, name: &[u8]) -> HyraxResult<u64> {
        let dir = ino_of(self, parent_index);
        let found = self.lookup(dir, name)?;
        Ok(found.to_ino())
    }
}

impl<DS: hyrax_ds::DataStorage> FileSystem for Volume<DataStorageSource<DS>> {
    /// Lists `index`'s children into `buffer`, one [`Entry`] per visible,
    /// non-hidden, non-esoteric child; `..` is synthesized for the root.
    /// Unlike the source this generalizes from, `offset` is honored as an
    /// entry count to skip, so a host can page a large directory across
    /// several calls instead of always restarting from the first entry.
    fn stat(&self, index: u64, offset: u64, mut buffer: &mut [u8]) -> HyraxResult<u64> {
        let dir = ino_of(self, index);
        let entries = self.read_dir(dir)?;
        let mut listed = 0u64;
        for entry in entries.into_iter().skip(offset as usize) {
            let Ok(slot) = Entry::try_mut_from_bytes(buffer) else {
                break;
            };
            if slot.name.len() < entry.name.len() {
                break;
            }
            slot.index = entry.id.to_ino();
            slot.data_length = entry.size;
            slot.name_length = entry.name.len() as u8;
            slot.name[..entry.name.len()].copy_from_slice(&entry.name);

            let entry_size =
                (offset_of!(Entry, name_length) + 1 + entry.name.len()).next_multiple_of(align_of::<u64>());
            buffer = &mut buffer[entry_size..];
            listed += 1;
        }
        Ok(listed)
    }

    /// Reads `index`'s file body, or its symlink target if `index` names a
    /// symlink (the host resolves paths one component at a time and needs
    /// no separate entry point for reading a link's target bytes).
    fn read(&self, index: u64, offset: u64, buffer: &mut [u8]) -> HyraxResult<()> {
        let id = ino_of(self, index);
        let stat = self.stat(id)?;
        let copied = if stat.is_symlink() {
            self.read_symlink(id, buffer)?
        } else {
            self.read(id, offset, buffer)?
        };
        if copied < buffer.len() {
            buffer[copied..].fill(0);
        }
        Ok(())
    }

    fn write(&self, _index: u64, _offset: u64, _buffer: &[u8]) -> HyraxResult<()> {
        Err(HyraxError::Io(IoError::ReadOnly))
    }
}
