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

//! Read-only ReiserFS (v3.5/v3.6) file system for the Hyrax operating
//! system. Never writes to the device and never replays the journal; a
//! volume whose journal needs replay is refused at mount time.

pub mod block;
pub mod error;
pub mod format;
pub mod hash;
pub mod item;
pub mod iter;
pub mod key;
pub mod node;
pub mod settings;
pub mod stream;
pub mod tree;
pub mod vfs;
pub mod vnode;
pub mod volume;

pub use error::{Error, Result};

/// Offset of the `.` directory entry, and of a `StatData` item (every object
/// has exactly one, at this offset).
pub const DOT_OFFSET: u64 = 1;
/// Offset of the `..` directory entry.
pub const DOT_DOT_OFFSET: u64 = 2;
/// Offset of the first byte of file body data.
pub const SD_OFFSET: u64 = 0;
pub const FIRST_ITEM_OFFSET: u64 = 1;

/// `dir_id` of the filesystem root's parent; never resolvable to a real
/// object.
pub const REISERFS_ROOT_PARENT_OBJECTID: u32 = 1;
/// `object_id` of the filesystem root directory.
pub const REISERFS_ROOT_OBJECTID: u32 = 2;
