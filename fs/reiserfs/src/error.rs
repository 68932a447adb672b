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

/// The error taxonomy for the ReiserFS driver (spec. §7). Every variant is
/// fatal to the operation it was returned from; none are fatal to the mount
/// unless explicitly noted at the call site.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid argument")]
    BadValue,
    #[error("not found")]
    NotFound,
    #[error("on-disk structure is inconsistent")]
    BadData,
    #[error("underlying block read failed: {0}")]
    Io(#[source] hyrax_ds::Error),
    #[error("out of memory")]
    NoMemory,
    #[error("device is read-only")]
    ReadOnlyDevice,
    #[error("permission denied")]
    NotAllowed,
    #[error("name too long")]
    NameTooLong,
}

impl From<hyrax_ds::Error> for Error {
    fn from(error: hyrax_ds::Error) -> Self {
        Error::Io(error)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
