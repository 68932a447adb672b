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

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error")]
    Io,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Byte-addressable backing storage for a file system driver.
pub trait DataStorage {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()>;

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()>;
}
