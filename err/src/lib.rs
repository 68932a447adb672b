#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Not implemented")]
    Unimplemented,
    #[error("IO: {0}")]
    Io(IoError),
    #[error("FS: {0}")]
    Fs(FsError),
    #[error("Out of memory")]
    NoMemory,
    #[error("Not allowed")]
    NotAllowed,
}

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error("Read-only")]
    ReadOnly,
    #[error("Read failed")]
    Read,
}

#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("Inconsistent")]
    Inconsistent,
    #[error("Index")]
    Index,
    #[error("Not found")]
    NotFound,
    #[error("Invalid argument")]
    BadValue,
    #[error("Name too long")]
    NameTooLong,
}

impl From<hyrax_ds::Error> for Error {
    fn from(_: hyrax_ds::Error) -> Self {
        Error::Io(IoError::Read)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
