use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("data not found: {}", path.display())]
    DataNotFound { path: PathBuf },

    #[error("failed to read store file {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: StorageError,
    },

    #[error("failed to write store file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: StorageError,
    },
}

impl StoreError {
    pub(crate) fn from_read(path: PathBuf, source: StorageError) -> Self {
        match source {
            StorageError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::DataNotFound { path }
            }
            source => Self::Storage { path, source },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DataNotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
