use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("invalid array '{name}': {source}")]
    Npy {
        name: String,
        #[source]
        source: NpyError,
    },

    #[error("write failed: {0}")]
    WriteFailed(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors decoding a single `.npy` payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NpyError {
    #[error("missing NPY magic bytes")]
    BadMagic,

    #[error("unsupported NPY format version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("truncated payload: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("unsupported dtype '{0}' (expected f2, f4 or f8)")]
    UnsupportedDtype(String),

    #[error("fortran-ordered arrays with {ndim} dimensions are not supported")]
    UnsupportedLayout { ndim: usize },

    #[error("shape {shape:?} does not match {len} values")]
    ShapeMismatch { shape: Vec<usize>, len: usize },
}
