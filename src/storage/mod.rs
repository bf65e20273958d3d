//! Persisted store formats.
//!
//! The bank and centroid files are NumPy `.npz` archives: one `<class>.npy` member per class.
//! [`npy`] decodes and encodes single arrays, [`npz`] walks archives over a read-only
//! [`mmap::MmapFileHandle`].

pub mod error;
pub mod mmap;
pub mod npy;
pub mod npz;

pub use error::{NpyError, StorageError, StorageResult};
pub use npy::{ByteOrder, Dtype, NpyArray, NpyHeader};
pub use npz::{read_npz, read_npz_file, write_npz_file};
