//! 数据模型层

pub mod path;
pub mod vfs;

pub use path::{absolute_path, id_chain, resolve};
pub use vfs::{Entry, EntryId, EntryKind, Vfs, VfsError};
