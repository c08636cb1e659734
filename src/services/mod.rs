//! 服务层模块
//!
//! - SnapshotStore: 键值快照存储（整值写入 + 外部变更对账）
//! - project: 项目批量导入 / 归档导出

pub mod project;
pub mod snapshot;

pub use project::{
    export_archive, import_files_to_root, import_flat_file_list, read_sources, write_archive_to_dir,
    ArchiveFile,
};
pub use snapshot::SnapshotStore;
