//! codeno - 浏览器端内存项目编辑器核心库
//!
//! 模块结构：
//! - models: 数据模型（Vfs 虚拟文件系统、路径解析）
//! - services: 服务层（SnapshotStore 快照存储、项目导入导出）
//! - terminal: 终端命令解释器
//! - preview: 实时预览合成
//! - workspace: 顶层应用状态（Workspace）

pub mod logging;
pub mod models;
pub mod preview;
pub mod services;
pub mod terminal;
pub mod workspace;

pub use workspace::{OpenFile, Theme, Workspace};
