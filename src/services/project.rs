//! 项目批量导入与归档导出
//!
//! 导入的文件内容并发读取（每个文件一个任务），读完后一次性
//! 提交到虚拟文件系统；单个文件读取失败以哨兵内容顶替，不中断整批。

use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::models::{EntryId, Vfs, VfsError};
use crate::workspace::Workspace;

/// 归档中的一项：`path` 以根名开头；空文件夹以尾部 `/` 标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: String,
    pub content: String,
}

impl ArchiveFile {
    pub fn is_folder_marker(&self) -> bool {
        self.path.ends_with('/')
    }
}

/// 并发读取一批源文件，失败的文件换成哨兵内容并记录 warn
pub fn read_sources(sources: Vec<(String, PathBuf)>) -> io::Result<Vec<(String, String)>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .or_else(|e| {
            tracing::error!(
                error = %e,
                "Failed to create multi-thread tokio runtime, falling back to current-thread"
            );
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
        })?;

    Ok(runtime.block_on(async move {
        let mut handles = Vec::with_capacity(sources.len());
        for (rel_path, disk_path) in sources {
            handles.push((
                rel_path,
                tokio::spawn(async move { tokio::fs::read_to_string(&disk_path).await }),
            ));
        }

        let mut out = Vec::with_capacity(handles.len());
        for (rel_path, handle) in handles {
            let content = match handle.await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    tracing::warn!(path = %rel_path, error = %e, "source read failed, substituting placeholder");
                    format!("// failed to read: {e}")
                }
                Err(e) => {
                    tracing::warn!(path = %rel_path, error = %e, "source read task failed, substituting placeholder");
                    format!("// failed to read: {e}")
                }
            };
            out.push((rel_path, content));
        }
        out
    }))
}

/// 整项目替换导入：条目共享的顶层段成为新的根名（根 id 复用），
/// 中间文件夹按累计路径懒创建，打开列表 / 活动文件 / 当前目录全部重置。
/// 返回实际建出的文件数。
pub fn import_flat_file_list(ws: &mut Workspace, entries: &[(String, String)]) -> usize {
    let Some(root_name) = entries
        .iter()
        .find_map(|(path, _)| path.split('/').find(|s| !s.is_empty()))
    else {
        tracing::warn!("flat file list import with no usable entries");
        return 0;
    };
    let root_name = root_name.to_string();

    ws.vfs_mut().reset_root(&root_name);
    let root = ws.vfs().root();

    // 累计路径 -> 文件夹 id，同一前缀跨多个文件只建一次
    let mut folders: FxHashMap<String, EntryId> = FxHashMap::default();
    folders.insert(root_name.clone(), root);

    let mut created = 0;
    for (path, content) in entries {
        let folder_entry = path.ends_with('/');
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((top, rest)) = segments.split_first() else {
            continue;
        };
        if *top != root_name {
            tracing::warn!(path = %path, "entry outside the common top segment, placing under root");
        }

        let folder_segments = if folder_entry {
            rest
        } else if rest.is_empty() {
            continue;
        } else {
            &rest[..rest.len() - 1]
        };

        let mut accumulated = root_name.clone();
        let mut parent = root;
        let mut ok = true;
        for segment in folder_segments {
            accumulated.push('/');
            accumulated.push_str(segment);
            parent = match folders.get(&accumulated) {
                Some(id) => *id,
                None => match ensure_folder(ws.vfs_mut(), segment, parent) {
                    Ok(id) => {
                        folders.insert(accumulated.clone(), id);
                        id
                    }
                    Err(e) => {
                        tracing::warn!(path = %path, error = %e, "skipping entry");
                        ok = false;
                        break;
                    }
                },
            };
        }
        if !ok || folder_entry {
            continue;
        }

        let file_name = rest[rest.len() - 1];
        match ws.vfs_mut().create_file(file_name, parent) {
            Ok(id) => {
                // create_file 保证了内容槽存在，这里填入真实内容
                let _ = ws.vfs_mut().set_content(id, content.clone());
                created += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "skipping duplicate entry");
            }
        }
    }

    ws.reset_session();
    tracing::info!(files = created, root = %root_name, "project replaced by import");
    created
}

fn ensure_folder(vfs: &mut Vfs, name: &str, parent: EntryId) -> Result<EntryId, VfsError> {
    if let Some(existing) = vfs.child_by_name(parent, name) {
        if vfs.is_folder(existing) {
            return Ok(existing);
        }
        return Err(VfsError::NameCollision);
    }
    vfs.create_folder(name, parent)
}

/// 合并导入：把 (名字, 内容) 加为根的直接子项。
/// 与已有子项重名的条目跳过，返回被跳过的名字（报告，不致命）。
pub fn import_files_to_root(ws: &mut Workspace, entries: &[(String, String)]) -> Vec<String> {
    let root = ws.vfs().root();
    let mut skipped = Vec::new();

    for (name, content) in entries {
        match ws.vfs_mut().create_file(name, root) {
            Ok(id) => {
                let _ = ws.vfs_mut().set_content(id, content.clone());
            }
            Err(VfsError::NameCollision) => {
                tracing::warn!(name = %name, "root import skipped existing name");
                skipped.push(name.clone());
            }
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "root import skipped entry");
                skipped.push(name.clone());
            }
        }
    }

    ws.persist_fs();
    ws.persist_contents();
    skipped
}

/// 从根的子项开始深度优先导出；纯读取，不修改任何状态。
/// 空文件夹输出一条尾部 `/` 的标记项，保证往返导入能还原层级。
pub fn export_archive(vfs: &Vfs) -> Vec<ArchiveFile> {
    let root_name = vfs.name_of(vfs.root()).unwrap_or("Project").to_string();
    let mut out = Vec::new();
    // 显式栈代替递归
    let mut stack: Vec<(EntryId, String)> = vec![(vfs.root(), root_name)];

    while let Some((id, path)) = stack.pop() {
        let Some(children) = vfs.children_of(id) else {
            continue;
        };
        let children: Vec<(String, EntryId)> = children
            .map(|(name, id)| (name.to_string(), id))
            .collect();

        if children.is_empty() && id != vfs.root() {
            out.push(ArchiveFile {
                path: format!("{path}/"),
                content: String::new(),
            });
            continue;
        }

        // 文件按名字顺序直接输出；子文件夹倒序入栈，出栈时恢复名字顺序
        let mut folders = Vec::new();
        for (name, child) in children {
            let child_path = format!("{path}/{name}");
            if vfs.is_folder(child) {
                folders.push((child, child_path));
            } else {
                out.push(ArchiveFile {
                    path: child_path,
                    content: vfs.content(child).unwrap_or_default().to_string(),
                });
            }
        }
        for folder in folders.into_iter().rev() {
            stack.push(folder);
        }
    }

    out
}

/// 把归档落到磁盘目录，供宿主提供下载
pub fn write_archive_to_dir(files: &[ArchiveFile], dir: &Path) -> io::Result<()> {
    for file in files {
        let target = dir.join(&file.path);
        if file.is_folder_marker() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &file.content)?;
    }
    Ok(())
}
