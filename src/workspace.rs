//! 工作区：顶层状态容器，聚合虚拟文件系统与编辑会话状态
//!
//! 所有 UI 协作方（文件树、标签栏、编辑器、终端）都通过这里修改状态，
//! 每次变更同步写回快照存储的对应槽位。

use serde::{Deserialize, Serialize};

use crate::models::vfs::GraphSnapshot;
use crate::models::{absolute_path, id_chain, EntryId, Vfs, VfsError};
use crate::services::SnapshotStore;

pub const SLOT_FS: &str = "codeno-fs";
pub const SLOT_CONTENTS: &str = "codeno-fc";
pub const SLOT_OPEN_FILES: &str = "codeno-openfiles";
pub const SLOT_ACTIVE_FILE: &str = "codeno-activefile";
pub const SLOT_THEME: &str = "codeno-theme";
pub const SLOT_CWD: &str = "codeno-currentpath";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

/// 打开的文件标签：显示名跟随重命名原地更新，身份由 id 决定
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpenFile {
    pub id: EntryId,
    pub name: String,
}

pub struct Workspace {
    vfs: Vfs,
    open_files: Vec<OpenFile>,
    active_file: Option<EntryId>,
    cwd: Vec<EntryId>,
    theme: Theme,
    store: SnapshotStore,
}

impl Workspace {
    /// 从快照存储加载，槽位缺失或损坏时逐槽回退到默认值
    pub fn init(store: SnapshotStore) -> Self {
        let vfs = store
            .load_slot::<GraphSnapshot>(SLOT_FS)
            .and_then(|graph| {
                let contents = store.load_slot(SLOT_CONTENTS).unwrap_or_default();
                Vfs::from_snapshot(graph, contents)
            })
            .unwrap_or_else(|| {
                tracing::info!("no usable file system snapshot, starting default project");
                Vfs::default_project()
            });

        let mut ws = Self {
            vfs,
            open_files: store.load_slot(SLOT_OPEN_FILES).unwrap_or_default(),
            active_file: store
                .load_slot::<Option<EntryId>>(SLOT_ACTIVE_FILE)
                .flatten(),
            cwd: store.load_slot(SLOT_CWD).unwrap_or_default(),
            theme: store.load_slot(SLOT_THEME).unwrap_or(Theme::Light),
            store,
        };
        ws.sanitize();
        ws
    }

    pub fn new_default() -> Self {
        Self::init(SnapshotStore::new())
    }

    /// 让会话状态与条目图保持一致：剔除悬垂引用，修复当前目录链
    fn sanitize(&mut self) {
        let vfs = &self.vfs;
        let mut seen = rustc_hash::FxHashSet::default();
        self.open_files
            .retain(|f| vfs.is_file(f.id) && seen.insert(f.id));
        for open in &mut self.open_files {
            if let Some(name) = vfs.name_of(open.id) {
                open.name = name.to_string();
            }
        }

        if let Some(active) = self.active_file {
            if !self.open_files.iter().any(|f| f.id == active) {
                self.active_file = None;
            }
        }

        let current = self
            .cwd
            .last()
            .copied()
            .filter(|id| vfs.is_folder(*id))
            .unwrap_or(vfs.root());
        self.cwd = id_chain(vfs, current);
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub(crate) fn vfs_mut(&mut self) -> &mut Vfs {
        &mut self.vfs
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn open_files(&self) -> &[OpenFile] {
        &self.open_files
    }

    pub fn active_file(&self) -> Option<EntryId> {
        self.active_file
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn cwd(&self) -> &[EntryId] {
        &self.cwd
    }

    pub fn current_dir(&self) -> EntryId {
        self.cwd
            .last()
            .copied()
            .filter(|id| self.vfs.is_folder(*id))
            .unwrap_or_else(|| self.vfs.root())
    }

    pub fn pwd(&self) -> String {
        absolute_path(&self.vfs, self.current_dir())
    }

    // --- 文件树操作（带打开列表副作用） ---

    pub fn create_file(&mut self, name: &str, parent: EntryId) -> Result<EntryId, VfsError> {
        let id = self.vfs.create_file(name, parent)?;
        tracing::debug!(name, "file created");
        self.persist_fs();
        self.persist_contents();
        Ok(id)
    }

    pub fn create_folder(&mut self, name: &str, parent: EntryId) -> Result<EntryId, VfsError> {
        let id = self.vfs.create_folder(name, parent)?;
        tracing::debug!(name, "folder created");
        self.persist_fs();
        Ok(id)
    }

    /// 重命名条目；打开列表中的同 id 标签原地更新显示名
    pub fn rename_entry(&mut self, id: EntryId, new_name: &str) -> Result<(), VfsError> {
        self.vfs.rename(id, new_name)?;
        for open in &mut self.open_files {
            if open.id == id {
                open.name = new_name.to_string();
            }
        }
        self.persist_fs();
        self.persist_open_files();
        Ok(())
    }

    /// 级联删除；被删除的打开文件全部关闭，活动指针若指向被删条目则清空
    pub fn delete_entry(&mut self, id: EntryId) -> Result<(), VfsError> {
        let removed = self.vfs.delete(id)?;
        let removed_set: rustc_hash::FxHashSet<EntryId> = removed.iter().copied().collect();

        self.open_files.retain(|f| !removed_set.contains(&f.id));
        if self
            .active_file
            .is_some_and(|active| removed_set.contains(&active))
        {
            self.active_file = None;
        }
        if self.cwd.iter().any(|id| removed_set.contains(id)) {
            self.cwd = vec![self.vfs.root()];
        }

        tracing::debug!(removed = removed.len(), "entries deleted");
        self.persist_fs();
        self.persist_contents();
        self.persist_open_files();
        self.persist_active_file();
        self.persist_cwd();
        Ok(())
    }

    // --- 打开文件列表 / 活动文件 ---

    pub fn open_file(&mut self, id: EntryId) -> Result<(), VfsError> {
        let name = match (self.vfs.is_file(id), self.vfs.name_of(id)) {
            (true, Some(name)) => name.to_string(),
            _ => return Err(VfsError::NotFound),
        };
        if !self.open_files.iter().any(|f| f.id == id) {
            self.open_files.push(OpenFile { id, name });
        }
        self.active_file = Some(id);
        self.persist_open_files();
        self.persist_active_file();
        Ok(())
    }

    /// 关闭标签；若关闭的是活动文件，激活剩余列表的第一个
    pub fn close_file(&mut self, id: EntryId) {
        self.open_files.retain(|f| f.id != id);
        if self.active_file == Some(id) {
            self.active_file = self.open_files.first().map(|f| f.id);
        }
        self.persist_open_files();
        self.persist_active_file();
    }

    pub fn set_active_file(&mut self, id: Option<EntryId>) -> Result<(), VfsError> {
        if let Some(id) = id {
            if !self.open_files.iter().any(|f| f.id == id) {
                return Err(VfsError::NotFound);
            }
        }
        self.active_file = id;
        self.persist_active_file();
        Ok(())
    }

    pub fn update_content(&mut self, id: EntryId, text: String) -> Result<(), VfsError> {
        self.vfs.set_content(id, text)?;
        self.persist_contents();
        Ok(())
    }

    // --- 终端当前目录 / 主题 ---

    pub fn cd(&mut self, target: EntryId) -> Result<(), VfsError> {
        if !self.vfs.is_folder(target) {
            return Err(VfsError::NotFound);
        }
        self.cwd = id_chain(&self.vfs, target);
        self.persist_cwd();
        Ok(())
    }

    pub fn cd_root(&mut self) {
        self.cwd = vec![self.vfs.root()];
        self.persist_cwd();
    }

    pub fn toggle_theme(&mut self) {
        self.theme = match self.theme {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        };
        self.persist_theme();
    }

    // --- 持久化：每个逻辑键独立槽位 ---

    pub(crate) fn persist_fs(&mut self) {
        let snapshot = self.vfs.graph_snapshot();
        self.store.store_slot(SLOT_FS, &snapshot);
    }

    pub(crate) fn persist_contents(&mut self) {
        let snapshot = self.vfs.contents_snapshot();
        self.store.store_slot(SLOT_CONTENTS, &snapshot);
    }

    pub(crate) fn persist_open_files(&mut self) {
        let snapshot = self.open_files.clone();
        self.store.store_slot(SLOT_OPEN_FILES, &snapshot);
    }

    pub(crate) fn persist_active_file(&mut self) {
        let active = self.active_file;
        self.store.store_slot(SLOT_ACTIVE_FILE, &active);
    }

    pub(crate) fn persist_theme(&mut self) {
        let theme = self.theme;
        self.store.store_slot(SLOT_THEME, &theme);
    }

    pub(crate) fn persist_cwd(&mut self) {
        let cwd = self.cwd.clone();
        self.store.store_slot(SLOT_CWD, &cwd);
    }

    pub(crate) fn persist_all(&mut self) {
        self.persist_fs();
        self.persist_contents();
        self.persist_open_files();
        self.persist_active_file();
        self.persist_theme();
        self.persist_cwd();
    }

    /// 整体替换会话状态（整项目导入后调用）
    pub(crate) fn reset_session(&mut self) {
        self.open_files.clear();
        self.active_file = None;
        self.cwd = vec![self.vfs.root()];
        self.persist_all();
    }

    /// 另一个标签页写了同名键：整值替换对应槽位并重新水合该部分状态
    pub fn apply_external_change(&mut self, key: &str, raw: Option<String>) {
        self.store.apply_external(key, raw);
        match key {
            SLOT_FS | SLOT_CONTENTS => {
                if let Some(vfs) = self
                    .store
                    .load_slot::<GraphSnapshot>(SLOT_FS)
                    .and_then(|graph| {
                        let contents = self.store.load_slot(SLOT_CONTENTS).unwrap_or_default();
                        Vfs::from_snapshot(graph, contents)
                    })
                {
                    self.vfs = vfs;
                }
                self.sanitize();
            }
            SLOT_OPEN_FILES => {
                self.open_files = self.store.load_slot(SLOT_OPEN_FILES).unwrap_or_default();
                self.sanitize();
            }
            SLOT_ACTIVE_FILE => {
                self.active_file = self
                    .store
                    .load_slot::<Option<EntryId>>(SLOT_ACTIVE_FILE)
                    .flatten();
                self.sanitize();
            }
            SLOT_THEME => {
                self.theme = self.store.load_slot(SLOT_THEME).unwrap_or(Theme::Light);
            }
            SLOT_CWD => {
                self.cwd = self.store.load_slot(SLOT_CWD).unwrap_or_default();
                self.sanitize();
            }
            other => {
                tracing::debug!(key = other, "ignoring external change for unknown slot");
            }
        }
    }
}
