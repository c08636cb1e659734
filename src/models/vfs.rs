//! 虚拟文件系统数据模型
//!
//! 所有条目平坦存储在 arena 中，父子关系通过 id 引用表达，
//! 文件内容单独存放在 content map 里（文件夹操作不触碰大字符串）。

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use std::collections::BTreeMap;
use std::fmt;

new_key_type! { pub struct EntryId; }

/// 条目类型
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Folder,
}

/// 虚拟文件系统操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VfsError {
    NotFound,
    InvalidParent,
    NameCollision,
    RootImmutable,
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VfsError::NotFound => write!(f, "no such file or folder"),
            VfsError::InvalidParent => write!(f, "parent is not a folder"),
            VfsError::NameCollision => write!(f, "name already exists in parent"),
            VfsError::RootImmutable => write!(f, "root folder cannot be modified"),
        }
    }
}

impl std::error::Error for VfsError {}

/// 树节点：仅存储名字和父指针，完整路径按需计算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub kind: EntryKind,
    pub name: String,
    pub parent: Option<EntryId>,
    /// 仅文件夹有值；按名字有序，天然保证同级名字唯一
    pub children: Option<BTreeMap<String, EntryId>>,
}

impl Entry {
    fn new_file(name: String, parent: Option<EntryId>) -> Self {
        Self {
            kind: EntryKind::File,
            name,
            parent,
            children: None,
        }
    }

    fn new_folder(name: String, parent: Option<EntryId>) -> Self {
        Self {
            kind: EntryKind::Folder,
            name,
            parent,
            children: Some(BTreeMap::new()),
        }
    }
}

/// 条目图的持久化形态（内容 map 单独成槽）
#[derive(Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub arena: SlotMap<EntryId, Entry>,
    pub root: EntryId,
}

/// 虚拟文件系统：arena 条目图 + 内容 map
pub struct Vfs {
    arena: SlotMap<EntryId, Entry>,
    root: EntryId,
    contents: FxHashMap<EntryId, String>,
}

const DEFAULT_INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>My Page</title>
    <link rel="stylesheet" href="style.css">
</head>
<body>
    <h1>Hello, codeno!</h1>
    <p>Edit this content and see the live preview update.</p>
    <script src="script.js"></script>
</body>
</html>"#;

const DEFAULT_STYLE_CSS: &str = r#"body {
    font-family: Arial, sans-serif;
    margin: 20px;
    background-color: #f0f0f0;
    color: #333;
}

h1 {
    color: var(--primary-color, teal);
}"#;

const DEFAULT_SCRIPT_JS: &str = r#"console.log("Hello from script.js!");

document.addEventListener('DOMContentLoaded', () => {
    const heading = document.querySelector('h1');
    if (heading) {
        heading.textContent += ' (JS Loaded)';
    }
});"#;

impl Vfs {
    /// 创建只有根文件夹的空文件系统
    pub fn new_with_root(root_name: &str) -> Self {
        let mut arena = SlotMap::with_key();
        let root = arena.insert(Entry::new_folder(root_name.to_string(), None));
        Self {
            arena,
            root,
            contents: FxHashMap::default(),
        }
    }

    /// 新用户看到的默认项目：index.html / style.css / script.js / assets
    pub fn default_project() -> Self {
        let mut vfs = Self::new_with_root("Project");
        let root = vfs.root;
        let seed = [
            ("index.html", DEFAULT_INDEX_HTML),
            ("style.css", DEFAULT_STYLE_CSS),
            ("script.js", DEFAULT_SCRIPT_JS),
        ];
        for (name, content) in seed {
            if let Ok(id) = vfs.create_file(name, root) {
                vfs.contents.insert(id, content.to_string());
            }
        }
        let _ = vfs.create_folder("assets", root);
        vfs
    }

    /// 从持久化快照重建；内容槽缺失的文件补空串，未知 id 的内容丢弃。
    /// 快照来自外部（可能是另一个标签页写的），条目图不一致时整体拒绝，
    /// 由调用方回退默认项目。
    pub fn from_snapshot(graph: GraphSnapshot, contents: Vec<(EntryId, String)>) -> Option<Self> {
        let GraphSnapshot { arena, root } = graph;
        let root_entry = arena.get(root)?;
        if root_entry.kind != EntryKind::Folder || root_entry.parent.is_some() {
            return None;
        }

        let mut map = FxHashMap::default();
        for (id, text) in contents {
            if arena.get(id).is_some_and(|e| e.kind == EntryKind::File) {
                map.insert(id, text);
            } else {
                tracing::warn!("dropping content for unknown or non-file id");
            }
        }
        for (id, entry) in arena.iter() {
            if entry.kind == EntryKind::File {
                map.entry(id).or_default();
            }
        }

        let vfs = Self {
            arena,
            root,
            contents: map,
        };
        if let Err(e) = vfs.validate() {
            tracing::warn!(error = %e, "rejecting inconsistent file system snapshot");
            return None;
        }
        Some(vfs)
    }

    #[cfg(test)]
    pub fn from_snapshot_unchecked(graph: GraphSnapshot) -> Self {
        let GraphSnapshot { arena, root } = graph;
        let mut contents = FxHashMap::default();
        for (id, entry) in arena.iter() {
            if entry.kind == EntryKind::File {
                contents.insert(id, String::new());
            }
        }
        Self {
            arena,
            root,
            contents,
        }
    }

    pub fn graph_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            arena: self.arena.clone(),
            root: self.root,
        }
    }

    pub fn contents_snapshot(&self) -> Vec<(EntryId, String)> {
        let mut pairs: Vec<_> = self
            .contents
            .iter()
            .map(|(id, text)| (*id, text.clone()))
            .collect();
        pairs.sort_by_key(|(id, _)| *id);
        pairs
    }

    pub fn root(&self) -> EntryId {
        self.root
    }

    pub fn exists(&self, id: EntryId) -> bool {
        self.arena.contains_key(id)
    }

    pub fn name_of(&self, id: EntryId) -> Option<&str> {
        self.arena.get(id).map(|e| e.name.as_str())
    }

    pub fn kind_of(&self, id: EntryId) -> Option<EntryKind> {
        self.arena.get(id).map(|e| e.kind)
    }

    pub fn is_folder(&self, id: EntryId) -> bool {
        self.arena
            .get(id)
            .map(|e| e.kind == EntryKind::Folder)
            .unwrap_or(false)
    }

    pub fn is_file(&self, id: EntryId) -> bool {
        self.arena
            .get(id)
            .map(|e| e.kind == EntryKind::File)
            .unwrap_or(false)
    }

    pub fn parent_of(&self, id: EntryId) -> Option<EntryId> {
        self.arena.get(id).and_then(|e| e.parent)
    }

    /// 按名字有序遍历某文件夹的直接子项
    pub fn children_of(&self, id: EntryId) -> Option<impl Iterator<Item = (&str, EntryId)>> {
        self.arena
            .get(id)
            .and_then(|e| e.children.as_ref())
            .map(|c| c.iter().map(|(name, id)| (name.as_str(), *id)))
    }

    pub fn child_by_name(&self, parent: EntryId, name: &str) -> Option<EntryId> {
        self.arena
            .get(parent)?
            .children
            .as_ref()?
            .get(name)
            .copied()
    }

    pub fn content(&self, id: EntryId) -> Option<&str> {
        self.contents.get(&id).map(|s| s.as_str())
    }

    pub fn set_content(&mut self, id: EntryId, text: String) -> Result<(), VfsError> {
        if !self.is_file(id) {
            return Err(VfsError::NotFound);
        }
        self.contents.insert(id, text);
        Ok(())
    }

    pub fn create_file(&mut self, name: &str, parent: EntryId) -> Result<EntryId, VfsError> {
        let id = self.insert_child(name, parent, EntryKind::File)?;
        self.contents.insert(id, String::new());
        Ok(id)
    }

    pub fn create_folder(&mut self, name: &str, parent: EntryId) -> Result<EntryId, VfsError> {
        self.insert_child(name, parent, EntryKind::Folder)
    }

    fn insert_child(
        &mut self,
        name: &str,
        parent: EntryId,
        kind: EntryKind,
    ) -> Result<EntryId, VfsError> {
        // 只读预检，失败时不留下任何修改
        {
            let parent_ro = self.arena.get(parent).ok_or(VfsError::InvalidParent)?;
            let children_ro = parent_ro.children.as_ref().ok_or(VfsError::InvalidParent)?;
            if children_ro.contains_key(name) {
                return Err(VfsError::NameCollision);
            }
        }

        let node = match kind {
            EntryKind::File => Entry::new_file(name.to_string(), Some(parent)),
            EntryKind::Folder => Entry::new_folder(name.to_string(), Some(parent)),
        };
        let id = self.arena.insert(node);

        let parent_node = self.arena.get_mut(parent).ok_or(VfsError::InvalidParent)?;
        let children = parent_node
            .children
            .as_mut()
            .ok_or(VfsError::InvalidParent)?;
        children.insert(name.to_string(), id);

        Ok(id)
    }

    pub fn rename(&mut self, id: EntryId, new_name: &str) -> Result<(), VfsError> {
        if id == self.root {
            return Err(VfsError::RootImmutable);
        }

        let (parent, old_name) = {
            let node = self.arena.get(id).ok_or(VfsError::NotFound)?;
            (node.parent, node.name.clone())
        };

        if old_name == new_name {
            return Ok(());
        }

        if let Some(parent_id) = parent {
            let parent_node = self.arena.get_mut(parent_id).ok_or(VfsError::NotFound)?;
            let children = parent_node
                .children
                .as_mut()
                .ok_or(VfsError::InvalidParent)?;
            if children.contains_key(new_name) {
                return Err(VfsError::NameCollision);
            }
            children.remove(&old_name);
            children.insert(new_name.to_string(), id);
        }

        self.arena.get_mut(id).ok_or(VfsError::NotFound)?.name = new_name.to_string();
        Ok(())
    }

    /// 级联删除整棵子树，返回所有被移除的条目 id（含 `id` 自身）
    pub fn delete(&mut self, id: EntryId) -> Result<Vec<EntryId>, VfsError> {
        if id == self.root {
            return Err(VfsError::RootImmutable);
        }

        let (parent, name) = {
            let node = self.arena.get(id).ok_or(VfsError::NotFound)?;
            (node.parent, node.name.clone())
        };

        if let Some(parent_id) = parent {
            if let Some(children) = self
                .arena
                .get_mut(parent_id)
                .and_then(|n| n.children.as_mut())
            {
                children.remove(&name);
            }
        }

        Ok(self.remove_subtree(id))
    }

    /// 显式栈遍历，不依赖宿主调用栈深度
    fn remove_subtree(&mut self, id: EntryId) -> Vec<EntryId> {
        let mut removed = Vec::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            let Some(node) = self.arena.remove(current) else {
                continue;
            };
            if let Some(children) = node.children {
                stack.extend(children.into_values());
            }
            self.contents.remove(&current);
            removed.push(current);
        }

        removed
    }

    /// 整体替换前的清场：移除根下所有子树并改名，根 id 保持不变
    pub fn reset_root(&mut self, new_root_name: &str) {
        let child_ids: Vec<EntryId> = self
            .arena
            .get(self.root)
            .and_then(|e| e.children.as_ref())
            .map(|c| c.values().copied().collect())
            .unwrap_or_default();

        for child in child_ids {
            self.remove_subtree(child);
        }

        if let Some(root) = self.arena.get_mut(self.root) {
            root.name = new_root_name.to_string();
            root.children = Some(BTreeMap::new());
        }
        self.contents.clear();
    }

    pub fn entry_count(&self) -> usize {
        self.arena.len()
    }

    /// 一致性自检，快照加载与测试共用：父子双向一致、所有条目从根可达
    /// （无环、无孤儿）、内容 map 与文件集合一一对应
    pub fn validate(&self) -> Result<(), String> {
        if !self.arena.contains_key(self.root) {
            return Err("root entry missing from arena".to_string());
        }

        for (id, entry) in self.arena.iter() {
            match entry.parent {
                None => {
                    if id != self.root {
                        return Err(format!("non-root entry {:?} has no parent", id));
                    }
                }
                Some(parent) => {
                    let parent_entry = self
                        .arena
                        .get(parent)
                        .ok_or_else(|| format!("entry {:?} has dangling parent", id))?;
                    let children = parent_entry
                        .children
                        .as_ref()
                        .ok_or_else(|| format!("parent of {:?} is not a folder", id))?;
                    if children.get(&entry.name) != Some(&id) {
                        return Err(format!("entry {:?} missing from parent children", id));
                    }
                }
            }

            match entry.kind {
                EntryKind::File => {
                    if entry.children.is_some() {
                        return Err(format!("file {:?} has children", id));
                    }
                    if !self.contents.contains_key(&id) {
                        return Err(format!("file {:?} has no content entry", id));
                    }
                }
                EntryKind::Folder => {
                    for (name, child) in entry.children.as_ref().into_iter().flatten() {
                        let child_entry = self
                            .arena
                            .get(*child)
                            .ok_or_else(|| format!("folder {:?} lists dangling child", id))?;
                        if child_entry.parent != Some(id) || &child_entry.name != name {
                            return Err(format!("child {:?} disagrees with parent {:?}", child, id));
                        }
                    }
                }
            }
        }

        for id in self.contents.keys() {
            if !self.arena.contains_key(*id) {
                return Err(format!("content entry {:?} has no graph entry", id));
            }
        }

        // 从根出发的可达性：逐对一致但与根断开的环也要拒绝
        let mut seen = rustc_hash::FxHashSet::default();
        seen.insert(self.root);
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(children) = self.arena.get(id).and_then(|e| e.children.as_ref()) {
                for &child in children.values() {
                    if seen.insert(child) {
                        stack.push(child);
                    }
                }
            }
        }
        if seen.len() != self.arena.len() {
            return Err(format!(
                "{} entries unreachable from root",
                self.arena.len() - seen.len()
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_vfs() {
        let vfs = Vfs::new_with_root("Project");
        assert!(vfs.is_folder(vfs.root()));
        assert_eq!(vfs.name_of(vfs.root()), Some("Project"));
        vfs.validate().unwrap();
    }

    #[test]
    fn test_create_file_and_folder() {
        let mut vfs = Vfs::new_with_root("Project");
        let root = vfs.root();

        let file = vfs.create_file("a.txt", root).unwrap();
        let dir = vfs.create_folder("src", root).unwrap();

        assert!(vfs.is_file(file));
        assert!(vfs.is_folder(dir));
        assert_eq!(vfs.content(file), Some(""));
        vfs.validate().unwrap();
    }

    #[test]
    fn test_name_collision_leaves_single_entry() {
        let mut vfs = Vfs::new_with_root("Project");
        let root = vfs.root();

        vfs.create_file("a.txt", root).unwrap();
        let err = vfs.create_file("a.txt", root).unwrap_err();
        assert_eq!(err, VfsError::NameCollision);

        let matches: Vec<_> = vfs
            .children_of(root)
            .unwrap()
            .filter(|(name, _)| *name == "a.txt")
            .collect();
        assert_eq!(matches.len(), 1);
        vfs.validate().unwrap();
    }

    #[test]
    fn test_create_under_file_is_invalid_parent() {
        let mut vfs = Vfs::new_with_root("Project");
        let file = vfs.create_file("a.txt", vfs.root()).unwrap();
        assert_eq!(
            vfs.create_file("b.txt", file).unwrap_err(),
            VfsError::InvalidParent
        );
    }

    #[test]
    fn test_rename() {
        let mut vfs = Vfs::new_with_root("Project");
        let root = vfs.root();
        let file = vfs.create_file("old.txt", root).unwrap();

        vfs.rename(file, "new.txt").unwrap();
        assert_eq!(vfs.name_of(file), Some("new.txt"));
        assert_eq!(vfs.child_by_name(root, "new.txt"), Some(file));
        assert_eq!(vfs.child_by_name(root, "old.txt"), None);
        vfs.validate().unwrap();
    }

    #[test]
    fn test_rename_collision_and_root() {
        let mut vfs = Vfs::new_with_root("Project");
        let root = vfs.root();
        vfs.create_file("a.txt", root).unwrap();
        let b = vfs.create_file("b.txt", root).unwrap();

        assert_eq!(vfs.rename(b, "a.txt").unwrap_err(), VfsError::NameCollision);
        assert_eq!(
            vfs.rename(root, "other").unwrap_err(),
            VfsError::RootImmutable
        );
        vfs.validate().unwrap();
    }

    #[test]
    fn test_delete_cascades_and_drops_content() {
        let mut vfs = Vfs::new_with_root("Project");
        let root = vfs.root();
        let dir = vfs.create_folder("src", root).unwrap();
        let sub = vfs.create_folder("deep", dir).unwrap();
        let f1 = vfs.create_file("main.rs", dir).unwrap();
        let f2 = vfs.create_file("util.rs", sub).unwrap();

        let removed = vfs.delete(dir).unwrap();
        assert_eq!(removed.len(), 4);
        for id in [dir, sub, f1, f2] {
            assert!(!vfs.exists(id));
            assert!(vfs.content(id).is_none());
        }
        assert_eq!(vfs.delete(root).unwrap_err(), VfsError::RootImmutable);
        assert_eq!(vfs.delete(dir).unwrap_err(), VfsError::NotFound);
        vfs.validate().unwrap();
    }

    #[test]
    fn test_reset_root_keeps_root_id() {
        let mut vfs = Vfs::default_project();
        let root = vfs.root();
        assert!(vfs.entry_count() > 1);

        vfs.reset_root("imported");
        assert_eq!(vfs.root(), root);
        assert_eq!(vfs.name_of(root), Some("imported"));
        assert_eq!(vfs.entry_count(), 1);
        assert_eq!(vfs.contents_snapshot().len(), 0);
        vfs.validate().unwrap();
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut vfs = Vfs::default_project();
        let root = vfs.root();
        let dir = vfs.create_folder("src", root).unwrap();
        let file = vfs.create_file("main.rs", dir).unwrap();
        vfs.set_content(file, "fn main() {}".to_string()).unwrap();

        let graph = vfs.graph_snapshot();
        let contents = vfs.contents_snapshot();
        let json_graph = serde_json::to_string(&graph).unwrap();
        let json_contents = serde_json::to_string(&contents).unwrap();

        let restored = Vfs::from_snapshot(
            serde_json::from_str(&json_graph).unwrap(),
            serde_json::from_str(&json_contents).unwrap(),
        )
        .unwrap();

        assert_eq!(restored.root(), root);
        assert_eq!(restored.content(file), Some("fn main() {}"));
        assert_eq!(restored.child_by_name(dir, "main.rs"), Some(file));
        restored.validate().unwrap();
    }

    #[test]
    fn test_from_snapshot_rejects_detached_cycle() {
        let mut vfs = Vfs::new_with_root("Project");
        let root = vfs.root();
        let a = vfs.create_folder("a", root).unwrap();
        let b = vfs.create_folder("b", a).unwrap();

        // 把 a 从根摘下并接到 b 下面：a ⇄ b 逐对一致但与根断开
        let mut graph = vfs.graph_snapshot();
        graph.arena[root].children.as_mut().unwrap().remove("a");
        graph.arena[a].parent = Some(b);
        graph.arena[b]
            .children
            .as_mut()
            .unwrap()
            .insert("a".to_string(), a);

        assert!(Vfs::from_snapshot(graph, Vec::new()).is_none());
    }

    #[test]
    fn test_from_snapshot_rejects_one_sided_parent_link() {
        let mut vfs = Vfs::new_with_root("Project");
        let root = vfs.root();
        vfs.create_file("a.txt", root).unwrap();

        // 子项仍指向根，但根的 children 里没有它
        let mut graph = vfs.graph_snapshot();
        graph.arena[root].children.as_mut().unwrap().remove("a.txt");

        assert!(Vfs::from_snapshot(graph, vfs.contents_snapshot()).is_none());
    }

    #[test]
    fn test_validate_detects_unreachable_entries() {
        let mut vfs = Vfs::new_with_root("Project");
        let root = vfs.root();
        let a = vfs.create_folder("a", root).unwrap();
        let b = vfs.create_folder("b", a).unwrap();

        let mut graph = vfs.graph_snapshot();
        graph.arena[root].children.as_mut().unwrap().remove("a");
        graph.arena[a].parent = Some(b);
        graph.arena[b]
            .children
            .as_mut()
            .unwrap()
            .insert("a".to_string(), a);

        let tampered = Vfs::from_snapshot_unchecked(graph);
        let err = tampered.validate().unwrap_err();
        assert!(err.contains("unreachable"), "unexpected error: {err}");
    }

    #[test]
    fn test_default_project_layout() {
        let vfs = Vfs::default_project();
        let root = vfs.root();
        for name in ["index.html", "style.css", "script.js", "assets"] {
            assert!(vfs.child_by_name(root, name).is_some(), "missing {name}");
        }
        let html = vfs.child_by_name(root, "index.html").unwrap();
        assert!(vfs.content(html).unwrap().contains("</head>"));
        vfs.validate().unwrap();
    }
}
