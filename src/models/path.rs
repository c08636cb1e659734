//! 路径解析：斜杠分隔的路径字符串 <-> 条目 id
//!
//! 解析器本身无状态，只依赖 Vfs 和一个当前目录 id。

use super::vfs::{EntryId, Vfs};

/// 把路径解析为条目 id。
///
/// - 空串或 `/` 解析为根
/// - 以 `/` 开头从根解析，否则从 `cwd` 解析
/// - `.` 原地不动；`..` 上移一级，根之上被吸收（停留在根，不报错）
/// - 其余段必须命中当前文件夹的某个子项，否则返回 None
pub fn resolve(vfs: &Vfs, path: &str, cwd: EntryId) -> Option<EntryId> {
    if path.is_empty() || path == "/" {
        return Some(vfs.root());
    }

    let mut current = if path.starts_with('/') {
        vfs.root()
    } else {
        cwd
    };
    if !vfs.exists(current) {
        return None;
    }

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        match segment {
            "." => {}
            ".." => {
                // 容忍策略：根目录没有父级，".." 停留在根
                current = vfs.parent_of(current).unwrap_or(vfs.root());
            }
            name => {
                current = vfs.child_by_name(current, name)?;
            }
        }
    }

    Some(current)
}

/// 从条目向上回溯到根，渲染 `/seg1/seg2/...`；根本身渲染为 `/`
pub fn absolute_path(vfs: &Vfs, id: EntryId) -> String {
    let mut parts = Vec::new();
    let mut current = id;

    while current != vfs.root() {
        let Some(name) = vfs.name_of(current) else {
            return "/".to_string();
        };
        parts.push(name.to_string());
        let Some(parent) = vfs.parent_of(current) else {
            return "/".to_string();
        };
        current = parent;
    }

    if parts.is_empty() {
        return "/".to_string();
    }
    parts.reverse();
    format!("/{}", parts.join("/"))
}

/// 根到条目（含两端）的 id 链，作为终端当前目录的物化表示
pub fn id_chain(vfs: &Vfs, id: EntryId) -> Vec<EntryId> {
    let mut chain = vec![];
    let mut current = Some(id);
    while let Some(cur) = current {
        chain.push(cur);
        if cur == vfs.root() {
            break;
        }
        current = vfs.parent_of(cur);
    }
    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Vfs, EntryId, EntryId) {
        let mut vfs = Vfs::new_with_root("Project");
        let root = vfs.root();
        let src = vfs.create_folder("src", root).unwrap();
        vfs.create_file("index.js", src).unwrap();
        vfs.create_file("readme.md", root).unwrap();
        (vfs, root, src)
    }

    #[test]
    fn test_resolve_root_forms() {
        let (vfs, root, src) = sample();
        assert_eq!(resolve(&vfs, "", src), Some(root));
        assert_eq!(resolve(&vfs, "/", src), Some(root));
    }

    #[test]
    fn test_resolve_absolute_and_relative() {
        let (vfs, root, src) = sample();
        let index = vfs.child_by_name(src, "index.js").unwrap();

        assert_eq!(resolve(&vfs, "/src/index.js", root), Some(index));
        assert_eq!(resolve(&vfs, "src/index.js", root), Some(index));
        assert_eq!(resolve(&vfs, "index.js", src), Some(index));
        assert_eq!(resolve(&vfs, "/src", src), Some(src));
    }

    #[test]
    fn test_dot_is_idempotent() {
        let (vfs, root, src) = sample();
        assert_eq!(resolve(&vfs, ".", src), Some(src));
        assert_eq!(resolve(&vfs, "src/.", root), resolve(&vfs, "src", root));
        assert_eq!(resolve(&vfs, "./src/./.", root), Some(src));
    }

    #[test]
    fn test_dotdot_absorbed_at_root() {
        let (vfs, root, src) = sample();
        assert_eq!(resolve(&vfs, "..", root), Some(root));
        assert_eq!(resolve(&vfs, "../../..", root), Some(root));
        assert_eq!(resolve(&vfs, "../..", src), Some(root));
        assert_eq!(resolve(&vfs, "../src", src), Some(src));
    }

    #[test]
    fn test_resolve_failures() {
        let (vfs, root, src) = sample();
        let index = vfs.child_by_name(src, "index.js").unwrap();

        assert_eq!(resolve(&vfs, "missing", root), None);
        assert_eq!(resolve(&vfs, "src/missing.js", root), None);
        // 文件没有子项
        assert_eq!(resolve(&vfs, "index.js/deeper", src), None);
        let _ = index;
    }

    #[test]
    fn test_absolute_path() {
        let (vfs, root, src) = sample();
        let index = vfs.child_by_name(src, "index.js").unwrap();

        assert_eq!(absolute_path(&vfs, root), "/");
        assert_eq!(absolute_path(&vfs, src), "/src");
        assert_eq!(absolute_path(&vfs, index), "/src/index.js");
    }

    #[test]
    fn test_id_chain() {
        let (vfs, root, src) = sample();
        let index = vfs.child_by_name(src, "index.js").unwrap();
        assert_eq!(id_chain(&vfs, root), vec![root]);
        assert_eq!(id_chain(&vfs, index), vec![root, src, index]);
    }
}
