//! 实时预览合成
//!
//! 对 `.html` 文件做一次性的文本拼接：同目录下名字恰好为
//! `style.css` / `script.js` 的文件内容被包上标签后插入文档。
//! 这是刻意的朴素字符串替换，不做 DOM 解析。

use std::time::{Duration, Instant};

use crate::models::{EntryId, Vfs};
use crate::workspace::Workspace;

pub const DEFAULT_PREVIEW_DEBOUNCE: Duration = Duration::from_millis(300);

/// 合成可渲染文档；非 .html 文件原样返回内容
pub fn compose(ws: &Workspace, id: EntryId) -> String {
    let vfs = ws.vfs();
    if !vfs.is_file(id) {
        return String::new();
    }
    let name = vfs.name_of(id).unwrap_or_default();
    let mut html = vfs.content(id).unwrap_or_default().to_string();
    if !name.ends_with(".html") {
        return html;
    }

    let Some(parent) = vfs.parent_of(id) else {
        return html;
    };

    if let Some(css) = sibling_content(vfs, parent, "style.css") {
        let block = format!("<style>\n{css}\n</style>");
        html = if html.contains("</head>") {
            html.replacen("</head>", &format!("{block}\n</head>"), 1)
        } else {
            format!("{block}\n{html}")
        };
    }

    if let Some(js) = sibling_content(vfs, parent, "script.js") {
        let block = format!("<script>\n{js}\n</script>");
        html = if html.contains("</body>") {
            html.replacen("</body>", &format!("{block}\n</body>"), 1)
        } else {
            format!("{html}\n{block}")
        };
    }

    html
}

/// 精确名字匹配（区分大小写），内容为空视为没有
fn sibling_content<'a>(vfs: &'a Vfs, parent: EntryId, name: &str) -> Option<&'a str> {
    let id = vfs.child_by_name(parent, name)?;
    if !vfs.is_file(id) {
        return None;
    }
    vfs.content(id).filter(|c| !c.is_empty())
}

/// 单槽防抖句柄：每次变更取消并重排，只有最后一次排期会触发
pub struct PreviewDebouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl PreviewDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// 取消旧排期并重新计时（last-write-wins）
    pub fn schedule(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 到期返回 true（每次排期最多一次），未到期或无排期返回 false
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }

        let overshoot = now.duration_since(deadline);
        if overshoot.as_millis() > 5 {
            tracing::debug!(
                overshoot_ms = overshoot.as_millis() as u64,
                "preview debounce overshoot"
            );
        }

        self.deadline = None;
        true
    }
}

impl Default for PreviewDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html_project(html: &str, css: &str, js: &str) -> (Workspace, EntryId) {
        let mut ws = Workspace::new_default();
        let root = ws.vfs().root();
        for name in ["index.html", "style.css", "script.js"] {
            let id = ws.vfs().child_by_name(root, name).unwrap();
            ws.delete_entry(id).unwrap();
        }
        let page = ws.create_file("index.html", root).unwrap();
        ws.update_content(page, html.to_string()).unwrap();
        let style = ws.create_file("style.css", root).unwrap();
        ws.update_content(style, css.to_string()).unwrap();
        let script = ws.create_file("script.js", root).unwrap();
        ws.update_content(script, js.to_string()).unwrap();
        (ws, page)
    }

    #[test]
    fn test_compose_injects_before_anchors() {
        let (ws, page) = html_project(
            "<html><head></head><body><p>hi</p></body></html>",
            "body{color:red}",
            "console.log(1)",
        );

        let out = compose(&ws, page);
        let style_block = "<style>\nbody{color:red}\n</style>";
        let script_block = "<script>\nconsole.log(1)\n</script>";
        assert!(out.contains(&format!("{style_block}\n</head>")));
        assert!(out.contains(&format!("{script_block}\n</body>")));
        // 文档其余部分原样保留
        assert!(out.contains("<p>hi</p>"));
    }

    #[test]
    fn test_compose_fallback_prepend_append() {
        let (ws, page) = html_project("<p>bare fragment</p>", "p{margin:0}", "let a = 1;");

        let out = compose(&ws, page);
        assert!(out.starts_with("<style>\np{margin:0}\n</style>\n"));
        assert!(out.ends_with("\n<script>\nlet a = 1;\n</script>"));
    }

    #[test]
    fn test_compose_only_first_anchor_is_replaced() {
        let (ws, page) = html_project(
            "<head></head><head></head><body></body>",
            "x{}",
            "",
        );

        let out = compose(&ws, page);
        assert_eq!(out.matches("<style>").count(), 1);
        let first_head = out.find("</head>").unwrap();
        assert!(out.find("<style>").unwrap() < first_head);
    }

    #[test]
    fn test_compose_exact_name_match_only() {
        let mut ws = Workspace::new_default();
        let root = ws.vfs().root();
        // 默认项目里的 style.css 改名后不再被拾取
        let style = ws.vfs().child_by_name(root, "style.css").unwrap();
        ws.rename_entry(style, "Style.css").unwrap();
        let script = ws.vfs().child_by_name(root, "script.js").unwrap();
        ws.delete_entry(script).unwrap();

        let page = ws.vfs().child_by_name(root, "index.html").unwrap();
        let out = compose(&ws, page);
        assert!(!out.contains("<style>"));
    }

    #[test]
    fn test_compose_skips_empty_sibling_content() {
        let (ws, page) = html_project("<head></head><body></body>", "", "console.log(2)");
        let out = compose(&ws, page);
        assert!(!out.contains("<style>"));
        assert!(out.contains("<script>\nconsole.log(2)\n</script>"));
    }

    #[test]
    fn test_compose_non_html_returns_raw() {
        let mut ws = Workspace::new_default();
        let root = ws.vfs().root();
        let file = ws.create_file("notes.txt", root).unwrap();
        ws.update_content(file, "</head> is just text".to_string())
            .unwrap();
        assert_eq!(compose(&ws, file), "</head> is just text");
    }

    #[test]
    fn test_compose_sibling_scope_is_parent_folder() {
        let mut ws = Workspace::new_default();
        let root = ws.vfs().root();
        let sub = ws.create_folder("pages", root).unwrap();
        let page = ws.create_file("about.html", sub).unwrap();
        ws.update_content(page, "<head></head>".to_string()).unwrap();

        // 根目录的 style.css 不是 pages/about.html 的同级文件
        let out = compose(&ws, page);
        assert!(!out.contains("<style>"));
    }

    #[test]
    fn test_debouncer_cancel_and_reschedule() {
        let mut d = PreviewDebouncer::new(Duration::from_millis(300));
        assert!(!d.poll(Instant::now()));

        d.schedule();
        let first = d.deadline().unwrap();
        d.schedule();
        let second = d.deadline().unwrap();
        assert!(second >= first);
        assert!(d.is_pending());

        // 未到期不触发
        assert!(!d.poll(second - Duration::from_millis(10)));
        // 到期触发一次，之后归于安静
        assert!(d.poll(second + Duration::from_millis(1)));
        assert!(!d.poll(second + Duration::from_millis(500)));
        assert!(!d.is_pending());
    }

    #[test]
    fn test_debouncer_cancel() {
        let mut d = PreviewDebouncer::default();
        d.schedule();
        d.cancel();
        assert!(!d.poll(Instant::now() + Duration::from_secs(10)));
    }
}
