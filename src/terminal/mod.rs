//! 终端命令解释器
//!
//! 行缓冲的迷你 shell：按空白切分，不支持引号。命令直接驱动
//! 路径解析器和虚拟文件系统，输出写入屏幕行缓冲。

use crate::models::resolve;
use crate::workspace::Workspace;

const BACKSPACE: char = '\u{7f}';

pub struct Terminal {
    /// 已完成的屏幕行
    screen: Vec<String>,
    /// 正在渲染的一行（提示符 + 回显）
    line: String,
    /// 已缓冲、未提交的命令
    input: String,
}

impl Terminal {
    pub fn new(ws: &Workspace) -> Self {
        let mut term = Self {
            screen: Vec::new(),
            line: String::new(),
            input: String::new(),
        };
        term.writeln("Welcome to codeno terminal!");
        term.writeln(
            "Supported commands: ls, cat <file>, cd <dir>, clear, pwd, mkdir <dirname>, touch <filename>",
        );
        term.line = prompt(ws);
        term
    }

    pub fn screen_lines(&self) -> &[String] {
        &self.screen
    }

    pub fn current_line(&self) -> &str {
        &self.line
    }

    pub fn pending_input(&self) -> &str {
        &self.input
    }

    /// 原始按键流：可打印字符回显进缓冲，退格删一个字符，回车提交
    pub fn handle_input(&mut self, ws: &mut Workspace, data: &str) {
        for ch in data.chars() {
            match ch {
                '\r' => self.submit(ws),
                BACKSPACE => {
                    if self.input.pop().is_some() {
                        self.line.pop();
                    }
                }
                c if is_printable(c) => {
                    self.input.push(c);
                    self.line.push(c);
                }
                _ => {}
            }
        }
    }

    /// 提交当前缓冲：空行只换提示符，缓冲无条件清空
    fn submit(&mut self, ws: &mut Workspace) {
        let command = self.input.trim().to_string();
        self.input.clear();
        let line = std::mem::take(&mut self.line);
        self.screen.push(line);

        if !command.is_empty() {
            self.process_command(ws, &command);
        }
        self.line = prompt(ws);
    }

    fn writeln(&mut self, text: &str) {
        self.screen.push(text.to_string());
    }

    fn process_command(&mut self, ws: &mut Workspace, command: &str) {
        let mut parts = command.split_whitespace();
        let Some(action) = parts.next() else {
            return;
        };
        let arg = parts.collect::<Vec<_>>().join(" ");

        match action {
            "ls" => self.cmd_ls(ws),
            "cat" => self.cmd_cat(ws, &arg),
            "cd" => self.cmd_cd(ws, &arg),
            "clear" => self.screen.clear(),
            "pwd" => {
                let cwd = ws.pwd();
                self.writeln(&cwd);
            }
            "mkdir" => self.cmd_create(ws, &arg, true),
            "touch" => self.cmd_create(ws, &arg, false),
            other => self.writeln(&format!("{other}: command not found")),
        }
    }

    fn cmd_ls(&mut self, ws: &Workspace) {
        let dir = ws.current_dir();
        let rows: Vec<String> = ws
            .vfs()
            .children_of(dir)
            .map(|children| {
                children
                    .map(|(name, id)| {
                        if ws.vfs().is_folder(id) {
                            format!("{name}/")
                        } else {
                            name.to_string()
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        if rows.is_empty() {
            self.writeln("Directory is empty.");
        } else {
            for row in rows {
                self.writeln(&row);
            }
        }
    }

    fn cmd_cat(&mut self, ws: &Workspace, arg: &str) {
        if arg.is_empty() {
            self.writeln("cat: missing operand");
            return;
        }
        match resolve(ws.vfs(), arg, ws.current_dir()) {
            Some(id) if ws.vfs().is_file(id) => {
                let content = ws.vfs().content(id).unwrap_or_default();
                if content.is_empty() {
                    self.writeln("(empty file)");
                } else {
                    // 按行写出，即终端显示用的换行归一化
                    for line in content.split('\n') {
                        self.writeln(line);
                    }
                }
            }
            _ => self.writeln(&format!("cat: {arg}: No such file or not a file")),
        }
    }

    fn cmd_cd(&mut self, ws: &mut Workspace, arg: &str) {
        if arg.is_empty() {
            ws.cd_root();
            return;
        }
        match resolve(ws.vfs(), arg, ws.current_dir()) {
            Some(id) if ws.vfs().is_folder(id) => {
                // cd 不会失败：目标已验证为文件夹
                let _ = ws.cd(id);
            }
            _ => self.writeln(&format!("cd: {arg}: No such directory")),
        }
    }

    /// mkdir / touch：支持带路径的目标，最后一段在其父目录下创建
    fn cmd_create(&mut self, ws: &mut Workspace, arg: &str, folder: bool) {
        let command = if folder { "mkdir" } else { "touch" };
        if arg.is_empty() {
            self.writeln(&format!("{command}: missing operand"));
            return;
        }

        let (dir_path, name) = match arg.rsplit_once('/') {
            Some((dir, name)) if !name.is_empty() => (Some(dir), name),
            Some(_) => {
                self.writeln(&format!("{command}: {arg}: invalid name"));
                return;
            }
            None => (None, arg),
        };

        let parent = match dir_path {
            None => ws.current_dir(),
            Some(dir) => match resolve(ws.vfs(), dir, ws.current_dir()) {
                Some(id) if ws.vfs().is_folder(id) => id,
                _ => {
                    self.writeln(&format!("{command}: {arg}: No such directory"));
                    return;
                }
            },
        };

        let result = if folder {
            ws.create_folder(name, parent)
        } else {
            ws.create_file(name, parent)
        };
        match result {
            Ok(_) if folder => self.writeln(&format!("Created directory: {name}")),
            Ok(_) => self.writeln(&format!("Created file: {name}")),
            Err(e) => self.writeln(&format!("{command}: {arg}: {e}")),
        }
    }
}

/// 可打印 ASCII 与扩展字符回显，其余控制字符忽略
fn is_printable(c: char) -> bool {
    (' '..='\u{7e}').contains(&c) || c >= '\u{a0}'
}

fn prompt(ws: &Workspace) -> String {
    format!("{} $ ", ws.pwd())
}
