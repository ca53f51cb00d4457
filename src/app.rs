//! メインアプリケーション状態
//!
//! メニュー・プロンプト・確認・情報画面・ビューア・一括追記を切り替える
//! 対話モードの状態機械。描画には依存せず、キー入力を受けて
//! `Workspace` を呼び出す

use crate::cli::{numbered_line, parse_line_number, SHOW_LINE_DEVIATION};
use crate::error::{CwordError, ErrorLevel, Result};
use crate::history::Recorded;
use crate::workspace::{AppendBatch, EditReport, Workspace};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// 入力を打ち切るキーワード
pub const CANCEL_KEYWORD: &str = "!c";

/// 挿入・削除の前に前後へ表示する行数
pub const EDIT_DEVIATION: usize = 5;

/// 一括追記画面に残す直近の行数
const RECENT_LINES: usize = 50;

/// メニューの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    Main,
    File,
    Line,
    General,
}

/// メニュー項目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub key: char,
    pub label: &'static str,
    pub action: MenuAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Open(MenuKind),
    Start(Task),
    Back,
    Exit,
}

const MAIN_ITEMS: &[MenuItem] = &[
    MenuItem { key: 'f', label: "File operations", action: MenuAction::Open(MenuKind::File) },
    MenuItem { key: 'l', label: "Line operations", action: MenuAction::Open(MenuKind::Line) },
    MenuItem { key: 'g', label: "General operations", action: MenuAction::Open(MenuKind::General) },
    MenuItem { key: 'e', label: "Exit", action: MenuAction::Exit },
];

const FILE_ITEMS: &[MenuItem] = &[
    MenuItem { key: 'c', label: "Create file", action: MenuAction::Start(Task::CreateFile) },
    MenuItem { key: 'p', label: "Copy file", action: MenuAction::Start(Task::CopyFile) },
    MenuItem { key: 'd', label: "Delete file", action: MenuAction::Start(Task::DeleteFile) },
    MenuItem { key: 's', label: "Show file", action: MenuAction::Start(Task::ShowFile) },
    MenuItem { key: 'b', label: "Back", action: MenuAction::Back },
];

const LINE_ITEMS: &[MenuItem] = &[
    MenuItem { key: 'a', label: "Append lines", action: MenuAction::Start(Task::AppendLines) },
    MenuItem { key: 'd', label: "Delete line", action: MenuAction::Start(Task::DeleteLine) },
    MenuItem { key: 'i', label: "Insert line", action: MenuAction::Start(Task::InsertLine) },
    MenuItem { key: 's', label: "Show line", action: MenuAction::Start(Task::ShowLine) },
    MenuItem { key: 'b', label: "Back", action: MenuAction::Back },
];

const GENERAL_ITEMS: &[MenuItem] = &[
    MenuItem { key: 's', label: "Show change log", action: MenuAction::Start(Task::ShowLog) },
    MenuItem { key: 'r', label: "Roll back last change", action: MenuAction::Start(Task::Rollback) },
    MenuItem { key: 'l', label: "Show number of lines", action: MenuAction::Start(Task::LineCount) },
    MenuItem { key: 'b', label: "Back", action: MenuAction::Back },
];

impl MenuKind {
    pub fn title(self) -> &'static str {
        match self {
            MenuKind::Main => "Main menu",
            MenuKind::File => "File operations",
            MenuKind::Line => "Line operations",
            MenuKind::General => "General operations",
        }
    }

    pub fn items(self) -> &'static [MenuItem] {
        match self {
            MenuKind::Main => MAIN_ITEMS,
            MenuKind::File => FILE_ITEMS,
            MenuKind::Line => LINE_ITEMS,
            MenuKind::General => GENERAL_ITEMS,
        }
    }

    fn find(self, key: char) -> Option<MenuAction> {
        let key = key.to_ascii_lowercase();
        self.items()
            .iter()
            .find(|item| item.key == key)
            .map(|item| item.action)
    }
}

/// プロンプト入力の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    FileName,
    LineNumber,
    Content,
}

/// メニューから開始する操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    CreateFile,
    CopyFile,
    DeleteFile,
    ShowFile,
    AppendLines,
    InsertLine,
    DeleteLine,
    ShowLine,
    ShowLog,
    Rollback,
    LineCount,
}

impl Task {
    /// 入力項目（ラベルと種類）
    pub fn fields(self) -> &'static [(&'static str, FieldKind)] {
        const FILE: (&str, FieldKind) = ("File name", FieldKind::FileName);
        const LINE: (&str, FieldKind) = ("Line number", FieldKind::LineNumber);
        match self {
            Task::CopyFile => &[
                ("File to copy", FieldKind::FileName),
                ("New file name", FieldKind::FileName),
            ],
            Task::InsertLine => &[FILE, LINE, ("Text to insert", FieldKind::Content)],
            Task::DeleteLine | Task::ShowLine => &[FILE, LINE],
            _ => &[FILE],
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Task::CreateFile => "Create file",
            Task::CopyFile => "Copy file",
            Task::DeleteFile => "Delete file",
            Task::ShowFile => "Show file",
            Task::AppendLines => "Append lines",
            Task::InsertLine => "Insert line",
            Task::DeleteLine => "Delete line",
            Task::ShowLine => "Show line",
            Task::ShowLog => "Show change log",
            Task::Rollback => "Roll back",
            Task::LineCount => "Number of lines",
        }
    }

    /// 完了後に戻るメニュー
    pub fn menu(self) -> MenuKind {
        match self {
            Task::CreateFile | Task::CopyFile | Task::DeleteFile | Task::ShowFile => MenuKind::File,
            Task::AppendLines | Task::InsertLine | Task::DeleteLine | Task::ShowLine => {
                MenuKind::Line
            }
            Task::ShowLog | Task::Rollback | Task::LineCount => MenuKind::General,
        }
    }
}

/// プロンプト画面
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub task: Task,
    /// 入力済みの値
    pub values: Vec<String>,
    /// 入力中の文字列
    pub input: String,
    /// 入力の参考に表示する周辺行
    pub context: Vec<(usize, String)>,
    /// 周辺行のうち強調する行番号
    pub target: Option<usize>,
    /// 直前の入力エラー
    pub error: Option<String>,
}

impl Prompt {
    fn new(task: Task) -> Self {
        Self {
            task,
            values: Vec::new(),
            input: String::new(),
            context: Vec::new(),
            target: None,
            error: None,
        }
    }

    /// 現在の入力項目のラベル
    pub fn label(&self) -> &'static str {
        self.task
            .fields()
            .get(self.values.len())
            .map(|(label, _)| *label)
            .unwrap_or("")
    }

    fn field_kind(&self) -> FieldKind {
        self.task
            .fields()
            .get(self.values.len())
            .map(|(_, kind)| *kind)
            .unwrap_or(FieldKind::Content)
    }

    fn is_complete(&self) -> bool {
        self.values.len() >= self.task.fields().len()
    }
}

/// 確認画面
#[derive(Debug, Clone, PartialEq)]
pub struct Confirm {
    pub task: Task,
    pub question: String,
    pub context: Vec<(usize, String)>,
    pub target: Option<usize>,
    values: Vec<String>,
}

/// 情報画面（任意のキーで戻る）
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    pub message: String,
    pub level: ErrorLevel,
    pub return_to: MenuKind,
}

/// スクロール可能なビューア
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    pub title: String,
    pub lines: Vec<String>,
    /// 先頭に表示する行のインデックス
    pub offset: usize,
    /// 強調する行のインデックス
    pub highlight: Option<usize>,
    pub return_to: MenuKind,
}

impl Viewer {
    fn scroll(&mut self, delta: isize, height: usize) {
        let max = self.lines.len().saturating_sub(height.max(1));
        let next = if delta < 0 {
            self.offset.saturating_sub(delta.unsigned_abs())
        } else {
            self.offset.saturating_add(delta as usize)
        };
        self.offset = next.min(max);
    }
}

/// 一括追記画面
#[derive(Debug, Clone, PartialEq)]
pub struct AppendSession {
    pub batch: AppendBatch,
    pub input: String,
    /// 直近に追記した行
    pub recent: Vec<String>,
}

/// 表示中の画面
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Menu(MenuKind),
    Prompt(Prompt),
    Confirm(Confirm),
    Info(Info),
    Viewer(Viewer),
    Append(AppendSession),
}

/// メインアプリケーション構造体
pub struct App {
    /// アプリケーション実行状態
    running: bool,
    workspace: Workspace,
    screen: Screen,
    /// ビューアの表示行数（描画側から更新される）
    viewport_height: usize,
}

impl App {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            running: true,
            workspace,
            screen: Screen::Menu(MenuKind::Main),
            viewport_height: 20,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = height.max(1);
    }

    /// 終了する（一括追記中ならそこまでを記録する）
    pub fn shutdown(&mut self) {
        let screen = std::mem::replace(&mut self.screen, Screen::Menu(MenuKind::Main));
        if let Screen::Append(session) = screen {
            if let Err(e) = self.workspace.finish_append(session.batch) {
                log::warn!("append batch could not be finished on exit: {}", e);
            }
        }
        self.running = false;
    }

    /// キー入力を処理
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.shutdown();
            return Ok(());
        }

        let screen = std::mem::replace(&mut self.screen, Screen::Menu(MenuKind::Main));
        self.screen = match screen {
            Screen::Menu(kind) => self.menu_key(kind, key),
            Screen::Prompt(prompt) => self.prompt_key(prompt, key),
            Screen::Confirm(confirm) => self.confirm_key(confirm, key),
            Screen::Info(info) => match key.code {
                KeyCode::Modifier(_) => Screen::Info(info),
                _ => Screen::Menu(info.return_to),
            },
            Screen::Viewer(viewer) => self.viewer_key(viewer, key),
            Screen::Append(session) => self.append_key(session, key),
        };
        Ok(())
    }

    fn menu_key(&mut self, kind: MenuKind, key: KeyEvent) -> Screen {
        let action = match key.code {
            KeyCode::Char(c) => kind.find(c),
            KeyCode::Esc if kind != MenuKind::Main => Some(MenuAction::Back),
            _ => None,
        };

        match action {
            Some(MenuAction::Open(next)) => Screen::Menu(next),
            Some(MenuAction::Start(task)) => Screen::Prompt(Prompt::new(task)),
            Some(MenuAction::Back) => Screen::Menu(MenuKind::Main),
            Some(MenuAction::Exit) => {
                self.running = false;
                Screen::Menu(kind)
            }
            None => Screen::Menu(kind),
        }
    }

    fn prompt_key(&mut self, mut prompt: Prompt, key: KeyEvent) -> Screen {
        match key.code {
            KeyCode::Char(c) => {
                prompt.input.push(c);
                Screen::Prompt(prompt)
            }
            KeyCode::Backspace => {
                prompt.input.pop();
                Screen::Prompt(prompt)
            }
            KeyCode::Esc => Screen::Menu(prompt.task.menu()),
            KeyCode::Enter => self.submit_prompt(prompt),
            _ => Screen::Prompt(prompt),
        }
    }

    fn submit_prompt(&mut self, mut prompt: Prompt) -> Screen {
        let raw = std::mem::take(&mut prompt.input);
        if raw.trim() == CANCEL_KEYWORD {
            return cancelled(prompt.task.menu());
        }

        let value = match prompt.field_kind() {
            FieldKind::FileName => {
                let name = raw.trim();
                if name.is_empty() {
                    prompt.error = Some("Please enter a file name".to_string());
                    return Screen::Prompt(prompt);
                }
                name.to_string()
            }
            FieldKind::LineNumber => match parse_line_number(&raw) {
                Ok(line) => line.to_string(),
                Err(_) => {
                    prompt.error = Some(format!("'{}' is not a valid line number", raw.trim()));
                    return Screen::Prompt(prompt);
                }
            },
            FieldKind::Content => raw,
        };
        prompt.error = None;
        prompt.values.push(value);

        self.advance(prompt)
    }

    /// 入力途中の準備（周辺行の表示・確認・一括追記の開始）
    fn advance(&mut self, mut prompt: Prompt) -> Screen {
        let task = prompt.task;
        let menu = task.menu();

        match (task, prompt.values.len()) {
            (Task::AppendLines, 1) => match self.workspace.begin_append(&prompt.values[0]) {
                Ok(batch) => {
                    log::debug!("append batch started for {}", batch.file());
                    Screen::Append(AppendSession {
                        batch,
                        input: String::new(),
                        recent: Vec::new(),
                    })
                }
                Err(e) => failure(e, menu),
            },
            (Task::DeleteFile, 1) => match self.workspace.summary(&prompt.values[0]) {
                Ok(summary) => Screen::Confirm(Confirm {
                    task,
                    question: format!(
                        "Delete {} ({} line(s))? It can be restored by rolling back. [y/n]",
                        summary.name, summary.lines
                    ),
                    context: Vec::new(),
                    target: None,
                    values: prompt.values,
                }),
                Err(e) => failure(e, menu),
            },
            (Task::InsertLine, 2) => {
                let (name, line) = (&prompt.values[0], line_value(&prompt.values[1]));
                let lines = match self.workspace.summary(name) {
                    Ok(summary) => summary.lines,
                    Err(e) => return failure(e, menu),
                };
                if line > lines + 1 {
                    return failure(
                        crate::error::FileError::LineOutOfRange { line, total: lines }.into(),
                        menu,
                    );
                }
                match self.workspace.line_context(name, line, EDIT_DEVIATION) {
                    Ok(context) => {
                        prompt.context = context;
                        prompt.target = Some(line);
                        Screen::Prompt(prompt)
                    }
                    Err(e) => failure(e, menu),
                }
            }
            (Task::DeleteLine, 2) => {
                let (name, line) = (&prompt.values[0], line_value(&prompt.values[1]));
                let context = self
                    .workspace
                    .read_line(name, line)
                    .and_then(|_| self.workspace.line_context(name, line, EDIT_DEVIATION));
                match context {
                    Ok(context) => Screen::Confirm(Confirm {
                        task,
                        question: format!("Delete line {}? [y/n]", line),
                        context,
                        target: Some(line),
                        values: prompt.values,
                    }),
                    Err(e) => failure(e, menu),
                }
            }
            _ if prompt.is_complete() => self.run_task(task, &prompt.values),
            _ => Screen::Prompt(prompt),
        }
    }

    fn confirm_key(&mut self, confirm: Confirm, key: KeyEvent) -> Screen {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => self.run_task(confirm.task, &confirm.values),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                cancelled(confirm.task.menu())
            }
            _ => Screen::Confirm(confirm),
        }
    }

    /// 入力が揃った操作を実行
    fn run_task(&mut self, task: Task, values: &[String]) -> Screen {
        let menu = task.menu();
        let name = values.first().map(String::as_str).unwrap_or("");

        match task {
            Task::CreateFile => report(self.workspace.create_file(name), menu),
            Task::CopyFile => {
                let to = values.get(1).map(String::as_str).unwrap_or("");
                report(self.workspace.copy_file(name, to), menu)
            }
            Task::DeleteFile => report(self.workspace.delete_file(name), menu),
            Task::InsertLine => {
                let content = values.get(2).map(String::as_str).unwrap_or("");
                report(
                    self.workspace.insert_line(name, line_at(values), content),
                    menu,
                )
            }
            Task::DeleteLine => report(self.workspace.delete_line(name, line_at(values)), menu),
            Task::ShowFile => match self.workspace.read_file(name) {
                Ok(lines) => Screen::Viewer(Viewer {
                    title: name.to_string(),
                    lines,
                    offset: 0,
                    highlight: None,
                    return_to: menu,
                }),
                Err(e) => failure(e, menu),
            },
            Task::ShowLine => {
                let line = line_at(values);
                let context = self
                    .workspace
                    .read_line(name, line)
                    .and_then(|_| self.workspace.line_context(name, line, SHOW_LINE_DEVIATION));
                match context {
                    Ok(context) => {
                        let highlight = context.iter().position(|(number, _)| *number == line);
                        let lines = context
                            .iter()
                            .map(|(number, text)| numbered_line(*number, text, *number == line))
                            .collect();
                        Screen::Viewer(Viewer {
                            title: format!("{} (line {})", name, line),
                            lines,
                            offset: 0,
                            highlight,
                            return_to: menu,
                        })
                    }
                    Err(e) => failure(e, menu),
                }
            }
            Task::ShowLog => match self.workspace.history(name) {
                Ok(history) if history.is_empty() => Screen::Info(Info {
                    message: format!("No changes recorded for {}", name),
                    level: ErrorLevel::Info,
                    return_to: menu,
                }),
                Ok(history) => Screen::Viewer(Viewer {
                    title: format!("Change log: {}", name),
                    lines: history.iter().map(|entry| entry.to_string()).collect(),
                    offset: 0,
                    highlight: None,
                    return_to: menu,
                }),
                Err(e) => failure(e, menu),
            },
            Task::Rollback => match self.workspace.rollback(name) {
                Ok(outcome) => Screen::Info(Info {
                    message: outcome.message,
                    level: ErrorLevel::Info,
                    return_to: menu,
                }),
                Err(e) => failure(e, menu),
            },
            Task::LineCount => match self.workspace.summary(name) {
                Ok(summary) => Screen::Info(Info {
                    message: format!("{} has {} line(s)", summary.name, summary.lines),
                    level: ErrorLevel::Info,
                    return_to: menu,
                }),
                Err(e) => failure(e, menu),
            },
            // 一括追記は専用画面で進む
            Task::AppendLines => Screen::Menu(menu),
        }
    }

    fn append_key(&mut self, mut session: AppendSession, key: KeyEvent) -> Screen {
        match key.code {
            KeyCode::Char(c) => {
                session.input.push(c);
                Screen::Append(session)
            }
            KeyCode::Backspace => {
                session.input.pop();
                Screen::Append(session)
            }
            KeyCode::Esc => self.finish_session(session),
            KeyCode::Enter => {
                let line = std::mem::take(&mut session.input);
                if line.trim() == CANCEL_KEYWORD {
                    return self.finish_session(session);
                }
                match self.workspace.append_to(&mut session.batch, &line) {
                    Ok(()) => {
                        session.recent.push(line);
                        if session.recent.len() > RECENT_LINES {
                            session.recent.remove(0);
                        }
                        Screen::Append(session)
                    }
                    Err(e) => {
                        // 書き込めた分だけ記録してから報告する
                        if let Err(record_error) = self.workspace.finish_append(session.batch) {
                            log::warn!("partial append could not be recorded: {}", record_error);
                        }
                        failure(e, MenuKind::Line)
                    }
                }
            }
            _ => Screen::Append(session),
        }
    }

    fn finish_session(&mut self, session: AppendSession) -> Screen {
        report(self.workspace.finish_append(session.batch), MenuKind::Line)
    }

    fn viewer_key(&mut self, mut viewer: Viewer, key: KeyEvent) -> Screen {
        let height = self.viewport_height;
        let page = height as isize;
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => viewer.scroll(-1, height),
            KeyCode::Down | KeyCode::Char('j') => viewer.scroll(1, height),
            KeyCode::PageUp => viewer.scroll(-page, height),
            KeyCode::PageDown | KeyCode::Char(' ') => viewer.scroll(page, height),
            KeyCode::Home | KeyCode::Char('g') => viewer.offset = 0,
            KeyCode::End | KeyCode::Char('G') => viewer.scroll(isize::MAX, height),
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                return Screen::Menu(viewer.return_to)
            }
            _ => {}
        }
        Screen::Viewer(viewer)
    }
}

fn line_value(value: &str) -> usize {
    value.parse().unwrap_or(0)
}

fn line_at(values: &[String]) -> usize {
    values.get(1).map(|v| line_value(v)).unwrap_or(0)
}

fn cancelled(menu: MenuKind) -> Screen {
    Screen::Info(Info {
        message: "Operation cancelled".to_string(),
        level: ErrorLevel::Info,
        return_to: menu,
    })
}

fn report(result: Result<EditReport>, menu: MenuKind) -> Screen {
    match result {
        Ok(report) => {
            let level = match report.recorded {
                Recorded::Skipped { .. } => ErrorLevel::Warning,
                _ => ErrorLevel::Info,
            };
            Screen::Info(Info {
                message: report.display_message(),
                level,
                return_to: menu,
            })
        }
        Err(e) => failure(e, menu),
    }
}

fn failure(error: CwordError, menu: MenuKind) -> Screen {
    log::debug!("operation failed: {}", error);
    let (message, level) = error.user_message();
    Screen::Info(Info {
        message,
        level,
        return_to: menu,
    })
}
