//! 画面描画
//!
//! タイトル行・本文・ヘルプ行の3段構成

use crate::app::{App, AppendSession, Confirm, Info, MenuKind, Prompt, Screen, Viewer, CANCEL_KEYWORD};
use crate::cli::numbered_line;
use crate::error::ErrorLevel;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

/// タイトル行・ヘルプ行・枠線を除いた本文の行数
pub fn body_height(terminal_height: u16) -> usize {
    usize::from(terminal_height.saturating_sub(4)).max(1)
}

pub fn draw(frame: &mut Frame<'_>, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .split(frame.area());

    let title = format!(
        " cword  {}  [history: {}]",
        app.workspace().working_dir().display(),
        app.workspace().history_root().display()
    );
    frame.render_widget(
        Paragraph::new(title).style(Style::default().fg(Color::Black).bg(Color::Cyan)),
        chunks[0],
    );

    let help = match app.screen() {
        Screen::Menu(_) => "Press the highlighted key  |  Esc: back  |  Ctrl-C: quit".to_string(),
        Screen::Prompt(_) => format!("Enter: confirm  |  Esc or {}: cancel", CANCEL_KEYWORD),
        Screen::Confirm(_) => "y: yes  |  n / Esc: no".to_string(),
        Screen::Info(_) => "Press any key to continue".to_string(),
        Screen::Viewer(viewer) => viewer_status(viewer, body_height(frame.area().height)),
        Screen::Append(_) => format!("Enter: append line  |  {} or Esc: finish", CANCEL_KEYWORD),
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );

    match app.screen() {
        Screen::Menu(kind) => draw_menu(frame, chunks[1], *kind),
        Screen::Prompt(prompt) => draw_prompt(frame, chunks[1], prompt),
        Screen::Confirm(confirm) => draw_confirm(frame, chunks[1], confirm),
        Screen::Info(info) => draw_info(frame, chunks[1], info),
        Screen::Viewer(viewer) => draw_viewer(frame, chunks[1], viewer),
        Screen::Append(session) => draw_append(frame, chunks[1], session),
    }
}

fn block(title: &str) -> Block<'_> {
    Block::default().borders(Borders::ALL).title(format!(" {} ", title))
}

fn draw_menu(frame: &mut Frame<'_>, area: Rect, kind: MenuKind) {
    let lines: Vec<Line<'_>> = kind
        .items()
        .iter()
        .map(|item| {
            Line::from(vec![
                Span::raw("  "),
                Span::styled(
                    format!("[{}]", item.key),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!(" {}", item.label)),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block(kind.title())), area);
}

fn context_lines(context: &[(usize, String)], target: Option<usize>) -> Vec<Line<'static>> {
    context
        .iter()
        .map(|(number, text)| {
            let marked = Some(*number) == target;
            let style = if marked {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            Line::styled(numbered_line(*number, text, marked), style)
        })
        .collect()
}

fn draw_prompt(frame: &mut Frame<'_>, area: Rect, prompt: &Prompt) {
    let mut lines = context_lines(&prompt.context, prompt.target);
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }
    if let Some(error) = &prompt.error {
        lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
    }
    let label = format!("{}: ", prompt.label());
    let cursor_row = lines.len();
    lines.push(Line::from(vec![
        Span::styled(label.clone(), Style::default().fg(Color::Cyan)),
        Span::raw(prompt.input.clone()),
    ]));

    frame.render_widget(Paragraph::new(lines).block(block(prompt.task.title())), area);
    set_cursor(frame, area, cursor_row, &label, &prompt.input);
}

fn draw_confirm(frame: &mut Frame<'_>, area: Rect, confirm: &Confirm) {
    let mut lines = context_lines(&confirm.context, confirm.target);
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }
    lines.push(Line::styled(
        confirm.question.clone(),
        Style::default().fg(Color::Yellow),
    ));
    frame.render_widget(Paragraph::new(lines).block(block(confirm.task.title())), area);
}

fn draw_info(frame: &mut Frame<'_>, area: Rect, info: &Info) {
    let (title, color) = match info.level {
        ErrorLevel::Info => ("Info", Color::Green),
        ErrorLevel::Warning => ("Warning", Color::Yellow),
        ErrorLevel::Error => ("Error", Color::Red),
    };
    let lines: Vec<Line<'_>> = info
        .message
        .lines()
        .map(|line| Line::styled(line.to_string(), Style::default().fg(color)))
        .collect();
    frame.render_widget(
        Paragraph::new(lines)
            .block(block(title))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_viewer(frame: &mut Frame<'_>, area: Rect, viewer: &Viewer) {
    let height = usize::from(area.height.saturating_sub(2));
    let lines: Vec<Line<'_>> = viewer
        .lines
        .iter()
        .enumerate()
        .skip(viewer.offset)
        .take(height)
        .map(|(index, text)| {
            if Some(index) == viewer.highlight {
                Line::styled(text.clone(), Style::default().add_modifier(Modifier::REVERSED))
            } else {
                Line::from(text.clone())
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block(&viewer.title)), area);
}

fn viewer_status(viewer: &Viewer, height: usize) -> String {
    let total = viewer.lines.len();
    if total == 0 {
        return "(empty)  |  q: back".to_string();
    }
    let last = (viewer.offset + height).min(total);
    format!(
        "Lines {}-{} of {}  |  Up/Down PgUp/PgDn Home/End: scroll  |  q: back",
        viewer.offset + 1,
        last,
        total
    )
}

fn draw_append(frame: &mut Frame<'_>, area: Rect, session: &AppendSession) {
    let height = usize::from(area.height.saturating_sub(3));
    let skip = session.recent.len().saturating_sub(height);
    let mut lines: Vec<Line<'_>> = session
        .recent
        .iter()
        .skip(skip)
        .map(|line| Line::styled(line.clone(), Style::default().fg(Color::DarkGray)))
        .collect();
    let prompt = "> ";
    let cursor_row = lines.len();
    lines.push(Line::from(vec![
        Span::styled(prompt, Style::default().fg(Color::Cyan)),
        Span::raw(session.input.clone()),
    ]));

    let title = format!(
        "Append to {} ({} line(s) so far)",
        session.batch.file(),
        session.batch.lines()
    );
    frame.render_widget(Paragraph::new(lines).block(block(&title)), area);
    set_cursor(frame, area, cursor_row, prompt, &session.input);
}

/// 入力行の末尾にカーソルを置く（全角文字は表示幅で数える）
fn set_cursor(frame: &mut Frame<'_>, area: Rect, row: usize, label: &str, input: &str) {
    let inner_width = area.width.saturating_sub(2);
    let width = (label.width() + input.width()).min(usize::from(inner_width.saturating_sub(1)));
    let row = row.min(usize::from(area.height.saturating_sub(3)));
    let x = area.x + 1 + width as u16;
    let y = area.y + 1 + row as u16;
    frame.set_cursor_position((x, y));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Workspace;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{backend::TestBackend, Terminal};
    use tempfile::tempdir;

    fn rendered(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(usize::from(buffer.area.width))
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_main_menu_lists_items() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), dir.path().join(".cword")).unwrap();
        let app = App::new(ws);

        let screen = rendered(&app);
        assert!(screen.contains("Main menu"));
        assert!(screen.contains("[f] File operations"));
        assert!(screen.contains("[e] Exit"));
    }

    #[test]
    fn test_prompt_shows_label_and_input() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), dir.path().join(".cword")).unwrap();
        let mut app = App::new(ws);
        for c in "fcnotes".chars() {
            app.handle_key_event(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
                .unwrap();
        }

        let screen = rendered(&app);
        assert!(screen.contains("Create file"));
        assert!(screen.contains("File name: notes"));
    }

    #[test]
    fn test_body_height() {
        assert_eq!(body_height(24), 20);
        assert_eq!(body_height(2), 1);
    }
}
