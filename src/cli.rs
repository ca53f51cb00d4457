//! コマンドモード
//!
//! 引数で1操作だけ実行して終了する非対話モード

use crate::error::{ConfigError, Result};
use crate::workspace::Workspace;
use std::io::Write;

/// 行表示で前後に表示する行数
pub const SHOW_LINE_DEVIATION: usize = 6;

/// 実行するコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create { file: String },
    Copy { from: String, to: String },
    Delete { file: String },
    Show { file: String },
    Lines { file: String },
    Append { file: String, lines: Vec<String> },
    Insert { file: String, line: usize, content: String },
    DeleteLine { file: String, line: usize },
    ShowLine { file: String, line: usize },
    Log { file: String, json: bool },
    Rollback { file: String },
}

impl Command {
    /// 位置引数からコマンドを組み立てる
    pub fn parse(args: &[String]) -> Result<Self> {
        let (name, rest) = args.split_first().ok_or_else(|| ConfigError::MissingArgument {
            command: "cword".to_string(),
            argument: "COMMAND".to_string(),
        })?;
        let mut args = Args::new(name, rest);

        let command = match name.as_str() {
            "create" => Command::Create {
                file: args.take("FILE")?,
            },
            "copy" => Command::Copy {
                from: args.take("FILE")?,
                to: args.take("NEW_FILE")?,
            },
            "delete" => Command::Delete {
                file: args.take("FILE")?,
            },
            "show" => Command::Show {
                file: args.take("FILE")?,
            },
            "lines" => Command::Lines {
                file: args.take("FILE")?,
            },
            "append" => {
                let file = args.take("FILE")?;
                let lines = args.remaining();
                if lines.is_empty() {
                    return Err(missing(name, "LINE"));
                }
                return Ok(Command::Append { file, lines });
            }
            "insert" => Command::Insert {
                file: args.take("FILE")?,
                line: args.take_line_number()?,
                content: args.take("LINE")?,
            },
            "delete-line" => Command::DeleteLine {
                file: args.take("FILE")?,
                line: args.take_line_number()?,
            },
            "show-line" => Command::ShowLine {
                file: args.take("FILE")?,
                line: args.take_line_number()?,
            },
            "log" => {
                let mut file = None;
                let mut json = false;
                for arg in args.remaining() {
                    if arg == "--json" {
                        json = true;
                    } else if file.is_none() {
                        file = Some(arg);
                    } else {
                        return Err(unexpected(name, &arg));
                    }
                }
                let file = file.ok_or_else(|| missing(name, "FILE"))?;
                return Ok(Command::Log { file, json });
            }
            "rollback" => Command::Rollback {
                file: args.take("FILE")?,
            },
            _ => {
                return Err(ConfigError::UnknownCommand {
                    command: name.clone(),
                }
                .into())
            }
        };

        args.finish()?;
        Ok(command)
    }
}

/// 引数カーソル
struct Args<'a> {
    command: &'a str,
    rest: std::slice::Iter<'a, String>,
}

impl<'a> Args<'a> {
    fn new(command: &'a str, rest: &'a [String]) -> Self {
        Self {
            command,
            rest: rest.iter(),
        }
    }

    fn take(&mut self, argument: &str) -> Result<String> {
        self.rest
            .next()
            .cloned()
            .ok_or_else(|| missing(self.command, argument))
    }

    fn take_line_number(&mut self) -> Result<usize> {
        let value = self.take("LINE_NUMBER")?;
        parse_line_number(&value)
    }

    fn remaining(&mut self) -> Vec<String> {
        self.rest.by_ref().cloned().collect()
    }

    fn finish(mut self) -> Result<()> {
        match self.rest.next() {
            Some(extra) => Err(unexpected(self.command, extra)),
            None => Ok(()),
        }
    }
}

/// 1以上の行番号
pub fn parse_line_number(value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(line) if line > 0 => Ok(line),
        _ => Err(ConfigError::InvalidValue {
            key: "line number".to_string(),
            value: value.to_string(),
        }
        .into()),
    }
}

/// 行番号付きの表示行（対象行には `>` を付ける）
pub fn numbered_line(number: usize, text: &str, marked: bool) -> String {
    let marker = if marked { '>' } else { ' ' };
    format!("{}{:>5}  {}", marker, number, text)
}

fn missing(command: &str, argument: &str) -> crate::error::CwordError {
    ConfigError::MissingArgument {
        command: command.to_string(),
        argument: argument.to_string(),
    }
    .into()
}

fn unexpected(command: &str, value: &str) -> crate::error::CwordError {
    ConfigError::InvalidValue {
        key: format!("{} argument", command),
        value: value.to_string(),
    }
    .into()
}

/// コマンドを実行し、結果を `out` へ書き出す
pub fn execute<W: Write>(workspace: &Workspace, command: Command, out: &mut W) -> Result<()> {
    log::debug!("executing {:?}", command);

    match command {
        Command::Create { file } => {
            let report = workspace.create_file(&file)?;
            writeln!(out, "{}", report.display_message())?;
        }
        Command::Copy { from, to } => {
            let report = workspace.copy_file(&from, &to)?;
            writeln!(out, "{}", report.display_message())?;
        }
        Command::Delete { file } => {
            let report = workspace.delete_file(&file)?;
            writeln!(out, "{}", report.display_message())?;
        }
        Command::Show { file } => {
            for line in workspace.read_file(&file)? {
                writeln!(out, "{}", line)?;
            }
        }
        Command::Lines { file } => {
            let summary = workspace.summary(&file)?;
            writeln!(out, "{}", summary.lines)?;
        }
        Command::Append { file, lines } => {
            let report = workspace.append_lines(&file, &lines)?;
            writeln!(out, "{}", report.display_message())?;
        }
        Command::Insert {
            file,
            line,
            content,
        } => {
            let report = workspace.insert_line(&file, line, &content)?;
            writeln!(out, "{}", report.display_message())?;
        }
        Command::DeleteLine { file, line } => {
            let report = workspace.delete_line(&file, line)?;
            writeln!(out, "{}", report.display_message())?;
        }
        Command::ShowLine { file, line } => {
            // 範囲外なら先にエラーにする
            workspace.read_line(&file, line)?;
            for (number, text) in workspace.line_context(&file, line, SHOW_LINE_DEVIATION)? {
                writeln!(out, "{}", numbered_line(number, &text, number == line))?;
            }
        }
        Command::Log { file, json } => {
            let history = workspace.history(&file)?;
            if json {
                let text = serde_json::to_string_pretty(&history).map_err(|e| {
                    ConfigError::InvalidValue {
                        key: "log".to_string(),
                        value: e.to_string(),
                    }
                })?;
                writeln!(out, "{}", text)?;
            } else if history.is_empty() {
                writeln!(out, "No changes recorded for {}", file)?;
            } else {
                for entry in &history {
                    writeln!(out, "{}", entry)?;
                }
            }
        }
        Command::Rollback { file } => {
            let outcome = workspace.rollback(&file)?;
            writeln!(out, "{}", outcome.message)?;
        }
    }

    Ok(())
}
