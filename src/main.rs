use anyhow::Context;
use cword::cli::{self, Command};
use cword::error::{self, ErrorLevel};
use cword::{logging, Config, CwordError, TuiApplication, Workspace};
use std::io::Write;
use std::process::ExitCode;

fn main() -> ExitCode {
    error::setup_panic_handler();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config, command_args) = Config::load(&args).context("invalid command line")?;
    let interactive = command_args.is_empty();

    logging::init(&config, interactive).context("failed to initialise logging")?;
    log::debug!("starting with {:?}", config);

    let workspace = Workspace::open(&config).with_context(|| {
        format!(
            "cannot use change log directory {}",
            config.resolved_root().display()
        )
    })?;

    if interactive {
        let mut app = TuiApplication::new(workspace);
        return app.run().context("terminal session failed");
    }

    let command = Command::parse(&command_args)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    cli::execute(&workspace, command, &mut out)?;
    out.flush().context("failed to flush output")?;
    Ok(())
}

/// エラーを表示（ライブラリのエラーは利用者向けメッセージにする）
fn report(err: &anyhow::Error) {
    match err.chain().find_map(|cause| cause.downcast_ref::<CwordError>()) {
        Some(cword_error) => {
            let (message, level) = cword_error.user_message();
            let prefix = match level {
                ErrorLevel::Info => "",
                ErrorLevel::Warning => "warning: ",
                ErrorLevel::Error => "error: ",
            };
            if err.chain().count() > 1 {
                eprintln!("{}{}: {}", prefix, err, message);
            } else {
                eprintln!("{}{}", prefix, message);
            }
        }
        None => eprintln!("error: {:#}", err),
    }
}
