//! cmdread: コンソール行エディタのデモホスト
//!
//! REPLループ: プロンプト出力（`observe_write`）→ `read_console` で編集・展開 → `sh -c` で実行 → ループ
//!
//! ## 起動
//!
//! ```text
//! cmdread [--config FILE] [--cmdfile FILE] [--log-file FILE] [--no-colour]
//! ```
//!
//! ログは `CMDREAD_LOG`（`env_logger` のフィルタ書式）で有効になる。
//! 編集中の行と混ざらないよう、`--log-file` でファイルに出せる。
//! stdin が端末でなければ編集は無効になり、行をそのまま読む。

use std::fs::File;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{error, info, warn};

use cmdread::config::Config;
use cmdread::reader::Console;
use cmdread::session::{Session, DEFAULT_CAPACITY};
use cmdread::shell::Shell;
use cmdread::terminal::{BreakSignal, RawTerminal};

#[derive(Parser, Debug)]
#[command(name = "cmdread", version, about = "Command line editing, history and macros for a console shell")]
struct Cli {
    /// Configuration file (overrides the user and system files)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Command file read before the first line
    #[arg(long)]
    cmdfile: Option<PathBuf>,
    /// Write log output to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Do not colour the prompt or the edited line
    #[arg(long)]
    no_colour: bool,
}

fn init_logging(log_file: Option<&Path>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::new().filter("CMDREAD_LOG"));
    if let Some(path) = log_file {
        match File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("cmdread: {}: {}", path.display(), e),
        }
    }
    builder.init();
}

/// 編集が無効なときの読み取り。EOF なら `None`。
fn read_plain_line() -> Option<String> {
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(e) => {
            warn!("stdin: {}", e);
            None
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref());

    // シェル自身は SIGINT を無視する。編集中の Ctrl+C はキー入力として届き、中断として扱う。
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_IGN);
    }

    let mut config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        error!("{}", e);
        eprintln!("{}", e);
        Config::default()
    });
    if cli.cmdfile.is_some() {
        config.cmdfile = cli.cmdfile;
    }
    if cli.no_colour {
        config.options.nocolour = true;
    }
    let histfile = config.histfile.clone();

    let brk = BreakSignal::new();
    let mut session = Session::from_config(config, brk.clone());
    if let Some(path) = &histfile {
        if let Err(e) = session.history.load(path) {
            warn!("{}", e);
        }
    }

    let term = RawTerminal::new(brk);
    if !term.is_tty() {
        info!("stdin is not a terminal; line editing disabled");
        session.enabled = false;
    }
    let mut console = Console::new(session, term);
    let mut shell = Shell::new();

    loop {
        console.observe_write(&shell.prompt());
        let line = match console.read_console(DEFAULT_CAPACITY) {
            Some(line) => line,
            None if console.session.closed => break,
            None => match read_plain_line() {
                Some(line) => line,
                None => break,
            },
        };
        shell.execute(&line);
        if shell.should_exit {
            break;
        }
    }

    if let Some(path) = &histfile {
        if let Err(e) = console.session.history.save(path) {
            warn!("{}", e);
            eprintln!("{}", e);
        }
    }
    std::process::exit(shell.last_status);
}
