//! 編集セッション。
//!
//! 1 つのコンソール入力に関わる状態をすべてまとめた集約。エディタ・展開・内部コマンド・
//! 読み取りの各処理はこれを `&mut` で受け取り、プロセス全体の共有状態は持たない。
//!
//! | フィールド | 内容 |
//! |-----------|------|
//! | `line` | 編集・展開中の行 |
//! | `history` / `defs` / `keymap` | 履歴・定義・キーマップ |
//! | `macros` / `queued` / `source` | 次の行の供給元（マクロ、複数コマンドの残り、コマンドファイル） |
//! | `prompt` / `prompt_attrs` | 最後に出力されたプロンプトとその色 |
//! | `brk` | Ctrl+C による中断 |

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::complete::ExtLists;
use crate::config::{Config, Options};
use crate::define::Definitions;
use crate::error::{Error, Result};
use crate::expand::MacroStack;
use crate::history::History;
use crate::keymap::Keymap;
use crate::line::LineBuffer;
use crate::terminal::BreakSignal;

/// 行の容量の既定値（ホストの要求がないとき）。
pub const DEFAULT_CAPACITY: usize = 1024;

/// 直前に一覧表示した定義の形。複数行マクロの前後に空行を入れるのに使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListGap {
    /// 1 行の定義
    #[default]
    Single,
    /// 複数行のマクロ（次の定義の前に空行）
    Multi,
    /// 出力の先頭（空行を入れない）
    Start,
}

// ── コマンドファイル ──────────────────────────────

/// 読み取り中のコマンドファイル。
pub struct CommandFile {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
}

impl CommandFile {
    pub fn open(path: &Path) -> Result<CommandFile> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(CommandFile {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 次の行。空行と `-` で始まる行は飛ばす。
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    warn!("{}: {}", self.path.display(), e);
                    return None;
                }
            };
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() || line.starts_with('-') {
                continue;
            }
            return Some(line.to_string());
        }
    }
}

// ── セッション ──────────────────────────────

pub struct Session {
    pub options: Options,
    pub line: LineBuffer,
    pub history: History,
    pub defs: Definitions,
    pub keymap: Keymap,
    pub exts: ExtLists,
    /// 実行中のマクロ
    pub macros: MacroStack,
    /// 複数コマンドの残り
    pub queued: Option<Vec<char>>,
    /// 読み取り中のコマンドファイル
    pub source: Option<CommandFile>,
    /// 現在の行がキーボードから来たか
    pub kbd: bool,
    /// 複数行マクロの定義中
    pub capturing: bool,
    /// 次のキーボード入力の前にプロンプトを出し直すか
    pub show_prompt: bool,
    /// キーボード入力が閉じられた
    pub closed: bool,
    /// このセッションで行編集が有効か
    pub enabled: bool,
    pub prompt: Vec<char>,
    pub prompt_attrs: Option<Vec<u8>>,
    pub list_gap: ListGap,
    pub brk: BreakSignal,
    /// 最初の読み取りで実行するコマンドファイル
    pub cmdfile: Option<PathBuf>,
}

impl Session {
    pub fn new(options: Options, brk: BreakSignal) -> Session {
        let history = History::new(options.histsize, options.min_length);
        Session {
            options,
            line: LineBuffer::new(DEFAULT_CAPACITY),
            history,
            defs: Definitions::new(),
            keymap: Keymap::new(),
            exts: ExtLists::default(),
            macros: MacroStack::new(),
            queued: None,
            source: None,
            kbd: false,
            capturing: false,
            show_prompt: false,
            closed: false,
            enabled: true,
            prompt: Vec::new(),
            prompt_attrs: None,
            list_gap: ListGap::default(),
            brk,
            cmdfile: None,
        }
    }

    /// 設定からセッションを作る。拡張子リストは環境変数から読む。
    pub fn from_config(config: Config, brk: BreakSignal) -> Session {
        let mut session = Session::new(config.options, brk);
        session.cmdfile = config.cmdfile;
        session.exts = ExtLists::from_env();
        session
    }

    /// 中断で実行中のマクロと複数コマンドの残りを捨てる。
    pub fn unwind(&mut self) {
        self.macros.clear();
        if self.queued.take().is_some() {
            debug!("dropping queued commands");
        }
    }

    /// 行を履歴に加える。
    pub fn add_to_history(&mut self) {
        let text = self.line.as_string();
        self.history.add(&text);
    }

    /// 単語の文字か（`underscore` なら `_` も含む）。
    pub fn is_word(&self, ch: char) -> bool {
        ch.is_alphanumeric() || (ch == '_' && self.options.underscore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn command_file_skips_blank_and_comment_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmds");
        fs::write(&path, "defs a b\n\n- comment\r\nls\n").unwrap();
        let mut file = CommandFile::open(&path).unwrap();
        assert_eq!(file.next_line().as_deref(), Some("defs a b"));
        assert_eq!(file.next_line().as_deref(), Some("ls"));
        assert_eq!(file.next_line(), None);
    }

    #[test]
    fn missing_command_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CommandFile::open(&dir.path().join("none")).err().unwrap();
        assert!(err.to_string().starts_with("cmdread: could not open"));
    }

    #[test]
    fn unwind_drops_pending_input() {
        let mut s = Session::new(Options::default(), BreakSignal::new());
        s.macros.push(&['m'], vec!["a".into(), "b".into()]);
        s.queued = Some(vec!['x']);
        s.unwind();
        assert!(s.macros.is_empty());
        assert!(s.queued.is_none());
    }

    #[test]
    fn word_characters() {
        let mut s = Session::new(Options::default(), BreakSignal::new());
        assert!(s.is_word('a') && s.is_word('_') && !s.is_word('-'));
        s.options.underscore = false;
        assert!(!s.is_word('_'));
    }
}
