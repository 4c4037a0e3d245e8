//! ホストとの境界。
//!
//! ホストシェルは自分の行読み取りの代わりに [`Console::read_console`] を呼び、
//! 書き出したプロンプトを [`Console::observe_write`] で知らせる。
//!
//! ```text
//!   observe_write("C:\dir>")        read_console(capacity)
//!            │                            │
//!            ▼                            ▼
//!      session.prompt            ┌── 次の行の供給元 ──┐
//!                                │ コマンドファイル      │
//!                                │ マクロのスタック      │
//!                                │ 複数コマンドの残り    │
//!                                │ キーボード（editor） │
//!                                └─────────┬──────────┘
//!                                          ▼
//!                       multi_cmd → {@, ignore_char, braces}
//!                       → associate | symbol | macro（発火しなくなるまで）
//!                       → 内部コマンドなら次の行へ
//!                       → expand_vars → "line\r\n"
//! ```
//!
//! 編集が無効なとき、または容量が 1 以下のときは `None` を返し、
//! ホストは自分の読み取りを使う。

use std::path::Path;

use log::{debug, info, warn};

use crate::command::{finish_macro, internal_cmd, is_endm, Outcome};
use crate::editor::{edit_line, paint_prompt};
use crate::expand;
use crate::highlight;
use crate::session::{CommandFile, Session, DEFAULT_CAPACITY};
use crate::terminal::{Coord, Terminal};

/// 複数行マクロの本文を読むときのプロンプト。
pub const DEFM_PROMPT: &str = "DEFM> ";

pub struct Console<T: Terminal> {
    pub session: Session,
    pub term: T,
}

impl<T: Terminal> Console<T> {
    pub fn new(session: Session, term: T) -> Self {
        Console { session, term }
    }

    /// ホストが書き出した文字列を最新のプロンプトとして覚え、そのまま出力する。
    pub fn observe_write(&mut self, text: &str) {
        self.session.prompt = text.chars().collect();
        self.term.write(text);
    }

    /// 1 行を読み、展開して CRLF を付けて返す。
    ///
    /// 編集が無効、容量が 1 以下、またはキーボード入力が閉じられたら `None`。
    /// 返す行は `capacity - 2` 文字以下。
    pub fn read_console(&mut self, capacity: usize) -> Option<String> {
        let s = &mut self.session;
        if s.options.disable {
            s.enabled = !s.enabled;
            s.options.disable = false;
            info!("line editing {}", if s.enabled { "enabled" } else { "disabled" });
        }
        if !s.enabled || capacity <= 1 {
            return None;
        }

        if s.brk.arm() {
            s.unwind();
        }

        if !s.macros.is_empty() || s.queued.is_some() || s.cmdfile.is_some() {
            self.remove_prompt();
        } else {
            self.colour_prompt();
        }

        if let Some(path) = self.session.cmdfile.take() {
            self.read_cmdfile(&path);
        }

        self.session.line.set_capacity(capacity - 2);
        self.session.show_prompt = false;
        if self.session.options.disable_macro {
            self.get_next_line();
        } else {
            self.expand_line();
        }

        let s = &mut self.session;
        s.brk.disarm();
        if s.closed {
            return None;
        }
        let mut out = s.line.as_string();
        out.push_str("\r\n");
        Some(out)
    }

    /// 次の行を読み、内部コマンドでない行が得られるまで展開する。
    fn expand_line(&mut self) {
        loop {
            self.get_next_line();
            let s = &mut self.session;
            if let Some(rest) = expand::multi_cmd(&mut s.line) {
                s.queued = Some(rest);
            }
            loop {
                if s.brk.pending() {
                    break;
                }
                if s.line.char_at(0) == Some('@') {
                    s.line.remove(0, 1);
                    expand::dosify(&mut s.line);
                }
                if s.line.char_at(0) == Some(s.options.ignore_char) {
                    s.line.remove(0, 1);
                    break;
                }
                expand::expand_braces(&mut s.line);
                let fired = expand::associate(&mut s.line, &mut s.defs.assocs)
                    || expand::expand_symbol(&mut s.line, &mut s.defs.symbols)
                    || expand::expand_macro(&mut s.line, &mut s.defs.macros, &mut s.macros);
                if !fired {
                    break;
                }
            }
            match internal_cmd(&mut self.session, &mut self.term) {
                None => break,
                Some(Outcome::Done) => {}
                Some(Outcome::Capture(name)) => self.capture_macro(&name),
            }
        }
        let s = &mut self.session;
        expand::expand_vars(&mut s.line, &mut s.defs.symbols, false);
    }

    /// 次の行を供給元の優先順（ファイル、マクロ、複数コマンドの残り、キーボード）で読む。
    ///
    /// ファイルの終わり、またはキーボード入力が閉じられたら `false`。
    fn get_next_line(&mut self) -> bool {
        let s = &mut self.session;
        s.line.clear();
        s.kbd = false;
        if let Some(file) = s.source.as_mut() {
            match file.next_line() {
                Some(text) => {
                    s.line.set_str(&text);
                    true
                }
                None => false,
            }
        } else if !s.macros.is_empty() {
            s.macros.next_line(&mut s.line)
        } else if let Some(rest) = s.queued.take() {
            s.line.set_all(&rest);
            true
        } else {
            s.kbd = true;
            edit_line(s, &mut self.term)
        }
    }

    /// 複数行マクロ `name` の本文を `endm` まで読んで定義する。
    ///
    /// ファイルの終わりやキーボード入力の終わりも `endm` として扱う。
    fn capture_macro(&mut self, name: &str) {
        debug!("capturing macro {}", name);
        self.session.capturing = true;
        let mut lines = Vec::new();
        loop {
            if self.session.kbd {
                self.term.write(DEFM_PROMPT);
                self.session.show_prompt = false;
            }
            if !self.get_next_line() || is_endm(self.session.line.chars()) {
                break;
            }
            lines.push(self.session.line.as_string());
        }
        self.session.capturing = false;
        info!("macro {} defined with {} lines", name, lines.len());
        finish_macro(&mut self.session, name, lines);
    }

    /// コマンドファイルを読む。内部コマンドは実行し、それ以外の行は履歴に加える。
    pub fn read_cmdfile(&mut self, path: &Path) -> bool {
        self.session.kbd = false;
        let file = match CommandFile::open(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("{}", e);
                self.term.write(&format!("{}\n", e));
                return false;
            }
        };
        info!("reading commands from {}", path.display());
        self.session.source = Some(file);
        self.session.line.set_capacity(DEFAULT_CAPACITY);
        while self.get_next_line() {
            match internal_cmd(&mut self.session, &mut self.term) {
                None => self.session.add_to_history(),
                Some(Outcome::Done) => {}
                Some(Outcome::Capture(name)) => self.capture_macro(&name),
            }
        }
        self.session.source = None;
        true
    }

    // ── プロンプト ──────────────────────────────

    /// マクロなどから続けて読むとき、エコーされたプロンプトを消して空行を詰める。
    fn remove_prompt(&mut self) {
        let info = self.term.screen();
        let len = self.session.prompt.len();
        let y = info.cursor.y.saturating_sub(len / info.width.max(1));
        self.term.fill(Coord::new(0, y), len, None);
        self.term.set_cursor(Coord::new(0, y.saturating_sub(1)));
    }

    fn colour_prompt(&mut self) {
        let s = &mut self.session;
        s.prompt_attrs = highlight::prompt_attrs(&s.prompt, &s.options);
        if let Some(attrs) = &s.prompt_attrs {
            let end = self.term.screen().cursor;
            paint_prompt(&mut self.term, end, &s.prompt, attrs);
        }
    }
}
