//! 行エディタ: キー入力の解釈、編集機能のディスパッチ、表示更新。
//!
//! 1 回の [`edit_line`] で 1 行を編集する。各ステップは次の順に処理される。
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ edit_line(session, term)                                 │
//! │  ┌────────────┐   ┌────────────┐   ┌──────────────────┐  │
//! │  │ next_step  │──▶│ dispatch   │──▶│ record / insert  │  │
//! │  │ (キー/再生)│   │ (機能 45)  │   │ (記録・文字挿入) │  │
//! │  └────────────┘   └────────────┘   └──────────────────┘  │
//! │        │                 │                   │           │
//! │   Terminal::read_key  LineBuffer        render (差分)    │
//! │   keypad::compose     History / complete    │           │
//! │                                         Terminal::write_at│
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 持続フラグ
//!
//! 補完の継続（`compl`・`name`）、空行での履歴検索（`empty`）、自動呼び出し（`recall`）は
//! 毎ステップ 1 ビット右へずれる。そのステップの機能が立て直さなければ次のステップで消える。
//!
//! | フラグ | 値 | 意味 |
//! |--------|----|------|
//! | `compl` | 2 / 3 | 新しい補完 / 補完の継続 |
//! | `name` | 0 | ディレクトリ補完（新規・継続） |
//! | | 1 | ファイル名補完の後のディレクトリ補完 |
//! | | 2 / 3 | ファイル名補完の新規 / 継続 |
//!
//! ## 表示更新
//!
//! 行バッファのダーティ範囲だけを書き直す。制御文字はグリフで表示し、縮んだ分は空白で消す。
//! 行が画面の最下行を越えるときは画面をスクロールして編集開始位置を上へずらす。

use log::{debug, info};

use crate::complete::{self, Completion, Mode, Prefix};
use crate::expand;
use crate::highlight::display_text;
use crate::history::HistPos;
use crate::keymap::{classify, Binding, Function, KeyInput, KeySlot};
use crate::keypad;
use crate::recorder::{Macro, Playback, Recorder, Step};
use crate::ring::Handle;
use crate::session::Session;
use crate::terminal::{Coord, KeyEvent, Terminal};
use crate::text::{self, get_arg, is_blank, skip_blank, skip_nonblank, CMDSEP};

/// 記録するキーを尋ねるメッセージ。
const RECORD_PROMPT: &str = " * Press key for recording * ";

/// キーボードから読んだもの。
enum Read {
    Key(KeyEvent),
    /// 読み取り中に Ctrl+Break があった
    Break,
}

/// キーボードから 1 行を編集して `s.line` に残す。
///
/// 入力が閉じられたら `false` を返し、`s.closed` を立てる。
pub fn edit_line<T: Terminal + ?Sized>(s: &mut Session, term: &mut T) -> bool {
    let mut ed = Editor::new(s, term);
    let ok = ed.run();
    if !ok {
        info!("keyboard input closed");
        ed.s.closed = true;
    }
    ok
}

/// プロンプトを `end`（プロンプト直後の位置）から逆算した位置に色付きで書き直す。
pub fn paint_prompt<T: Terminal + ?Sized>(term: &mut T, end: Coord, prompt: &[char], attrs: &[u8]) {
    let width = term.screen().width.max(1);
    let start = (end.y * width + end.x).saturating_sub(prompt.len());
    for (i, (&ch, &attr)) in prompt.iter().zip(attrs).enumerate() {
        let at = Coord::new((start + i) % width, (start + i) / width);
        term.write_at(at, &ch.to_string(), Some(attr));
    }
}

// ── エディタ ──────────────────────────────

struct Editor<'a, T: Terminal + ?Sized> {
    s: &'a mut Session,
    term: &'a mut T,
    /// 行の先頭の画面位置
    origin: Coord,
    width: usize,
    height: usize,
    pos: usize,
    ovr: bool,
    done: bool,
    closed: bool,
    /// オートリピートの残り
    repeat: Option<(KeyEvent, u16)>,

    // 持続フラグ
    empty: u8,
    recall: bool,
    cont_recall: bool,
    hist: HistPos,

    // 補完
    compl: u8,
    name: u8,
    comp: Option<Completion>,
    cur: Option<Handle>,
    quote_pos: usize,
    fname_pos: usize,
    /// 行に開き引用符を置いているか
    fnoq: bool,
    /// 候補のどれかが引用符を必要とするか
    pq: bool,

    // マクロ
    playback: Option<Playback>,
    recording: Option<Recorder>,
}

impl<'a, T: Terminal + ?Sized> Editor<'a, T> {
    fn new(s: &'a mut Session, term: &'a mut T) -> Self {
        let ovr = s.options.overwrite;
        let recall = s.options.auto_recall;
        Editor {
            s,
            term,
            origin: Coord::default(),
            width: 80,
            height: 25,
            pos: 0,
            ovr,
            done: false,
            closed: false,
            repeat: None,
            empty: 0,
            recall,
            cont_recall: true,
            hist: HistPos::Blank,
            compl: 0,
            name: 0,
            comp: None,
            cur: None,
            quote_pos: 0,
            fname_pos: 0,
            fnoq: false,
            pq: false,
            playback: None,
            recording: None,
        }
    }

    fn run(&mut self) -> bool {
        self.term.begin_edit();
        let info = self.term.screen();
        self.width = info.width.max(1);
        self.height = info.height.max(1);
        self.origin = info.cursor;
        if self.s.show_prompt {
            self.display_prompt();
        } else {
            self.s.show_prompt = true;
        }

        self.s.line.clear();
        self.s.line.clear_dirty();
        self.term.set_cursor_size(self.s.options.cursor_size[self.ovr as usize]);

        while !self.done {
            let Some((step, slot)) = self.next_step() else {
                break;
            };
            self.compl >>= 1;
            self.name >>= 1;
            self.empty >>= 1;
            self.recall &= self.cont_recall;
            self.cont_recall = false;

            let step = self.dispatch(step, slot);
            self.update_recording(step);
            if step.func == Function::Default {
                self.insert_char(step.ch);
            }

            self.render();
            if self.s.line.take_bell() && !self.s.options.silent {
                self.term.beep();
            }
            let at = if self.done { self.s.line.len() } else { self.pos };
            let at = self.to_screen(at);
            self.term.set_cursor(at);
        }

        if let Some(rec) = self.recording.take() {
            let (slot, binding) = rec.finish();
            self.s.keymap.set(slot, binding);
        }
        self.term.set_cursor_size(0);
        self.term.end_edit();
        if (self.s.line.len() + self.origin.x) % self.width != 0 {
            self.term.write("\n");
        }
        !self.closed
    }

    // ── 入力 ──────────────────────────────

    /// 次のキーイベント。修飾キー単独と離しは読み飛ばす。
    fn read_event(&mut self) -> Option<Read> {
        if let Some((ev, left)) = self.repeat.take() {
            if left > 1 {
                self.repeat = Some((ev, left - 1));
            }
            return Some(Read::Key(ev));
        }
        loop {
            let Some(ev) = self.term.read_key() else {
                self.closed = true;
                self.done = true;
                return None;
            };
            if self.s.brk.take() {
                debug!("break while editing");
                return Some(Read::Break);
            }
            if !ev.down || ev.is_modifier() {
                continue;
            }
            if ev.repeat > 1 {
                self.repeat = Some((ev, ev.repeat - 1));
            }
            return Some(Read::Key(ev));
        }
    }

    /// キーボードから読んだステップと、キーマップ上のスロット。
    fn read_step(&mut self) -> Option<(Step, Option<KeySlot>)> {
        let ev = match self.read_event()? {
            Read::Break => return Some((Step::func(Function::Erase), None)),
            Read::Key(ev) => ev,
        };
        Some(match classify(&ev) {
            KeyInput::Slot(slot, ch) => {
                let func = self.s.keymap.get(slot).function();
                (Step { ch, func }, Some(slot))
            }
            KeyInput::Char(ch) => (Step::char(ch), None),
            KeyInput::Keypad(first) => (Step::char(keypad::compose(self.term, first)), None),
            KeyInput::Ignore => (Step::func(Function::Ignore), None),
        })
    }

    /// 再生中のマクロがあればその次のステップ、なければキーボードから読む。
    fn next_step(&mut self) -> Option<(Step, Option<KeySlot>)> {
        if let Some(pb) = &mut self.playback {
            let step = pb.next_step();
            if pb.finished() {
                self.playback = None;
            }
            if let Some(step) = step {
                return Some((step, None));
            }
        }
        self.read_step()
    }

    // ── ディスパッチ ──────────────────────────────

    /// 機能を実行する。文字の挿入が残っていれば `Default` のステップを返す。
    fn dispatch(&mut self, mut step: Step, slot: Option<KeySlot>) -> Step {
        use Function::*;

        match step.func {
            Ignore => {}
            Quote | Default => {
                if step.func == Quote {
                    match self.read_step() {
                        Some((quoted, _)) => step = Step::char(quoted.ch),
                        None => return Step::func(Ignore),
                    }
                }
                if step.ch == '\0' {
                    self.s.line.ring_bell();
                    step.func = Ignore;
                }
            }
            CharLeft => self.pos = self.pos.saturating_sub(1),
            CharRight => {
                if self.pos < self.s.line.len() {
                    self.pos += 1;
                }
            }
            WordLeft | DelWordLeft => {
                if self.pos > 0 {
                    let start = self.pos;
                    let s = &*self.s;
                    let chars = s.line.chars();
                    let mut p = start;
                    while p > 0 && !s.is_word(chars[p - 1]) {
                        p -= 1;
                    }
                    while p > 0 && s.is_word(chars[p - 1]) {
                        p -= 1;
                    }
                    if step.func == DelWordLeft {
                        self.s.line.remove(p, start - p);
                    }
                    self.pos = p;
                }
            }
            WordRight | DelWordRight => {
                let start = self.pos;
                let s = &*self.s;
                let chars = s.line.chars();
                let mut p = start;
                while p < chars.len() && s.is_word(chars[p]) {
                    p += 1;
                }
                while p < chars.len() && !s.is_word(chars[p]) {
                    p += 1;
                }
                if step.func == DelWordRight {
                    self.s.line.remove(start, p - start);
                } else {
                    self.pos = p;
                }
            }
            StringLeft => {
                let chars = self.s.line.chars();
                let mut p = self.pos;
                while p > 0 && is_blank(chars[p - 1]) {
                    p -= 1;
                }
                while p > 0 && !is_blank(chars[p - 1]) {
                    p -= 1;
                }
                self.pos = p;
            }
            StringRight => {
                let chars = self.s.line.chars();
                self.pos = skip_blank(chars, skip_nonblank(chars, self.pos));
            }
            BegLine => self.pos = 0,
            EndLine => self.pos = self.s.line.len(),
            DelLeft => {
                if self.pos > 0 {
                    self.pos -= 1;
                    self.s.line.remove(self.pos, 1);
                }
                self.cont_recall = true;
            }
            DelRight => {
                self.s.line.remove(self.pos, 1);
                self.cont_recall = true;
            }
            DelArg => self.delete_arg(),
            DelBegLine => {
                self.s.line.remove(0, self.pos);
                self.pos = 0;
            }
            DelEndLine => self.s.line.truncate(self.pos),
            StoreErase | Erase => {
                if step.func == StoreErase {
                    self.s.add_to_history();
                }
                self.s.line.clear();
                self.pos = 0;
                self.cont_recall = true;
                self.hist = HistPos::Blank;
            }
            DelEndExec | Enter => {
                if step.func == DelEndExec {
                    self.s.line.truncate(self.pos);
                }
                self.s.add_to_history();
                self.done = true;
            }
            Wipe => {
                let len = self.s.line.len();
                self.term.fill(self.origin, len, None);
                self.term.set_cursor(self.origin);
                self.done = true;
            }
            Transpose => {
                let len = self.s.line.len();
                if len >= 2 {
                    let start = match self.pos {
                        0 => 0,
                        p if p == len => p - 2,
                        p => p - 1,
                    };
                    self.s.line.swap(start, start + 1);
                }
            }
            FirstLine | LastLine | PrevLine | NextLine => {
                let history = &self.s.history;
                self.hist = match step.func {
                    FirstLine => history.first(),
                    LastLine => history.last(),
                    PrevLine => history.prev(self.hist),
                    _ => history.next(self.hist),
                };
                self.history_line(true);
            }
            SearchBack | SearchForw => self.search(step.func == SearchBack),
            List | Cycle | CycleBack | ListDir | CycleDir | CycleDirBack => {
                self.complete(step.func)
            }
            SelectFiles => self.select_files(),
            CmdSep => step = Step::char(CMDSEP),
            AutoRecall => {
                let opt = &mut self.s.options;
                opt.auto_recall = !opt.auto_recall;
                self.recall = opt.auto_recall;
                self.cont_recall = true;
            }
            MacroToggle => {
                let opt = &mut self.s.options;
                opt.disable_macro = !opt.disable_macro;
                debug!("macro expansion disabled: {}", opt.disable_macro);
            }
            InsOvr => {
                self.ovr = !self.ovr;
                self.term.set_cursor_size(self.s.options.cursor_size[self.ovr as usize]);
            }
            Play => self.play(slot),
            Record => {
                if self.recording.is_none() {
                    self.start_recording();
                    step.func = Ignore;
                }
            }
            VarSubst => self.substitute(),
        }
        step
    }

    /// カーソル位置またはその左の引数を、後ろの空白ごと削除する。
    fn delete_arg(&mut self) {
        let chars = self.s.line.chars();
        let len = chars.len();
        let mut end = 0;
        let start = loop {
            let arg = get_arg(chars, end);
            let next = skip_blank(chars, arg.end());
            if next <= end {
                break arg.start;
            }
            end = next;
            if end > self.pos || end >= len {
                break arg.start;
            }
        };
        self.s.line.remove(start, end - start);
        self.pos = start;
    }

    /// 履歴の現在位置を行へ写す。`to_end` ならカーソルを行末へ。
    fn history_line(&mut self, to_end: bool) {
        let text = self.s.history.text(self.hist).to_string();
        self.s.line.set_str(&text);
        let len = self.s.line.len();
        if to_end {
            self.pos = len;
        } else {
            self.pos = self.pos.min(len);
        }
    }

    fn search(&mut self, backward: bool) {
        if self.s.options.empty_hist {
            self.empty |= 2;
            if self.empty == 2 && !self.s.line.is_empty() {
                self.empty = 0;
            } else {
                self.pos = 0;
            }
        }
        let end = self.pos.min(self.s.line.len());
        let prefix = &self.s.line.chars()[..end];
        match self.s.history.search(self.hist, prefix, backward) {
            None => self.s.line.ring_bell(),
            Some(found) => {
                self.hist = found;
                self.recall = self.s.options.auto_recall;
                self.cont_recall = true;
                self.history_line(self.empty & 2 != 0);
            }
        }
    }

    // ── 文字の挿入と自動呼び出し ──────────────────────────────

    fn insert_char(&mut self, ch: char) {
        let line = &mut self.s.line;
        let ok = if self.ovr || self.recall {
            line.overwrite(self.pos, ch)
        } else {
            line.insert(self.pos, &[ch]) == 1
        };
        if !ok {
            line.ring_bell();
            return;
        }
        self.pos += 1;
        if self.recall {
            let from = self.s.history.next(self.hist);
            let prefix = &self.s.line.chars()[..self.pos];
            match self.s.history.search(from, prefix, true) {
                None => self.s.line.truncate(self.pos),
                Some(found) => {
                    self.hist = found;
                    self.history_line(false);
                    self.cont_recall = true;
                }
            }
        }
    }

    // ── 補完 ──────────────────────────────

    fn complete(&mut self, func: Function) {
        use Function::*;

        if matches!(func, List | Cycle | CycleBack) {
            self.name |= 2;
        }
        self.compl |= 2;
        let back = matches!(func, CycleBack | CycleDirBack);
        let list = matches!(func, List | ListDir);

        let (name, end, cur) = if self.compl == 2 || self.name == 1 || self.name == 2 {
            let mode = if self.name & 2 != 0 {
                Mode::Files
            } else {
                Mode::Dirs
            };
            let s = &mut *self.s;
            let Some(comp) =
                complete::find_files(&mut s.line, &mut self.pos, mode, &s.exts, &mut s.defs.assocs)
            else {
                self.compl = 0;
                self.comp = None;
                self.s.line.ring_bell();
                return;
            };

            self.fnoq = comp.found_quote;
            self.pq = comp.found_quote;
            self.quote_pos = comp.path_pos - usize::from(comp.found_quote);
            self.fname_pos = comp.fname_pos;
            if let (false, Prefix::Common(n)) = (comp.found_quote, comp.prefix) {
                self.pq = comp.needs_quote_at(n);
            }

            let single = comp.count == 1;
            let result = if single || comp.prefix == Prefix::Wild || back {
                if single {
                    self.compl = 0;
                } else if list {
                    self.comp = Some(comp);
                    self.list_files();
                    return;
                }
                let cur = if back { comp.last() } else { comp.first() };
                let name = comp.name(cur).to_vec();
                let end = name.len();
                (name, end, cur)
            } else {
                let end = match comp.prefix {
                    Prefix::Common(n) => n,
                    Prefix::Wild => 0,
                };
                (comp.name(comp.first()).to_vec(), end, comp.origin())
            };
            self.comp = Some(comp);
            result
        } else if list {
            self.list_files();
            return;
        } else {
            let Some(comp) = &self.comp else {
                self.s.line.ring_bell();
                return;
            };
            let prev = self.cur.unwrap_or_else(|| comp.origin());
            let cur = if back { comp.prev(prev) } else { comp.next(prev) };
            if cur == comp.origin() {
                self.s.line.ring_bell();
            }
            let name = comp.name(cur).to_vec();
            let end = name.len();
            (name, end, cur)
        };
        self.cur = Some(cur);
        self.place_name(&name, end, cur);
    }

    /// 候補 `name` の先頭 `end` 文字を行のファイル名部分に置く。
    fn place_name(&mut self, name: &[char], end: usize, cur: Handle) {
        let Some(comp) = &self.comp else {
            return;
        };
        let origin = comp.origin();
        let dirchar = comp.dirchar;
        let line = &mut self.s.line;

        let end = end.min(name.len());
        let quote = self.pq || text::quote_needed(&name[..end]);
        if quote && !self.fnoq {
            line.insert(self.quote_pos, &['"']);
            self.fname_pos += 1;
            self.pos += 1;
            self.fnoq = true;
        } else if !quote && self.fnoq {
            line.remove(self.quote_pos, 1);
            self.fname_pos -= 1;
            self.pos -= 1;
            self.fnoq = false;
        }

        let dir = end > 0 && name[end - 1] == dirchar;
        let end = if dir && self.s.options.no_slash {
            end - 1
        } else {
            end
        };
        let line = &mut self.s.line;
        line.replace(self.fname_pos, self.pos - self.fname_pos, &name[..end]);
        self.pos = (self.fname_pos + end).min(line.len());
        if !dir && cur != origin {
            let tail: &[char] = if quote { &['"', ' '] } else { &[' '] };
            self.pos += line.insert(self.pos, tail);
        }
    }

    /// 一致する候補をすべて挿入する（必要なものは引用符で囲む）。
    fn select_files(&mut self) {
        let s = &mut *self.s;
        let Some(comp) =
            complete::find_files(&mut s.line, &mut self.pos, Mode::Files, &s.exts, &mut s.defs.assocs)
        else {
            self.s.line.ring_bell();
            return;
        };
        let line = &mut self.s.line;
        let dir: Vec<char> = line.chars()[comp.path_pos..comp.fname_pos].to_vec();
        let start = comp.path_pos - usize::from(comp.found_quote);
        line.remove(start, self.pos - start);
        self.pos = start;

        let dir_quote = text::quote_needed(&dir);
        for name in comp.candidates() {
            let quote = dir_quote || text::quote_needed(name);
            if quote {
                self.pos += line.insert(self.pos, &['"']);
            }
            self.pos += line.insert(self.pos, &dir);
            self.pos += line.insert(self.pos, name);
            let tail: &[char] = if quote { &['"', ' '] } else { &[' '] };
            self.pos += line.insert(self.pos, tail);
        }
        debug!("selected {} files", comp.count);
    }

    /// 補完候補を一覧表示して、プロンプトと行を出し直す。
    fn list_files(&mut self) {
        let Some(comp) = &self.comp else {
            return;
        };
        let rows = comp.listing(self.width);
        let count = comp.count;

        let end = self.to_screen(self.s.line.len());
        self.term.set_cursor(end);
        self.term.write("\n");
        if self.check_name_count(rows.len(), count) {
            for row in &rows {
                self.term.write(row);
                if row.chars().count() % self.width != 0 {
                    self.term.write("\n");
                }
            }
        }
        self.display_prompt();
        self.origin = self.term.screen().cursor;
        let len = self.s.line.len();
        self.s.line.mark(0, len);
    }

    /// 一覧を表示するか。画面に収まらなければ断り、ウィンドウより長ければ確認する。
    fn check_name_count(&mut self, lines: usize, count: usize) -> bool {
        let info = self.term.screen();
        if lines > info.height.saturating_sub(2) {
            self.term
                .write(&format!("Too many names to display ({})!\n", count));
            return false;
        }
        let window = info.window_bottom.saturating_sub(info.window_top);
        if lines > window.saturating_sub(1) {
            self.term
                .write(&format!("Display all {} possibilities? ", count));
            let yes = matches!(self.read_event(), Some(Read::Key(ev)) if matches!(ev.ch, 'y' | 'Y'));
            self.term.write(if yes { "Yes\n" } else { "No\n" });
            return yes;
        }
        true
    }

    // ── マクロ ──────────────────────────────

    fn play(&mut self, slot: Option<KeySlot>) {
        let Some(slot) = slot else {
            return;
        };
        match self.s.keymap.get(slot) {
            Binding::Macro(Macro::Text(text)) => {
                let text = text.clone();
                self.s.line.set_str(&text);
                self.done = true;
            }
            Binding::Macro(Macro::Step(step)) => self.playback = Some(Playback::new(vec![*step])),
            Binding::Macro(Macro::Steps(steps)) => {
                self.playback = Some(Playback::new(steps.clone()))
            }
            _ => {}
        }
    }

    /// 記録するキーを読み、そのスロットを `Record` にして記録を始める。
    fn start_recording(&mut self) {
        let attr = self.attr(self.s.options.rec_col);
        let at = self.to_screen(self.pos);
        self.term.write_at(at, RECORD_PROMPT, attr);
        self.s
            .line
            .mark(self.pos, self.pos + RECORD_PROMPT.chars().count());

        let Some(Read::Key(ev)) = self.read_event() else {
            return;
        };
        let KeyInput::Slot(slot, _) = classify(&ev) else {
            return;
        };
        let current = self.s.keymap.get(slot).function();
        if matches!(current, Function::Erase | Function::Enter | Function::Record) {
            return;
        }
        self.s.keymap.set(slot, Binding::Function(Function::Record));
        self.recording = Some(Recorder::start(slot));
        let len = self.s.line.len();
        self.s.line.mark(0, len);
    }

    fn update_recording(&mut self, step: Step) {
        let Some(rec) = &mut self.recording else {
            return;
        };
        if rec.record(step, self.done) {
            if let Some(rec) = self.recording.take() {
                let (slot, binding) = rec.finish();
                self.s.keymap.set(slot, binding);
            }
            let len = self.s.line.len();
            self.s.line.mark(0, len);
        }
    }

    /// 編集中の行に展開を適用する（マクロは最初の行だけ）。
    fn substitute(&mut self) {
        let s = &mut *self.s;
        expand::expand_braces(&mut s.line);
        expand::expand_vars(&mut s.line, &mut s.defs.symbols, true);
        expand::associate(&mut s.line, &mut s.defs.assocs);
        let depth = s.macros.depth();
        expand::expand_macro(&mut s.line, &mut s.defs.macros, &mut s.macros);
        if s.macros.depth() > depth {
            s.macros.pop();
        }
        expand::expand_symbol(&mut s.line, &mut s.defs.symbols);
        self.pos = s.line.len();
    }

    // ── 表示 ──────────────────────────────

    fn attr(&self, col: u8) -> Option<u8> {
        (!self.s.options.nocolour).then_some(col)
    }

    fn to_screen(&self, pos: usize) -> Coord {
        let x = self.origin.x + pos;
        Coord::new(x % self.width, self.origin.y + x / self.width)
    }

    /// ダーティ範囲を書き直す。
    fn render(&mut self) {
        let Some(span) = self.s.line.take_dirty() else {
            return;
        };
        let len = self.s.line.len();
        let mut blank = span.end - span.start;
        if len > span.start {
            let end = self.to_screen(len);
            if end.y >= self.height {
                let lines = end.y - self.height + 1;
                self.term.scroll_up(lines);
                self.origin.y = self.origin.y.saturating_sub(lines);
            }
            let col = if self.recording.is_some() {
                self.s.options.rec_col
            } else {
                self.s.options.cmd_col
            };
            let attr = self.attr(col);
            let text = display_text(&self.s.line.chars()[span.start..len]);
            let at = self.to_screen(span.start);
            self.term.write_at(at, &text, attr);
            blank = blank.saturating_sub(len - span.start);
        }
        if blank > 0 {
            let at = self.to_screen(len);
            self.term.fill(at, blank, None);
        }
    }

    /// プロンプトを次の行に出し直す（キーボード入力のときだけ）。
    fn display_prompt(&mut self) {
        if !self.s.kbd {
            return;
        }
        self.term.write("\n");
        let prompt: String = self.s.prompt.iter().collect();
        self.term.write(&prompt);
        let end = self.term.screen().cursor;
        if let Some(attrs) = &self.s.prompt_attrs {
            paint_prompt(self.term, end, &self.s.prompt, attrs);
        }
        self.origin = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::keymap::{EditKey, KeyState};
    use crate::terminal::{BreakSignal, Modifiers, Scripted, VirtualTerminal};
    use std::fs;

    fn setup(width: usize, height: usize) -> (Session, VirtualTerminal) {
        let brk = BreakSignal::new();
        brk.arm();
        let s = Session::new(Options::default(), brk.clone());
        (s, VirtualTerminal::new(width, height, brk))
    }

    fn key(k: EditKey) -> KeyEvent {
        KeyEvent::key(k)
    }

    fn ctrl_key(k: EditKey) -> KeyEvent {
        KeyEvent::key_with(
            k,
            Modifiers {
                ctrl: true,
                ..Modifiers::default()
            },
        )
    }

    fn fkey(n: u8) -> KeyEvent {
        KeyEvent::function(n, Modifiers::default())
    }

    fn fslot(number: u8) -> KeySlot {
        KeySlot::Function {
            number,
            state: KeyState::Plain,
        }
    }

    fn edit(s: &mut Session, t: &mut VirtualTerminal) -> String {
        assert!(edit_line(s, t));
        s.line.as_string()
    }

    #[test]
    fn typing_and_motion() {
        let (mut s, mut t) = setup(40, 5);
        t.write("> ");
        t.type_str("hello");
        t.push_key(key(EditKey::Home));
        t.type_str("x");
        t.push_key(key(EditKey::End));
        t.type_str("!");
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "xhello!");
        assert_eq!(t.row(0), "> xhello!");
        assert_eq!(s.history.iter().collect::<Vec<_>>(), vec!["xhello!"]);
    }

    #[test]
    fn left_moves_within_line() {
        let (mut s, mut t) = setup(40, 5);
        t.type_str("abc");
        for _ in 0..3 {
            t.push_key(key(EditKey::Left));
        }
        t.push_key(key(EditKey::Left));
        t.type_str("_");
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "_abc");
    }

    #[test]
    fn word_deletion_and_motion() {
        let (mut s, mut t) = setup(40, 5);
        t.type_str("foo bar_baz");
        t.push_key(KeyEvent::ctrl('l'));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "foo ");

        t.type_str("one two three");
        t.push_key(ctrl_key(EditKey::Left));
        t.push_key(ctrl_key(EditKey::Left));
        t.push_key(KeyEvent::ctrl('w'));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "one three");
    }

    #[test]
    fn delete_argument_removes_quoted_word() {
        let (mut s, mut t) = setup(60, 5);
        t.type_str("cp \"a b\" c");
        for _ in 0..3 {
            t.push_key(key(EditKey::Left));
        }
        t.push_key(KeyEvent::key_with(
            EditKey::Bksp,
            Modifiers {
                shift: true,
                ctrl: true,
                ..Modifiers::default()
            },
        ));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "cp c");
    }

    #[test]
    fn transpose_and_overwrite() {
        let (mut s, mut t) = setup(40, 5);
        t.type_str("ab");
        t.push_key(KeyEvent::ctrl('t'));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "ba");

        t.type_str("abc");
        t.push_key(key(EditKey::Ins));
        t.push_key(key(EditKey::Home));
        t.type_str("XY");
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "XYc");
        assert_eq!(t.cursor_size, 0);
    }

    #[test]
    fn history_navigation() {
        let (mut s, mut t) = setup(40, 5);
        s.history.add("one");
        s.history.add("two");
        t.push_key(key(EditKey::Up));
        t.push_key(key(EditKey::Up));
        t.push_key(key(EditKey::Down));
        t.push_key(key(EditKey::Down));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "");

        t.push_key(key(EditKey::Up));
        t.push_key(key(EditKey::Up));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "one");

        t.push_key(key(EditKey::PgUp));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "two");
    }

    #[test]
    fn search_uses_typed_prefix() {
        let (mut s, mut t) = setup(40, 5);
        for line in ["cd /tmp", "ls", "cat x"] {
            s.history.add(line);
        }
        t.type_str("c");
        t.push_key(fkey(8));
        t.push_key(fkey(8));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "cd /tmp");

        t.type_str("zz");
        t.push_key(fkey(8));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "zz");
        assert_eq!(t.beeps, 1);
    }

    #[test]
    fn auto_recall_completes_from_history() {
        let (mut s, mut t) = setup(40, 5);
        s.options.auto_recall = true;
        s.history.add("abc");
        s.history.add("xyz");
        t.type_str("x");
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "xyz");

        t.type_str("xq");
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "xq");
    }

    #[test]
    fn auto_recall_toggle() {
        let (mut s, mut t) = setup(40, 5);
        s.history.add("make all");
        t.push_key(KeyEvent::ctrl('y'));
        t.type_str("m");
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "make all");
        assert!(s.options.auto_recall);
    }

    #[test]
    fn break_erases_line() {
        let (mut s, mut t) = setup(40, 5);
        t.type_str("abc");
        t.push(Scripted::Break);
        t.type_str("x");
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "x");
        assert_eq!(t.row(0), "x");
    }

    #[test]
    fn closed_input() {
        let (mut s, mut t) = setup(40, 5);
        t.type_str("abc");
        assert!(!edit_line(&mut s, &mut t));
        assert!(s.closed);
    }

    #[test]
    fn capacity_rings_bell() {
        let (mut s, mut t) = setup(40, 5);
        s.line.set_capacity(3);
        t.type_str("abcd");
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "abc");
        assert_eq!(t.beeps, 1);

        s.options.silent = true;
        t.type_str("abcd");
        t.push_key(key(EditKey::Enter));
        edit(&mut s, &mut t);
        assert_eq!(t.beeps, 1);
    }

    #[test]
    fn quote_and_command_separator() {
        let (mut s, mut t) = setup(40, 5);
        t.type_str("a");
        t.push_key(KeyEvent::ctrl('q'));
        t.push_key(KeyEvent::ctrl('a'));
        t.push_key(KeyEvent::ctrl(']'));
        t.type_str("b");
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "a\u{1}\u{13}b");
        assert_eq!(t.row(0), "a\u{263A}\u{203C}b");
    }

    #[test]
    fn line_is_coloured_and_stale_tail_blanked() {
        let (mut s, mut t) = setup(40, 5);
        t.type_str("abcdef");
        t.push_key(KeyEvent::ctrl('x'));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "");
        assert_eq!(t.row(0), "");

        t.set_cursor_pos(Coord::new(0, 2));
        t.type_str("hi");
        t.push_key(key(EditKey::Enter));
        edit(&mut s, &mut t);
        assert_eq!(t.attr_at(Coord::new(0, 2)), Some(s.options.cmd_col));
    }

    #[test]
    fn long_line_scrolls() {
        let (mut s, mut t) = setup(10, 2);
        t.set_cursor_pos(Coord::new(0, 1));
        t.type_str("0123456789abc");
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "0123456789abc");
        // 行の折り返しで 1 回、確定後の改行で 1 回
        assert_eq!(t.scrolled, 2);
        assert_eq!(t.row(0), "abc");
    }

    #[test]
    fn variable_substitution_inline() {
        let (mut s, mut t) = setup(40, 5);
        s.defs.define_symbol("ll", "ls -l");
        t.type_str("ll");
        t.push_key(KeyEvent::ctrl('j'));
        t.type_str("a");
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "ls -la");
    }

    #[test]
    fn record_and_play_macro() {
        let (mut s, mut t) = setup(60, 5);
        t.push_key(fkey(12));
        t.push_key(fkey(3));
        t.type_str("ax");
        t.push_key(key(EditKey::Bksp));
        t.type_str("b");
        t.push_key(fkey(3));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "ab");
        assert_eq!(
            s.keymap.get(fslot(3)),
            &Binding::Macro(Macro::Steps(vec![Step::char('a'), Step::char('b')]))
        );

        t.type_str("-");
        t.push_key(fkey(3));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "-ab");
    }

    #[test]
    fn recording_single_function_binds_it() {
        let (mut s, mut t) = setup(60, 5);
        t.push_key(fkey(12));
        t.push_key(fkey(4));
        t.push_key(key(EditKey::Home));
        t.push_key(fkey(4));
        t.push_key(key(EditKey::Enter));
        edit(&mut s, &mut t);
        assert_eq!(s.keymap.get(fslot(4)), &Binding::Function(Function::BegLine));
    }

    #[test]
    fn record_rejects_enter_key() {
        let (mut s, mut t) = setup(60, 5);
        t.push_key(fkey(12));
        t.push_key(key(EditKey::Enter));
        t.type_str("q");
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "q");
        assert_eq!(
            s.keymap.get(KeySlot::Edit {
                key: EditKey::Enter,
                state: KeyState::Plain
            }),
            &Binding::Function(Function::Enter)
        );
    }

    #[test]
    fn text_macro_submits_without_history() {
        let (mut s, mut t) = setup(40, 5);
        s.keymap
            .set(fslot(5), Binding::Macro(Macro::Text("dir /w".into())));
        t.type_str("junk");
        t.push_key(fkey(5));
        assert_eq!(edit(&mut s, &mut t), "dir /w");
        assert!(s.history.is_empty());
    }

    fn completion_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("foo.txt"), "").unwrap();
        fs::write(dir.path().join("foobar.txt"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        dir
    }

    fn complete_with(s: &mut Session, t: &mut VirtualTerminal, typed: &str, keys: &[KeyEvent]) -> String {
        t.type_str(typed);
        for k in keys {
            t.push_key(*k);
        }
        t.push_key(key(EditKey::Enter));
        edit(s, t)
    }

    #[test]
    fn completion_cycles_through_candidates() {
        let dir = completion_dir();
        let base = dir.path().display().to_string();
        let (mut s, mut t) = setup(200, 10);
        let typed = format!("cat {}/fo", base);
        let tab = key(EditKey::Tab);

        assert_eq!(complete_with(&mut s, &mut t, &typed, &[tab]), format!("cat {}/foo", base));
        assert_eq!(
            complete_with(&mut s, &mut t, &typed, &[tab, tab]),
            format!("cat {}/foo.txt ", base)
        );
        assert_eq!(
            complete_with(&mut s, &mut t, &typed, &[tab, tab, tab]),
            format!("cat {}/foobar.txt ", base)
        );
        let beeps = t.beeps;
        assert_eq!(
            complete_with(&mut s, &mut t, &typed, &[tab, tab, tab, tab]),
            format!("cat {}/fo", base)
        );
        assert_eq!(t.beeps, beeps + 1);
    }

    #[test]
    fn completion_backwards_and_single() {
        let dir = completion_dir();
        let base = dir.path().display().to_string();
        let (mut s, mut t) = setup(200, 10);
        let back = KeyEvent::key_with(
            EditKey::Tab,
            Modifiers {
                shift: true,
                ..Modifiers::default()
            },
        );
        assert_eq!(
            complete_with(&mut s, &mut t, &format!("cat {}/fo", base), &[back]),
            format!("cat {}/foobar.txt ", base)
        );
        assert_eq!(
            complete_with(&mut s, &mut t, &format!("cat {}/foob", base), &[key(EditKey::Tab)]),
            format!("cat {}/foobar.txt ", base)
        );
        assert_eq!(
            complete_with(&mut s, &mut t, &format!("cat {}/s", base), &[key(EditKey::Tab)]),
            format!("cat {}/sub/", base)
        );
        s.options.no_slash = true;
        assert_eq!(
            complete_with(&mut s, &mut t, &format!("cat {}/s", base), &[key(EditKey::Tab)]),
            format!("cat {}/sub", base)
        );
    }

    #[test]
    fn completion_without_match_rings_bell() {
        let dir = completion_dir();
        let base = dir.path().display().to_string();
        let (mut s, mut t) = setup(200, 10);
        let line = complete_with(&mut s, &mut t, &format!("cat {}/zz", base), &[key(EditKey::Tab)]);
        assert_eq!(line, format!("cat {}/zz", base));
        assert_eq!(t.beeps, 1);
    }

    #[test]
    fn completion_quotes_names_with_spaces() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("my file"), "").unwrap();
        let base = dir.path().display().to_string();
        let (mut s, mut t) = setup(200, 10);
        let line = complete_with(&mut s, &mut t, &format!("cat {}/my", base), &[key(EditKey::Tab)]);
        assert_eq!(line, format!("cat \"{}/my file\" ", base));
    }

    #[test]
    fn list_shows_candidates_and_redraws_prompt() {
        let dir = completion_dir();
        let base = dir.path().display().to_string();
        let (mut s, mut t) = setup(200, 10);
        s.kbd = true;
        s.prompt = "$ ".chars().collect();
        t.write("$ ");
        let list = ctrl_key(EditKey::Tab);
        let line = complete_with(&mut s, &mut t, &format!("cat {}/foo", base), &[list, list]);
        assert_eq!(line, format!("cat {}/foo", base));
        let rows: Vec<String> = (0..10).map(|y| t.row(y)).collect();
        assert!(rows.iter().any(|r| r.starts_with("foo.txt") && r.contains("foobar.txt")));
        assert!(rows.iter().any(|r| *r == format!("$ cat {}/foo", base)));
    }

    #[test]
    fn select_files_inserts_all() {
        let dir = completion_dir();
        let base = dir.path().display().to_string();
        let (mut s, mut t) = setup(300, 10);
        let sel = KeyEvent::ctrl('s');
        let sel = KeyEvent {
            mods: Modifiers {
                shift: true,
                ctrl: true,
                alt: false,
            },
            ..sel
        };
        let line = complete_with(&mut s, &mut t, &format!("cat {}/foo", base), &[sel]);
        assert_eq!(line, format!("cat {0}/foo.txt {0}/foobar.txt ", base));
    }

    #[test]
    fn record_prompt_is_erased() {
        let (mut s, mut t) = setup(60, 5);
        t.type_str("ab");
        t.push_key(fkey(12));
        t.push_key(key(EditKey::Esc));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "ab");
        assert_eq!(t.row(0), "ab");
    }

    #[test]
    fn keypad_composes_character() {
        let (mut s, mut t) = setup(40, 5);
        let alt = Modifiers {
            alt: true,
            ..Modifiers::default()
        };
        let numpad = |d: u8| KeyEvent {
            ch: '\0',
            key: crate::terminal::Vk::Numpad(d),
            mods: alt,
            repeat: 1,
            down: true,
        };
        t.push_key(numpad(6));
        t.push_key(numpad(5));
        t.push_key(KeyEvent::modifier(crate::terminal::Vk::Menu, false));
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "A");
    }

    #[test]
    fn repeat_count_repeats_key() {
        let (mut s, mut t) = setup(40, 5);
        t.push_key(KeyEvent {
            repeat: 3,
            ..KeyEvent::char('z')
        });
        t.push_key(key(EditKey::Enter));
        assert_eq!(edit(&mut s, &mut t), "zzz");
    }
}
