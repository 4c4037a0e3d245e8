//! 内部コマンド。
//!
//! 行の最初の単語がちょうど 4 文字の内部コマンド名（大文字小文字無視）なら、
//! ホストシェルへは渡さずにここで実行する。
//!
//! | コマンド | 動作 |
//! |----------|------|
//! | `defa ext... text` | 関連付けを定義 |
//! | `defk key [func \| =text \| "str" func ...]` | キーの割り当て |
//! | `defm name [text]` | マクロを定義（本文がなければ `endm` まで複数行） |
//! | `defs name [text]` | シンボルを定義（値がなければ削除） |
//! | `dela` / `delk` / `delm` / `dels` | 名前ごとに削除 |
//! | `delh [text]` | `delh` 行自身と、`text` を含む履歴を削除 |
//! | `lsta` / `lsth` / `lstk` / `lstm` / `lsts` | 一覧表示（`> file`、`>> file`、`\| cmd` でリダイレクト） |
//! | `rsta` / `rsth` / `rstm` / `rsts` | 全消去 |
//!
//! 失敗は診断メッセージを表示して続行する。

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::process::{Child, Command as Process, Stdio};

use log::{debug, info, warn};

use crate::define::Define;
use crate::error::{Error, RedirectAction, Result};
use crate::keymap::{Binding, Function, KeySlot};
use crate::recorder::{collapse, describe, Macro, Step};
use crate::session::{ListGap, Session};
use crate::terminal::Terminal;
use crate::text::{
    self, get_arg_unquoted, is_blank, skip_blank, skip_nonblank, skip_nondelim, un_escape,
};

/// 複数行マクロの定義を終える行。
pub const ENDM: &str = "endm";

/// 内部コマンドを実行した結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// 複数行マクロ `name` の本文を `endm` まで読む
    Capture(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Defa,
    Defk,
    Defm,
    Defs,
    Dela,
    Delh,
    Delk,
    Delm,
    Dels,
    Lsta,
    Lsth,
    Lstk,
    Lstm,
    Lsts,
    Rsta,
    Rsth,
    Rstm,
    Rsts,
}

/// 名前順に並べたコマンド表。二分探索に使う。
const COMMANDS: [(&str, Command); 18] = [
    ("defa", Command::Defa),
    ("defk", Command::Defk),
    ("defm", Command::Defm),
    ("defs", Command::Defs),
    ("dela", Command::Dela),
    ("delh", Command::Delh),
    ("delk", Command::Delk),
    ("delm", Command::Delm),
    ("dels", Command::Dels),
    ("lsta", Command::Lsta),
    ("lsth", Command::Lsth),
    ("lstk", Command::Lstk),
    ("lstm", Command::Lstm),
    ("lsts", Command::Lsts),
    ("rsta", Command::Rsta),
    ("rsth", Command::Rsth),
    ("rstm", Command::Rstm),
    ("rsts", Command::Rsts),
];

const CMD_LEN: usize = 4;

fn lookup(word: &[char]) -> Option<Command> {
    if word.len() != CMD_LEN {
        return None;
    }
    let word: String = word.iter().flat_map(|c| c.to_lowercase()).collect();
    COMMANDS
        .binary_search_by(|(name, _)| name.cmp(&word.as_str()))
        .ok()
        .map(|i| COMMANDS[i].1)
}

fn name_of(cmd: Command) -> &'static str {
    COMMANDS
        .iter()
        .find(|(_, c)| *c == cmd)
        .map_or("", |(name, _)| name)
}

/// 行が内部コマンドなら実行する。内部コマンドでなければ `None`。
///
/// 読み取り中に中断があった場合も内部コマンドとして扱い、実行中のマクロを捨てる。
pub fn internal_cmd<T: Terminal + ?Sized>(s: &mut Session, term: &mut T) -> Option<Outcome> {
    if s.brk.take() {
        info!("break: abandoning {} macro frames", s.macros.depth());
        s.macros.clear();
        return Some(Outcome::Done);
    }

    let chars = s.line.chars();
    let pos = skip_blank(chars, 0);
    let end = skip_nonblank(chars, pos);
    let cmd = lookup(&chars[pos..end])?;

    if s.kbd {
        un_escape(&mut s.line, None);
    }
    let pos = skip_blank(s.line.chars(), end);
    debug!("internal command {}", name_of(cmd));

    match run(cmd, s, term, pos) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!("{}", e);
            term.write(&format!("{}\n", e));
            Some(Outcome::Done)
        }
    }
}

fn run<T: Terminal + ?Sized>(
    cmd: Command,
    s: &mut Session,
    term: &mut T,
    pos: usize,
) -> Result<Outcome> {
    match cmd {
        Command::Defa => defa(s, pos),
        Command::Defk => defk(s, pos)?,
        Command::Defm => return defm(s, pos),
        Command::Defs => defs(s, pos)?,
        Command::Dela => dela(s, pos),
        Command::Delh => delh(s, pos),
        Command::Delk => delk(s, pos),
        Command::Delm => {
            for name in words(s.line.chars(), pos) {
                s.defs.macros.remove(&name);
            }
        }
        Command::Dels => {
            for name in words(s.line.chars(), pos) {
                s.defs.symbols.remove(&name);
            }
        }
        Command::Lsta | Command::Lsth | Command::Lstk | Command::Lstm | Command::Lsts => {
            let sink = redirect(s, pos)?;
            let out = match cmd {
                Command::Lsta => lsta(s, pos),
                Command::Lsth => lsth(s, pos),
                Command::Lstk => lstk(s, pos),
                Command::Lstm => list_defines(s, pos, 'm'),
                _ => list_defines(s, pos, 's'),
            };
            sink.deliver(&out, term);
        }
        Command::Rsta => s.defs.assocs.clear(),
        Command::Rsth => s.history.clear(),
        Command::Rstm => s.defs.macros.clear(),
        Command::Rsts => s.defs.symbols.clear(),
    }
    Ok(Outcome::Done)
}

/// `pos` 以降の空白区切りの単語。
fn words(line: &[char], mut pos: usize) -> Vec<String> {
    let mut out = Vec::new();
    pos = skip_blank(line, pos);
    while pos < line.len() {
        let end = skip_nonblank(line, pos);
        out.push(line[pos..end].iter().collect());
        pos = skip_blank(line, end);
    }
    out
}

/// 定義名を切り出す。区切り文字の後ろに空白以外が続けば不正な名前。
fn def_name(line: &[char], pos: usize, kind: &'static str) -> Result<(String, usize)> {
    let end = skip_nondelim(line, pos);
    if end < line.len() && !is_blank(line[end]) {
        let end = skip_nonblank(line, end);
        return Err(Error::InvalidName {
            kind,
            name: line[pos..end].iter().collect(),
        });
    }
    Ok((line[pos..end].iter().collect(), end))
}

// ── 定義 ──────────────────────────────

fn defa(s: &mut Session, pos: usize) {
    let line = s.line.chars().to_vec();
    if pos == line.len() {
        return;
    }
    dela(s, pos);
    let end = skip_nonblank(&line, pos);
    let def = skip_blank(&line, end);
    if def == line.len() {
        return;
    }
    let name: String = line[pos..end].iter().collect();
    let value: String = line[def..].iter().collect();
    s.defs.assocs.add(&name, vec![value]);
}

fn defk(s: &mut Session, pos: usize) -> Result<()> {
    let line = s.line.chars().to_vec();
    if pos == line.len() {
        return Ok(());
    }
    let end = skip_nonblank(&line, pos);
    let key: String = line[pos..end].iter().collect();
    let slot = KeySlot::parse(&key).ok_or(Error::UnknownKey(key))?;

    let pos = skip_blank(&line, end);
    if pos == line.len() {
        s.keymap.set(slot, Binding::Ignore);
        return Ok(());
    }
    if line[pos] == '=' {
        let text: String = line[pos + 1..].iter().collect();
        s.keymap.set(slot, Binding::Macro(Macro::Text(text)));
        return Ok(());
    }

    let mut arg = get_arg_unquoted(&mut s.line, pos);
    let after = skip_blank(s.line.chars(), arg.end());
    if after == s.line.len() && !arg.found_quote {
        let name = s.line.slice_string(arg.start..arg.end());
        let func = Function::from_name(&name).ok_or(Error::UnknownFunction(name))?;
        s.keymap.set(slot, Binding::from_function(func));
        return Ok(());
    }

    let mut steps: Vec<Step> = Vec::new();
    // `\"` の直前のバックスラッシュは半分にする
    let halve = |steps: &mut Vec<Step>, line: &[char], at: usize| {
        let bs = line[..at].iter().rev().take_while(|&&c| c == '\\').count();
        steps.truncate(steps.len().saturating_sub((bs + 1) / 2));
    };
    loop {
        let line = s.line.chars().to_vec();
        let mut next = arg.end();
        if arg.found_quote {
            for at in arg.start..arg.end() {
                if line[at] == '"' {
                    halve(&mut steps, &line, at);
                }
                steps.push(Step::char(line[at]));
            }
            if next < line.len() {
                halve(&mut steps, &line, next);
                next += 1;
            }
        } else {
            let name: String = line[arg.start..arg.end()].iter().collect();
            let func = Function::from_name(&name).ok_or(Error::UnknownFunction(name))?;
            steps.push(Step::func(func));
        }
        arg = get_arg_unquoted(&mut s.line, next);
        if arg.len == 0 {
            break;
        }
    }
    s.keymap.set(slot, collapse(steps));
    Ok(())
}

fn defm(s: &mut Session, pos: usize) -> Result<Outcome> {
    if s.capturing {
        return Ok(Outcome::Done);
    }
    let line = s.line.chars().to_vec();
    let (name, end) = def_name(&line, pos, "macro")?;
    if name.is_empty() {
        return Ok(Outcome::Done);
    }
    let def = skip_blank(&line, end);
    if def == line.len() {
        return Ok(Outcome::Capture(name));
    }
    let text: String = line[def..].iter().collect();
    s.defs.define_macro(&name, vec![text]);
    Ok(Outcome::Done)
}

/// 複数行マクロの定義を終える。本文が空ならマクロを消す。
pub fn finish_macro(s: &mut Session, name: &str, lines: Vec<String>) {
    if lines.is_empty() {
        s.defs.symbols.remove(name);
        s.defs.macros.remove(name);
    } else {
        s.defs.define_macro(name, lines);
    }
}

/// `endm` 行か。
pub fn is_endm(line: &[char]) -> bool {
    let pos = skip_blank(line, 0);
    let end = skip_nonblank(line, pos);
    let endm: Vec<char> = ENDM.chars().collect();
    text::str_eq_ignore_case(&line[pos..end], &endm)
}

fn defs(s: &mut Session, pos: usize) -> Result<()> {
    let line = s.line.chars().to_vec();
    if pos == line.len() {
        return Ok(());
    }
    let (name, end) = def_name(&line, pos, "symbol")?;
    let def = skip_blank(&line, end);
    let value: String = line[def..].iter().collect();
    s.defs.define_symbol(&name, &value);
    Ok(())
}

// ── 削除 ──────────────────────────────

fn dela(s: &mut Session, pos: usize) {
    for name in words(s.line.chars(), pos) {
        s.defs.delete_assoc(&name);
    }
}

fn delh(s: &mut Session, pos: usize) {
    s.history.remove_last();
    if pos >= s.line.len() {
        return;
    }
    let needle = s.line.slice_string(pos..s.line.len());
    let n = s.history.delete_containing(&needle);
    debug!("delh removed {} lines", n);
}

fn delk(s: &mut Session, pos: usize) {
    for key in words(s.line.chars(), pos) {
        if let Some(slot) = KeySlot::parse(&key) {
            s.keymap.set(slot, Binding::Ignore);
        }
    }
}

// ── 一覧表示 ──────────────────────────────

/// 一覧の出力先。
enum Sink {
    Screen,
    File(File),
    Pipe(Child),
}

impl Sink {
    fn deliver<T: Terminal + ?Sized>(self, out: &str, term: &mut T) {
        match self {
            Sink::Screen => term.write(out),
            Sink::File(mut file) => {
                if let Err(e) = file.write_all(out.as_bytes()) {
                    warn!("listing not written: {}", e);
                }
            }
            Sink::Pipe(mut child) => {
                if let Some(mut stdin) = child.stdin.take() {
                    if let Err(e) = stdin.write_all(out.as_bytes()) {
                        warn!("listing not piped: {}", e);
                    }
                }
                if let Err(e) = child.wait() {
                    warn!("pipe: {}", e);
                }
            }
        }
    }
}

/// `pos` 以降のリダイレクト（`> file`、`>> file`、`| cmd`）を解釈して行から取り除く。
fn redirect(s: &mut Session, pos: usize) -> Result<Sink> {
    let chars = s.line.chars();
    let Some(op) = (pos..chars.len()).find(|&i| matches!(chars[i], '>' | '|')) else {
        if s.kbd {
            s.list_gap = ListGap::Start;
        }
        return Ok(Sink::Screen);
    };
    let pipe = chars[op] == '|';
    let append = !pipe && chars.get(op + 1) == Some(&'>');

    let arg = get_arg_unquoted(&mut s.line, op + 1 + usize::from(append));
    if arg.len == 0 {
        return Err(Error::Syntax);
    }
    let target = s.line.slice_string(arg.start..arg.end());
    let (action, opened) = if pipe {
        let child = Process::new("sh")
            .arg("-c")
            .arg(&target)
            .stdin(Stdio::piped())
            .spawn();
        (RedirectAction::Execute, child.map(Sink::Pipe))
    } else if append {
        let file = OpenOptions::new().append(true).create(true).open(&target);
        (RedirectAction::Open, file.map(Sink::File))
    } else {
        (RedirectAction::Create, File::create(&target).map(Sink::File))
    };
    let sink = opened.map_err(|source| Error::Redirect {
        action,
        target: target.clone(),
        source,
    })?;
    debug!("listing {} {:?}", action, target);

    let chars = s.line.chars();
    let end = skip_blank(chars, (arg.end() + 1).min(chars.len()));
    let mut beg = op;
    while beg > pos && is_blank(chars[beg - 1]) {
        beg -= 1;
    }
    s.line.remove(beg, end - beg);

    s.list_gap = if append { ListGap::Multi } else { ListGap::Start };
    Ok(sink)
}

/// 定義 1 つを `def<t>` 形式で書く。複数行マクロの前後には空行を入れる。
fn list_define(out: &mut String, gap: &mut ListGap, d: &Define, t: char) {
    let multi = d.is_multi_line();
    if *gap == ListGap::Multi || (*gap == ListGap::Single && multi) {
        out.push('\n');
    }
    out.push_str(&format!(
        "def{} {:<3}{}",
        t,
        d.name,
        if multi { '\n' } else { '\t' }
    ));
    for line in &d.lines {
        out.push_str(line);
        out.push('\n');
    }
    if multi {
        out.push_str(ENDM);
        out.push('\n');
        *gap = ListGap::Multi;
    } else {
        *gap = ListGap::Single;
    }
}

fn list_defines(s: &mut Session, pos: usize, t: char) -> String {
    let mut out = String::new();
    let gap = &mut s.list_gap;
    let list = if t == 'm' {
        &mut s.defs.macros
    } else {
        &mut s.defs.symbols
    };
    let names = words(s.line.chars(), pos);
    if names.is_empty() {
        for d in list.iter() {
            list_define(&mut out, gap, d, t);
        }
    } else {
        for name in names {
            if let Some(d) = list.find(&name) {
                list_define(&mut out, gap, d, t);
            }
        }
    }
    out
}

fn lsta(s: &mut Session, pos: usize) -> String {
    let mut out = String::new();
    let exts = words(s.line.chars(), pos);
    if exts.is_empty() {
        for d in s.defs.assocs.iter() {
            list_define(&mut out, &mut s.list_gap, d, 'a');
        }
        return out;
    }
    for ext in exts {
        let key: Vec<char> = ext.chars().collect();
        if let Some((_, a)) = s.defs.assocs.find_ext(&key) {
            out.push_str(&format!("defa {:<3}\t{}\n", ext, a.first_line()));
        }
    }
    out
}

/// `lsth`：全部、最新 N 行（この行を除く）、最初の N 行（`-N`）、または文字列を含む行。
/// 先頭の `"` は数字を文字列として扱わせる。
fn lsth(s: &mut Session, pos: usize) -> String {
    let entries: Vec<&str> = s.history.iter().collect();
    let mut out = String::new();
    let mut print = |e: &str| {
        out.push_str(e);
        out.push('\n');
    };

    let arg: Vec<char> = s.line.chars()[pos.min(s.line.len())..].to_vec();
    if arg.is_empty() {
        for e in &entries {
            print(*e);
        }
        return out;
    }

    let quoted = arg[0] == '"' && arg.len() > 1;
    let mut end = usize::from(quoted);
    let back = if arg.get(end) == Some(&'-') {
        end += 1;
        false
    } else {
        true
    };
    let mut cnt = 0usize;
    while let Some(d) = arg.get(end).and_then(|c| c.to_digit(10)) {
        cnt = cnt.saturating_mul(10).saturating_add(d as usize);
        end += 1;
    }
    let mut text_start = 0;
    if end != arg.len() {
        cnt = 0;
    } else if quoted {
        cnt = 0;
        text_start = 1;
    }

    if cnt > 0 {
        let start = if back {
            entries.len().saturating_sub(cnt + 1)
        } else {
            0
        };
        for e in entries[start..].iter().take(cnt) {
            print(*e);
        }
    } else {
        let needle: String = arg[text_start..].iter().collect::<String>().to_lowercase();
        let older = entries.len().saturating_sub(1);
        entries[..older]
            .iter()
            .filter(|e| e.to_lowercase().contains(&needle))
            .for_each(|e| print(*e));
    }
    out
}

fn lstk(s: &mut Session, pos: usize) -> String {
    let mut out = String::new();
    let keys = words(s.line.chars(), pos);
    if keys.is_empty() {
        for (i, group) in s.keymap.listing().iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            for &slot in group {
                out.push_str(&format!(
                    "defk {}\t{}\n",
                    slot.name(),
                    describe(s.keymap.get(slot))
                ));
            }
        }
        return out;
    }
    for key in keys {
        if let Some(slot) = KeySlot::parse(&key) {
            out.push_str(&format!("defk {:<3}\t{}\n", key, describe(s.keymap.get(slot))));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::keymap::KeyState;
    use crate::terminal::{BreakSignal, VirtualTerminal};
    use std::fs;
    use std::path::Path;

    fn setup() -> (Session, VirtualTerminal) {
        let brk = BreakSignal::new();
        let s = Session::new(Options::default(), brk.clone());
        (s, VirtualTerminal::new(60, 10, brk))
    }

    fn exec(s: &mut Session, t: &mut VirtualTerminal, line: &str) -> Option<Outcome> {
        s.line.set_str(line);
        internal_cmd(s, t)
    }

    fn fkey(number: u8) -> KeySlot {
        KeySlot::Function {
            number,
            state: KeyState::Plain,
        }
    }

    fn listed(s: &mut Session, t: &mut VirtualTerminal, cmd: &str, path: &Path) -> String {
        exec(s, t, &format!("{} > {}", cmd, path.display()));
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn not_internal_commands() {
        let (mut s, mut t) = setup();
        assert_eq!(exec(&mut s, &mut t, "ls -l"), None);
        assert_eq!(exec(&mut s, &mut t, "defsx a b"), None);
        assert_eq!(exec(&mut s, &mut t, ""), None);
        assert_eq!(exec(&mut s, &mut t, "  DEFS a b"), Some(Outcome::Done));
        assert!(s.defs.symbols.contains("a"));
    }

    #[test]
    fn break_is_internal_and_unwinds_macros() {
        let (mut s, mut t) = setup();
        s.brk.arm();
        s.brk.raise();
        s.macros.push(&['m'], vec!["a".into(), "b".into()]);
        assert_eq!(exec(&mut s, &mut t, "ls"), Some(Outcome::Done));
        assert!(s.macros.is_empty());
    }

    #[test]
    fn symbols_listed_most_recent_first() {
        let (mut s, mut t) = setup();
        let dir = tempfile::tempdir().unwrap();
        exec(&mut s, &mut t, "defs ll ls -l");
        exec(&mut s, &mut t, "defs x y");
        let out = listed(&mut s, &mut t, "lsts", &dir.path().join("out"));
        assert_eq!(out, "defs x  \ty\ndefs ll \tls -l\n");
        exec(&mut s, &mut t, "defs x");
        let out = listed(&mut s, &mut t, "lsts", &dir.path().join("out"));
        assert_eq!(out, "defs ll \tls -l\n");
    }

    #[test]
    fn multi_line_macros_are_separated() {
        let (mut s, mut t) = setup();
        let dir = tempfile::tempdir().unwrap();
        exec(&mut s, &mut t, "defm one echo 1");
        s.defs.define_macro("two", vec!["a".into(), "b".into()]);
        let out = listed(&mut s, &mut t, "lstm", &dir.path().join("out"));
        assert_eq!(out, "defm two\na\nb\nendm\n\ndefm one\techo 1\n");
    }

    #[test]
    fn append_starts_with_blank_line() {
        let (mut s, mut t) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        fs::write(&path, "old\n").unwrap();
        exec(&mut s, &mut t, "defs a b");
        exec(&mut s, &mut t, &format!("lsts >> {}", path.display()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n\ndefs a  \tb\n");
    }

    #[test]
    fn pipe_to_command() {
        let (mut s, mut t) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("piped");
        exec(&mut s, &mut t, "defs a b");
        exec(&mut s, &mut t, &format!("lsts | \"cat > {}\"", path.display()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "defs a  \tb\n");
    }

    #[test]
    fn redirect_errors() {
        let (mut s, mut t) = setup();
        exec(&mut s, &mut t, "lsts >");
        assert_eq!(t.row(0), "cmdread: syntax error.");
        exec(&mut s, &mut t, "lsts > /nonexistent/dir/out");
        assert_eq!(t.row(1), "cmdread: unable to create \"/nonexistent/dir/out\".");
    }

    #[test]
    fn defk_forms() {
        let (mut s, mut t) = setup();
        exec(&mut s, &mut t, "defk ^A EndLine");
        assert_eq!(
            s.keymap.get(KeySlot::Control { code: 1, shift: false }),
            &Binding::Function(Function::EndLine)
        );
        exec(&mut s, &mut t, "defk F2 =ls -l");
        assert_eq!(
            s.keymap.get(fkey(2)),
            &Binding::Macro(Macro::Text("ls -l".into()))
        );
        exec(&mut s, &mut t, "defk F3 \"ab\" Enter");
        assert_eq!(
            s.keymap.get(fkey(3)),
            &Binding::Macro(Macro::Steps(vec![
                Step::char('a'),
                Step::char('b'),
                Step::func(Function::Enter)
            ]))
        );
        exec(&mut s, &mut t, "defk F4 \"a\\\"b\"");
        assert_eq!(
            s.keymap.get(fkey(4)),
            &Binding::Macro(Macro::Steps(vec![
                Step::char('a'),
                Step::char('"'),
                Step::char('b')
            ]))
        );
        exec(&mut s, &mut t, "defk F2");
        assert_eq!(s.keymap.get(fkey(2)), &Binding::Ignore);
    }

    #[test]
    fn defk_diagnostics() {
        let (mut s, mut t) = setup();
        exec(&mut s, &mut t, "defk F5 Bogus");
        assert_eq!(t.row(0), "cmdread: unrecognised function: Bogus");
        assert_eq!(s.keymap.get(fkey(5)), &Binding::Ignore);
        exec(&mut s, &mut t, "defk XX Enter");
        assert_eq!(t.row(1), "cmdread: unrecognised key: XX");
    }

    #[test]
    fn lstk_lists_named_keys() {
        let (mut s, mut t) = setup();
        let dir = tempfile::tempdir().unwrap();
        exec(&mut s, &mut t, "defk F3 \"ab\" Enter");
        let out = listed(&mut s, &mut t, "lstk F3 F12", &dir.path().join("out"));
        assert_eq!(out, "defk F3 \t\"ab\" Enter \ndefk F12\tRecord\n");
        let all = listed(&mut s, &mut t, "lstk", &dir.path().join("all"));
        assert!(all.starts_with("defk  ^@\tIgnore\ndefk  ^A\tBegLine\n"));
        assert!(all.contains("\n\ndefk   PgUp\tFirstLine\n"));
        assert!(all.contains("defk   F12\tRecord\n"));
    }

    #[test]
    fn delk_resets_binding() {
        let (mut s, mut t) = setup();
        exec(&mut s, &mut t, "delk F12 ^A nokey");
        assert_eq!(s.keymap.get(fkey(12)), &Binding::Ignore);
        assert_eq!(
            s.keymap.get(KeySlot::Control { code: 1, shift: false }),
            &Binding::Ignore
        );
    }

    #[test]
    fn defm_single_line_and_capture() {
        let (mut s, mut t) = setup();
        exec(&mut s, &mut t, "defs m sym");
        assert_eq!(exec(&mut s, &mut t, "defm m echo %1"), Some(Outcome::Done));
        assert!(!s.defs.symbols.contains("m"));
        assert_eq!(s.defs.macros.find("m").unwrap().lines, vec!["echo %1"]);
        assert_eq!(
            exec(&mut s, &mut t, "defm multi"),
            Some(Outcome::Capture("multi".into()))
        );
        s.capturing = true;
        assert_eq!(exec(&mut s, &mut t, "defm other"), Some(Outcome::Done));
    }

    #[test]
    fn invalid_names() {
        let (mut s, mut t) = setup();
        exec(&mut s, &mut t, "defm a/b x");
        assert_eq!(t.row(0), "cmdread: invalid macro name: \"a/b\".");
        exec(&mut s, &mut t, "defs a<b x");
        assert_eq!(t.row(1), "cmdread: invalid symbol name: \"a<b\".");
        assert!(s.defs.macros.is_empty() && s.defs.symbols.is_empty());
    }

    #[test]
    fn finish_macro_empty_body_deletes() {
        let (mut s, _) = setup();
        s.defs.define_macro("m", vec!["x".into()]);
        finish_macro(&mut s, "m", Vec::new());
        assert!(!s.defs.macros.contains("m"));
        assert!(is_endm(&"  ENDM ".chars().collect::<Vec<_>>()));
        assert!(!is_endm(&"endmx".chars().collect::<Vec<_>>()));
    }

    #[test]
    fn associations() {
        let (mut s, mut t) = setup();
        let dir = tempfile::tempdir().unwrap();
        exec(&mut s, &mut t, "defa .c.h vim");
        exec(&mut s, &mut t, "dela .c");
        let out = listed(&mut s, &mut t, "lsta .h .c", &dir.path().join("out"));
        assert_eq!(out, "defa .h \tvim\n");
        exec(&mut s, &mut t, "defa .h less");
        let out = listed(&mut s, &mut t, "lsta", &dir.path().join("all"));
        assert_eq!(out, "defa .h \tless\n");
        exec(&mut s, &mut t, "rsta");
        assert!(s.defs.assocs.is_empty());
    }

    fn history_with(s: &mut Session, lines: &[&str]) {
        for l in lines {
            s.history.add(l);
        }
    }

    #[test]
    fn lsth_variants() {
        let (mut s, mut t) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        history_with(&mut s, &["abc", "xyz", "Abc2", "q5"]);
        let mut lsth = |arg: &str| {
            // 実行中の lsth 行は履歴の最後にある
            s.history.add("current");
            exec(&mut s, &mut t, &format!("lsth {} > {}", arg, path.display()));
            s.history.remove_last();
            fs::read_to_string(&path).unwrap()
        };
        assert_eq!(lsth("2"), "Abc2\nq5\n");
        assert_eq!(lsth("-2"), "abc\nxyz\n");
        assert_eq!(lsth("ab"), "abc\nAbc2\n");
        assert_eq!(lsth("\"5"), "q5\n");
        assert_eq!(lsth("9"), "abc\nxyz\nAbc2\nq5\ncurrent\n");
    }

    #[test]
    fn delh_removes_itself_and_matches() {
        let (mut s, mut t) = setup();
        history_with(&mut s, &["abc", "xyz", "ABD", "delh ab"]);
        exec(&mut s, &mut t, "delh ab");
        assert_eq!(s.history.iter().collect::<Vec<_>>(), vec!["xyz"]);
        history_with(&mut s, &["delh"]);
        exec(&mut s, &mut t, "delh");
        assert_eq!(s.history.iter().collect::<Vec<_>>(), vec!["xyz"]);
        exec(&mut s, &mut t, "rsth");
        assert!(s.history.is_empty());
    }

    #[test]
    fn keyboard_lines_are_unescaped() {
        let (mut s, mut t) = setup();
        s.kbd = true;
        exec(&mut s, &mut t, "defs a x^|y");
        assert_eq!(s.defs.symbols.find("a").unwrap().lines, vec!["x|y"]);
    }
}
