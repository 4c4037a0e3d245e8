//! 確定した行の展開。
//!
//! 行が確定してからホストシェルへ渡すまでに、次の書き換えを行う。
//!
//! | 処理 | 例 |
//! |------|----|
//! | 複数コマンドの分割 | `a^Sb` → `a`（`b` は次の読み取りで返す） |
//! | `@` 行の DOS 化 | `@ls -l/` → `ls /l` |
//! | ブレース展開 | `a{1,2}b,c` → `a1b,a2b,c` |
//! | 関連付け | `notes.txt` → `edit notes.txt` |
//! | シンボル | `ll /tmp` → `ls -l /tmp` |
//! | マクロ | 本体の各行を引数（`%0`..`%9`、`%*`、`%n*`）を埋めて 1 行ずつ返す |
//! | 変数 | `%name%` をシンボル（と環境変数）の値に置き換える |
//!
//! ## マクロのスタック
//!
//! マクロを展開すると、呼び出した行（引数）と本体の読み取り位置を持つフレームを積む。
//! 以降の読み取りはスタックの先頭フレームから 1 行ずつ取り出し、読み終えたフレームは外す。
//! マクロの行がさらにマクロを呼べばその上に積まれる。

use log::debug;

use crate::define::DefineList;
use crate::line::LineBuffer;
use crate::text::{
    self, get_arg, is_blank, is_quote, skip_blank, skip_nondelim, un_escape, ARG_ESCAPE,
    BRACE_ESCAPE, BRACE_STOP, BRACE_TERM, CMDSEP, ESCAPE, VARIABLE, VAR_ESCAPE,
};

// ── マクロのスタック ──────────────────────────────

/// 実行中のマクロ 1 つ。
#[derive(Debug, Clone)]
struct Frame {
    /// マクロを呼び出した行
    args: Vec<char>,
    lines: Vec<String>,
    next: usize,
}

/// 実行中のマクロのスタック。
#[derive(Debug, Clone, Default)]
pub struct MacroStack {
    frames: Vec<Frame>,
}

impl MacroStack {
    pub fn new() -> Self {
        MacroStack::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// 呼び出し行 `args` で本体 `lines` の実行を始める。
    pub fn push(&mut self, args: &[char], lines: Vec<String>) {
        self.frames.push(Frame {
            args: args.to_vec(),
            lines,
            next: 0,
        });
    }

    /// 先頭のフレームを外す。
    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// すべてのフレームを外す。
    pub fn clear(&mut self) {
        if !self.frames.is_empty() {
            debug!("unwinding {} macro frames", self.frames.len());
        }
        self.frames.clear();
    }

    /// 先頭のフレームの次の行を、引数を埋めて `line` に入れる。
    /// 読み終えたフレームは外す。スタックが空なら `false`。
    pub fn next_line(&mut self, line: &mut LineBuffer) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        let body = frame.lines.get(frame.next).cloned().unwrap_or_default();
        frame.next += 1;
        let args = if frame.next >= frame.lines.len() {
            self.frames.pop().map(|f| f.args).unwrap_or_default()
        } else {
            frame.args.clone()
        };
        line.set_str(&body);
        substitute_args(line, &args);
        true
    }
}

/// `args` の `n` 番目（0 はマクロ名）の引数。
fn nth_arg(args: &[char], n: usize) -> text::Arg {
    let mut arg = get_arg(args, 0);
    for _ in 0..n {
        arg = get_arg(args, arg.end());
    }
    arg
}

/// `%0`..`%9`、`%*`、`%n*` を呼び出し行の引数で置き換える。
fn substitute_args(line: &mut LineBuffer, args: &[char]) {
    let mut pos = 0;
    while pos < line.len() {
        let chars = line.chars();
        if chars[pos] == ESCAPE {
            pos += 2;
            continue;
        }
        let sel = chars.get(pos + 1).copied();
        let n = match sel {
            Some('*') if chars[pos] == VARIABLE => 1,
            Some(d @ '0'..='9') if chars[pos] == VARIABLE => d as usize - '0' as usize,
            _ => {
                pos += 1;
                continue;
            }
        };
        let mut var = 2;
        let mut rest = sel == Some('*');
        if !rest && chars.get(pos + 2) == Some(&'*') {
            var = 3;
            rest = true;
        }
        let arg = nth_arg(args, n);
        let end = if rest { args.len() } else { arg.end() };
        let value = &args[arg.start.min(end)..end];
        line.replace(pos, var, value);
        pos += value.len();
    }
    un_escape(line, Some(ARG_ESCAPE));
}

// ── 複数コマンドと DOS 化 ──────────────────────────────

/// 引用符・エスケープの外にある最初のコマンド区切りで行を切り、残りを返す。
///
/// 区切りが行末にあれば空の残りを返す（空行が 1 つ続く）。
pub fn multi_cmd(line: &mut LineBuffer) -> Option<Vec<char>> {
    if !line.chars().contains(&CMDSEP) {
        return None;
    }
    let mut quote = false;
    let mut pos = 0;
    while pos < line.len() {
        let c = line.chars()[pos];
        if quote {
            if c == '"' {
                quote = false;
            }
        } else if c == '"' {
            quote = true;
        } else if c == ESCAPE {
            pos += 1;
        } else if c == CMDSEP {
            let rest = line.chars()[pos + 1..].to_vec();
            line.truncate(pos);
            return Some(rest);
        }
        pos += 1;
    }
    None
}

/// `/` を `\` に、空白の後の `-` を `/` にする。引数の末尾の区切りは空白にする。
pub fn dosify(line: &mut LineBuffer) {
    for pos in 0..line.len() {
        let chars = line.chars();
        let c = chars[pos];
        let new = if c == '/' || c == '\\' {
            let at_end = chars.get(pos + 1).map_or(true, |&n| is_blank(n));
            if at_end && pos > 0 && chars[pos - 1] != ':' && !is_blank(chars[pos - 1]) {
                ' '
            } else {
                '\\'
            }
        } else if c == '-' && pos > 0 && is_blank(chars[pos - 1]) {
            '/'
        } else {
            continue;
        };
        if new != c {
            line.replace(pos, 1, &[new]);
        }
    }
}

// ── ブレース展開 ──────────────────────────────

/// 最初のブレースを 1 つ展開する。展開したら `true`。
///
/// ブレースの前（区切り文字の直後から）と後（次の区切り文字まで）を各項目に複製し、
/// 項目は前の区切り文字でつなぐ。前の区切りが空白なら後ろの区切りを使う。
/// ブレース内には深さ 1 のカンマが少なくとも 1 つ必要。
pub fn brace_expansion(line: &mut LineBuffer) -> bool {
    let mut pos = 0;
    let mut prepos = 0;
    let mut prelen;
    let mut postpos;
    let mut term = ' ';
    let mut quote = false;
    let mut comma = false;
    let mut count: i32;
    let mut q1;

    loop {
        let chars = line.chars();
        let len = chars.len();
        if !chars[pos.min(len)..].contains(&'{') {
            return false;
        }

        // 開きブレースと前置部分の開始位置
        while pos < len {
            if is_quote(chars, pos) {
                quote = !quote;
            }
            let c = chars[pos];
            if c == ESCAPE {
                pos += 1;
            } else if c == '{' {
                break;
            } else if !quote {
                if BRACE_TERM.contains(c) {
                    term = c;
                    prepos = pos + 1;
                } else if BRACE_STOP.contains(c) {
                    prepos = pos + 1;
                }
            }
            pos += 1;
        }
        if pos >= len {
            return false;
        }
        prelen = pos - prepos;

        // 閉じブレース（項目が 2 つ以上あるか）
        q1 = false;
        count = 1;
        pos += 1;
        postpos = pos;
        while postpos < len {
            let c = chars[postpos];
            if q1 {
                if is_quote(chars, postpos) {
                    q1 = false;
                }
            } else if is_quote(chars, postpos) {
                // 前置部分が引用符の中なら項目に引用符は置けない
                if quote {
                    return false;
                }
                q1 = true;
            } else if c == ESCAPE {
                postpos += 1;
            } else if c == '{' {
                count += 1;
            } else if c == '}' {
                count -= 1;
                if count == 0 {
                    break;
                }
            } else if c == ',' && count == 1 {
                comma = true;
            }
            postpos += 1;
        }
        if count != 0 {
            return false;
        }
        if comma {
            break;
        }
    }

    // 後置部分の終わり
    let chars = line.chars();
    let len = chars.len();
    postpos += 1;
    let mut end = postpos;
    while end < len {
        let c = chars[end];
        if count > 0 {
            if q1 {
                if is_quote(chars, end) {
                    q1 = false;
                }
            } else if is_quote(chars, end) {
                q1 = true;
            } else if c == ESCAPE {
                end += 1;
            } else if c == '{' {
                count += 1;
            } else if c == '}' {
                count -= 1;
            }
        } else {
            if is_quote(chars, end) {
                quote = !quote;
            }
            if c == ESCAPE {
                end += 1;
            } else if c == '{' {
                count += 1;
            } else if !quote {
                if BRACE_TERM.contains(c) {
                    if term == ' ' {
                        term = c;
                    }
                    break;
                }
                if BRACE_STOP.contains(c) {
                    break;
                }
            }
        }
        end += 1;
    }
    if quote || count != 0 {
        return false;
    }
    let end = end.clamp(postpos.min(len), len);
    let mut pend: Vec<char> = chars[postpos.min(len)..end].to_vec();
    pend.push(term);
    let prepend: Vec<char> = chars[prepos..prepos + prelen].to_vec();

    // 開きブレースを消すと最初の項目の前置部分ができる
    let mut pos = prepos + prelen;
    line.remove(pos, 1);
    let mut count = 0i32;
    let mut quote = false;
    while count >= 0 {
        if pos >= line.len() {
            return true;
        }
        let chars = line.chars();
        let c = chars[pos];
        if quote {
            if is_quote(chars, pos) {
                quote = false;
            }
        } else if is_quote(chars, pos) {
            quote = true;
        } else if c == ESCAPE {
            pos += 1;
        } else if c == '{' {
            count += 1;
        } else if c == '}' {
            count -= 1;
        } else if c == ',' && count == 0 {
            line.replace(pos, 1, &pend);
            line.insert(pos + pend.len(), &prepend);
            pos += pend.len() + prepend.len() - 1;
        }
        pos += 1;
    }
    // 閉じブレースを消すと最後の項目の後置部分ができる
    line.remove(pos - 1, 1);
    true
}

/// ブレースがなくなるまで展開し、エスケープを外す。
pub fn expand_braces(line: &mut LineBuffer) {
    while brace_expansion(line) {}
    un_escape(line, Some(BRACE_ESCAPE));
}

// ── 関連付け・シンボル・マクロ ──────────────────────────────

/// 最初の単語の拡張子（または末尾の区切り）に関連付けがあれば、その定義を行頭に挿入する。
///
/// 単語の末尾の `=` は別の関連付け（`.ext=`）を選び、単語からは取り除く。
pub fn associate(line: &mut LineBuffer, assocs: &mut DefineList) -> bool {
    let arg = text::get_arg_unquoted(line, 0);
    if arg.len == 0 {
        return false;
    }
    let beg = arg.start;
    let mut cnt = arg.len;
    let mut ext = beg + cnt - 1;
    let mut alt = false;
    if cnt > 1 && line.char_at(ext) == Some('=') {
        alt = true;
        ext -= 1;
        cnt -= 1;
    }

    let chars = line.chars();
    let last = chars[ext];
    let value = if last == '/' || last == '\\' {
        let key = if alt { "\\=" } else { "\\" };
        let Some(assoc) = assocs.find(key) else {
            return false;
        };
        let value = assoc.first_line().to_string();
        if cnt > 1 && chars[ext - 1] != ':' {
            // 区切りと `=` をまとめて消す
            line.remove(ext, 1 + usize::from(alt));
            alt = false;
        }
        cnt = 1;
        value
    } else if last == '.' && (ext == beg || chars[ext - 1] == '.') {
        return false;
    } else {
        cnt = 1;
        while chars[ext] != '.' {
            if ext == beg || matches!(chars[ext], '/' | '\\' | ':') {
                return false;
            }
            cnt += 1;
            ext -= 1;
        }
        let mut key = chars[ext..ext + cnt].to_vec();
        if alt {
            key.push('=');
        }
        let Some((_, assoc)) = assocs.find_ext(&key) else {
            return false;
        };
        assoc.first_line().to_string()
    };

    if alt {
        line.remove(ext + cnt, 1);
    }
    debug!("association: {:?}", value);
    let n = line.insert_str(0, &value);
    line.insert(n, &[' ']);
    true
}

/// 最初の単語の名前の範囲。
fn first_name(line: &LineBuffer) -> (usize, usize, String) {
    let chars = line.chars();
    let start = skip_blank(chars, 0);
    let end = skip_nondelim(chars, start);
    (start, end, chars[start..end].iter().collect())
}

/// 最初の単語がシンボルなら値に置き換える。
pub fn expand_symbol(line: &mut LineBuffer, symbols: &mut DefineList) -> bool {
    let (start, end, name) = first_name(line);
    if name.is_empty() {
        return false;
    }
    let Some(sym) = symbols.find(&name) else {
        return false;
    };
    let value: Vec<char> = sym.first_line().chars().collect();
    // 区切り文字が続いていれば空白を挟む
    let sp = line.char_at(end).is_some_and(|c| !is_blank(c));
    line.replace(start, end - start, &value);
    if sp {
        line.insert(start + value.len(), &[' ']);
    }
    true
}

/// 最初の単語がマクロなら、スタックに積んで最初の行を `line` に入れる。
pub fn expand_macro(line: &mut LineBuffer, macros: &mut DefineList, stack: &mut MacroStack) -> bool {
    let (_, _, name) = first_name(line);
    if name.is_empty() {
        return false;
    }
    let Some(mac) = macros.find(&name) else {
        return false;
    };
    debug!("expanding macro {} ({} lines)", mac.name, mac.lines.len());
    stack.push(line.chars(), mac.lines.clone());
    stack.next_line(line)
}

// ── 変数 ──────────────────────────────

fn lookup_env(name: &str) -> Option<String> {
    if name.is_empty() || name.contains(['=', '\0']) {
        return None;
    }
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// `%name%` を置き換える。`env` なら環境変数を先に、次にシンボルを引く。
///
/// 置き換えた後は置き換えた値の中から走査を続け、見つからなかった名前は
/// 閉じ側の `%` を次の名前の開始として扱う（`%a%sym%` の `sym` は展開される）。
pub fn expand_vars(line: &mut LineBuffer, symbols: &mut DefineList, env: bool) {
    let mut start: Option<usize> = None;
    let mut pos = 0;
    while pos < line.len() {
        let c = line.chars()[pos];
        if c == ESCAPE {
            pos += 2;
            continue;
        }
        if c == VARIABLE {
            match start {
                None => start = Some(pos + 1),
                Some(s) => {
                    let name: String = line.chars()[s..pos].iter().collect();
                    let value = env
                        .then(|| lookup_env(&name))
                        .flatten()
                        .or_else(|| {
                            (!name.is_empty())
                                .then(|| symbols.find(&name).map(|d| d.first_line().to_string()))
                                .flatten()
                        })
                        .filter(|v| !v.is_empty());
                    match value {
                        Some(v) => {
                            let v: Vec<char> = v.chars().collect();
                            line.replace(s - 1, pos - s + 2, &v);
                            start = None;
                        }
                        None => start = Some(pos + 1),
                    }
                }
            }
        }
        pos += 1;
    }
    un_escape(line, Some(VAR_ESCAPE));
}
