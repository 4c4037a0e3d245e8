//! 行テキストの走査ユーティリティ。
//!
//! 空白・区切り文字のスキップ、引用符の判定、引数の切り出し、エスケープ文字の除去など、
//! エディタ・展開処理・内部コマンドで共有する低水準の操作をまとめる。
//!
//! | 文字 | 意味 |
//! |------|------|
//! | `^`  | 次の 1 文字をリテラルとして扱う |
//! | `"`  | 引用符。直前のバックスラッシュが奇数個ならリテラル |
//! | `%`  | シンボル・環境変数・マクロ引数の参照 |

use crate::line::LineBuffer;

/// 次の 1 文字をリテラルとして扱うエスケープ文字。
pub const ESCAPE: char = '^';
/// 複数コマンドの区切り（Ctrl+S）。
pub const CMDSEP: char = '\u{13}';
/// シンボル・変数参照の区切り。
pub const VARIABLE: char = '%';

/// 名前の終端とみなす文字（マクロ・シンボル名）。
pub const DEF_TERM: &str = " \t<|>/";
/// ファイル名の一部とみなさない文字（補完対象の開始位置を決める）。
pub const INVALID_FNAME: &str = "=,;+<|>&@";
/// 含まれていたらファイル名を引用符で囲む文字。
pub const QUOTE_FNAME: &str = " &()[]{}^=;!%'+,`~";
/// ブレース展開の区切り。
pub const BRACE_TERM: &str = " \t,;+";
/// ブレース展開の打ち切り。
pub const BRACE_STOP: &str = "<|>&";
/// ブレース展開後にエスケープを外す文字。
pub const BRACE_ESCAPE: &str = "{},^";
/// 変数展開後にエスケープを外す文字。
pub const VAR_ESCAPE: &str = "%^";
/// マクロ引数展開後にエスケープを外す文字。
pub const ARG_ESCAPE: &str = "%*^";

pub fn is_blank(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

/// 大文字小文字を無視して 2 文字を比較する。
pub fn eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// 大文字小文字を無視して文字列を比較する。
pub fn str_eq_ignore_case(a: &[char], b: &[char]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| eq_ignore_case(*x, *y))
}

/// `text` が `prefix` で始まるか（大文字小文字無視）。
pub fn starts_with_ignore_case(text: &str, prefix: &[char]) -> bool {
    let mut chars = text.chars();
    prefix
        .iter()
        .all(|p| chars.next().is_some_and(|c| eq_ignore_case(c, *p)))
}

/// ソート用の大文字小文字無視比較。
pub fn cmp_ignore_case(a: &str, b: &str) -> std::cmp::Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

// ── 走査 ──────────────────────────────

pub fn skip_blank(line: &[char], mut pos: usize) -> usize {
    while pos < line.len() && is_blank(line[pos]) {
        pos += 1;
    }
    pos
}

pub fn skip_nonblank(line: &[char], mut pos: usize) -> usize {
    while pos < line.len() && !is_blank(line[pos]) {
        pos += 1;
    }
    pos
}

/// `pos` から名前の区切り文字までを飛ばす。
pub fn skip_nondelim(line: &[char], mut pos: usize) -> usize {
    while pos < line.len() && !DEF_TERM.contains(line[pos]) {
        pos += 1;
    }
    pos
}

/// `pos` が引用符の開始・終了かどうか。
/// 直前のバックスラッシュが奇数個ならリテラルの `"` とみなす。
pub fn is_quote(line: &[char], pos: usize) -> bool {
    if line.get(pos) != Some(&'"') {
        return false;
    }
    let backslashes = line[..pos].iter().rev().take_while(|&&c| c == '\\').count();
    backslashes % 2 == 0
}

/// 文字列に引用符が必要な文字が含まれているか。
pub fn quote_needed(text: &[char]) -> bool {
    text.iter().any(|c| QUOTE_FNAME.contains(*c))
}

// ── 引数の切り出し ──────────────────────────────

/// 切り出した引数の範囲。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arg {
    pub start: usize,
    pub len: usize,
    /// 引数に引用符が含まれていたか
    pub found_quote: bool,
}

impl Arg {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// `pos` 以降の次の引数を、引用符を含めたまま切り出す。
pub fn get_arg(line: &[char], pos: usize) -> Arg {
    let start = skip_blank(line, pos);
    let mut quote = false;
    let mut found_quote = false;
    let mut pos = start;
    while pos < line.len() {
        if is_quote(line, pos) {
            quote = !quote;
            found_quote = true;
        } else if !quote && is_blank(line[pos]) {
            break;
        }
        pos += 1;
    }
    Arg {
        start,
        len: pos - start,
        found_quote,
    }
}

/// `pos` 以降の次の引数を切り出し、引数内の引用符を両端へ寄せる。
///
/// `a"b c"d` は `"ab cd"` に書き換えられ、返す範囲は引用符の内側になる。
/// 閉じ引用符がなければ行末までが引数。
pub fn get_arg_unquoted(line: &mut LineBuffer, pos: usize) -> Arg {
    let start0 = skip_blank(line.chars(), pos);
    let mut start = start0;
    let mut found_quote = false;
    let mut quote = false;
    let mut open_done = false;
    let mut close: Option<usize> = None;
    let mut pos = start0;

    while pos < line.len() {
        if quote {
            if is_quote(line.chars(), pos) {
                quote = false;
                if let Some(c) = close {
                    line.remove(c, 1);
                    pos -= 1;
                }
                close = Some(pos);
            }
        } else if is_quote(line.chars(), pos) {
            found_quote = true;
            quote = true;
            if open_done {
                line.remove(pos, 1);
                continue;
            }
            open_done = true;
            if pos != start0 {
                line.rotate_right(start0..pos + 1);
            }
        } else if is_blank(line.chars()[pos]) {
            break;
        }
        pos += 1;
    }

    if open_done {
        start += 1;
    }
    if let Some(c) = close {
        pos -= 1;
        if c != pos {
            line.rotate_left(c..pos + 1);
        }
    }
    Arg {
        start,
        len: pos.saturating_sub(start),
        found_quote,
    }
}

// ── エスケープの除去 ──────────────────────────────

/// エスケープ文字を取り除く。
///
/// `only` が `None` なら引用符の外にあるすべてのエスケープを外す。
/// `Some(set)` なら引用符の内側で、`set` に含まれる文字の直前にあるものだけを外す
/// （引用符の外はホストシェルに任せる）。
pub fn un_escape(line: &mut LineBuffer, only: Option<&str>) {
    if !line.chars().contains(&ESCAPE) {
        return;
    }
    let mut quote = false;
    let mut pos = 0;
    while pos < line.len() {
        let chars = line.chars();
        let escaped_next = chars[pos] == ESCAPE && pos + 1 < chars.len();
        if quote {
            if is_quote(chars, pos) {
                quote = false;
            } else if let Some(set) = only {
                if escaped_next && set.contains(chars[pos + 1]) {
                    line.remove(pos, 1);
                }
            }
        } else if is_quote(chars, pos) {
            quote = true;
        } else if only.is_none() && escaped_next {
            line.remove(pos, 1);
        }
        pos += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(s: &str) -> LineBuffer {
        let mut line = LineBuffer::new(256);
        line.set_str(s);
        line
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn quote_with_backslashes() {
        let s = chars(r#"a"b\"c\\"d"#);
        assert!(is_quote(&s, 1));
        assert!(!is_quote(&s, 4));
        assert!(is_quote(&s, 8));
        assert!(!is_quote(&s, 0));
    }

    #[test]
    fn skips() {
        let s = chars("  abc def/x");
        assert_eq!(skip_blank(&s, 0), 2);
        assert_eq!(skip_nonblank(&s, 2), 5);
        assert_eq!(skip_nondelim(&s, 6), 9);
    }

    #[test]
    fn arg_keeps_quotes() {
        let s = chars(r#"  cmd "a b" c"#);
        let a = get_arg(&s, 0);
        assert_eq!((a.start, a.len), (2, 3));
        let b = get_arg(&s, a.end());
        assert_eq!((b.start, b.len), (6, 5));
        assert!(b.found_quote);
    }

    #[test]
    fn arg_unquoted_moves_quotes_outward() {
        let mut line = buf(r#"a"b c"d e"#);
        let a = get_arg_unquoted(&mut line, 0);
        assert_eq!(line.as_string(), r#""ab cd" e"#);
        assert_eq!(line.slice_string(a.start..a.end()), "ab cd");
        assert!(a.found_quote);
    }

    #[test]
    fn arg_unquoted_merges_pieces() {
        let mut line = buf(r#""a"b"c" x"#);
        let a = get_arg_unquoted(&mut line, 0);
        assert_eq!(line.as_string(), r#""abc" x"#);
        assert_eq!(line.slice_string(a.start..a.end()), "abc");
    }

    #[test]
    fn arg_unquoted_unterminated() {
        let mut line = buf(r#""abc def"#);
        let a = get_arg_unquoted(&mut line, 0);
        assert_eq!(line.slice_string(a.start..a.end()), "abc def");
    }

    #[test]
    fn un_escape_outside_quotes() {
        let mut line = buf(r#"a^b "c^d" ^^"#);
        un_escape(&mut line, None);
        assert_eq!(line.as_string(), r#"ab "c^d" ^"#);
    }

    #[test]
    fn un_escape_selected_inside_quotes() {
        let mut line = buf(r#"^% "^%x^y""#);
        un_escape(&mut line, Some(VAR_ESCAPE));
        assert_eq!(line.as_string(), r#"^% "%x^y""#);
    }

    #[test]
    fn case_insensitive_helpers() {
        assert!(starts_with_ignore_case("DIR /w", &chars("di")));
        assert!(!starts_with_ignore_case("d", &chars("di")));
        assert!(str_eq_ignore_case(&chars("Abc"), &chars("aBC")));
        assert_eq!(cmp_ignore_case("abc", "ABD"), std::cmp::Ordering::Less);
    }

    #[test]
    fn quote_needed_chars() {
        assert!(quote_needed(&chars("my file")));
        assert!(quote_needed(&chars("a&b")));
        assert!(!quote_needed(&chars("plain.txt")));
    }
}
