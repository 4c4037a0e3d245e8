//! ワイルドカード照合: `*`, `?`, `[...]` によるファイル名マッチング。
//!
//! ## 対応パターン
//!
//! - `*`: 0 文字以上の任意の文字にマッチ
//! - `?`: 任意の 1 文字にマッチ
//! - `[abc]`: 文字クラス（列挙された任意の 1 文字にマッチ）
//! - `[a-z]`: 範囲指定
//! - `[!...]` / `[^...]`: 否定文字クラス
//!
//! 照合は大文字小文字を区別しない。閉じられていない `[` はリテラルとして扱う。
//! 補完が呼び出し側で `*` を付け足すため、入力にワイルドカードがあるかは
//! [`has_wildcards`] で `*` と `?` だけを見る。

use crate::text::eq_ignore_case;

/// 入力にワイルドカード（`*`, `?`）が含まれるか判定する。
pub fn has_wildcards(s: &[char]) -> bool {
    s.iter().any(|&c| c == '*' || c == '?')
}

/// パターン文字列とファイル名を照合する。
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let nam: Vec<char> = name.chars().collect();
    matches_recursive(&pat, 0, &nam, 0)
}

fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// `[` から始まる文字クラスを照合する。閉じ括弧がなければ `None`。
/// 一致すれば `Some((一致したか, クラス直後の位置))`。
fn match_class(pat: &[char], mut pi: usize, ch: char) -> Option<(bool, usize)> {
    pi += 1; // '['
    let negate = pi < pat.len() && (pat[pi] == '!' || pat[pi] == '^');
    if negate {
        pi += 1;
    }
    let ch = lower(ch);
    let mut matched = false;
    // `]` を文字クラスの最初に置ける
    let mut first = true;
    while pi < pat.len() && (pat[pi] != ']' || first) {
        first = false;
        if pi + 2 < pat.len() && pat[pi + 1] == '-' && pat[pi + 2] != ']' {
            let lo = lower(pat[pi]);
            let hi = lower(pat[pi + 2]);
            if (lo <= ch && ch <= hi) || (hi <= ch && ch <= lo) {
                matched = true;
            }
            pi += 3;
        } else {
            if lower(pat[pi]) == ch {
                matched = true;
            }
            pi += 1;
        }
    }
    if pi >= pat.len() {
        return None;
    }
    Some((matched != negate, pi + 1))
}

fn matches_recursive(pat: &[char], pi: usize, nam: &[char], ni: usize) -> bool {
    let plen = pat.len();
    let nlen = nam.len();

    let mut pi = pi;
    let mut ni = ni;

    while pi < plen {
        match pat[pi] {
            '*' => {
                // 連続する * をスキップ
                while pi < plen && pat[pi] == '*' {
                    pi += 1;
                }
                if pi == plen {
                    return true;
                }
                // 残りのパターンを name の全接尾辞と照合
                return (ni..=nlen).any(|start| matches_recursive(pat, pi, nam, start));
            }
            '?' => {
                if ni >= nlen {
                    return false;
                }
                pi += 1;
                ni += 1;
            }
            '[' => {
                if ni >= nlen {
                    return false;
                }
                match match_class(pat, pi, nam[ni]) {
                    Some((true, next)) => {
                        pi = next;
                        ni += 1;
                    }
                    Some((false, _)) => return false,
                    None => {
                        if nam[ni] != '[' {
                            return false;
                        }
                        pi += 1;
                        ni += 1;
                    }
                }
            }
            ch => {
                if ni >= nlen || !eq_ignore_case(nam[ni], ch) {
                    return false;
                }
                pi += 1;
                ni += 1;
            }
        }
    }

    ni == nlen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn pattern_star_suffix() {
        assert!(matches_pattern("*.txt", "hello.txt"));
        assert!(!matches_pattern("*.txt", "hello.rs"));
    }

    #[test]
    fn pattern_ignores_case() {
        assert!(matches_pattern("*.TXT", "hello.txt"));
        assert!(matches_pattern("Foo*", "foobar"));
    }

    #[test]
    fn pattern_question_mark() {
        assert!(matches_pattern("h?llo", "hello"));
        assert!(!matches_pattern("h?llo", "hllo"));
    }

    #[test]
    fn pattern_star_in_middle() {
        assert!(matches_pattern("foo*bar", "foobazbar"));
        assert!(matches_pattern("foo*bar", "foobar"));
        assert!(!matches_pattern("foo*bar", "foobaz"));
    }

    #[test]
    fn pattern_empty() {
        assert!(matches_pattern("", ""));
        assert!(!matches_pattern("", "a"));
        assert!(matches_pattern("*", ""));
    }

    #[test]
    fn pattern_multiple_stars() {
        assert!(matches_pattern("*.*", "foo.bar"));
        assert!(!matches_pattern("*.*", "foobar"));
    }

    #[test]
    fn wildcards_detected() {
        assert!(has_wildcards(&chars("*.txt")));
        assert!(has_wildcards(&chars("h?llo")));
        assert!(!has_wildcards(&chars("[abc]")));
        assert!(!has_wildcards(&chars("path/to/file.txt")));
    }

    #[test]
    fn bracket_char_list() {
        assert!(matches_pattern("[abc]", "b"));
        assert!(matches_pattern("[abc]", "B"));
        assert!(!matches_pattern("[abc]", "d"));
    }

    #[test]
    fn bracket_range() {
        assert!(matches_pattern("file[0-9].txt", "file3.txt"));
        assert!(!matches_pattern("file[0-9].txt", "filea.txt"));
        assert!(matches_pattern("[a-z]*", "Hello"));
    }

    #[test]
    fn bracket_negate() {
        assert!(!matches_pattern("[!abc]", "a"));
        assert!(matches_pattern("[!abc]", "d"));
        assert!(matches_pattern("[^0-9]", "x"));
        assert!(!matches_pattern("[^0-9]", "5"));
    }

    #[test]
    fn unclosed_bracket_is_literal() {
        assert!(matches_pattern("a[1*", "a[12"));
        assert!(!matches_pattern("a[1*", "ab1"));
    }
}
