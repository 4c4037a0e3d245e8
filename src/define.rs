//! 定義ストア（シンボル・マクロ・関連付け）。
//!
//! 3 種類の定義はいずれも「名前 → 行のリスト」で、名前は大文字小文字を区別しない。
//! 検索で見つかった定義はリストの先頭へ移動する（最近使ったものが先頭）。
//!
//! | 種類 | 名前 | 内容 |
//! |------|------|------|
//! | シンボル | 単語 | 1 行 |
//! | マクロ | 単語 | 1 行以上 |
//! | 関連付け | 拡張子リスト（`.c.h`、`.c;.h`）、`\` はディレクトリ | 1 行 |
//!
//! シンボルとマクロは同じ名前を共有できない。片方を定義するともう片方は消える。

use crate::text;

/// 1 つの定義。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub lines: Vec<String>,
}

impl Define {
    pub fn is_multi_line(&self) -> bool {
        self.lines.len() > 1
    }

    /// 最初の行。空の定義なら空文字列。
    pub fn first_line(&self) -> &str {
        self.lines.first().map_or("", String::as_str)
    }
}

/// 先頭が最近使われた定義になるリスト。
#[derive(Debug, Clone, Default)]
pub struct DefineList {
    entries: Vec<Define>,
}

impl DefineList {
    pub fn new() -> Self {
        DefineList::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Define> {
        self.entries.iter()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name: Vec<char> = name.chars().collect();
        self.entries.iter().position(|d| {
            let dn: Vec<char> = d.name.chars().collect();
            text::str_eq_ignore_case(&dn, &name)
        })
    }

    fn promote(&mut self, idx: usize) -> &mut Define {
        if idx != 0 {
            let d = self.entries.remove(idx);
            self.entries.insert(0, d);
        }
        &mut self.entries[0]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// 名前で検索し、見つかれば先頭へ移動して返す。
    pub fn find(&mut self, name: &str) -> Option<&mut Define> {
        let idx = self.position(name)?;
        Some(self.promote(idx))
    }

    /// 先頭に新しい定義を追加する。
    pub fn add(&mut self, name: &str, lines: Vec<String>) -> &mut Define {
        self.entries.insert(
            0,
            Define {
                name: name.to_string(),
                lines,
            },
        );
        &mut self.entries[0]
    }

    /// 名前で削除する。
    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn front_mut(&mut self) -> Option<&mut Define> {
        self.entries.first_mut()
    }

    pub fn remove_front(&mut self) -> Option<Define> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 拡張子 `ext`（ドット付き）を含む関連付けを探す。
    /// 見つかれば先頭へ移動し、拡張子リスト内での位置とともに返す。
    pub fn find_ext(&mut self, ext: &[char]) -> Option<(usize, &mut Define)> {
        let (idx, at) = self
            .entries
            .iter()
            .enumerate()
            .find_map(|(i, d)| match_ext(ext, &d.name).map(|at| (i, at)))?;
        Some((at, self.promote(idx)))
    }
}

/// `ext` が拡張子リスト `list` の要素に一致すれば、その要素の開始位置を返す。
///
/// リストはドット付きの拡張子を連ねたもので、`;` や `:` で区切ってもよい
/// （`.exe.com`、`.exe;.com`、`.exe:.com`）。
pub fn match_ext(ext: &[char], list: &str) -> Option<usize> {
    let list: Vec<char> = list.chars().collect();
    let len = list.len();
    let mut pos = 0;
    while pos < len {
        let mut end = pos + 1;
        while end < len && !matches!(list[end], '.' | ';' | ':') {
            end += 1;
        }
        if text::str_eq_ignore_case(&list[pos..end], ext) {
            return Some(pos);
        }
        if end == len {
            break;
        }
        if list[end] != '.' {
            end += 1;
        }
        pos = end;
    }
    None
}

/// シンボル・マクロ・関連付けの 3 つのストア。
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    pub symbols: DefineList,
    pub macros: DefineList,
    pub assocs: DefineList,
}

impl Definitions {
    pub fn new() -> Self {
        Definitions::default()
    }

    /// シンボルを定義する。空の値なら削除する。同名のマクロは消える。
    pub fn define_symbol(&mut self, name: &str, value: &str) {
        self.macros.remove(name);
        if value.is_empty() {
            self.symbols.remove(name);
            return;
        }
        match self.symbols.find(name) {
            Some(sym) => sym.lines = vec![value.to_string()],
            None => {
                self.symbols.add(name, vec![value.to_string()]);
            }
        }
    }

    /// マクロを定義（または本体を空に）する。同名のシンボルは消える。
    pub fn define_macro(&mut self, name: &str, lines: Vec<String>) {
        self.symbols.remove(name);
        match self.macros.find(name) {
            Some(mac) => mac.lines = lines,
            None => {
                self.macros.add(name, lines);
            }
        }
    }

    /// 関連付けを削除する。完全一致がなければリスト内の 1 拡張子だけを取り除く。
    pub fn delete_assoc(&mut self, name: &str) {
        if self.assocs.remove(name) {
            return;
        }
        let ext: Vec<char> = name.chars().collect();
        let Some((at, assoc)) = self.assocs.find_ext(&ext) else {
            return;
        };
        let mut list: Vec<char> = assoc.name.chars().collect();
        if list.len() == ext.len() {
            self.assocs.remove_front();
            return;
        }
        let mut cnt = ext.len();
        if at + cnt < list.len() && matches!(list[at + cnt], ';' | ':') {
            cnt += 1;
        }
        list.drain(at..at + cnt);
        assoc.name = list.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn names(list: &DefineList) -> Vec<&str> {
        list.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn find_is_case_insensitive_and_promotes() {
        let mut list = DefineList::new();
        list.add("one", vec!["1".into()]);
        list.add("two", vec!["2".into()]);
        assert_eq!(names(&list), vec!["two", "one"]);
        assert_eq!(list.find("ONE").map(|d| d.first_line().to_string()), Some("1".into()));
        assert_eq!(names(&list), vec!["one", "two"]);
        assert!(list.find("three").is_none());
    }

    #[test]
    fn match_ext_lists() {
        assert_eq!(match_ext(&chars(".com"), ".exe.com.bat"), Some(4));
        assert_eq!(match_ext(&chars(".COM"), ".exe;.com"), Some(5));
        assert_eq!(match_ext(&chars(".c"), ".cpp.h"), None);
        assert_eq!(match_ext(&chars(".h"), ".c:.h"), Some(3));
        assert_eq!(match_ext(&chars(".c="), ".c="), Some(0));
    }

    #[test]
    fn symbol_and_macro_are_exclusive() {
        let mut defs = Definitions::new();
        defs.define_macro("x", vec!["echo macro".into()]);
        defs.define_symbol("X", "sym");
        assert!(!defs.macros.contains("x"));
        assert!(defs.symbols.contains("x"));
        defs.define_macro("x", vec!["again".into()]);
        assert!(!defs.symbols.contains("x"));
        assert!(defs.macros.contains("x"));
    }

    #[test]
    fn empty_symbol_value_deletes() {
        let mut defs = Definitions::new();
        defs.define_symbol("s", "v");
        defs.define_symbol("s", "");
        assert!(defs.symbols.is_empty());
    }

    #[test]
    fn delete_assoc_exact_and_partial() {
        let mut defs = Definitions::new();
        defs.assocs.add(".c;.h", vec!["edit".into()]);
        defs.assocs.add(".txt", vec!["view".into()]);
        defs.delete_assoc(".c");
        assert_eq!(names(&defs.assocs), vec![".h", ".txt"]);
        defs.delete_assoc(".TXT");
        assert_eq!(names(&defs.assocs), vec![".h"]);
        defs.delete_assoc(".h");
        assert!(defs.assocs.is_empty());
    }

    #[test]
    fn find_ext_promotes() {
        let mut list = DefineList::new();
        list.add(".c.h", vec!["cc".into()]);
        list.add(".py", vec!["python".into()]);
        let (at, d) = list.find_ext(&chars(".h")).unwrap();
        assert_eq!(at, 2);
        assert_eq!(d.first_line(), "cc");
        assert_eq!(names(&list), vec![".c.h", ".py"]);
    }
}
