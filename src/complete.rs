//! ファイル名補完。
//!
//! カーソル直前のパスを切り出し、ディレクトリを走査して候補の環を作る。
//! 環の先頭には入力していた元の名前（「自分」）を置き、巡回が一周すると元の名前に戻る。
//!
//! ## 候補の絞り込み
//!
//! | 状況 | 候補 |
//! |------|------|
//! | 行頭のパス | ディレクトリと実行可能ファイル（拡張子が `FEXEC`/`PATHEXT` にある、関連付けがある、実行ビットが立っている） |
//! | ディレクトリ補完 | ディレクトリのみ |
//! | それ以外 | `FIGNORE` の拡張子を除いたもの。1 件もなければ全ファイル |
//!
//! `.` と `..` は候補にしない。`.` で始まる名前は入力が `.` で始まるときだけ一致する。
//!
//! ## 共通接頭辞
//!
//! 入力にワイルドカード（`*`, `?`）がなければ全候補に共通する部分の長さを求める
//! （大文字小文字無視、入力した長さより短くはしない）。
//! ワイルドカードがあれば [`Prefix::Wild`] で、エディタは最初の候補をそのまま挿入する。

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::expand_tilde;
use crate::define::{match_ext, DefineList};
use crate::glob;
use crate::line::LineBuffer;
use crate::ring::{Handle, Ring};
use crate::text::{self, INVALID_FNAME};

/// 実行可能とみなす拡張子の既定値。
pub const FEXEC: &str = ".exe.com.bat.cmd";
/// 補完で無視する拡張子の既定値。
pub const FIGNORE: &str = ".exe.com.dll.obj.o.bak";

/// 補完の種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Files,
    Dirs,
}

/// 拡張子リスト。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtLists {
    pub exec: String,
    pub ignore: String,
}

impl Default for ExtLists {
    fn default() -> Self {
        ExtLists {
            exec: FEXEC.to_string(),
            ignore: FIGNORE.to_string(),
        }
    }
}

impl ExtLists {
    /// 環境変数から読む。`FEXEC` が空なら `PATHEXT`、`FIGNORE` は設定されていれば空でも使う。
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        let exec = var("FEXEC")
            .filter(|v| !v.is_empty())
            .or_else(|| var("PATHEXT").filter(|v| !v.is_empty()))
            .unwrap_or_else(|| FEXEC.to_string());
        let ignore = var("FIGNORE").unwrap_or_else(|| FIGNORE.to_string());
        ExtLists { exec, ignore }
    }
}

/// 挿入する長さの決め方。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    /// 全候補に共通する先頭の文字数
    Common(usize),
    /// 入力にワイルドカードがあった
    Wild,
}

/// 1 回の補完要求の結果。
#[derive(Debug, Clone)]
pub struct Completion {
    names: Ring<Vec<char>>,
    origin: Handle,
    /// パスの開始位置。`found_quote` なら直前に開き引用符がある
    pub path_pos: usize,
    /// ファイル名部分の開始位置
    pub fname_pos: usize,
    pub found_quote: bool,
    pub prefix: Prefix,
    /// 候補の数（元の名前を除く）
    pub count: usize,
    /// 最も長い候補の文字数
    pub max_len: usize,
    /// ディレクトリ候補の末尾に付ける区切り
    pub dirchar: char,
}

impl Completion {
    /// 元の名前。
    pub fn origin(&self) -> Handle {
        self.origin
    }

    pub fn name(&self, h: Handle) -> &[char] {
        self.names.get(h).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 次の名前。最後の候補の次は元の名前。
    pub fn next(&self, h: Handle) -> Handle {
        self.names
            .next(h)
            .or_else(|| self.names.front())
            .unwrap_or(self.origin)
    }

    /// 前の名前。元の名前の前は最後の候補。
    pub fn prev(&self, h: Handle) -> Handle {
        self.names
            .prev(h)
            .or_else(|| self.names.back())
            .unwrap_or(self.origin)
    }

    pub fn first(&self) -> Handle {
        self.next(self.origin)
    }

    pub fn last(&self) -> Handle {
        self.prev(self.origin)
    }

    /// ソート済みの候補（元の名前を除く）。
    pub fn candidates(&self) -> impl Iterator<Item = &[char]> {
        self.names.iter().skip(1).map(Vec::as_slice)
    }

    pub fn is_dir_name(&self, name: &[char]) -> bool {
        name.last() == Some(&self.dirchar)
    }

    /// いずれかの候補で `at` 文字目が引用符を必要とするか。
    pub fn needs_quote_at(&self, at: usize) -> bool {
        self.candidates()
            .any(|n| n.get(at).is_some_and(|c| text::QUOTE_FNAME.contains(*c)))
    }

    /// 候補の一覧を画面幅 `width` に合わせた行の並びにする。
    ///
    /// 2 列に収まらなければ 1 行 1 名。それ以外は列優先で並べ、列の間は 2 文字空ける。
    /// どの行も `width` 文字を超えない。
    pub fn listing(&self, width: usize) -> Vec<String> {
        let names: Vec<String> = self.candidates().map(|n| n.iter().collect()).collect();
        let max = self.max_len.max(1);
        if max + 2 + max > width {
            return names;
        }
        let mut cols = width / max;
        while cols > 1 && cols * max + (cols - 1) * 2 > width {
            cols -= 1;
        }
        let lines = names.len().div_ceil(cols);
        (0..lines)
            .map(|r| {
                let mut row = String::new();
                let mut idx = r;
                while idx < names.len() {
                    let name = &names[idx];
                    row.push_str(name);
                    idx += lines;
                    if idx < names.len() {
                        let pad = max + 2 - name.chars().count();
                        row.extend(std::iter::repeat(' ').take(pad));
                    }
                }
                row
            })
            .collect()
    }
}

// ── 候補の収集 ──────────────────────────────

/// ディレクトリの 1 項目。
struct Entry {
    name: String,
    dir: bool,
    exec: bool,
}

/// 拡張子による絞り込み。
struct Filter<'a> {
    exe: bool,
    dirs: bool,
    list: &'a str,
}

/// ファイルが実行可能か判定する（Unix パーミッションビット `0o111`）。
#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.is_file() && meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}

/// `dir` 内で `pattern` に一致する項目。
fn scan(dir: &Path, pattern: &str) -> Vec<Entry> {
    let hidden = pattern.starts_with('.');
    let Ok(entries) = fs::read_dir(dir) else {
        debug!("completion: cannot read {}", dir.display());
        return Vec::new();
    };
    let mut found = Vec::new();
    for entry in entries.flatten() {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name == "." || name == ".." || (name.starts_with('.') && !hidden) {
            continue;
        }
        if !glob::matches_pattern(pattern, &name) {
            continue;
        }
        // シンボリックリンクは指す先で判定する
        let Ok(meta) = fs::metadata(entry.path()) else {
            continue;
        };
        found.push(Entry {
            name,
            dir: meta.is_dir(),
            exec: is_executable(&meta),
        });
    }
    found
}

/// 項目を候補にするか判定する。候補にするなら表示名を返す。
fn accept(entry: &Entry, filter: &Filter, assocs: &mut DefineList) -> Option<String> {
    if entry.dir {
        return Some(entry.name.clone());
    }
    if filter.dirs {
        return None;
    }
    if filter.list.is_empty() {
        return Some(entry.name.clone());
    }
    let name: Vec<char> = entry.name.chars().collect();
    // 拡張子がなければ "." を拡張子とみなす
    let (ext, bare) = match name.iter().rposition(|&c| c == '.') {
        Some(dot) => (name[dot..].to_vec(), false),
        None => (vec!['.'], true),
    };
    if !filter.exe {
        return match_ext(&ext, filter.list)
            .is_none()
            .then(|| entry.name.clone());
    }
    if match_ext(&ext, filter.list).is_some() || assocs.find_ext(&ext).is_some() {
        // 関連付けを引けるようにドットを残す
        let mut shown = entry.name.clone();
        if bare {
            shown.push('.');
        }
        return Some(shown);
    }
    entry.exec.then(|| entry.name.clone())
}

/// 補完の対象となるディレクトリ。
fn search_dir(dir: &[char]) -> PathBuf {
    if dir.is_empty() {
        return PathBuf::from(".");
    }
    let dir: String = dir
        .iter()
        .map(|&c| if c == '\\' { '/' } else { c })
        .collect();
    expand_tilde(Path::new(&dir))
}

/// `pos` の直前にあるパスの候補を探す。
///
/// パス内の引用符は取り除き、あれば開き引用符を 1 つだけパスの前に戻す（`pos` も更新される）。
/// 一致するものがなければ `None`。
pub fn find_files(
    line: &mut LineBuffer,
    pos: &mut usize,
    mode: Mode,
    exts: &ExtLists,
    assocs: &mut DefineList,
) -> Option<Completion> {
    // 閉じていない引用符か区切り文字の直後がパスの始まり
    let mut path_pos = 0;
    let mut quote = false;
    for beg in 0..*pos {
        let chars = line.chars();
        if text::is_quote(chars, beg) {
            quote = !quote;
        } else if !quote && (chars[beg] <= ' ' || INVALID_FNAME.contains(chars[beg])) {
            path_pos = beg + 1;
        }
    }

    let mut found_quote = false;
    let mut beg = path_pos;
    while beg < *pos {
        if text::is_quote(line.chars(), beg) {
            found_quote = true;
            line.remove(beg, 1);
            *pos -= 1;
        } else {
            beg += 1;
        }
    }
    if found_quote {
        line.insert(path_pos, &['"']);
        path_pos += 1;
        *pos += 1;
    }

    let exe = path_pos == usize::from(found_quote);

    let mut wild = false;
    let mut dirchar = '/';
    let mut fname_pos = path_pos;
    for (i, &c) in line.chars()[path_pos..*pos].iter().enumerate() {
        match c {
            '*' | '?' => wild = true,
            '/' | '\\' => {
                dirchar = c;
                fname_pos = path_pos + i + 1;
            }
            ':' => fname_pos = path_pos + i + 1,
            _ => {}
        }
    }

    let typed: Vec<char> = line.chars()[fname_pos..*pos].to_vec();
    let mut pattern: String = typed.iter().collect();
    if !wild {
        pattern.push('*');
    }
    let dir = search_dir(&line.chars()[path_pos..fname_pos]);
    let entries = scan(&dir, &pattern);

    let filter = Filter {
        exe,
        dirs: mode == Mode::Dirs,
        list: if exe { &exts.exec } else { &exts.ignore },
    };
    let mut found: Vec<(String, bool)> = entries
        .iter()
        .filter_map(|e| accept(e, &filter, assocs).map(|n| (n, e.dir)))
        .collect();
    if found.is_empty() && !exe && mode == Mode::Files {
        let all = Filter {
            exe: false,
            dirs: false,
            list: "",
        };
        found = entries
            .iter()
            .filter_map(|e| accept(e, &all, assocs).map(|n| (n, e.dir)))
            .collect();
    }
    if found.is_empty() {
        debug!("completion: nothing matches {:?} in {}", pattern, dir.display());
        return None;
    }

    let mut names: Vec<Vec<char>> = found
        .into_iter()
        .map(|(name, is_dir)| {
            let mut name: Vec<char> = name.chars().collect();
            if is_dir {
                name.push(dirchar);
            }
            name
        })
        .collect();

    let prefix = if wild {
        Prefix::Wild
    } else {
        let first = names[0].clone();
        let mut common = first.len();
        for name in &names[1..] {
            let beg = first
                .iter()
                .zip(name)
                .take(common)
                .take_while(|(a, b)| text::eq_ignore_case(**a, **b))
                .count();
            // 入力した長さより短くしない（末尾のドットを残す）
            if beg >= typed.len() {
                common = beg;
            }
        }
        Prefix::Common(common)
    };

    names.sort_by(|a, b| {
        let a: String = a.iter().collect();
        let b: String = b.iter().collect();
        text::cmp_ignore_case(&a, &b)
    });
    let count = names.len();
    let max_len = names.iter().map(Vec::len).max().unwrap_or(0);
    debug!("completion: {} candidates for {:?}", count, pattern);

    let mut ring = Ring::new();
    let origin = ring.push_back(typed);
    for name in names {
        ring.push_back(name);
    }

    Some(Completion {
        names: ring,
        origin,
        path_pos,
        fname_pos,
        found_quote,
        prefix,
        count,
        max_len,
        dirchar,
    })
}
