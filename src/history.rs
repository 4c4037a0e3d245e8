//! コマンド履歴の管理。
//!
//! 履歴は [`Ring`] 上に古い順で並ぶ。同じ行をもう一度追加すると新しく作らずに末尾へ移動し、
//! 上限を超えたら最古のエントリを捨てる。
//!
//! ## ナビゲーション
//!
//! 位置は [`HistPos`] で表す。`HistPos::Blank` は「どの履歴でもない空行」で、
//! リングの両端の外側にある番兵に相当する。↑で `Blank` から最新へ、最古から `Blank` へ戻る。
//!
//! ## 永続化
//!
//! `histfile` が設定されていれば、起動時にプレーンテキスト（1 行 1 コマンド、古い順）を読み込み、
//! 終了時に全体を書き直す。昇格による並べ替えがあるため追記ではなく上書き。

use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::ring::{Handle, Ring};
use crate::text;

/// 履歴上の位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistPos {
    /// 履歴の外側の空行
    Blank,
    Entry(Handle),
}

/// コマンド履歴。
#[derive(Debug, Clone)]
pub struct History {
    entries: Ring<String>,
    /// 保持する最大エントリ数。0 なら無制限。
    max_size: usize,
    /// これより短い行は保存しない。
    min_length: usize,
}

impl History {
    pub fn new(max_size: usize, min_length: usize) -> Self {
        History {
            entries: Ring::new(),
            max_size,
            min_length,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 古い順に走査する。
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// 行を追加する。短すぎる行は無視し、同じ行があれば末尾へ昇格させる。
    pub fn add(&mut self, line: &str) -> Option<Handle> {
        if line.chars().count() < self.min_length {
            return None;
        }
        let existing = self
            .entries
            .handles()
            .into_iter()
            .rev()
            .find(|&h| self.entries.get(h).is_some_and(|e| e == line));
        if let Some(h) = existing {
            self.entries.move_to_back(h);
            return Some(h);
        }
        if self.max_size > 0 && self.entries.len() >= self.max_size {
            if let Some(old) = self.entries.pop_front() {
                debug!("history full, dropping {:?}", old);
            }
        }
        Some(self.entries.push_back(line.to_string()))
    }

    pub fn text(&self, pos: HistPos) -> &str {
        match pos {
            HistPos::Blank => "",
            HistPos::Entry(h) => self.entries.get(h).map_or("", String::as_str),
        }
    }

    pub fn first(&self) -> HistPos {
        self.entries.front().map_or(HistPos::Blank, HistPos::Entry)
    }

    pub fn last(&self) -> HistPos {
        self.entries.back().map_or(HistPos::Blank, HistPos::Entry)
    }

    /// 1 つ古い位置。`Blank` からは最新、最古からは `Blank`。
    pub fn prev(&self, pos: HistPos) -> HistPos {
        match pos {
            HistPos::Blank => self.last(),
            HistPos::Entry(h) => self.entries.prev(h).map_or(HistPos::Blank, HistPos::Entry),
        }
    }

    /// 1 つ新しい位置。`Blank` からは最古、最新からは `Blank`。
    pub fn next(&self, pos: HistPos) -> HistPos {
        match pos {
            HistPos::Blank => self.first(),
            HistPos::Entry(h) => self.entries.next(h).map_or(HistPos::Blank, HistPos::Entry),
        }
    }

    fn matches(&self, pos: HistPos, prefix: &[char]) -> bool {
        match pos {
            HistPos::Blank => prefix.is_empty(),
            HistPos::Entry(_) => text::starts_with_ignore_case(self.text(pos), prefix),
        }
    }

    /// `from` の次から `prefix`（大文字小文字無視）で始まるエントリを探す。
    ///
    /// 両端で折り返し、`from` 自身まで一周したら終わる。`Blank` は空の接頭辞にだけ一致する。
    pub fn search(&self, from: HistPos, prefix: &[char], backward: bool) -> Option<HistPos> {
        let mut pos = from;
        loop {
            pos = if backward { self.prev(pos) } else { self.next(pos) };
            if self.matches(pos, prefix) {
                return Some(pos);
            }
            if pos == from {
                return None;
            }
        }
    }

    /// 最新のエントリを削除する（内部コマンド自身の行を消すのに使う）。
    pub fn remove_last(&mut self) {
        if let Some(h) = self.entries.back() {
            self.entries.remove(h);
        }
    }

    /// `needle` を含む（大文字小文字無視）エントリをすべて削除する。
    pub fn delete_containing(&mut self, needle: &str) -> usize {
        let needle = needle.to_lowercase();
        self.entries
            .retain(|e| !e.to_lowercase().contains(&needle))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // ── 永続化 ──────────────────────────────

    /// 履歴ファイルからエントリを読み込む。ファイルが存在しなければ何もしない。
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let file = match fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(Error::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        for line in BufReader::new(file).lines().map_while(|l| l.ok()) {
            if !line.is_empty() {
                self.add(&line);
            }
        }
        debug!("loaded {} history entries from {}", self.len(), path.display());
        Ok(())
    }

    /// 履歴全体をファイルに書き出す。
    pub fn save(&self, path: &Path) -> Result<()> {
        let io_err = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = fs::File::create(path).map_err(io_err)?;
        let mut out = BufWriter::new(file);
        for entry in self.iter() {
            writeln!(out, "{}", entry).map_err(io_err)?;
        }
        out.flush().map_err(io_err)
    }
}
