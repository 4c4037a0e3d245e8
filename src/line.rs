//! 編集中の行バッファ。
//!
//! テキストは `Vec<char>` で保持し、位置はすべて文字単位。
//! 容量（ホストが用意したバッファの大きさ）を超える挿入は切り詰められ、ベル要求が立つ。
//! 前回の再描画以降に変化した範囲を「ダーティ範囲」として記録し、
//! エディタはその範囲だけを画面に書き直す。

use std::ops::Range;

/// 容量制限とダーティ範囲を持つ行バッファ。
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    text: Vec<char>,
    capacity: usize,
    dirty: Option<Range<usize>>,
    bell: bool,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        LineBuffer {
            text: Vec::new(),
            capacity,
            dirty: None,
            bell: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 容量を変更する。現在の内容が収まらない場合は末尾を切り捨てる。
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        if self.text.len() > capacity {
            self.truncate(capacity);
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.text.len() >= self.capacity
    }

    pub fn chars(&self) -> &[char] {
        &self.text
    }

    pub fn char_at(&self, pos: usize) -> Option<char> {
        self.text.get(pos).copied()
    }

    pub fn as_string(&self) -> String {
        self.text.iter().collect()
    }

    pub fn slice_string(&self, range: Range<usize>) -> String {
        let end = range.end.min(self.text.len());
        let start = range.start.min(end);
        self.text[start..end].iter().collect()
    }

    // ── ダーティ範囲とベル ──────────────────────────────

    /// `beg..end` を再描画対象に加える。`end` は行末を越えてもよい
    /// （縮んだ行の残骸を消すため）。
    pub fn mark(&mut self, beg: usize, end: usize) {
        if beg >= end {
            return;
        }
        self.dirty = Some(match self.dirty.take() {
            Some(r) => r.start.min(beg)..r.end.max(end),
            None => beg..end,
        });
    }

    pub fn dirty(&self) -> Option<Range<usize>> {
        self.dirty.clone()
    }

    /// ダーティ範囲を取り出してリセットする。
    pub fn take_dirty(&mut self) -> Option<Range<usize>> {
        self.dirty.take()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = None;
    }

    /// ベルを要求する。鳴らすかどうかは描画側が判断する。
    pub fn ring_bell(&mut self) {
        self.bell = true;
    }

    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell)
    }

    // ── 編集プリミティブ ──────────────────────────────

    /// 行全体を置き換える。容量を超える分は切り捨ててベルを鳴らす。
    pub fn set_all(&mut self, text: &[char]) {
        let old = self.text.len();
        let cnt = if text.len() > self.capacity {
            self.bell = true;
            self.capacity
        } else {
            text.len()
        };
        self.text.clear();
        self.text.extend_from_slice(&text[..cnt]);
        self.mark(0, old.max(cnt));
    }

    pub fn set_str(&mut self, text: &str) {
        let chars: Vec<char> = text.chars().collect();
        self.set_all(&chars);
    }

    /// 行を空にする（容量は保持）。
    pub fn clear(&mut self) {
        let old = self.text.len();
        self.text.clear();
        self.mark(0, old);
    }

    /// `pos` から `count` 文字を削除する。範囲外の指定は行末で切られる。
    pub fn remove(&mut self, pos: usize, count: usize) {
        let len = self.text.len();
        if pos >= len || count == 0 {
            return;
        }
        let end = (pos + count).min(len);
        self.text.drain(pos..end);
        self.mark(pos, len);
    }

    /// `pos` に `text` を挿入し、実際に挿入できた文字数を返す。
    /// 容量が足りなければ入る分だけ挿入してベルを鳴らす。
    pub fn insert(&mut self, pos: usize, text: &[char]) -> usize {
        let pos = pos.min(self.text.len());
        let room = self.capacity.saturating_sub(self.text.len());
        let cnt = if text.len() > room {
            self.bell = true;
            room
        } else {
            text.len()
        };
        if cnt == 0 {
            return 0;
        }
        self.text.splice(pos..pos, text[..cnt].iter().copied());
        self.mark(pos, self.text.len());
        cnt
    }

    pub fn insert_str(&mut self, pos: usize, text: &str) -> usize {
        let chars: Vec<char> = text.chars().collect();
        self.insert(pos, &chars)
    }

    /// `pos` から `old` 文字を `text` で置き換える。
    pub fn replace(&mut self, pos: usize, old: usize, text: &[char]) {
        if old == text.len() {
            let pos = pos.min(self.text.len());
            let end = (pos + old).min(self.text.len());
            let n = end - pos;
            self.text[pos..end].copy_from_slice(&text[..n]);
            self.mark(pos, end);
        } else {
            self.remove(pos, old);
            self.insert(pos, text);
        }
    }

    /// `pos` 以降を削除する。
    pub fn truncate(&mut self, pos: usize) {
        let len = self.text.len();
        if pos < len {
            self.text.truncate(pos);
            self.mark(pos, len);
        }
    }

    /// 上書きで 1 文字書く。`pos` が行末なら 1 文字伸ばす。
    /// 容量いっぱいで書けなければ `false`。
    pub fn overwrite(&mut self, pos: usize, ch: char) -> bool {
        if pos < self.text.len() {
            self.text[pos] = ch;
        } else if pos == self.text.len() && pos < self.capacity {
            self.text.push(ch);
        } else {
            return false;
        }
        self.mark(pos, pos + 1);
        true
    }

    /// 2 文字を入れ替える。
    pub fn swap(&mut self, a: usize, b: usize) {
        if a < self.text.len() && b < self.text.len() {
            self.text.swap(a, b);
            self.mark(a.min(b), a.max(b) + 1);
        }
    }

    /// `range` の文字を右へ 1 つ回転する（末尾の文字が先頭に来る）。
    pub fn rotate_right(&mut self, range: Range<usize>) {
        if range.end <= self.text.len() && range.start < range.end {
            self.text[range.clone()].rotate_right(1);
            self.mark(range.start, range.end);
        }
    }

    /// `range` の文字を左へ 1 つ回転する（先頭の文字が末尾に行く）。
    pub fn rotate_left(&mut self, range: Range<usize>) {
        if range.end <= self.text.len() && range.start < range.end {
            self.text[range.clone()].rotate_left(1);
            self.mark(range.start, range.end);
        }
    }
}
