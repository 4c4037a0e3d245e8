//! 表示用の色と文字の変換。
//!
//! エディタは固定の色領域しか扱わない（編集行・記録中の行・プロンプトの各部）。
//! 色はコンソール属性の 1 バイトで持ち、ANSI 端末へは [`sgr`] で変換する。
//!
//! ## プロンプトの着色
//!
//! パスを表示するプロンプトだけを着色する。
//!
//! | 形 | 例 | 色 |
//! |----|----|----|
//! | ドライブ形式 | `C:\src\cmdread>` | ドライブ `drv_col`、`\` `sep_col`、ディレクトリ `dir_col`、`>` `gt_col` |
//! | Unix 形式 | `user@host:~/src$ ` | パスの前 `drv_col`、`/` `sep_col`、ディレクトリ `dir_col`、`$` `#` `>` `gt_col` |
//!
//! ## 制御文字
//!
//! 行中の制御文字は CP437 のグリフ（☺ ☻ ♥ …）で表示する。

use crate::config::Options;

// ── ANSI カラーコード ─────────────────────────────────────────────

const RESET: &str = "\x1b[0m";

/// コンソール属性の色ビット（青・緑・赤）を ANSI の色番号（赤・緑・青）へ。
const ANSI_ORDER: [u8; 8] = [0, 4, 2, 6, 1, 5, 3, 7];

/// コンソール属性を SGR シーケンスに変換する。属性 0 は端末の既定色。
pub fn sgr(attr: u8) -> String {
    if attr == 0 {
        return RESET.to_string();
    }
    let fg = attr & 0x0f;
    let bg = attr >> 4;
    let code = |nibble: u8, normal: u8, bright: u8| {
        let base = if nibble & 8 != 0 { bright } else { normal };
        base + ANSI_ORDER[(nibble & 7) as usize]
    };
    format!("\x1b[0;{};{}m", code(fg, 30, 90), code(bg, 40, 100))
}

// ── 制御文字 ─────────────────────────────────────────────

/// 制御文字 0..32 の表示用グリフ。
const CONTROL_GLYPHS: [char; 32] = [
    ' ', '\u{263A}', '\u{263B}', '\u{2665}', '\u{2666}', '\u{2663}', '\u{2660}', '\u{2022}',
    '\u{25D8}', '\u{25CB}', '\u{25D9}', '\u{2642}', '\u{2640}', '\u{266A}', '\u{266B}', '\u{263C}',
    '\u{25BA}', '\u{25C4}', '\u{2195}', '\u{203C}', '\u{00B6}', '\u{00A7}', '\u{25AC}', '\u{21A8}',
    '\u{2191}', '\u{2193}', '\u{2192}', '\u{2190}', '\u{221F}', '\u{2194}', '\u{25B2}', '\u{25BC}',
];

pub fn display_char(ch: char) -> char {
    match CONTROL_GLYPHS.get(ch as usize) {
        Some(&glyph) => glyph,
        None => ch,
    }
}

/// 表示用の文字列。制御文字をグリフに置き換える。
pub fn display_text(text: &[char]) -> String {
    text.iter().map(|&c| display_char(c)).collect()
}

// ── プロンプト ─────────────────────────────────────────────

/// プロンプトの各文字の色。パス形式でなければ `None`。
pub fn prompt_attrs(prompt: &[char], opt: &Options) -> Option<Vec<u8>> {
    if opt.nocolour || prompt.is_empty() {
        return None;
    }
    drive_prompt(prompt, opt).or_else(|| unix_prompt(prompt, opt))
}

/// `C:\dir\sub>` 形式。
fn drive_prompt(prompt: &[char], opt: &Options) -> Option<Vec<u8>> {
    let len = prompt.len();
    if len < 3 || prompt[1] != ':' || prompt[len - 1] != '>' {
        return None;
    }
    let mut attrs = vec![opt.dir_col; len];
    attrs[0] = opt.drv_col;
    attrs[1] = opt.drv_col;
    attrs[2] = if prompt.get(3) == Some(&'>') || len == 3 {
        opt.dir_col
    } else {
        opt.sep_col
    };
    attrs[len - 1] = opt.gt_col;
    for j in 3..len - 1 {
        if prompt[j] == '\\' {
            attrs[j] = opt.sep_col;
        }
    }
    Some(attrs)
}

/// `user@host:~/dir$ ` 形式。末尾の空白は着色しない。
fn unix_prompt(prompt: &[char], opt: &Options) -> Option<Vec<u8>> {
    let end = prompt.iter().rposition(|c| !c.is_whitespace())?;
    if !matches!(prompt[end], '$' | '#' | '>') {
        return None;
    }
    let start = prompt[..end]
        .iter()
        .rposition(|&c| c == ':')
        .map_or(0, |p| p + 1);
    if !matches!(prompt.get(start), Some('/' | '~')) {
        return None;
    }
    let mut attrs = vec![opt.base_col; prompt.len()];
    for a in &mut attrs[..start] {
        *a = opt.drv_col;
    }
    for j in start..end {
        attrs[j] = if prompt[j] == '/' { opt.sep_col } else { opt.dir_col };
    }
    attrs[end] = opt.gt_col;
    Some(attrs)
}
