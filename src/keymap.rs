//! キーマップ。
//!
//! キー入力を編集機能に対応付ける表と、機能名・キー名の相互変換を扱う。
//!
//! ## キーの種類
//!
//! | 種類 | 表 | 修飾 |
//! |------|----|------|
//! | 制御文字 `^@`..`^_` | 32 × 2 | なし / Shift |
//! | 編集キー（PgUp..Del） | 14 × 4 | なし / Shift / Ctrl / Alt（Bksp・Tab・Enter・Esc は Shift+Ctrl） |
//! | ファンクションキー F1..F12 | 12 × 4 | なし / Shift / Ctrl / Alt |
//!
//! 各スロットの割り当ては [`Binding`] で、無視・機能・キーボードマクロのいずれか。

use std::array;
use std::cmp::Ordering;

use crate::recorder::Macro;
use crate::terminal::{KeyEvent, Vk};

// ── 編集機能 ──────────────────────────────

/// 編集機能。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Default,
    Ignore,
    Quote,
    CharLeft,
    CharRight,
    WordLeft,
    WordRight,
    StringLeft,
    StringRight,
    BegLine,
    EndLine,
    PrevLine,
    NextLine,
    SearchBack,
    SearchForw,
    FirstLine,
    LastLine,
    List,
    ListDir,
    Cycle,
    CycleBack,
    CycleDir,
    CycleDirBack,
    SelectFiles,
    DelLeft,
    DelRight,
    DelWordLeft,
    DelWordRight,
    DelArg,
    DelBegLine,
    DelEndLine,
    DelEndExec,
    Erase,
    StoreErase,
    CmdSep,
    Transpose,
    AutoRecall,
    MacroToggle,
    VarSubst,
    Enter,
    Wipe,
    InsOvr,
    Play,
    Record,
}

/// 名前順（大文字小文字無視）に並べた機能表。二分探索に使う。
const FUNCTION_NAMES: [(&str, Function); 44] = [
    ("AutoRecall", Function::AutoRecall),
    ("BegLine", Function::BegLine),
    ("CharLeft", Function::CharLeft),
    ("CharRight", Function::CharRight),
    ("CmdSep", Function::CmdSep),
    ("Cycle", Function::Cycle),
    ("CycleBack", Function::CycleBack),
    ("CycleDir", Function::CycleDir),
    ("CycleDirBack", Function::CycleDirBack),
    ("Default", Function::Default),
    ("DelArg", Function::DelArg),
    ("DelBegLine", Function::DelBegLine),
    ("DelEndExec", Function::DelEndExec),
    ("DelEndLine", Function::DelEndLine),
    ("DelLeft", Function::DelLeft),
    ("DelRight", Function::DelRight),
    ("DelWordLeft", Function::DelWordLeft),
    ("DelWordRight", Function::DelWordRight),
    ("EndLine", Function::EndLine),
    ("Enter", Function::Enter),
    ("Erase", Function::Erase),
    ("FirstLine", Function::FirstLine),
    ("Ignore", Function::Ignore),
    ("InsOvr", Function::InsOvr),
    ("LastLine", Function::LastLine),
    ("List", Function::List),
    ("ListDir", Function::ListDir),
    ("MacroToggle", Function::MacroToggle),
    ("NextLine", Function::NextLine),
    ("Play", Function::Play),
    ("PrevLine", Function::PrevLine),
    ("Quote", Function::Quote),
    ("Record", Function::Record),
    ("SearchBack", Function::SearchBack),
    ("SearchForw", Function::SearchForw),
    ("SelectFiles", Function::SelectFiles),
    ("StoreErase", Function::StoreErase),
    ("StringLeft", Function::StringLeft),
    ("StringRight", Function::StringRight),
    ("Transpose", Function::Transpose),
    ("VarSubst", Function::VarSubst),
    ("Wipe", Function::Wipe),
    ("WordLeft", Function::WordLeft),
    ("WordRight", Function::WordRight),
];

/// ASCII の大文字小文字を無視した比較。
fn cmp_name(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}

impl Function {
    pub fn name(self) -> &'static str {
        FUNCTION_NAMES
            .iter()
            .find(|(_, f)| *f == self)
            .map_or("Ignore", |(n, _)| *n)
    }

    /// 機能名（大文字小文字無視）から機能を引く。
    pub fn from_name(name: &str) -> Option<Function> {
        FUNCTION_NAMES
            .binary_search_by(|(n, _)| cmp_name(n, name))
            .ok()
            .map(|i| FUNCTION_NAMES[i].1)
    }
}

// ── キーの識別 ──────────────────────────────

/// 編集キー。並びは一覧表示の順。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKey {
    PgUp,
    PgDn,
    End,
    Home,
    Left,
    Up,
    Right,
    Down,
    Bksp,
    Tab,
    Enter,
    Esc,
    Ins,
    Del,
}

impl EditKey {
    pub const ALL: [EditKey; 14] = [
        EditKey::PgUp,
        EditKey::PgDn,
        EditKey::End,
        EditKey::Home,
        EditKey::Left,
        EditKey::Up,
        EditKey::Right,
        EditKey::Down,
        EditKey::Bksp,
        EditKey::Tab,
        EditKey::Enter,
        EditKey::Esc,
        EditKey::Ins,
        EditKey::Del,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EditKey::PgUp => "PgUp",
            EditKey::PgDn => "PgDn",
            EditKey::End => "End",
            EditKey::Home => "Home",
            EditKey::Left => "Left",
            EditKey::Up => "Up",
            EditKey::Right => "Right",
            EditKey::Down => "Down",
            EditKey::Bksp => "Bksp",
            EditKey::Tab => "Tab",
            EditKey::Enter => "Enter",
            EditKey::Esc => "Esc",
            EditKey::Ins => "Ins",
            EditKey::Del => "Del",
        }
    }

    fn from_name(name: &str) -> Option<EditKey> {
        EditKey::ALL
            .into_iter()
            .find(|k| cmp_name(k.name(), name) == Ordering::Equal)
    }

    /// Alt の代わりに Shift+Ctrl を 4 列目に使うキー。
    pub fn uses_shift_ctrl(self) -> bool {
        matches!(self, EditKey::Bksp | EditKey::Tab | EditKey::Enter | EditKey::Esc)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// 修飾状態（表の列）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    Plain,
    Shift,
    Ctrl,
    /// Alt。Bksp・Tab・Enter・Esc では Shift+Ctrl。
    Alt,
}

impl KeyState {
    const ALL: [KeyState; 4] = [KeyState::Plain, KeyState::Shift, KeyState::Ctrl, KeyState::Alt];

    fn index(self) -> usize {
        self as usize
    }

    /// 一覧表示用の 2 文字の接頭辞。
    fn prefix(self) -> &'static str {
        match self {
            KeyState::Plain => "  ",
            KeyState::Shift => " #",
            KeyState::Ctrl => " ^",
            KeyState::Alt => " @",
        }
    }
}

/// キーマップ上のスロット。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySlot {
    /// 制御文字（0..32）
    Control { code: u8, shift: bool },
    Edit { key: EditKey, state: KeyState },
    /// F1..F12（`number` は 1 始まり）
    Function { number: u8, state: KeyState },
}

impl KeySlot {
    /// 一覧表示用の名前（修飾子は 2 文字幅に右寄せ）。
    pub fn name(self) -> String {
        match self {
            KeySlot::Control { code, shift } => {
                let prefix = if shift { "#^" } else { " ^" };
                format!("{}{}", prefix, char::from(code + b'@'))
            }
            KeySlot::Edit { key, state } => {
                let prefix = if state == KeyState::Alt && key.uses_shift_ctrl() {
                    "#^"
                } else {
                    state.prefix()
                };
                format!("{}{}", prefix, key.name())
            }
            KeySlot::Function { number, state } => format!("{}F{}", state.prefix(), number),
        }
    }

    /// キー名を解析する。
    ///
    /// `^A`・`#^A` は制御文字、`#`・`^`・`@` の接頭辞はそれぞれ Shift・Ctrl・Alt、
    /// 編集キーの前の `#^` は Shift+Ctrl。`F1`..`F12` はファンクションキー。
    pub fn parse(name: &str) -> Option<KeySlot> {
        let chars: Vec<char> = name.chars().collect();
        if chars.len() < 2 {
            return None;
        }
        let control = match chars.as_slice() {
            ['^', c] => Some((*c, false)),
            ['#', '^', c] => Some((*c, true)),
            _ => None,
        };
        if let Some((c, shift)) = control {
            let code = (c as u32 | 0x20).checked_sub(0x60)?;
            return (code < 32).then(|| KeySlot::Control {
                code: code as u8,
                shift,
            });
        }

        let (mut state, mut rest) = match chars[0] {
            '@' => (KeyState::Alt, &chars[1..]),
            '^' => (KeyState::Ctrl, &chars[1..]),
            '#' => (KeyState::Shift, &chars[1..]),
            _ => (KeyState::Plain, &chars[..]),
        };
        if matches!(rest.first(), Some('f' | 'F')) {
            let digits: String = rest[1..].iter().collect();
            let number: u8 = digits.parse().ok()?;
            if digits.starts_with('0') || !(1..=12).contains(&number) {
                return None;
            }
            return Some(KeySlot::Function { number, state });
        }
        if state == KeyState::Shift && rest.first() == Some(&'^') {
            state = KeyState::Alt;
            rest = &rest[1..];
        }
        let key_name: String = rest.iter().collect();
        let key = EditKey::from_name(&key_name)?;
        Some(KeySlot::Edit { key, state })
    }
}

// ── 割り当て ──────────────────────────────

/// スロットへの割り当て。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Binding {
    #[default]
    Ignore,
    Function(Function),
    Macro(Macro),
}

impl Binding {
    pub fn from_function(f: Function) -> Binding {
        match f {
            Function::Ignore => Binding::Ignore,
            f => Binding::Function(f),
        }
    }

    /// ディスパッチ時の機能。マクロは `Play`。
    pub fn function(&self) -> Function {
        match self {
            Binding::Ignore => Function::Ignore,
            Binding::Function(f) => *f,
            Binding::Macro(_) => Function::Play,
        }
    }
}

/// キー入力を分類した結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// キーマップのスロットに当たるキー。文字はイベントが運んできたもの
    Slot(KeySlot, char),
    /// そのまま挿入する文字
    Char(char),
    /// Alt+テンキーの数字（文字合成の開始）
    Keypad(u8),
    Ignore,
}

/// キーイベントを分類する。
pub fn classify(ev: &KeyEvent) -> KeyInput {
    let m = ev.mods;
    let state = if m.alt {
        KeyState::Alt
    } else if m.ctrl {
        KeyState::Ctrl
    } else if m.shift {
        KeyState::Shift
    } else {
        KeyState::Plain
    };
    match ev.key {
        Vk::Edit(key) => {
            let state = if key.uses_shift_ctrl() {
                if m.shift && m.ctrl {
                    KeyState::Alt
                } else if m.ctrl {
                    KeyState::Ctrl
                } else if m.shift {
                    KeyState::Shift
                } else {
                    KeyState::Plain
                }
            } else {
                state
            };
            KeyInput::Slot(KeySlot::Edit { key, state }, ev.ch)
        }
        Vk::Function(number) if (1..=12).contains(&number) => {
            KeyInput::Slot(KeySlot::Function { number, state }, ev.ch)
        }
        Vk::Numpad(d) if m.alt && d <= 9 => KeyInput::Keypad(d),
        _ if m.alt => {
            if ev.ch == '\0' {
                KeyInput::Ignore
            } else {
                KeyInput::Char(ev.ch)
            }
        }
        _ if ev.ch == '\0' => {
            if m.ctrl && ev.key == Vk::Char {
                KeyInput::Slot(KeySlot::Control { code: 0, shift: m.shift }, '\0')
            } else {
                KeyInput::Ignore
            }
        }
        _ if (ev.ch as u32) < 32 => KeyInput::Slot(
            KeySlot::Control {
                code: ev.ch as u8,
                shift: m.shift,
            },
            ev.ch,
        ),
        _ => KeyInput::Char(ev.ch),
    }
}

// ── キーマップ ──────────────────────────────

/// 3 つの表をまとめたキーマップ。
#[derive(Debug, Clone)]
pub struct Keymap {
    control: [[Binding; 2]; 32],
    edit: [[Binding; 4]; 14],
    function: [[Binding; 4]; 12],
}

impl Default for Keymap {
    fn default() -> Self {
        Keymap::new()
    }
}

fn row<const N: usize>(fs: [Function; N]) -> [Binding; N] {
    fs.map(Binding::from_function)
}

impl Keymap {
    /// 既定の割り当てでキーマップを作る。
    pub fn new() -> Self {
        use Function::*;

        let control_defaults: [[Function; 2]; 32] = [
            [Ignore, Ignore],          // ^@
            [BegLine, Ignore],         // ^A
            [CharLeft, Ignore],        // ^B
            [Ignore, Ignore],          // ^C
            [DelRight, ListDir],       // ^D
            [EndLine, Ignore],         // ^E
            [CharRight, List],         // ^F
            [StoreErase, Ignore],      // ^G
            [DelLeft, Ignore],         // ^H
            [Cycle, CycleBack],        // ^I
            [VarSubst, Ignore],        // ^J
            [DelEndLine, Ignore],      // ^K
            [DelWordLeft, Ignore],     // ^L
            [Enter, Ignore],           // ^M
            [NextLine, Ignore],        // ^N
            [DelEndExec, Ignore],      // ^O
            [PrevLine, Ignore],        // ^P
            [Quote, Ignore],           // ^Q
            [SearchBack, Ignore],      // ^R
            [CmdSep, SelectFiles],     // ^S
            [Transpose, Ignore],       // ^T
            [PrevLine, Ignore],        // ^U
            [SearchForw, Ignore],      // ^V
            [DelWordRight, Ignore],    // ^W
            [DelBegLine, Ignore],      // ^X
            [AutoRecall, Ignore],      // ^Y
            [Default, Ignore],         // ^Z
            [Erase, Ignore],           // ^[
            [CycleDir, CycleDirBack],  // ^\
            [CmdSep, Ignore],          // ^]
            [Wipe, Ignore],            // ^^
            [MacroToggle, Ignore],     // ^_
        ];

        let edit_defaults: [[Function; 4]; 14] = [
            [FirstLine, Ignore, Ignore, Ignore],            // PgUp
            [LastLine, Ignore, Ignore, Ignore],             // PgDn
            [EndLine, Ignore, DelEndLine, Ignore],          // End
            [BegLine, Ignore, DelBegLine, Ignore],          // Home
            [CharLeft, Ignore, WordLeft, StringLeft],       // Left
            [PrevLine, Ignore, Ignore, Ignore],             // Up
            [CharRight, Ignore, WordRight, StringRight],    // Right
            [NextLine, Ignore, Ignore, Ignore],             // Down
            [DelLeft, DelLeft, DelWordLeft, DelArg],        // Bksp
            [Cycle, CycleBack, List, ListDir],              // Tab
            [Enter, Enter, Ignore, Ignore],                 // Enter
            [Erase, Erase, Ignore, Ignore],                 // Esc
            [InsOvr, Ignore, Ignore, Ignore],               // Ins
            [DelRight, Ignore, Ignore, Ignore],             // Del
        ];

        let function = array::from_fn(|i| match i + 1 {
            8 => row([SearchBack, SearchForw, Ignore, Ignore]),
            12 => row([Record, Ignore, Ignore, Ignore]),
            _ => row([Ignore; 4]),
        });

        Keymap {
            control: control_defaults.map(row::<2>),
            edit: edit_defaults.map(row::<4>),
            function,
        }
    }

    pub fn get(&self, slot: KeySlot) -> &Binding {
        match slot {
            KeySlot::Control { code, shift } => &self.control[code as usize & 31][shift as usize],
            KeySlot::Edit { key, state } => &self.edit[key.index()][state.index()],
            KeySlot::Function { number, state } => {
                &self.function[(number as usize).clamp(1, 12) - 1][state.index()]
            }
        }
    }

    fn get_mut(&mut self, slot: KeySlot) -> &mut Binding {
        match slot {
            KeySlot::Control { code, shift } => {
                &mut self.control[code as usize & 31][shift as usize]
            }
            KeySlot::Edit { key, state } => &mut self.edit[key.index()][state.index()],
            KeySlot::Function { number, state } => {
                &mut self.function[(number as usize).clamp(1, 12) - 1][state.index()]
            }
        }
    }

    /// 割り当てを変更し、以前の割り当てを返す。
    pub fn set(&mut self, slot: KeySlot, binding: Binding) -> Binding {
        std::mem::replace(self.get_mut(slot), binding)
    }

    /// 一覧表示の対象となるスロット。制御文字・編集キー・ファンクションキーの 3 群に分け、
    /// 修飾なしは常に、修飾付きは無視以外のものだけを含める。
    pub fn listing(&self) -> [Vec<KeySlot>; 3] {
        let keep = |slot: KeySlot, plain: bool| plain || *self.get(slot) != Binding::Ignore;

        let mut control = Vec::new();
        for code in 0..32u8 {
            for shift in [false, true] {
                let slot = KeySlot::Control { code, shift };
                if keep(slot, !shift) {
                    control.push(slot);
                }
            }
        }

        let mut edit = Vec::new();
        for key in EditKey::ALL {
            for state in KeyState::ALL {
                let slot = KeySlot::Edit { key, state };
                if keep(slot, state == KeyState::Plain) {
                    edit.push(slot);
                }
            }
        }

        let mut function = Vec::new();
        for number in 1..=12u8 {
            for state in KeyState::ALL {
                let slot = KeySlot::Function { number, state };
                if keep(slot, state == KeyState::Plain) {
                    function.push(slot);
                }
            }
        }

        [control, edit, function]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::Modifiers;

    fn event(ch: char, key: Vk, mods: Modifiers) -> KeyEvent {
        KeyEvent {
            ch,
            key,
            mods,
            repeat: 1,
            down: true,
        }
    }

    #[test]
    fn function_names_sorted() {
        for pair in FUNCTION_NAMES.windows(2) {
            assert_eq!(cmp_name(pair[0].0, pair[1].0), Ordering::Less);
        }
    }

    #[test]
    fn function_lookup() {
        assert_eq!(Function::from_name("delwordleft"), Some(Function::DelWordLeft));
        assert_eq!(Function::from_name("CYCLEDIRBACK"), Some(Function::CycleDirBack));
        assert_eq!(Function::from_name("Nope"), None);
        assert_eq!(Function::SearchForw.name(), "SearchForw");
    }

    #[test]
    fn parse_key_names() {
        assert_eq!(KeySlot::parse("^A"), Some(KeySlot::Control { code: 1, shift: false }));
        assert_eq!(KeySlot::parse("#^d"), Some(KeySlot::Control { code: 4, shift: true }));
        assert_eq!(KeySlot::parse("^_"), Some(KeySlot::Control { code: 31, shift: false }));
        assert_eq!(
            KeySlot::parse("^left"),
            Some(KeySlot::Edit { key: EditKey::Left, state: KeyState::Ctrl })
        );
        assert_eq!(
            KeySlot::parse("#^Bksp"),
            Some(KeySlot::Edit { key: EditKey::Bksp, state: KeyState::Alt })
        );
        assert_eq!(
            KeySlot::parse("@F12"),
            Some(KeySlot::Function { number: 12, state: KeyState::Alt })
        );
        assert_eq!(KeySlot::parse("F13"), None);
        assert_eq!(KeySlot::parse("F0"), None);
        assert_eq!(KeySlot::parse("X"), None);
        assert_eq!(KeySlot::parse("Nope"), None);
    }

    #[test]
    fn slot_names_roundtrip_through_parse() {
        let km = Keymap::new();
        for group in km.listing() {
            for slot in group {
                assert_eq!(KeySlot::parse(slot.name().trim_start()), Some(slot));
            }
        }
    }

    #[test]
    fn default_bindings() {
        let km = Keymap::new();
        let ctrl = |c: u8| km.get(KeySlot::Control { code: c, shift: false }).function();
        assert_eq!(ctrl(1), Function::BegLine);
        assert_eq!(ctrl(19), Function::CmdSep);
        assert_eq!(ctrl(3), Function::Ignore);
        assert_eq!(
            km.get(KeySlot::Edit { key: EditKey::Tab, state: KeyState::Alt }).function(),
            Function::ListDir
        );
        assert_eq!(
            km.get(KeySlot::Function { number: 8, state: KeyState::Shift }).function(),
            Function::SearchForw
        );
        assert_eq!(
            km.get(KeySlot::Function { number: 12, state: KeyState::Plain }).function(),
            Function::Record
        );
    }

    #[test]
    fn classify_events() {
        let none = Modifiers::default();
        let ctrl = Modifiers { ctrl: true, ..none };
        let shift_ctrl = Modifiers { shift: true, ctrl: true, ..none };
        let alt = Modifiers { alt: true, ..none };

        assert_eq!(classify(&event('a', Vk::Char, none)), KeyInput::Char('a'));
        assert_eq!(
            classify(&event('\u{1}', Vk::Char, ctrl)),
            KeyInput::Slot(KeySlot::Control { code: 1, shift: false }, '\u{1}')
        );
        assert_eq!(
            classify(&event('\0', Vk::Edit(EditKey::Bksp), shift_ctrl)),
            KeyInput::Slot(KeySlot::Edit { key: EditKey::Bksp, state: KeyState::Alt }, '\0')
        );
        assert_eq!(
            classify(&event('\0', Vk::Edit(EditKey::Left), alt)),
            KeyInput::Slot(KeySlot::Edit { key: EditKey::Left, state: KeyState::Alt }, '\0')
        );
        assert_eq!(classify(&event('\0', Vk::Numpad(0), alt)), KeyInput::Keypad(0));
        assert_eq!(classify(&event('x', Vk::Char, alt)), KeyInput::Char('x'));
        assert_eq!(classify(&event('\0', Vk::Other, none)), KeyInput::Ignore);
    }

    #[test]
    fn set_returns_previous() {
        let mut km = Keymap::new();
        let slot = KeySlot::Control { code: 1, shift: false };
        let old = km.set(slot, Binding::Ignore);
        assert_eq!(old, Binding::Function(Function::BegLine));
        assert_eq!(km.get(slot), &Binding::Ignore);
    }

    #[test]
    fn listing_skips_ignored_modified_keys() {
        let km = Keymap::new();
        let [control, edit, function] = km.listing();
        assert_eq!(control.len(), 32 + 5);
        assert!(edit.contains(&KeySlot::Edit { key: EditKey::Tab, state: KeyState::Alt }));
        assert!(!edit.contains(&KeySlot::Edit { key: EditKey::Up, state: KeyState::Shift }));
        assert_eq!(function.len(), 12 + 1);
    }
}
