//! 端末の抽象化。
//!
//! エディタが必要とする端末操作（キーイベントの読み取り、位置指定の書き込み、カーソル移動、
//! スクロール、ベル）を [`Terminal`] トレイトにまとめる。
//!
//! | 実装 | 用途 |
//! |------|------|
//! | [`RawTerminal`] | 実端末。termios の raw モードと ANSI エスケープシーケンス |
//! | [`VirtualTerminal`] | メモリ上の画面とスクリプト化したキー入力。テスト用 |
//!
//! ## 座標
//!
//! 座標は 0 始まりの `(x, y)`。`RawTerminal` では画面バッファ＝表示中のウィンドウで、
//! 現在位置は DSR（`ESC [ 6 n`）で問い合わせる。
//!
//! ## 中断
//!
//! [`BreakSignal`] は Ctrl+C（raw モードでは `0x03`）で立つカウンタ。
//! 読み取り中に 2 以上になったらエディタは入力を消去する。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};

use crate::keymap::EditKey;

// ── 座標と画面情報 ──────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

impl Coord {
    pub fn new(x: usize, y: usize) -> Coord {
        Coord { x, y }
    }
}

/// 画面バッファの情報。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenInfo {
    pub width: usize,
    pub height: usize,
    pub cursor: Coord,
    /// 表示中のウィンドウの最上行と最下行
    pub window_top: usize,
    pub window_bottom: usize,
}

// ── キーイベント ──────────────────────────────

/// 修飾キーの状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

/// 仮想キー。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vk {
    /// 文字キー（文字は [`KeyEvent::ch`]）
    Char,
    Edit(EditKey),
    /// F1..F12
    Function(u8),
    /// テンキー。0..=9 は数字、10 以降は `*` `+` 区切り `-` `.` `/` の順
    Numpad(u8),
    /// Alt キー自体
    Menu,
    Shift,
    Control,
    Other,
}

/// 1 回のキーイベント。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// 入力された文字。なければ `'\0'`
    pub ch: char,
    pub key: Vk,
    pub mods: Modifiers,
    /// オートリピート回数（1 以上）
    pub repeat: u16,
    /// 押下なら真、離したなら偽
    pub down: bool,
}

impl KeyEvent {
    pub fn char(ch: char) -> KeyEvent {
        KeyEvent {
            ch,
            key: Vk::Char,
            mods: Modifiers::default(),
            repeat: 1,
            down: true,
        }
    }

    /// 制御文字（`^A` なら `ctrl('a')`）。
    pub fn ctrl(letter: char) -> KeyEvent {
        let code = (letter as u32 | 0x20).wrapping_sub(0x60) & 31;
        KeyEvent {
            ch: char::from_u32(code).unwrap_or('\0'),
            key: Vk::Char,
            mods: Modifiers {
                ctrl: true,
                ..Modifiers::default()
            },
            repeat: 1,
            down: true,
        }
    }

    pub fn key(key: EditKey) -> KeyEvent {
        KeyEvent::key_with(key, Modifiers::default())
    }

    pub fn key_with(key: EditKey, mods: Modifiers) -> KeyEvent {
        let ch = match key {
            EditKey::Bksp => '\u{8}',
            EditKey::Tab => '\t',
            EditKey::Enter => '\r',
            EditKey::Esc => '\u{1b}',
            _ => '\0',
        };
        KeyEvent {
            ch,
            key: Vk::Edit(key),
            mods,
            repeat: 1,
            down: true,
        }
    }

    pub fn function(number: u8, mods: Modifiers) -> KeyEvent {
        KeyEvent {
            ch: '\0',
            key: Vk::Function(number),
            mods,
            repeat: 1,
            down: true,
        }
    }

    /// 修飾キー単独の押下・解放。
    pub fn modifier(key: Vk, down: bool) -> KeyEvent {
        KeyEvent {
            ch: '\0',
            key,
            mods: Modifiers::default(),
            repeat: 1,
            down,
        }
    }

    pub fn is_modifier(&self) -> bool {
        matches!(self.key, Vk::Shift | Vk::Control | Vk::Menu)
    }
}

// ── 中断シグナル ──────────────────────────────

/// Ctrl+C による中断を伝えるカウンタ。
///
/// 読み取り開始時に 1 にし（`arm`）、中断のたびに 1 増える。
/// 2 以上なら読み取り中に中断があったことを示す。
#[derive(Debug, Clone, Default)]
pub struct BreakSignal(Arc<AtomicU32>);

impl BreakSignal {
    pub fn new() -> BreakSignal {
        BreakSignal::default()
    }

    pub fn raise(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// 読み取り開始。直前の読み取りの外で中断があったかを返す。
    pub fn arm(&self) -> bool {
        self.0.swap(1, Ordering::SeqCst) != 0
    }

    pub fn disarm(&self) {
        self.0.store(0, Ordering::SeqCst);
    }

    /// 読み取り中に受理されていない中断があるか。
    pub fn pending(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 1
    }

    /// 読み取り中の中断を確認し、あれば受理して `true`。
    pub fn take(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n > 1).then_some(1))
            .is_ok()
    }
}

// ── Terminal トレイト ──────────────────────────────

/// エディタから見た端末。
pub trait Terminal: Send {
    /// 行編集を始める（raw モードへ切り替えるなど）。
    fn begin_edit(&mut self) {}

    /// 行編集を終える。
    fn end_edit(&mut self) {}

    /// 次のキーイベント。入力が閉じられたら `None`。
    fn read_key(&mut self) -> Option<KeyEvent>;

    fn screen(&mut self) -> ScreenInfo;

    /// `at` から `text` を書く。`attr` が `None` なら既定の色。
    fn write_at(&mut self, at: Coord, text: &str, attr: Option<u8>);

    /// `at` から `count` 個の空白を書く。
    fn fill(&mut self, at: Coord, count: usize, attr: Option<u8>);

    fn set_cursor(&mut self, at: Coord);

    /// カーソルの大きさ（%）。0 は端末の既定に戻す。
    fn set_cursor_size(&mut self, percent: u8);

    /// カーソル位置から流し込みで書く（改行・折り返し・スクロールあり）。
    fn write(&mut self, text: &str);

    /// 画面を `lines` 行上へスクロールする。
    fn scroll_up(&mut self, lines: usize);

    fn beep(&mut self);

    /// Alt+Enter を別経路で通知する受信口。対応しない端末は `None`。
    fn alt_enter(&mut self) -> Option<Receiver<()>> {
        None
    }
}

// ── RawTerminal ──────────────────────────────

/// RAII ガードで raw モードを管理する。Drop で元の termios を復元する。
///
/// | フラグ | 操作 |
/// |--------|------|
/// | `c_iflag` | `BRKINT\|ICRNL\|INPCK\|ISTRIP\|IXON` OFF |
/// | `c_oflag` | `OPOST` ON のまま |
/// | `c_cflag` | `CS8` ON |
/// | `c_lflag` | `ECHO\|ICANON\|IEXTEN\|ISIG` OFF（Ctrl+C はキー入力として届く） |
/// | `VMIN`/`VTIME` | `1` / `0` |
struct RawMode {
    orig: libc::termios,
    fd: i32,
}

impl RawMode {
    fn enable(fd: i32) -> Option<Self> {
        let mut orig: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut orig) } != 0 {
            return None;
        }
        let mut raw = orig;
        raw.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
        raw.c_cflag |= libc::CS8;
        raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;
        unsafe {
            libc::tcsetattr(fd, libc::TCSAFLUSH, &raw);
        }
        Some(Self { orig, fd })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(self.fd, libc::TCSAFLUSH, &self.orig);
        }
    }
}

/// 実端末。入力は stdin、出力は stdout。
pub struct RawTerminal {
    fd_in: i32,
    fd_out: i32,
    raw: Option<RawMode>,
    /// DSR 応答の読み取り中に届いたキー入力
    pending: VecDeque<u8>,
    brk: BreakSignal,
}

impl RawTerminal {
    pub fn new(brk: BreakSignal) -> Self {
        RawTerminal {
            fd_in: libc::STDIN_FILENO,
            fd_out: libc::STDOUT_FILENO,
            raw: None,
            pending: VecDeque::new(),
            brk,
        }
    }

    /// stdin が端末かどうか。
    pub fn is_tty(&self) -> bool {
        unsafe { libc::isatty(self.fd_in) == 1 }
    }

    fn poll(&self, timeout_ms: i32) -> bool {
        let mut pfd = libc::pollfd {
            fd: self.fd_in,
            events: libc::POLLIN,
            revents: 0,
        };
        unsafe { libc::poll(&mut pfd, 1, timeout_ms) > 0 }
    }

    fn read_byte(&mut self) -> Option<u8> {
        if let Some(b) = self.pending.pop_front() {
            return Some(b);
        }
        let mut buf = [0u8; 1];
        loop {
            let n = unsafe { libc::read(self.fd_in, buf.as_mut_ptr() as *mut libc::c_void, 1) };
            if n == 1 {
                return Some(buf[0]);
            }
            if n < 0 && std::io::Error::last_os_error().kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return None;
        }
    }

    /// 後続バイトを待って読む。`timeout_ms` 以内に来なければ `None`。
    fn read_byte_timeout(&mut self, timeout_ms: i32) -> Option<u8> {
        if !self.pending.is_empty() || self.poll(timeout_ms) {
            self.read_byte()
        } else {
            None
        }
    }

    fn out(&self, s: &str) {
        write_all(self.fd_out, s);
    }

    fn window_size(&self) -> (usize, usize) {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        let ok = unsafe { libc::ioctl(self.fd_out, libc::TIOCGWINSZ, &mut ws) } == 0;
        if ok && ws.ws_col > 0 && ws.ws_row > 0 {
            (ws.ws_col as usize, ws.ws_row as usize)
        } else {
            (80, 24)
        }
    }

    /// DSR でカーソル位置を問い合わせる。応答以外のバイトは保留する。
    fn query_cursor(&mut self) -> Option<Coord> {
        let _guard = if self.raw.is_none() {
            Some(RawMode::enable(self.fd_in)?)
        } else {
            None
        };
        self.out("\x1b[6n");
        let mut stray = Vec::new();
        let mut reply = Vec::new();
        let mut in_reply = false;
        while let Some(b) = {
            if self.poll(200) {
                let mut buf = [0u8; 1];
                let n =
                    unsafe { libc::read(self.fd_in, buf.as_mut_ptr() as *mut libc::c_void, 1) };
                (n == 1).then_some(buf[0])
            } else {
                None
            }
        } {
            if !in_reply && b == 0x1b {
                in_reply = true;
                reply.clear();
            } else if in_reply {
                if b == b'R' {
                    break;
                }
                reply.push(b);
            } else {
                stray.push(b);
            }
        }
        self.pending.extend(stray);
        let reply = String::from_utf8(reply).ok()?;
        let (row, col) = reply.strip_prefix('[')?.split_once(';')?;
        let row: usize = row.parse().ok()?;
        let col: usize = col.parse().ok()?;
        Some(Coord::new(col.saturating_sub(1), row.saturating_sub(1)))
    }

    /// ESC の後のシーケンスを解析する。
    fn read_escape(&mut self) -> KeyEvent {
        let Some(b) = self.read_byte_timeout(50) else {
            return KeyEvent::key(EditKey::Esc);
        };
        match b {
            b'[' => self.read_csi(),
            b'O' => match self.read_byte_timeout(50) {
                Some(f @ b'P'..=b'S') => KeyEvent::function(f - b'P' + 1, Modifiers::default()),
                Some(c) => csi_final(c, &[]).unwrap_or(unknown()),
                None => unknown(),
            },
            0x1b => KeyEvent::key(EditKey::Esc),
            0x7f => KeyEvent::key_with(EditKey::Bksp, alt()),
            b => {
                let ch = self.decode_char(b).unwrap_or('\0');
                KeyEvent {
                    ch,
                    key: Vk::Char,
                    mods: alt(),
                    repeat: 1,
                    down: true,
                }
            }
        }
    }

    fn read_csi(&mut self) -> KeyEvent {
        let mut params = Vec::new();
        loop {
            let Some(b) = self.read_byte_timeout(50) else {
                return unknown();
            };
            if (0x40..=0x7e).contains(&b) {
                let nums: Vec<u32> = String::from_utf8_lossy(&params)
                    .split(';')
                    .map(|p| p.parse().unwrap_or(0))
                    .collect();
                return csi_final(b, &nums).unwrap_or(unknown());
            }
            params.push(b);
        }
    }

    fn decode_char(&mut self, first: u8) -> Option<char> {
        let len = match first {
            b if b < 0x80 => return Some(b as char),
            b if b & 0xE0 == 0xC0 => 2,
            b if b & 0xF0 == 0xE0 => 3,
            b if b & 0xF8 == 0xF0 => 4,
            _ => return None,
        };
        let mut buf = [0u8; 4];
        buf[0] = first;
        for slot in buf.iter_mut().take(len).skip(1) {
            *slot = self.read_byte()?;
        }
        std::str::from_utf8(&buf[..len]).ok()?.chars().next()
    }
}

fn alt() -> Modifiers {
    Modifiers {
        alt: true,
        ..Modifiers::default()
    }
}

fn unknown() -> KeyEvent {
    KeyEvent {
        ch: '\0',
        key: Vk::Other,
        mods: Modifiers::default(),
        repeat: 1,
        down: true,
    }
}

/// xterm 形式の修飾パラメータ（1 + Shift 1 + Alt 2 + Ctrl 4）。
fn xterm_mods(param: Option<&u32>) -> Modifiers {
    let m = param.copied().unwrap_or(1).saturating_sub(1);
    Modifiers {
        shift: m & 1 != 0,
        alt: m & 2 != 0,
        ctrl: m & 4 != 0,
    }
}

/// CSI・SS3 シーケンスの終端文字とパラメータからキーイベントを作る。
fn csi_final(fin: u8, params: &[u32]) -> Option<KeyEvent> {
    let mods = xterm_mods(params.get(1));
    let edit = |k| Some(KeyEvent::key_with(k, mods));
    match fin {
        b'A' => edit(EditKey::Up),
        b'B' => edit(EditKey::Down),
        b'C' => edit(EditKey::Right),
        b'D' => edit(EditKey::Left),
        b'H' => edit(EditKey::Home),
        b'F' => edit(EditKey::End),
        b'Z' => Some(KeyEvent::key_with(
            EditKey::Tab,
            Modifiers {
                shift: true,
                ..mods
            },
        )),
        b'P'..=b'S' => Some(KeyEvent::function(fin - b'P' + 1, mods)),
        b'~' => {
            let n = params.first().copied().unwrap_or(0);
            match n {
                1 | 7 => edit(EditKey::Home),
                2 => edit(EditKey::Ins),
                3 => edit(EditKey::Del),
                4 | 8 => edit(EditKey::End),
                5 => edit(EditKey::PgUp),
                6 => edit(EditKey::PgDn),
                11..=15 => Some(KeyEvent::function((n - 10) as u8, mods)),
                17..=21 => Some(KeyEvent::function((n - 11) as u8, mods)),
                23 | 24 => Some(KeyEvent::function((n - 12) as u8, mods)),
                _ => None,
            }
        }
        _ => None,
    }
}

impl Terminal for RawTerminal {
    fn begin_edit(&mut self) {
        if self.raw.is_none() {
            self.raw = RawMode::enable(self.fd_in);
        }
    }

    fn end_edit(&mut self) {
        self.raw = None;
    }

    fn read_key(&mut self) -> Option<KeyEvent> {
        let byte = self.read_byte()?;
        let ev = match byte {
            b'\r' => KeyEvent::key(EditKey::Enter),
            0x7f => KeyEvent::key(EditKey::Bksp),
            b'\t' => KeyEvent::key(EditKey::Tab),
            0x1b => self.read_escape(),
            0x03 => {
                self.brk.raise();
                KeyEvent::ctrl('c')
            }
            0x00 => KeyEvent {
                ch: '\0',
                key: Vk::Char,
                mods: Modifiers {
                    ctrl: true,
                    ..Modifiers::default()
                },
                repeat: 1,
                down: true,
            },
            b if b < 0x20 => KeyEvent {
                ch: b as char,
                key: Vk::Char,
                mods: Modifiers {
                    ctrl: true,
                    ..Modifiers::default()
                },
                repeat: 1,
                down: true,
            },
            b => match self.decode_char(b) {
                Some(ch) => KeyEvent::char(ch),
                None => unknown(),
            },
        };
        Some(ev)
    }

    fn screen(&mut self) -> ScreenInfo {
        let (width, height) = self.window_size();
        let cursor = self
            .query_cursor()
            .unwrap_or(Coord::new(0, height.saturating_sub(1)));
        ScreenInfo {
            width,
            height,
            cursor,
            window_top: 0,
            window_bottom: height.saturating_sub(1),
        }
    }

    fn write_at(&mut self, at: Coord, text: &str, attr: Option<u8>) {
        let sgr = attr.map(crate::highlight::sgr).unwrap_or_default();
        self.out(&format!("\x1b[{};{}H{}{}\x1b[0m", at.y + 1, at.x + 1, sgr, text));
    }

    fn fill(&mut self, at: Coord, count: usize, attr: Option<u8>) {
        self.write_at(at, &" ".repeat(count), attr);
    }

    fn set_cursor(&mut self, at: Coord) {
        self.out(&format!("\x1b[{};{}H", at.y + 1, at.x + 1));
    }

    fn set_cursor_size(&mut self, percent: u8) {
        let shape = match percent {
            0 => 0,
            p if p >= 50 => 2,
            _ => 4,
        };
        self.out(&format!("\x1b[{} q", shape));
    }

    fn write(&mut self, text: &str) {
        self.out(text);
    }

    fn scroll_up(&mut self, lines: usize) {
        if lines > 0 {
            self.out(&format!("\x1b[{}S", lines));
        }
    }

    fn beep(&mut self) {
        self.out("\x07");
    }
}

/// `libc::write` で直接出力する（Rust の stdout バッファをバイパス）。
fn write_all(fd: i32, s: &str) {
    let bytes = s.as_bytes();
    let mut written = 0;
    while written < bytes.len() {
        let n = unsafe {
            libc::write(
                fd,
                bytes[written..].as_ptr() as *const libc::c_void,
                bytes.len() - written,
            )
        };
        if n <= 0 {
            break;
        }
        written += n as usize;
    }
}

// ── VirtualTerminal ──────────────────────────────

/// スクリプト化した入力の 1 項目。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Key(KeyEvent),
    /// Ctrl+Break
    Break,
    /// Alt+Enter（別経路で通知）
    AltEnter,
}

/// メモリ上の端末。画面は `width × height` の格子で、各セルは文字と色を持つ。
pub struct VirtualTerminal {
    width: usize,
    height: usize,
    cells: Vec<Vec<(char, Option<u8>)>>,
    cursor: Coord,
    input: VecDeque<Scripted>,
    brk: BreakSignal,
    alt_tx: Sender<()>,
    alt_rx: Receiver<()>,
    pub beeps: usize,
    pub cursor_size: u8,
    pub scrolled: usize,
}

impl VirtualTerminal {
    pub fn new(width: usize, height: usize, brk: BreakSignal) -> Self {
        let (alt_tx, alt_rx) = channel::unbounded();
        VirtualTerminal {
            width,
            height,
            cells: vec![vec![(' ', None); width]; height],
            cursor: Coord::default(),
            input: VecDeque::new(),
            brk,
            alt_tx,
            alt_rx,
            beeps: 0,
            cursor_size: 0,
            scrolled: 0,
        }
    }

    pub fn push(&mut self, item: Scripted) {
        self.input.push_back(item);
    }

    pub fn push_key(&mut self, ev: KeyEvent) {
        self.input.push_back(Scripted::Key(ev));
    }

    /// 文字列を 1 文字ずつキー入力として積む。
    pub fn type_str(&mut self, s: &str) {
        for ch in s.chars() {
            self.push_key(KeyEvent::char(ch));
        }
    }

    pub fn cursor(&self) -> Coord {
        self.cursor
    }

    pub fn set_cursor_pos(&mut self, at: Coord) {
        self.cursor = at;
    }

    /// `y` 行目の内容（末尾の空白を除く）。
    pub fn row(&self, y: usize) -> String {
        self.cells
            .get(y)
            .map(|r| r.iter().map(|c| c.0).collect::<String>().trim_end().to_string())
            .unwrap_or_default()
    }

    pub fn attr_at(&self, at: Coord) -> Option<u8> {
        self.cells.get(at.y).and_then(|r| r.get(at.x)).and_then(|c| c.1)
    }

    fn put(&mut self, at: Coord, ch: char, attr: Option<u8>) {
        if at.y < self.height && at.x < self.width {
            self.cells[at.y][at.x] = (ch, attr);
        }
    }

    fn advance(&self, at: Coord) -> Coord {
        if at.x + 1 >= self.width {
            Coord::new(0, at.y + 1)
        } else {
            Coord::new(at.x + 1, at.y)
        }
    }

    fn scroll_once(&mut self) {
        self.cells.remove(0);
        self.cells.push(vec![(' ', None); self.width]);
        self.scrolled += 1;
    }
}

impl Terminal for VirtualTerminal {
    fn read_key(&mut self) -> Option<KeyEvent> {
        match self.input.pop_front()? {
            Scripted::Key(ev) => Some(ev),
            Scripted::Break => {
                self.brk.raise();
                Some(KeyEvent::modifier(Vk::Other, false))
            }
            Scripted::AltEnter => {
                let _ = self.alt_tx.send(());
                Some(KeyEvent::modifier(Vk::Other, false))
            }
        }
    }

    fn screen(&mut self) -> ScreenInfo {
        ScreenInfo {
            width: self.width,
            height: self.height,
            cursor: self.cursor,
            window_top: 0,
            window_bottom: self.height - 1,
        }
    }

    fn write_at(&mut self, at: Coord, text: &str, attr: Option<u8>) {
        let mut pos = at;
        for ch in text.chars() {
            self.put(pos, ch, attr);
            pos = self.advance(pos);
        }
    }

    fn fill(&mut self, at: Coord, count: usize, attr: Option<u8>) {
        let mut pos = at;
        for _ in 0..count {
            self.put(pos, ' ', attr);
            pos = self.advance(pos);
        }
    }

    fn set_cursor(&mut self, at: Coord) {
        self.cursor = at;
    }

    fn set_cursor_size(&mut self, percent: u8) {
        self.cursor_size = percent;
    }

    fn write(&mut self, text: &str) {
        for ch in text.chars() {
            match ch {
                '\n' => self.cursor = Coord::new(0, self.cursor.y + 1),
                '\r' => self.cursor.x = 0,
                ch => {
                    let at = self.cursor;
                    self.put(at, ch, None);
                    self.cursor = self.advance(at);
                }
            }
            if self.cursor.y >= self.height {
                self.scroll_once();
                self.cursor.y = self.height - 1;
            }
        }
    }

    fn scroll_up(&mut self, lines: usize) {
        for _ in 0..lines {
            self.scroll_once();
        }
    }

    fn beep(&mut self) {
        self.beeps += 1;
    }

    fn alt_enter(&mut self) -> Option<Receiver<()>> {
        Some(self.alt_rx.clone())
    }
}
