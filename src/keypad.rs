//! Alt+テンキーによる文字合成。
//!
//! Alt を押したままテンキーで数字を打ち、Alt を離した時点の値を文字にする。
//! 最初の数字が 0 なら 16 進で、テンキーの記号キーが A..F を表す。
//!
//! | キー | 値 |
//! |------|----|
//! | `/` | A |
//! | `*` | B |
//! | `-` | C |
//! | `+` | D |
//! | Enter（Alt+Enter） | E |
//! | `.` | F |
//!
//! 値が 256 未満なら Latin-1、それ以上なら Unicode のコードポイントとして扱う。
//!
//! ## Alt+Enter の待ち合わせ
//!
//! Alt+Enter は端末によってはキーイベントとして届かず、別経路で通知される
//! （[`Terminal::alt_enter`]）。16 進入力の間だけ補助スレッドがキーイベントを読んで
//! チャネルへ流し、メインスレッドはキーとその通知の両方を待つ。
//! 補助スレッドは Alt の解放を読んだら終わり、戻る前に必ず join される。

use crossbeam::channel::{self, Receiver};
use crossbeam::select;
use log::debug;

use crate::terminal::{KeyEvent, Terminal, Vk};

/// テンキーのキー番号（0..=15）を数字の値にする。
const VK_DIGIT: [u32; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0xB, 0xD, 0xE, 0xC, 0xF, 0xA];

/// Alt+Enter が表す桁（テンキーの区切りキー）。
const ALT_ENTER_DIGIT: u8 = 12;

/// 合成中の数値。
struct Composer {
    num: u32,
    base: u32,
}

impl Composer {
    fn new(first: u8) -> Composer {
        let num = first as u32;
        Composer {
            num,
            base: if num == 0 { 16 } else { 10 },
        }
    }

    fn is_hex(&self) -> bool {
        self.base == 16
    }

    fn digit(&mut self, key: u8) {
        if let Some(&d) = VK_DIGIT.get(key as usize) {
            self.num = self.num.wrapping_mul(self.base).wrapping_add(d);
        }
    }

    /// イベントを処理する。Alt が離されたら `true`。
    fn feed(&mut self, ev: &KeyEvent) -> bool {
        if !ev.down {
            return ev.key == Vk::Menu;
        }
        if let Vk::Numpad(key) = ev.key {
            self.digit(key);
        }
        false
    }

    fn finish(self) -> char {
        if self.num < 256 {
            char::from(self.num as u8)
        } else {
            char::from_u32(self.num).unwrap_or(char::REPLACEMENT_CHARACTER)
        }
    }
}

/// 最初の数字 `first`（0..=9）に続く Alt+テンキー入力を読み、合成した文字を返す。
/// 入力が閉じられたらそこまでの値で打ち切る。
pub fn compose<T: Terminal + ?Sized>(term: &mut T, first: u8) -> char {
    let mut comp = Composer::new(first);
    if comp.is_hex() {
        let alt = term.alt_enter();
        compose_hex(term, &mut comp, alt);
    } else {
        while let Some(ev) = term.read_key() {
            if comp.feed(&ev) {
                break;
            }
        }
    }
    debug!("keypad composed U+{:04X}", comp.num);
    comp.finish()
}

fn compose_hex<T: Terminal + ?Sized>(term: &mut T, comp: &mut Composer, alt: Option<Receiver<()>>) {
    let alt = alt.unwrap_or_else(channel::never);
    let (tx, keys) = channel::unbounded::<KeyEvent>();

    std::thread::scope(|s| {
        s.spawn(move || {
            while let Some(ev) = term.read_key() {
                let released = !ev.down && ev.key == Vk::Menu;
                if tx.send(ev).is_err() || released {
                    break;
                }
            }
        });

        loop {
            // 先に届いたキーを優先する
            let ev = match keys.try_recv() {
                Ok(ev) => Some(ev),
                Err(_) => select! {
                    recv(keys) -> ev => match ev {
                        Ok(ev) => Some(ev),
                        Err(_) => break,
                    },
                    recv(alt) -> signal => {
                        // 通知より前に届いていたキーを先に処理する
                        let mut released = false;
                        while let Ok(ev) = keys.try_recv() {
                            released |= comp.feed(&ev);
                        }
                        if signal.is_ok() {
                            comp.digit(ALT_ENTER_DIGIT);
                        }
                        if released {
                            break;
                        }
                        None
                    }
                },
            };
            if let Some(ev) = ev {
                if comp.feed(&ev) {
                    break;
                }
            }
        }
        while alt.try_recv().is_ok() {
            comp.digit(ALT_ENTER_DIGIT);
        }
        drop(keys);
    });
}
