//! キーボードマクロ。
//!
//! キーに割り当てるマクロは 3 形態ある。
//!
//! | 形態 | 定義方法 | 再生 |
//! |------|----------|------|
//! | [`Macro::Text`] | `defk key =text` | 行全体を置き換えて即実行 |
//! | [`Macro::Step`] | 1 ステップだけの記録・定義 | そのステップを実行 |
//! | [`Macro::Steps`] | 記録、または `defk key Func "str" ...` | 1 サイクルに 1 ステップずつ実行 |
//!
//! 記録は [`Recorder`] が受け持ち、終了時に [`collapse`] で最小の形へ畳む。

use log::info;

use crate::keymap::{Binding, Function, KeySlot};

/// 1 ステップ（文字と機能の組）。純粋な機能ステップは文字が `'\0'`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub ch: char,
    pub func: Function,
}

impl Step {
    pub fn func(func: Function) -> Step {
        Step { ch: '\0', func }
    }

    pub fn char(ch: char) -> Step {
        Step {
            ch,
            func: Function::Default,
        }
    }
}

/// キーに割り当てられたマクロ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Macro {
    Text(String),
    Step(Step),
    Steps(Vec<Step>),
}

/// ステップ列を最小の割り当てへ畳む。
///
/// 空なら割り当て解除、文字を持たない 1 ステップならその機能を直接割り当てる。
pub fn collapse(mut steps: Vec<Step>) -> Binding {
    match steps.len() {
        0 => Binding::Ignore,
        1 if steps[0].ch == '\0' => Binding::from_function(steps[0].func),
        1 => Binding::Macro(Macro::Step(steps[0])),
        _ => {
            steps.shrink_to_fit();
            Binding::Macro(Macro::Steps(steps))
        }
    }
}

// ── 記録 ──────────────────────────────

/// 記録中のマクロ。対象スロットは記録中 `Record` に割り当てられる。
#[derive(Debug, Clone)]
pub struct Recorder {
    target: KeySlot,
    steps: Vec<Step>,
}

impl Recorder {
    pub fn start(target: KeySlot) -> Recorder {
        info!("recording macro for {}", target.name().trim_start());
        Recorder {
            target,
            steps: Vec::new(),
        }
    }

    pub fn target(&self) -> KeySlot {
        self.target
    }

    /// 実行済みのステップを記録する。記録を終えるべきなら `true`。
    ///
    /// `Record` で終了、直前が文字入力の `DelLeft` はその文字を取り消し、
    /// `Ignore` は記録しない。行が確定したステップを記録したら終了する。
    pub fn record(&mut self, step: Step, line_done: bool) -> bool {
        match step.func {
            Function::Record => true,
            Function::DelLeft
                if self.steps.last().is_some_and(|s| s.func == Function::Default) =>
            {
                self.steps.pop();
                false
            }
            Function::Ignore => false,
            _ => {
                self.steps.push(step);
                line_done
            }
        }
    }

    /// 記録を終えて割り当てを返す。
    pub fn finish(self) -> (KeySlot, Binding) {
        info!(
            "recorded {} steps for {}",
            self.steps.len(),
            self.target.name().trim_start()
        );
        (self.target, collapse(self.steps))
    }
}

// ── 再生 ──────────────────────────────

/// 再生中のステップ列。
#[derive(Debug, Clone)]
pub struct Playback {
    steps: Vec<Step>,
    next: usize,
}

impl Playback {
    pub fn new(steps: Vec<Step>) -> Playback {
        Playback { steps, next: 0 }
    }

    /// 次のステップ。最後のステップを返したら `finished` が真になる。
    pub fn next_step(&mut self) -> Option<Step> {
        let step = self.steps.get(self.next).copied();
        self.next += 1;
        step
    }

    pub fn finished(&self) -> bool {
        self.next >= self.steps.len()
    }
}

// ── 一覧表示 ──────────────────────────────

/// `lstk` で表示する割り当ての文字列表現。
pub fn describe(binding: &Binding) -> String {
    let mac = match binding {
        Binding::Ignore => return Function::Ignore.name().to_string(),
        Binding::Function(f) => return f.name().to_string(),
        Binding::Macro(m) => m,
    };
    match mac {
        Macro::Text(text) => format!("={}", text),
        Macro::Step(step) if step.ch == '"' => "\"\\\"\"".to_string(),
        Macro::Step(step) => format!("\"{}\"", step.ch),
        Macro::Steps(steps) => describe_steps(steps),
    }
}

fn describe_steps(steps: &[Step]) -> String {
    let mut out = String::new();
    let mut quote = false;
    for (i, step) in steps.iter().enumerate() {
        if step.ch == '\0' {
            if quote {
                out.push_str("\" ");
                quote = false;
            }
            out.push_str(step.func.name());
            out.push(' ');
        } else {
            if !quote {
                out.push('"');
                quote = true;
            }
            if step.ch == '"' {
                let backslashes = steps[..i].iter().rev().take_while(|s| s.ch == '\\').count();
                out.extend(std::iter::repeat('\\').take(backslashes + 1));
            }
            out.push(step.ch);
        }
    }
    if quote {
        let trailing = steps.iter().rev().take_while(|s| s.ch == '\\').count();
        out.extend(std::iter::repeat('\\').take(trailing));
        out.push('"');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{EditKey, KeyState};

    fn slot() -> KeySlot {
        KeySlot::Function {
            number: 5,
            state: KeyState::Plain,
        }
    }

    #[test]
    fn collapse_forms() {
        assert_eq!(collapse(vec![]), Binding::Ignore);
        assert_eq!(
            collapse(vec![Step::func(Function::EndLine)]),
            Binding::Function(Function::EndLine)
        );
        assert_eq!(
            collapse(vec![Step::char('x')]),
            Binding::Macro(Macro::Step(Step::char('x')))
        );
        let steps = vec![Step::char('a'), Step::func(Function::Enter)];
        assert_eq!(collapse(steps.clone()), Binding::Macro(Macro::Steps(steps)));
    }

    #[test]
    fn record_backspace_removes_char() {
        let mut rec = Recorder::start(slot());
        assert!(!rec.record(Step::char('a'), false));
        assert!(!rec.record(Step::char('b'), false));
        assert!(!rec.record(Step::func(Function::DelLeft), false));
        assert!(!rec.record(Step::func(Function::Ignore), false));
        assert!(rec.record(Step::func(Function::Record), false));
        let (target, binding) = rec.finish();
        assert_eq!(target, slot());
        assert_eq!(binding, Binding::Macro(Macro::Step(Step::char('a'))));
    }

    #[test]
    fn record_stops_when_line_done() {
        let mut rec = Recorder::start(slot());
        rec.record(Step::char('l'), false);
        rec.record(Step::char('s'), false);
        assert!(rec.record(Step::func(Function::Enter), true));
        let (_, binding) = rec.finish();
        assert_eq!(
            binding,
            Binding::Macro(Macro::Steps(vec![
                Step::char('l'),
                Step::char('s'),
                Step::func(Function::Enter)
            ]))
        );
    }

    #[test]
    fn delleft_after_function_is_recorded() {
        let mut rec = Recorder::start(KeySlot::Edit {
            key: EditKey::Ins,
            state: KeyState::Ctrl,
        });
        rec.record(Step::func(Function::EndLine), false);
        rec.record(Step::func(Function::DelLeft), false);
        let (_, binding) = rec.finish();
        assert_eq!(
            binding,
            Binding::Macro(Macro::Steps(vec![
                Step::func(Function::EndLine),
                Step::func(Function::DelLeft)
            ]))
        );
    }

    #[test]
    fn playback_walks_steps() {
        let mut p = Playback::new(vec![Step::char('a'), Step::char('b')]);
        assert_eq!(p.next_step(), Some(Step::char('a')));
        assert!(!p.finished());
        assert_eq!(p.next_step(), Some(Step::char('b')));
        assert!(p.finished());
    }

    #[test]
    fn describe_bindings() {
        assert_eq!(describe(&Binding::Ignore), "Ignore");
        assert_eq!(describe(&Binding::Function(Function::Wipe)), "Wipe");
        assert_eq!(describe(&Binding::Macro(Macro::Text("dir".into()))), "=dir");
        assert_eq!(describe(&Binding::Macro(Macro::Step(Step::char('"')))), "\"\\\"\"");
        let steps = vec![
            Step::func(Function::BegLine),
            Step::char('e'),
            Step::char('"'),
            Step::char(' '),
            Step::func(Function::Enter),
        ];
        assert_eq!(
            describe(&Binding::Macro(Macro::Steps(steps))),
            "BegLine \"e\\\" \" Enter "
        );
    }

    #[test]
    fn describe_trailing_backslash() {
        let steps = vec![Step::char('a'), Step::char('\\')];
        assert_eq!(describe(&Binding::Macro(Macro::Steps(steps))), "\"a\\\\\"");
    }
}
