//! cmdread ライブラリ: コンソールシェル向けの行編集・履歴・マクロ・展開。
//!
//! バイナリ本体は `main.rs` のデモ REPL。
//! ホストは [`reader::Console`] にプロンプトを知らせ（`observe_write`）、
//! 自分の行読み取りの代わりに `read_console` を呼ぶ。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`line`] | 編集中の行（容量、変更範囲、ベル） |
//! | [`ring`] | 世代付きハンドルで要素を指す循環リスト（履歴・補完候補） |
//! | [`history`] | 履歴（重複の繰り上げ、上限、前方一致検索、ファイル保存） |
//! | [`define`] | シンボル・マクロ・関連付け（最近使った順の線形探索） |
//! | [`text`] | 引用符・エスケープ・区切りの走査 |
//! | [`keymap`] | 編集機能、キーの正規化、キーマップ、キー名・機能名 |
//! | [`recorder`] | キーボードマクロの記録・縮約・再生 |
//! | [`glob`] | ワイルドカード照合（`*`, `?`, `[...]`） |
//! | [`complete`] | ファイル名補完（共通接頭辞、巡回、引用符、一覧） |
//! | [`terminal`] | 端末の抽象（raw ANSI 端末、メモリ上の端末、Ctrl+C 中断） |
//! | [`keypad`] | Alt+テンキーによる文字入力 |
//! | [`highlight`] | プロンプトの着色、制御文字の表示 |
//! | [`editor`] | キー入力から行を編集する状態機械と再描画 |
//! | [`expand`] | 確定した行の展開（ブレース、関連付け、シンボル、マクロ、変数、複数コマンド） |
//! | [`command`] | 内部コマンド（`defk`, `lstm`, `rsth` など 18 個） |
//! | [`config`] | オプションと TOML 設定 |
//! | [`session`] | 1 つのコンソール入力の状態をまとめた集約 |
//! | [`reader`] | ホストとの境界（`read_console`, `observe_write`, コマンドファイル） |
//! | [`error`] | エラー型 |
//! | [`shell`] / [`builtins`] | デモホスト（`sh -c` 実行、`cd`, `exit`） |

pub mod builtins;
pub mod command;
pub mod complete;
pub mod config;
pub mod define;
pub mod editor;
pub mod error;
pub mod expand;
pub mod glob;
pub mod highlight;
pub mod history;
pub mod keymap;
pub mod keypad;
pub mod line;
pub mod reader;
pub mod recorder;
pub mod ring;
pub mod session;
pub mod shell;
pub mod terminal;
pub mod text;
