//! エラー型。
//!
//! 対話中の失敗（バッファ容量超過、補完候補なし、履歴検索の不一致など）はベルや
//! 警告表示でその場で処理され、ホストシェルへは伝播しない。
//! ここで定義する [`Error`] は内部コマンドの診断メッセージと、起動時の設定読み込みで使う。
//! `Display` の出力がそのままユーザー向けの診断文になる。

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// リダイレクト先を開く操作の種別。診断メッセージの動詞に使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectAction {
    /// `> file`: 新規作成（上書き）
    Create,
    /// `>> file`: 追記
    Open,
    /// `| cmd`: パイプ先プロセスの起動
    Execute,
}

impl fmt::Display for RedirectAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RedirectAction::Create => "create",
            RedirectAction::Open => "open",
            RedirectAction::Execute => "execute",
        })
    }
}

/// cmdread のエラー。
#[derive(Debug, Error)]
pub enum Error {
    /// 設定ファイルの TOML 解析に失敗した。
    #[error("cmdread: {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// ファイルの読み書きに失敗した。
    #[error("cmdread: could not open \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// `lst*` のリダイレクト先を開けなかった。
    #[error("cmdread: unable to {action} \"{target}\".")]
    Redirect {
        action: RedirectAction,
        target: String,
        #[source]
        source: io::Error,
    },
    /// リダイレクト先の指定がない。
    #[error("cmdread: syntax error.")]
    Syntax,
    /// `defk` などで未知のキー名が指定された。
    #[error("cmdread: unrecognised key: {0}")]
    UnknownKey(String),
    /// `defk` で未知の機能名が指定された。
    #[error("cmdread: unrecognised function: {0}")]
    UnknownFunction(String),
    /// マクロ名・シンボル名に区切り文字が含まれている。
    #[error("cmdread: invalid {kind} name: \"{name}\".")]
    InvalidName { kind: &'static str, name: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_message_names_action() {
        let err = Error::Redirect {
            action: RedirectAction::Execute,
            target: "nosuch".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(err.to_string(), "cmdread: unable to execute \"nosuch\".");
    }

    #[test]
    fn invalid_name_message() {
        let err = Error::InvalidName {
            kind: "macro",
            name: "a<b".to_string(),
        };
        assert_eq!(err.to_string(), "cmdread: invalid macro name: \"a<b\".");
    }
}
