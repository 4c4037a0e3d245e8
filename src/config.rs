//! オプションと設定ファイル。
//!
//! 設定は起動時に 1 回だけ TOML から読み込む。実行中の再読み込みはしない。
//!
//! ## 探索順
//!
//! | 順 | パス |
//! |----|------|
//! | 1 | `--config` で指定したファイル |
//! | 2 | `$XDG_CONFIG_HOME/cmdread/config.toml`（なければ `~/.config/cmdread/config.toml`） |
//! | 3 | `/etc/cmdread/config.toml` |
//! | 4 | 既定値 |
//!
//! ## 例
//!
//! ```toml
//! cmdfile = "~/.cmdreadrc"
//! histfile = "~/.cmdread_history"
//!
//! [options]
//! histsize = 100
//! auto_recall = true
//! cmd_col = 0x1F
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use crate::error::{Error, Result};

/// 実行時オプション。
///
/// 色はコンソール属性（下位 4 ビットが前景、上位 4 ビットが背景、各ビットは青・緑・赤・高輝度）。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// カーソルの大きさ（%）。挿入モードと上書きモード
    pub cursor_size: [u8; 2],
    /// 上書きモードで編集を始める
    pub overwrite: bool,
    /// ベルを鳴らさない
    pub silent: bool,
    pub auto_recall: bool,
    /// 行の展開（マクロ・シンボル・関連付け）を行わない
    pub disable_macro: bool,
    /// 次の読み取りで編集を無効化・再有効化する（使ったら戻る）
    pub disable: bool,
    /// ディレクトリ補完で末尾に区切りを付けない
    pub no_slash: bool,
    /// 空行での履歴検索でも全履歴を巡回する
    pub empty_hist: bool,
    /// この文字で始まる行は展開しない
    pub ignore_char: char,
    /// 履歴に残す最短の長さ
    pub min_length: usize,
    /// 履歴の最大件数。0 なら無制限
    pub histsize: usize,
    pub nocolour: bool,
    pub cmd_col: u8,
    pub rec_col: u8,
    pub drv_col: u8,
    pub sep_col: u8,
    pub dir_col: u8,
    pub gt_col: u8,
    pub base_col: u8,
    pub sel_col: u8,
    /// `_` を単語の一部とみなす
    pub underscore: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            cursor_size: [25, 50],
            overwrite: false,
            silent: false,
            auto_recall: false,
            disable_macro: false,
            disable: false,
            no_slash: false,
            empty_hist: false,
            ignore_char: ' ',
            min_length: 1,
            histsize: 50,
            nocolour: false,
            cmd_col: 31,
            rec_col: 27,
            drv_col: 27,
            sep_col: 30,
            dir_col: 26,
            gt_col: 30,
            base_col: 0,
            sel_col: 0,
            underscore: true,
        }
    }
}

/// 設定ファイル全体。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub options: Options,
    /// 起動時に読む内部コマンドのファイル
    pub cmdfile: Option<PathBuf>,
    /// 履歴の保存先
    pub histfile: Option<PathBuf>,
}

impl Config {
    /// TOML 文字列を解析する。`path` は診断用。
    pub fn parse(text: &str, path: &Path) -> Result<Config> {
        let mut config: Config = toml::from_str(text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        config.cmdfile = config.cmdfile.map(|p| expand_tilde(&p));
        config.histfile = config.histfile.map(|p| expand_tilde(&p));
        Ok(config)
    }

    /// 設定を読み込む。`explicit` があればそれだけを読み、なければユーザー・システムの順に探す。
    /// どれも存在しなければ既定値。
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit {
            return Config::read(path);
        }
        for path in search_paths() {
            if path.is_file() {
                return Config::read(&path);
            }
            debug!("no config at {}", path.display());
        }
        info!("using default configuration");
        Ok(Config::default())
    }

    fn read(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Config::parse(&text, path)?;
        info!("loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// ユーザー・システムの設定ファイルの候補。
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
        paths.push(PathBuf::from(dir).join("cmdread").join("config.toml"));
    } else if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".config").join("cmdread").join("config.toml"));
    }
    paths.push(PathBuf::from("/etc/cmdread/config.toml"));
    paths
}

/// 先頭の `~` を `$HOME` に置き換える。
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opt = Options::default();
        assert_eq!(opt.cursor_size, [25, 50]);
        assert_eq!(opt.histsize, 50);
        assert_eq!(opt.min_length, 1);
        assert_eq!(opt.cmd_col, 31);
        assert!(opt.underscore);
    }

    #[test]
    fn parse_partial_file() {
        let text = r##"
            cmdfile = "/tmp/cmds"

            [options]
            histsize = 0
            auto_recall = true
            ignore_char = "#"
        "##;
        let config = Config::parse(text, Path::new("test.toml")).unwrap();
        assert_eq!(config.cmdfile, Some(PathBuf::from("/tmp/cmds")));
        assert_eq!(config.histfile, None);
        assert_eq!(config.options.histsize, 0);
        assert!(config.options.auto_recall);
        assert_eq!(config.options.ignore_char, '#');
        assert_eq!(config.options.cmd_col, 31);
    }

    #[test]
    fn parse_error_names_file() {
        let err = Config::parse("options = 3", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().starts_with("cmdread: bad.toml: "));
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[options]\nsilent = true\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert!(config.options.silent);
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("none.toml"))).is_err());
    }
}
