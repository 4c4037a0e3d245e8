//! デモ用ホストシェルの状態。
//!
//! 行の読み取りと展開は [`Console`](crate::reader::Console) が行い、ここでは確定した行を
//! `/bin/sh -c` に渡して実行する。`cd` と `exit` だけはプロセス内で処理する
//! （[`builtins`](crate::builtins)）。

use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::Command;

use log::debug;

use crate::builtins;

/// ホストの実行状態。REPL ループ全体で共有される。
pub struct Shell {
    /// 直前のコマンドの終了ステータス。プロンプト表示と `exit` のデフォルト値に使う。
    pub last_status: i32,
    /// `exit` ビルトインで true にセットされ、REPL ループを終了させる。
    pub should_exit: bool,
}

impl Shell {
    pub fn new() -> Self {
        Self {
            last_status: 0,
            should_exit: false,
        }
    }

    /// カレントディレクトリを含むプロンプト。直前の失敗は接頭辞に付ける。
    pub fn prompt(&self) -> String {
        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        if self.last_status == 0 {
            format!("{}$ ", cwd)
        } else {
            format!("[{}] {}$ ", self.last_status, cwd)
        }
    }

    /// 確定した 1 行を実行する。空行は何もしない。
    pub fn execute(&mut self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        let args: Vec<&str> = line.split_whitespace().collect();
        if args.is_empty() {
            return;
        }
        if let Some(status) = builtins::try_exec(self, &args) {
            self.last_status = status;
            return;
        }
        self.last_status = run_external(line);
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

/// `/bin/sh -c line` を実行して終了ステータスを返す。
/// シェル自身は SIGINT を無視するため、子では既定の動作に戻す。
fn run_external(line: &str) -> i32 {
    debug!("sh -c {:?}", line);
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(line);
    unsafe {
        cmd.pre_exec(|| {
            libc::signal(libc::SIGINT, libc::SIG_DFL);
            Ok(())
        });
    }
    match cmd.status() {
        Ok(status) => status
            .code()
            .unwrap_or_else(|| 128 + status.signal().unwrap_or(0)),
        Err(e) => {
            eprintln!("cmdread: sh: {}", e);
            127
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_status_is_recorded() {
        let mut shell = Shell::new();
        shell.execute("false\r\n");
        assert_eq!(shell.last_status, 1);
        assert!(!shell.should_exit);
        shell.execute("true");
        assert_eq!(shell.last_status, 0);
    }

    #[test]
    fn blank_line_is_ignored() {
        let mut shell = Shell::new();
        shell.last_status = 5;
        shell.execute("  \r\n");
        assert_eq!(shell.last_status, 5);
    }

    #[test]
    fn prompt_shows_failure() {
        let mut shell = Shell::new();
        assert!(shell.prompt().ends_with("$ "));
        shell.last_status = 2;
        assert!(shell.prompt().starts_with("[2] "));
    }
}
