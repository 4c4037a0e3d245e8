//! デモホストのビルトイン。
//!
//! `cd` と `exit` はホストプロセス自身の状態を変えるため `sh -c` に渡さず直接実行する。
//! `try_exec()` が `Some(status)` を返せばビルトインとして処理済み、
//! `None` なら外部コマンドとして `sh -c` に委ねる。

use std::env;
use std::path::Path;

use crate::shell::Shell;

/// ビルトインコマンドの実行を試みる。
///
/// 戻り値:
/// - `Some(status)`: ビルトインとして実行済み
/// - `None`: 該当するビルトインなし（外部コマンドとして実行すべき）
pub fn try_exec(shell: &mut Shell, args: &[&str]) -> Option<i32> {
    match *args.first()? {
        "exit" => Some(builtin_exit(shell, args)),
        "cd" if args.len() <= 2 => Some(builtin_cd(args)),
        _ => None,
    }
}

/// `exit [N]`: Nが指定されればそのコードで、省略時は直前のステータスで終了。
fn builtin_exit(shell: &mut Shell, args: &[&str]) -> i32 {
    shell.should_exit = true;
    match args.get(1) {
        Some(code) => code.parse::<i32>().unwrap_or_else(|_| {
            eprintln!("cmdread: exit: {}: numeric argument required", code);
            2
        }),
        None => shell.last_status,
    }
}

/// `cd [dir]`: 引数省略時は `$HOME` に移動。
fn builtin_cd(args: &[&str]) -> i32 {
    let target = match args.get(1) {
        Some(dir) => dir.to_string(),
        None => match env::var("HOME") {
            Ok(home) => home,
            Err(_) => {
                eprintln!("cmdread: cd: HOME not set");
                return 1;
            }
        },
    };

    if let Err(e) = env::set_current_dir(Path::new(&target)) {
        eprintln!("cmdread: cd: {}: {}", target, e);
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_uses_last_status_or_argument() {
        let mut shell = Shell::new();
        shell.last_status = 4;
        assert_eq!(try_exec(&mut shell, &["exit"]), Some(4));
        assert!(shell.should_exit);
        assert_eq!(try_exec(&mut shell, &["exit", "7"]), Some(7));
        assert_eq!(try_exec(&mut shell, &["exit", "x"]), Some(2));
    }

    #[test]
    fn cd_to_missing_directory_fails() {
        let mut shell = Shell::new();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none");
        let missing = missing.to_str().unwrap();
        assert_eq!(try_exec(&mut shell, &["cd", missing]), Some(1));
    }

    #[test]
    fn other_commands_are_external() {
        let mut shell = Shell::new();
        assert_eq!(try_exec(&mut shell, &["ls", "-l"]), None);
        assert_eq!(try_exec(&mut shell, &["cd", "a", "b"]), None);
        assert_eq!(try_exec(&mut shell, &[]), None);
    }
}
