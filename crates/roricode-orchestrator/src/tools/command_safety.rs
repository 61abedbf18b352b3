//! Shell command classification.
//!
//! - **ReadOnly**: inspection commands that run without asking
//! - **Confirm**: anything else; `dangerous` marks commands known to modify state
//! - **Blocked**: never executed

use std::collections::HashSet;

/// How a command must be handled before it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandClass {
    ReadOnly,
    Confirm { dangerous: bool },
    Blocked { reason: String },
}

/// Command safety classifier
#[derive(Debug, Clone)]
pub struct CommandSafety {
    read_only: HashSet<&'static str>,
    dangerous: HashSet<&'static str>,
    blocked: HashSet<&'static str>,
}

impl Default for CommandSafety {
    fn default() -> Self {
        Self::new()
    }
}

/// Commands that run the command that follows them.
const WRAPPERS: &[&str] = &["sudo", "env", "nice", "nohup", "time", "command", "xargs", "timeout"];

/// Tools whose read/write nature depends on the subcommand.
const TWO_WORD_TOOLS: &[&str] = &["git", "cargo", "npm", "pip", "go", "docker", "kubectl"];

impl CommandSafety {
    pub fn new() -> Self {
        let read_only = [
            // File inspection
            "ls", "dir", "pwd", "cat", "type", "head", "tail", "file", "stat", "tree", "which",
            "where", "whereis", "echo",
            // Text processing
            "grep", "rg", "wc", "sort", "uniq", "cut", "diff", "jq",
            // System info
            "date", "whoami", "hostname", "uname", "uptime", "df", "du", "printenv", "ps",
            // Git read-only
            "git status", "git log", "git diff", "git show", "git rev-parse", "git blame",
            // Toolchain inspection
            "cargo tree", "cargo metadata", "cargo --version", "npm list", "npm ls", "pip list",
            "pip freeze", "go version", "go env", "node --version", "rustc --version",
            "python --version", "python3 --version",
        ];
        let dangerous = [
            // File modification
            "rm", "rmdir", "mv", "cp", "chmod", "chown", "ln", "truncate",
            // Privilege and process control
            "sudo", "su", "kill", "killall", "pkill", "reboot", "shutdown",
            // Git write operations
            "git push", "git reset", "git clean", "git checkout", "git rebase", "git commit",
            // Network
            "curl", "wget", "ssh", "scp", "rsync",
            // Package management
            "npm install", "npm uninstall", "pip install", "pip uninstall", "cargo install",
            "apt", "apt-get", "brew", "yum",
            // Shells and interpreters of arbitrary text
            "eval", "exec", "bash", "sh", "zsh",
            // Containers
            "docker run", "docker rm", "docker exec",
        ];
        let blocked = [
            "mkfs", "fdisk", "parted", "shred", "insmod", "rmmod", "modprobe", "format",
        ];

        Self {
            read_only: read_only.into_iter().collect(),
            dangerous: dangerous.into_iter().collect(),
            blocked: blocked.into_iter().collect(),
        }
    }

    /// Classifies a full command line, looking at every line, pipeline and list segment.
    pub fn classify(&self, command: &str) -> CommandClass {
        // Line breaks separate commands for the shell; keep them as boundaries.
        let normalized = command
            .split(['\n', '\r'])
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let segments = split_segments(&normalized);
        if is_catastrophic(&normalized) || segments.iter().any(|s| is_catastrophic(s)) {
            return CommandClass::Blocked {
                reason: "command would destroy the file system or the machine".to_string(),
            };
        }
        if segments.is_empty() {
            return CommandClass::Confirm { dangerous: false };
        }

        let mut all_read_only = !normalized.contains('>')
            && !normalized.contains('`')
            && !normalized.contains("$(")
            && !normalized.contains("<(");
        let mut dangerous = false;

        for segment in &segments {
            let (mut root, mut root_two) = command_roots(segment);
            let mut rest = segment_args(segment);
            while WRAPPERS.contains(&root) {
                dangerous |= root == "sudo";
                all_read_only = false;
                (root, root_two) = command_roots(rest);
                rest = segment_args(rest);
            }
            if self.blocked.contains(root) || root.starts_with("mkfs.") {
                return CommandClass::Blocked { reason: format!("'{root}' is not allowed") };
            }
            let known_read_only = (self.read_only.contains(root_two.as_str())
                || self.read_only.contains(root))
                && !has_write_flag(root, rest);
            let known_dangerous =
                self.dangerous.contains(root_two.as_str()) || self.dangerous.contains(root);

            if known_dangerous && !self.read_only.contains(root_two.as_str()) {
                dangerous = true;
            }
            if !known_read_only || (TWO_WORD_TOOLS.contains(&root) && !self.read_only.contains(root_two.as_str())) {
                all_read_only = false;
            }
        }

        if all_read_only {
            CommandClass::ReadOnly
        } else {
            CommandClass::Confirm { dangerous: dangerous || normalized.contains('>') }
        }
    }
}

/// Options that turn an otherwise read-only command into one that writes.
fn has_write_flag(root: &str, args: &str) -> bool {
    let flags: &[&str] = match root {
        "sort" => &["-o", "--output"],
        "tree" => &["-o"],
        "date" => &["-s", "--set"],
        "uniq" => return args.split_whitespace().filter(|a| !a.starts_with('-')).count() > 1,
        _ => return false,
    };
    args.split_whitespace().any(|arg| flags.iter().any(|f| arg == *f || arg.starts_with(&format!("{f}="))))
}

/// Everything after the command word, skipping leading variable assignments.
fn segment_args(segment: &str) -> &str {
    let mut rest = segment.trim_start();
    while let Some((word, tail)) = rest.split_once(' ') {
        let assignment = word.contains('=');
        rest = tail.trim_start();
        if !assignment {
            return rest;
        }
    }
    ""
}

fn is_catastrophic(command: &str) -> bool {
    const PATTERNS: &[&str] = &[":(){ :|:& };:", "rm -rf /", "rm -rf /*", "rm -rf ~", "rm -fr /"];
    PATTERNS.iter().any(|p| command == *p || command.starts_with(&format!("{p} ")))
        || command.contains("of=/dev/sd")
        || command.contains("of=/dev/nvme")
}

fn split_segments(command: &str) -> Vec<&str> {
    command
        .split(['|', ';', '&', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// First word (without a leading path) and the first two words.
fn command_roots(segment: &str) -> (&str, String) {
    let mut words = segment.split_whitespace().skip_while(|w| w.contains('='));
    let first = words.next().unwrap_or_default();
    let first = first.rsplit('/').next().unwrap_or(first);
    let two = match words.next() {
        Some(second) => format!("{first} {second}"),
        None => first.to_string(),
    };
    (first, two)
}
