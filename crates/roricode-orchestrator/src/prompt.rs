// System preamble describing the run-time environment

use chrono::Local;
use std::env;

/// Friendly name of the host operating system.
pub fn os_display_name() -> &'static str {
    match env::consts::OS {
        "macos" => "macOS",
        "windows" => "Windows",
        "linux" => "Linux",
        other => other,
    }
}

/// Shell the user works in, as far as the environment tells.
pub fn shell_name() -> String {
    let var = if cfg!(windows) { "COMSPEC" } else { "SHELL" };
    env::var(var)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| if cfg!(windows) { "cmd".to_string() } else { "sh".to_string() })
}

/// Builds the system message sent ahead of every completion call.
///
/// Regenerated per call so it tracks the current working directory.
pub fn system_preamble() -> String {
    let cwd = env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!(
        "You are RoriCode, a coding assistant working inside the user's terminal. \
Explore the project, explain what you find and help the user finish coding tasks.

## Environment
- Working directory: {cwd}
- Operating system: {os} ({raw_os})
- Architecture: {arch}
- Shell: {shell}
- Date: {date}

## Tools
You can run shell commands, read, write and edit files, manage files and \
directories, check the time and make HTTP requests. Gather facts with tools before recommending \
changes. Some operations ask the user for approval first; if they decline, \
accept it and suggest an alternative.

## Style
- Be concise and concrete.
- Say what you are about to do before doing it.
- Ask when the request is ambiguous.",
        os = os_display_name(),
        raw_os = env::consts::OS,
        arch = env::consts::ARCH,
        shell = shell_name(),
        date = Local::now().format("%Y-%m-%d (%A)"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_mentions_environment() {
        let preamble = system_preamble();
        assert!(preamble.contains(env::consts::ARCH));
        assert!(preamble.contains(os_display_name()));
        assert!(preamble.contains("Working directory:"));
        assert!(preamble.contains(&format!("- Shell: {}", shell_name())));
    }

    #[test]
    fn test_preamble_carries_todays_date() {
        let before = Local::now().format("%Y-%m-%d").to_string();
        let preamble = system_preamble();
        let after = Local::now().format("%Y-%m-%d").to_string();
        assert!(preamble.contains(&format!("- Date: {before}")) || preamble.contains(&format!("- Date: {after}")));
    }
}
