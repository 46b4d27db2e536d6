//! Platform detection for command execution.

/// Check if running in a CI environment.
///
/// Checks common CI environment variables: `CI`, `GITHUB_ACTIONS`,
/// `GITLAB_CI`, `CIRCLECI`, `TRAVIS`, `JENKINS_URL`.
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS", "JENKINS_URL"]
        .iter()
        .any(|var| std::env::var(var).is_ok())
}

/// Shell used to run configured commands.
pub fn shell_program() -> String {
    if cfg!(target_os = "windows") {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
}

/// Flag that passes a command string to the shell.
///
/// Uses a login shell on Unix so version managers that put `node` and
/// `npm` on PATH from the profile are active.
pub fn shell_flag() -> &'static str {
    if cfg!(target_os = "windows") {
        "/C"
    } else {
        "-lc"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_program_is_never_empty() {
        assert!(!shell_program().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unix_uses_login_flag() {
        assert_eq!(shell_flag(), "-lc");
    }
}
