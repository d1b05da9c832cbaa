//! Checks that run before a deploy touches any state.

use std::path::Path;

use anyhow::{Result, bail};

/// Credentials and account resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub account: String,
    /// `AWS_PROFILE` when the credentials come from a named profile.
    pub profile: Option<String>,
}

/// Run every check against the process environment and report all
/// problems together.
pub fn check(required_tools: &[String]) -> Result<Environment> {
    let path = std::env::var("PATH").unwrap_or_default();
    check_with(required_tools, &path, |name| std::env::var(name).ok())
}

pub fn check_with(
    required_tools: &[String],
    path: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Environment> {
    let mut problems = Vec::new();

    for tool in required_tools {
        if !on_path(tool, path) {
            problems.push(format!("required tool `{tool}` not found on PATH"));
        }
    }

    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let keys = var("AWS_ACCESS_KEY_ID").is_some() && var("AWS_SECRET_ACCESS_KEY").is_some();
    let profile = var("AWS_PROFILE");
    if !keys && profile.is_none() {
        problems.push(
            "no cloud credentials: set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY, or AWS_PROFILE".to_string(),
        );
    }

    let account = var("CDK_DEFAULT_ACCOUNT").or_else(|| var("AWS_ACCOUNT_ID"));
    if account.is_none() {
        problems.push("no account id: set CDK_DEFAULT_ACCOUNT or AWS_ACCOUNT_ID".to_string());
    }

    match account {
        Some(account) if problems.is_empty() => Ok(Environment { account, profile }),
        _ => bail!("preflight failed:\n  - {}", problems.join("\n  - ")),
    }
}

fn on_path(tool: &str, path: &str) -> bool {
    std::env::split_paths(path).any(|dir| is_executable(&dir.join(tool)))
}

#[cfg(unix)]
fn is_executable(candidate: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    candidate
        .metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(candidate: &Path) -> bool {
    candidate.is_file() || candidate.with_extension("exe").is_file()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn passes_with_tool_keys_and_account() {
        let dir = tempfile::tempdir().unwrap();
        fake_tool(dir.path(), "docker");
        let path = dir.path().to_string_lossy().to_string();

        let result = check_with(
            &["docker".to_string()],
            &path,
            env(&[
                ("AWS_ACCESS_KEY_ID", "AKIA"),
                ("AWS_SECRET_ACCESS_KEY", "secret"),
                ("CDK_DEFAULT_ACCOUNT", "123456789012"),
            ]),
        )
        .unwrap();
        assert_eq!(result.account, "123456789012");
        assert_eq!(result.profile, None);
    }

    #[test]
    fn profile_and_fallback_account_are_enough() {
        let result = check_with(
            &[],
            "",
            env(&[("AWS_PROFILE", "dev"), ("AWS_ACCOUNT_ID", "000000000000")]),
        )
        .unwrap();
        assert_eq!(result.account, "000000000000");
        assert_eq!(result.profile.as_deref(), Some("dev"));
    }

    #[test]
    fn every_problem_is_reported_at_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let err = check_with(
            &["docker".to_string()],
            &path,
            env(&[("AWS_ACCESS_KEY_ID", "AKIA")]),
        )
        .unwrap_err()
        .to_string();

        assert!(err.contains("`docker`"), "{err}");
        assert!(err.contains("AWS_PROFILE"), "{err}");
        assert!(err.contains("CDK_DEFAULT_ACCOUNT"), "{err}");
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = check_with(
            &[],
            "",
            env(&[("AWS_PROFILE", "  "), ("CDK_DEFAULT_ACCOUNT", "123456789012")]),
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("no cloud credentials"), "{err}");
        assert!(!err.contains("no account id"), "{err}");
    }
}
