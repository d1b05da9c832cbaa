//! The gate's process environment contract.

use std::time::Duration;

use forge_core::parse_duration;

use crate::error::{GateError, GateResult};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateEnv {
    pub host: String,
    pub port: u16,
    /// Identity the main process connects as; logged, never used to
    /// authenticate the probe.
    pub user: String,
    pub interval: Duration,
    /// `None` waits indefinitely.
    pub max_attempts: Option<u32>,
}

impl GateEnv {
    pub fn from_env() -> GateResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the contract through `lookup`. Every missing required
    /// variable is named in the error, not just the first.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GateResult<Self> {
        let required = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let host = required("DATABASE_HOST");
        let port = required("DATABASE_PORT");
        let user = required("DATABASE_USER");

        let missing: Vec<String> = [("DATABASE_HOST", &host), ("DATABASE_PORT", &port), ("DATABASE_USER", &user)]
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        let (Some(host), Some(port), Some(user)) = (host, port, user) else {
            return Err(GateError::MissingEnv(missing));
        };

        let port = port.trim().parse::<u16>().map_err(|_| GateError::InvalidEnv {
            name: "DATABASE_PORT",
            value: port.clone(),
        })?;

        let interval = match lookup("GATE_INTERVAL") {
            Some(value) => parse_interval(&value)?,
            None => DEFAULT_INTERVAL,
        };
        let max_attempts = match lookup("GATE_MAX_ATTEMPTS") {
            Some(value) => parse_max_attempts(&value)?,
            None => Some(DEFAULT_MAX_ATTEMPTS),
        };

        Ok(Self {
            host,
            port,
            user,
            interval,
            max_attempts,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn parse_interval(value: &str) -> GateResult<Duration> {
    parse_duration(value)
        .filter(|d| !d.is_zero())
        .ok_or_else(|| GateError::InvalidEnv {
            name: "GATE_INTERVAL",
            value: value.to_string(),
        })
}

/// `0` means no limit.
pub fn parse_max_attempts(value: &str) -> GateResult<Option<u32>> {
    match value.trim().parse::<u32>() {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(GateError::InvalidEnv {
            name: "GATE_MAX_ATTEMPTS",
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn reads_required_variables_with_defaults() {
        let env = GateEnv::from_lookup(lookup(&[
            ("DATABASE_HOST", "chat-db.internal"),
            ("DATABASE_PORT", "5432"),
            ("DATABASE_USER", "postgres"),
        ]))
        .unwrap();
        assert_eq!(env.address(), "chat-db.internal:5432");
        assert_eq!(env.interval, Duration::from_secs(2));
        assert_eq!(env.max_attempts, Some(30));
    }

    #[test]
    fn every_missing_variable_is_named() {
        let err = GateEnv::from_lookup(lookup(&[("DATABASE_PORT", "5432")])).unwrap_err();
        match err {
            GateError::MissingEnv(missing) => {
                assert_eq!(missing, ["DATABASE_HOST", "DATABASE_USER"]);
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn blank_counts_as_missing() {
        let err = GateEnv::from_lookup(lookup(&[
            ("DATABASE_HOST", " "),
            ("DATABASE_PORT", "5432"),
            ("DATABASE_USER", "postgres"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DATABASE_HOST"));
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = GateEnv::from_lookup(lookup(&[
            ("DATABASE_HOST", "db"),
            ("DATABASE_PORT", "postgres"),
            ("DATABASE_USER", "postgres"),
        ]))
        .unwrap_err();
        assert!(matches!(err, GateError::InvalidEnv { name: "DATABASE_PORT", .. }));
    }

    #[test]
    fn zero_attempts_means_unbounded() {
        let env = GateEnv::from_lookup(lookup(&[
            ("DATABASE_HOST", "db"),
            ("DATABASE_PORT", "5432"),
            ("DATABASE_USER", "postgres"),
            ("GATE_INTERVAL", "500ms"),
            ("GATE_MAX_ATTEMPTS", "0"),
        ]))
        .unwrap();
        assert_eq!(env.interval, Duration::from_millis(500));
        assert_eq!(env.max_attempts, None);
    }
}
