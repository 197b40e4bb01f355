//! Connector configuration and health.

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::traits::BUILTIN_CONNECTORS;

#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub configured: bool,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn env_present(var: &str) -> bool {
    std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

fn status(name: &str, healthy: bool, problem: impl Into<String>) -> SourceStatus {
    SourceStatus {
        name: name.to_string(),
        configured: true,
        healthy,
        notes: (!healthy).then(|| problem.into()),
    }
}

/// Status of every built-in connector. Local sources are healthy when their
/// path exists; API sources when their key variable is set.
pub fn get_sources(config: &Config) -> Vec<SourceStatus> {
    let s = &config.sources;
    BUILTIN_CONNECTORS
        .iter()
        .map(|name| match *name {
            "congress" => s.congress.as_ref().map(|c| {
                status(name, env_present(&c.api_key_env), format!("{} not set", c.api_key_env))
            }),
            "federal_register" => s.federal_register.as_ref().map(|_| status(name, true, "")),
            "openstates" => s.openstates.as_ref().map(|c| {
                if c.jurisdictions.is_empty() {
                    status(name, false, "no jurisdictions listed")
                } else {
                    status(name, env_present(&c.api_key_env), format!("{} not set", c.api_key_env))
                }
            }),
            "california" => s.california.as_ref().map(|c| {
                status(
                    name,
                    c.path.exists(),
                    format!("{} does not exist", c.path.display()),
                )
            }),
            "scotus" => s.scotus.as_ref().map(|c| {
                status(
                    name,
                    c.root.is_dir(),
                    format!("{} does not exist", c.root.display()),
                )
            }),
            _ => None,
        }
        .unwrap_or_else(|| SourceStatus {
            name: name.to_string(),
            configured: false,
            healthy: false,
            notes: None,
        }))
        .collect()
}

/// CLI entry point for `civ sources`.
pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<18} {:<16} HEALTHY", "CONNECTOR", "STATUS");
    for s in get_sources(config) {
        let label = if !s.configured {
            "NOT CONFIGURED"
        } else if s.healthy {
            "OK"
        } else {
            "UNHEALTHY"
        };
        match &s.notes {
            Some(notes) => println!("{:<18} {:<16} {} ({})", s.name, label, s.healthy, notes),
            None => println!("{:<18} {:<16} {}", s.name, label, s.healthy),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_report_configuration_and_health() {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            r#"
[db]
path = "x.sqlite"

[sources.scotus]
root = "{}"

[sources.california]
path = "{}/missing.zip"
"#,
            dir.path().display(),
            dir.path().display()
        );
        let config: Config = toml::from_str(&toml).unwrap();
        let sources = get_sources(&config);
        assert_eq!(sources.len(), BUILTIN_CONNECTORS.len());

        let by_name = |n: &str| sources.iter().find(|s| s.name == n).unwrap().clone();
        assert!(by_name("scotus").healthy);
        let ca = by_name("california");
        assert!(ca.configured && !ca.healthy);
        assert!(ca.notes.unwrap().contains("does not exist"));
        assert!(!by_name("congress").configured);
    }
}
