// config.rs — Engine configuration.
//
// EngineConfig lives at `.aim/engine.toml` in the project root. Every section
// is optional; missing sections and keys fall back to the defaults produced by
// `for_project()`. Relative paths in the file are resolved against the
// project root.
//
// ```toml
// [trust]
// floor = 0.0
// ceiling = 100.0
// first_violation_penalty = 5.0
// repeated_violation_penalty = 10.0
//
// [audit]
// log = ".aim/audit.jsonl"
// alerts = ".aim/alerts.jsonl"
//
// [scan]
// low_trust_threshold = 30.0
//
// [policies]
// file = ".aim/policies.yaml"
// ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use aim_policy::DEFAULT_LOW_TRUST_THRESHOLD;

use crate::error::EngineError;
use crate::trust::TrustConfig;

/// Name of the per-project state directory.
pub const STATE_DIR: &str = ".aim";
/// File name of the engine configuration inside [`STATE_DIR`].
pub const CONFIG_FILE: &str = "engine.toml";

/// Where verification records and alerts are written.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuditConfig {
    /// Hash-chained JSONL log of verification records.
    pub log: PathBuf,
    /// Hash-chained JSONL log of alerts.
    pub alerts: PathBuf,
}

/// Security posture scan settings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScanConfig {
    /// Agents strictly below this trust score count as low-trust.
    pub low_trust_threshold: f64,
    /// Directory holding one JSON file per scan run.
    pub runs_dir: PathBuf,
}

/// Administrator-authored policy file.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PoliciesConfig {
    /// YAML policy set loaded on top of the seeded defaults, if present.
    pub file: PathBuf,
    /// Seed the three alert-only default policies for the organization.
    pub seed_defaults: bool,
}

/// Top-level engine configuration, with every path resolved.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EngineConfig {
    /// Root directory of the project.
    pub project_root: PathBuf,

    pub trust: TrustConfig,

    pub audit: AuditConfig,

    pub scan: ScanConfig,

    pub policies: PoliciesConfig,
}

/// On-disk shape: every section optional.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    trust: Option<TrustConfig>,
    audit: Option<RawAudit>,
    scan: Option<RawScan>,
    policies: Option<RawPolicies>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAudit {
    log: Option<PathBuf>,
    alerts: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawScan {
    low_trust_threshold: Option<f64>,
    runs_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPolicies {
    file: Option<PathBuf>,
    seed_defaults: Option<bool>,
}

impl EngineConfig {
    /// Create a config with the standard `.aim/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let state_dir = root.join(STATE_DIR);
        Self {
            trust: TrustConfig::default(),
            audit: AuditConfig {
                log: state_dir.join("audit.jsonl"),
                alerts: state_dir.join("alerts.jsonl"),
            },
            scan: ScanConfig {
                low_trust_threshold: DEFAULT_LOW_TRUST_THRESHOLD,
                runs_dir: state_dir.join("scans"),
            },
            policies: PoliciesConfig {
                file: state_dir.join("policies.yaml"),
                seed_defaults: true,
            },
            project_root: root,
        }
    }

    /// Path of the config file for a project.
    pub fn config_path(project_root: impl AsRef<Path>) -> PathBuf {
        project_root.as_ref().join(STATE_DIR).join(CONFIG_FILE)
    }

    /// Parse TOML config text for a project, filling gaps with defaults.
    pub fn from_toml(project_root: impl AsRef<Path>, text: &str) -> Result<Self, EngineError> {
        let root = project_root.as_ref();
        let path = Self::config_path(root);
        let raw: RawConfig = toml::from_str(text).map_err(|e| EngineError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut config = Self::for_project(root);
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { root.join(p) };

        if let Some(trust) = raw.trust {
            config.trust = trust;
        }
        if let Some(audit) = raw.audit {
            if let Some(log) = audit.log {
                config.audit.log = resolve(log);
            }
            if let Some(alerts) = audit.alerts {
                config.audit.alerts = resolve(alerts);
            }
        }
        if let Some(scan) = raw.scan {
            if let Some(threshold) = scan.low_trust_threshold {
                config.scan.low_trust_threshold = threshold;
            }
            if let Some(dir) = scan.runs_dir {
                config.scan.runs_dir = resolve(dir);
            }
        }
        if let Some(policies) = raw.policies {
            if let Some(file) = policies.file {
                config.policies.file = resolve(file);
            }
            if let Some(seed) = policies.seed_defaults {
                config.policies.seed_defaults = seed;
            }
        }

        config.validate().map_err(|reason| EngineError::Config {
            path: path.display().to_string(),
            reason,
        })?;
        Ok(config)
    }

    /// Load `.aim/engine.toml` for a project.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self, EngineError> {
        let root = project_root.as_ref();
        let path = Self::config_path(root);
        let text = std::fs::read_to_string(&path).map_err(|source| EngineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(root, &text)
    }

    /// Load the project config, or the defaults if no config file exists.
    ///
    /// A config file that exists but does not parse is still an error.
    pub fn load_or_default(project_root: impl AsRef<Path>) -> Result<Self, EngineError> {
        let root = project_root.as_ref();
        if Self::config_path(root).exists() {
            Self::load(root)
        } else {
            tracing::debug!(root = %root.display(), "no engine config; using defaults");
            Ok(Self::for_project(root))
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), String> {
        self.trust.validate()?;
        let threshold = self.scan.low_trust_threshold;
        if !threshold.is_finite() || threshold < self.trust.floor || threshold > self.trust.ceiling
        {
            return Err(format!(
                "scan.low_trust_threshold {} is outside the trust range [{}, {}]",
                threshold, self.trust.floor, self.trust.ceiling
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn for_project_uses_state_dir_layout() {
        let config = EngineConfig::for_project("/work/app");
        assert_eq!(config.audit.log, PathBuf::from("/work/app/.aim/audit.jsonl"));
        assert_eq!(config.scan.runs_dir, PathBuf::from("/work/app/.aim/scans"));
        assert_eq!(config.policies.file, PathBuf::from("/work/app/.aim/policies.yaml"));
        assert_eq!(config.trust, TrustConfig::default());
        assert_eq!(config.scan.low_trust_threshold, 30.0);
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let config = EngineConfig::from_toml(
            "/work/app",
            r#"
[trust]
first_violation_penalty = 2.0

[audit]
log = "logs/audit.jsonl"
"#,
        )
        .unwrap();
        assert_eq!(config.trust.first_violation_penalty, 2.0);
        assert_eq!(config.trust.repeated_violation_penalty, 10.0);
        assert_eq!(config.audit.log, PathBuf::from("/work/app/logs/audit.jsonl"));
        assert_eq!(
            config.audit.alerts,
            PathBuf::from("/work/app/.aim/alerts.jsonl")
        );
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        let err = EngineConfig::from_toml("/p", "[trust]\nfloor = 50.0\nceiling = 10.0\n")
            .unwrap_err()
            .to_string();
        assert!(err.contains("engine.toml"), "{err}");

        assert!(EngineConfig::from_toml("/p", "[scan]\nlow_trust_threshold = 500.0\n").is_err());
        assert!(EngineConfig::from_toml("/p", "not toml at all [").is_err());
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config, EngineConfig::for_project(dir.path()));
    }

    #[test]
    fn load_reads_project_file() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(STATE_DIR)).unwrap();
        std::fs::write(
            EngineConfig::config_path(dir.path()),
            "[policies]\nseed_defaults = false\n",
        )
        .unwrap();
        let config = EngineConfig::load_or_default(dir.path()).unwrap();
        assert!(!config.policies.seed_defaults);
    }
}
