//! Doctor — offline configuration and credential checks
//!
//! Nothing here contacts a provider; a key that is set but wrong still
//! passes and only surfaces as a failed outcome at consultation time.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::ModelCatalog;
use crate::config::{ConsultConfig, ProviderConfig, default_config_path};
use crate::redact::mask_secret;

/// One line of the doctor report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub fix_hint: Option<String>,
    /// Set on the per-provider key checks
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    /// Consultations still run but some models will fail
    Attention,
    /// Nothing can be consulted until this is fixed
    Broken,
    Skipped,
}

impl CheckStatus {
    pub fn label(self) -> &'static str {
        match self {
            CheckStatus::Ok => "ok",
            CheckStatus::Attention => "attention",
            CheckStatus::Broken => "broken",
            CheckStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

impl CheckResult {
    fn new(name: impl Into<String>, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            fix_hint: None,
            provider: None,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    fn for_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider = Some(provider_id.into());
        self
    }
}

/// Every check in run order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorReport {
    pub checks: Vec<CheckResult>,
}

impl DoctorReport {
    pub fn from_checks(checks: Vec<CheckResult>) -> Self {
        Self { checks }
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    /// `(ready, configured)` provider counts; ready means a real key is set
    pub fn provider_readiness(&self) -> (usize, usize) {
        let providers = self.checks.iter().filter(|c| c.provider.is_some());
        providers.fold((0, 0), |(ready, total), check| {
            (ready + usize::from(check.status == CheckStatus::Ok), total + 1)
        })
    }

    /// A report with attention items is still healthy
    pub fn is_healthy(&self) -> bool {
        self.count(CheckStatus::Broken) == 0
    }

    pub fn summary(&self) -> String {
        let (ready, configured) = self.provider_readiness();
        let mut summary = format!("{ready} of {configured} providers ready to consult");
        match (self.count(CheckStatus::Attention), self.count(CheckStatus::Broken)) {
            (0, 0) => {}
            (attention, 0) => summary.push_str(&format!(", {attention} need attention")),
            (_, broken) => summary.push_str(&format!(", {broken} broken")),
        }
        summary
    }
}

/// Run all doctor checks against `config_path` (or the default location)
pub fn run_doctor(config_path: Option<&Path>) -> Result<DoctorReport> {
    info!("Running doctor checks...");
    let mut checks = vec![check_config_file(config_path)];

    match ConsultConfig::load(config_path) {
        Ok(config) => {
            checks.push(CheckResult::new(
                "config_parse",
                CheckStatus::Ok,
                format!("Configuration loaded ({} providers)", config.providers.len()),
            ));
            checks.push(check_catalog(&config));
            checks.extend(config.providers.iter().map(check_provider_key));
        }
        Err(e) => {
            checks.push(
                CheckResult::new("config_parse", CheckStatus::Broken, e.to_string())
                    .with_hint("Fix the config file or regenerate it with `consult init --force`"),
            );
            checks.push(CheckResult::new(
                "catalog",
                CheckStatus::Skipped,
                "Skipped: configuration did not load",
            ));
        }
    }

    let report = DoctorReport::from_checks(checks);
    if report.is_healthy() {
        info!("Doctor: {}", report.summary());
    } else {
        warn!("Doctor: {}", report.summary());
    }

    Ok(report)
}

fn check_config_file(path: Option<&Path>) -> CheckResult {
    match path {
        Some(p) if p.exists() => CheckResult::new(
            "config_file",
            CheckStatus::Ok,
            format!("Config file found: {}", p.display()),
        ),
        Some(p) => CheckResult::new(
            "config_file",
            CheckStatus::Broken,
            format!("Config file not found: {}", p.display()),
        )
        .with_hint("Run `consult init` to create a default config"),
        None => {
            let default = default_config_path();
            if default.exists() {
                CheckResult::new(
                    "config_file",
                    CheckStatus::Ok,
                    format!("Config file found: {}", default.display()),
                )
            } else {
                CheckResult::new(
                    "config_file",
                    CheckStatus::Skipped,
                    format!("No config file at {}, using built-in defaults", default.display()),
                )
                .with_hint("Run `consult init` to write an editable config")
            }
        }
    }
}

fn check_catalog(config: &ConsultConfig) -> CheckResult {
    match ModelCatalog::from_config(config) {
        Ok(catalog) if catalog.is_empty() => CheckResult::new(
            "catalog",
            CheckStatus::Attention,
            "No models are configured",
        )
        .with_hint("Add models under [providers.<id>.models]"),
        Ok(catalog) => CheckResult::new(
            "catalog",
            CheckStatus::Ok,
            format!(
                "{} models across {} providers",
                catalog.len(),
                config.providers.len()
            ),
        ),
        Err(e) => CheckResult::new("catalog", CheckStatus::Broken, e.to_string()),
    }
}

fn check_provider_key(provider: &ProviderConfig) -> CheckResult {
    let name = format!("api_key_{}", provider.id);
    if provider.has_placeholder_key() {
        return CheckResult::new(
            name,
            CheckStatus::Attention,
            format!(
                "{} has no API key ({} is not set)",
                provider.display_name, provider.api_key_env
            ),
        )
        .with_hint(format!("export {}=\"your-api-key\"", provider.api_key_env))
        .for_provider(&provider.id);
    }

    CheckResult::new(
        name,
        CheckStatus::Ok,
        format!(
            "{} key is set ({})",
            provider.display_name,
            mask_secret(&provider.api_key)
        ),
    )
    .for_provider(&provider.id)
}
