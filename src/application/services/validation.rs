//! Configuration-validity checks
//!
//! A lint-style pass over a parsed descriptor:
//! - `images`: every service declares an image or a build context
//! - `ports`: published host ports are unique across services
//! - `volumes`: named volumes are declared top-level and actually used
//! - `credentials`: `<PREFIX>_HOST` wiring implies matching `<PREFIX>_*` values
//! - `references`: `depends_on` targets exist
//! - `environment`: variable names are well-formed, pass-throughs resolvable
//! - `names`: container names do not collide

use std::collections::BTreeSet;
use std::sync::Arc;

use itertools::Itertools;
use regex::Regex;
use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult};
use crate::config::ValidationConfig;
use crate::domain::{ComposeFile, MountSource};
use crate::infrastructure::traits::EnvSource;

/// Severity of a reported issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Must be fixed; the descriptor will not deploy as intended.
    Error,
    /// Should be reviewed.
    Warning,
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub severity: Severity,
    /// Name of the check that produced this issue.
    pub check: &'static str,
    pub message: String,
}

/// Result of validating a descriptor.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub issues: Vec<Issue>,
    pub error_count: usize,
    pub warning_count: usize,
}

impl Report {
    pub fn add(&mut self, severity: Severity, check: &'static str, message: impl Into<String>) {
        match severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
        }
        self.issues.push(Issue {
            severity,
            check,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Service running the configured checks against a descriptor.
pub struct ValidationService {
    env: Arc<dyn EnvSource>,
    config: ValidationConfig,
}

impl ValidationService {
    pub fn new(env: Arc<dyn EnvSource>, config: ValidationConfig) -> Self {
        Self { env, config }
    }

    fn enabled(&self, check: &str) -> bool {
        !self.config.disabled.iter().any(|d| d == check)
    }

    /// Run all enabled checks.
    ///
    /// `missing_vars` comes from the loader: variables interpolation had to
    /// substitute with the empty string.
    pub fn validate(
        &self,
        file: &ComposeFile,
        missing_vars: &[String],
    ) -> ApplicationResult<Report> {
        let mut report = Report::default();

        if self.enabled("images") {
            self.check_images(file, &mut report);
        }
        if self.enabled("ports") {
            self.check_ports(file, &mut report);
        }
        if self.enabled("volumes") {
            self.check_volumes(file, &mut report);
        }
        if self.enabled("credentials") {
            self.check_credentials(file, &mut report);
        }
        if self.enabled("references") {
            self.check_references(file, &mut report);
        }
        if self.enabled("environment") {
            self.check_environment(file, missing_vars, &mut report)?;
        }
        if self.enabled("names") {
            self.check_names(file, &mut report);
        }

        debug!(
            "validate: {} error(s), {} warning(s)",
            report.error_count, report.warning_count
        );
        Ok(report)
    }

    fn check_images(&self, file: &ComposeFile, report: &mut Report) {
        for (name, service) in &file.services {
            if service.image.is_none() && service.build.is_none() {
                report.add(
                    Severity::Error,
                    "images",
                    format!("service {name}: neither image nor build is declared"),
                );
            }
        }
    }

    fn check_ports(&self, file: &ComposeFile, report: &mut Report) {
        let published: Vec<(&String, &crate::domain::PortMapping)> = file
            .services
            .iter()
            .flat_map(|(name, service)| {
                service
                    .ports
                    .iter()
                    .filter(|p| p.host_port.is_some())
                    .map(move |p| (name, p))
            })
            .collect();

        for (i, (a_name, a)) in published.iter().enumerate() {
            for (b_name, b) in published.iter().skip(i + 1) {
                if a.host_port != b.host_port || a.protocol != b.protocol {
                    continue;
                }
                // A mapping without a host ip binds all interfaces, so it
                // collides with any ip on the same port.
                let ip_overlap = match (&a.host_ip, &b.host_ip) {
                    (Some(x), Some(y)) => x == y,
                    _ => true,
                };
                if ip_overlap {
                    report.add(
                        Severity::Error,
                        "ports",
                        format!(
                            "published port {a} of service {a_name} collides with {b} of service {b_name}"
                        ),
                    );
                }
            }
        }
    }

    fn check_volumes(&self, file: &ComposeFile, report: &mut Report) {
        let mut used: BTreeSet<&str> = BTreeSet::new();
        for (name, service) in &file.services {
            for mount in &service.volumes {
                if let MountSource::Named(volume) = &mount.source {
                    used.insert(volume.as_str());
                    if !file.volumes.contains_key(volume) {
                        report.add(
                            Severity::Error,
                            "volumes",
                            format!(
                                "service {name}: named volume {volume} is not declared under volumes"
                            ),
                        );
                    }
                }
            }
        }
        for volume in file.volumes.keys() {
            if !used.contains(volume.as_str()) {
                report.add(
                    Severity::Warning,
                    "volumes",
                    format!("volume {volume} is declared but not referenced by any service"),
                );
            }
        }
    }

    /// A `<PREFIX>_HOST` value naming another service links the two: every
    /// `<PREFIX>_*` variable declared on both sides must agree, otherwise
    /// the consumer is configured against credentials the provider does not
    /// accept.
    fn check_credentials(&self, file: &ComposeFile, report: &mut Report) {
        for (consumer_name, consumer) in &file.services {
            for (key, value) in &consumer.environment {
                let Some(prefix) = key.strip_suffix("_HOST") else {
                    continue;
                };
                if prefix.is_empty() {
                    continue;
                }
                let Some(target) = value else { continue };
                if target == consumer_name {
                    continue;
                }
                let Some(provider) = file.services.get(target) else {
                    continue;
                };

                let prefix_key = format!("{prefix}_");
                let shared: Vec<&String> = consumer
                    .environment
                    .keys()
                    .filter(|k| k.starts_with(&prefix_key) && *k != key)
                    .filter(|k| provider.environment.contains_key(*k))
                    .collect();
                if shared.len() < self.config.env_prefix_min_vars {
                    continue;
                }

                debug!(
                    "credentials: {consumer_name} -> {target}, {} shared {prefix}_* variable(s)",
                    shared.len()
                );
                for var in shared {
                    match (consumer.env(var), provider.env(var)) {
                        (Some(c), Some(p)) if c != p => {
                            report.add(
                                Severity::Error,
                                "credentials",
                                format!(
                                    "services {consumer_name} and {target} disagree on {var}"
                                ),
                            );
                        }
                        (Some(_), Some(_)) => {}
                        _ => {
                            report.add(
                                Severity::Warning,
                                "credentials",
                                format!(
                                    "{var} is a pass-through on one of {consumer_name}, {target}; cannot verify it matches"
                                ),
                            );
                        }
                    }
                }
            }
        }
    }

    fn check_references(&self, file: &ComposeFile, report: &mut Report) {
        for (name, service) in &file.services {
            for target in &service.depends_on {
                if !file.services.contains_key(target) {
                    report.add(
                        Severity::Error,
                        "references",
                        format!("service {name}: depends_on references unknown service {target}"),
                    );
                }
            }
        }
    }

    fn check_environment(
        &self,
        file: &ComposeFile,
        missing_vars: &[String],
        report: &mut Report,
    ) -> ApplicationResult<()> {
        let name_re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").map_err(|e| {
            ApplicationError::OperationFailed {
                context: "compile variable-name pattern".to_string(),
                source: Box::new(e),
            }
        })?;

        for (name, service) in &file.services {
            for (key, value) in &service.environment {
                if !name_re.is_match(key) {
                    report.add(
                        Severity::Warning,
                        "environment",
                        format!("service {name}: invalid variable name {key}"),
                    );
                }
                if value.is_none() && self.env.var(key).is_none() {
                    report.add(
                        Severity::Warning,
                        "environment",
                        format!(
                            "service {name}: pass-through variable {key} is unset in the current environment"
                        ),
                    );
                }
            }
        }

        for var in missing_vars {
            report.add(
                Severity::Warning,
                "environment",
                format!("variable {var} is unset; interpolated as empty string"),
            );
        }

        Ok(())
    }

    fn check_names(&self, file: &ComposeFile, report: &mut Report) {
        let by_container_name = file
            .services
            .iter()
            .filter_map(|(name, service)| {
                service
                    .container_name
                    .as_deref()
                    .map(|container| (container, name.as_str()))
            })
            .into_group_map();

        for (container, services) in by_container_name {
            if services.len() > 1 {
                report.add(
                    Severity::Error,
                    "names",
                    format!(
                        "container name {container} is used by multiple services: {}",
                        services.iter().join(", ")
                    ),
                );
            }
        }
    }
}
