//! Normalized output rendering
//!
//! Turns the typed model back into text: canonical YAML (shorthand
//! expanded to long forms), `export` lines for a service environment,
//! and tabular port/mount listings.

use std::sync::Arc;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{ComposeFile, Service};
use crate::infrastructure::traits::EnvSource;

pub struct RenderService {
    env: Arc<dyn EnvSource>,
}

impl RenderService {
    pub fn new(env: Arc<dyn EnvSource>) -> Self {
        Self { env }
    }

    /// Canonical YAML of the typed model.
    pub fn to_yaml(&self, file: &ComposeFile) -> ApplicationResult<String> {
        serde_yaml::to_string(file).map_err(|e| ApplicationError::OperationFailed {
            context: "render descriptor".to_string(),
            source: Box::new(e),
        })
    }

    /// A service's environment as `export KEY=value` lines.
    ///
    /// Pass-through variables resolve against the invoking environment;
    /// unset ones are emitted commented-out so the output stays a valid
    /// shell fragment.
    pub fn env_exports(&self, service: &Service) -> String {
        let mut out = String::new();
        for (key, value) in &service.environment {
            match value {
                Some(value) => out.push_str(&format!("export {key}={value}\n")),
                None => match self.env.var(key) {
                    Some(value) => out.push_str(&format!("export {key}={value}\n")),
                    None => out.push_str(&format!("# export {key}=\n")),
                },
            }
        }
        out
    }

    /// One line per published or exposed port, across all services.
    pub fn port_lines(&self, file: &ComposeFile) -> Vec<String> {
        file.services
            .iter()
            .flat_map(|(name, service)| {
                service
                    .ports
                    .iter()
                    .map(move |mapping| format!("{name:<24} {mapping}"))
            })
            .collect()
    }

    /// One line per mount, across all services, plus top-level volumes.
    pub fn mount_lines(&self, file: &ComposeFile) -> Vec<String> {
        let mut lines: Vec<String> = file
            .services
            .iter()
            .flat_map(|(name, service)| {
                service
                    .volumes
                    .iter()
                    .map(move |mount| format!("{name:<24} {mount}"))
            })
            .collect();
        for (name, spec) in &file.volumes {
            let driver = spec.driver.as_deref().unwrap_or("local");
            lines.push(format!("{:<24} named volume (driver: {driver})", name));
        }
        lines
    }
}
