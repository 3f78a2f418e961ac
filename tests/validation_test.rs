//! Tests for the configuration-validity checks

use std::sync::Arc;

use rscompose::application::services::{Severity, ValidationService};
use rscompose::config::ValidationConfig;
use rscompose::domain::ComposeFile;
use rscompose::infrastructure::traits::MapEnv;

fn validate(yaml: &str) -> rscompose::application::services::Report {
    validate_with_env(yaml, &[])
}

fn validate_with_env(yaml: &str, env: &[(&str, &str)]) -> rscompose::application::services::Report {
    let file = ComposeFile::from_yaml(yaml).unwrap();
    let service = ValidationService::new(
        Arc::new(MapEnv::from_pairs(env)),
        ValidationConfig::default(),
    );
    service.validate(&file, &[]).unwrap()
}

fn messages(report: &rscompose::application::services::Report, check: &str) -> Vec<String> {
    report
        .issues
        .iter()
        .filter(|i| i.check == check)
        .map(|i| i.message.clone())
        .collect()
}

const CLEAN_STACK: &str = r#"
services:
  web:
    image: webapp:v1
    ports:
      - "8000:8000"
    volumes:
      - ./static:/app/static
    environment:
      POSTGRES_DB: appdb
      POSTGRES_USER: admin
      POSTGRES_PASSWORD: secret
      POSTGRES_HOST: db
      POSTGRES_PORT: 5432
      TZ: UTC
    depends_on:
      - db
  db:
    image: postgres:15.5-alpine
    ports:
      - "5432:5432"
    environment:
      POSTGRES_DB: appdb
      POSTGRES_USER: admin
      POSTGRES_PASSWORD: secret
    volumes:
      - postgres-data:/var/lib/postgresql/data
volumes:
  postgres-data:
    driver: local
"#;

#[test]
fn given_consistent_stack_when_validating_then_clean() {
    let report = validate(CLEAN_STACK);
    assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
}

#[test]
fn given_mismatched_credentials_when_validating_then_error() {
    let yaml = CLEAN_STACK.replace("POSTGRES_PASSWORD: secret\n      POSTGRES_HOST", "POSTGRES_PASSWORD: wrong\n      POSTGRES_HOST");
    let report = validate(&yaml);
    let creds = messages(&report, "credentials");
    assert_eq!(creds.len(), 1);
    assert!(creds[0].contains("POSTGRES_PASSWORD"));
    assert!(report.has_errors());
}

#[test]
fn given_passthrough_credential_when_validating_then_warning_not_error() {
    // Password is a pass-through on the web side only; cannot be compared.
    let yaml = r#"
services:
  web:
    image: webapp:v1
    environment:
      POSTGRES_DB: appdb
      POSTGRES_USER: admin
      POSTGRES_PASSWORD:
      POSTGRES_HOST: db
  db:
    image: postgres:15.5-alpine
    environment:
      POSTGRES_DB: appdb
      POSTGRES_USER: admin
      POSTGRES_PASSWORD: secret
"#;
    let report = validate_with_env(yaml, &[("POSTGRES_PASSWORD", "secret")]);
    let creds: Vec<_> = report
        .issues
        .iter()
        .filter(|i| i.check == "credentials")
        .collect();
    assert_eq!(creds.len(), 1);
    assert_eq!(creds[0].severity, Severity::Warning);
}

#[test]
fn given_single_shared_prefix_var_when_validating_then_link_not_considered() {
    // Below env_prefix_min_vars (2): likely a coincidental prefix match.
    let yaml = r#"
services:
  web:
    image: webapp:v1
    environment:
      CACHE_HOST: cache
      CACHE_SIZE: "100"
  cache:
    image: redis:7-alpine
    environment:
      CACHE_SIZE: "200"
"#;
    let report = validate(yaml);
    assert!(messages(&report, "credentials").is_empty());
}

#[test]
fn given_colliding_host_ports_when_validating_then_error() {
    let yaml = r#"
services:
  a:
    image: a:1
    ports:
      - "8080:80"
  b:
    image: b:1
    ports:
      - "8080:8000"
"#;
    let report = validate(yaml);
    let ports = messages(&report, "ports");
    assert_eq!(ports.len(), 1);
    assert!(ports[0].contains("8080"));
}

#[test]
fn given_wildcard_and_specific_ip_on_same_port_when_validating_then_error() {
    let yaml = r#"
services:
  a:
    image: a:1
    ports:
      - "8080:80"
  b:
    image: b:1
    ports:
      - "127.0.0.1:8080:80"
"#;
    let report = validate(yaml);
    assert_eq!(messages(&report, "ports").len(), 1);
}

#[test]
fn given_distinct_ips_on_same_port_when_validating_then_clean() {
    let yaml = r#"
services:
  a:
    image: a:1
    ports:
      - "127.0.0.1:8080:80"
  b:
    image: b:1
    ports:
      - "127.0.0.2:8080:80"
"#;
    let report = validate(yaml);
    assert!(messages(&report, "ports").is_empty());
}

#[test]
fn given_same_port_different_protocols_when_validating_then_clean() {
    let yaml = r#"
services:
  a:
    image: a:1
    ports:
      - "5353:53"
      - "5353:53/udp"
"#;
    let report = validate(yaml);
    assert!(messages(&report, "ports").is_empty());
}

#[test]
fn given_undeclared_named_volume_when_validating_then_error() {
    let yaml = r#"
services:
  db:
    image: postgres:15.5-alpine
    volumes:
      - postgres-data:/var/lib/postgresql/data
"#;
    let report = validate(yaml);
    let volumes = messages(&report, "volumes");
    assert_eq!(volumes.len(), 1);
    assert!(volumes[0].contains("postgres-data"));
    assert!(report.has_errors());
}

#[test]
fn given_unused_declared_volume_when_validating_then_warning() {
    let yaml = r#"
services:
  db:
    image: postgres:15.5-alpine
volumes:
  orphaned:
"#;
    let report = validate(yaml);
    assert_eq!(report.warning_count, 1);
    assert!(messages(&report, "volumes")[0].contains("orphaned"));
    assert!(!report.has_errors());
}

#[test]
fn given_unknown_depends_on_target_when_validating_then_error() {
    let yaml = r#"
services:
  web:
    image: webapp:v1
    depends_on:
      - database
"#;
    let report = validate(yaml);
    let refs = messages(&report, "references");
    assert_eq!(refs.len(), 1);
    assert!(refs[0].contains("database"));
}

#[test]
fn given_service_without_image_or_build_when_validating_then_error() {
    let report = validate("services:\n  ghost: {}\n");
    assert_eq!(messages(&report, "images").len(), 1);
}

#[test]
fn given_invalid_variable_name_when_validating_then_warning() {
    let yaml = r#"
services:
  app:
    image: app:1
    environment:
      - 1BAD=value
"#;
    let report = validate(yaml);
    assert!(messages(&report, "environment")[0].contains("1BAD"));
    assert!(!report.has_errors());
}

#[test]
fn given_unset_passthrough_when_validating_then_warning_until_env_provides_it() {
    let yaml = r#"
services:
  app:
    image: app:1
    environment:
      - TZ
"#;
    let report = validate(yaml);
    assert_eq!(report.warning_count, 1);

    let report = validate_with_env(yaml, &[("TZ", "UTC")]);
    assert!(report.is_clean());
}

#[test]
fn given_duplicate_container_names_when_validating_then_error() {
    let yaml = r#"
services:
  a:
    image: a:1
    container_name: app
  b:
    image: b:1
    container_name: app
"#;
    let report = validate(yaml);
    let names = messages(&report, "names");
    assert_eq!(names.len(), 1);
    assert!(names[0].contains("app"));
}

#[test]
fn given_disabled_credentials_check_when_validating_then_mismatch_ignored() {
    let yaml = CLEAN_STACK.replace("POSTGRES_PASSWORD: secret\n      POSTGRES_HOST", "POSTGRES_PASSWORD: wrong\n      POSTGRES_HOST");
    let file = ComposeFile::from_yaml(&yaml).unwrap();
    let config = ValidationConfig {
        disabled: vec!["credentials".to_string()],
        ..ValidationConfig::default()
    };
    let service = ValidationService::new(Arc::new(MapEnv::default()), config);
    let report = service.validate(&file, &[]).unwrap();
    assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
}
