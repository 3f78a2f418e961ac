//! Tests for descriptor parsing into the typed model

use std::path::PathBuf;

use rscompose::domain::{ComposeFile, MountSource, Protocol};

const TWO_SERVICE_STACK: &str = r#"
version: "3.8"

services:
  web:
    build: .
    image: webapp:v1
    container_name: web
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
      TZ: Europe/Berlin
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
fn given_two_service_stack_when_parsing_then_model_is_complete() {
    let file = ComposeFile::from_yaml(TWO_SERVICE_STACK).unwrap();

    assert_eq!(file.version.as_deref(), Some("3.8"));
    assert_eq!(file.services.len(), 2);

    let web = file.service("web").unwrap();
    assert_eq!(web.image.as_deref(), Some("webapp:v1"));
    assert_eq!(
        web.build.as_ref().map(|b| b.context.clone()),
        Some(PathBuf::from("."))
    );
    assert_eq!(web.ports.len(), 1);
    assert_eq!(web.ports[0].host_port, Some(8000));
    assert_eq!(web.ports[0].container_port, 8000);
    assert_eq!(web.ports[0].protocol, Protocol::Tcp);
    assert_eq!(web.env("POSTGRES_HOST"), Some("db"));
    assert_eq!(web.env("POSTGRES_PORT"), Some("5432"));
    assert_eq!(web.env("TZ"), Some("Europe/Berlin"));
    assert_eq!(web.depends_on, vec!["db".to_string()]);
    assert_eq!(
        web.volumes[0].source,
        MountSource::Bind(PathBuf::from("./static"))
    );
    assert_eq!(web.volumes[0].target, "/app/static");

    let db = file.service("db").unwrap();
    assert_eq!(db.image.as_deref(), Some("postgres:15.5-alpine"));
    assert_eq!(
        db.volumes[0].source,
        MountSource::Named("postgres-data".to_string())
    );
    assert_eq!(db.volumes[0].target, "/var/lib/postgresql/data");

    let volume = file.volumes.get("postgres-data").unwrap();
    assert_eq!(volume.driver.as_deref(), Some("local"));
    assert!(!volume.external);
}

#[test]
fn given_long_form_ports_when_parsing_then_equivalent_to_shorthand() {
    let yaml = r#"
services:
  app:
    image: app:latest
    ports:
      - target: 8000
        published: 8000
        host_ip: 127.0.0.1
        protocol: tcp
      - 9000
"#;
    let file = ComposeFile::from_yaml(yaml).unwrap();
    let app = file.service("app").unwrap();
    assert_eq!(app.ports[0].host_ip, Some("127.0.0.1".parse().unwrap()));
    assert_eq!(app.ports[0].host_port, Some(8000));
    assert_eq!(app.ports[1].host_port, None);
    assert_eq!(app.ports[1].container_port, 9000);
}

#[test]
fn given_long_form_mounts_when_parsing_then_equivalent_to_shorthand() {
    let yaml = r#"
services:
  app:
    image: app:latest
    volumes:
      - type: bind
        source: ./conf
        target: /etc/app
        read_only: true
      - type: volume
        source: data
        target: /var/lib/app
"#;
    let file = ComposeFile::from_yaml(yaml).unwrap();
    let app = file.service("app").unwrap();
    assert_eq!(app.volumes[0].source, MountSource::Bind(PathBuf::from("./conf")));
    assert!(app.volumes[0].read_only);
    assert_eq!(app.volumes[1].source, MountSource::Named("data".to_string()));
    assert!(!app.volumes[1].read_only);
}

#[test]
fn given_list_environment_when_parsing_then_same_as_map_form() {
    let yaml = r#"
services:
  app:
    image: app:latest
    environment:
      - POSTGRES_HOST=db
      - TZ
"#;
    let file = ComposeFile::from_yaml(yaml).unwrap();
    let app = file.service("app").unwrap();
    assert_eq!(app.env("POSTGRES_HOST"), Some("db"));
    // Pass-through: declared, no value in the descriptor
    assert_eq!(app.environment.get("TZ"), Some(&None));
    assert_eq!(app.env("TZ"), None);
}

#[test]
fn given_depends_on_map_form_when_parsing_then_names_extracted() {
    let yaml = r#"
services:
  app:
    image: app:latest
    depends_on:
      db:
        condition: service_started
  db:
    image: postgres:15.5-alpine
"#;
    let file = ComposeFile::from_yaml(yaml).unwrap();
    assert_eq!(file.service("app").unwrap().depends_on, vec!["db".to_string()]);
}

#[test]
fn given_invalid_port_in_descriptor_when_parsing_then_syntax_error() {
    let yaml = "services:\n  app:\n    image: a\n    ports:\n      - \"99999:80\"\n";
    assert!(ComposeFile::from_yaml(yaml).is_err());
}
