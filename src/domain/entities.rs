//! Domain entities: the typed compose model
//!
//! Shorthand forms (`"8000:8000"`, `"./static:/app/static"`) are parsed
//! into structured types at deserialization time, so everything downstream
//! works on one canonical representation.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// A parsed compose descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
    #[serde(default, deserialize_with = "de_volumes", skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, VolumeSpec>,
}

impl ComposeFile {
    /// Deserialize a descriptor from YAML text.
    ///
    /// Empty input and non-mapping top levels are rejected before serde
    /// gets a chance to produce a less helpful message.
    pub fn from_yaml(content: &str) -> Result<Self, DomainError> {
        if content.trim().is_empty() {
            return Err(DomainError::EmptyDescriptor);
        }
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| DomainError::Syntax {
                message: e.to_string(),
            })?;
        Self::from_value(value)
    }

    /// Deserialize a descriptor from an already-parsed YAML value.
    ///
    /// This is the entry point after interpolation, which works on the
    /// value tree rather than on raw text.
    pub fn from_value(value: serde_yaml::Value) -> Result<Self, DomainError> {
        if !value.is_mapping() {
            return Err(DomainError::NotAMapping);
        }
        serde_yaml::from_value(value).map_err(|e| DomainError::Syntax {
            message: e.to_string(),
        })
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }
}

/// A named container definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortMapping>,
    /// Environment variables. `None` values are pass-through variables,
    /// resolved from the invoking environment at container start.
    #[serde(
        default,
        deserialize_with = "de_environment",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub environment: BTreeMap<String, Option<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeMount>,
    #[serde(
        default,
        deserialize_with = "de_depends_on",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    #[serde(
        default,
        deserialize_with = "de_string_or_seq",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub env_file: Vec<PathBuf>,
}

impl Service {
    /// Look up a declared environment variable value.
    /// Returns `None` for undeclared AND for pass-through variables.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.environment.get(key).and_then(|v| v.as_deref())
    }
}

/// Build context for a locally-built image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub context: PathBuf,
    pub dockerfile: Option<String>,
}

impl<'de> Deserialize<'de> for BuildSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        match value {
            serde_yaml::Value::String(context) => Ok(Self {
                context: PathBuf::from(context),
                dockerfile: None,
            }),
            serde_yaml::Value::Mapping(_) => {
                #[derive(Deserialize)]
                struct Long {
                    context: PathBuf,
                    #[serde(default)]
                    dockerfile: Option<String>,
                }
                let long: Long = serde_yaml::from_value(value).map_err(de::Error::custom)?;
                Ok(Self {
                    context: long.context,
                    dockerfile: long.dockerfile,
                })
            }
            other => Err(de::Error::custom(DomainError::InvalidBuild {
                spec: format!("{other:?}"),
            })),
        }
    }
}

impl Serialize for BuildSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("context", &self.context)?;
        if let Some(dockerfile) = &self.dockerfile {
            map.serialize_entry("dockerfile", dockerfile)?;
        }
        map.end()
    }
}

/// Transport protocol of a published port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl FromStr for Protocol {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err(DomainError::InvalidPort {
                spec: format!("unknown protocol: {s}"),
            }),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A host-to-container port mapping.
///
/// `host_port == None` means the runtime picks an ephemeral host port;
/// such mappings never collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PortMapping {
    pub host_ip: Option<IpAddr>,
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn container_only(container_port: u16) -> Self {
        Self {
            host_ip: None,
            host_port: None,
            container_port,
            protocol: Protocol::Tcp,
        }
    }
}

fn parse_port_number(s: &str, full_spec: &str) -> Result<u16, DomainError> {
    let port: u16 = s.trim().parse().map_err(|_| DomainError::InvalidPort {
        spec: full_spec.to_string(),
    })?;
    if port == 0 {
        return Err(DomainError::InvalidPort {
            spec: full_spec.to_string(),
        });
    }
    Ok(port)
}

impl FromStr for PortMapping {
    type Err = DomainError;

    /// Parse shorthand: `8000`, `8000:8000`, `127.0.0.1:5432:5432`, `53:53/udp`.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (addr, protocol) = match spec.split_once('/') {
            Some((addr, proto)) => (addr, proto.parse::<Protocol>()?),
            None => (spec, Protocol::Tcp),
        };

        let parts: Vec<&str> = addr.split(':').collect();
        match parts.as_slice() {
            [container] => Ok(Self {
                host_ip: None,
                host_port: None,
                container_port: parse_port_number(container, spec)?,
                protocol,
            }),
            [host, container] => Ok(Self {
                host_ip: None,
                host_port: Some(parse_port_number(host, spec)?),
                container_port: parse_port_number(container, spec)?,
                protocol,
            }),
            [ip, host, container] => {
                let host_ip = ip.parse::<IpAddr>().map_err(|_| DomainError::InvalidPort {
                    spec: spec.to_string(),
                })?;
                Ok(Self {
                    host_ip: Some(host_ip),
                    host_port: Some(parse_port_number(host, spec)?),
                    container_port: parse_port_number(container, spec)?,
                    protocol,
                })
            }
            _ => Err(DomainError::InvalidPort {
                spec: spec.to_string(),
            }),
        }
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ip) = &self.host_ip {
            write!(f, "{ip}:")?;
        }
        if let Some(host) = self.host_port {
            write!(f, "{host}:")?;
        }
        write!(f, "{}", self.container_port)?;
        if self.protocol != Protocol::Tcp {
            write!(f, "/{}", self.protocol)?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for PortMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        match value {
            serde_yaml::Value::String(s) => s.parse().map_err(de::Error::custom),
            serde_yaml::Value::Number(n) => {
                let port = n
                    .as_u64()
                    .and_then(|v| u16::try_from(v).ok())
                    .filter(|&v| v != 0)
                    .ok_or_else(|| {
                        de::Error::custom(DomainError::InvalidPort {
                            spec: n.to_string(),
                        })
                    })?;
                Ok(PortMapping::container_only(port))
            }
            serde_yaml::Value::Mapping(_) => {
                #[derive(Deserialize)]
                struct Long {
                    target: u16,
                    #[serde(default)]
                    published: Option<u16>,
                    #[serde(default)]
                    host_ip: Option<IpAddr>,
                    #[serde(default)]
                    protocol: Option<String>,
                }
                let long: Long = serde_yaml::from_value(value).map_err(de::Error::custom)?;
                let protocol = match long.protocol.as_deref() {
                    Some(p) => p.parse().map_err(de::Error::custom)?,
                    None => Protocol::Tcp,
                };
                Ok(Self {
                    host_ip: long.host_ip,
                    host_port: long.published,
                    container_port: long.target,
                    protocol,
                })
            }
            other => Err(de::Error::custom(DomainError::InvalidPort {
                spec: format!("{other:?}"),
            })),
        }
    }
}

impl Serialize for PortMapping {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        if let Some(ip) = &self.host_ip {
            map.serialize_entry("host_ip", &ip.to_string())?;
        }
        if let Some(host) = self.host_port {
            map.serialize_entry("published", &host)?;
        }
        map.serialize_entry("target", &self.container_port)?;
        map.serialize_entry("protocol", self.protocol.as_str())?;
        map.end()
    }
}

/// Where a mount's data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountSource {
    /// Runtime-managed named volume, declared top-level.
    Named(String),
    /// Host path mapped into the container.
    Bind(PathBuf),
    /// Anonymous volume, created per container.
    Anonymous,
}

/// A volume or bind mount on a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub source: MountSource,
    /// Absolute path inside the container.
    pub target: String,
    pub read_only: bool,
}

fn classify_source(source: &str) -> MountSource {
    // Path-looking sources are bind mounts; bare names are named volumes.
    if source.starts_with('/')
        || source.starts_with("./")
        || source.starts_with("../")
        || source.starts_with('~')
    {
        MountSource::Bind(PathBuf::from(source))
    } else {
        MountSource::Named(source.to_string())
    }
}

fn require_absolute_target(target: &str, spec: &str) -> Result<String, DomainError> {
    if !target.starts_with('/') {
        return Err(DomainError::InvalidMount {
            spec: spec.to_string(),
        });
    }
    Ok(target.to_string())
}

fn parse_mount_mode(mode: &str, spec: &str) -> Result<bool, DomainError> {
    // Modes like "ro,z" exist; only ro/rw matter for the model.
    let mut read_only = false;
    for token in mode.split(',') {
        match token {
            "ro" => read_only = true,
            "rw" | "z" | "Z" | "cached" | "delegated" | "consistent" => {}
            _ => {
                return Err(DomainError::InvalidMount {
                    spec: spec.to_string(),
                })
            }
        }
    }
    Ok(read_only)
}

impl FromStr for VolumeMount {
    type Err = DomainError;

    /// Parse shorthand: `/in/container`, `./static:/app/static`,
    /// `postgres-data:/var/lib/postgresql/data`, `conf:/etc/conf:ro`.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = spec.split(':').collect();
        match parts.as_slice() {
            [target] => Ok(Self {
                source: MountSource::Anonymous,
                target: require_absolute_target(target, spec)?,
                read_only: false,
            }),
            [source, target] => Ok(Self {
                source: classify_source(source),
                target: require_absolute_target(target, spec)?,
                read_only: false,
            }),
            [source, target, mode] => Ok(Self {
                source: classify_source(source),
                target: require_absolute_target(target, spec)?,
                read_only: parse_mount_mode(mode, spec)?,
            }),
            _ => Err(DomainError::InvalidMount {
                spec: spec.to_string(),
            }),
        }
    }
}

impl fmt::Display for VolumeMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            MountSource::Named(name) => write!(f, "{name}:{}", self.target)?,
            MountSource::Bind(path) => write!(f, "{}:{}", path.display(), self.target)?,
            MountSource::Anonymous => write!(f, "{}", self.target)?,
        }
        if self.read_only {
            write!(f, ":ro")?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for VolumeMount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        match value {
            serde_yaml::Value::String(s) => s.parse().map_err(de::Error::custom),
            serde_yaml::Value::Mapping(_) => {
                #[derive(Deserialize)]
                struct Long {
                    #[serde(rename = "type", default)]
                    kind: Option<String>,
                    #[serde(default)]
                    source: Option<String>,
                    target: String,
                    #[serde(default)]
                    read_only: bool,
                }
                let long: Long = serde_yaml::from_value(value).map_err(de::Error::custom)?;
                let source = match (long.kind.as_deref(), long.source) {
                    (Some("bind"), Some(path)) => MountSource::Bind(PathBuf::from(path)),
                    (Some("volume"), Some(name)) => MountSource::Named(name),
                    (Some("volume") | Some("tmpfs") | None, None) => MountSource::Anonymous,
                    (None, Some(source)) => classify_source(&source),
                    (Some(kind), _) => {
                        return Err(de::Error::custom(DomainError::InvalidMount {
                            spec: format!("unsupported mount type: {kind}"),
                        }))
                    }
                };
                let target = require_absolute_target(&long.target, &long.target)
                    .map_err(de::Error::custom)?;
                Ok(Self {
                    source,
                    target,
                    read_only: long.read_only,
                })
            }
            other => Err(de::Error::custom(DomainError::InvalidMount {
                spec: format!("{other:?}"),
            })),
        }
    }
}

impl Serialize for VolumeMount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        match &self.source {
            MountSource::Named(name) => {
                map.serialize_entry("type", "volume")?;
                map.serialize_entry("source", name)?;
            }
            MountSource::Bind(path) => {
                map.serialize_entry("type", "bind")?;
                map.serialize_entry("source", path)?;
            }
            MountSource::Anonymous => {
                map.serialize_entry("type", "volume")?;
            }
        }
        map.serialize_entry("target", &self.target)?;
        if self.read_only {
            map.serialize_entry("read_only", &true)?;
        }
        map.end()
    }
}

/// Top-level named volume declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

/// Top-level volumes: `postgres-data:` with a null body is the common case.
fn de_volumes<'de, D>(deserializer: D) -> Result<BTreeMap<String, VolumeSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Option<VolumeSpec>> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, spec)| (name, spec.unwrap_or_default()))
        .collect())
}

fn scalar_to_string<E: de::Error>(value: &serde_yaml::Value) -> Result<String, E> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!(
            "expected scalar value, got {other:?}"
        ))),
    }
}

/// Environment accepts both the map form and the `KEY=value` list form.
/// A list entry without `=` (or a null map value) is a pass-through variable.
fn de_environment<'de, D>(deserializer: D) -> Result<BTreeMap<String, Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    let mut environment = BTreeMap::new();
    match value {
        serde_yaml::Value::Null => {}
        serde_yaml::Value::Mapping(map) => {
            for (key, val) in &map {
                let key = scalar_to_string::<D::Error>(key)?;
                let val = match val {
                    serde_yaml::Value::Null => None,
                    other => Some(scalar_to_string::<D::Error>(other)?),
                };
                environment.insert(key, val);
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            for entry in &seq {
                let entry = scalar_to_string::<D::Error>(entry)?;
                match entry.split_once('=') {
                    Some((key, val)) => {
                        environment.insert(key.to_string(), Some(val.to_string()));
                    }
                    None => {
                        environment.insert(entry, None);
                    }
                }
            }
        }
        other => {
            return Err(de::Error::custom(format!(
                "environment must be a map or a list, got {other:?}"
            )))
        }
    }
    Ok(environment)
}

/// `depends_on` accepts the list form and the long map form (conditions
/// are ignored; only the service names matter here).
fn de_depends_on<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::Null => Ok(vec![]),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(scalar_to_string::<D::Error>)
            .collect::<Result<Vec<_>, _>>(),
        serde_yaml::Value::Mapping(map) => map
            .iter()
            .map(|(key, _)| scalar_to_string::<D::Error>(key))
            .collect::<Result<Vec<_>, _>>(),
        other => Err(de::Error::custom(format!(
            "depends_on must be a list or a map, got {other:?}"
        ))),
    }
}

/// `env_file` accepts a single string or a list of strings.
fn de_string_or_seq<'de, D>(deserializer: D) -> Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::Null => Ok(vec![]),
        serde_yaml::Value::String(s) => Ok(vec![PathBuf::from(s)]),
        serde_yaml::Value::Sequence(seq) => Ok(seq
            .iter()
            .map(scalar_to_string::<D::Error>)
            .collect::<Result<Vec<String>, _>>()?
            .into_iter()
            .map(PathBuf::from)
            .collect()),
        other => Err(de::Error::custom(format!(
            "env_file must be a string or a list, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("8000", None, None, 8000, Protocol::Tcp)]
    #[case("8000:8000", None, Some(8000), 8000, Protocol::Tcp)]
    #[case("127.0.0.1:5432:5432", Some("127.0.0.1"), Some(5432), 5432, Protocol::Tcp)]
    #[case("53:5353/udp", None, Some(53), 5353, Protocol::Udp)]
    fn given_port_shorthand_when_parsing_then_fields_match(
        #[case] spec: &str,
        #[case] ip: Option<&str>,
        #[case] host: Option<u16>,
        #[case] container: u16,
        #[case] protocol: Protocol,
    ) {
        let mapping: PortMapping = spec.parse().unwrap();
        assert_eq!(mapping.host_ip, ip.map(|i| i.parse().unwrap()));
        assert_eq!(mapping.host_port, host);
        assert_eq!(mapping.container_port, container);
        assert_eq!(mapping.protocol, protocol);
    }

    #[rstest]
    #[case("0")]
    #[case("65536:80")]
    #[case("http:80")]
    #[case("1.2.3:80:80")]
    #[case("80:80/icmp")]
    fn given_invalid_port_shorthand_when_parsing_then_errors(#[case] spec: &str) {
        assert!(spec.parse::<PortMapping>().is_err());
    }

    #[test]
    fn given_bind_shorthand_when_parsing_then_classified_as_bind() {
        let mount: VolumeMount = "./static:/app/static".parse().unwrap();
        assert_eq!(mount.source, MountSource::Bind(PathBuf::from("./static")));
        assert_eq!(mount.target, "/app/static");
        assert!(!mount.read_only);
    }

    #[test]
    fn given_named_shorthand_when_parsing_then_classified_as_named() {
        let mount: VolumeMount = "postgres-data:/var/lib/postgresql/data".parse().unwrap();
        assert_eq!(mount.source, MountSource::Named("postgres-data".into()));
        assert_eq!(mount.target, "/var/lib/postgresql/data");
    }

    #[test]
    fn given_ro_suffix_when_parsing_then_read_only() {
        let mount: VolumeMount = "conf:/etc/conf:ro".parse().unwrap();
        assert!(mount.read_only);
    }

    #[test]
    fn given_relative_target_when_parsing_then_errors() {
        assert!("./static:app/static".parse::<VolumeMount>().is_err());
    }

    #[test]
    fn given_list_environment_when_deserializing_then_passthrough_is_none() {
        let yaml = r#"
image: nginx:alpine
environment:
  - TZ
  - MODE=prod
"#;
        let service: Service = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(service.environment.get("TZ"), Some(&None));
        assert_eq!(service.env("MODE"), Some("prod"));
    }

    #[test]
    fn given_numeric_environment_value_when_deserializing_then_stringified() {
        let yaml = "environment:\n  POSTGRES_PORT: 5432\n";
        let service: Service = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(service.env("POSTGRES_PORT"), Some("5432"));
    }

    #[test]
    fn given_null_volume_body_when_deserializing_then_default_spec() {
        let yaml = "services: {}\nvolumes:\n  postgres-data:\n";
        let file = ComposeFile::from_yaml(yaml).unwrap();
        assert_eq!(file.volumes.get("postgres-data"), Some(&VolumeSpec::default()));
    }

    #[test]
    fn given_empty_input_when_parsing_then_empty_descriptor_error() {
        assert!(matches!(
            ComposeFile::from_yaml("  \n"),
            Err(DomainError::EmptyDescriptor)
        ));
    }

    #[test]
    fn given_scalar_top_level_when_parsing_then_not_a_mapping_error() {
        assert!(matches!(
            ComposeFile::from_yaml("42"),
            Err(DomainError::NotAMapping)
        ));
    }
}
