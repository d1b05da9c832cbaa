//! stack.toml configuration parser.
//!
//! The stack file is the authored desired state: every entity of a
//! deployment and the references between them. `validate()` checks
//! everything that can be decided locally (names, formats, ranges,
//! duplicates). Cross-entity references and topology invariants are
//! checked when the resource graph is built.

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};
use crate::source::ImageSource;
use crate::types::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    pub stack: StackMeta,
    pub network: NetworkTopology,
    #[serde(default)]
    pub secrets: Vec<SecretSpec>,
    #[serde(default)]
    pub boundaries: Vec<SecurityBoundary>,
    pub database: Option<ManagedDatabase>,
    pub cluster: Option<ComputeCluster>,
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
    #[serde(default)]
    pub services: Vec<ServiceUnit>,
    #[serde(default)]
    pub load_balancers: Vec<LoadBalancingRule>,
    /// Output name → reference string, printed after a deploy.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackMeta {
    pub name: String,
    pub version: String,
    pub region: String,
    /// External tools that must be on PATH before a deploy.
    #[serde(default = "default_required_tools")]
    pub required_tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkTopology {
    /// VPC address space, e.g. "10.0.0.0/16".
    pub cidr: String,
    /// Number of availability zones to spread subnets over.
    pub zones: u8,
    pub tiers: Vec<TierSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSpec {
    pub name: String,
    pub kind: TierKind,
    /// Prefix length of each subnet in this tier.
    pub mask: u8,
}

/// A generated credential declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretSpec {
    pub name: String,
    pub length: usize,
    /// Characters never emitted by the generator.
    #[serde(default)]
    pub exclude: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityBoundary {
    pub name: String,
    /// Name of the tier this boundary is attached to.
    pub tier: String,
    #[serde(default)]
    pub ingress: Vec<IngressRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IngressRule {
    /// Peer boundary name, or `"internet"` for 0.0.0.0/0.
    pub peer: String,
    #[serde(default)]
    pub protocol: Protocol,
    pub port: u16,
}

pub const INTERNET_PEER: &str = "internet";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedDatabase {
    pub name: String,
    pub engine: String,
    pub engine_version: String,
    pub instance_class: String,
    pub storage_gb: u32,
    pub max_storage_gb: u32,
    #[serde(default = "default_true")]
    pub encrypted: bool,
    pub backup_retention_days: u32,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
    pub port: u16,
    pub username: String,
    /// Secret holding the master password.
    pub password_secret: String,
    /// Security boundary protecting the database.
    pub boundary: String,
    /// Tier the database subnets live in.
    pub tier: String,
    pub database_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeCluster {
    pub name: String,
    #[serde(default)]
    pub container_insights: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    #[serde(default)]
    pub policies: Vec<String>,
}

/// One deployable unit: containers sharing a lifecycle and placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceUnit {
    pub name: String,
    pub replicas: u32,
    pub tier: String,
    pub boundary: String,
    pub task_role: Option<String>,
    pub execution_role: Option<String>,
    pub cpu: u32,
    pub memory_mb: u32,
    pub discovery: Option<ServiceDiscoveryEntry>,
    pub containers: Vec<ContainerSpec>,
}

/// Maps a logical service name to a private, resolvable address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDiscoveryEntry {
    pub name: String,
    pub namespace: String,
    pub port: u16,
}

impl ServiceDiscoveryEntry {
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.name, self.namespace)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    /// Image source URI, see [`ImageSource`].
    pub image: String,
    #[serde(default = "default_true")]
    pub essential: bool,
    pub cpu: Option<u32>,
    pub memory_mb: Option<u32>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Literal environment values.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Environment values resolved from another entity's attribute.
    #[serde(default)]
    pub env_from: BTreeMap<String, String>,
    /// Environment variable → secret name, injected by reference.
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    pub log_group: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<ContainerDependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDependency {
    pub container: String,
    pub condition: DependencyCondition,
}

/// Public listener → target group → health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancingRule {
    pub name: String,
    pub tier: String,
    pub boundary: String,
    pub listener_port: u16,
    pub target_service: String,
    pub target_container: String,
    pub target_port: u16,
    #[serde(default)]
    pub health: HealthCheckSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    #[serde(default = "default_health_path")]
    pub path: String,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    #[serde(default = "default_health_interval")]
    pub interval: String,
    #[serde(default = "default_health_timeout")]
    pub timeout: String,
    #[serde(default = "default_unhealthy_threshold")]
    pub unhealthy_threshold: u32,
    #[serde(default = "default_healthy_threshold")]
    pub healthy_threshold: u32,
}

impl Default for HealthCheckSpec {
    fn default() -> Self {
        Self {
            path: default_health_path(),
            expected_status: default_expected_status(),
            interval: default_health_interval(),
            timeout: default_health_timeout(),
            unhealthy_threshold: default_unhealthy_threshold(),
            healthy_threshold: default_healthy_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_required_tools() -> Vec<String> {
    vec!["docker".to_string()]
}
fn default_health_path() -> String {
    "/health".to_string()
}
fn default_expected_status() -> u16 {
    200
}
fn default_health_interval() -> String {
    "30s".to_string()
}
fn default_health_timeout() -> String {
    "5s".to_string()
}
fn default_unhealthy_threshold() -> u32 {
    3
}
fn default_healthy_threshold() -> u32 {
    2
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]{0,62}$").expect("valid name regex"))
}

/// Validate a resource name.
pub fn validate_name(kind: &'static str, name: &str) -> ConfigResult<()> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// Parse an IPv4 CIDR block ("10.0.0.0/16") into base address and prefix.
pub fn parse_cidr(cidr: &str) -> ConfigResult<(Ipv4Addr, u8)> {
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| ConfigError::invalid("network.cidr", format!("{cidr:?} is not a CIDR block")))?;
    let addr: Ipv4Addr = addr
        .parse()
        .map_err(|_| ConfigError::invalid("network.cidr", format!("bad address in {cidr:?}")))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| ConfigError::invalid("network.cidr", format!("bad prefix in {cidr:?}")))?;
    if !(8..=28).contains(&prefix) {
        return Err(ConfigError::invalid(
            "network.cidr",
            format!("prefix /{prefix} outside /8../28"),
        ));
    }
    let mask = u32::MAX << (32 - prefix);
    if u32::from(addr) & !mask != 0 {
        return Err(ConfigError::invalid(
            "network.cidr",
            format!("{cidr:?} has host bits set"),
        ));
    }
    Ok((addr, prefix))
}

fn check_unique<'a>(
    kind: &'static str,
    names: impl IntoIterator<Item = &'a str>,
) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        validate_name(kind, name)?;
        if !seen.insert(name) {
            return Err(ConfigError::Duplicate {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

impl StackConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: StackConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceUnit> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn secret(&self, name: &str) -> Option<&SecretSpec> {
        self.secrets.iter().find(|s| s.name == name)
    }

    pub fn boundary(&self, name: &str) -> Option<&SecurityBoundary> {
        self.boundaries.iter().find(|b| b.name == name)
    }

    pub fn tier(&self, name: &str) -> Option<&TierSpec> {
        self.network.tiers.iter().find(|t| t.name == name)
    }

    /// Check names, formats, ranges and duplicates.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_name("stack", &self.stack.name)?;
        semver::Version::parse(&self.stack.version).map_err(|e| {
            ConfigError::invalid("stack.version", format!("{:?}: {e}", self.stack.version))
        })?;
        if self.stack.region.trim().is_empty() {
            return Err(ConfigError::invalid("stack.region", "must not be empty"));
        }

        self.validate_network()?;

        check_unique("secret", self.secrets.iter().map(|s| s.name.as_str()))?;
        check_unique("boundary", self.boundaries.iter().map(|b| b.name.as_str()))?;
        check_unique("role", self.roles.iter().map(|r| r.name.as_str()))?;
        check_unique("service", self.services.iter().map(|s| s.name.as_str()))?;
        check_unique(
            "load balancer",
            self.load_balancers.iter().map(|l| l.name.as_str()),
        )?;

        for boundary in &self.boundaries {
            for rule in &boundary.ingress {
                if rule.port == 0 {
                    return Err(ConfigError::invalid(
                        format!("boundaries.{}.ingress", boundary.name),
                        "port must be non-zero",
                    ));
                }
            }
        }

        if let Some(db) = &self.database {
            validate_database(db)?;
        }
        if let Some(cluster) = &self.cluster {
            validate_name("cluster", &cluster.name)?;
        }
        for service in &self.services {
            validate_service(service)?;
        }
        for lb in &self.load_balancers {
            validate_load_balancer(lb)?;
        }
        for (name, reference) in &self.outputs {
            if name.is_empty() {
                return Err(ConfigError::invalid("outputs", "output name must not be empty"));
            }
            Reference::parse(reference)?;
        }
        Ok(())
    }

    fn validate_network(&self) -> ConfigResult<()> {
        let (_, prefix) = parse_cidr(&self.network.cidr)?;
        if !(1..=6).contains(&self.network.zones) {
            return Err(ConfigError::invalid(
                "network.zones",
                format!("{} outside 1..=6", self.network.zones),
            ));
        }
        if self.network.tiers.is_empty() {
            return Err(ConfigError::invalid("network.tiers", "at least one tier is required"));
        }
        check_unique("tier", self.network.tiers.iter().map(|t| t.name.as_str()))?;
        for tier in &self.network.tiers {
            if tier.mask <= prefix || tier.mask > 28 {
                return Err(ConfigError::invalid(
                    format!("network.tiers.{}.mask", tier.name),
                    format!("/{} must be longer than /{prefix} and at most /28", tier.mask),
                ));
            }
        }
        Ok(())
    }

    /// A complete chat stack: public load balancer, the chat UI and an
    /// inference gateway in the private tier, Postgres in the isolated tier.
    pub fn scaffold(name: &str, region: &str) -> Self {
        let env = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };

        StackConfig {
            stack: StackMeta {
                name: name.to_string(),
                version: "0.1.0".to_string(),
                region: region.to_string(),
                required_tools: default_required_tools(),
            },
            network: NetworkTopology {
                cidr: "10.0.0.0/16".to_string(),
                zones: 2,
                tiers: vec![
                    TierSpec {
                        name: "public".to_string(),
                        kind: TierKind::Public,
                        mask: 24,
                    },
                    TierSpec {
                        name: "private".to_string(),
                        kind: TierKind::Private,
                        mask: 24,
                    },
                    TierSpec {
                        name: "isolated".to_string(),
                        kind: TierKind::Isolated,
                        mask: 24,
                    },
                ],
            },
            secrets: vec![
                SecretSpec {
                    name: "admin-password".to_string(),
                    length: 32,
                    exclude: "\"@/\\'".to_string(),
                    description: Some("chat UI administrator password".to_string()),
                },
                SecretSpec {
                    name: "db-password".to_string(),
                    length: 32,
                    exclude: "\"@/\\' ".to_string(),
                    description: Some("database master password".to_string()),
                },
                SecretSpec {
                    name: "signing-key".to_string(),
                    length: 64,
                    exclude: "\"@/\\'".to_string(),
                    description: Some("session signing key".to_string()),
                },
            ],
            boundaries: vec![
                SecurityBoundary {
                    name: "lb".to_string(),
                    tier: "public".to_string(),
                    ingress: vec![IngressRule {
                        peer: INTERNET_PEER.to_string(),
                        protocol: Protocol::Tcp,
                        port: 80,
                    }],
                },
                SecurityBoundary {
                    name: "services".to_string(),
                    tier: "private".to_string(),
                    ingress: vec![
                        IngressRule {
                            peer: "lb".to_string(),
                            protocol: Protocol::Tcp,
                            port: 8080,
                        },
                        IngressRule {
                            peer: "services".to_string(),
                            protocol: Protocol::Tcp,
                            port: 8000,
                        },
                    ],
                },
                SecurityBoundary {
                    name: "database".to_string(),
                    tier: "isolated".to_string(),
                    ingress: vec![IngressRule {
                        peer: "services".to_string(),
                        protocol: Protocol::Tcp,
                        port: 5432,
                    }],
                },
            ],
            database: Some(ManagedDatabase {
                name: "chat-db".to_string(),
                engine: "postgres".to_string(),
                engine_version: "15.4".to_string(),
                instance_class: "db.t3.micro".to_string(),
                storage_gb: 20,
                max_storage_gb: 100,
                encrypted: true,
                backup_retention_days: 7,
                deletion_policy: DeletionPolicy::Snapshot,
                port: 5432,
                username: "postgres".to_string(),
                password_secret: "db-password".to_string(),
                boundary: "database".to_string(),
                tier: "isolated".to_string(),
                database_name: "openwebui".to_string(),
            }),
            cluster: Some(ComputeCluster {
                name: "chat".to_string(),
                container_insights: true,
            }),
            roles: vec![
                RoleSpec {
                    name: "task-execution".to_string(),
                    policies: vec![
                        "ecr:pull".to_string(),
                        "logs:write".to_string(),
                        "secrets:read".to_string(),
                    ],
                },
                RoleSpec {
                    name: "gateway-task".to_string(),
                    policies: vec!["bedrock:invoke-model".to_string()],
                },
            ],
            services: vec![
                ServiceUnit {
                    name: "gateway".to_string(),
                    replicas: 1,
                    tier: "private".to_string(),
                    boundary: "services".to_string(),
                    task_role: Some("gateway-task".to_string()),
                    execution_role: Some("task-execution".to_string()),
                    cpu: 256,
                    memory_mb: 512,
                    discovery: Some(ServiceDiscoveryEntry {
                        name: "gateway".to_string(),
                        namespace: "chat.local".to_string(),
                        port: 8000,
                    }),
                    containers: vec![ContainerSpec {
                        name: "gateway".to_string(),
                        image: "asset://./docker/bedrock-gateway".to_string(),
                        essential: true,
                        cpu: None,
                        memory_mb: None,
                        command: Vec::new(),
                        ports: vec![8000],
                        env: env(&[("AWS_REGION", region)]),
                        env_from: BTreeMap::new(),
                        secrets: BTreeMap::new(),
                        log_group: Some("gateway".to_string()),
                        depends_on: Vec::new(),
                    }],
                },
                ServiceUnit {
                    name: "webui".to_string(),
                    replicas: 2,
                    tier: "private".to_string(),
                    boundary: "services".to_string(),
                    task_role: None,
                    execution_role: Some("task-execution".to_string()),
                    cpu: 1024,
                    memory_mb: 2048,
                    discovery: None,
                    containers: vec![
                        ContainerSpec {
                            name: "init".to_string(),
                            image: "asset://./docker/open-webui".to_string(),
                            essential: false,
                            cpu: None,
                            memory_mb: None,
                            command: vec!["python".to_string(), "init.py".to_string()],
                            ports: Vec::new(),
                            env: env(&[("ADMIN_EMAIL", "admin@example.com")]),
                            env_from: env(&[
                                ("DATABASE_HOST", "database:chat-db.host"),
                                ("DATABASE_PORT", "database:chat-db.port"),
                                ("DATABASE_NAME", "database:chat-db.name"),
                                ("DATABASE_USER", "database:chat-db.username"),
                                ("BEDROCK_GATEWAY_URL", "discovery:gateway.url"),
                            ]),
                            secrets: env(&[
                                ("DATABASE_PASSWORD", "db-password"),
                                ("ADMIN_PASSWORD", "admin-password"),
                            ]),
                            log_group: Some("webui-init".to_string()),
                            depends_on: Vec::new(),
                        },
                        ContainerSpec {
                            name: "webui".to_string(),
                            image: "ghcr.io/open-webui/open-webui:main".to_string(),
                            essential: true,
                            cpu: None,
                            memory_mb: None,
                            command: Vec::new(),
                            ports: vec![8080],
                            env: env(&[("ENABLE_SIGNUP", "false")]),
                            env_from: env(&[
                                ("DATABASE_URL", "database:chat-db.url"),
                                ("OPENAI_API_BASE_URL", "discovery:gateway.url"),
                            ]),
                            secrets: env(&[
                                ("WEBUI_SECRET_KEY", "signing-key"),
                                ("DATABASE_PASSWORD", "db-password"),
                            ]),
                            log_group: Some("webui".to_string()),
                            depends_on: vec![ContainerDependency {
                                container: "init".to_string(),
                                condition: DependencyCondition::Success,
                            }],
                        },
                    ],
                },
            ],
            load_balancers: vec![LoadBalancingRule {
                name: "web".to_string(),
                tier: "public".to_string(),
                boundary: "lb".to_string(),
                listener_port: 80,
                target_service: "webui".to_string(),
                target_container: "webui".to_string(),
                target_port: 8080,
                health: HealthCheckSpec::default(),
            }],
            outputs: [
                ("endpoint", "load-balancer:web.url"),
                ("admin-secret", "secret:admin-password.locator"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        }
    }
}

fn validate_database(db: &ManagedDatabase) -> ConfigResult<()> {
    validate_name("database", &db.name)?;
    if db.engine.trim().is_empty() || db.engine_version.trim().is_empty() {
        return Err(ConfigError::invalid(
            format!("database.{}", db.name),
            "engine and engine_version are required",
        ));
    }
    if db.storage_gb == 0 || db.storage_gb > db.max_storage_gb {
        return Err(ConfigError::invalid(
            format!("database.{}.storage_gb", db.name),
            format!(
                "initial storage {} GB must be non-zero and at most max_storage_gb {} GB",
                db.storage_gb, db.max_storage_gb
            ),
        ));
    }
    if db.backup_retention_days > 35 {
        return Err(ConfigError::invalid(
            format!("database.{}.backup_retention_days", db.name),
            "at most 35 days",
        ));
    }
    if db.port == 0 {
        return Err(ConfigError::invalid(
            format!("database.{}.port", db.name),
            "must be non-zero",
        ));
    }
    if db.username.trim().is_empty() || db.database_name.trim().is_empty() {
        return Err(ConfigError::invalid(
            format!("database.{}", db.name),
            "username and database_name are required",
        ));
    }
    Ok(())
}

fn validate_service(service: &ServiceUnit) -> ConfigResult<()> {
    let field = |suffix: &str| format!("services.{}.{suffix}", service.name);

    if service.replicas == 0 {
        return Err(ConfigError::invalid(field("replicas"), "must be at least 1"));
    }
    if service.containers.is_empty() {
        return Err(ConfigError::invalid(
            field("containers"),
            "at least one container is required",
        ));
    }
    if !service.containers.iter().any(|c| c.essential) {
        return Err(ConfigError::invalid(
            field("containers"),
            "at least one container must be essential",
        ));
    }
    check_unique("container", service.containers.iter().map(|c| c.name.as_str()))?;

    let names: HashSet<&str> = service.containers.iter().map(|c| c.name.as_str()).collect();
    for container in &service.containers {
        ImageSource::parse(&container.image)?;
        for dep in &container.depends_on {
            if dep.container == container.name {
                return Err(ConfigError::invalid(
                    field(&format!("containers.{}.depends_on", container.name)),
                    "a container cannot depend on itself",
                ));
            }
            if !names.contains(dep.container.as_str()) {
                return Err(ConfigError::invalid(
                    field(&format!("containers.{}.depends_on", container.name)),
                    format!("unknown container {:?}", dep.container),
                ));
            }
        }
        for (key, reference) in &container.env_from {
            Reference::parse(reference).map_err(|_| {
                ConfigError::invalid(
                    field(&format!("containers.{}.env_from.{key}", container.name)),
                    format!("{reference:?} is not a kind:name.attribute reference"),
                )
            })?;
        }
        for key in container.secrets.keys() {
            if container.env.contains_key(key) || container.env_from.contains_key(key) {
                return Err(ConfigError::invalid(
                    field(&format!("containers.{}.secrets.{key}", container.name)),
                    "variable is also set as a plain value",
                ));
            }
        }
    }

    if let Some(discovery) = &service.discovery {
        validate_name("discovery", &discovery.name)?;
        if discovery.namespace.trim().is_empty() {
            return Err(ConfigError::invalid(field("discovery.namespace"), "must not be empty"));
        }
    }
    Ok(())
}

fn validate_load_balancer(lb: &LoadBalancingRule) -> ConfigResult<()> {
    let field = |suffix: &str| format!("load_balancers.{}.{suffix}", lb.name);
    let health = &lb.health;

    if !health.path.starts_with('/') {
        return Err(ConfigError::invalid(field("health.path"), "must start with '/'"));
    }
    if !(100..=599).contains(&health.expected_status) {
        return Err(ConfigError::invalid(
            field("health.expected_status"),
            format!("{} is not an HTTP status", health.expected_status),
        ));
    }
    for (name, value) in [("interval", &health.interval), ("timeout", &health.timeout)] {
        if parse_duration(value).is_none() {
            return Err(ConfigError::invalid(
                field(&format!("health.{name}")),
                format!("{value:?} is not a duration"),
            ));
        }
    }
    if health.unhealthy_threshold == 0 || health.healthy_threshold == 0 {
        return Err(ConfigError::invalid(field("health"), "thresholds must be at least 1"));
    }
    if lb.listener_port == 0 || lb.target_port == 0 {
        return Err(ConfigError::invalid(field("ports"), "ports must be non-zero"));
    }
    Ok(())
}
