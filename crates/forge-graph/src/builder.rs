//! Expansion of a stack declaration into the resource graph.
//!
//! Building is all-or-nothing: every unresolved reference and every
//! topology violation is collected and reported together, and no graph
//! is returned unless it is complete, consistent and acyclic.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;
use tracing::debug;

use forge_core::{
    INTERNET_PEER, LoadBalancingRule, ManagedDatabase, Reference, ServiceUnit, StackConfig,
    TierKind,
};

use crate::error::{DanglingRef, GraphError, GraphResult};
use crate::graph::ResourceGraph;
use crate::layout::{RouteTarget, SubnetLayout, zone_letter};
use crate::order::DependencyGraph;
use crate::resource::{Binding, ResourceId, ResourceKind, ResourceNode};

/// An edge whose target may not exist yet; resolved once every node is in.
struct PendingEdge {
    from: ResourceId,
    to: ResourceId,
    /// Who holds the reference, for diagnostics.
    referrer: String,
    /// The reference as written.
    written: String,
}

pub struct GraphBuilder<'a> {
    config: &'a StackConfig,
    graph: ResourceGraph,
    pending: Vec<PendingEdge>,
    dangling: Vec<DanglingRef>,
    violations: Vec<String>,
}

fn rid(kind: ResourceKind, name: &str) -> ResourceId {
    ResourceId::new(kind, name)
}

impl<'a> GraphBuilder<'a> {
    /// Validate `config` and expand it into a complete resource graph.
    pub fn from_stack(config: &'a StackConfig) -> GraphResult<ResourceGraph> {
        config.validate()?;
        let layout = SubnetLayout::plan(&config.network, &config.stack.region)?;

        let mut builder = GraphBuilder {
            config,
            graph: ResourceGraph::new(&config.stack.name, layout),
            pending: Vec::new(),
            dangling: Vec::new(),
            violations: Vec::new(),
        };

        builder.network()?;
        builder.boundaries()?;
        builder.secrets_and_roles()?;
        if let Some(db) = &config.database {
            builder.database(db)?;
        }
        if let Some(cluster) = &config.cluster {
            builder.graph.add_node(ResourceNode::new(
                rid(ResourceKind::Cluster, &cluster.name),
                json!({ "container_insights": cluster.container_insights }),
            ))?;
            let vpc = builder.vpc();
            builder.depend(&rid(ResourceKind::Cluster, &cluster.name), vpc);
        }
        builder.services()?;
        for lb in &config.load_balancers {
            builder.load_balancer(lb)?;
        }
        builder.finish()
    }

    fn vpc(&self) -> ResourceId {
        rid(ResourceKind::Network, &self.config.stack.name)
    }

    fn add(&mut self, id: &ResourceId, properties: serde_json::Value) -> GraphResult<()> {
        self.graph.add_node(ResourceNode::new(id.clone(), properties))
    }

    /// Internal edge between nodes the builder itself creates.
    fn depend(&mut self, from: &ResourceId, to: ResourceId) {
        let written = to.to_string();
        self.pending.push(PendingEdge {
            from: from.clone(),
            referrer: from.to_string(),
            to,
            written,
        });
    }

    /// Edge from an authored reference to a named entity.
    fn refer(&mut self, from: &ResourceId, referrer: String, to: ResourceId, written: String) {
        self.pending.push(PendingEdge {
            from: from.clone(),
            to,
            referrer,
            written,
        });
    }

    fn dangle(&mut self, from: impl Into<String>, target: impl Into<String>, reason: impl Into<String>) {
        self.dangling.push(DanglingRef {
            from: from.into(),
            target: target.into(),
            reason: reason.into(),
        });
    }

    /// Resolve a `kind:name[.attribute]` reference into a binding plus an
    /// edge. Unknown attributes are reported immediately, unknown targets
    /// when pending edges are resolved.
    fn bind(&mut self, from: &ResourceId, referrer: String, reference: &Reference) -> Option<Binding> {
        let kind = ResourceKind::from(reference.kind);
        let attribute = reference
            .attribute
            .clone()
            .unwrap_or_else(|| kind.default_attribute().to_string());
        if !kind.exports_attribute(&attribute) {
            self.dangle(
                referrer,
                reference.to_string(),
                format!(
                    "{kind} exports no attribute {attribute:?} (has: {})",
                    kind.exports().join(", ")
                ),
            );
            return None;
        }
        let target = rid(kind, &reference.name);
        self.refer(from, referrer, target.clone(), reference.to_string());
        Some(Binding { target, attribute })
    }

    /// Look up a tier; a missing tier is a dangling reference.
    fn tier(&mut self, from: &ResourceId, tier: &str) -> Option<TierKind> {
        let kind = self.graph.layout().tier_kind(tier);
        if kind.is_none() {
            self.dangle(from.to_string(), format!("tier:{tier}"), "no such tier");
        }
        kind
    }

    /// Depend on every subnet of `tier`, returning their names.
    fn depend_on_tier(&mut self, from: &ResourceId, tier: &str) -> Vec<String> {
        let names: Vec<String> = self
            .graph
            .layout()
            .in_tier(tier)
            .map(|s| s.name.clone())
            .collect();
        for name in &names {
            self.depend(from, rid(ResourceKind::Subnet, name));
        }
        names
    }

    fn network(&mut self) -> GraphResult<()> {
        let config = self.config;
        let vpc = self.vpc();
        self.add(
            &vpc,
            json!({
                "cidr": config.network.cidr,
                "zones": config.network.zones,
                "region": config.stack.region,
            }),
        )?;

        let layout = self.graph.layout().clone();
        let igw = rid(ResourceKind::Gateway, "internet");
        if layout.needs_internet_gateway() {
            self.add(&igw, json!({ "type": "internet" }))?;
            self.depend(&igw, vpc.clone());
        }

        for zone in layout.nat_zones() {
            let nat = rid(ResourceKind::Gateway, &format!("nat-{}", zone_letter(zone)));
            let Some(host) = layout.nat_host(zone) else {
                return Err(GraphError::Layout(format!("no public subnet hosts {nat}")));
            };
            self.add(&nat, json!({ "type": "nat", "subnet": host.name }))?;
            self.depend(&nat, rid(ResourceKind::Subnet, &host.name));
            self.depend(&nat, igw.clone());
        }

        for subnet in layout.subnets() {
            let id = rid(ResourceKind::Subnet, &subnet.name);
            self.add(
                &id,
                json!({
                    "tier": subnet.tier,
                    "kind": subnet.kind,
                    "availability_zone": subnet.availability_zone,
                    "cidr": subnet.cidr,
                    "route": subnet.route,
                }),
            )?;
            self.depend(&id, vpc.clone());
            match subnet.route {
                RouteTarget::InternetGateway => self.depend(&id, igw.clone()),
                RouteTarget::NatGateway { zone } => self.depend(
                    &id,
                    rid(ResourceKind::Gateway, &format!("nat-{}", zone_letter(zone))),
                ),
                RouteTarget::Local => {}
            }
        }
        Ok(())
    }

    fn boundaries(&mut self) -> GraphResult<()> {
        let config = self.config;
        let vpc = self.vpc();
        for boundary in &config.boundaries {
            let id = rid(ResourceKind::Boundary, &boundary.name);
            self.add(&id, json!({ "tier": boundary.tier }))?;
            self.depend(&id, vpc.clone());
            let tier_kind = self.tier(&id, &boundary.tier);

            for rule in &boundary.ingress {
                let protocol = match rule.protocol {
                    forge_core::Protocol::Tcp => "tcp",
                    forge_core::Protocol::Udp => "udp",
                };
                let rule_id = rid(
                    ResourceKind::IngressRule,
                    &format!("{}-from-{}-{protocol}-{}", boundary.name, rule.peer, rule.port),
                );
                if rule.peer == INTERNET_PEER {
                    if tier_kind.is_some_and(|k| k != TierKind::Public) {
                        self.violations.push(format!(
                            "boundary {} admits the internet but sits in non-public tier {}",
                            boundary.name, boundary.tier
                        ));
                    }
                    self.add(
                        &rule_id,
                        json!({
                            "boundary": boundary.name,
                            "source_cidr": "0.0.0.0/0",
                            "protocol": protocol,
                            "port": rule.port,
                        }),
                    )?;
                } else {
                    self.add(
                        &rule_id,
                        json!({
                            "boundary": boundary.name,
                            "peer": rule.peer,
                            "protocol": protocol,
                            "port": rule.port,
                        }),
                    )?;
                    self.refer(
                        &rule_id,
                        format!("boundary/{} ingress", boundary.name),
                        rid(ResourceKind::Boundary, &rule.peer),
                        format!("boundary:{}", rule.peer),
                    );
                }
                self.depend(&rule_id, id.clone());
            }
        }
        Ok(())
    }

    fn secrets_and_roles(&mut self) -> GraphResult<()> {
        let config = self.config;
        for secret in &config.secrets {
            self.add(
                &rid(ResourceKind::Secret, &secret.name),
                json!({
                    "length": secret.length,
                    "exclude": secret.exclude,
                    "description": secret.description,
                }),
            )?;
        }
        for role in &config.roles {
            self.add(
                &rid(ResourceKind::Role, &role.name),
                json!({ "policies": role.policies }),
            )?;
        }
        Ok(())
    }

    fn database(&mut self, db: &ManagedDatabase) -> GraphResult<()> {
        let id = rid(ResourceKind::Database, &db.name);
        let group = rid(ResourceKind::SubnetGroup, &db.name);

        if let Some(kind) = self.tier(&id, &db.tier) {
            if kind != TierKind::Isolated {
                self.violations.push(format!(
                    "database {} is in {} tier {}; databases belong in an isolated tier",
                    db.name,
                    kind.as_str(),
                    db.tier
                ));
            }
        }
        let subnets = self.depend_on_tier(&group, &db.tier);
        self.add(&group, json!({ "subnets": subnets }))?;

        let mut node = ResourceNode::new(
            id.clone(),
            json!({
                "engine": db.engine,
                "engine_version": db.engine_version,
                "instance_class": db.instance_class,
                "storage_gb": db.storage_gb,
                "max_storage_gb": db.max_storage_gb,
                "encrypted": db.encrypted,
                "backup_retention_days": db.backup_retention_days,
                "deletion_policy": db.deletion_policy,
                "port": db.port,
                "username": db.username,
                "database_name": db.database_name,
                "boundary": db.boundary,
            }),
        );
        let password = Reference::new(forge_core::RefKind::Secret, &db.password_secret);
        if let Some(binding) = self.bind(&id, id.to_string(), &password) {
            node.bindings.insert("master_password".to_string(), binding);
        }
        self.graph.add_node(node)?;
        self.depend(&id, group);
        self.refer(
            &id,
            id.to_string(),
            rid(ResourceKind::Boundary, &db.boundary),
            format!("boundary:{}", db.boundary),
        );

        self.check_database_boundary(db);
        Ok(())
    }

    /// The database boundary sits in an isolated tier and admits exactly
    /// one peer: a service boundary, over tcp on the database port.
    fn check_database_boundary(&mut self, db: &ManagedDatabase) {
        let config = self.config;
        let Some(boundary) = config.boundary(&db.boundary) else {
            return;
        };
        if let Some(kind) = self.graph.layout().tier_kind(&boundary.tier) {
            if kind != TierKind::Isolated {
                self.violations.push(format!(
                    "database boundary {} is in {} tier {}; it must be isolated",
                    boundary.name,
                    kind.as_str(),
                    boundary.tier
                ));
            }
        }
        match boundary.ingress.as_slice() {
            [rule] => {
                if rule.protocol != forge_core::Protocol::Tcp {
                    self.violations.push(format!(
                        "database boundary {} admits {} only over tcp",
                        boundary.name, rule.peer
                    ));
                }
                let is_service_boundary =
                    config.services.iter().any(|s| s.boundary == rule.peer);
                if !is_service_boundary {
                    self.violations.push(format!(
                        "database boundary {} admits {}, which is not a service boundary",
                        boundary.name, rule.peer
                    ));
                }
                if rule.port != db.port {
                    self.violations.push(format!(
                        "database boundary {} opens port {}, database listens on {}",
                        boundary.name, rule.port, db.port
                    ));
                }
            }
            rules => self.violations.push(format!(
                "database boundary {} must have exactly one ingress rule, found {}",
                boundary.name,
                rules.len()
            )),
        }
    }

    fn services(&mut self) -> GraphResult<()> {
        let mut log_groups = BTreeSet::new();
        let mut namespaces = BTreeSet::new();
        let mut grants = BTreeSet::new();

        let config = self.config;
        for service in &config.services {
            check_container_order(service)?;
            let service_id = rid(ResourceKind::Service, &service.name);
            let task_id = rid(ResourceKind::TaskDefinition, &service.name);

            if let Some(kind) = self.tier(&service_id, &service.tier) {
                if kind != TierKind::Private {
                    self.violations.push(format!(
                        "service {} is in {} tier {}; services belong in a private tier",
                        service.name,
                        kind.as_str(),
                        service.tier
                    ));
                }
            }

            for container in &service.containers {
                if let Some(group) = &container.log_group {
                    let group_id = rid(ResourceKind::LogGroup, group);
                    if log_groups.insert(group.clone()) {
                        self.add(
                            &group_id,
                            json!({ "name": format!("/{}/{group}", config.stack.name) }),
                        )?;
                    }
                    self.depend(&task_id, group_id);
                }
            }

            let secret_names: BTreeSet<&String> = service
                .containers
                .iter()
                .flat_map(|c| c.secrets.values())
                .collect();
            match &service.execution_role {
                Some(role) => {
                    for secret in &secret_names {
                        let grant_id =
                            rid(ResourceKind::Grant, &format!("{role}-reads-{secret}"));
                        if grants.insert(grant_id.clone()) {
                            self.add(
                                &grant_id,
                                json!({ "role": role, "secret": secret, "action": "secrets:read" }),
                            )?;
                            self.refer(
                                &grant_id,
                                format!("service/{}", service.name),
                                rid(ResourceKind::Role, role),
                                format!("role:{role}"),
                            );
                            self.refer(
                                &grant_id,
                                format!("service/{}", service.name),
                                rid(ResourceKind::Secret, secret),
                                format!("secret:{secret}"),
                            );
                        }
                        self.depend(&task_id, grant_id);
                    }
                }
                None if !secret_names.is_empty() => self.violations.push(format!(
                    "service {} injects secrets but declares no execution_role",
                    service.name
                )),
                None => {}
            }

            self.task_definition(service, &task_id)?;

            if let Some(discovery) = &service.discovery {
                let ns_id = rid(ResourceKind::Namespace, &discovery.namespace);
                if namespaces.insert(discovery.namespace.clone()) {
                    self.add(&ns_id, json!({ "private": true }))?;
                    self.depend(&ns_id, self.vpc());
                }
                let discovery_id = rid(ResourceKind::Discovery, &discovery.name);
                self.add(
                    &discovery_id,
                    json!({
                        "namespace": discovery.namespace,
                        "fqdn": discovery.fqdn(),
                        "port": discovery.port,
                    }),
                )?;
                self.depend(&discovery_id, ns_id);
                self.depend(&service_id, discovery_id);
            }

            let subnets = self.depend_on_tier(&service_id, &service.tier);
            self.add(
                &service_id,
                json!({
                    "replicas": service.replicas,
                    "tier": service.tier,
                    "subnets": subnets,
                    "boundary": service.boundary,
                    "discovery": service.discovery.as_ref().map(|d| d.fqdn()),
                }),
            )?;
            self.depend(&service_id, task_id);
            self.refer(
                &service_id,
                service_id.to_string(),
                rid(ResourceKind::Boundary, &service.boundary),
                format!("boundary:{}", service.boundary),
            );
            match &config.cluster {
                Some(cluster) => self.depend(&service_id, rid(ResourceKind::Cluster, &cluster.name)),
                None => self.dangle(service_id.to_string(), "cluster", "no cluster is declared"),
            }
        }
        Ok(())
    }

    fn task_definition(&mut self, service: &ServiceUnit, task_id: &ResourceId) -> GraphResult<()> {
        let mut bindings = BTreeMap::new();
        for role in [&service.task_role, &service.execution_role].into_iter().flatten() {
            self.refer(
                task_id,
                format!("service/{}", service.name),
                rid(ResourceKind::Role, role),
                format!("role:{role}"),
            );
        }

        let mut containers = Vec::with_capacity(service.containers.len());
        for container in &service.containers {
            let referrer = |key: &str| {
                format!("service/{} container {} env {key}", service.name, container.name)
            };
            for (key, written) in &container.env_from {
                let reference = Reference::parse(written)?;
                if let Some(binding) = self.bind(task_id, referrer(key), &reference) {
                    bindings.insert(format!("{}.env.{key}", container.name), binding);
                }
            }
            for (key, secret) in &container.secrets {
                let reference = Reference::new(forge_core::RefKind::Secret, secret)
                    .with_attribute("arn");
                if let Some(binding) = self.bind(task_id, referrer(key), &reference) {
                    bindings.insert(format!("{}.secret.{key}", container.name), binding);
                }
            }
            containers.push(json!({
                "name": container.name,
                "image": container.image,
                "essential": container.essential,
                "cpu": container.cpu,
                "memory_mb": container.memory_mb,
                "command": container.command,
                "ports": container.ports,
                "env": container.env,
                "env_from": container.env_from,
                "secrets": container.secrets.keys().collect::<Vec<_>>(),
                "log_group": container.log_group,
                "depends_on": container
                    .depends_on
                    .iter()
                    .map(|d| json!({ "container": d.container, "condition": d.condition.to_string() }))
                    .collect::<Vec<_>>(),
            }));
        }

        let mut node = ResourceNode::new(
            task_id.clone(),
            json!({
                "family": service.name,
                "cpu": service.cpu,
                "memory_mb": service.memory_mb,
                "task_role": service.task_role,
                "execution_role": service.execution_role,
                "containers": containers,
            }),
        );
        node.bindings = bindings;
        self.graph.add_node(node)
    }

    fn load_balancer(&mut self, lb: &LoadBalancingRule) -> GraphResult<()> {
        let lb_id = rid(ResourceKind::LoadBalancer, &lb.name);
        let tg_id = rid(ResourceKind::TargetGroup, &lb.name);
        let listener_id = rid(ResourceKind::Listener, &lb.name);

        if let Some(kind) = self.tier(&lb_id, &lb.tier) {
            if kind != TierKind::Public {
                self.violations.push(format!(
                    "load balancer {} is in {} tier {}; load balancers belong in a public tier",
                    lb.name,
                    kind.as_str(),
                    lb.tier
                ));
            }
        }

        let subnets = self.depend_on_tier(&lb_id, &lb.tier);
        self.add(
            &lb_id,
            json!({
                "scheme": "internet-facing",
                "tier": lb.tier,
                "subnets": subnets,
                "boundary": lb.boundary,
            }),
        )?;
        self.refer(
            &lb_id,
            lb_id.to_string(),
            rid(ResourceKind::Boundary, &lb.boundary),
            format!("boundary:{}", lb.boundary),
        );
        let igw = rid(ResourceKind::Gateway, "internet");
        if self.graph.contains(&igw) {
            self.depend(&lb_id, igw);
        }

        self.add(
            &tg_id,
            json!({
                "protocol": "http",
                "port": lb.target_port,
                "target_service": lb.target_service,
                "target_container": lb.target_container,
                "health": lb.health,
            }),
        )?;
        self.depend(&tg_id, self.vpc());

        self.add(
            &listener_id,
            json!({ "protocol": "http", "port": lb.listener_port }),
        )?;
        self.depend(&listener_id, lb_id.clone());
        self.depend(&listener_id, tg_id);

        let config = self.config;
        match config.service(&lb.target_service) {
            None => self.dangle(
                lb_id.to_string(),
                format!("service:{}", lb.target_service),
                "no such service",
            ),
            Some(service) => {
                match service.containers.iter().find(|c| c.name == lb.target_container) {
                    None => self.dangle(
                        lb_id.to_string(),
                        format!("service:{}/{}", lb.target_service, lb.target_container),
                        "service has no such container",
                    ),
                    Some(container) if !container.ports.contains(&lb.target_port) => self.dangle(
                        lb_id.to_string(),
                        format!(
                            "service:{}/{}:{}",
                            lb.target_service, lb.target_container, lb.target_port
                        ),
                        "container does not expose this port",
                    ),
                    Some(_) => {}
                }
                self.check_lb_reaches_service(lb, service);
                // Targets register once the listener exists.
                self.depend(&rid(ResourceKind::Service, &service.name), listener_id);
            }
        }
        Ok(())
    }

    fn check_lb_reaches_service(&mut self, lb: &LoadBalancingRule, service: &ServiceUnit) {
        let config = self.config;
        let Some(boundary) = config.boundary(&service.boundary) else {
            return;
        };
        let admitted = boundary
            .ingress
            .iter()
            .any(|r| r.peer == lb.boundary && r.port == lb.target_port);
        if !admitted {
            self.violations.push(format!(
                "boundary {} does not admit load balancer boundary {} on port {}",
                boundary.name, lb.boundary, lb.target_port
            ));
        }
    }

    fn outputs(&mut self) {
        let config = self.config;
        for (name, written) in &config.outputs {
            let referrer = format!("output {name}");
            let reference = match Reference::parse(written) {
                Ok(r) => r,
                Err(e) => {
                    self.dangle(referrer, written.clone(), e.to_string());
                    continue;
                }
            };
            let kind = ResourceKind::from(reference.kind);
            let target = rid(kind, &reference.name);
            let attribute = reference
                .attribute
                .clone()
                .unwrap_or_else(|| kind.default_attribute().to_string());
            if !self.graph.contains(&target) {
                self.dangle(referrer, written.clone(), format!("no {kind} named {:?}", reference.name));
            } else if !kind.exports_attribute(&attribute) {
                self.dangle(referrer, written.clone(), format!("{kind} exports no attribute {attribute:?}"));
            } else {
                self.graph.set_output(name, Binding { target, attribute });
            }
        }
    }

    fn finish(mut self) -> GraphResult<ResourceGraph> {
        for edge in std::mem::take(&mut self.pending) {
            if self.graph.contains(&edge.to) {
                self.graph.add_edge(&edge.from, &edge.to)?;
            } else {
                self.dangle(
                    edge.referrer,
                    edge.written,
                    format!("no {} named {:?} is declared", edge.to.kind, edge.to.name),
                );
            }
        }
        self.outputs();

        if !self.dangling.is_empty() {
            let mut dangling = self.dangling;
            dangling.sort_by(|a, b| (&a.from, &a.target).cmp(&(&b.from, &b.target)));
            dangling.dedup();
            return Err(GraphError::Dangling(dangling));
        }
        if !self.violations.is_empty() {
            return Err(GraphError::Topology(self.violations));
        }

        self.graph.creation_order()?;
        debug!(
            stack = %self.graph.stack(),
            nodes = self.graph.len(),
            edges = self.graph.edge_count(),
            "resource graph built"
        );
        Ok(self.graph)
    }
}

/// Reject start-order cycles between the containers of one service.
fn check_container_order(service: &ServiceUnit) -> GraphResult<()> {
    let mut order = DependencyGraph::new();
    for container in &service.containers {
        order.add_node(container.name.clone());
        for dep in &container.depends_on {
            order.add_edge(container.name.clone(), dep.container.clone());
        }
    }
    order
        .topological_order()
        .map(|_| ())
        .map_err(|members| GraphError::ContainerCycle {
            service: service.name.clone(),
            members,
        })
}
