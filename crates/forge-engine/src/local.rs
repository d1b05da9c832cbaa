//! Offline provisioning backend.
//!
//! Realizes nothing outside the process: every attribute a real backend
//! would return (identifiers, ARNs, endpoints, DNS names) is derived from
//! the stack, the resource id and its properties, so repeated deploys of
//! the same stack see the same values.

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use forge_graph::{ResourceId, ResourceKind};
use forge_secrets::SecretRef;

use crate::error::ProvisionError;
use crate::provisioner::{Attributes, ProvisionFuture, ProvisionRequest, Provisioner};

#[derive(Debug, Clone)]
pub struct LocalProvisioner {
    region: String,
    account: String,
}

impl LocalProvisioner {
    pub fn new(region: &str, account: &str) -> Self {
        Self {
            region: region.to_string(),
            account: account.to_string(),
        }
    }

    fn short_hash(stack: &str, id: &ResourceId) -> String {
        let digest = Sha256::digest(format!("{stack}/{id}").as_bytes());
        hex::encode(&digest[..6])
    }

    fn arn(&self, stack: &str, id: &ResourceId) -> String {
        format!(
            "arn:forge:{}:{}:{}:{stack}/{}",
            id.kind, self.region, self.account, id.name
        )
    }

    fn synthesize(&self, request: &ProvisionRequest) -> Result<Attributes, ProvisionError> {
        let stack = request.stack.as_str();
        let id = &request.id;
        let hash = Self::short_hash(stack, id);
        let prop = |key: &str| -> Result<String, ProvisionError> {
            match request.properties.get(key) {
                Some(serde_json::Value::String(s)) => Ok(s.clone()),
                Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
                _ => Err(ProvisionError::Failed(format!("{id} has no property {key:?}"))),
            }
        };

        let mut attrs = Attributes::new();
        attrs.insert("arn".to_string(), self.arn(stack, id));
        attrs.insert("name".to_string(), id.name.clone());
        match id.kind {
            ResourceKind::Network => {
                attrs.insert("id".to_string(), format!("vpc-{hash}"));
                attrs.insert("cidr".to_string(), prop("cidr")?);
            }
            ResourceKind::Subnet => {
                attrs.insert("id".to_string(), format!("subnet-{hash}"));
                attrs.insert("cidr".to_string(), prop("cidr")?);
                attrs.insert("zone".to_string(), prop("availability_zone")?);
            }
            ResourceKind::Gateway => {
                attrs.insert("id".to_string(), format!("gw-{hash}"));
            }
            ResourceKind::Boundary => {
                attrs.insert("id".to_string(), format!("sg-{hash}"));
            }
            ResourceKind::Secret => {
                let secret = SecretRef::for_stack(stack, &id.name);
                attrs.insert("locator".to_string(), secret.locator().to_string());
            }
            ResourceKind::SubnetGroup => {
                attrs.insert("name".to_string(), format!("{stack}-{}", id.name));
            }
            ResourceKind::Database => {
                let port = prop("port")?;
                let host = format!("{}.{hash}.{}.db.forge.local", id.name, self.region);
                let username = prop("username")?;
                let database = prop("database_name")?;
                if !request.inputs.contains_key("master_password") {
                    return Err(ProvisionError::MissingInput("master_password".to_string()));
                }
                attrs.insert("endpoint".to_string(), format!("{host}:{port}"));
                attrs.insert(
                    "url".to_string(),
                    format!("postgresql://{username}@{host}:{port}/{database}"),
                );
                attrs.insert("host".to_string(), host);
                attrs.insert("port".to_string(), port);
                attrs.insert("name".to_string(), database);
                attrs.insert("username".to_string(), username);
            }
            ResourceKind::Namespace => {
                attrs.insert("id".to_string(), format!("ns-{hash}"));
            }
            ResourceKind::Discovery => {
                let fqdn = prop("fqdn")?;
                let port = prop("port")?;
                attrs.insert("url".to_string(), format!("http://{fqdn}:{port}/v1"));
                attrs.insert("host".to_string(), fqdn.clone());
                attrs.insert("fqdn".to_string(), fqdn);
                attrs.insert("port".to_string(), port);
            }
            ResourceKind::TaskDefinition => {
                attrs.insert("revision".to_string(), "1".to_string());
            }
            ResourceKind::LoadBalancer => {
                let dns = format!("{}-{hash}.{}.lb.forge.local", id.name, self.region);
                attrs.insert("url".to_string(), format!("http://{dns}"));
                attrs.insert("dns_name".to_string(), dns);
            }
            ResourceKind::Listener => {
                attrs.insert("port".to_string(), prop("port")?);
            }
            ResourceKind::IngressRule | ResourceKind::Grant => {
                attrs.insert("id".to_string(), format!("{}-{hash}", id.kind));
            }
            ResourceKind::Role
            | ResourceKind::Cluster
            | ResourceKind::LogGroup
            | ResourceKind::Service
            | ResourceKind::TargetGroup => {}
        }
        Ok(attrs)
    }
}

impl Provisioner for LocalProvisioner {
    fn create<'a>(&'a self, request: &'a ProvisionRequest) -> ProvisionFuture<'a, Attributes> {
        Box::pin(async move {
            let attrs = self.synthesize(request)?;
            info!(resource = %request.id, "provisioned locally");
            Ok(attrs)
        })
    }

    fn update<'a>(
        &'a self,
        request: &'a ProvisionRequest,
        current: &'a Attributes,
    ) -> ProvisionFuture<'a, Attributes> {
        Box::pin(async move {
            let mut attrs = self.synthesize(request)?;
            if request.id.kind == ResourceKind::TaskDefinition {
                let revision = current
                    .get("revision")
                    .and_then(|r| r.parse::<u64>().ok())
                    .unwrap_or(0);
                attrs.insert("revision".to_string(), (revision + 1).to_string());
            }
            info!(resource = %request.id, "updated locally");
            Ok(attrs)
        })
    }

    fn delete<'a>(&'a self, id: &'a ResourceId, _current: &'a Attributes) -> ProvisionFuture<'a, ()> {
        Box::pin(async move {
            info!(resource = %id, "deleted locally");
            Ok(())
        })
    }

    fn wait_ready<'a>(
        &'a self,
        id: &'a ResourceId,
        _attributes: &'a Attributes,
    ) -> ProvisionFuture<'a, ()> {
        Box::pin(async move {
            debug!(resource = %id, "ready");
            Ok(())
        })
    }

    fn snapshot<'a>(&'a self, id: &'a ResourceId, current: &'a Attributes) -> ProvisionFuture<'a, String> {
        Box::pin(async move {
            let arn = current.get("arn").map(String::as_str).unwrap_or_default();
            let digest = Sha256::digest(format!("{arn}/final").as_bytes());
            Ok(format!("{}-final-{}", id.name, hex::encode(&digest[..4])))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn request(kind: ResourceKind, name: &str, properties: serde_json::Value) -> ProvisionRequest {
        ProvisionRequest {
            stack: "chat".to_string(),
            id: ResourceId::new(kind, name),
            properties,
            inputs: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn database_attributes_are_deterministic() {
        let provisioner = LocalProvisioner::new("us-east-1", "123456789012");
        let mut req = request(
            ResourceKind::Database,
            "chat-db",
            json!({ "port": 5432, "username": "postgres", "database_name": "openwebui" }),
        );
        req.inputs.insert(
            "master_password".to_string(),
            "arn:forge:secret:us-east-1:123456789012:chat/db-password".to_string(),
        );

        let a = provisioner.create(&req).await.unwrap();
        let b = provisioner.create(&req).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a["port"], "5432");
        assert!(a["url"].starts_with("postgresql://postgres@chat-db."));
        assert!(a["url"].ends_with(":5432/openwebui"));
        assert!(!a["url"].contains("arn:"), "password reference leaked into url");
        for attr in ResourceKind::Database.exports() {
            assert!(a.contains_key(*attr), "missing {attr}");
        }
    }

    #[tokio::test]
    async fn database_without_password_binding_fails() {
        let provisioner = LocalProvisioner::new("us-east-1", "123456789012");
        let req = request(
            ResourceKind::Database,
            "chat-db",
            json!({ "port": 5432, "username": "postgres", "database_name": "openwebui" }),
        );
        assert_eq!(
            provisioner.create(&req).await.unwrap_err(),
            ProvisionError::MissingInput("master_password".to_string())
        );
    }

    #[tokio::test]
    async fn discovery_url_carries_the_api_prefix() {
        let provisioner = LocalProvisioner::new("us-east-1", "123456789012");
        let req = request(
            ResourceKind::Discovery,
            "gateway",
            json!({ "fqdn": "gateway.chat.local", "port": 8000, "namespace": "chat.local" }),
        );
        let attrs = provisioner.create(&req).await.unwrap();
        assert_eq!(attrs["url"], "http://gateway.chat.local:8000/v1");
    }

    #[tokio::test]
    async fn secret_exposes_locator_not_material() {
        let provisioner = LocalProvisioner::new("us-east-1", "123456789012");
        let req = request(ResourceKind::Secret, "admin-password", json!({ "length": 32 }));
        let attrs = provisioner.create(&req).await.unwrap();
        assert_eq!(attrs["locator"], "stackforge/chat/admin-password");
    }

    #[tokio::test]
    async fn task_definition_update_bumps_revision() {
        let provisioner = LocalProvisioner::new("us-east-1", "123456789012");
        let req = request(ResourceKind::TaskDefinition, "webui", json!({}));
        let created = provisioner.create(&req).await.unwrap();
        let updated = provisioner.update(&req, &created).await.unwrap();
        assert_eq!(updated["revision"], "2");
    }

    #[tokio::test]
    async fn every_kind_exports_its_declared_attributes() {
        let provisioner = LocalProvisioner::new("us-east-1", "123456789012");
        let props = json!({
            "cidr": "10.0.0.0/24",
            "availability_zone": "us-east-1a",
            "port": 80,
            "username": "postgres",
            "database_name": "app",
            "fqdn": "svc.ns.local",
        });
        for kind in ResourceKind::ALL {
            let mut req = request(kind, "x", props.clone());
            req.inputs.insert("master_password".to_string(), "ref".to_string());
            let attrs = provisioner.create(&req).await.unwrap();
            for attr in kind.exports() {
                assert!(attrs.contains_key(*attr), "{kind} missing {attr}");
            }
        }
    }
}
