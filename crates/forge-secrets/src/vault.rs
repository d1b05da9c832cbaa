//! Secret vault — resolves every declared secret once per deploy.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use forge_core::SecretSpec;
use forge_state::{StateStore, StoredSecret, epoch_secs};

use crate::error::{SecretError, SecretResult};
use crate::policy::{SecretMaterial, SecretPolicy};
use crate::reference::SecretRef;

pub struct SecretVault {
    store: StateStore,
    stack: String,
    policies: BTreeMap<String, SecretPolicy>,
    resolved: HashMap<String, SecretMaterial>,
}

impl SecretVault {
    /// Build a vault for one stack. Every spec must carry a valid policy
    /// and a unique name.
    pub fn new(store: StateStore, stack: &str, specs: &[SecretSpec]) -> SecretResult<Self> {
        let mut policies = BTreeMap::new();
        for spec in specs {
            let policy = SecretPolicy::from_spec(spec)?;
            if policies.insert(spec.name.clone(), policy).is_some() {
                return Err(SecretError::Duplicate(spec.name.clone()));
            }
        }
        Ok(Self {
            store,
            stack: stack.to_string(),
            policies,
            resolved: HashMap::new(),
        })
    }

    /// Resolve every declared secret, generating material that does not
    /// exist yet. Stored material that no longer satisfies its policy is
    /// regenerated. Later calls are no-ops for already-resolved secrets.
    pub fn resolve_all(&mut self) -> SecretResult<Vec<SecretRef>> {
        let names: Vec<String> = self.policies.keys().cloned().collect();
        let mut refs = Vec::with_capacity(names.len());
        for name in names {
            if !self.resolved.contains_key(&name) {
                let material = self.load_or_generate(&name)?;
                self.resolved.insert(name.clone(), material);
            }
            refs.push(SecretRef::for_stack(&self.stack, &name));
        }
        Ok(refs)
    }

    fn load_or_generate(&self, name: &str) -> SecretResult<SecretMaterial> {
        let policy = self
            .policies
            .get(name)
            .ok_or_else(|| SecretError::Undeclared(name.to_string()))?;

        if let Some(stored) = self.store.get_secret(&self.stack, name)? {
            if policy.admits(&stored.value) {
                debug!(secret = %name, "reusing stored secret material");
                return Ok(SecretMaterial::new(stored.value.clone()));
            }
            warn!(secret = %name, "stored material violates current policy, regenerating");
        }

        let material = policy.generate();
        self.store.put_secret(&StoredSecret {
            stack: self.stack.clone(),
            name: name.to_string(),
            value: material.expose().to_string(),
            created_at: epoch_secs(),
            rotated_at: None,
        })?;
        info!(secret = %name, length = policy.length, "generated secret material");
        Ok(material)
    }

    /// Opaque reference to a declared secret.
    pub fn reference(&self, name: &str) -> SecretResult<SecretRef> {
        if self.policies.contains_key(name) {
            Ok(SecretRef::for_stack(&self.stack, name))
        } else {
            Err(SecretError::Undeclared(name.to_string()))
        }
    }

    /// Material behind a reference, if it has been resolved.
    pub fn reveal(&self, secret: &SecretRef) -> Option<&SecretMaterial> {
        if SecretRef::for_stack(&self.stack, secret.name()) != *secret {
            return None;
        }
        self.resolved.get(secret.name())
    }

    /// Replace a secret's material with a fresh generation.
    pub fn rotate(&mut self, name: &str) -> SecretResult<SecretRef> {
        let policy = self
            .policies
            .get(name)
            .ok_or_else(|| SecretError::Undeclared(name.to_string()))?;
        let created_at = self
            .store
            .get_secret(&self.stack, name)?
            .map(|s| s.created_at)
            .unwrap_or_else(epoch_secs);

        let material = policy.generate();
        self.store.put_secret(&StoredSecret {
            stack: self.stack.clone(),
            name: name.to_string(),
            value: material.expose().to_string(),
            created_at,
            rotated_at: Some(epoch_secs()),
        })?;
        self.resolved.insert(name.to_string(), material);
        info!(secret = %name, "secret rotated");
        Ok(SecretRef::for_stack(&self.stack, name))
    }

    /// Delete all stored material for the stack (teardown).
    pub fn purge(&mut self) -> SecretResult<u32> {
        let mut removed = 0;
        for stored in self.store.list_secrets(&self.stack)? {
            if self.store.delete_secret(&self.stack, &stored.name)? {
                removed += 1;
            }
        }
        self.resolved.clear();
        info!(stack = %self.stack, removed, "secret material purged");
        Ok(removed)
    }
}
