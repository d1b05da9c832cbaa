//! Opaque secret references.

use std::fmt;

/// A capability naming where a secret's material lives.
///
/// Handed to every consumer (task definitions, the database) in place of
/// the value itself. Holding a `SecretRef` grants nothing on its own; the
/// material is only reachable through [`crate::SecretVault::reveal`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecretRef {
    name: String,
    locator: String,
}

impl SecretRef {
    pub fn for_stack(stack: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            locator: format!("stackforge/{stack}/{name}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable identifier of the stored material, safe to print.
    pub fn locator(&self) -> &str {
        &self.locator
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "secret:{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_is_stack_scoped() {
        let r = SecretRef::for_stack("chat", "admin-password");
        assert_eq!(r.locator(), "stackforge/chat/admin-password");
        assert_eq!(r.to_string(), "secret:admin-password");
        assert_ne!(r, SecretRef::for_stack("other", "admin-password"));
    }
}
