//! Secret generation policies.

use std::collections::BTreeSet;
use std::fmt;

use rand::Rng;
use zeroize::Zeroize;

use forge_core::SecretSpec;

use crate::error::{SecretError, SecretResult};

/// Shortest secret a policy may produce.
pub const MIN_LENGTH: usize = 8;
/// Longest secret a policy may produce.
pub const MAX_LENGTH: usize = 4096;

/// How one secret is generated: exact length, drawn from printable
/// ASCII (`!`..=`~`) minus the exclusion set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretPolicy {
    pub name: String,
    pub length: usize,
    pub exclude: BTreeSet<char>,
}

impl SecretPolicy {
    pub fn new(name: &str, length: usize, exclude: &str) -> SecretResult<Self> {
        if length < MIN_LENGTH {
            return Err(SecretError::TooShort {
                name: name.to_string(),
                length,
                min: MIN_LENGTH,
            });
        }
        if length > MAX_LENGTH {
            return Err(SecretError::TooLong {
                name: name.to_string(),
                length,
                max: MAX_LENGTH,
            });
        }
        let policy = Self {
            name: name.to_string(),
            length,
            exclude: exclude.chars().collect(),
        };
        if policy.alphabet().is_empty() {
            return Err(SecretError::EmptyAlphabet {
                name: name.to_string(),
            });
        }
        Ok(policy)
    }

    pub fn from_spec(spec: &SecretSpec) -> SecretResult<Self> {
        Self::new(&spec.name, spec.length, &spec.exclude)
    }

    /// Characters the generator may emit.
    pub fn alphabet(&self) -> Vec<char> {
        ('!'..='~').filter(|c| !self.exclude.contains(c)).collect()
    }

    /// Generate fresh material from the thread-local CSPRNG.
    pub fn generate(&self) -> SecretMaterial {
        self.generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng>(&self, rng: &mut R) -> SecretMaterial {
        let alphabet = self.alphabet();
        let value: String = (0..self.length)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect();
        SecretMaterial::new(value)
    }

    /// Whether existing material still satisfies this policy.
    pub fn admits(&self, value: &str) -> bool {
        value.chars().count() >= self.length
            && value.chars().all(|c| ('!'..='~').contains(&c) && !self.exclude.contains(&c))
    }
}

/// Secret bytes held in memory. Wiped on drop, never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretMaterial(String);

impl SecretMaterial {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SecretMaterial {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretMaterial(<{} chars redacted>)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn generates_exact_length() {
        let policy = SecretPolicy::new("admin-password", 32, "").unwrap();
        assert_eq!(policy.generate().len(), 32);
    }

    #[test]
    fn rejects_short_policy() {
        assert!(matches!(
            SecretPolicy::new("pin", 4, ""),
            Err(SecretError::TooShort { length: 4, .. })
        ));
    }

    #[test]
    fn rejects_policy_excluding_everything() {
        let all: String = ('!'..='~').collect();
        assert!(matches!(
            SecretPolicy::new("nothing", 16, &all),
            Err(SecretError::EmptyAlphabet { .. })
        ));
    }

    #[test]
    fn single_character_alphabet_still_works() {
        let exclude: String = ('!'..='~').filter(|c| *c != 'x').collect();
        let policy = SecretPolicy::new("xs", 10, &exclude).unwrap();
        assert_eq!(policy.generate().expose(), "xxxxxxxxxx");
    }

    #[test]
    fn admits_checks_length_and_exclusions() {
        let policy = SecretPolicy::new("db-password", 8, "@/").unwrap();
        assert!(policy.admits("abcdefgh"));
        assert!(!policy.admits("abcdefg"));
        assert!(!policy.admits("abcd@fgh"));
        assert!(!policy.admits("abcd efgh"));
    }

    #[test]
    fn debug_does_not_leak() {
        let material = SecretMaterial::new("correct-horse-battery".to_string());
        let printed = format!("{material:?}");
        assert!(!printed.contains("horse"));
        assert!(printed.contains("21 chars"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        #[test]
        fn generated_material_honours_policy(
            length in MIN_LENGTH..128usize,
            exclude in "[!-~]{0,40}",
        ) {
            let policy = SecretPolicy::new("prop", length, &exclude).unwrap();
            let material = policy.generate();
            prop_assert!(material.len() >= length);
            for c in material.expose().chars() {
                prop_assert!(!exclude.contains(c), "excluded {c:?} emitted");
            }
            prop_assert!(policy.admits(material.expose()));
        }
    }
}
