//! One-time activation of registered assertion authorities.

use crate::authority::{AssertionError, AuthorityKey};
use crate::registry::AuthorityRegistry;
use crate::types::IdentityDescription;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Configuration for one authority.
///
/// Only `description` is interpreted here; `config` is handed to the
/// authority's activation routine as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeConfig {
    pub description: IdentityDescription,
    pub config: Vec<u8>,
}

impl SchemeConfig {
    /// Config with no scheme-specific bytes.
    pub fn new(description: IdentityDescription) -> Self {
        Self {
            description,
            config: Vec::new(),
        }
    }

    pub fn with_config(description: IdentityDescription, config: Vec<u8>) -> Self {
        Self { description, config }
    }
}

/// Activate every authority targeted by `configs`, each exactly once.
///
/// The whole batch is checked before anything is activated:
/// - a description with no registered generator or verifier is
///   `InvalidArgument`;
/// - an authority targeted twice in the batch, or already active from an
///   earlier call, is `AlreadyExists`;
/// - config bytes rejected by the generator's or verifier's
///   `check_config` fail the batch with that error.
///
/// A rejected batch activates nothing.
///
/// Both the generator and the verifier registered under a key receive the
/// same config bytes. Call once near process start, before the registry is
/// shared with threads that generate or verify.
pub fn initialize_authorities(
    registry: &mut AuthorityRegistry,
    configs: &[SchemeConfig],
) -> Result<(), AssertionError> {
    let mut targets = Vec::with_capacity(configs.len());
    let mut seen = HashSet::new();

    for scheme in configs {
        let key = AuthorityKey::for_description(&scheme.description)?;

        if !registry.contains(&key) {
            return Err(AssertionError::InvalidArgument(format!(
                "No assertion authority registered for {}",
                scheme.description
            )));
        }

        let already_active = registry.get_generator(&key).map(|g| g.is_initialized()).unwrap_or(false)
            || registry.get_verifier(&key).map(|v| v.is_initialized()).unwrap_or(false);
        if !seen.insert(key.clone()) || already_active {
            return Err(AssertionError::AlreadyExists(format!(
                "Assertion authority {} is already initialized",
                scheme.description
            )));
        }

        if let Ok(generator) = registry.get_generator(&key) {
            generator.check_config(&scheme.config)?;
        }
        if let Ok(verifier) = registry.get_verifier(&key) {
            verifier.check_config(&scheme.config)?;
        }

        targets.push((key, scheme));
    }

    for (key, scheme) in targets {
        if let Some(generator) = registry.generator_mut(&key) {
            generator.initialize(&scheme.config)?;
        }
        if let Some(verifier) = registry.verifier_mut(&key) {
            verifier.initialize(&scheme.config)?;
        }

        tracing::info!(authority = %scheme.description, key = %key, "Initialized assertion authority");
    }

    Ok(())
}
