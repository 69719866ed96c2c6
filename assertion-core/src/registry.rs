//! Registry of assertion authorities.
//!
//! The registry is built and initialized by one thread at process start:
//! every scheme inserts itself through an explicit `register` call, then
//! [`crate::init::initialize_authorities`] activates the configured ones.
//! After that the registry is only read, either through a shared reference
//! or after [`install`] has moved it into process-wide storage.

use crate::authority::{AssertionError, AssertionGenerator, AssertionVerifier, AuthorityKey};
use crate::types::IdentityDescription;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Generators and verifiers keyed by their [`AuthorityKey`].
pub struct AuthorityRegistry {
    generators: HashMap<AuthorityKey, Box<dyn AssertionGenerator>>,
    verifiers: HashMap<AuthorityKey, Box<dyn AssertionVerifier>>,
}

impl AuthorityRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            generators: HashMap::new(),
            verifiers: HashMap::new(),
        }
    }

    /// Create a registry holding the null generator and verifier.
    pub fn with_null_authority() -> Result<Self, AssertionError> {
        let mut registry = Self::new();
        crate::null::register(&mut registry)?;
        Ok(registry)
    }

    /// Register a generator under the key derived from its description.
    pub fn register_generator(
        &mut self,
        generator: Box<dyn AssertionGenerator>,
    ) -> Result<AuthorityKey, AssertionError> {
        let description = generator.description();
        let key = AuthorityKey::for_description(&description)?;
        if self.generators.contains_key(&key) {
            return Err(AssertionError::AlreadyExists(format!(
                "Generator for {} is already registered",
                description
            )));
        }

        tracing::info!(authority = %description, key = %key, "Registered assertion generator");
        self.generators.insert(key.clone(), generator);
        Ok(key)
    }

    /// Register a verifier under the key derived from its description.
    pub fn register_verifier(
        &mut self,
        verifier: Box<dyn AssertionVerifier>,
    ) -> Result<AuthorityKey, AssertionError> {
        let description = verifier.description();
        let key = AuthorityKey::for_description(&description)?;
        if self.verifiers.contains_key(&key) {
            return Err(AssertionError::AlreadyExists(format!(
                "Verifier for {} is already registered",
                description
            )));
        }

        tracing::info!(authority = %description, key = %key, "Registered assertion verifier");
        self.verifiers.insert(key.clone(), verifier);
        Ok(key)
    }

    /// Get a generator by key.
    pub fn get_generator(&self, key: &AuthorityKey) -> Result<&dyn AssertionGenerator, AssertionError> {
        self.generators
            .get(key)
            .map(|b| b.as_ref())
            .ok_or_else(|| AssertionError::NotFound(format!("No generator registered for key {}", key)))
    }

    /// Get a verifier by key.
    pub fn get_verifier(&self, key: &AuthorityKey) -> Result<&dyn AssertionVerifier, AssertionError> {
        self.verifiers
            .get(key)
            .map(|b| b.as_ref())
            .ok_or_else(|| AssertionError::NotFound(format!("No verifier registered for key {}", key)))
    }

    pub fn generator_for(
        &self,
        description: &IdentityDescription,
    ) -> Result<&dyn AssertionGenerator, AssertionError> {
        self.get_generator(&AuthorityKey::for_description(description)?)
    }

    pub fn verifier_for(
        &self,
        description: &IdentityDescription,
    ) -> Result<&dyn AssertionVerifier, AssertionError> {
        self.get_verifier(&AuthorityKey::for_description(description)?)
    }

    /// Whether a generator or verifier is registered under `key`.
    pub fn contains(&self, key: &AuthorityKey) -> bool {
        self.generators.contains_key(key) || self.verifiers.contains_key(key)
    }

    /// Keys of every registered authority, sorted.
    pub fn authorities(&self) -> Vec<&AuthorityKey> {
        let mut keys: Vec<&AuthorityKey> = self.generators.keys().collect();
        for key in self.verifiers.keys() {
            if !self.generators.contains_key(key) {
                keys.push(key);
            }
        }
        keys.sort();
        keys
    }

    pub(crate) fn generator_mut(&mut self, key: &AuthorityKey) -> Option<&mut Box<dyn AssertionGenerator>> {
        self.generators.get_mut(key)
    }

    pub(crate) fn verifier_mut(&mut self, key: &AuthorityKey) -> Option<&mut Box<dyn AssertionVerifier>> {
        self.verifiers.get_mut(key)
    }
}

impl Default for AuthorityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AuthorityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityRegistry")
            .field("authorities", &self.authorities())
            .finish()
    }
}

static GLOBAL_REGISTRY: OnceLock<AuthorityRegistry> = OnceLock::new();

/// Move a fully registered and initialized registry into process-wide
/// storage. References handed out afterwards live until process exit.
pub fn install(registry: AuthorityRegistry) -> Result<&'static AuthorityRegistry, AssertionError> {
    let mut registry = Some(registry);
    let installed = GLOBAL_REGISTRY.get_or_init(|| {
        // Only reached by the first caller
        registry.take().unwrap_or_default()
    });

    if registry.is_some() {
        return Err(AssertionError::AlreadyExists(
            "Authority registry is already installed".to_string(),
        ));
    }

    tracing::info!(authorities = installed.authorities().len(), "Installed authority registry");
    Ok(installed)
}

/// The installed process-wide registry, if any.
pub fn global() -> Option<&'static AuthorityRegistry> {
    GLOBAL_REGISTRY.get()
}
