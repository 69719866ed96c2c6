//! Assertion authority interface for pluggable identity schemes.
//!
//! An authority is a named scheme identified by an
//! `(identity type, authority type)` pair. Every scheme provides a generator
//! (produces evidence about the local enclave) and a verifier (checks a peer's
//! evidence), both built on [`AssertionAuthority`] so that the registry can
//! activate and look them up without knowing the concrete scheme.

use crate::serialization::SerializationError;
use crate::types::{
    Assertion, AssertionOffer, AssertionRequest, EnclaveIdentity, EnclaveIdentityType,
    IdentityDescription,
};
use std::fmt;
use thiserror::Error;

/// Errors surfaced by authorities, the registry and the orchestrator.
///
/// Messages name mismatched descriptions and sizes, never payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssertionError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error class, for callers that only branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    FailedPrecondition,
    NotFound,
    AlreadyExists,
    Internal,
}

impl AssertionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssertionError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AssertionError::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            AssertionError::NotFound(_) => ErrorKind::NotFound,
            AssertionError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            AssertionError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<SerializationError> for AssertionError {
    fn from(err: SerializationError) -> Self {
        match err {
            SerializationError::Encode(e) => AssertionError::Internal(e.to_string()),
            other => AssertionError::InvalidArgument(other.to_string()),
        }
    }
}

/// Registry lookup key derived from an `(identity type, authority type)` pair.
///
/// The encoding is stable so that independent processes derive the same key:
///
/// ```text
/// le64(len(type_name)) || type_name || le64(len(authority_type)) || authority_type
/// ```
///
/// where `type_name` is [`EnclaveIdentityType::name`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthorityKey(Vec<u8>);

impl AuthorityKey {
    /// Derive the key for an identity type and authority type.
    pub fn derive(
        identity_type: EnclaveIdentityType,
        authority_type: &str,
    ) -> Result<Self, AssertionError> {
        if authority_type.is_empty() {
            return Err(AssertionError::InvalidArgument(
                "Authority type must not be empty".to_string(),
            ));
        }

        let name = identity_type.name().as_bytes();
        let authority = authority_type.as_bytes();

        let mut key = Vec::with_capacity(16 + name.len() + authority.len());
        for part in [name, authority] {
            key.extend_from_slice(&(part.len() as u64).to_le_bytes());
            key.extend_from_slice(part);
        }

        Ok(AuthorityKey(key))
    }

    /// Derive the key for a description.
    pub fn for_description(description: &IdentityDescription) -> Result<Self, AssertionError> {
        Self::derive(description.identity_type, &description.authority_type)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for AuthorityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for AuthorityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorityKey({})", self)
    }
}

/// Free-function form of [`AuthorityKey::derive`].
pub fn authority_key(
    identity_type: EnclaveIdentityType,
    authority_type: &str,
) -> Result<AuthorityKey, AssertionError> {
    AuthorityKey::derive(identity_type, authority_type)
}

/// Behavior shared by every generator and verifier.
///
/// Authorities are activated once through [`AssertionAuthority::initialize`]
/// and are read-only afterwards; all other methods take `&self` and may run
/// concurrently from many threads.
pub trait AssertionAuthority: Send + Sync {
    /// Identity type this authority handles.
    fn identity_type(&self) -> EnclaveIdentityType;

    /// Name of the scheme (e.g. "Null assertion authority").
    fn authority_type(&self) -> &str;

    /// One-time activation with scheme-specific configuration bytes.
    ///
    /// Fails with `AlreadyExists` if the authority is already active.
    fn initialize(&mut self, config: &[u8]) -> Result<(), AssertionError>;

    /// Validate `config` without activating anything.
    ///
    /// `initialize` must succeed for any config accepted here.
    fn check_config(&self, _config: &[u8]) -> Result<(), AssertionError> {
        Ok(())
    }

    fn is_initialized(&self) -> bool;

    fn description(&self) -> IdentityDescription {
        IdentityDescription::new(self.identity_type(), self.authority_type())
    }

    /// Whether `description` names exactly this authority.
    fn matches(&self, description: &IdentityDescription) -> bool {
        description.identity_type == self.identity_type()
            && description.authority_type == self.authority_type()
    }
}

/// Produces assertions about the local enclave.
///
/// `can_generate` is a probe: it returns `Ok(false)` for well-formed but
/// incompatible requests (including the default request). `generate` is the
/// action and fails on the same inputs.
pub trait AssertionGenerator: AssertionAuthority {
    fn create_assertion_offer(&self) -> Result<AssertionOffer, AssertionError>;

    fn can_generate(&self, request: &AssertionRequest) -> Result<bool, AssertionError>;

    /// Generate an assertion satisfying `request`, optionally bound to the
    /// handshake transcript in `handshake_context`.
    fn generate(
        &self,
        handshake_context: &[u8],
        request: &AssertionRequest,
    ) -> Result<Assertion, AssertionError>;
}

/// Checks assertions presented by a peer.
pub trait AssertionVerifier: AssertionAuthority {
    fn create_assertion_request(&self) -> Result<AssertionRequest, AssertionError>;

    fn can_verify(&self, offer: &AssertionOffer) -> Result<bool, AssertionError>;

    /// Verify `assertion` against `handshake_context` and extract the peer's
    /// identity. The same assertion always yields the same identity bytes.
    fn verify(
        &self,
        handshake_context: &[u8],
        assertion: &Assertion,
    ) -> Result<EnclaveIdentity, AssertionError>;
}

/// Fails with `FailedPrecondition` unless `authority` has been activated.
pub fn ensure_initialized<A: AssertionAuthority + ?Sized>(
    authority: &A,
) -> Result<(), AssertionError> {
    if authority.is_initialized() {
        Ok(())
    } else {
        Err(AssertionError::FailedPrecondition(format!(
            "{} is not initialized",
            authority.description()
        )))
    }
}

/// Fails with `InvalidArgument` unless `description` names `authority`.
pub fn ensure_matches<A: AssertionAuthority + ?Sized>(
    authority: &A,
    description: &IdentityDescription,
) -> Result<(), AssertionError> {
    if authority.matches(description) {
        Ok(())
    } else {
        Err(AssertionError::InvalidArgument(format!(
            "Description {} does not match {}",
            description,
            authority.description()
        )))
    }
}
