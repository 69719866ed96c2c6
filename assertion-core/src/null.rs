//! Null assertion authority.
//!
//! Carries no security guarantees. It exercises the generator/verifier
//! protocol without hardware or cryptography, and stands in where a trust
//! boundary is not enforced.

use crate::authority::{
    ensure_initialized, ensure_matches, AssertionAuthority, AssertionError, AssertionGenerator,
    AssertionVerifier,
};
use crate::registry::AuthorityRegistry;
use crate::types::{
    Assertion, AssertionOffer, AssertionRequest, EnclaveIdentity, EnclaveIdentityType,
    IdentityDescription,
};

/// Authority type of the null scheme.
pub const NULL_AUTHORITY_TYPE: &str = "Null assertion authority";

/// The only assertion the null verifier accepts.
pub const NULL_ASSERTION: &[u8] = b"null assertion";

/// Identity extracted from every valid null assertion.
pub const NULL_IDENTITY: &[u8] = b"null identity";

/// Description shared by the null generator and verifier.
pub fn null_assertion_description() -> IdentityDescription {
    IdentityDescription::new(EnclaveIdentityType::NullIdentity, NULL_AUTHORITY_TYPE)
}

/// Register the null generator and verifier.
pub fn register(registry: &mut AuthorityRegistry) -> Result<(), AssertionError> {
    registry.register_generator(Box::new(NullAssertionGenerator::new()))?;
    registry.register_verifier(Box::new(NullAssertionVerifier::new()))?;
    Ok(())
}

/// Shared activation state. Configuration is accepted but unused.
#[derive(Debug, Default)]
struct NullAuthority {
    initialized: bool,
}

impl NullAuthority {
    fn initialize(&mut self, config: &[u8]) -> Result<(), AssertionError> {
        if self.initialized {
            return Err(AssertionError::AlreadyExists(format!(
                "{} is already initialized",
                null_assertion_description()
            )));
        }

        tracing::debug!(config_len = config.len(), "Activating null assertion authority");
        self.initialized = true;
        Ok(())
    }

    /// Null offers and requests carry no additional information.
    fn accepts(&self, description: &IdentityDescription, additional_information: &[u8]) -> bool {
        *description == null_assertion_description() && additional_information.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct NullAssertionGenerator {
    inner: NullAuthority,
}

impl NullAssertionGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssertionAuthority for NullAssertionGenerator {
    fn identity_type(&self) -> EnclaveIdentityType {
        EnclaveIdentityType::NullIdentity
    }

    fn authority_type(&self) -> &str {
        NULL_AUTHORITY_TYPE
    }

    fn initialize(&mut self, config: &[u8]) -> Result<(), AssertionError> {
        self.inner.initialize(config)
    }

    fn is_initialized(&self) -> bool {
        self.inner.initialized
    }
}

impl AssertionGenerator for NullAssertionGenerator {
    fn create_assertion_offer(&self) -> Result<AssertionOffer, AssertionError> {
        ensure_initialized(self)?;
        Ok(AssertionOffer {
            description: self.description(),
            additional_information: Vec::new(),
        })
    }

    fn can_generate(&self, request: &AssertionRequest) -> Result<bool, AssertionError> {
        ensure_initialized(self)?;
        Ok(self
            .inner
            .accepts(&request.description, &request.additional_information))
    }

    fn generate(
        &self,
        handshake_context: &[u8],
        request: &AssertionRequest,
    ) -> Result<Assertion, AssertionError> {
        ensure_initialized(self)?;
        ensure_matches(self, &request.description)?;
        if !request.additional_information.is_empty() {
            return Err(AssertionError::InvalidArgument(format!(
                "Null assertion request carries {} bytes of additional information",
                request.additional_information.len()
            )));
        }

        // The null scheme does not bind evidence to the handshake
        tracing::debug!(context_len = handshake_context.len(), "Generating null assertion");

        Ok(Assertion {
            description: self.description(),
            assertion: NULL_ASSERTION.to_vec(),
        })
    }
}

#[derive(Debug, Default)]
pub struct NullAssertionVerifier {
    inner: NullAuthority,
}

impl NullAssertionVerifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssertionAuthority for NullAssertionVerifier {
    fn identity_type(&self) -> EnclaveIdentityType {
        EnclaveIdentityType::NullIdentity
    }

    fn authority_type(&self) -> &str {
        NULL_AUTHORITY_TYPE
    }

    fn initialize(&mut self, config: &[u8]) -> Result<(), AssertionError> {
        self.inner.initialize(config)
    }

    fn is_initialized(&self) -> bool {
        self.inner.initialized
    }
}

impl AssertionVerifier for NullAssertionVerifier {
    fn create_assertion_request(&self) -> Result<AssertionRequest, AssertionError> {
        ensure_initialized(self)?;
        Ok(AssertionRequest {
            description: self.description(),
            additional_information: Vec::new(),
        })
    }

    fn can_verify(&self, offer: &AssertionOffer) -> Result<bool, AssertionError> {
        ensure_initialized(self)?;
        Ok(self
            .inner
            .accepts(&offer.description, &offer.additional_information))
    }

    fn verify(
        &self,
        _handshake_context: &[u8],
        assertion: &Assertion,
    ) -> Result<EnclaveIdentity, AssertionError> {
        ensure_initialized(self)?;
        ensure_matches(self, &assertion.description)?;

        if assertion.assertion != NULL_ASSERTION {
            tracing::warn!(len = assertion.assertion.len(), "Rejected invalid null assertion");
            return Err(AssertionError::InvalidArgument(
                "Assertion is not a valid null assertion".to_string(),
            ));
        }

        Ok(EnclaveIdentity {
            description: self.description(),
            identity: NULL_IDENTITY.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::{AuthorityKey, ErrorKind};
    use crate::init::{initialize_authorities, SchemeConfig};

    // Placeholder for the handshake transcript and a Diffie-Hellman public key
    const EKEP_CONTEXT: &[u8] = b"EKEP handshake transcript and public key";

    const INVALID_AUTHORITY_TYPE: &str = "SGX Local";
    const INVALID_OFFER_INFO: &[u8] = b"offer info";
    const INVALID_REQUEST_INFO: &[u8] = b"request info";
    const INVALID_ASSERTION: &[u8] = b"assertion";

    fn initialized_registry() -> AuthorityRegistry {
        let mut registry = AuthorityRegistry::with_null_authority().unwrap();
        initialize_authorities(&mut registry, &[SchemeConfig::new(null_assertion_description())]).unwrap();
        registry
    }

    fn null_key() -> AuthorityKey {
        AuthorityKey::for_description(&null_assertion_description()).unwrap()
    }

    fn invalid_description() -> IdentityDescription {
        IdentityDescription::new(EnclaveIdentityType::CodeIdentity, INVALID_AUTHORITY_TYPE)
    }

    /// Null identity type under another scheme's name.
    fn invalid_authority_type() -> IdentityDescription {
        IdentityDescription::new(EnclaveIdentityType::NullIdentity, INVALID_AUTHORITY_TYPE)
    }

    #[test]
    fn test_can_verify_offer_from_generator() {
        let registry = initialized_registry();
        let generator = registry.get_generator(&null_key()).unwrap();
        let verifier = registry.get_verifier(&null_key()).unwrap();

        let offer = generator.create_assertion_offer().unwrap();
        assert!(offer.additional_information.is_empty());
        assert_eq!(verifier.can_verify(&offer), Ok(true));
    }

    #[test]
    fn test_can_verify_rejects_bad_offers() {
        let registry = initialized_registry();
        let verifier = registry.get_verifier(&null_key()).unwrap();

        let offer = AssertionOffer {
            description: invalid_description(),
            additional_information: INVALID_OFFER_INFO.to_vec(),
        };
        assert_eq!(verifier.can_verify(&offer), Ok(false));

        let offer = AssertionOffer {
            description: invalid_authority_type(),
            additional_information: Vec::new(),
        };
        assert_eq!(verifier.can_verify(&offer), Ok(false));

        // Right description, unexpected additional information
        let offer = AssertionOffer {
            description: null_assertion_description(),
            additional_information: INVALID_OFFER_INFO.to_vec(),
        };
        assert_eq!(verifier.can_verify(&offer), Ok(false));

        assert_eq!(verifier.can_verify(&AssertionOffer::default()), Ok(false));
    }

    #[test]
    fn test_can_generate_request_from_verifier() {
        let registry = initialized_registry();
        let generator = registry.get_generator(&null_key()).unwrap();
        let verifier = registry.get_verifier(&null_key()).unwrap();

        let request = verifier.create_assertion_request().unwrap();
        assert_eq!(generator.can_generate(&request), Ok(true));
    }

    #[test]
    fn test_can_generate_rejects_bad_requests() {
        let registry = initialized_registry();
        let generator = registry.get_generator(&null_key()).unwrap();

        let request = AssertionRequest {
            description: invalid_description(),
            additional_information: INVALID_REQUEST_INFO.to_vec(),
        };
        assert_eq!(generator.can_generate(&request), Ok(false));

        let request = AssertionRequest {
            description: invalid_authority_type(),
            additional_information: Vec::new(),
        };
        assert_eq!(generator.can_generate(&request), Ok(false));
        assert_eq!(generator.can_generate(&AssertionRequest::default()), Ok(false));
    }

    #[test]
    fn test_generate_rejects_bad_requests() {
        let registry = initialized_registry();
        let generator = registry.get_generator(&null_key()).unwrap();

        let request = AssertionRequest {
            description: invalid_description(),
            additional_information: INVALID_REQUEST_INFO.to_vec(),
        };
        let result = generator.generate(EKEP_CONTEXT, &request);
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InvalidArgument));

        let request = AssertionRequest {
            description: invalid_authority_type(),
            additional_information: Vec::new(),
        };
        let result = generator.generate(EKEP_CONTEXT, &request);
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InvalidArgument));

        let result = generator.generate(EKEP_CONTEXT, &AssertionRequest::default());
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InvalidArgument));

        let request = AssertionRequest {
            description: null_assertion_description(),
            additional_information: INVALID_REQUEST_INFO.to_vec(),
        };
        assert!(generator.generate(EKEP_CONTEXT, &request).is_err());
    }

    #[test]
    fn test_end_to_end_verification() {
        let registry = initialized_registry();
        let generator = registry.get_generator(&null_key()).unwrap();
        let verifier = registry.get_verifier(&null_key()).unwrap();

        let offer = generator.create_assertion_offer().unwrap();
        assert_eq!(verifier.can_verify(&offer), Ok(true));

        let request = verifier.create_assertion_request().unwrap();
        let assertion = generator.generate(EKEP_CONTEXT, &request).unwrap();
        assert_eq!(assertion.description, null_assertion_description());

        let identity = verifier.verify(EKEP_CONTEXT, &assertion).unwrap();
        assert_eq!(identity.description.identity_type, EnclaveIdentityType::NullIdentity);
        assert_eq!(identity.description.authority_type, NULL_AUTHORITY_TYPE);
        assert_eq!(identity.identity, NULL_IDENTITY);

        // Extraction is deterministic
        assert_eq!(verifier.verify(EKEP_CONTEXT, &assertion).unwrap(), identity);
    }

    #[test]
    fn test_verify_rejects_empty_assertion() {
        let registry = initialized_registry();
        let verifier = registry.get_verifier(&null_key()).unwrap();

        let result = verifier.verify(EKEP_CONTEXT, &Assertion::default());
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_verify_rejects_foreign_description() {
        let registry = initialized_registry();
        let verifier = registry.get_verifier(&null_key()).unwrap();

        let assertion = Assertion {
            description: invalid_description(),
            assertion: NULL_ASSERTION.to_vec(),
        };
        let result = verifier.verify(EKEP_CONTEXT, &assertion);
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InvalidArgument));

        let assertion = Assertion {
            description: invalid_authority_type(),
            assertion: NULL_ASSERTION.to_vec(),
        };
        let result = verifier.verify(EKEP_CONTEXT, &assertion);
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_verify_rejects_bad_assertion_body() {
        let registry = initialized_registry();
        let verifier = registry.get_verifier(&null_key()).unwrap();

        let assertion = Assertion {
            description: null_assertion_description(),
            assertion: INVALID_ASSERTION.to_vec(),
        };
        let result = verifier.verify(EKEP_CONTEXT, &assertion);
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_uninitialized_authority_fails_precondition() {
        let generator = NullAssertionGenerator::new();
        let verifier = NullAssertionVerifier::new();

        let result = generator.create_assertion_offer();
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::FailedPrecondition));

        let result = verifier.can_verify(&AssertionOffer::default());
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::FailedPrecondition));
    }

    #[test]
    fn test_reinitialize_rejected() {
        let mut verifier = NullAssertionVerifier::new();
        assert!(verifier.initialize(b"").is_ok());
        assert!(verifier.is_initialized());

        let result = verifier.initialize(b"");
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::AlreadyExists));
    }
}
