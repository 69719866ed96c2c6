//! ECDSA quote based assertion authority (Intel DCAP).
//!
//! The generator asks a quoting enclave for a quote whose report data
//! commits to the handshake context; the verifier checks the quote's
//! structure, its signature, that commitment and the debug policy, then
//! extracts the enclave's code identity.
//!
//! The quoting enclave and the ECDSA/PCK signature check are external
//! capabilities, supplied as [`QuoteProvider`] and [`QuoteSignatureCheck`].

use crate::quote::{
    self, IntelQeQuote, QuoteError, ReportBody, ATTESTATION_KEY_TYPE_ECDSA_P256, QUOTE_VERSION_3,
};
use assertion_core::authority::{ensure_initialized, ensure_matches};
use assertion_core::serialization::{from_canonical_cbor, to_canonical_cbor};
use assertion_core::{
    Assertion, AssertionAuthority, AssertionError, AssertionGenerator, AssertionOffer,
    AssertionRequest, AssertionVerifier, AuthorityRegistry, EnclaveIdentity, EnclaveIdentityType,
    IdentityDescription,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Authority type of the DCAP scheme.
pub const DCAP_AUTHORITY_TYPE: &str = "SGX Intel ECDSA QE";

/// Domain separator for the handshake commitment in report data.
const REPORT_DATA_DOMAIN: &[u8] = b"assertion-sgx/dcap/v1\0";

pub fn dcap_assertion_description() -> IdentityDescription {
    IdentityDescription::new(EnclaveIdentityType::CodeIdentity, DCAP_AUTHORITY_TYPE)
}

/// Produces quotes for the local enclave (the quoting enclave).
pub trait QuoteProvider: Send + Sync {
    /// Return a packed quote whose report body carries `report_data`.
    fn quote(&self, report_data: &[u8; 64]) -> Result<Vec<u8>, AssertionError>;
}

/// Verifies the ECDSA signatures of a quote and its certification chain.
pub trait QuoteSignatureCheck: Send + Sync {
    fn check(&self, quote: &IntelQeQuote) -> Result<(), QuoteError>;
}

/// Configuration for the DCAP authority, carried CBOR-encoded in
/// `SchemeConfig::config`. Empty config bytes select the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcapConfig {
    /// Allow debug enclaves (should be false in production)
    pub allow_debug: bool,
}

impl DcapConfig {
    pub fn from_config_bytes(bytes: &[u8]) -> Result<Self, AssertionError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        Ok(from_canonical_cbor(bytes)?)
    }

    pub fn to_config_bytes(&self) -> Result<Vec<u8>, AssertionError> {
        Ok(to_canonical_cbor(self)?)
    }
}

/// Identity extracted from a verified quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeIdentity {
    pub mr_enclave: [u8; 32],
    pub mr_signer: [u8; 32],
    pub isv_prod_id: u16,
    pub isv_svn: u16,
    pub misc_select: u32,
    pub attributes_flags: u64,
    pub attributes_xfrm: u64,
}

impl CodeIdentity {
    pub fn from_report(report: &ReportBody) -> Self {
        Self {
            mr_enclave: report.mr_enclave,
            mr_signer: report.mr_signer,
            isv_prod_id: report.isv_prod_id,
            isv_svn: report.isv_svn,
            misc_select: report.misc_select,
            attributes_flags: report.attributes.flags,
            attributes_xfrm: report.attributes.xfrm,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AssertionError> {
        Ok(to_canonical_cbor(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssertionError> {
        Ok(from_canonical_cbor(bytes)?)
    }
}

/// Report data committing to a handshake transcript.
///
/// `SHA-256(domain || handshake_context)` in the first 32 bytes, zeros after.
pub fn bind_handshake_context(handshake_context: &[u8]) -> [u8; 64] {
    let mut hasher = Sha256::new();
    hasher.update(REPORT_DATA_DOMAIN);
    hasher.update(handshake_context);

    let mut report_data = [0u8; 64];
    report_data[..32].copy_from_slice(&hasher.finalize());
    report_data
}

/// Register the DCAP generator and verifier.
pub fn register(
    registry: &mut AuthorityRegistry,
    provider: Arc<dyn QuoteProvider>,
    checker: Arc<dyn QuoteSignatureCheck>,
) -> Result<(), AssertionError> {
    registry.register_generator(Box::new(DcapAssertionGenerator::new(provider)))?;
    registry.register_verifier(Box::new(DcapAssertionVerifier::new(checker)))?;
    Ok(())
}

fn activate(slot: &mut Option<DcapConfig>, config: &[u8]) -> Result<(), AssertionError> {
    if slot.is_some() {
        return Err(AssertionError::AlreadyExists(format!(
            "{} is already initialized",
            dcap_assertion_description()
        )));
    }

    let config = DcapConfig::from_config_bytes(config)?;
    tracing::info!(allow_debug = config.allow_debug, "Activating DCAP assertion authority");
    *slot = Some(config);
    Ok(())
}

/// DCAP offers and requests carry no additional information.
fn accepts(description: &IdentityDescription, additional_information: &[u8]) -> bool {
    *description == dcap_assertion_description() && additional_information.is_empty()
}

pub struct DcapAssertionGenerator {
    provider: Arc<dyn QuoteProvider>,
    config: Option<DcapConfig>,
}

impl DcapAssertionGenerator {
    pub fn new(provider: Arc<dyn QuoteProvider>) -> Self {
        Self {
            provider,
            config: None,
        }
    }
}

impl AssertionAuthority for DcapAssertionGenerator {
    fn identity_type(&self) -> EnclaveIdentityType {
        EnclaveIdentityType::CodeIdentity
    }

    fn authority_type(&self) -> &str {
        DCAP_AUTHORITY_TYPE
    }

    fn initialize(&mut self, config: &[u8]) -> Result<(), AssertionError> {
        activate(&mut self.config, config)
    }

    fn check_config(&self, config: &[u8]) -> Result<(), AssertionError> {
        DcapConfig::from_config_bytes(config).map(|_| ())
    }

    fn is_initialized(&self) -> bool {
        self.config.is_some()
    }
}

impl AssertionGenerator for DcapAssertionGenerator {
    fn create_assertion_offer(&self) -> Result<AssertionOffer, AssertionError> {
        ensure_initialized(self)?;
        Ok(AssertionOffer {
            description: self.description(),
            additional_information: Vec::new(),
        })
    }

    fn can_generate(&self, request: &AssertionRequest) -> Result<bool, AssertionError> {
        ensure_initialized(self)?;
        Ok(accepts(&request.description, &request.additional_information))
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
                "DCAP assertion request carries {} bytes of additional information",
                request.additional_information.len()
            )));
        }

        let report_data = bind_handshake_context(handshake_context);
        let packed = self.provider.quote(&report_data)?;

        // Structural check only; signatures are the verifier's job
        let parsed = quote::parse(&packed)
            .map_err(|e| AssertionError::Internal(format!("Quoting enclave returned a bad quote: {}", e)))?;
        if parsed.body.report_data != report_data {
            return Err(AssertionError::Internal(
                "Quoting enclave returned a quote for different report data".to_string(),
            ));
        }

        tracing::debug!(quote_len = packed.len(), "Generated DCAP assertion");

        Ok(Assertion {
            description: self.description(),
            assertion: packed,
        })
    }
}

pub struct DcapAssertionVerifier {
    checker: Arc<dyn QuoteSignatureCheck>,
    config: Option<DcapConfig>,
}

impl DcapAssertionVerifier {
    pub fn new(checker: Arc<dyn QuoteSignatureCheck>) -> Self {
        Self {
            checker,
            config: None,
        }
    }

    fn check_quote(
        &self,
        config: &DcapConfig,
        handshake_context: &[u8],
        quote: &IntelQeQuote,
    ) -> Result<(), QuoteError> {
        if quote.header.version != QUOTE_VERSION_3 {
            return Err(QuoteError::UnsupportedVersion(quote.header.version));
        }
        if quote.header.attestation_key_type != ATTESTATION_KEY_TYPE_ECDSA_P256 {
            return Err(QuoteError::UnsupportedKeyType(quote.header.attestation_key_type));
        }

        self.checker.check(quote)?;

        if quote.body.report_data != bind_handshake_context(handshake_context) {
            return Err(QuoteError::Rejected("report data is not bound to this handshake"));
        }

        if quote.body.attributes.is_debug() && !config.allow_debug {
            return Err(QuoteError::Rejected("debug enclaves are not allowed"));
        }

        Ok(())
    }
}

impl AssertionAuthority for DcapAssertionVerifier {
    fn identity_type(&self) -> EnclaveIdentityType {
        EnclaveIdentityType::CodeIdentity
    }

    fn authority_type(&self) -> &str {
        DCAP_AUTHORITY_TYPE
    }

    fn initialize(&mut self, config: &[u8]) -> Result<(), AssertionError> {
        activate(&mut self.config, config)
    }

    fn check_config(&self, config: &[u8]) -> Result<(), AssertionError> {
        DcapConfig::from_config_bytes(config).map(|_| ())
    }

    fn is_initialized(&self) -> bool {
        self.config.is_some()
    }
}

impl AssertionVerifier for DcapAssertionVerifier {
    fn create_assertion_request(&self) -> Result<AssertionRequest, AssertionError> {
        ensure_initialized(self)?;
        Ok(AssertionRequest {
            description: self.description(),
            additional_information: Vec::new(),
        })
    }

    fn can_verify(&self, offer: &AssertionOffer) -> Result<bool, AssertionError> {
        ensure_initialized(self)?;
        Ok(accepts(&offer.description, &offer.additional_information))
    }

    fn verify(
        &self,
        handshake_context: &[u8],
        assertion: &Assertion,
    ) -> Result<EnclaveIdentity, AssertionError> {
        let config = self.config.as_ref().ok_or_else(|| {
            AssertionError::FailedPrecondition(format!("{} is not initialized", self.description()))
        })?;
        ensure_matches(self, &assertion.description)?;

        let quote = quote::parse(&assertion.assertion)?;
        if let Err(e) = self.check_quote(config, handshake_context, &quote) {
            tracing::warn!(
                mr_enclave = %hex::encode(quote.body.mr_enclave),
                error = %e,
                "Rejected DCAP assertion"
            );
            return Err(e.into());
        }

        let identity = CodeIdentity::from_report(&quote.body);
        tracing::debug!(
            mr_enclave = %hex::encode(identity.mr_enclave),
            mr_signer = %hex::encode(identity.mr_signer),
            "Verified DCAP assertion"
        );

        Ok(EnclaveIdentity {
            description: self.description(),
            identity: identity.to_bytes()?,
        })
    }
}
