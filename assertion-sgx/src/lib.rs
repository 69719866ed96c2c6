//! Intel SGX DCAP (Data Center Attestation Primitives) assertion authority.
//!
//! This crate provides the ECDSA quote codec and an assertion authority that
//! uses quotes as evidence, plugged into the `assertion-core` registry.
//!
//! ## Verification Flow
//! 1. Parse the packed quote (strict size validation)
//! 2. Check quote version and attestation key type
//! 3. Check quote signatures (external capability)
//! 4. Check the report data commits to the handshake context
//! 5. Apply the debug-enclave policy
//! 6. Extract the code identity (MRENCLAVE, MRSIGNER, ...)

pub mod dcap;
pub mod quote;

use assertion_core::AssertionError;

pub use dcap::{
    bind_handshake_context, dcap_assertion_description, CodeIdentity, DcapAssertionGenerator,
    DcapAssertionVerifier, DcapConfig, QuoteProvider, QuoteSignatureCheck, DCAP_AUTHORITY_TYPE,
};
pub use quote::{CertData, IntelQeQuote, QuoteError, QuoteHeader, QuoteSignature, ReportBody};

/// Every quote failure is a malformed or unacceptable input.
impl From<QuoteError> for AssertionError {
    fn from(err: QuoteError) -> Self {
        AssertionError::InvalidArgument(err.to_string())
    }
}
