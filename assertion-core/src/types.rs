//! Identity and description value types exchanged by assertion authorities.

use crate::serialization::{from_canonical_cbor, to_canonical_cbor, SerializationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of identity an authority asserts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnclaveIdentityType {
    /// Unset. Never registered by any authority.
    #[default]
    UnknownIdentity,
    /// Identity carrying no security guarantees (testing, placeholders)
    NullIdentity,
    /// Identity rooted in the measured code of the enclave
    CodeIdentity,
    /// Identity rooted in a certificate
    CertIdentity,
}

impl EnclaveIdentityType {
    /// Stable name used in authority key derivation.
    pub fn name(&self) -> &'static str {
        match self {
            EnclaveIdentityType::UnknownIdentity => "UNKNOWN_IDENTITY",
            EnclaveIdentityType::NullIdentity => "NULL_IDENTITY",
            EnclaveIdentityType::CodeIdentity => "CODE_IDENTITY",
            EnclaveIdentityType::CertIdentity => "CERT_IDENTITY",
        }
    }
}

impl fmt::Display for EnclaveIdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Names the kind of identity and the scheme (authority) that handles it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityDescription {
    pub identity_type: EnclaveIdentityType,
    pub authority_type: String,
}

impl IdentityDescription {
    pub fn new(identity_type: EnclaveIdentityType, authority_type: impl Into<String>) -> Self {
        Self {
            identity_type,
            authority_type: authority_type.into(),
        }
    }
}

impl fmt::Display for IdentityDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.identity_type, self.authority_type)
    }
}

/// Advertises what a generator is able to produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionOffer {
    pub description: IdentityDescription,
    /// Scheme-specific; empty for schemes without offer parameters
    pub additional_information: Vec<u8>,
}

/// Asks a generator for evidence the verifier can check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionRequest {
    pub description: IdentityDescription,
    pub additional_information: Vec<u8>,
}

/// Evidence for an identity claim. Opaque outside its scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub description: IdentityDescription,
    pub assertion: Vec<u8>,
}

/// Identity extracted from a successfully verified assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclaveIdentity {
    pub description: IdentityDescription,
    pub identity: Vec<u8>,
}

macro_rules! cbor_message {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $ty {
                /// Encode as canonical CBOR.
                pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
                    to_canonical_cbor(self)
                }

                /// Decode from CBOR bytes.
                pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
                    from_canonical_cbor(bytes)
                }
            }
        )*
    };
}

cbor_message!(
    IdentityDescription,
    AssertionOffer,
    AssertionRequest,
    Assertion,
    EnclaveIdentity,
);
