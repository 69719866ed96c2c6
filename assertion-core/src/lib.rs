//! # Assertion Core
//!
//! Vendor-neutral core of enclave identity assertion: the protocol every
//! identity scheme speaks, and the registry that finds a scheme by its
//! `(identity type, authority type)` pair.
//!
//! ## Key Features
//! - **Generator/verifier contracts**: offers, requests, assertions and
//!   extracted identities exchanged through one trait pair
//! - **Authority registry**: explicit registration, one-time activation,
//!   lock-free lookups once installed
//! - **Null authority**: reference scheme for exercising the protocol
//! - **Canonical CBOR**: one byte encoding per protocol message
//!
//! ## Startup
//! ```no_run
//! use assertion_core::{initialize_authorities, null, registry, AuthorityRegistry, SchemeConfig};
//!
//! let mut authorities = AuthorityRegistry::new();
//! null::register(&mut authorities)?;
//! initialize_authorities(
//!     &mut authorities,
//!     &[SchemeConfig::new(null::null_assertion_description())],
//! )?;
//! let authorities = registry::install(authorities)?;
//! # Ok::<(), assertion_core::AssertionError>(())
//! ```

pub mod authority;
pub mod init;
pub mod null;
pub mod registry;
pub mod serialization;
pub mod types;

pub use authority::{
    authority_key, AssertionAuthority, AssertionError, AssertionGenerator, AssertionVerifier,
    AuthorityKey, ErrorKind,
};
pub use init::{initialize_authorities, SchemeConfig};
pub use registry::AuthorityRegistry;
pub use serialization::SerializationError;
pub use types::*;
