//! Example: one assertion exchange with the null authority
//!
//! Run with: RUST_LOG=debug cargo run --example null_handshake

use assertion_core::{
    initialize_authorities, null, registry, Assertion, AssertionGenerator, AssertionVerifier,
    AuthorityKey, AuthorityRegistry, SchemeConfig,
};
use tracing_subscriber::EnvFilter;

// Placeholder for the transcript the secure-channel handshake would supply
const HANDSHAKE_CONTEXT: &[u8] = b"EKEP handshake transcript and public key";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Step 1: register every scheme, in order, before anything looks them up
    let mut authorities = AuthorityRegistry::new();
    null::register(&mut authorities)?;

    // Step 2: activate the configured authorities once
    let description = null::null_assertion_description();
    initialize_authorities(&mut authorities, &[SchemeConfig::new(description.clone())])?;

    // Step 3: freeze the registry for the rest of the process
    let authorities = registry::install(authorities)?;
    let key = AuthorityKey::for_description(&description)?;
    println!("Authority {} -> key {}", description, key);

    let generator = authorities.get_generator(&key)?;
    let verifier = authorities.get_verifier(&key)?;

    // Step 4: negotiate
    let offer = generator.create_assertion_offer()?;
    anyhow::ensure!(verifier.can_verify(&offer)?, "verifier rejected the offer");

    let request = verifier.create_assertion_request()?;
    anyhow::ensure!(generator.can_generate(&request)?, "generator rejected the request");

    // Step 5: exchange evidence over the wire encoding
    let assertion = generator.generate(HANDSHAKE_CONTEXT, &request)?;
    let wire = assertion.to_bytes()?;
    println!("Assertion: {} bytes on the wire", wire.len());

    let received = Assertion::from_bytes(&wire)?;
    let identity = verifier.verify(HANDSHAKE_CONTEXT, &received)?;
    println!(
        "Verified peer identity {:?} ({})",
        String::from_utf8_lossy(&identity.identity),
        identity.description
    );

    Ok(())
}
