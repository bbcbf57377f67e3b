//! Fuzz target: resource token generation.
//!
//! Verifies that `generate_token` never panics on arbitrary input and always
//! produces a fixed-length token of lowercase base32 characters.
#![no_main]

use flexstack_core::{generate_token, TOKEN_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut parts = text.splitn(3, '\n');
    let sub = parts.next().unwrap_or_default();
    let seed = parts.next().unwrap_or_default();
    let location = parts.next().unwrap_or_default();

    let token = generate_token(sub, seed, location);
    assert_eq!(token.as_str().len(), TOKEN_LEN);
    assert!(
        token.as_str().bytes().all(|b| b.is_ascii_lowercase() || (b'2'..=b'7').contains(&b)),
        "token must only contain [a-z2-7]"
    );
    assert_eq!(token, generate_token(sub, seed, location), "token must be deterministic");
});
