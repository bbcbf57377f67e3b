//! Fuzz target: name resolution over arbitrary seeds.
//!
//! Every successfully resolved synthesized name must respect its kind's
//! length ceiling; failures must be reported, never truncated silently.
#![no_main]

use flexstack_core::{resolve_names, NameOverrides, NamingContext, ResourceKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let seed = String::from_utf8_lossy(data);
    let Ok(ctx) = NamingContext::new(&seed, "fuzz", "swedencentral", "sub") else {
        return;
    };
    if let Ok(names) = resolve_names(&ctx, &NameOverrides::new()) {
        for kind in ResourceKind::ALL {
            let name = names.get(kind).unwrap_or_default();
            assert!(!name.is_empty(), "{kind} must be resolved");
            assert!(name.chars().count() <= kind.max_len(), "{kind} exceeds its ceiling: {name}");
        }
    }
});
