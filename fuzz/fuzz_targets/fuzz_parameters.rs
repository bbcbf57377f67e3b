//! Fuzz target: JSON deserialization of `DeploymentParameters`.
//!
//! Arbitrary bytes fed to the parameters parser must never panic; errors are
//! expected and fine. Anything that parses must also plan without panicking.

#![no_main]

use flexstack_core::{DeploymentParameters, DeploymentPlan};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(params) = DeploymentParameters::from_json(json) {
        let _ = DeploymentPlan::build(&params);
    }
});
