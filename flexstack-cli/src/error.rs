//! Error types for the CLI crate.

use std::path::PathBuf;

use flexstack_core::CoreError;
use flexstack_provision::ProvisionError;

/// Errors surfaced to the operator. All of them exit with status 1.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CliError {
    /// A file named on the command line could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Naming or binding failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The simulated deployment failed.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// Output could not be rendered.
    #[error("cannot render output: {0}")]
    Render(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_names_the_path() {
        let err = CliError::Read {
            path: PathBuf::from("/nope/params.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/nope/params.json"));
    }

    #[test]
    fn core_errors_display_transparently() {
        let core = CoreError::Config { reason: "seed is empty".to_owned() };
        let err = CliError::from(core);
        assert_eq!(err.to_string(), "configuration error: seed is empty");
    }
}
