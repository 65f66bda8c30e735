//! Error taxonomy for network construction, ticking and persistence.

use std::fmt;
use thiserror::Error;

/// Result of network and layer operations
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Errors raised while building, stepping or re-parameterising a network
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Shape mismatch on forward, setter or parameter update
    #[error("dimension mismatch in {context}: expected {expected:?}, found {found:?}")]
    Dimension {
        context: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Malformed network definition
    #[error("invalid network configuration: {0}")]
    Configuration(String),

    /// Parameter file could not be written or read back
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl NetworkError {
    pub(crate) fn dimension(
        context: impl Into<String>,
        expected: impl Into<Vec<usize>>,
        found: impl Into<Vec<usize>>,
    ) -> Self {
        Self::Dimension {
            context: context.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Errors that can occur while saving or loading layer parameters
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Stored layers do not fit the live network
    #[error("snapshot does not match network topology: {0}")]
    TopologyMismatch(String),
}

/// Errors loading or validating a YAML configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Non-fatal notice that a parameter vector carried more values than needed.
///
/// The surplus is ignored; callers receive the warning and decide whether
/// it matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlongParameterWarning {
    /// Layer name, or `"network"` for the per-layer list itself
    pub target: String,
    pub expected: usize,
    pub received: usize,
}

impl OverlongParameterWarning {
    pub(crate) fn check(target: &str, expected: usize, received: usize) -> Option<Self> {
        if received > expected {
            let warning = Self {
                target: target.to_string(),
                expected,
                received,
            };
            log::warn!("{}", warning);
            Some(warning)
        } else {
            None
        }
    }

    /// Number of trailing values that were ignored
    pub fn ignored(&self) -> usize {
        self.received - self.expected
    }
}

impl fmt::Display for OverlongParameterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parameter vector for {} has {} elements, {} required; ignoring {}",
            self.target,
            self.received,
            self.expected,
            self.ignored()
        )
    }
}
