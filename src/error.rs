//! Error type shared by every stage of the calibration pipeline.

use crate::assignment::SolveStatus;

/// Errors raised while loading inputs or running a calibration iteration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The network or its control logic is wrong; retrying will not help.
    #[error("configuration error at `{entity}`: {reason}")]
    Configuration { entity: String, reason: String },

    /// The assignment program has no usable optimum.
    #[error("no feasible flow assignment ({0})")]
    InfeasibleAssignment(SolveStatus),

    /// The simulation engine failed or never signalled completion.
    #[error("simulation engine failure: {0}")]
    ExternalProcess(String),

    /// An input file contained a value that could not be interpreted.
    #[error("malformed {context}: {reason}")]
    Malformed { context: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn config(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
