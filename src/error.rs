//! Error types shared across configuration, asset models, dispatch and the
//! simulation orchestrator.

use thiserror::Error;

use crate::assets::AssetKind;
use crate::sim::types::RunStatus;

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.ticks"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while building or updating a dispatch strategy.
///
/// These surface when a configuration is applied, never in the middle of a
/// tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("invalid strategy configuration: {field}: {message}")]
    InvalidConfiguration { field: String, message: String },
}

impl DispatchError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<DispatchError> for ConfigError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidConfiguration { field, message } => {
                ConfigError::new(format!("strategy.{field}"), message)
            }
        }
    }
}

/// Errors returned by a single asset state transition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The command variant does not match the asset variant.
    #[error("command for {command_kind} cannot be applied to {asset_kind} asset `{asset_id}`")]
    InapplicableCommand {
        asset_id: String,
        asset_kind: AssetKind,
        command_kind: AssetKind,
    },
}

/// Tick-level and control-level failures reported to the external controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("cannot {action} while simulation is {status}")]
    InvalidTransition {
        action: &'static str,
        status: RunStatus,
    },
    #[error("simulation already complete after {ticks} ticks")]
    Complete { ticks: usize },
    #[error("tick {tick} produced a non-finite aggregate power")]
    NonFiniteAggregate { tick: usize },
    #[error(transparent)]
    Strategy(#[from] DispatchError),
    #[error(transparent)]
    Model(#[from] ModelError),
}
