use scriptling_events::{TriggerType, UnknownTriggerType};
use thiserror::Error;

use crate::module::ModuleState;

/// Rejection of a trigger registration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error(transparent)]
    UnknownType(#[from] UnknownTriggerType),

    #[error("priority {priority} is outside the allowed range {min}..={max}")]
    InvalidPriority { priority: i32, min: i32, max: i32 },

    #[error("invocation limit must be at least 1")]
    InvalidInvocationLimit,

    #[error("invalid filter for {trigger_type}: {reason}")]
    InvalidFilter {
        trigger_type: TriggerType,
        reason: String,
    },

    #[error("module '{name}' is {state} and cannot register triggers")]
    ModuleNotActive { name: String, state: ModuleState },
}

/// Failure to start a dispatch by name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    UnknownType(#[from] UnknownTriggerType),

    #[error("payload for {actual} cannot be dispatched as {expected}")]
    PayloadMismatch {
        expected: TriggerType,
        actual: TriggerType,
    },
}

/// Failure to bring a module to `Active`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("module '{name}' is already loaded")]
    AlreadyLoaded { name: String },

    #[error("module '{name}' is not known to the manager")]
    NotFound { name: String },

    #[error("module '{name}' entry point failed: {message}")]
    EntryPoint { name: String, message: String },

    #[error("module '{name}' panicked while loading: {message}")]
    Panicked { name: String, message: String },

    #[error("module '{name}' was unloaded before it finished loading")]
    Interrupted { name: String },

    #[error("module '{name}' requires '{dependency}', which is not installed")]
    MissingDependency { name: String, dependency: String },

    #[error("module '{name}' requires '{dependency}', which failed to load")]
    DependencyFailed { name: String, dependency: String },

    #[error("module '{name}' is part of a dependency cycle: {}", cycle.join(" -> "))]
    DependencyCycle { name: String, cycle: Vec<String> },
}

impl LoadError {
    /// Name of the module the error is about
    pub fn module_name(&self) -> &str {
        match self {
            LoadError::AlreadyLoaded { name }
            | LoadError::NotFound { name }
            | LoadError::EntryPoint { name, .. }
            | LoadError::Panicked { name, .. }
            | LoadError::Interrupted { name }
            | LoadError::MissingDependency { name, .. }
            | LoadError::DependencyFailed { name, .. }
            | LoadError::DependencyCycle { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnloadError {
    #[error("module '{0}' not found")]
    NotFound(String),
}

/// Failure to read a module's metadata file
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("no metadata file at {0}")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("module metadata has an empty name")]
    EmptyName,
}

/// Render a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
