// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Loader error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type for loader operations
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Errors that can occur while loading or driving a module
#[derive(Debug, Error)]
pub enum LoaderError {
    // Artifact errors
    #[error("Failed to read artifact {}: {source}", .path.display())]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed module {}: {reason}", .path.display())]
    MalformedModule { path: PathBuf, reason: String },

    // Import errors
    #[error("Binding module for namespace '{namespace}' could not be resolved: {reason}")]
    BindingUnresolved { namespace: String, reason: String },

    #[error("Import {module}::{name} not satisfied: {reason}")]
    ImportMismatch {
        module: String,
        name: String,
        reason: String,
    },

    #[error("Instantiation failed: {0}")]
    Instantiation(String),

    // Runtime errors
    #[error("Export not found: {0}")]
    ExportNotFound(String),

    #[error("Export '{name}' has unexpected type: {reason}")]
    ExportType { name: String, reason: String },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Module threw: {0}")]
    Thrown(String),

    #[error("Memory access error: {0}")]
    Memory(String),

    // Setup errors
    #[error("Failed to create WASM engine: {0}")]
    Engine(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`LoaderError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Artifact missing or unreadable
    Io,
    /// Bytes are not a well-formed module
    Format,
    /// Import dependency could not be resolved
    Binding,
    /// Module imports not satisfied by the import table
    Instantiation,
    /// Failure while calling into a loaded instance
    Runtime,
    /// Engine or configuration problem
    Config,
}

impl LoaderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LoaderError::ArtifactRead { .. } | LoaderError::Io(_) => ErrorCategory::Io,
            LoaderError::MalformedModule { .. } => ErrorCategory::Format,
            LoaderError::BindingUnresolved { .. } => ErrorCategory::Binding,
            LoaderError::ImportMismatch { .. } | LoaderError::Instantiation(_) => {
                ErrorCategory::Instantiation
            }
            LoaderError::ExportNotFound(_)
            | LoaderError::ExportType { .. }
            | LoaderError::Execution(_)
            | LoaderError::Thrown(_)
            | LoaderError::Memory(_)
            | LoaderError::Serialization(_) => ErrorCategory::Runtime,
            LoaderError::Engine(_) | LoaderError::Config(_) => ErrorCategory::Config,
        }
    }

    /// The underlying I/O error, if this failure came from the filesystem
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            LoaderError::ArtifactRead { source, .. } => Some(source),
            LoaderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for LoaderError {
    fn from(e: serde_json::Error) -> Self {
        LoaderError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for LoaderError {
    fn from(e: toml::de::Error) -> Self {
        LoaderError::Config(e.to_string())
    }
}
