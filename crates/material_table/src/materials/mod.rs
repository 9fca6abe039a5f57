//! Material definition subsystem
//!
//! Parses declarative material scripts into immutable tables and resolves
//! mesh sub-material slots to shading records. Loading a directory of
//! asset groups goes through [`MaterialLibrary`].

pub mod material_record;
pub mod script_parser;
pub mod material_builder;
pub mod material_table;
pub mod material_loader;
pub mod material_library;
pub mod material_asset;

pub use material_record::{
    BlendOp, MaterialRecord, RawProperty, StageList, StageOutOfRange, MAX_STAGES,
};
pub use script_parser::{Assignment, RawRecord, ScriptParser};
pub use material_builder::MaterialBuilder;
pub use material_table::{MaterialTable, MeshBinding};
pub use material_loader::{DirectoryResolver, MaterialLoader, MaterialTexturePaths, TextureResolver};
pub use material_library::{GroupFailure, GroupHandle, LoadReport, MaterialGroup, MaterialLibrary};

use std::path::PathBuf;

use thiserror::Error;

/// Material loading errors
#[derive(Error, Debug)]
pub enum MaterialError {
    /// Structurally invalid block, missing `mapTo`, or a value that does not convert
    #[error("malformed material record{}: {reason}", location(.name, .line))]
    MalformedRecord {
        /// Record name, when the header was parsed
        name: Option<String>,
        /// 1-based source line
        line: Option<usize>,
        /// What was wrong
        reason: String,
    },

    /// Two records in one load share a name
    #[error("duplicate material name '{name}'{}", duplicate_location(.first_line, .line))]
    DuplicateName {
        /// The shared name
        name: String,
        /// Line of the first declaration
        first_line: Option<usize>,
        /// Line of the repeated declaration
        line: Option<usize>,
    },

    /// A mesh slot no record maps to; reported as a warning, never fatal
    #[error("no material maps to mesh slot '{slot}'")]
    UnresolvedSlot {
        /// Mesh sub-material slot name
        slot: String,
    },

    /// An asset group with this name is already loaded
    #[error("material group '{0}' is already loaded")]
    GroupExists(String),

    /// IO error while reading a material file
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Structured asset (RON) serialization or deserialization failed
    #[error("material asset error: {0}")]
    Export(String),
}

fn location(name: &Option<String>, line: &Option<usize>) -> String {
    match (name, line) {
        (Some(name), Some(line)) => format!(" '{name}' (line {line})"),
        (Some(name), None) => format!(" '{name}'"),
        (None, Some(line)) => format!(" (line {line})"),
        (None, None) => String::new(),
    }
}

fn duplicate_location(first_line: &Option<usize>, line: &Option<usize>) -> String {
    match (first_line, line) {
        (Some(first), Some(line)) => format!(" at line {line} (first declared at line {first})"),
        (None, Some(line)) => format!(" at line {line}"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MaterialError::MalformedRecord {
            name: Some("Foo".to_string()),
            line: Some(3),
            reason: "missing mapTo".to_string(),
        };
        assert_eq!(err.to_string(), "malformed material record 'Foo' (line 3): missing mapTo");

        let err = MaterialError::DuplicateName {
            name: "Foo".to_string(),
            first_line: Some(1),
            line: Some(7),
        };
        assert_eq!(
            err.to_string(),
            "duplicate material name 'Foo' at line 7 (first declared at line 1)"
        );

        let err = MaterialError::UnresolvedSlot { slot: "Bar".to_string() };
        assert_eq!(err.to_string(), "no material maps to mesh slot 'Bar'");
    }
}
