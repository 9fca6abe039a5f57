//! # Material Table
//!
//! Declarative material definitions for environment prop packs.
//!
//! Each asset group ships a `materials.cs` script of `Material` blocks. A
//! block names a shading record and binds it to a mesh sub-material slot
//! through `mapTo`; the renderer looks records up by that slot when it
//! draws a mesh.
//!
//! ## Features
//!
//! - **Script Parsing**: `singleton Material(Name) { key[stage] = "value"; };` blocks with line-accurate errors
//! - **Immutable Tables**: Built once, then shared read-only between threads
//! - **Slot Resolution**: Mesh slots resolve to records, with fallback and warnings for unmapped slots
//! - **Asset Groups**: Directory scanning with per-group failure isolation and unloading
//! - **RON Assets**: Export and re-import of loaded tables
//!
//! ## Quick Start
//!
//! ```rust
//! use material_table::prelude::*;
//!
//! let table = MaterialTable::load(r#"Material(Foo){ mapTo="Bar"; specularPower[0]="64"; }"#)?;
//!
//! let record = table.resolve("Bar").expect("Bar is mapped");
//! assert_eq!(record.name(), "Foo");
//! assert_eq!(record.specular_power(0), 64.0);
//! assert!(table.resolve("Baz").is_none());
//! # Ok::<(), MaterialError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names)]

pub mod foundation;
pub mod config;
pub mod materials;

pub use config::{Config, ConfigError, LoaderConfig};
pub use materials::{MaterialError, MaterialRecord, MaterialTable};

/// Common imports for material table users
pub mod prelude {
    pub use crate::{
        config::{Config, LoaderConfig},
        foundation::math::Color,
        materials::{
            BlendOp, MaterialError, MaterialLibrary, MaterialLoader, MaterialRecord, MaterialTable,
            MeshBinding, MAX_STAGES,
        },
    };
}
