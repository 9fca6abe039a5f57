//! Structured material assets
//!
//! A loaded table can be exported to RON and read back without going
//! through the script parser. Imported records are held to the same value
//! rules as parsed ones.

use log::debug;
use serde::{Deserialize, Serialize};

use super::material_record::MaterialRecord;
use super::material_table::MaterialTable;
use super::MaterialError;

/// Current asset format version
pub const ASSET_VERSION: u32 = 1;

/// On-disk form of a material table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialAsset {
    /// Format version, must equal [`ASSET_VERSION`]
    pub version: u32,
    /// Records in declaration order
    pub materials: Vec<MaterialRecord>,
}

impl From<&MaterialTable> for MaterialAsset {
    fn from(table: &MaterialTable) -> Self {
        Self {
            version: ASSET_VERSION,
            materials: table.iter().cloned().collect(),
        }
    }
}

/// Serialize a table to pretty-printed RON
///
/// # Errors
/// [`MaterialError::Export`] if serialization fails.
pub fn to_ron(table: &MaterialTable) -> Result<String, MaterialError> {
    let asset = MaterialAsset::from(table);
    ron::ser::to_string_pretty(&asset, ron::ser::PrettyConfig::default())
        .map_err(|e| MaterialError::Export(e.to_string()))
}

/// Build a table from RON produced by [`to_ron`]
///
/// # Errors
/// [`MaterialError::Export`] for unreadable RON or an unknown version,
/// [`MaterialError::MalformedRecord`] for a record that breaks a value rule,
/// and [`MaterialError::DuplicateName`] as for script loading.
pub fn from_ron(source: &str) -> Result<MaterialTable, MaterialError> {
    let asset: MaterialAsset = ron::from_str(source).map_err(|e| MaterialError::Export(e.to_string()))?;

    // Check format version
    if asset.version != ASSET_VERSION {
        return Err(MaterialError::Export(format!(
            "unsupported material asset version {} (expected {})",
            asset.version, ASSET_VERSION
        )));
    }

    // Hold imported records to the parser's value rules
    for record in &asset.materials {
        record.validate().map_err(|reason| MaterialError::MalformedRecord {
            name: Some(record.name().to_string()),
            line: None,
            reason,
        })?;
    }

    debug!("Imported {} material(s) from RON asset", asset.materials.len());
    MaterialTable::from_records(asset.materials.into_iter().map(|record| (record, None)))
}
