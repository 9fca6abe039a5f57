//! Material table
//!
//! An immutable set of [`MaterialRecord`]s for one asset group, indexed by
//! unique name and by the mesh slot each record maps to. Built once by
//! [`MaterialTable::load`]; read-only afterwards, so a table can be shared
//! between threads without locking.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::material_builder::MaterialBuilder;
use super::material_record::{MaterialRecord, FALLBACK_NAME};
use super::script_parser::ScriptParser;
use super::MaterialError;
use crate::config::LoaderConfig;

/// Name- and slot-indexed material records for one asset group
#[derive(Debug, Clone, Default)]
pub struct MaterialTable {
    /// Records in declaration order
    records: Vec<MaterialRecord>,
    /// name -> index into `records`
    by_name: HashMap<String, usize>,
    /// mapTo -> index of the last record declaring it
    by_slot: HashMap<String, usize>,
    /// File the table was loaded from, if any
    source: Option<PathBuf>,
}

impl MaterialTable {
    /// Parse material script source with default loader settings
    ///
    /// # Errors
    /// [`MaterialError::MalformedRecord`] for a structurally invalid block or
    /// a record without `mapTo`; [`MaterialError::DuplicateName`] when two
    /// records share a name. No partial table is produced.
    pub fn load(source: &str) -> Result<Self, MaterialError> {
        Self::load_with_config(source, &LoaderConfig::default())
    }

    /// Parse material script source
    ///
    /// # Errors
    /// See [`MaterialTable::load`].
    pub fn load_with_config(source: &str, config: &LoaderConfig) -> Result<Self, MaterialError> {
        // Parse block structure
        let raw_records = ScriptParser::parse(source)?;

        // Convert values per property type
        let mut records = Vec::with_capacity(raw_records.len());
        for raw in &raw_records {
            let record = MaterialBuilder::from_raw(raw, config)?;
            debug!("Parsed material '{}' -> slot '{}'", record.name(), record.map_to());
            records.push((record, Some(raw.line)));
        }

        Self::from_records(records)
    }

    /// Index already-built records, rejecting duplicate names
    ///
    /// Each record may carry the source line it was declared on, used only
    /// for error reporting.
    pub(crate) fn from_records(
        records: impl IntoIterator<Item = (MaterialRecord, Option<usize>)>,
    ) -> Result<Self, MaterialError> {
        let mut table = Self::default();
        let mut lines: Vec<Option<usize>> = Vec::new();

        for (record, line) in records {
            let index = table.records.len();

            // Names are unique within a table
            if let Some(&existing) = table.by_name.get(record.name()) {
                return Err(MaterialError::DuplicateName {
                    name: record.name().to_string(),
                    first_line: lines[existing],
                    line,
                });
            }

            table.by_name.insert(record.name().to_string(), index);

            // Later records take over the slot
            if let Some(previous) = table.by_slot.insert(record.map_to().to_string(), index) {
                debug!(
                    "Slot '{}' rebound from '{}' to '{}'",
                    record.map_to(),
                    table.records[previous].name(),
                    record.name()
                );
            }
            table.records.push(record);
            lines.push(line);
        }

        Ok(table)
    }

    /// Record the file this table came from
    pub(crate) fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Record bound to a mesh sub-material slot
    ///
    /// When several records map to the same slot, the one declared last wins.
    pub fn resolve(&self, mesh_slot: &str) -> Option<&MaterialRecord> {
        self.by_slot.get(mesh_slot).map(|&index| &self.records[index])
    }

    /// Record with the given unique name
    pub fn get(&self, name: &str) -> Option<&MaterialRecord> {
        self.by_name.get(name).map(|&index| &self.records[index])
    }

    /// Bind every slot a mesh declares to a record
    ///
    /// Slots without a record fall back to [`MaterialRecord::fallback`] and
    /// are reported as [`MaterialError::UnresolvedSlot`] warnings.
    pub fn bind_mesh<I, S>(&self, mesh_slots: I) -> MeshBinding<'_>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut binding = MeshBinding::default();

        for slot in mesh_slots {
            let slot = slot.as_ref();
            let material = match self.resolve(slot) {
                Some(record) => Cow::Borrowed(record),
                None => {
                    warn!("No material maps to mesh slot '{}', using {}", slot, FALLBACK_NAME);
                    binding.unresolved.push(MaterialError::UnresolvedSlot {
                        slot: slot.to_string(),
                    });
                    Cow::Owned(MaterialRecord::fallback())
                }
            };
            binding.slots.push((slot.to_string(), material));
        }

        binding
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the table holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &MaterialRecord> + '_ {
        self.records.iter()
    }

    /// Record names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.records.iter().map(MaterialRecord::name)
    }

    /// Distinct mesh slots the table can resolve
    pub fn slots(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_slot.keys().map(String::as_str)
    }

    /// File the table was loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl<'a> IntoIterator for &'a MaterialTable {
    type Item = &'a MaterialRecord;
    type IntoIter = std::slice::Iter<'a, MaterialRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Result of binding a mesh's sub-material slots
#[derive(Debug, Default)]
pub struct MeshBinding<'a> {
    slots: Vec<(String, Cow<'a, MaterialRecord>)>,
    unresolved: Vec<MaterialError>,
}

impl MeshBinding<'_> {
    /// Material bound to `slot`
    pub fn material(&self, slot: &str) -> Option<&MaterialRecord> {
        self.slots
            .iter()
            .find(|(name, _)| name == slot)
            .map(|(_, material)| material.as_ref())
    }

    /// `(slot, material)` pairs in the order the slots were given
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MaterialRecord)> + '_ {
        self.slots
            .iter()
            .map(|(slot, material)| (slot.as_str(), material.as_ref()))
    }

    /// Warnings for slots that fell back to the default material
    pub fn unresolved(&self) -> &[MaterialError] {
        &self.unresolved
    }

    /// True when every slot found a record
    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Number of bound slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no slots were bound
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TEMPLE_RUIN: &str = r#"
singleton Material(TempleRuin_02_ConcreteStain1)
{
   mapTo = "ConcreteStain1";
   diffuseMap[0] = "3td_ConcreteStain_01";
   specular[0] = "0.9 0.9 0.9 1";
   specularPower[0] = "64";
   translucentBlendOp = "None";
   normalMap[0] = "3td_BrickOldSharp_01_NRM.png";
   useAnisotropic[0] = "1";
   pixelSpecular[0] = "1";
};

singleton Material(TempleRuin_02_ColorEffectR153G228B214_material)
{
   mapTo = "ColorEffectR153G228B214-material";
   diffuseColor[0] = "0.6 0.894118 0.839216 1";
   specularPower[0] = "10";
   translucentBlendOp = "None";
};
"#;

    #[test]
    fn test_load_and_resolve_compact_record() {
        let table = MaterialTable::load(r#"Material(Foo){ mapTo="Bar"; specularPower[0]="64"; }"#).unwrap();
        let record = table.resolve("Bar").unwrap();

        assert_eq!(record.name(), "Foo");
        assert_relative_eq!(record.specular_power(0), 64.0);
        assert!(!record.double_sided());
        assert!(!record.alpha_test());
        assert_eq!(record.diffuse_map(0), None);
    }

    #[test]
    fn test_every_record_resolves_by_own_slot() {
        let table = MaterialTable::load(TEMPLE_RUIN).unwrap();
        assert_eq!(table.len(), 2);

        for record in &table {
            let resolved = table.resolve(record.map_to()).unwrap();
            assert_eq!(resolved, record);
            assert_eq!(table.get(record.name()), Some(record));
        }
    }

    #[test]
    fn test_duplicate_slot_last_declared_wins() {
        let source = r#"
Material(First) { mapTo = "Bar"; specularPower[0] = "10"; };
Material(Second) { mapTo = "Bar"; specularPower[0] = "99"; };
"#;
        let table = MaterialTable::load(source).unwrap();
        let record = table.resolve("Bar").unwrap();

        assert_eq!(record.name(), "Second");
        assert_relative_eq!(record.specular_power(0), 99.0);
        // The shadowed record is still reachable by name.
        assert_eq!(table.get("First").unwrap().map_to(), "Bar");
        assert_eq!(table.slots().count(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let source = "Material(Foo) { mapTo = \"A\"; };\nMaterial(Foo) { mapTo = \"B\"; };";
        match MaterialTable::load(source) {
            Err(MaterialError::DuplicateName { name, first_line, line }) => {
                assert_eq!(name, "Foo");
                assert_eq!(first_line, Some(1));
                assert_eq!(line, Some(2));
            }
            other => panic!("expected DuplicateName, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_map_to_produces_no_table() {
        let source = r#"
Material(Good) { mapTo = "Good"; };
Material(Bad) { specularPower[0] = "64"; };
"#;
        let result = MaterialTable::load(source);
        assert!(matches!(
            result,
            Err(MaterialError::MalformedRecord { ref name, line: Some(3), .. }) if name.as_deref() == Some("Bad")
        ));
    }

    #[test]
    fn test_lookup_misses() {
        let table = MaterialTable::load(TEMPLE_RUIN).unwrap();
        assert!(table.resolve("Nope").is_none());
        assert!(table.get("ConcreteStain1").is_none());
        assert!(table.resolve("TempleRuin_02_ConcreteStain1").is_none());
    }

    #[test]
    fn test_empty_source_gives_empty_table() {
        let table = MaterialTable::load("").unwrap();
        assert!(table.is_empty());
        assert!(table.source().is_none());
    }

    #[test]
    fn test_bind_mesh_with_fallback() {
        let table = MaterialTable::load(TEMPLE_RUIN).unwrap();
        let binding = table.bind_mesh(["ConcreteStain1", "MissingSlot"]);

        assert_eq!(binding.len(), 2);
        assert_eq!(
            binding.material("ConcreteStain1").unwrap().name(),
            "TempleRuin_02_ConcreteStain1"
        );
        assert_eq!(binding.material("MissingSlot").unwrap().name(), FALLBACK_NAME);
        assert!(!binding.is_fully_resolved());
        assert!(matches!(
            &binding.unresolved()[0],
            MaterialError::UnresolvedSlot { slot } if slot == "MissingSlot"
        ));

        let order: Vec<&str> = binding.iter().map(|(slot, _)| slot).collect();
        assert_eq!(order, vec!["ConcreteStain1", "MissingSlot"]);
    }

    #[test]
    fn test_names_in_declaration_order() {
        let table = MaterialTable::load(TEMPLE_RUIN).unwrap();
        let names: Vec<&str> = table.names().collect();
        assert_eq!(
            names,
            vec![
                "TempleRuin_02_ConcreteStain1",
                "TempleRuin_02_ColorEffectR153G228B214_material"
            ]
        );
    }

    #[test]
    fn test_table_is_shareable_across_threads() {
        let table = std::sync::Arc::new(MaterialTable::load(TEMPLE_RUIN).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let table = std::sync::Arc::clone(&table);
                std::thread::spawn(move || table.resolve("ConcreteStain1").map(|r| r.name().to_string()))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().as_deref(), Some("TempleRuin_02_ConcreteStain1"));
        }
    }
}
