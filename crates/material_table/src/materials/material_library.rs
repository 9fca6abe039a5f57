//! Material library - per-asset-group ownership of material tables
//!
//! Each asset group (one shape directory with its `materials.cs`) owns one
//! [`MaterialTable`]. Groups are loaded independently: a parse error fails
//! only the group it occurs in, and unloading a group drops all of its
//! records at once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use slotmap::{new_key_type, SlotMap};
use walkdir::WalkDir;

use super::material_loader::MaterialLoader;
use super::material_record::MaterialRecord;
use super::material_table::{MaterialTable, MeshBinding};
use super::MaterialError;
use crate::config::LoaderConfig;

new_key_type! {
    /// Stable handle to a loaded asset group
    pub struct GroupHandle;
}

/// One loaded asset group
#[derive(Debug)]
pub struct MaterialGroup {
    name: String,
    table: MaterialTable,
}

impl MaterialGroup {
    /// Group name (the shape directory name for groups loaded from disk)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The group's material table
    pub fn table(&self) -> &MaterialTable {
        &self.table
    }

    /// File the group was loaded from
    pub fn path(&self) -> Option<&Path> {
        self.table.source()
    }
}

/// A file that failed to load as a group
#[derive(Debug)]
pub struct GroupFailure {
    /// File (or directory entry) that failed
    pub path: PathBuf,
    /// Why it failed
    pub error: MaterialError,
}

/// Outcome of loading a directory tree of asset groups
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Groups that loaded, in directory order
    pub loaded: Vec<GroupHandle>,
    /// Groups that failed; none of their records were kept
    pub failed: Vec<GroupFailure>,
}

impl LoadReport {
    /// True when nothing failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Collection of independently loaded material groups
#[derive(Debug, Default)]
pub struct MaterialLibrary {
    loader: MaterialLoader,
    groups: SlotMap<GroupHandle, MaterialGroup>,
    by_name: HashMap<String, GroupHandle>,
}

impl MaterialLibrary {
    /// Create an empty library
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            loader: MaterialLoader::new(config),
            groups: SlotMap::with_key(),
            by_name: HashMap::new(),
        }
    }

    /// Loader used for every group
    pub fn loader(&self) -> &MaterialLoader {
        &self.loader
    }

    /// Load a group from source text
    ///
    /// # Errors
    /// [`MaterialError::GroupExists`] if `name` is already loaded, or any
    /// error from parsing the source. The library is unchanged on error.
    pub fn load_group(&mut self, name: &str, source: &str) -> Result<GroupHandle, MaterialError> {
        self.ensure_vacant(name)?;
        let table = self.loader.load_str(source)?;
        Ok(self.insert(name, table))
    }

    /// Load a group from a file, named after the directory that holds it
    ///
    /// # Errors
    /// As for [`MaterialLibrary::load_group`], plus [`MaterialError::Io`].
    pub fn load_group_file(&mut self, path: impl AsRef<Path>) -> Result<GroupHandle, MaterialError> {
        let path = path.as_ref();
        // Group is named after its shape directory
        let name = Self::group_name(path);
        self.ensure_vacant(&name)?;
        let table = self.loader.load_file(path)?;
        Ok(self.insert(&name, table))
    }

    /// Load every group file under `root`
    ///
    /// Files are matched by the configured file name and visited in sorted
    /// order. A failing group is recorded in the report and skipped; it never
    /// prevents other groups from loading.
    ///
    /// # Arguments
    /// * `root` - Directory tree holding one subdirectory per asset group
    ///
    /// # Returns
    /// Handles of the loaded groups and the files that failed
    pub fn load_dir(&mut self, root: impl AsRef<Path>) -> LoadReport {
        let root = root.as_ref();
        let mut report = LoadReport::default();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                    let error = MaterialError::Io {
                        path: path.clone(),
                        source: err.into(),
                    };
                    warn!("Skipping {}: {}", path.display(), error);
                    report.failed.push(GroupFailure { path, error });
                    continue;
                }
            };

            // Only the configured material file marks a group
            if !entry.file_type().is_file() || entry.file_name() != self.loader.config().file_name.as_str() {
                continue;
            }

            match self.load_group_file(entry.path()) {
                Ok(handle) => report.loaded.push(handle),
                Err(error) => {
                    warn!("Material group {} failed to load: {}", entry.path().display(), error);
                    report.failed.push(GroupFailure {
                        path: entry.path().to_path_buf(),
                        error,
                    });
                }
            }
        }

        info!(
            "Loaded {} material group(s) from {} ({} failed)",
            report.loaded.len(),
            root.display(),
            report.failed.len()
        );
        report
    }

    /// Drop a group and all of its records
    pub fn unload_group(&mut self, handle: GroupHandle) -> Option<MaterialGroup> {
        let group = self.groups.remove(handle)?;
        self.by_name.remove(&group.name);
        info!("Unloaded material group '{}' ({} material(s))", group.name, group.table.len());
        Some(group)
    }

    /// Drop every group
    pub fn clear(&mut self) {
        info!("Unloading all {} material group(s)", self.groups.len());
        self.groups.clear();
        self.by_name.clear();
    }

    /// Group behind `handle`
    pub fn group(&self, handle: GroupHandle) -> Option<&MaterialGroup> {
        self.groups.get(handle)
    }

    /// Handle of the group called `name`
    pub fn handle(&self, name: &str) -> Option<GroupHandle> {
        self.by_name.get(name).copied()
    }

    /// Group called `name`
    pub fn group_by_name(&self, name: &str) -> Option<&MaterialGroup> {
        self.handle(name).and_then(|handle| self.group(handle))
    }

    /// Resolve a mesh slot within one group's slot namespace
    pub fn resolve(&self, handle: GroupHandle, mesh_slot: &str) -> Option<&MaterialRecord> {
        self.group(handle)?.table.resolve(mesh_slot)
    }

    /// Bind a mesh's slots against one group
    pub fn bind_mesh<I, S>(&self, handle: GroupHandle, mesh_slots: I) -> Option<MeshBinding<'_>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.group(handle).map(|group| group.table.bind_mesh(mesh_slots))
    }

    /// Loaded groups
    pub fn iter(&self) -> impl Iterator<Item = (GroupHandle, &MaterialGroup)> + '_ {
        self.groups.iter()
    }

    /// Number of loaded groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True when no group is loaded
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total records across all groups
    pub fn material_count(&self) -> usize {
        self.groups.values().map(|group| group.table.len()).sum()
    }

    fn group_name(path: &Path) -> String {
        path.parent()
            .and_then(Path::file_name)
            .or_else(|| path.file_stem())
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
    }

    fn ensure_vacant(&self, name: &str) -> Result<(), MaterialError> {
        if self.by_name.contains_key(name) {
            Err(MaterialError::GroupExists(name.to_string()))
        } else {
            Ok(())
        }
    }

    fn insert(&mut self, name: &str, table: MaterialTable) -> GroupHandle {
        info!("Loaded material group '{}' ({} material(s))", name, table.len());
        let handle = self.groups.insert(MaterialGroup {
            name: name.to_string(),
            table,
        });
        self.by_name.insert(name.to_string(), handle);
        handle
    }
}
