//! Material loader with file support
//!
//! Reads material scripts (or exported RON assets) from disk and resolves
//! the texture references a record carries into file paths.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::material_asset;
use super::material_record::{MaterialRecord, StageList};
use super::material_table::MaterialTable;
use super::MaterialError;
use crate::config::LoaderConfig;

/// Turns a texture reference from a material into a file on disk
///
/// The hosting engine's asset system normally sits behind this trait; the
/// table itself never opens texture files.
pub trait TextureResolver {
    /// Path for `reference`, or `None` if it cannot be found
    fn resolve(&self, reference: &str) -> Option<PathBuf>;
}

/// Resolves references relative to one directory, trying known extensions
/// for bare asset names
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    base_dir: PathBuf,
    extensions: Vec<String>,
}

impl DirectoryResolver {
    /// Resolver rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            extensions,
        }
    }

    /// Resolver for textures that sit beside a material file
    pub fn beside(material_file: &Path, config: &LoaderConfig) -> Self {
        Self::new(
            MaterialLoader::texture_directory(material_file),
            config.texture_extensions.clone(),
        )
    }

    /// Directory references are resolved against
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl TextureResolver for DirectoryResolver {
    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let path = MaterialLoader::resolve_texture_path(&self.base_dir, reference);
        if path.extension().is_some() {
            return path.is_file().then_some(path);
        }

        self.extensions
            .iter()
            .map(|ext| path.with_extension(ext))
            .find(|candidate| candidate.is_file())
    }
}

/// Texture files for every staged map of one record
#[derive(Debug, Clone, Default)]
pub struct MaterialTexturePaths {
    /// Resolved diffuse textures per stage
    pub diffuse: StageList<PathBuf>,
    /// Resolved normal maps per stage
    pub normal: StageList<PathBuf>,
    /// References the resolver could not find
    pub missing: Vec<String>,
}

impl MaterialTexturePaths {
    /// True when every reference resolved
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Loads material tables from files
#[derive(Debug, Clone, Default)]
pub struct MaterialLoader {
    config: LoaderConfig,
}

impl MaterialLoader {
    /// Loader with the given settings
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Settings in use
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load a material table from source text
    ///
    /// # Errors
    /// See [`MaterialTable::load`].
    pub fn load_str(&self, source: &str) -> Result<MaterialTable, MaterialError> {
        MaterialTable::load_with_config(source, &self.config)
    }

    /// Load a material table from a file
    ///
    /// `.ron` files are read as exported material assets; anything else is
    /// parsed as material script.
    ///
    /// # Arguments
    /// * `path` - Path to a `materials.cs` script or an exported `.ron` asset
    ///
    /// # Returns
    /// The loaded table, remembering `path` as its source
    ///
    /// # Errors
    /// [`MaterialError::Io`] when the file cannot be read, otherwise the
    /// same errors as [`MaterialTable::load`].
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<MaterialTable, MaterialError> {
        let path = path.as_ref();

        // Read material file
        let contents = fs::read_to_string(path).map_err(|source| MaterialError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // Pick the format from the extension
        let is_asset = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ron"));
        let table = if is_asset {
            material_asset::from_ron(&contents)?
        } else {
            self.load_str(&contents)?
        };

        info!("Loaded {} material(s) from {}", table.len(), path.display());
        Ok(table.with_source(path))
    }

    /// Resolve the staged diffuse and normal maps of `record`
    ///
    /// # Arguments
    /// * `record` - Material whose texture references to resolve
    /// * `resolver` - Lookup from texture reference to file
    ///
    /// # Returns
    /// Resolved paths at their original stages, plus every reference that
    /// could not be found
    pub fn texture_paths(record: &MaterialRecord, resolver: &dyn TextureResolver) -> MaterialTexturePaths {
        let mut missing = Vec::new();
        let mut resolve = |reference: &String| {
            let path = resolver.resolve(reference);
            if path.is_none() {
                missing.push(reference.clone());
            }
            path
        };

        let diffuse = record.diffuse_maps().filter_map(&mut resolve);
        let normal = record.normal_maps().filter_map(&mut resolve);

        if !missing.is_empty() {
            debug!("Material '{}' has unresolved textures: {:?}", record.name(), missing);
        }
        MaterialTexturePaths { diffuse, normal, missing }
    }

    /// Directory containing a material file (for resolving relative texture paths)
    pub fn texture_directory(material_path: &Path) -> PathBuf {
        material_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }

    /// Resolve a texture reference relative to a base directory
    ///
    /// Absolute references are returned unchanged.
    pub fn resolve_texture_path(base_dir: &Path, reference: &str) -> PathBuf {
        let reference = Path::new(reference);
        if reference.is_absolute() {
            return reference.to_path_buf();
        }
        base_dir.join(reference)
    }
}
