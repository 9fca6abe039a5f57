//! Material record types
//!
//! A [`MaterialRecord`] is one fully typed shading definition bound to a mesh
//! sub-material slot through its `map_to` name. Records are plain immutable
//! values: the table hands out shared references and nothing mutates a record
//! after it has been built.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::foundation::math::{self, Color};

/// Number of texture stages a material can describe
pub const MAX_STAGES: usize = 4;

/// Default specular exponent when `specularPower` is not set
pub const DEFAULT_SPECULAR_POWER: f32 = 8.0;

/// Default alpha-test threshold when `alphaRef` is not set
pub const DEFAULT_ALPHA_REF: u8 = 1;

/// Default sub-surface scattering tint when `subSurfaceColor` is not set
pub const DEFAULT_SUB_SURFACE_COLOR: [f32; 4] = [1.0, 0.2, 0.2, 1.0];

/// Name and slot of the material bound to unresolved mesh slots
pub const FALLBACK_NAME: &str = "DefaultMaterial";
/// Slot name carried by the fallback material
pub const FALLBACK_SLOT: &str = "unmapped_mat";

/// Stage index outside `0..MAX_STAGES`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOutOfRange(pub usize);

impl fmt::Display for StageOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {} is out of range (materials have {} stages)", self.0, MAX_STAGES)
    }
}

impl std::error::Error for StageOutOfRange {}

/// Ordered, fixed-capacity list of per-stage values
///
/// Stage `i` is either unset or holds one value. Serialized as a list of
/// optional values with trailing unset stages dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    into = "Vec<Option<T>>",
    try_from = "Vec<Option<T>>",
    bound(serialize = "T: Clone + Serialize", deserialize = "T: Deserialize<'de>")
)]
pub struct StageList<T> {
    stages: [Option<T>; MAX_STAGES],
}

impl<T> StageList<T> {
    /// Create a list with every stage unset
    pub fn new() -> Self {
        Self {
            stages: std::array::from_fn(|_| None),
        }
    }

    /// Value at `stage`, if set
    pub fn get(&self, stage: usize) -> Option<&T> {
        self.stages.get(stage).and_then(Option::as_ref)
    }

    /// Set the value at `stage`, replacing any previous value
    pub fn set(&mut self, stage: usize, value: T) -> Result<(), StageOutOfRange> {
        let slot = self.stages.get_mut(stage).ok_or(StageOutOfRange(stage))?;
        *slot = Some(value);
        Ok(())
    }

    /// Whether `stage` holds a value
    pub fn is_set(&self, stage: usize) -> bool {
        self.get(stage).is_some()
    }

    /// Iterate `(stage, value)` pairs for the stages that are set, in stage order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.stages
            .iter()
            .enumerate()
            .filter_map(|(stage, value)| value.as_ref().map(|v| (stage, v)))
    }

    /// Map every set stage, keeping it at the same index; stages mapped to `None` become unset
    pub fn filter_map<U>(&self, mut f: impl FnMut(&T) -> Option<U>) -> StageList<U> {
        StageList {
            stages: std::array::from_fn(|stage| self.stages[stage].as_ref().and_then(&mut f)),
        }
    }

    /// Number of stages that hold a value
    pub fn len(&self) -> usize {
        self.stages.iter().filter(|v| v.is_some()).count()
    }

    /// True when no stage is set
    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(Option::is_none)
    }

    /// One past the highest stage that is set (0 when empty)
    pub fn extent(&self) -> usize {
        self.stages
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |last| last + 1)
    }
}

impl<T> Default for StageList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<StageList<T>> for Vec<Option<T>> {
    fn from(list: StageList<T>) -> Self {
        let extent = list.extent();
        list.stages.into_iter().take(extent).collect()
    }
}

impl<T> TryFrom<Vec<Option<T>>> for StageList<T> {
    type Error = StageOutOfRange;

    fn try_from(values: Vec<Option<T>>) -> Result<Self, Self::Error> {
        let mut list = Self::new();
        for (stage, value) in values.into_iter().enumerate() {
            match value {
                Some(value) => list.set(stage, value)?,
                None if stage >= MAX_STAGES => return Err(StageOutOfRange(stage)),
                None => {}
            }
        }
        Ok(list)
    }
}

/// Blend function used when compositing a translucent surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendOp {
    /// Opaque, no blending
    #[default]
    None,
    /// Multiply source and destination
    Mul,
    /// Premultiplied alpha
    PreMul,
    /// Additive
    Add,
    /// Additive weighted by source alpha
    AddAlpha,
    /// Subtractive
    Sub,
    /// Standard alpha interpolation
    LerpAlpha,
}

impl BlendOp {
    /// Every blend op, in declaration order
    pub const ALL: [Self; 7] = [
        Self::None,
        Self::Mul,
        Self::PreMul,
        Self::Add,
        Self::AddAlpha,
        Self::Sub,
        Self::LerpAlpha,
    ];

    /// Name used in material scripts
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Mul => "Mul",
            Self::PreMul => "PreMul",
            Self::Add => "Add",
            Self::AddAlpha => "AddAlpha",
            Self::Sub => "Sub",
            Self::LerpAlpha => "LerpAlpha",
        }
    }
}

impl FromStr for BlendOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown blend op '{s}'"))
    }
}

impl fmt::Display for BlendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Property the table does not interpret, kept verbatim for the renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProperty {
    /// Key as written in the source
    pub key: String,
    /// Stage index, when the key was written as `key[n]`
    pub stage: Option<usize>,
    /// Unconverted string value
    pub value: String,
}

/// One shading definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub(crate) name: String,
    pub(crate) map_to: String,
    #[serde(default)]
    pub(crate) diffuse_map: StageList<String>,
    #[serde(default)]
    pub(crate) normal_map: StageList<String>,
    #[serde(default)]
    pub(crate) diffuse_color: StageList<Color>,
    #[serde(default)]
    pub(crate) specular: StageList<Color>,
    #[serde(default)]
    pub(crate) specular_power: StageList<f32>,
    #[serde(default)]
    pub(crate) pixel_specular: StageList<bool>,
    #[serde(default)]
    pub(crate) use_anisotropic: StageList<bool>,
    #[serde(default)]
    pub(crate) sub_surface: StageList<bool>,
    #[serde(default)]
    pub(crate) sub_surface_color: StageList<Color>,
    #[serde(default)]
    pub(crate) translucent_blend_op: BlendOp,
    #[serde(default)]
    pub(crate) double_sided: bool,
    #[serde(default)]
    pub(crate) alpha_test: bool,
    #[serde(default = "default_alpha_ref")]
    pub(crate) alpha_ref: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) extra: Vec<RawProperty>,
}

const fn default_alpha_ref() -> u8 {
    DEFAULT_ALPHA_REF
}

impl MaterialRecord {
    /// Empty record with every optional property at its default
    pub(crate) fn empty(name: impl Into<String>, map_to: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            map_to: map_to.into(),
            diffuse_map: StageList::new(),
            normal_map: StageList::new(),
            diffuse_color: StageList::new(),
            specular: StageList::new(),
            specular_power: StageList::new(),
            pixel_specular: StageList::new(),
            use_anisotropic: StageList::new(),
            sub_surface: StageList::new(),
            sub_surface_color: StageList::new(),
            translucent_blend_op: BlendOp::None,
            double_sided: false,
            alpha_test: false,
            alpha_ref: DEFAULT_ALPHA_REF,
            extra: Vec::new(),
        }
    }

    /// Material substituted for mesh slots that no record maps to
    pub fn fallback() -> Self {
        Self::empty(FALLBACK_NAME, FALLBACK_SLOT)
    }

    /// Unique symbolic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mesh sub-material slot this record binds to
    pub fn map_to(&self) -> &str {
        &self.map_to
    }

    /// Diffuse texture reference for `stage`
    pub fn diffuse_map(&self, stage: usize) -> Option<&str> {
        self.diffuse_map.get(stage).map(String::as_str)
    }

    /// All staged diffuse texture references
    pub fn diffuse_maps(&self) -> &StageList<String> {
        &self.diffuse_map
    }

    /// Normal map reference for `stage`
    pub fn normal_map(&self, stage: usize) -> Option<&str> {
        self.normal_map.get(stage).map(String::as_str)
    }

    /// All staged normal map references
    pub fn normal_maps(&self) -> &StageList<String> {
        &self.normal_map
    }

    /// Diffuse color for `stage` (white when unset)
    pub fn diffuse_color(&self, stage: usize) -> Color {
        self.diffuse_color
            .get(stage)
            .copied()
            .unwrap_or_else(|| Color::from(math::WHITE))
    }

    /// Specular color for `stage` (white when unset)
    pub fn specular(&self, stage: usize) -> Color {
        self.specular
            .get(stage)
            .copied()
            .unwrap_or_else(|| Color::from(math::WHITE))
    }

    /// Specular exponent for `stage`
    pub fn specular_power(&self, stage: usize) -> f32 {
        self.specular_power
            .get(stage)
            .copied()
            .unwrap_or(DEFAULT_SPECULAR_POWER)
    }

    /// Per-pixel specular lighting for `stage`
    pub fn pixel_specular(&self, stage: usize) -> bool {
        self.pixel_specular.get(stage).copied().unwrap_or(false)
    }

    /// Anisotropic texture filtering for `stage`
    pub fn use_anisotropic(&self, stage: usize) -> bool {
        self.use_anisotropic.get(stage).copied().unwrap_or(false)
    }

    /// Sub-surface scattering for `stage`
    pub fn sub_surface(&self, stage: usize) -> bool {
        self.sub_surface.get(stage).copied().unwrap_or(false)
    }

    /// Sub-surface tint for `stage`; only meaningful when [`Self::sub_surface`] is on
    pub fn sub_surface_color(&self, stage: usize) -> Color {
        self.sub_surface_color
            .get(stage)
            .copied()
            .unwrap_or_else(|| Color::from(DEFAULT_SUB_SURFACE_COLOR))
    }

    /// Blend function for translucent compositing
    pub fn translucent_blend_op(&self) -> BlendOp {
        self.translucent_blend_op
    }

    /// Render both faces
    pub fn double_sided(&self) -> bool {
        self.double_sided
    }

    /// Discard fragments whose alpha falls below [`Self::alpha_ref`]
    pub fn alpha_test(&self) -> bool {
        self.alpha_test
    }

    /// Alpha-test threshold
    pub fn alpha_ref(&self) -> u8 {
        self.alpha_ref
    }

    /// Uninterpreted property value for `key` (case-insensitive) at `stage`
    pub fn extra(&self, key: &str, stage: Option<usize>) -> Option<&str> {
        self.extra
            .iter()
            .find(|p| p.stage == stage && p.key.eq_ignore_ascii_case(key))
            .map(|p| p.value.as_str())
    }

    /// Every uninterpreted property, in declaration order
    pub fn extras(&self) -> &[RawProperty] {
        &self.extra
    }

    /// True when the blend op composites the surface over what is behind it
    pub fn is_translucent(&self) -> bool {
        self.translucent_blend_op != BlendOp::None
    }

    /// True when `stage` samples a diffuse texture rather than a flat color
    pub fn has_diffuse_texture(&self, stage: usize) -> bool {
        self.diffuse_map.is_set(stage)
    }

    /// True when `stage` has a normal map bound
    pub fn has_normal_map(&self, stage: usize) -> bool {
        self.normal_map.is_set(stage)
    }

    /// Number of stages any staged property uses
    pub fn stage_count(&self) -> usize {
        [
            self.diffuse_map.extent(),
            self.normal_map.extent(),
            self.diffuse_color.extent(),
            self.specular.extent(),
            self.specular_power.extent(),
            self.pixel_specular.extent(),
            self.use_anisotropic.extent(),
            self.sub_surface.extent(),
            self.sub_surface_color.extent(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Check value-level invariants for records that did not come through the parser
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("material has no name".to_string());
        }
        if self.map_to.trim().is_empty() {
            return Err("missing mapTo".to_string());
        }
        for (stage, power) in self.specular_power.iter() {
            if !power.is_finite() || *power <= 0.0 {
                return Err(format!("specularPower[{stage}] must be a positive number, got {power}"));
            }
        }
        let colors = [
            ("diffuseColor", &self.diffuse_color),
            ("specular", &self.specular),
            ("subSurfaceColor", &self.sub_surface_color),
        ];
        for (key, list) in colors {
            for (stage, color) in list.iter() {
                if !math::is_normalized(color) {
                    return Err(format!("{key}[{stage}] has channels outside [0, 1]"));
                }
            }
        }
        Ok(())
    }

    /// Insert or replace an uninterpreted property
    pub(crate) fn push_extra(&mut self, key: &str, stage: Option<usize>, value: String) {
        match self
            .extra
            .iter_mut()
            .find(|p| p.stage == stage && p.key.eq_ignore_ascii_case(key))
        {
            Some(existing) => existing.value = value,
            None => self.extra.push(RawProperty {
                key: key.to_string(),
                stage,
                value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stage_list_set_and_get() {
        let mut list = StageList::new();
        assert!(list.is_empty());

        list.set(0, "base".to_string()).unwrap();
        list.set(2, "detail".to_string()).unwrap();

        assert_eq!(list.get(0).map(String::as_str), Some("base"));
        assert_eq!(list.get(1), None);
        assert_eq!(list.len(), 2);
        assert_eq!(list.extent(), 3);

        let stages: Vec<usize> = list.iter().map(|(stage, _)| stage).collect();
        assert_eq!(stages, vec![0, 2]);
    }

    #[test]
    fn test_stage_list_filter_map_keeps_indices() {
        let mut list = StageList::new();
        list.set(0, "a".to_string()).unwrap();
        list.set(2, "bb".to_string()).unwrap();
        list.set(3, "ccc".to_string()).unwrap();

        let lengths = list.filter_map(|s| (s.len() > 1).then_some(s.len()));
        assert_eq!(lengths.get(0), None);
        assert_eq!(lengths.get(2), Some(&2));
        assert_eq!(lengths.get(3), Some(&3));
        assert_eq!(lengths.len(), 2);
    }

    #[test]
    fn test_stage_list_rejects_out_of_range() {
        let mut list = StageList::new();
        assert_eq!(list.set(MAX_STAGES, 1.0_f32), Err(StageOutOfRange(MAX_STAGES)));
        assert!(list.is_empty());
    }

    #[test]
    fn test_stage_list_vec_conversion_trims_trailing() {
        let mut list = StageList::new();
        list.set(1, 64.0_f32).unwrap();

        let values: Vec<Option<f32>> = list.clone().into();
        assert_eq!(values, vec![None, Some(64.0)]);

        let back = StageList::try_from(values).unwrap();
        assert_eq!(back, list);

        let too_long = vec![None; MAX_STAGES + 1];
        assert!(StageList::<f32>::try_from(too_long).is_err());
    }

    #[test]
    fn test_blend_op_parse() {
        assert_eq!("None".parse::<BlendOp>().unwrap(), BlendOp::None);
        assert_eq!("lerpalpha".parse::<BlendOp>().unwrap(), BlendOp::LerpAlpha);
        assert!("Screen".parse::<BlendOp>().is_err());
        assert_eq!(BlendOp::AddAlpha.to_string(), "AddAlpha");
    }

    #[test]
    fn test_defaults_for_unset_properties() {
        let record = MaterialRecord::empty("Foo", "Bar");

        assert_relative_eq!(record.specular_power(0), DEFAULT_SPECULAR_POWER);
        assert_relative_eq!(record.diffuse_color(0), Color::new(1.0, 1.0, 1.0, 1.0));
        assert_relative_eq!(record.sub_surface_color(0), Color::new(1.0, 0.2, 0.2, 1.0));
        assert!(!record.double_sided());
        assert!(!record.alpha_test());
        assert_eq!(record.alpha_ref(), DEFAULT_ALPHA_REF);
        assert_eq!(record.translucent_blend_op(), BlendOp::None);
        assert_eq!(record.stage_count(), 0);
        assert!(!record.is_translucent());
    }

    #[test]
    fn test_extra_replaces_same_key_and_stage() {
        let mut record = MaterialRecord::empty("Foo", "Bar");
        record.push_extra("glow", Some(0), "1".to_string());
        record.push_extra("Glow", Some(0), "0".to_string());
        record.push_extra("glow", Some(1), "1".to_string());

        assert_eq!(record.extras().len(), 2);
        assert_eq!(record.extra("glow", Some(0)), Some("0"));
        assert_eq!(record.extra("GLOW", Some(1)), Some("1"));
        assert_eq!(record.extra("glow", None), None);
    }

    #[test]
    fn test_validate_catches_bad_values() {
        let mut record = MaterialRecord::empty("Foo", "Bar");
        assert!(record.validate().is_ok());

        record.specular_power.set(0, -1.0).unwrap();
        assert!(record.validate().unwrap_err().contains("specularPower"));

        let mut record = MaterialRecord::empty("Foo", "");
        assert_eq!(record.validate().unwrap_err(), "missing mapTo");

        record.map_to = "Bar".to_string();
        record.specular.set(0, Color::new(2.0, 0.0, 0.0, 1.0)).unwrap();
        assert!(record.validate().is_err());
    }
}
