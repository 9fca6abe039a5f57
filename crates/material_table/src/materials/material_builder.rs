//! Material record construction
//!
//! [`MaterialBuilder`] is the single place a [`MaterialRecord`] gets built,
//! whether from a parsed script block ([`MaterialBuilder::from_raw`]) or
//! programmatically through the chained setters.

use log::warn;

use super::material_record::{BlendOp, MaterialRecord, StageList};
use super::script_parser::RawRecord;
use super::MaterialError;
use crate::config::LoaderConfig;
use crate::foundation::math::{self, Color};

/// Properties the table understands; everything else is passed through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Property {
    MapTo,
    DiffuseMap,
    NormalMap,
    DiffuseColor,
    Specular,
    SpecularPower,
    PixelSpecular,
    UseAnisotropic,
    SubSurface,
    SubSurfaceColor,
    TranslucentBlendOp,
    DoubleSided,
    AlphaTest,
    AlphaRef,
}

impl Property {
    /// Keys match case-insensitively
    fn from_key(key: &str) -> Option<Self> {
        let property = match key.to_ascii_lowercase().as_str() {
            "mapto" => Self::MapTo,
            "diffusemap" => Self::DiffuseMap,
            "normalmap" => Self::NormalMap,
            "diffusecolor" => Self::DiffuseColor,
            "specular" => Self::Specular,
            "specularpower" => Self::SpecularPower,
            "pixelspecular" => Self::PixelSpecular,
            "useanisotropic" => Self::UseAnisotropic,
            "subsurface" => Self::SubSurface,
            "subsurfacecolor" => Self::SubSurfaceColor,
            "translucentblendop" => Self::TranslucentBlendOp,
            "doublesided" => Self::DoubleSided,
            "alphatest" => Self::AlphaTest,
            "alpharef" => Self::AlphaRef,
            _ => return None,
        };
        Some(property)
    }

    const fn is_staged(self) -> bool {
        !matches!(
            self,
            Self::MapTo | Self::TranslucentBlendOp | Self::DoubleSided | Self::AlphaTest | Self::AlphaRef
        )
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        v if v.eq_ignore_ascii_case("true") => Ok(true),
        v if v.eq_ignore_ascii_case("false") => Ok(false),
        v => Err(format!("expected 0 or 1, got '{v}'")),
    }
}

fn parse_f32(value: &str) -> Result<f32, String> {
    let parsed = value
        .trim()
        .parse::<f32>()
        .map_err(|_| format!("invalid number '{value}'"))?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(format!("number '{value}' is not finite"))
    }
}

fn parse_specular_power(value: &str) -> Result<f32, String> {
    let power = parse_f32(value)?;
    if power > 0.0 {
        Ok(power)
    } else {
        Err(format!("specular power must be positive, got {power}"))
    }
}

fn parse_alpha_ref(value: &str) -> Result<u8, String> {
    value
        .trim()
        .parse::<u8>()
        .map_err(|_| format!("alpha reference must be an integer 0-255, got '{value}'"))
}

/// Parse 3 or 4 whitespace-separated channels; alpha defaults to 1
fn parse_color(value: &str) -> Result<Color, String> {
    let channels = value
        .split_whitespace()
        .map(parse_f32)
        .collect::<Result<Vec<_>, _>>()?;
    match channels.as_slice() {
        [r, g, b] => Ok(math::rgba(*r, *g, *b, 1.0)),
        [r, g, b, a] => Ok(math::rgba(*r, *g, *b, *a)),
        _ => Err(format!("expected 3 or 4 color channels, got {} in '{value}'", channels.len())),
    }
}

/// Builder for material records
///
/// # Examples
/// ```
/// use material_table::materials::MaterialBuilder;
///
/// let record = MaterialBuilder::new("RuinPillar_01_ConcreteRuff01")
///     .map_to("ConcreteRuff01")
///     .diffuse_map(0, "3td_ConcreteRough_01")
///     .specular_power(0, 90.0)
///     .build()
///     .unwrap();
///
/// assert_eq!(record.specular_power(0), 90.0);
/// ```
pub struct MaterialBuilder {
    record: MaterialRecord,
    map_to_set: bool,
    clamp_colors: bool,
    line: Option<usize>,
    error: Option<(Option<usize>, String)>,
}

impl MaterialBuilder {
    /// Start a record with every optional property at its default
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            record: MaterialRecord::empty(name, String::new()),
            map_to_set: false,
            clamp_colors: true,
            line: None,
            error: None,
        }
    }

    /// Build a record from a parsed block
    ///
    /// Values are converted per property type. Unknown keys are preserved
    /// on the record. Re-assigning a property inside one block keeps the
    /// last value.
    ///
    /// # Errors
    /// [`MaterialError::MalformedRecord`] when `mapTo` is missing, a value
    /// does not convert, or a stage index is out of range.
    pub fn from_raw(raw: &RawRecord, config: &LoaderConfig) -> Result<MaterialRecord, MaterialError> {
        let mut builder = Self::new(raw.name.clone()).clamp_colors(config.clamp_colors);
        builder.line = Some(raw.line);

        for assignment in &raw.assignments {
            builder.assign(&assignment.key, assignment.stage, &assignment.value, Some(assignment.line));
            if builder.error.is_some() {
                break;
            }
        }

        builder.build()
    }

    /// Clamp out-of-range color channels instead of failing
    pub fn clamp_colors(mut self, clamp: bool) -> Self {
        self.clamp_colors = clamp;
        self
    }

    /// Set the mesh slot this record binds to
    pub fn map_to(mut self, slot: impl Into<String>) -> Self {
        self.record.map_to = slot.into();
        self.map_to_set = true;
        self
    }

    /// Set the diffuse texture reference for `stage`
    pub fn diffuse_map(mut self, stage: usize, reference: impl Into<String>) -> Self {
        let reference = reference.into();
        self.set_stage(|r| &mut r.diffuse_map, stage, reference, None);
        self
    }

    /// Set the normal map reference for `stage`
    pub fn normal_map(mut self, stage: usize, reference: impl Into<String>) -> Self {
        let reference = reference.into();
        self.set_stage(|r| &mut r.normal_map, stage, reference, None);
        self
    }

    /// Set the flat diffuse color for `stage`
    pub fn diffuse_color(mut self, stage: usize, color: Color) -> Self {
        self.set_color(|r| &mut r.diffuse_color, "diffuseColor", stage, color, None);
        self
    }

    /// Set the specular color for `stage`
    pub fn specular(mut self, stage: usize, color: Color) -> Self {
        self.set_color(|r| &mut r.specular, "specular", stage, color, None);
        self
    }

    /// Set the specular exponent for `stage`
    ///
    /// # Arguments
    /// * `stage` - Texture stage, below [`MAX_STAGES`](super::MAX_STAGES)
    /// * `power` - Phong exponent; must be finite and positive
    pub fn specular_power(mut self, stage: usize, power: f32) -> Self {
        if power.is_finite() && power > 0.0 {
            self.set_stage(|r| &mut r.specular_power, stage, power, None);
        } else {
            self.fail(None, format!("specular power must be positive, got {power}"));
        }
        self
    }

    /// Enable per-pixel specular for `stage`
    pub fn pixel_specular(mut self, stage: usize, enabled: bool) -> Self {
        self.set_stage(|r| &mut r.pixel_specular, stage, enabled, None);
        self
    }

    /// Enable anisotropic filtering for `stage`
    pub fn use_anisotropic(mut self, stage: usize, enabled: bool) -> Self {
        self.set_stage(|r| &mut r.use_anisotropic, stage, enabled, None);
        self
    }

    /// Enable sub-surface scattering for `stage` with the given tint
    ///
    /// # Arguments
    /// * `stage` - Texture stage
    /// * `color` - Scattering tint; clamped or rejected like other colors
    pub fn sub_surface(mut self, stage: usize, color: Color) -> Self {
        self.set_stage(|r| &mut r.sub_surface, stage, true, None);
        self.set_color(|r| &mut r.sub_surface_color, "subSurfaceColor", stage, color, None);
        self
    }

    /// Set the translucent blend op
    pub fn translucent_blend_op(mut self, op: BlendOp) -> Self {
        self.record.translucent_blend_op = op;
        self
    }

    /// Render both faces
    pub fn double_sided(mut self, enabled: bool) -> Self {
        self.record.double_sided = enabled;
        self
    }

    /// Enable alpha testing against `threshold`
    pub fn alpha_test(mut self, threshold: u8) -> Self {
        self.record.alpha_test = true;
        self.record.alpha_ref = threshold;
        self
    }

    /// Attach an uninterpreted property
    pub fn extra(mut self, key: &str, stage: Option<usize>, value: impl Into<String>) -> Self {
        self.record.push_extra(key, stage, value.into());
        self
    }

    /// Finish the record
    ///
    /// # Errors
    /// [`MaterialError::MalformedRecord`] for the first invalid setter call
    /// or when no `mapTo` was given.
    pub fn build(self) -> Result<MaterialRecord, MaterialError> {
        let name = self.record.name.clone();
        if let Some((line, reason)) = self.error {
            return Err(MaterialError::MalformedRecord {
                name: Some(name),
                line: line.or(self.line),
                reason,
            });
        }
        if !self.map_to_set || self.record.map_to.trim().is_empty() {
            return Err(MaterialError::MalformedRecord {
                name: Some(name),
                line: self.line,
                reason: "missing mapTo".to_string(),
            });
        }
        Ok(self.record)
    }

    fn fail(&mut self, line: Option<usize>, reason: String) {
        if self.error.is_none() {
            self.error = Some((line, reason));
        }
    }

    fn set_stage<T>(
        &mut self,
        field: impl FnOnce(&mut MaterialRecord) -> &mut StageList<T>,
        stage: usize,
        value: T,
        line: Option<usize>,
    ) {
        if let Err(err) = field(&mut self.record).set(stage, value) {
            self.fail(line, err.to_string());
        }
    }

    fn set_color(
        &mut self,
        field: impl FnOnce(&mut MaterialRecord) -> &mut StageList<Color>,
        key: &str,
        stage: usize,
        color: Color,
        line: Option<usize>,
    ) {
        let color = if math::is_normalized(&color) {
            color
        } else if self.clamp_colors {
            let (clamped, _) = math::saturate(color);
            warn!(
                "Material '{}': {}[{}] clamped to [0, 1]",
                self.record.name, key, stage
            );
            clamped
        } else {
            self.fail(line, format!("{key}[{stage}] has channels outside [0, 1]"));
            return;
        };
        self.set_stage(field, stage, color, line);
    }

    /// Apply one script assignment
    fn assign(&mut self, key: &str, stage: Option<usize>, value: &str, line: Option<usize>) {
        let Some(property) = Property::from_key(key) else {
            self.record.push_extra(key, stage, value.to_string());
            return;
        };

        if !property.is_staged() && stage.unwrap_or(0) != 0 {
            self.fail(line, format!("'{key}' has no stages, but stage {} was given", stage.unwrap_or(0)));
            return;
        }
        let stage = stage.unwrap_or(0);

        let outcome = match property {
            Property::MapTo => {
                self.record.map_to = value.to_string();
                self.map_to_set = true;
                Ok(())
            }
            Property::DiffuseMap => {
                self.set_stage(|r| &mut r.diffuse_map, stage, value.to_string(), line);
                Ok(())
            }
            Property::NormalMap => {
                self.set_stage(|r| &mut r.normal_map, stage, value.to_string(), line);
                Ok(())
            }
            Property::DiffuseColor => parse_color(value)
                .map(|c| self.set_color(|r| &mut r.diffuse_color, key, stage, c, line)),
            Property::Specular => parse_color(value)
                .map(|c| self.set_color(|r| &mut r.specular, key, stage, c, line)),
            Property::SubSurfaceColor => parse_color(value)
                .map(|c| self.set_color(|r| &mut r.sub_surface_color, key, stage, c, line)),
            Property::SpecularPower => parse_specular_power(value)
                .map(|p| self.set_stage(|r| &mut r.specular_power, stage, p, line)),
            Property::PixelSpecular => parse_bool(value)
                .map(|b| self.set_stage(|r| &mut r.pixel_specular, stage, b, line)),
            Property::UseAnisotropic => parse_bool(value)
                .map(|b| self.set_stage(|r| &mut r.use_anisotropic, stage, b, line)),
            Property::SubSurface => parse_bool(value)
                .map(|b| self.set_stage(|r| &mut r.sub_surface, stage, b, line)),
            Property::TranslucentBlendOp => {
                match value.parse::<BlendOp>() {
                    Ok(op) => self.record.translucent_blend_op = op,
                    Err(reason) => {
                        // Unrecognised ops pass through to the renderer untouched
                        warn!("Material '{}': {}, kept as an extra property", self.record.name, reason);
                        self.record.push_extra(key, None, value.to_string());
                    }
                }
                Ok(())
            }
            Property::DoubleSided => parse_bool(value).map(|b| self.record.double_sided = b),
            Property::AlphaTest => parse_bool(value).map(|b| self.record.alpha_test = b),
            Property::AlphaRef => parse_alpha_ref(value).map(|v| self.record.alpha_ref = v),
        };

        if let Err(reason) = outcome {
            self.fail(line, format!("{key}: {reason}"));
        }
    }
}
