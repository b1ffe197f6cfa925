//! Dielectric materials and the width-tagged fragments built from them.
//!
//! Permittivities follow the optics convention: an absorbing medium has
//! `Im ε >= 0`. Tensor components are given in the grating frame, with `x`
//! along the grating vector and `z` along the stack normal.

use crate::domain::{GeometryResult, RcwaError};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

const LOSSLESS_IMAGINARY_FLOOR: f64 = 1.0e-14;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Permittivity {
    Isotropic { value: Complex64 },
    Diagonal { xx: Complex64, yy: Complex64, zz: Complex64 },
}

impl Permittivity {
    pub fn xx(&self) -> Complex64 {
        match *self {
            Self::Isotropic { value } => value,
            Self::Diagonal { xx, .. } => xx,
        }
    }

    pub fn yy(&self) -> Complex64 {
        match *self {
            Self::Isotropic { value } => value,
            Self::Diagonal { yy, .. } => yy,
        }
    }

    pub fn zz(&self) -> Complex64 {
        match *self {
            Self::Isotropic { value } => value,
            Self::Diagonal { zz, .. } => zz,
        }
    }

    pub fn components(&self) -> [Complex64; 3] {
        [self.xx(), self.yy(), self.zz()]
    }

    fn is_finite(&self) -> bool {
        self.components().iter().all(|value| value.is_finite())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MaterialRecord")]
pub struct Material {
    permittivity: Permittivity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

#[derive(Deserialize)]
struct MaterialRecord {
    permittivity: Permittivity,
    #[serde(default)]
    label: Option<String>,
}

impl TryFrom<MaterialRecord> for Material {
    type Error = RcwaError;

    fn try_from(record: MaterialRecord) -> GeometryResult<Self> {
        let material = Self::from_permittivity(record.permittivity)?;
        Ok(Self {
            label: record.label,
            ..material
        })
    }
}

impl PartialEq for Material {
    fn eq(&self, other: &Self) -> bool {
        self.permittivity == other.permittivity
    }
}

impl Material {
    pub fn new(permittivity: Complex64) -> GeometryResult<Self> {
        Self::from_permittivity(Permittivity::Isotropic {
            value: permittivity,
        })
    }

    /// Lossless medium with real refractive index `n` (`ε = n²`).
    pub fn from_index(index: f64) -> GeometryResult<Self> {
        Self::from_complex_index(Complex64::new(index, 0.0))
    }

    /// `n + iκ`, with `κ >= 0` for absorption.
    pub fn from_complex_index(index: Complex64) -> GeometryResult<Self> {
        Self::new(index * index)
    }

    pub fn anisotropic(xx: Complex64, yy: Complex64, zz: Complex64) -> GeometryResult<Self> {
        Self::from_permittivity(Permittivity::Diagonal { xx, yy, zz })
    }

    pub fn from_permittivity(permittivity: Permittivity) -> GeometryResult<Self> {
        if !permittivity.is_finite() {
            return Err(RcwaError::invalid_geometry(
                "GEOMETRY.MATERIAL_PERMITTIVITY",
                format!("material permittivity must be finite, got {permittivity:?}"),
            ));
        }
        if permittivity.components().iter().any(|value| value.norm() == 0.0) {
            return Err(RcwaError::invalid_geometry(
                "GEOMETRY.MATERIAL_PERMITTIVITY",
                "material permittivity must be non-zero",
            ));
        }

        Ok(Self {
            permittivity,
            label: None,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn permittivity(&self) -> &Permittivity {
        &self.permittivity
    }

    pub fn is_isotropic(&self) -> bool {
        match self.permittivity {
            Permittivity::Isotropic { .. } => true,
            Permittivity::Diagonal { xx, yy, zz } => xx == yy && yy == zz,
        }
    }

    pub fn is_lossless(&self) -> bool {
        self.permittivity
            .components()
            .iter()
            .all(|value| value.im.abs() <= LOSSLESS_IMAGINARY_FLOOR * value.norm().max(1.0))
    }

    /// `sqrt(ε)` on the branch with non-negative real part; `None` for
    /// anisotropic media.
    pub fn refractive_index(&self) -> Option<Complex64> {
        if !self.is_isotropic() {
            return None;
        }
        let root = self.permittivity.xx().sqrt();
        Some(if root.re < 0.0 { -root } else { root })
    }

    /// Tags this material with a lateral width inside one grating period.
    pub fn fragment(&self, width: f64) -> GeometryResult<LayerFragment> {
        LayerFragment::new(self.clone(), width)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerFragment {
    material: Material,
    width: f64,
}

impl LayerFragment {
    pub fn new(material: Material, width: f64) -> GeometryResult<Self> {
        if !width.is_finite() || width <= 0.0 {
            return Err(RcwaError::invalid_geometry(
                "GEOMETRY.FRAGMENT_WIDTH",
                format!("fragment width must be positive and finite, got {width}"),
            ));
        }
        Ok(Self { material, width })
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub(crate) fn widened(&self, extra: f64) -> Self {
        Self {
            material: self.material.clone(),
            width: self.width + extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Material, Permittivity};
    use crate::domain::RcwaErrorCategory;
    use num_complex::Complex64;

    #[test]
    fn index_constructor_squares_into_permittivity() {
        let substrate = Material::from_index(2.04).expect("substrate");
        let value = substrate.permittivity().xx();
        assert!((value.re - 2.04 * 2.04).abs() < 1.0e-12);
        assert_eq!(value.im, 0.0);
        assert!(substrate.is_isotropic());
        assert!(substrate.is_lossless());
        let index = substrate.refractive_index().expect("isotropic index");
        assert!((index.re - 2.04).abs() < 1.0e-12);
    }

    #[test]
    fn absorbing_index_has_positive_imaginary_permittivity() {
        let metal = Material::from_complex_index(Complex64::new(0.2, 3.0)).expect("metal");
        assert!(metal.permittivity().xx().im > 0.0);
        assert!(!metal.is_lossless());
    }

    #[test]
    fn equality_ignores_label() {
        let plain = Material::from_index(1.5).expect("glass");
        let labelled = Material::from_index(1.5).expect("glass").with_label("BK7-ish");
        assert_eq!(plain, labelled);
        assert_eq!(labelled.label(), Some("BK7-ish"));
        assert_ne!(plain, Material::from_index(1.6).expect("other glass"));
    }

    #[test]
    fn anisotropic_material_reports_components() {
        let crystal = Material::anisotropic(
            Complex64::new(2.0, 0.0),
            Complex64::new(2.5, 0.0),
            Complex64::new(2.5, 0.0),
        )
        .expect("crystal");
        assert!(!crystal.is_isotropic());
        assert!(crystal.refractive_index().is_none());
        assert!(matches!(crystal.permittivity(), Permittivity::Diagonal { .. }));
        assert_eq!(crystal.permittivity().yy(), Complex64::new(2.5, 0.0));
    }

    #[test]
    fn fragment_rejects_non_positive_widths() {
        let air = Material::from_index(1.0).expect("air");
        for width in [0.0, -0.25, f64::NAN, f64::INFINITY] {
            let error = air.fragment(width).expect_err("width should be rejected");
            assert_eq!(error.category(), RcwaErrorCategory::InvalidGeometry);
            assert_eq!(error.placeholder(), "GEOMETRY.FRAGMENT_WIDTH");
        }
        let fragment = air.fragment(0.775).expect("positive width");
        assert_eq!(fragment.width(), 0.775);
        assert_eq!(fragment.material(), &air);
    }

    #[test]
    fn deserialized_materials_are_validated() {
        let glass: Material = serde_json::from_str(
            r#"{"permittivity":{"kind":"isotropic","value":[2.25,0.0]},"label":"glass"}"#,
        )
        .expect("glass");
        assert_eq!(glass, Material::from_index(1.5).expect("glass"));
        assert_eq!(glass.label(), Some("glass"));

        let zero = serde_json::from_str::<Material>(
            r#"{"permittivity":{"kind":"isotropic","value":[0.0,0.0]}}"#,
        );
        assert!(zero.is_err());
    }

    #[test]
    fn non_finite_or_zero_permittivity_is_rejected() {
        assert!(Material::new(Complex64::new(f64::NAN, 0.0)).is_err());
        assert!(Material::new(Complex64::new(0.0, 0.0)).is_err());
    }
}
