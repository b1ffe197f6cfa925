//! Plane-wave illumination shared by every solve.
//!
//! Angles are in radians. The polar angle `α` is measured from the stack
//! normal inside the incident medium, the azimuth `δ` rotates the plane of
//! incidence away from the grating vector, and `ψ` selects the polarization
//! (`π/2` is TE, `0` is TM).

use crate::domain::{DiffractionRegime, RcwaError, RcwaResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use std::ops::RangeInclusive;

const PLANAR_TOLERANCE: f64 = 1.0e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "IlluminationContextBuilder")]
pub struct IlluminationContext {
    wavelength: f64,
    order_count: usize,
    incidence_angle: f64,
    azimuth: f64,
    polarization_angle: f64,
}

impl IlluminationContext {
    pub fn builder() -> IlluminationContextBuilder {
        IlluminationContextBuilder::default()
    }

    /// Builder seeded with this context's values.
    pub fn to_builder(&self) -> IlluminationContextBuilder {
        IlluminationContextBuilder {
            wavelength: Some(self.wavelength),
            order_count: Some(self.order_count),
            incidence_angle: self.incidence_angle,
            azimuth: self.azimuth,
            polarization_angle: self.polarization_angle,
        }
    }

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    /// `N`: orders `-N..=N` are retained.
    pub fn order_count(&self) -> usize {
        self.order_count
    }

    pub fn incidence_angle(&self) -> f64 {
        self.incidence_angle
    }

    pub fn azimuth(&self) -> f64 {
        self.azimuth
    }

    pub fn polarization_angle(&self) -> f64 {
        self.polarization_angle
    }

    pub fn harmonic_count(&self) -> usize {
        2 * self.order_count + 1
    }

    pub fn orders(&self) -> RangeInclusive<i64> {
        let n = self.order_count as i64;
        -n..=n
    }

    /// Storage index of order `m`, or `None` outside `-N..=N`.
    pub fn order_index(&self, order: i64) -> Option<usize> {
        let n = self.order_count as i64;
        (-n..=n).contains(&order).then(|| (order + n) as usize)
    }

    pub fn free_space_wavenumber(&self) -> f64 {
        2.0 * PI / self.wavelength
    }

    /// Planar when the plane of incidence contains the grating vector.
    pub fn regime(&self) -> DiffractionRegime {
        if (self.incidence_angle.sin() * self.azimuth.sin()).abs() <= PLANAR_TOLERANCE {
            DiffractionRegime::Planar
        } else {
            DiffractionRegime::Conical
        }
    }

    /// Unit electric-field vector `(ux, uy, uz)` of the incident wave.
    pub fn polarization_vector(&self) -> [f64; 3] {
        let (sin_a, cos_a) = self.incidence_angle.sin_cos();
        let (sin_d, cos_d) = self.azimuth.sin_cos();
        let (sin_p, cos_p) = self.polarization_angle.sin_cos();
        [
            cos_p * cos_a * cos_d - sin_p * sin_d,
            cos_p * cos_a * sin_d + sin_p * cos_d,
            -cos_p * sin_a,
        ]
    }

    /// `k0`-normalized tangential wavevectors for a grating of `pitch` lit
    /// from a medium of index `incident_index`: `kx_m` in order storage and
    /// the common `ky`.
    ///
    /// Orders count against the incident `kx`:
    /// `kx_m = n sinα cosδ - m λ / pitch`, so a positive order `m` is
    /// diffracted towards `-x`.
    pub fn tangential_wavevectors(&self, incident_index: f64, pitch: f64) -> (Vec<f64>, f64) {
        let sin_a = self.incidence_angle.sin();
        let (sin_d, cos_d) = self.azimuth.sin_cos();
        let kx0 = incident_index * sin_a * cos_d;
        let ky = if self.regime() == DiffractionRegime::Planar {
            0.0
        } else {
            incident_index * sin_a * sin_d
        };
        let step = self.wavelength / pitch;
        let kx = self.orders().map(|m| kx0 - m as f64 * step).collect();
        (kx, ky)
    }

    /// `k0`-normalized normal wavevector of the incident wave.
    pub fn incident_normal_wavevector(&self, incident_index: f64) -> f64 {
        incident_index * self.incidence_angle.cos()
    }
}

impl TryFrom<IlluminationContextBuilder> for IlluminationContext {
    type Error = RcwaError;

    fn try_from(builder: IlluminationContextBuilder) -> RcwaResult<Self> {
        builder.build()
    }
}

/// Collects illumination parameters; [`build`](Self::build) validates them.
///
/// Angles default to normal incidence in the planar regime with TE
/// polarization. Wavelength and order count have no default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IlluminationContextBuilder {
    wavelength: Option<f64>,
    order_count: Option<usize>,
    incidence_angle: f64,
    azimuth: f64,
    polarization_angle: f64,
}

impl Default for IlluminationContextBuilder {
    fn default() -> Self {
        Self {
            wavelength: None,
            order_count: None,
            incidence_angle: 0.0,
            azimuth: 0.0,
            polarization_angle: FRAC_PI_2,
        }
    }
}

impl IlluminationContextBuilder {
    pub fn wavelength(mut self, wavelength: f64) -> Self {
        self.wavelength = Some(wavelength);
        self
    }

    pub fn order_count(mut self, order_count: usize) -> Self {
        self.order_count = Some(order_count);
        self
    }

    pub fn incidence_angle(mut self, angle: f64) -> Self {
        self.incidence_angle = angle;
        self
    }

    pub fn azimuth(mut self, angle: f64) -> Self {
        self.azimuth = angle;
        self
    }

    pub fn polarization_angle(mut self, angle: f64) -> Self {
        self.polarization_angle = angle;
        self
    }

    pub fn te(self) -> Self {
        self.polarization_angle(FRAC_PI_2)
    }

    pub fn tm(self) -> Self {
        self.polarization_angle(0.0)
    }

    pub fn build(self) -> RcwaResult<IlluminationContext> {
        let wavelength = self.wavelength.ok_or_else(|| {
            RcwaError::invalid_illumination("ILLUMINATION.WAVELENGTH", "wavelength is not set")
        })?;
        if !wavelength.is_finite() || wavelength <= 0.0 {
            return Err(RcwaError::invalid_illumination(
                "ILLUMINATION.WAVELENGTH",
                format!("wavelength must be positive and finite, got {wavelength}"),
            ));
        }

        let order_count = self.order_count.ok_or_else(|| {
            RcwaError::invalid_illumination("ILLUMINATION.ORDER_COUNT", "order count is not set")
        })?;
        if order_count < 1 {
            return Err(RcwaError::invalid_illumination(
                "ILLUMINATION.ORDER_COUNT",
                "at least one diffraction order on each side of zero is required",
            ));
        }

        for (name, value) in [
            ("incidence angle", self.incidence_angle),
            ("azimuth", self.azimuth),
            ("polarization angle", self.polarization_angle),
        ] {
            if !value.is_finite() {
                return Err(RcwaError::invalid_illumination(
                    "ILLUMINATION.ANGLE",
                    format!("{name} must be finite, got {value}"),
                ));
            }
        }
        if self.incidence_angle.abs() >= FRAC_PI_2 {
            return Err(RcwaError::invalid_illumination(
                "ILLUMINATION.ANGLE",
                format!(
                    "incidence angle must satisfy |α| < π/2, got {}",
                    self.incidence_angle
                ),
            ));
        }

        Ok(IlluminationContext {
            wavelength,
            order_count,
            incidence_angle: self.incidence_angle,
            azimuth: self.azimuth,
            polarization_angle: self.polarization_angle,
        })
    }
}
