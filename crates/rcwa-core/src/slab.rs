use crate::domain::{GeometryResult, RcwaError};
use crate::material::{LayerFragment, Material, Permittivity};
use crate::numerics::{relatively_close, stable_sum};
use crate::stack::Layer;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const PITCH_RELATIVE_TOLERANCE: f64 = 1.0e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorComponent {
    Xx,
    Yy,
    Zz,
}

impl TensorComponent {
    pub const ALL: [TensorComponent; 3] = [Self::Xx, Self::Yy, Self::Zz];

    const fn index(self) -> usize {
        match self {
            Self::Xx => 0,
            Self::Yy => 1,
            Self::Zz => 2,
        }
    }

    fn of(self, permittivity: &Permittivity) -> Complex64 {
        match self {
            Self::Xx => permittivity.xx(),
            Self::Yy => permittivity.yy(),
            Self::Zz => permittivity.zz(),
        }
    }
}

/// Fourier coefficients `f_h`, `h = -max_harmonic..=max_harmonic`, of a
/// profile `f(x) = Σ f_h exp(j 2π h x / Λ)` over one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FourierSeries {
    max_harmonic: usize,
    coefficients: Vec<Complex64>,
}

impl FourierSeries {
    pub fn max_harmonic(&self) -> usize {
        self.max_harmonic
    }

    /// Zero outside the stored range.
    pub fn coefficient(&self, harmonic: i64) -> Complex64 {
        let max = self.max_harmonic as i64;
        if harmonic < -max || harmonic > max {
            return Complex64::new(0.0, 0.0);
        }
        self.coefficients[(harmonic + max) as usize]
    }

    pub fn coefficients(&self) -> &[Complex64] {
        &self.coefficients
    }

    /// Evaluates the truncated series at lateral position `x`.
    pub fn evaluate(&self, x: f64, pitch: f64) -> Complex64 {
        let max = self.max_harmonic as i64;
        (-max..=max).fold(Complex64::new(0.0, 0.0), |sum, harmonic| {
            let phase = 2.0 * PI * harmonic as f64 * x / pitch;
            sum + self.coefficient(harmonic) * Complex64::new(phase.cos(), phase.sin())
        })
    }
}

/// Harmonics of ε and of 1/ε for each tensor component of a slab.
#[derive(Debug, Clone, PartialEq)]
pub struct SlabHarmonics {
    epsilon: [FourierSeries; 3],
    inverse_epsilon: [FourierSeries; 3],
}

impl SlabHarmonics {
    pub fn epsilon(&self, component: TensorComponent) -> &FourierSeries {
        &self.epsilon[component.index()]
    }

    pub fn inverse_epsilon(&self, component: TensorComponent) -> &FourierSeries {
        &self.inverse_epsilon[component.index()]
    }

    pub fn max_harmonic(&self) -> usize {
        self.epsilon[0].max_harmonic()
    }
}

/// One grating period: fragments laid out left to right from `x = 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slab {
    fragments: Vec<LayerFragment>,
    pitch: f64,
}

impl Slab {
    pub fn new(fragments: impl IntoIterator<Item = LayerFragment>) -> GeometryResult<Self> {
        Self::builder().fragments(fragments).build()
    }

    /// Like [`Slab::new`], but the widths must add up to `pitch`.
    pub fn with_pitch(
        fragments: impl IntoIterator<Item = LayerFragment>,
        pitch: f64,
    ) -> GeometryResult<Self> {
        Self::builder().fragments(fragments).pitch(pitch).build()
    }

    pub fn homogeneous(material: &Material, pitch: f64) -> GeometryResult<Self> {
        Self::new([material.fragment(pitch)?])
    }

    pub fn builder() -> SlabBuilder {
        SlabBuilder::default()
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn fragments(&self) -> &[LayerFragment] {
        &self.fragments
    }

    pub fn is_homogeneous(&self) -> bool {
        self.fragments.len() == 1
    }

    pub fn uniform_material(&self) -> Option<&Material> {
        match self.fragments.as_slice() {
            [only] => Some(only.material()),
            _ => None,
        }
    }

    pub fn is_lossless(&self) -> bool {
        self.fragments
            .iter()
            .all(|fragment| fragment.material().is_lossless())
    }

    /// Extrudes this cross-section to `thickness` along the stack normal.
    pub fn layer(&self, thickness: f64) -> GeometryResult<Layer> {
        Layer::new(self.clone(), thickness)
    }

    /// Exact boxcar Fourier coefficients of ε and 1/ε for harmonics
    /// `-2N..=2N`, enough to fill `(2N+1)`-square Toeplitz matrices.
    pub fn fourier_harmonics(&self, order_count: usize) -> SlabHarmonics {
        let max_harmonic = 2 * order_count;
        let epsilon = TensorComponent::ALL
            .map(|component| self.fourier_series(max_harmonic, |p| component.of(p)));
        let inverse_epsilon = TensorComponent::ALL
            .map(|component| self.fourier_series(max_harmonic, |p| component.of(p).inv()));
        SlabHarmonics {
            epsilon,
            inverse_epsilon,
        }
    }

    pub fn fourier_series(
        &self,
        max_harmonic: usize,
        profile: impl Fn(&Permittivity) -> Complex64,
    ) -> FourierSeries {
        let max = max_harmonic as i64;
        let mut coefficients = Vec::with_capacity(2 * max_harmonic + 1);

        for harmonic in -max..=max {
            let mut left = 0.0;
            let mut coefficient = Complex64::new(0.0, 0.0);
            for fragment in &self.fragments {
                let width = fragment.width();
                let value = profile(fragment.material().permittivity());
                coefficient += value * boxcar_coefficient(harmonic, left, width, self.pitch);
                left += width;
            }
            coefficients.push(coefficient);
        }

        FourierSeries {
            max_harmonic,
            coefficients,
        }
    }
}

/// `(1/Λ) ∫_a^{a+w} exp(-j 2π h x / Λ) dx`.
fn boxcar_coefficient(harmonic: i64, left: f64, width: f64, pitch: f64) -> Complex64 {
    let duty = width / pitch;
    if harmonic == 0 {
        return Complex64::new(duty, 0.0);
    }

    let h = harmonic as f64;
    let half_angle = PI * h * duty;
    let center_phase = -PI * h * (2.0 * left + width) / pitch;
    let envelope = duty * half_angle.sin() / half_angle;
    Complex64::from_polar(envelope, center_phase)
}

#[derive(Debug, Clone, Default)]
pub struct SlabBuilder {
    fragments: Vec<LayerFragment>,
    pitch: Option<f64>,
}

impl SlabBuilder {
    pub fn fragment(mut self, fragment: LayerFragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    pub fn fragments(mut self, fragments: impl IntoIterator<Item = LayerFragment>) -> Self {
        self.fragments.extend(fragments);
        self
    }

    /// Appends every fragment of `other`, keeping order.
    pub fn extend(mut self, other: SlabBuilder) -> Self {
        self.fragments.extend(other.fragments);
        if self.pitch.is_none() {
            self.pitch = other.pitch;
        }
        self
    }

    pub fn pitch(mut self, pitch: f64) -> Self {
        self.pitch = Some(pitch);
        self
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn build(self) -> GeometryResult<Slab> {
        if self.fragments.is_empty() {
            return Err(RcwaError::degenerate_slab(
                "GEOMETRY.SLAB_EMPTY",
                "a slab needs at least one fragment",
            ));
        }

        let period = stable_sum(self.fragments.iter().map(LayerFragment::width));
        if !period.is_finite() || period <= 0.0 {
            return Err(RcwaError::degenerate_slab(
                "GEOMETRY.SLAB_PERIOD",
                format!("fragment widths must add up to a positive period, got {period}"),
            ));
        }

        if let Some(pitch) = self.pitch {
            if !pitch.is_finite() || pitch <= 0.0 {
                return Err(RcwaError::invalid_geometry(
                    "GEOMETRY.SLAB_PITCH",
                    format!("pitch must be positive and finite, got {pitch}"),
                ));
            }
            if !relatively_close(period, pitch, PITCH_RELATIVE_TOLERANCE) {
                return Err(RcwaError::degenerate_slab(
                    "GEOMETRY.SLAB_PITCH",
                    format!("fragment widths add up to {period}, declared pitch is {pitch}"),
                ));
            }
        }

        Ok(Slab {
            fragments: coalesce(self.fragments),
            pitch: period,
        })
    }
}

fn coalesce(fragments: Vec<LayerFragment>) -> Vec<LayerFragment> {
    let mut merged: Vec<LayerFragment> = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        match merged.last_mut() {
            Some(previous) if previous.material() == fragment.material() => {
                *previous = previous.widened(fragment.width());
            }
            _ => merged.push(fragment),
        }
    }
    merged
}
