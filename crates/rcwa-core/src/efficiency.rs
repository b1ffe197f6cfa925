//! Per-order diffraction efficiencies.

use crate::config::SolverConfig;
use crate::domain::{RcwaError, Side, SolveResult};
use crate::numerics::stable_sum;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Vector electric-field amplitudes of the outgoing plane waves, one entry
/// per order in storage order, for a unit-amplitude incident wave.
///
/// Phases follow the `exp(-iωt)` convention of the material permittivities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAmplitudes {
    pub ex: Vec<Complex64>,
    pub ey: Vec<Complex64>,
    pub ez: Vec<Complex64>,
}

impl FieldAmplitudes {
    /// Completes the transverse amplitudes with `Ez` from `k·E = 0`.
    ///
    /// `kz` is the normal wavevector of each order in the outgoing medium
    /// and `direction` is `-1` for waves leaving through the incident side.
    pub(crate) fn from_transverse(
        ex: Vec<Complex64>,
        ey: Vec<Complex64>,
        kx: &[f64],
        ky: f64,
        kz: &[Complex64],
        direction: f64,
    ) -> Self {
        let ez = ex
            .iter()
            .zip(&ey)
            .zip(kx.iter().zip(kz))
            .map(|((&x, &y), (&kx, &kz))| {
                let denominator = if kz.norm() < f64::MIN_POSITIVE.sqrt() {
                    Complex64::new(f64::MIN_POSITIVE.sqrt(), 0.0)
                } else {
                    kz
                };
                -direction * (x * kx + y * ky) / denominator
            })
            .collect();
        Self { ex, ey, ez }
    }

    pub fn len(&self) -> usize {
        self.ex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ex.is_empty()
    }

    /// `|Ex|² + |Ey|² + |Ez|²` of one order.
    pub fn intensity(&self, index: usize) -> f64 {
        self.ex[index].norm_sqr() + self.ey[index].norm_sqr() + self.ez[index].norm_sqr()
    }

    pub fn is_finite(&self) -> bool {
        self.ex
            .iter()
            .chain(&self.ey)
            .chain(&self.ez)
            .all(|value| value.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEfficiency {
    pub order: i64,
    pub side: Side,
    pub efficiency: f64,
    pub propagating: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffractionEfficiencyTable {
    order_count: usize,
    reflected: Vec<OrderEfficiency>,
    transmitted: Vec<OrderEfficiency>,
}

impl DiffractionEfficiencyTable {
    pub fn order_count(&self) -> usize {
        self.order_count
    }

    pub fn orders(&self) -> RangeInclusive<i64> {
        let n = self.order_count as i64;
        -n..=n
    }

    pub fn side(&self, side: Side) -> &[OrderEfficiency] {
        match side {
            Side::Reflected => &self.reflected,
            Side::Transmitted => &self.transmitted,
        }
    }

    pub fn entry(&self, order: i64, side: Side) -> Option<&OrderEfficiency> {
        let n = self.order_count as i64;
        if !(-n..=n).contains(&order) {
            return None;
        }
        self.side(side).get((order + n) as usize)
    }

    /// Efficiency of `order` on `side`; orders outside the retained range
    /// carry no power and read as `0`.
    ///
    /// Order `m` is the wave with `kx_m = kx_0 - m λ / pitch`: for positive
    /// `m` it leaves towards `-x`, e.g. `transmitted(1)` is the first order
    /// bent back across the normal at small incidence angles.
    pub fn at(&self, order: i64, side: Side) -> f64 {
        self.entry(order, side).map_or(0.0, |entry| entry.efficiency)
    }

    pub fn reflected(&self, order: i64) -> f64 {
        self.at(order, Side::Reflected)
    }

    pub fn transmitted(&self, order: i64) -> f64 {
        self.at(order, Side::Transmitted)
    }

    pub fn propagating(&self, side: Side) -> impl Iterator<Item = &OrderEfficiency> + '_ {
        self.side(side).iter().filter(|entry| entry.propagating)
    }

    pub fn total(&self, side: Side) -> f64 {
        stable_sum(self.side(side).iter().map(|entry| entry.efficiency))
    }

    pub fn total_reflected(&self) -> f64 {
        self.total(Side::Reflected)
    }

    pub fn total_transmitted(&self) -> f64 {
        self.total(Side::Transmitted)
    }

    /// `ΣR + ΣT`.
    pub fn energy_sum(&self) -> f64 {
        self.total_reflected() + self.total_transmitted()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Outgoing field on one side of the stack together with the normal
/// wavevectors of its medium.
pub(crate) struct OutgoingField<'a> {
    pub amplitudes: &'a FieldAmplitudes,
    pub kz: &'a [Complex64],
}

pub(crate) fn extract_efficiencies(
    order_count: usize,
    incident_kz: f64,
    reflected: OutgoingField<'_>,
    transmitted: OutgoingField<'_>,
    config: &SolverConfig,
) -> SolveResult<DiffractionEfficiencyTable> {
    let reflected = side_efficiencies(order_count, incident_kz, Side::Reflected, reflected, config)?;
    let transmitted =
        side_efficiencies(order_count, incident_kz, Side::Transmitted, transmitted, config)?;
    Ok(DiffractionEfficiencyTable {
        order_count,
        reflected,
        transmitted,
    })
}

fn side_efficiencies(
    order_count: usize,
    incident_kz: f64,
    side: Side,
    field: OutgoingField<'_>,
    config: &SolverConfig,
) -> SolveResult<Vec<OrderEfficiency>> {
    let n = order_count as i64;
    let tolerance = config.efficiency_tolerance;
    (-n..=n)
        .enumerate()
        .map(|(index, order)| {
            let kz = field.kz[index];
            let propagating = kz.re > config.propagation_threshold;
            if !propagating {
                return Ok(OrderEfficiency {
                    order,
                    side,
                    efficiency: 0.0,
                    propagating,
                });
            }

            let raw = kz.re / incident_kz * field.amplitudes.intensity(index);
            if !raw.is_finite() || raw < -tolerance || raw > 1.0 + tolerance {
                return Err(RcwaError::ill_conditioned(
                    "SOLVE.EFFICIENCY",
                    format!("order {order} ({side}) has unphysical efficiency {raw:.6e}"),
                ));
            }
            Ok(OrderEfficiency {
                order,
                side,
                efficiency: raw.clamp(0.0, 1.0),
                propagating,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{extract_efficiencies, FieldAmplitudes, OutgoingField};
    use crate::config::SolverConfig;
    use crate::domain::{RcwaErrorCategory, Side};
    use num_complex::Complex64;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn field(values: [Complex64; 3]) -> FieldAmplitudes {
        FieldAmplitudes {
            ex: vec![c(0.0, 0.0); 3],
            ey: values.to_vec(),
            ez: vec![c(0.0, 0.0); 3],
        }
    }

    #[test]
    fn evanescent_orders_report_zero() {
        let reflected = field([c(5.0, 0.0), c(0.2, 0.1), c(0.0, 0.0)]);
        let transmitted = field([c(0.0, 0.0), c(0.9, 0.0), c(0.3, 0.0)]);
        let kz_ref = [c(0.0, 0.8), c(1.0, 0.0), c(0.0, 1.2)];
        let kz_trn = [c(0.0, 0.3), c(1.2, 0.0), c(0.5, 0.0)];
        let table = extract_efficiencies(
            1,
            1.0,
            OutgoingField { amplitudes: &reflected, kz: &kz_ref },
            OutgoingField { amplitudes: &transmitted, kz: &kz_trn },
            &SolverConfig::default(),
        )
        .expect("table");

        assert_eq!(table.reflected(-1), 0.0);
        assert!(!table.entry(-1, Side::Reflected).expect("entry").propagating);
        assert!((table.reflected(0) - 0.05).abs() < 1.0e-15);
        assert!((table.transmitted(0) - 1.2 * 0.81).abs() < 1.0e-15);
        assert!((table.transmitted(1) - 0.5 * 0.09).abs() < 1.0e-15);
        assert_eq!(table.transmitted(7), 0.0);
        assert_eq!(table.propagating(Side::Transmitted).count(), 2);
        assert_eq!(table.orders().count(), 3);
        assert!((table.energy_sum() - (0.05 + 0.972 + 0.045)).abs() < 1.0e-12);
    }

    #[test]
    fn unphysical_efficiency_is_a_numerical_failure() {
        let blown_up = field([c(0.0, 0.0), c(2.0, 0.0), c(0.0, 0.0)]);
        let kz = [c(0.0, 1.0), c(1.0, 0.0), c(0.0, 1.0)];
        let error = extract_efficiencies(
            1,
            1.0,
            OutgoingField { amplitudes: &blown_up, kz: &kz },
            OutgoingField { amplitudes: &blown_up, kz: &kz },
            &SolverConfig::default(),
        )
        .expect_err("efficiency 4 is unphysical");
        assert_eq!(error.category(), RcwaErrorCategory::IllConditionedStack);
    }

    #[test]
    fn divergence_free_completion_of_z_component() {
        let amplitudes = FieldAmplitudes::from_transverse(
            vec![c(0.6, 0.0)],
            vec![c(0.0, 0.0)],
            &[0.5],
            0.0,
            &[c(0.8, 0.0)],
            1.0,
        );
        // kx Ex + kz Ez = 0
        assert!((0.5 * 0.6 + 0.8 * amplitudes.ez[0].re).abs() < 1.0e-15);
        assert!(amplitudes.is_finite());
        assert_eq!(amplitudes.len(), 1);
    }

    #[test]
    fn table_serializes_to_json() {
        let amplitudes = field([c(0.0, 0.0), c(0.5, 0.0), c(0.0, 0.0)]);
        let kz = [c(0.0, 1.0), c(1.0, 0.0), c(0.0, 1.0)];
        let table = extract_efficiencies(
            1,
            1.0,
            OutgoingField { amplitudes: &amplitudes, kz: &kz },
            OutgoingField { amplitudes: &amplitudes, kz: &kz },
            &SolverConfig::default(),
        )
        .expect("table");
        let json = table.to_json().expect("json");
        assert!(json.contains("\"orderCount\": 1"));
        assert!(json.contains("\"transmitted\""));
        let parsed: super::DiffractionEfficiencyTable =
            serde_json::from_str(&json).expect("round trip");
        assert_eq!(parsed, table);
    }
}
