//! Stacks whose patterned layers collapse to plain interfaces reproduce
//! the Fresnel and thin-film formulas.

use rcwa_core::{IlluminationContext, Layer, Material, Slab, Stack};
use std::f64::consts::FRAC_PI_2;

const TOLERANCE: f64 = 1.0e-9;

struct FresnelPower {
    reflectance_s: f64,
    reflectance_p: f64,
}

fn fresnel(n1: f64, n2: f64, incidence: f64) -> FresnelPower {
    let cos_i = incidence.cos();
    let sin_t = n1 * incidence.sin() / n2;
    let cos_t = (1.0 - sin_t * sin_t).sqrt();
    let rs = (n1 * cos_i - n2 * cos_t) / (n1 * cos_i + n2 * cos_t);
    let rp = (n2 * cos_i - n1 * cos_t) / (n2 * cos_i + n1 * cos_t);
    FresnelPower {
        reflectance_s: rs * rs,
        reflectance_p: rp * rp,
    }
}

fn assert_close(label: &str, expected: f64, actual: f64, tolerance: f64) {
    assert!(
        (expected - actual).abs() <= tolerance,
        "{label} expected={expected:.12} actual={actual:.12} abs_diff={:.3e}",
        (expected - actual).abs()
    );
}

fn zero_depth_grating_stack(n1: f64, n2: f64, pitch: f64) -> Stack {
    let incident = Material::from_index(n1).expect("incident material");
    let substrate = Material::from_index(n2).expect("substrate material");
    let ridge = Material::from_index(2.04).expect("ridge material");
    let grating = Slab::new([
        incident.fragment(0.5 * pitch).expect("groove"),
        ridge.fragment(0.5 * pitch).expect("ridge"),
    ])
    .expect("grating");

    Stack::new([
        Layer::homogeneous(&incident, pitch, 0.0).expect("incident half-space"),
        grating.layer(0.0).expect("zero-depth grating"),
        Layer::homogeneous(&substrate, pitch, 0.0).expect("substrate half-space"),
    ])
    .expect("stack")
}

#[test]
fn zero_depth_grating_matches_fresnel_for_both_polarizations() {
    for (n1, n2, incidence) in [(1.0, 1.5, 0.0), (1.0, 1.5, 0.5), (1.0, 2.04, 0.9), (1.4, 1.0, 0.3)] {
        let stack = zero_depth_grating_stack(n1, n2, 1.0);
        let expected = fresnel(n1, n2, incidence);

        for (label, psi, reflectance) in [
            ("TE", FRAC_PI_2, expected.reflectance_s),
            ("TM", 0.0, expected.reflectance_p),
        ] {
            let context = IlluminationContext::builder()
                .wavelength(1.0)
                .order_count(4)
                .incidence_angle(incidence)
                .polarization_angle(psi)
                .build()
                .expect("illumination");
            let solved = stack.calc(&context).expect("solve");
            let table = solved.diffraction_efficiencies();
            let case = format!("n1={n1} n2={n2} α={incidence} {label}");

            assert_close(&format!("{case} R0"), reflectance, table.reflected(0), TOLERANCE);
            assert_close(&format!("{case} T0"), 1.0 - reflectance, table.transmitted(0), TOLERANCE);
            for order in [-2, -1, 1, 2] {
                assert_close(&format!("{case} R{order}"), 0.0, table.reflected(order), TOLERANCE);
                assert_close(&format!("{case} T{order}"), 0.0, table.transmitted(order), TOLERANCE);
            }
        }
    }
}

#[test]
fn quarter_wave_antireflection_film_cancels_reflection() {
    let wavelength = 0.633;
    let air = Material::from_index(1.0).expect("air");
    let glass = Material::from_index(1.5).expect("glass");
    let coating_index = 1.5_f64.sqrt();
    let coating = Material::from_index(coating_index).expect("coating");

    let stack = Stack::new([
        Layer::homogeneous(&air, 1.0, 0.0).expect("air"),
        Layer::homogeneous(&coating, 1.0, wavelength / (4.0 * coating_index)).expect("film"),
        Layer::homogeneous(&glass, 1.0, 0.0).expect("glass"),
    ])
    .expect("stack");

    let context = IlluminationContext::builder()
        .wavelength(wavelength)
        .order_count(1)
        .build()
        .expect("illumination");
    let table = stack.calc(&context).expect("solve").diffraction_efficiencies().clone();
    assert_close("AR coating R0", 0.0, table.reflected(0), 1.0e-12);
    assert_close("AR coating T0", 1.0, table.transmitted(0), 1.0e-12);
}

#[test]
fn half_wave_film_is_absentee_layer() {
    let wavelength = 1.0;
    let air = Material::from_index(1.0).expect("air");
    let glass = Material::from_index(1.5).expect("glass");
    let film = Material::from_index(2.3).expect("film");

    let stack = Stack::new([
        Layer::homogeneous(&air, 2.0, 0.0).expect("air"),
        Layer::homogeneous(&film, 2.0, wavelength / (2.0 * 2.3)).expect("film"),
        Layer::homogeneous(&glass, 2.0, 0.0).expect("glass"),
    ])
    .expect("stack");
    let context = IlluminationContext::builder()
        .wavelength(wavelength)
        .order_count(2)
        .build()
        .expect("illumination");

    let bare = fresnel(1.0, 1.5, 0.0).reflectance_s;
    let table = stack.calc(&context).expect("solve").diffraction_efficiencies().clone();
    assert_close("half-wave film R0", bare, table.reflected(0), 1.0e-12);
}
