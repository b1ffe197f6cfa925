use rcwa_core::{IlluminationContext, Layer, Material, RcwaErrorCategory, Slab, Stack};

fn metal_free_grating() -> Stack {
    let air = Material::from_index(1.0).expect("air");
    let ridge = Material::from_index(3.5).expect("ridge");
    let glass = Material::from_index(1.45).expect("glass");
    let grating = Slab::new([
        ridge.fragment(0.3).expect("ridge"),
        air.fragment(0.7).expect("groove"),
    ])
    .expect("grating");

    Stack::new([
        Layer::homogeneous(&air, 1.0, 0.0).expect("air"),
        grating.layer(0.4).expect("grating"),
        Layer::homogeneous(&glass, 1.0, 0.0).expect("glass"),
    ])
    .expect("stack")
}

fn specular_transmission(stack: &Stack, order_count: usize, psi: f64) -> f64 {
    let context = IlluminationContext::builder()
        .wavelength(1.3)
        .order_count(order_count)
        .incidence_angle(0.2)
        .polarization_angle(psi)
        .build()
        .expect("illumination");
    stack
        .calc(&context)
        .unwrap_or_else(|error| panic!("N={order_count} ψ={psi}: {error}"))
        .diffraction_efficiencies()
        .transmitted(0)
}

#[test]
fn truncation_error_shrinks_as_orders_are_added() {
    let stack = metal_free_grating();
    for (label, psi) in [("TE", std::f64::consts::FRAC_PI_2), ("TM", 0.0)] {
        let reference = specular_transmission(&stack, 40, psi);
        let coarse = (specular_transmission(&stack, 5, psi) - reference).abs();
        let medium = (specular_transmission(&stack, 15, psi) - reference).abs();
        let fine = (specular_transmission(&stack, 25, psi) - reference).abs();

        assert!(
            fine <= coarse,
            "{label}: error at N=25 ({fine:.3e}) should not exceed N=5 ({coarse:.3e})"
        );
        assert!(medium < 2.0e-2, "{label}: N=15 error {medium:.3e}");
        assert!(fine < 1.0e-2, "{label}: N=25 error {fine:.3e}");
    }
}

#[test]
fn order_count_must_keep_at_least_one_order_per_side() {
    let error = IlluminationContext::builder()
        .wavelength(1.3)
        .order_count(0)
        .build()
        .expect_err("zero orders must be rejected");
    assert_eq!(error.category(), RcwaErrorCategory::InvalidIllumination);
    assert_eq!(error.placeholder(), "ILLUMINATION.ORDER_COUNT");
}
