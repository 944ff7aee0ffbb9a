use crate::BlendCurve;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1e-5,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

#[test]
fn every_curve_maps_endpoints_to_zero_and_one() {
    for curve in BlendCurve::ALL {
        let start = curve.evaluate(0.0);
        let end = curve.evaluate(1.0);
        assert!(start <= 0.01, "{}: start {start}", curve.name());
        assert!(end >= 0.99, "{}: end {end}", curve.name());
    }
}

#[test]
fn every_curve_is_monotonic() {
    for curve in BlendCurve::ALL {
        let mut prev = curve.evaluate(0.0);
        for i in 1..=100 {
            let value = curve.evaluate(i as f32 / 100.0);
            assert!(
                value + 1e-6 >= prev,
                "{} decreased at step {i}: {prev} -> {value}",
                curve.name()
            );
            prev = value;
        }
    }
}

#[test]
fn curve_midpoints() {
    assert_approx(BlendCurve::Linear.evaluate(0.5), 0.5);
    assert_approx(BlendCurve::UniformS.evaluate(0.5), 0.5);
    assert_approx(BlendCurve::QuadraticEaseIn.evaluate(0.5), 0.25);
    assert_approx(BlendCurve::QuadraticEaseOut.evaluate(0.5), 0.75);
    assert_approx(BlendCurve::QuadraticEaseInOut.evaluate(0.25), 0.125);
    assert_approx(BlendCurve::CubicEaseIn.evaluate(0.5), 0.125);
    assert_approx(BlendCurve::CubicEaseOut.evaluate(0.5), 0.875);
    assert_approx(BlendCurve::CubicEaseInOut.evaluate(0.5), 0.5);
    assert_approx(BlendCurve::SinusoidalEaseInOut.evaluate(0.5), 0.5);
    assert_approx(BlendCurve::EaseIn.evaluate(0.5), 0.125 * (2.5 - 1.5 * 0.25));
}

#[test]
fn curves_clamp_input() {
    assert_approx(BlendCurve::Linear.evaluate(-3.0), 0.0);
    assert_approx(BlendCurve::Linear.evaluate(7.0), 1.0);
}

#[test]
fn curve_names_round_trip() {
    for curve in BlendCurve::ALL {
        assert_eq!(BlendCurve::from_name(curve.name()), Some(curve));
    }
    assert_eq!(BlendCurve::from_name("bogus"), None);
}
