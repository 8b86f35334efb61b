use std::time::{Duration, Instant};

use booth_floorplan::geometry::Point;
use booth_floorplan::viewport::{GestureState, Viewport, ViewportLimits};
use proptest::prelude::*;

fn unclamped() -> Viewport {
    Viewport::new(ViewportLimits { max_pan: 1.0e9, ..ViewportLimits::default() })
}

fn in_bounds(vp: &Viewport) -> bool {
    let o = vp.offset();
    (-500.0..=500.0).contains(&o.x) && (-500.0..=500.0).contains(&o.y)
}

#[derive(Debug, Clone)]
enum Op {
    Drag { dx: f64, dy: f64, ms: u64 },
    Wheel { delta: f64, x: f64, y: f64 },
    DoubleClick { x: f64, y: f64 },
    Pinch { from: f64, to: f64 },
    Frames(u8),
    ZoomIn,
    ZoomOut,
    SetOffset { x: f64, y: f64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-2000.0..2000.0f64, -2000.0..2000.0f64, 1u64..100).prop_map(|(dx, dy, ms)| Op::Drag { dx, dy, ms }),
        (-3000.0..3000.0f64, 0.0..800.0f64, 0.0..600.0f64).prop_map(|(delta, x, y)| Op::Wheel { delta, x, y }),
        (0.0..800.0f64, 0.0..600.0f64).prop_map(|(x, y)| Op::DoubleClick { x, y }),
        (10.0..400.0f64, 10.0..400.0f64).prop_map(|(from, to)| Op::Pinch { from, to }),
        (1u8..60).prop_map(Op::Frames),
        Just(Op::ZoomIn),
        Just(Op::ZoomOut),
        (-5000.0..5000.0f64, -5000.0..5000.0f64).prop_map(|(x, y)| Op::SetOffset { x, y }),
    ]
}

fn apply(vp: &mut Viewport, op: &Op, clock: &mut Instant) {
    match *op {
        Op::Drag { dx, dy, ms } => {
            let start = Point::new(400.0, 300.0);
            vp.begin_drag(start, *clock);
            *clock += Duration::from_millis(ms);
            vp.drag_to(start + Point::new(dx, dy), *clock);
            vp.end_drag();
        }
        Op::Wheel { delta, x, y } => vp.wheel_zoom(delta, Point::new(x, y)),
        Op::DoubleClick { x, y } => vp.toggle_detail(Point::new(x, y)),
        Op::Pinch { from, to } => {
            let c = Point::new(400.0, 300.0);
            vp.begin_pinch(c - Point::new(from / 2.0, 0.0), c + Point::new(from / 2.0, 0.0));
            vp.pinch_to(c - Point::new(to / 2.0, 0.0), c + Point::new(to / 2.0, 0.0));
            vp.end_touch(0);
        }
        Op::Frames(n) => {
            for _ in 0..n {
                vp.step();
            }
        }
        Op::ZoomIn => vp.zoom_in(),
        Op::ZoomOut => vp.zoom_out(),
        Op::SetOffset { x, y } => vp.set_offset(Point::new(x, y)),
    }
}

proptest! {
    #[test]
    fn zoom_keeps_point_under_anchor(
        start in 0.5..=5.0f64,
        target in 0.5..=5.0f64,
        ax in 0.0..800.0f64,
        ay in 0.0..600.0f64,
    ) {
        let mut vp = unclamped();
        vp.zoom_at(start, Point::new(400.0, 300.0));
        let anchor = Point::new(ax, ay);
        let before = vp.screen_to_content(anchor);
        vp.zoom_at(target, anchor);
        let after = vp.screen_to_content(anchor);
        prop_assert!((vp.scale() - target).abs() < 1e-12);
        prop_assert!(before.distance(after) < 1e-6, "moved from {:?} to {:?}", before, after);
    }

    #[test]
    fn offset_stays_clamped_after_any_sequence(ops in prop::collection::vec(op(), 1..40)) {
        let mut vp = Viewport::default();
        let mut clock = Instant::now();
        for op in &ops {
            apply(&mut vp, op, &mut clock);
            prop_assert!(in_bounds(&vp), "offset {:?} after {:?}", vp.offset(), op);
            prop_assert!((0.5..=5.0).contains(&vp.scale()));
        }
    }

    #[test]
    fn momentum_decays_and_terminates(vx in -50.0..50.0f64, vy in -50.0..50.0f64) {
        prop_assume!(vx.hypot(vy) > 1.0);
        let t0 = Instant::now();
        let mut vp = Viewport::default();
        vp.begin_drag(Point::ZERO, t0);
        vp.drag_to(Point::new(vx, vy), t0 + Duration::from_millis(16));
        prop_assert_eq!(vp.end_drag(), GestureState::MomentumAnimating);

        let mut speed = vp.velocity().length();
        let mut frames = 0;
        while vp.step() {
            frames += 1;
            let now = vp.velocity().length();
            prop_assert!(now < speed);
            prop_assert!(in_bounds(&vp));
            speed = now;
            prop_assert!(frames < 100, "momentum did not stop");
        }
        prop_assert_eq!(vp.state(), GestureState::Idle);
        prop_assert_eq!(vp.velocity(), Point::ZERO);
    }
}

#[test]
fn fast_drag_release_coasts_to_idle_within_bounds() {
    let t0 = Instant::now();
    let mut vp = Viewport::default();
    vp.begin_drag(Point::new(100.0, 100.0), t0);
    for i in 1..=5u64 {
        let pos = Point::new(100.0 + 45.0 * i as f64, 100.0 + 30.0 * i as f64);
        assert!(vp.drag_to(pos, t0 + Duration::from_millis(16 * i)));
    }
    assert_eq!(vp.end_drag(), GestureState::MomentumAnimating);

    let mut frames = 0;
    while vp.step() {
        frames += 1;
        assert!(frames < 200);
    }
    assert_eq!(vp.state(), GestureState::Idle);
    assert!(in_bounds(&vp));
    // 225 + 45 * 0.92 / 0.08 > 500: инерция упирается в предел
    assert_eq!(vp.offset().x, 500.0);
}

#[test]
fn new_gesture_cancels_momentum_mid_flight() {
    let t0 = Instant::now();
    let mut vp = Viewport::default();
    vp.begin_drag(Point::ZERO, t0);
    vp.drag_to(Point::new(30.0, 0.0), t0 + Duration::from_millis(16));
    vp.end_drag();
    vp.step();
    let frozen = vp.offset();
    vp.begin_pinch(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
    assert_eq!(vp.state(), GestureState::Pinching);
    assert!(!vp.step());
    assert_eq!(vp.offset(), frozen);
}
