//! Water stage: occlusion query queue discipline and target management.

mod common;

use glam::Mat4;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use glade3d::gfx::SurfaceSize;
use glade3d::scene::water::WaterStage;

use common::{MockDevice, MockState};

fn size() -> SurfaceSize {
    SurfaceSize {
        width: 640,
        height: 480,
    }
}

fn build(device: &MockDevice) -> WaterStage {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    WaterStage::new(
        0.0,
        (-64.0, -64.0, 64.0, 64.0),
        [173, 216, 230, 255],
        size(),
        device,
        &mut rng,
    )
    .unwrap()
}

fn probe(water: &mut WaterStage, state: &mut MockState, device: &MockDevice) {
    water.check_occlusion(Mat4::IDENTITY, Mat4::IDENTITY, state, device);
}

#[test]
fn should_draw_defaults_to_false_until_a_query_completes() {
    let device = MockDevice::default();
    let mut water = build(&device);
    let mut state = MockState::default();

    assert!(!water.should_draw());

    probe(&mut water, &mut state, &device);
    // The query has not completed yet.
    assert!(!water.should_draw());

    device.queries.borrow()[0].complete(true);
    assert!(water.should_draw());
}

#[test]
fn queries_are_collected_in_issue_order() {
    let device = MockDevice::default();
    let mut water = build(&device);
    let mut state = MockState::default();

    for _ in 0..3 {
        probe(&mut water, &mut state, &device);
    }

    // The second query completing does nothing while the first is pending.
    device.queries.borrow()[1].complete(true);
    assert!(!water.should_draw());

    // Once the first completes, collection drains through the second and
    // stops at the third; the newest collected result wins.
    device.queries.borrow()[0].complete(false);
    assert!(water.should_draw());

    // The third completes with a miss and overrides the cached value.
    device.queries.borrow()[2].complete(false);
    assert!(!water.should_draw());
}

#[test]
fn cached_result_persists_while_no_query_is_ready() {
    let device = MockDevice::default();
    let mut water = build(&device);
    let mut state = MockState::default();

    probe(&mut water, &mut state, &device);
    device.queries.borrow()[0].complete(true);
    assert!(water.should_draw());

    probe(&mut water, &mut state, &device);
    // The new probe is still in flight; the cached hit stands.
    assert!(water.should_draw());
    assert!(water.should_draw());
}

#[test]
fn occlusion_probe_disables_writes_around_the_draw() {
    let device = MockDevice::default();
    let mut water = build(&device);
    let mut state = MockState::default();

    probe(&mut water, &mut state, &device);
    assert_eq!(
        state.log,
        vec!["mask:false:false".to_string(), "mask:true:true".to_string()]
    );
}

#[test]
fn resize_recreates_both_attachments_once() {
    let device = MockDevice::default();
    let mut water = build(&device);

    let bigger = SurfaceSize {
        width: 1280,
        height: 720,
    };
    water.resize(bigger);
    assert_eq!(device.target_resizes.borrow().len(), 2);
    assert!(device.target_resizes.borrow().iter().all(|s| *s == bigger));

    // Same size again is a no-op.
    water.resize(bigger);
    assert_eq!(device.target_resizes.borrow().len(), 2);
}

#[test]
fn reflection_pass_flips_winding_and_clips() {
    let device = MockDevice::default();
    let water = build(&device);
    let mut state = MockState::default();

    water.begin_reflection(&mut state);
    water.end_reflection(&mut state);
    assert_eq!(
        state.log,
        vec![
            "clip:on".to_string(),
            "face:cw".to_string(),
            "bind:offscreen".to_string(),
            "clear".to_string(),
            "bind:default".to_string(),
            "face:ccw".to_string(),
            "clip:off".to_string(),
        ]
    );

    let plane = water.reflection_clip_plane();
    assert_eq!((plane.x, plane.y, plane.z, plane.w), (0.0, 1.0, 0.0, 3.0));
    let plane = water.refraction_clip_plane();
    assert_eq!((plane.x, plane.y, plane.z, plane.w), (0.0, -1.0, 0.0, 3.0));
}

#[test]
fn ripple_textures_are_uploaded_as_two_channel_squares() {
    let device = MockDevice::default();
    let _water = build(&device);

    let textures = device.textures.borrow();
    let ripples: Vec<_> = textures.iter().filter(|t| t.3 == 2).collect();
    assert_eq!(ripples.len(), 2);
    for t in ripples {
        assert_eq!((t.0, t.1, t.2), (256, 256, 1));
    }
}
