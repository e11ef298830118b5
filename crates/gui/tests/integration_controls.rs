//! Integration tests for orbit controls driven through an activation.

use glam::Vec2;
use tokio::runtime::Handle;

use notebook_gui_lib::camera::{InputEvent, PointerButton};
use notebook_gui_lib::harness::ViewerHarness;
use notebook_gui_lib::state::ControlSettings;
use shared::ViewerConfig;

struct XorShift(u32);

impl XorShift {
    fn next(&mut self) -> u32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        self.0
    }

    fn signed(&mut self, range: f32) -> f32 {
        (self.next() % 10_001) as f32 / 10_000.0 * 2.0 * range - range
    }
}

fn random_event(rng: &mut XorShift) -> InputEvent {
    let position = Vec2::new(rng.signed(2000.0), rng.signed(2000.0));
    match rng.next() % 5 {
        0 => InputEvent::PointerDown {
            button: if rng.next() % 2 == 0 {
                PointerButton::Primary
            } else {
                PointerButton::Secondary
            },
            position,
        },
        1 | 2 => InputEvent::PointerMove { position },
        3 => InputEvent::PointerUp,
        _ => InputEvent::Wheel {
            delta: rng.signed(40.0),
        },
    }
}

#[tokio::test]
async fn test_random_input_keeps_camera_within_limits() {
    let settings = ControlSettings::default();
    let mut h = ViewerHarness::new(Handle::current()).with_controls(settings.clone());
    let mut handle = h.activate(ViewerConfig::new(5)).unwrap();
    let mut rng = XorShift(0xC0FF_EE11);

    for step in 0..2_000 {
        handle.handle_input(random_event(&mut rng));
        if step % 4 == 0 {
            h.tick(&mut handle, 1).unwrap();
        }

        let ctl = handle.controller().unwrap();
        for s in [ctl.goal(), ctl.current()] {
            assert!(s.radius >= settings.min_distance - 1e-4, "radius {}", s.radius);
            assert!(s.radius <= settings.max_distance + 1e-4, "radius {}", s.radius);
            assert!(
                s.polar >= 0.0 && s.polar <= settings.max_polar_angle + 1e-4,
                "polar {}",
                s.polar
            );
        }

        let camera = handle.camera().unwrap();
        let distance = camera.position.distance(camera.target);
        assert!(distance.is_finite());
        assert!(
            distance >= settings.min_distance - 1e-3 && distance <= settings.max_distance + 1e-3
        );
    }
}

#[tokio::test]
async fn test_zoom_settles_at_limit() {
    let mut h = ViewerHarness::new(Handle::current());
    let mut handle = h.activate(ViewerConfig::new(2)).unwrap();

    for _ in 0..50 {
        handle.handle_input(InputEvent::Wheel { delta: 10.0 });
    }
    let min = handle.controller().unwrap().settings().min_distance;
    assert_eq!(handle.controller().unwrap().goal().radius, min);

    let mut last = f32::MAX;
    for _ in 0..400 {
        h.tick(&mut handle, 1).unwrap();
        let radius = handle.controller().unwrap().current().radius;
        assert!(radius <= last);
        last = radius;
    }
    assert!(handle.controller().unwrap().is_settled());
    let camera = handle.camera().unwrap();
    assert!((camera.position.distance(camera.target) - min).abs() < 1e-3);
}

#[tokio::test]
async fn test_pan_disabled_ignores_secondary_drag() {
    let settings = ControlSettings {
        enable_pan: false,
        ..ControlSettings::default()
    };
    let mut h = ViewerHarness::new(Handle::current()).with_controls(settings);
    let mut handle = h.activate(ViewerConfig::new(2)).unwrap();
    let pivot = handle.controller().unwrap().pivot();

    handle.handle_input(InputEvent::PointerDown {
        button: PointerButton::Secondary,
        position: Vec2::ZERO,
    });
    handle.handle_input(InputEvent::PointerMove {
        position: Vec2::new(300.0, 300.0),
    });
    handle.handle_input(InputEvent::PointerUp);
    h.tick(&mut handle, 5).unwrap();

    assert_eq!(handle.controller().unwrap().pivot(), pivot);
    assert!(handle.controller().unwrap().is_settled());
}

#[tokio::test]
async fn test_reset_returns_home() {
    let mut h = ViewerHarness::new(Handle::current());
    let mut handle = h.activate(ViewerConfig::new(3)).unwrap();
    let home = handle.controller().unwrap().goal_position();

    handle.handle_input(InputEvent::PointerDown {
        button: PointerButton::Primary,
        position: Vec2::ZERO,
    });
    handle.handle_input(InputEvent::PointerMove {
        position: Vec2::new(-150.0, 80.0),
    });
    handle.handle_input(InputEvent::PointerUp);
    handle.handle_input(InputEvent::Wheel { delta: -3.0 });
    h.tick(&mut handle, 10).unwrap();
    assert!(handle.controller().unwrap().goal_position().distance(home) > 0.1);

    handle.reset_camera();
    assert!(handle.controller().unwrap().goal_position().distance(home) < 1e-4);
    h.tick(&mut handle, 600).unwrap();
    assert!(handle.camera().unwrap().position.distance(home) < 1e-3);
}
