// Window lifecycle integration tests for GLPS
//
// Drives the window core against the headless graphics backend: ID
// assignment, reverse lookup, one-time shared setup, per-window objects and
// frame pacing across destroy.

use glps::config::GlpsConfig;
use glps::error::{GlpsError, Result};
use glps::manager::WindowSystem;
use glps::renderer::{HeadlessBackend, DEMO_QUAD};
use glps::window::{SurfaceKey, WindowId, WindowProperties};
use proptest::prelude::*;
use std::time::{Duration, Instant};

type System = WindowSystem<u32, HeadlessBackend>;

fn system(capacity: usize) -> System {
    let mut config = GlpsConfig::default();
    config.window.capacity = capacity;
    WindowSystem::new(&config, HeadlessBackend::new())
}

fn create(system: &mut System, surface: u32) -> Result<WindowId> {
    system.register(
        &WindowProperties::new(format!("W{}", surface), 640, 480),
        SurfaceKey(surface),
        surface,
        |_| &(),
    )
}

#[test]
fn test_first_window_sets_up_shared_state() {
    let mut system = system(16);
    let id = system
        .register(
            &WindowProperties::new("W0", 640, 480),
            SurfaceKey(100),
            100,
            |_| &(),
        )
        .unwrap();

    assert_eq!(id, WindowId::from_raw_parts(0, 0));
    assert_eq!(id.to_string(), "0");

    let counters = system.render().backend().counters();
    assert_eq!(counters.contexts_created, 1);
    assert_eq!(counters.shared_setups, 1);
    assert_eq!(counters.vao_pairs_created, 1);
    assert_eq!(counters.objects_without_current, 0);

    let record = system.window(id).unwrap();
    assert_eq!(record.title, "W0");
    assert_eq!((record.width, record.height), (640, 480));
}

#[test]
fn test_more_windows_reuse_shared_setup() {
    let mut system = system(16);
    let ids: Vec<WindowId> = (0..4).map(|n| create(&mut system, 100 + n).unwrap()).collect();

    let indices: Vec<usize> = ids.iter().map(|id| id.index()).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);

    let counters = system.render().backend().counters();
    assert_eq!(counters.contexts_created, 1);
    assert_eq!(counters.shared_setups, 1);
    assert_eq!(counters.vao_pairs_created, 4);
    assert_eq!(counters.surfaces_created, 4);
}

#[test]
fn test_resolve_after_create() {
    let mut system = system(16);
    let first = create(&mut system, 7).unwrap();
    let second = create(&mut system, 9).unwrap();

    assert_eq!(system.resolve(SurfaceKey(7)), Some(first));
    assert_eq!(system.resolve(SurfaceKey(9)), Some(second));
    assert_eq!(system.resolve(SurfaceKey(8)), None);
}

#[test]
fn test_destroy_releases_window_objects() {
    let mut system = system(16);
    let first = create(&mut system, 1).unwrap();
    create(&mut system, 2).unwrap();

    assert_eq!(system.unregister(first).unwrap(), 1);
    let counters = system.render().backend().counters();
    assert_eq!(counters.vao_pairs_released, 1);
    assert_eq!(counters.surfaces_destroyed, 1);
    assert_eq!(counters.shared_releases, 0);
    assert_eq!(system.len(), 1);
    assert_eq!(system.resolve(SurfaceKey(1)), None);
}

#[test]
fn test_destroyed_id_is_stale() {
    let mut system = system(16);
    let id = create(&mut system, 1).unwrap();
    system.unregister(id).unwrap();

    assert!(matches!(system.window(id), Err(GlpsError::StaleWindow(_))));
    assert!(matches!(system.unregister(id), Err(GlpsError::StaleWindow(_))));
    assert!(matches!(
        system.window(WindowId::from_raw_parts(9, 0)),
        Err(GlpsError::UnknownWindow(_))
    ));
}

#[test]
fn test_full_table_reuses_slot_with_new_generation() {
    let mut system = system(2);
    let first = create(&mut system, 1).unwrap();
    create(&mut system, 2).unwrap();
    assert!(matches!(
        create(&mut system, 3),
        Err(GlpsError::CapacityExceeded { capacity: 2 })
    ));

    system.unregister(first).unwrap();
    let reused = create(&mut system, 4).unwrap();
    assert_eq!(reused.index(), first.index());
    assert_ne!(reused, first);
    assert_eq!(reused.to_string(), "0v1");
    assert!(system.window(first).is_err());
}

#[test]
fn test_frame_registration_never_overlaps() {
    let mut system = system(4);
    let id = create(&mut system, 1).unwrap();

    let mut tickets = Vec::new();
    for _ in 0..3 {
        system
            .present(id, |_, ticket| tickets.push(ticket), |canvas| {
                canvas.draw_triangles(&DEMO_QUAD)
            })
            .unwrap();
    }
    assert_eq!(tickets.len(), 1, "only one outstanding frame request");

    let now = Instant::now();
    assert!(system.complete_frame(tickets[0], now));
    assert!(!system.complete_frame(tickets[0], now + Duration::from_millis(16)));

    system.present(id, |_, ticket| tickets.push(ticket), |_| {}).unwrap();
    assert_eq!(tickets.len(), 2);
    assert_ne!(tickets[0], tickets[1]);
}

#[test]
fn test_late_completion_after_destroy_is_ignored() {
    let mut system = system(1);
    let first = create(&mut system, 1).unwrap();
    let mut tickets = Vec::new();
    system.present(first, |_, ticket| tickets.push(ticket), |_| {}).unwrap();

    system.unregister(first).unwrap();
    let second = create(&mut system, 2).unwrap();
    assert_eq!(second.index(), first.index());

    assert!(!system.complete_frame(tickets[0], Instant::now()));
    system.present(second, |_, ticket| tickets.push(ticket), |_| {}).unwrap();
    assert_eq!(tickets.len(), 2);
}

#[test]
fn test_failed_shared_setup_leaves_no_window() {
    let mut config = GlpsConfig::default();
    config.window.capacity = 4;
    let mut backend = HeadlessBackend::new();
    backend.fail_shared_setup(true);
    let mut system: System = WindowSystem::new(&config, backend);

    let err = create(&mut system, 1).unwrap_err();
    assert!(matches!(err, GlpsError::Shader { .. }));
    assert!(!err.is_recoverable());
    assert!(system.is_empty());
    assert_eq!(system.resolve(SurfaceKey(1)), None);

    let counters = system.render().backend().counters();
    assert_eq!(counters.surfaces_created, counters.surfaces_destroyed);
}

#[test]
fn test_teardown_releases_everything_once() {
    let mut system = system(8);
    for n in 0..3 {
        create(&mut system, n).unwrap();
    }
    let natives = system.teardown();
    assert_eq!(natives, vec![0, 1, 2]);

    let counters = system.render().backend().counters();
    assert_eq!(counters.shared_releases, 1);
    assert_eq!(counters.vao_pairs_released, 3);
    assert_eq!(counters.surfaces_destroyed, 3);
    assert_eq!(counters.teardowns, 1);
    assert_eq!(counters.objects_without_current, 0);
}

proptest! {
    #[test]
    fn prop_ids_never_repeat(ops in prop::collection::vec(any::<bool>(), 1..64)) {
        let mut system = system(4);
        let mut seen = std::collections::HashSet::new();
        let mut live: Vec<WindowId> = Vec::new();
        let mut surface = 0;

        for create_op in ops {
            if create_op {
                surface += 1;
                match create(&mut system, surface) {
                    Ok(id) => {
                        prop_assert!(seen.insert(id), "id {} handed out twice", id);
                        live.push(id);
                    }
                    Err(err) => prop_assert!(
                        matches!(err, GlpsError::CapacityExceeded { .. }),
                        "unexpected error {:?}",
                        err
                    ),
                }
            } else if !live.is_empty() {
                let id = live.remove(0);
                prop_assert!(system.unregister(id).is_ok());
            }
        }

        let counters = system.render().backend().counters();
        prop_assert!(counters.shared_setups <= 1);
        prop_assert_eq!(system.len(), live.len());
    }
}
