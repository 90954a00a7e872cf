use city_traffic::simulation::{
    BuildingStyle, CityMap, DeactivationReason, DrawItem, GridCoord, Heading, Orientation, Rect,
    RoadKind, RoadWidth, SimConfig, SimEvent, SimWorld, MAX_PEDESTRIANS,
};

fn quiet_config() -> SimConfig {
    SimConfig {
        spawn_period_ms: u32::MAX,
        initial_population: false,
        ..SimConfig::default()
    }
}

fn two_road_map() -> CityMap {
    let mut map = CityMap::empty(2, 8);
    let horizontal = RoadKind::Road(Orientation::Horizontal);
    map.add_road(GridCoord::new(0, 0), RoadWidth::TwoLane, horizontal)
        .unwrap();
    map.add_road(GridCoord::new(0, 4), RoadWidth::TwoLane, horizontal)
        .unwrap();
    map.add_building(GridCoord::new(1, 0), BuildingStyle::RedSlim, true)
        .unwrap();
    map
}

#[test]
fn test_pedestrian_cap_holds_under_repeated_attempts() {
    let mut world = SimWorld::from_map(quiet_config(), two_road_map());
    let cells = [GridCoord::new(0, 0), GridCoord::new(0, 4)];

    let mut spawned = 0;
    for attempt in 0..25 {
        if world.try_spawn_pedestrian(cells[attempt % 2]).is_some() {
            spawned += 1;
        }
        assert!(world.pedestrian_count() <= MAX_PEDESTRIANS);
    }
    assert_eq!(spawned, MAX_PEDESTRIANS);
    assert_eq!(world.pedestrian_count(), MAX_PEDESTRIANS);

    world.tick(16);
    assert!(world.try_spawn_pedestrian(cells[0]).is_none());
}

#[test]
fn test_boundary_spawning_respects_caps() {
    let config = SimConfig {
        seed: 9,
        spawn_chance: 1,
        spawn_period_ms: 160,
        ..SimConfig::default()
    };
    let mut world = SimWorld::generate(config).unwrap();

    for _ in 0..1500 {
        world.tick(16);
        assert!(world.pedestrian_count() <= world.spawner.max_pedestrians);
        assert!(world.vehicle_count() <= world.spawner.max_vehicles);
    }
    let stats = world.stats();
    assert!(stats.pedestrians_spawned > 0);
    assert!(stats.vehicles_spawned > 0);
}

#[test]
fn test_overlapping_vehicle_spawn_is_rejected() {
    let mut world = SimWorld::from_map(quiet_config(), two_road_map());
    let first = world.place_vehicle(GridCoord::new(0, 4), Heading::Right, 0, 0);
    assert!(first.is_some());
    let second = world.place_vehicle(GridCoord::new(0, 4), Heading::Right, 0, 0);
    assert!(second.is_none());

    assert_eq!(world.vehicle_count(), 1);
    assert_eq!(world.stats().rejected, 1);
    let events = world.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        SimEvent::Deactivated {
            reason: DeactivationReason::SpawnRejected,
            ..
        }
    )));
}

#[test]
fn test_collision_signal_squishes_and_damages() {
    let mut world = SimWorld::from_map(quiet_config(), two_road_map());
    let pedestrian = world.try_spawn_pedestrian(GridCoord::new(0, 0)).unwrap();
    let vehicle = world
        .place_vehicle(GridCoord::new(0, 4), Heading::Right, 0, 0)
        .unwrap();
    let pedestrian_box = world.agent(pedestrian).unwrap().bounds();
    let vehicle_box = world.agent(vehicle).unwrap().bounds();

    let affected = world.collision_signal(Rect::new(0, 0, 160, 160), 2);
    assert!(affected.contains(&pedestrian_box));
    assert!(affected.contains(&vehicle_box));
    assert!(affected.contains(&world.map.buildings[0].bounds));

    // Pedestrians are gone at once, vehicles linger as wrecks
    assert!(!world.agent(pedestrian).unwrap().active);
    assert!(world.agent(vehicle).unwrap().flags.squished);
    assert_eq!(world.map.buildings[0].damage, 2);

    let events = world.drain_events();
    let destroyed = events
        .iter()
        .filter(|e| matches!(e, SimEvent::Destroyed { .. }))
        .count();
    assert_eq!(destroyed, 2);
    assert!(events.contains(&SimEvent::Damaged {
        building: world.map.buildings[0].id,
        amount: 2,
    }));
    assert!(events.contains(&SimEvent::Deactivated {
        agent: pedestrian,
        reason: DeactivationReason::Squished,
    }));

    for _ in 0..24 {
        world.tick(16);
    }
    assert!(world.agent(pedestrian).is_none());
    assert!(world.agent(vehicle).is_some());
    world.tick(16);
    assert!(world.agent(vehicle).is_none());
    assert!(world.drain_events().contains(&SimEvent::Deactivated {
        agent: vehicle,
        reason: DeactivationReason::Crashed,
    }));

    // A second hit only finds the building, whose damage is capped
    let again = world.collision_signal(Rect::new(0, 0, 160, 160), 3);
    assert_eq!(again, world.map.buildings[0].bounds);
    assert!(world.map.buildings[0].damage <= 4);
    assert!(world.snapshot().entries.iter().any(|entry| matches!(
        entry.item,
        DrawItem::Building { exploded: true, .. }
    )));
}

#[test]
fn test_snapshot_is_depth_ordered() {
    let mut world = SimWorld::new_with_seed(5).unwrap();
    for _ in 0..200 {
        world.tick(16);
    }
    let snapshot = world.snapshot();

    assert!(snapshot
        .entries
        .windows(2)
        .all(|pair| pair[0].depth <= pair[1].depth));
    assert_eq!(snapshot.roads().count(), world.map.roads.len());
    assert!(snapshot
        .entries
        .iter()
        .take(world.map.roads.len())
        .all(|entry| matches!(entry.item, DrawItem::Road { .. })));
    let active = world.agents().iter().filter(|agent| agent.active).count();
    assert_eq!(snapshot.agents().count(), active);
    assert_eq!(snapshot.elapsed_ms, 200 * 16);
}
