use std::collections::HashMap;

use city_traffic::simulation::{
    AgentId, CityMap, DeactivationReason, GridCoord, Heading, IntersectionShape,
    IntersectionVariant, NavState, Orientation, RoadKind, RoadWidth, SimConfig, SimEvent,
    SimWorld, Vec2, MAX_VEHICLE_SPEED,
};

/// Config with the boundary spawner effectively switched off
fn quiet_config() -> SimConfig {
    SimConfig {
        spawn_period_ms: u32::MAX,
        initial_population: false,
        ..SimConfig::default()
    }
}

/// Two horizontal roads leading into a four-way crossing at (0, 8)
fn approach_map() -> CityMap {
    let mut map = CityMap::empty(2, 12);
    let horizontal = RoadKind::Road(Orientation::Horizontal);
    map.add_road(GridCoord::new(0, 0), RoadWidth::TwoLane, horizontal)
        .unwrap();
    map.add_road(GridCoord::new(0, 4), RoadWidth::TwoLane, horizontal)
        .unwrap();
    map.add_road(
        GridCoord::new(0, 8),
        RoadWidth::TwoLane,
        RoadKind::Intersection(IntersectionVariant {
            horizontal: RoadWidth::TwoLane,
            vertical: RoadWidth::TwoLane,
            shape: IntersectionShape::FourWay,
        }),
    )
    .unwrap();
    map
}

/// One row ending in a no-right crossing whose side road would lie below the grid
fn edge_turn_map() -> CityMap {
    let mut map = CityMap::empty(1, 8);
    map.add_road(
        GridCoord::new(0, 0),
        RoadWidth::TwoLane,
        RoadKind::Road(Orientation::Horizontal),
    )
    .unwrap();
    map.add_road(
        GridCoord::new(0, 4),
        RoadWidth::TwoLane,
        RoadKind::Intersection(IntersectionVariant {
            horizontal: RoadWidth::TwoLane,
            vertical: RoadWidth::TwoLane,
            shape: IntersectionShape::ThreeWayNoRight,
        }),
    )
    .unwrap();
    map
}

fn deactivations_of(world: &mut SimWorld, id: AgentId) -> Vec<DeactivationReason> {
    world
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            SimEvent::Deactivated { agent, reason } if agent == id => Some(reason),
            _ => None,
        })
        .collect()
}

/// One long row of horizontal roads
fn straight_map(units: usize) -> CityMap {
    let mut map = CityMap::empty(1, units * 4);
    for unit in 0..units {
        map.add_road(
            GridCoord::new(0, unit * 4),
            RoadWidth::TwoLane,
            RoadKind::Road(Orientation::Horizontal),
        )
        .unwrap();
    }
    map
}

#[test]
fn test_vehicle_approaches_then_stops_at_intersection() {
    let mut world = SimWorld::from_map(quiet_config(), approach_map());
    let id = world
        .place_vehicle(GridCoord::new(0, 0), Heading::Right, 0, MAX_VEHICLE_SPEED)
        .unwrap();
    assert_eq!(world.agent(id).unwrap().nav_state(), NavState::Traveling);

    let mut states = vec![NavState::Traveling];
    for _ in 0..500 {
        world.tick(16);
        let state = world.agent(id).unwrap().nav_state();
        if states.last() != Some(&state) {
            states.push(state);
        }
        if state == NavState::StoppedAtIntersection {
            break;
        }
    }

    assert_eq!(
        states,
        vec![
            NavState::Traveling,
            NavState::ApproachingIntersection,
            NavState::StoppedAtIntersection
        ]
    );
    let agent = world.agent(id).unwrap();
    assert!(agent.velocity.is_zero());
    assert_eq!(agent.target, GridCoord::new(0, 8));
}

#[test]
fn test_stopped_vehicle_is_released_and_leaves_the_map() {
    let mut world = SimWorld::from_map(quiet_config(), approach_map());
    let id = world
        .place_vehicle(GridCoord::new(0, 0), Heading::Right, 0, MAX_VEHICLE_SPEED)
        .unwrap();

    for _ in 0..1000 {
        world.tick(16);
        if world.agent(id).is_none() {
            break;
        }
    }

    assert!(world.agent(id).is_none());
    assert_eq!(
        deactivations_of(&mut world, id),
        vec![DeactivationReason::OutOfBounds]
    );
}

#[test]
fn test_vehicle_turning_off_the_grid_leaves_through_the_edge() {
    let mut world = SimWorld::from_map(quiet_config(), edge_turn_map());
    let id = world
        .place_vehicle(GridCoord::new(0, 0), Heading::Right, 0, MAX_VEHICLE_SPEED)
        .unwrap();

    let mut turned = false;
    for _ in 0..1000 {
        world.tick(16);
        match world.agent(id) {
            Some(agent) => turned |= agent.heading == Heading::Down,
            None => break,
        }
    }

    assert!(turned);
    assert!(world.agent(id).is_none());
    assert_eq!(
        deactivations_of(&mut world, id),
        vec![DeactivationReason::OutOfBounds]
    );
}

#[test]
fn test_vehicle_off_the_road_network_is_retired() {
    let mut world = SimWorld::from_map(quiet_config(), approach_map());
    // Inside the world but below every road of row 0
    let id = world.place_vehicle_at(
        Vec2::new(100.0, 120.0),
        Heading::Right,
        0,
        GridCoord::new(0, 4),
    );
    let bounds = world.agent(id).unwrap().bounds();
    assert!(world.map.world_bounds().contains(&bounds));
    assert!(world.map.roads.iter().all(|road| !road.bounds.intersects(&bounds)));

    world.tick(16);
    assert!(world.agent(id).is_none());
    assert_eq!(
        deactivations_of(&mut world, id),
        vec![DeactivationReason::OffNetwork]
    );
}

#[test]
fn test_trailing_vehicle_slows_and_never_passes() {
    let mut world = SimWorld::from_map(quiet_config(), straight_map(10));
    let leader = world.place_vehicle_at(
        Vec2::new(200.0, 45.0),
        Heading::Right,
        MAX_VEHICLE_SPEED,
        GridCoord::new(0, 8),
    );
    let follower = world.place_vehicle_at(
        Vec2::new(190.0, 45.0),
        Heading::Right,
        MAX_VEHICLE_SPEED,
        GridCoord::new(0, 8),
    );

    let mut slowed_at = None;
    for tick in 1..=300 {
        world.tick(16);
        let (Some(lead), Some(trail)) = (world.agent(leader), world.agent(follower)) else {
            break;
        };
        if slowed_at.is_none() && trail.flags.slow_down_queued {
            slowed_at = Some(tick);
        }
        assert!(
            trail.center().x < lead.center().x,
            "tick {tick}: follower at {} passed leader at {}",
            trail.center().x,
            lead.center().x
        );
    }

    let slowed_at = slowed_at.expect("follower never queued a slow-down");
    assert!(slowed_at <= 3);
}

#[test]
fn test_vehicle_speed_stays_bounded() {
    let config = SimConfig {
        seed: 11,
        spawn_chance: 2,
        ..SimConfig::default()
    };
    let mut world = SimWorld::generate(config).unwrap();
    let mut last_speed: HashMap<AgentId, i32> = HashMap::new();

    for _ in 0..2000 {
        world.tick(16);
        for agent in world.agents().iter().filter(|a| a.active && a.is_vehicle()) {
            assert!(agent.velocity.x.abs() <= MAX_VEHICLE_SPEED);
            assert!(agent.velocity.y.abs() <= MAX_VEHICLE_SPEED);
            assert!(agent.velocity.x == 0 || agent.velocity.y == 0);

            let speed = agent.velocity.magnitude();
            if let Some(previous) = last_speed.insert(agent.id, speed) {
                assert!(
                    speed <= previous + 1,
                    "vehicle {:?} jumped from {} to {}",
                    agent.id,
                    previous,
                    speed
                );
            }
        }
    }
}

#[test]
fn test_assigned_nodes_always_resolve() {
    for seed in [2, 19, 256] {
        let config = SimConfig {
            seed,
            spawn_chance: 3,
            ..SimConfig::default()
        };
        let mut world = SimWorld::generate(config).unwrap();
        for _ in 0..1500 {
            world.tick(16);
            for agent in world.agents().iter().filter(|a| a.active) {
                let Some(node) = agent.node else { continue };
                let road = world
                    .map
                    .road_at(node.cell)
                    .unwrap_or_else(|| panic!("agent {:?} keyed to empty cell", agent.id));
                assert!(
                    road.anchor(node.role).is_some(),
                    "agent {:?} keyed to undefined {:?} at {}",
                    agent.id,
                    node.role,
                    node.cell
                );
            }
        }
    }
}

#[test]
fn test_deactivation_is_final() {
    let mut world = SimWorld::from_map(quiet_config(), straight_map(6));
    let id = world
        .place_vehicle(GridCoord::new(0, 8), Heading::Right, 0, MAX_VEHICLE_SPEED)
        .unwrap();
    world.tick(16);
    let position = world.agent(id).unwrap().position;

    assert!(world.retire_agent(id, DeactivationReason::OffNetwork));
    assert!(!world.retire_agent(id, DeactivationReason::OutOfBounds));
    let agent = world.agent(id).unwrap();
    assert!(!agent.active);
    assert_eq!(agent.position, position);

    for _ in 0..10 {
        world.tick(16);
        assert!(world.agent(id).is_none());
    }
    let deactivations = world
        .drain_events()
        .into_iter()
        .filter(|event| matches!(event, SimEvent::Deactivated { agent, .. } if *agent == id))
        .count();
    assert_eq!(deactivations, 1);
}
