//! Property tests for the world model.
//!
//! These tests use `proptest` to generate random sequences of registry
//! operations and game actions and verify that invariants hold afterwards.

use parkworks_world::prelude::*;
use parkworks_world::{guest, misc, vehicle};
use proptest::prelude::*;

/// Operations on the entity registry.
#[derive(Debug, Clone)]
enum RegistryOp {
    Spawn(i32, i32),
    Despawn(usize),
    Move(usize, i32, i32),
    Rebuild,
}

fn registry_op_strategy() -> impl Strategy<Value = RegistryOp> {
    prop_oneof![
        (0..2048i32, 0..2048i32).prop_map(|(x, y)| RegistryOp::Spawn(x, y)),
        (0..64usize).prop_map(RegistryOp::Despawn),
        (0..64usize, -64..64i32, -64..64i32).prop_map(|(i, dx, dy)| RegistryOp::Move(i, dx, dy)),
        Just(RegistryOp::Rebuild),
    ]
}

fn action_strategy() -> impl Strategy<Value = ActionKind> {
    let tile = (0..64i32, 0..64i32).prop_map(|(x, y)| TileCoords::new(x, y));
    prop_oneof![
        tile.clone().prop_map(|tile| ActionKind::SpawnGuest { tile }),
        (tile.clone(), any::<bool>())
            .prop_map(|(tile, provisional)| ActionKind::PlaceFootpath { tile, provisional }),
        tile.clone().prop_map(|tile| ActionKind::RemoveFootpath { tile }),
        tile.clone().prop_map(|tile| ActionKind::ClearLitter { tile }),
        (0..4u16, 0..50u16).prop_map(|(ride, price)| ActionKind::SetRidePrice {
            ride: RideId(ride),
            price,
        }),
        (0..4u16).prop_map(|ride| ActionKind::SetRideStatus {
            ride: RideId(ride),
            status: RideStatus::Testing,
        }),
        (0..4u16).prop_map(|ride| ActionKind::DemolishRide { ride: RideId(ride) }),
        (0..64i32, 0..64i32).prop_map(|(x, y)| ActionKind::PlaceRide {
            ride_type: RideType::Carousel,
            track: vec![TileCoords::new(x, y), TileCoords::new(x, (y + 1) % 64)],
        }),
    ]
}

/// The entity-facing part of a tick, enough to exercise every update path.
fn step(state: &mut SimulationState, queue: &mut ActionQueue) {
    state.map.remove_provisional_elements();
    guest::update_all(state);
    state.map.restore_provisional_elements();
    vehicle::update_all(state);
    misc::update_all(state);
    state.entities.rebuild_spatial_index();
    queue.process_queue(state);
    state.current_ticks += 1;
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn registry_ops_preserve_invariants(ops in prop::collection::vec(registry_op_strategy(), 1..80)) {
        let mut reg = EntityRegistry::new();
        let mut alive: Vec<EntityId> = Vec::new();

        for op in ops {
            match op {
                RegistryOp::Spawn(x, y) => {
                    let id = reg.spawn(CoordsXYZ::new(x, y, 0), EntityData::Litter(Default::default()));
                    alive.push(id);
                }
                RegistryOp::Despawn(i) if !alive.is_empty() => {
                    let id = alive.remove(i % alive.len());
                    prop_assert!(reg.despawn(id).is_ok());
                    prop_assert!(reg.get(id).is_none());
                }
                RegistryOp::Move(i, dx, dy) if !alive.is_empty() => {
                    let id = alive[i % alive.len()];
                    let e = reg.get_mut(id).unwrap();
                    e.position.x += dx;
                    e.position.y += dy;
                }
                RegistryOp::Rebuild => {
                    reg.rebuild_spatial_index();
                    for id in &alive {
                        let tile = reg.get(*id).unwrap().position.tile();
                        prop_assert!(reg.entities_on_tile(tile).contains(id));
                    }
                }
                _ => {}
            }
        }

        prop_assert_eq!(reg.len(), alive.len());
        prop_assert_eq!(reg.iter().count(), alive.len());
        for id in &alive {
            prop_assert!(reg.contains(*id));
        }
    }

    #[test]
    fn same_actions_same_world(
        seed in any::<u64>(),
        actions in prop::collection::vec((0..40u32, action_strategy()), 0..30),
    ) {
        let run = || {
            let mut state = SimulationState::demo(seed);
            let mut queue = ActionQueue::new();
            for (tick, kind) in &actions {
                queue.enqueue(GameAction::new(*tick, kind.clone()));
            }
            for _ in 0..40 {
                step(&mut state, &mut queue);
            }
            WorldSnapshot::capture(&state)
        };
        let a = run();
        let b = run();
        prop_assert_eq!(a.to_bytes(), b.to_bytes());
        prop_assert!(compare(&a, &b).is_empty());
    }

    #[test]
    fn snapshot_restore_is_lossless(seed in any::<u64>(), ticks in 0..60usize) {
        let mut state = SimulationState::demo(seed);
        let mut queue = ActionQueue::new();
        for _ in 0..ticks {
            step(&mut state, &mut queue);
        }
        let snap = WorldSnapshot::capture(&state);
        let restored = snap.restore().unwrap();
        prop_assert_eq!(WorldSnapshot::capture(&restored).checksum(), snap.checksum());
        prop_assert_eq!(restored.srand0(), state.srand0());
    }
}
