use std::sync::Arc;

use atlas_geom::ChunkPos;
use atlas_runtime::ChunkLeaseManager;
use atlas_world::MemoryWorld;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Acquire(i32, i32),
    Release(i32, i32),
    Finish,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..3i32, 0..3i32).prop_map(|(x, z)| Op::Acquire(x, z)),
        3 => (0..3i32, 0..3i32).prop_map(|(x, z)| Op::Release(x, z)),
        1 => Just(Op::Finish),
    ]
}

proptest! {
    #[test]
    fn pinned_iff_held_once_loads_settle(ops in proptest::collection::vec(op(), 1..60)) {
        let world = Arc::new(MemoryWorld::new(0, 15));
        let mut leases = ChunkLeaseManager::new(Arc::clone(&world));
        let mut model = std::collections::HashMap::<ChunkPos, u32>::new();
        for op in ops {
            match op {
                Op::Acquire(x, z) => {
                    let c = ChunkPos::new(x, z);
                    leases.acquire(c, None);
                    *model.entry(c).or_default() += 1;
                }
                Op::Release(x, z) => {
                    let c = ChunkPos::new(x, z);
                    leases.release(c);
                    if let Some(n) = model.get_mut(&c) {
                        *n = n.saturating_sub(1);
                    }
                }
                Op::Finish => {
                    world.finish_loads();
                    leases.poll();
                }
            }
            for x in 0..3 {
                for z in 0..3 {
                    let c = ChunkPos::new(x, z);
                    let expected = model.get(&c).copied().unwrap_or(0);
                    prop_assert_eq!(leases.count(c), expected);
                    if world.is_pinned(c) {
                        prop_assert!(expected > 0, "{} pinned without a lease", c);
                    }
                }
            }
        }
        world.finish_loads();
        leases.poll();
        for x in 0..3 {
            for z in 0..3 {
                let c = ChunkPos::new(x, z);
                prop_assert_eq!(world.is_pinned(c), leases.count(c) > 0);
            }
        }
    }
}
