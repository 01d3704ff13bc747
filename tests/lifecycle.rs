//! End-to-end lifecycle flows across the reference core, the deferred-erase
//! collections and the named cache.

use tether::{live_counter_count, NamedCache, Obs, Own, OwnList, OwnSet};

#[test]
fn cache_end_to_end() {
    let mut cache = NamedCache::new();
    cache.create("a", 42u32).unwrap();

    let held = cache.get("a").expect("entry just created");
    assert_eq!(*held.get().unwrap(), 42);

    // still observed, clean keeps it
    cache.clean();
    assert!(cache.get("a").is_some());

    // last observer gone, clean reclaims it
    drop(held);
    cache.clean();
    assert!(cache.get("a").is_none());
    assert!(cache.create("a", 7u32).is_ok());
}

#[test]
fn frame_update_pass() {
    // the motivating pattern: walk the working set once per frame, request
    // removals mid-walk, sweep at a controlled point afterwards
    struct Entity {
        health: std::cell::Cell<i32>,
    }

    let mut world = OwnList::new();
    for health in [3, 0, 5, -2] {
        world.append(Entity {
            health: std::cell::Cell::new(health),
        });
    }

    for entity in world.iter() {
        let entity = entity.get().unwrap();
        entity.health.set(entity.health.get() - 1);
    }
    for entity in world.iter() {
        if entity.get().unwrap().health.get() <= 0 {
            world.queue_for_erase(&entity);
        }
    }
    assert_eq!(world.len(), 4);
    assert_eq!(world.process_erase_queue(), 2);

    let alive: Vec<i32> = world
        .iter()
        .map(|e| e.get().unwrap().health.get())
        .collect();
    assert_eq!(alive, [2, 4]);
}

#[test]
fn observers_outlive_collection_flush() {
    let mut set = OwnSet::new();
    let kept = set.insert(String::from("kept"));
    let doomed = set.insert(String::from("doomed"));

    set.queue_for_erase(&doomed);
    set.process_erase_queue();

    assert_eq!(&*kept.get().unwrap(), "kept");
    assert!(doomed.get().is_err());
    assert!(doomed.is_valid());
    assert_eq!(doomed.id(), 0);
}

#[test]
fn no_counter_leaks_across_components() {
    let base = live_counter_count();
    {
        let mut cache = NamedCache::new();
        let mut list = OwnList::new();

        let a = cache.create("a", 1u32).unwrap();
        let b = list.append(2u32);
        let extra: Vec<Obs<u32>> = (0..8).map(|_| b.clone()).collect();

        drop(a);
        cache.clean();
        list.queue_all_for_erase();
        list.process_erase_queue();
        drop(extra);
        drop(b);
    }
    assert_eq!(live_counter_count(), base);
}

#[test]
fn heterogeneous_cache_of_erased_objects() {
    use std::any::Any;

    struct Texture {
        width: u32,
    }
    struct Mesh {
        vertices: usize,
    }

    let mut store: NamedCache<dyn Any> = NamedCache::new();
    store
        .create_own("grass", Own::new(Texture { width: 64 }).erased())
        .unwrap();
    store
        .create_own("rock", Own::new(Mesh { vertices: 96 }).erased())
        .unwrap();

    let grass = store.get("grass").unwrap().downcast::<Texture>();
    assert_eq!(grass.get().unwrap().width, 64);

    // wrong-typed request fails safe, holds no alias
    let not_a_mesh = store.get("grass").unwrap().downcast::<Mesh>();
    assert!(!not_a_mesh.is_valid());

    let rock = store.get("rock").unwrap().downcast::<Mesh>();
    assert_eq!(rock.get().unwrap().vertices, 96);

    drop((grass, not_a_mesh, rock));
    assert_eq!(store.clean(), 2);
}
