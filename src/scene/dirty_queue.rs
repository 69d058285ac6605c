//! Lock-free "transform changed" notifications.
//!
//! Producers push entity ids from any thread; the transform finalize stage is
//! the only consumer and drains the queue once per frame.

use bevy_ecs::component::Component;
use bevy_ecs::entity::Entity;
use crossbeam_deque::{Injector, Steal};

/// Multi-producer, single-consumer queue of dirtied entities.
///
/// Entries are not deduplicated: an entity dirtied three times before a drain
/// is delivered three times. An entity may also be despawned between enqueue
/// and drain, so every consumer must check that it is still alive.
#[derive(Default)]
pub struct DirtyQueue {
    queue: Injector<Entity>,
}

impl DirtyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a notification. Never blocks.
    #[inline]
    pub fn enqueue(&self, entity: Entity) {
        self.queue.push(entity);
    }

    /// Drains every entry currently visible, invoking `callback` for each.
    ///
    /// Returns the number of entries delivered. Entries pushed concurrently
    /// while draining may or may not be included.
    pub fn try_dequeue_all(&self, mut callback: impl FnMut(Entity)) -> usize {
        let mut drained = 0;
        loop {
            match self.queue.steal() {
                Steal::Success(entity) => {
                    callback(entity);
                    drained += 1;
                }
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
        drained
    }

    /// Discards all pending entries without delivering them.
    pub fn clear(&self) -> usize {
        self.try_dequeue_all(|_| {})
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl std::fmt::Debug for DirtyQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirtyQueue")
            .field("len", &self.len())
            .finish()
    }
}

/// Tag stamped on entities whose transform changed during `frame`.
///
/// Written only by the finalize stage. Downstream systems (bounds, UI rects,
/// renderers) compare `frame` against the current frame number.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyFrame {
    pub frame: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn entity(index: u32) -> Entity {
        Entity::from_raw(index)
    }

    #[test]
    fn drains_in_fifo_order_for_single_producer() {
        let queue = DirtyQueue::new();
        queue.enqueue(entity(1));
        queue.enqueue(entity(2));
        queue.enqueue(entity(3));

        let mut seen = Vec::new();
        let drained = queue.try_dequeue_all(|e| seen.push(e));

        assert_eq!(drained, 3);
        assert_eq!(seen, vec![entity(1), entity(2), entity(3)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn duplicates_are_delivered() {
        let queue = DirtyQueue::new();
        queue.enqueue(entity(7));
        queue.enqueue(entity(7));

        let mut count = 0;
        queue.try_dequeue_all(|_| count += 1);
        assert_eq!(count, 2);
    }

    #[test]
    fn clear_discards_without_callback() {
        let queue = DirtyQueue::new();
        queue.enqueue(entity(1));
        queue.enqueue(entity(2));

        assert_eq!(queue.clear(), 2);
        let drained = queue.try_dequeue_all(|_| panic!("queue should be empty"));
        assert_eq!(drained, 0);
    }

    #[test]
    fn accepts_producers_from_many_threads() {
        let queue = Arc::new(DirtyQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..250 {
                        queue.enqueue(entity(t * 1000 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let drained = queue.try_dequeue_all(|_| {});
        assert_eq!(drained, 1000);
    }
}
