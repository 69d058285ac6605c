//! Remote entity state received from a network thread.

use std::sync::Arc;

use bevy_ecs::component::Component;
use bevy_ecs::entity::Entity;
use bevy_ecs::prelude::Resource;
use glam::{Quat, Vec3};
use parking_lot::Mutex;

/// Authoritative pose of a remote entity at a server tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteState {
    pub entity: Entity,
    pub tick: u64,
    pub position: Vec3,
    pub rotation: Quat,
}

/// Pose a remote entity is interpolating towards.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct NetTarget {
    pub tick: u64,
    pub position: Vec3,
    pub rotation: Quat,
}

impl From<RemoteState> for NetTarget {
    fn from(state: RemoteState) -> Self {
        Self {
            tick: state.tick,
            position: state.position,
            rotation: state.rotation,
        }
    }
}

/// Inbox filled by the connection thread and drained once per frame.
#[derive(Resource, Debug, Clone, Default)]
pub struct NetworkInbox {
    pending: Arc<Mutex<Vec<RemoteState>>>,
}

impl NetworkInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for a producer thread. All clones share one inbox.
    pub fn sender(&self) -> NetworkSender {
        NetworkSender {
            pending: Arc::clone(&self.pending),
        }
    }

    /// Takes everything received so far.
    pub fn drain(&self) -> Vec<RemoteState> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// Producer side of a [`NetworkInbox`].
#[derive(Debug, Clone)]
pub struct NetworkSender {
    pending: Arc<Mutex<Vec<RemoteState>>>,
}

impl NetworkSender {
    pub fn send(&self, state: RemoteState) {
        self.pending.lock().push(state);
    }
}
