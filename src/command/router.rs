//! Per-channel queue routing
//!
//! One [`CommandQueue`] per channel, created the first time a command is
//! routed to that channel and reused afterwards.

use drone_shared::{Channel, SessionError};
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::queue::{Command, CommandQueue};

#[derive(Default)]
struct RouterState {
    queues: BTreeMap<Channel, CommandQueue>,
    closed: bool,
}

pub struct MultiChannelCommandQueue {
    name: &'static str,
    state: Mutex<RouterState>,
}

impl MultiChannelCommandQueue {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(RouterState::default()),
        }
    }

    /// Route `command` to the queue for `channel`
    pub fn add(&self, channel: Channel, command: Command) -> Result<(), SessionError> {
        let queue = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(SessionError::SessionClosed);
            }
            state
                .queues
                .entry(channel)
                .or_insert_with(|| CommandQueue::new(format!("{} {}", self.name, channel)))
                .clone()
        };
        queue.add(command)
    }

    /// Process every queue once, in ascending channel order
    pub fn process(&self) {
        for queue in self.queues() {
            queue.process();
        }
    }

    pub fn remove_all(&self) {
        for queue in self.queues() {
            queue.remove_all();
        }
    }

    pub fn close(&self) {
        let queues = {
            let mut state = self.state.lock();
            state.closed = true;
            state.queues.values().cloned().collect::<Vec<_>>()
        };
        for queue in queues {
            queue.close();
        }
    }

    pub fn queue(&self, channel: Channel) -> Option<CommandQueue> {
        self.state.lock().queues.get(&channel).cloned()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.state.lock().queues.keys().copied().collect()
    }

    /// Queued commands across all channels
    pub fn len(&self) -> usize {
        self.queues().iter().map(|q| q.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn queues(&self) -> Vec<CommandQueue> {
        self.state.lock().queues.values().cloned().collect()
    }
}
