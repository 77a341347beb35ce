//! Outstanding-request table.

use std::collections::HashMap;

use crowdplay_protocol::Method;

/// Maps request ids to the method they were sent for.
///
/// Ids are strictly increasing from 1. Entries stay until their reply
/// arrives; a request that is never answered stays forever.
#[derive(Debug)]
pub struct OutstandingRequests {
    next_id: u64,
    pending: HashMap<u64, Method>,
}

impl Default for OutstandingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl OutstandingRequests {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            pending: HashMap::new(),
        }
    }

    /// Allocate the next id and remember what it was for.
    pub fn register(&mut self, method: Method) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, method);
        id
    }

    /// Remove and return the method for a reply id.
    pub fn resolve(&mut self, id: u64) -> Option<Method> {
        self.pending.remove(&id)
    }

    pub fn pending(&self, id: u64) -> Option<Method> {
        self.pending.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Forget every entry and restart ids at 1.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
