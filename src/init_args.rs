//! Arguments assigned to client types by the client pass.
//!
//! A client declares that it needs exactly N services. Once the pipeline
//! has realized all of them, the instances are stored here under the
//! client's key until the client picks them up.

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::args::ArgList;
use crate::key::{key_of, Key};
use crate::types::Instance;

#[derive(Default)]
pub struct InitArgs {
    assigned: RwLock<AHashMap<Key, Vec<Instance>>>,
}

impl InitArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `args` for `client`, replacing any previous assignment.
    pub fn assign(&self, client: Key, args: Vec<Instance>) {
        self.assigned.write().insert(client, args);
    }

    pub fn contains(&self, client: &Key) -> bool {
        self.assigned.read().contains_key(client)
    }

    /// Typed copy of the arguments assigned to `C`.
    pub fn peek<C: ?Sized + 'static, A: ArgList>(&self) -> Option<A> {
        let assigned = self.assigned.read();
        A::from_instances(assigned.get(&key_of::<C>())?)
    }

    /// Removes and returns the arguments assigned to `C`. Nothing is
    /// removed when they do not match `A`.
    pub fn take<C: ?Sized + 'static, A: ArgList>(&self) -> Option<A> {
        let key = key_of::<C>();
        let mut assigned = self.assigned.write();
        let typed = A::from_instances(assigned.get(&key)?)?;
        assigned.remove(&key);
        Some(typed)
    }

    pub fn len(&self) -> usize {
        self.assigned.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.assigned.write().clear();
    }
}

impl std::fmt::Debug for InitArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitArgs")
            .field("clients", &self.assigned.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
