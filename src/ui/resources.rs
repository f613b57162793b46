//! Ownership tracking for graphics resources
//!
//! Every geometry, material and render target a scene creates is recorded
//! in a [`ResourceLedger`]. Releasing a resource removes it from the
//! ledger; releasing it again is reported instead of silently ignored, so
//! leaks and double releases are both observable.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::domain::geometry::Mesh;
use crate::domain::motion::MaterialSpec;

/// Category of a tracked resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Geometry,
    Material,
    RenderTarget,
}

/// Ledger-unique resource identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

/// Resource release errors
#[derive(Debug, thiserror::Error)]
pub enum DisposalError {
    #[error("Resource {0:?} was already released")]
    AlreadyReleased(ResourceId),
}

#[derive(Debug, Default)]
struct LedgerState {
    next_id: u64,
    live: HashMap<ResourceId, ResourceKind>,
    allocated: usize,
    released: usize,
}

/// Shared record of live resources for one scene instance
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    state: Rc<RefCell<LedgerState>>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new live resource
    pub fn allocate(&self, kind: ResourceKind) -> ResourceId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = ResourceId(state.next_id);
        state.live.insert(id, kind);
        state.allocated += 1;
        id
    }

    /// Marks a resource as released
    pub fn release(&self, id: ResourceId) -> Result<ResourceKind, DisposalError> {
        let mut state = self.state.borrow_mut();
        let kind = state
            .live
            .remove(&id)
            .ok_or(DisposalError::AlreadyReleased(id))?;
        state.released += 1;
        Ok(kind)
    }

    pub fn live_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn live_of(&self, kind: ResourceKind) -> usize {
        self.state
            .borrow()
            .live
            .values()
            .filter(|k| **k == kind)
            .count()
    }

    pub fn allocated_count(&self) -> usize {
        self.state.borrow().allocated
    }

    pub fn released_count(&self) -> usize {
        self.state.borrow().released
    }
}

/// Mesh owned by exactly one body
#[derive(Debug)]
pub struct Geometry {
    id: ResourceId,
    mesh: Mesh,
}

impl Geometry {
    pub fn allocate(ledger: &ResourceLedger, mesh: Mesh) -> Self {
        Self {
            id: ledger.allocate(ResourceKind::Geometry),
            mesh,
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Consumes the geometry, so it cannot be released twice
    pub fn dispose(self, ledger: &ResourceLedger) -> Result<(), DisposalError> {
        ledger.release(self.id).map(|_| ())
    }
}

/// Material owned by exactly one body
#[derive(Debug)]
pub struct Material {
    id: ResourceId,
    spec: MaterialSpec,
}

impl Material {
    pub fn allocate(ledger: &ResourceLedger, spec: MaterialSpec) -> Self {
        Self {
            id: ledger.allocate(ResourceKind::Material),
            spec,
        }
    }

    pub fn spec(&self) -> &MaterialSpec {
        &self.spec
    }

    pub fn dispose(self, ledger: &ResourceLedger) -> Result<(), DisposalError> {
        ledger.release(self.id).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_release() {
        let ledger = ResourceLedger::new();
        let a = ledger.allocate(ResourceKind::Geometry);
        let b = ledger.allocate(ResourceKind::Material);
        assert_ne!(a, b);
        assert_eq!(ledger.live_count(), 2);
        assert_eq!(ledger.live_of(ResourceKind::Material), 1);

        assert_eq!(ledger.release(a).unwrap(), ResourceKind::Geometry);
        assert_eq!(ledger.live_count(), 1);
        assert_eq!(ledger.released_count(), 1);
        assert_eq!(ledger.allocated_count(), 2);
    }

    #[test]
    fn double_release_is_reported() {
        let ledger = ResourceLedger::new();
        let id = ledger.allocate(ResourceKind::RenderTarget);
        ledger.release(id).unwrap();

        assert!(matches!(
            ledger.release(id),
            Err(DisposalError::AlreadyReleased(reported)) if reported == id
        ));
        assert_eq!(ledger.released_count(), 1);
    }

    #[test]
    fn clones_share_one_ledger() {
        let ledger = ResourceLedger::new();
        let view = ledger.clone();
        let geometry = Geometry::allocate(&ledger, Mesh::default());
        assert_eq!(view.live_count(), 1);

        geometry.dispose(&view).unwrap();
        assert_eq!(ledger.live_count(), 0);
    }
}
