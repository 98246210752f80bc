//! Ownership of images shared between the raster and compute sides
//!
//! The raster pass writes the G-buffer and reads the indirect image; the
//! indirect-lighting kernels read the G-buffer and write the visibility mask
//! and indirect image. Every hand-over is an explicit acquire/release pair so
//! a misordered frame shows up as an error instead of a data race on a real
//! device.

use std::collections::HashMap;

use crate::render::{RenderError, RenderResult};

/// Images that change hands during a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// G-buffer positions
    Positions,
    /// G-buffer normals
    Normals,
    /// G-buffer albedo
    Albedo,
    /// G-buffer specular colour
    Specular,
    /// Persistent per-VPL visibility mask
    VisibilityMask,
    /// Reconstructed indirect image
    IndirectImage,
}

impl ResourceKind {
    /// All kinds in registration order
    pub const ALL: [Self; 6] = [
        Self::Positions,
        Self::Normals,
        Self::Albedo,
        Self::Specular,
        Self::VisibilityMask,
        Self::IndirectImage,
    ];
}

/// Side of the pipeline holding a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Graphics queue
    Raster,
    /// Compute kernels and ray tracing
    Compute,
}

/// Current owner of every shared resource
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    owners: HashMap<ResourceKind, Owner>,
}

impl ResourceTable {
    /// Table with every kind registered to the raster side
    pub fn new() -> Self {
        let owners = ResourceKind::ALL.iter().map(|&kind| (kind, Owner::Raster)).collect();
        Self { owners }
    }

    /// Current owner of `kind`
    pub fn owner(&self, kind: ResourceKind) -> RenderResult<Owner> {
        self.owners.get(&kind).copied().ok_or(RenderError::MissingResource(kind))
    }

    /// Move `kind` from the raster side to compute
    pub fn acquire(&mut self, kind: ResourceKind) -> RenderResult<()> {
        self.transfer(kind, Owner::Raster, Owner::Compute)
    }

    /// Hand `kind` back to the raster side
    pub fn release(&mut self, kind: ResourceKind) -> RenderResult<()> {
        self.transfer(kind, Owner::Compute, Owner::Raster)
    }

    /// Acquire several kinds; on failure the ones already taken go back
    pub fn acquire_all(&mut self, kinds: &[ResourceKind]) -> RenderResult<()> {
        for (taken, &kind) in kinds.iter().enumerate() {
            if let Err(e) = self.acquire(kind) {
                self.release_all(&kinds[..taken])?;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Release several kinds in reverse order
    pub fn release_all(&mut self, kinds: &[ResourceKind]) -> RenderResult<()> {
        kinds.iter().rev().try_for_each(|&kind| self.release(kind))
    }

    /// Hold `kinds` on the compute side while `body` runs
    ///
    /// The kinds are handed back whether or not `body` succeeds. An error
    /// from `body` takes precedence over one from the release.
    pub fn with_acquired<T>(
        &mut self,
        kinds: &[ResourceKind],
        body: impl FnOnce(&Self) -> RenderResult<T>,
    ) -> RenderResult<T> {
        self.acquire_all(kinds)?;
        let result = body(self);
        let released = self.release_all(kinds);
        let value = result?;
        released?;
        Ok(value)
    }

    /// Fail unless `kind` is held by `expected`
    pub fn require(&self, kind: ResourceKind, expected: Owner) -> RenderResult<()> {
        let owner = self.owner(kind)?;
        if owner == expected {
            Ok(())
        } else {
            Err(RenderError::ResourceOwnership { kind, owner, expected })
        }
    }

    fn transfer(&mut self, kind: ResourceKind, from: Owner, to: Owner) -> RenderResult<()> {
        self.require(kind, from)?;
        self.owners.insert(kind, to);
        log::trace!("{:?} transferred {:?} -> {:?}", kind, from, to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_round_trip() {
        let mut table = ResourceTable::new();
        table.acquire(ResourceKind::Positions).unwrap();
        assert_eq!(table.owner(ResourceKind::Positions).unwrap(), Owner::Compute);
        table.release(ResourceKind::Positions).unwrap();
        assert_eq!(table.owner(ResourceKind::Positions).unwrap(), Owner::Raster);
    }

    #[test]
    fn test_double_acquire_is_an_ownership_error() {
        let mut table = ResourceTable::new();
        table.acquire(ResourceKind::VisibilityMask).unwrap();
        let err = table.acquire(ResourceKind::VisibilityMask).unwrap_err();
        assert!(matches!(
            err,
            RenderError::ResourceOwnership { owner: Owner::Compute, expected: Owner::Raster, .. }
        ));
    }

    #[test]
    fn test_release_without_acquire_fails() {
        let mut table = ResourceTable::new();
        assert!(table.release(ResourceKind::IndirectImage).is_err());
        assert!(table.require(ResourceKind::IndirectImage, Owner::Raster).is_ok());
    }

    #[test]
    fn test_failed_body_still_releases() {
        let mut table = ResourceTable::new();
        let kinds = [ResourceKind::Positions, ResourceKind::VisibilityMask];
        let result: RenderResult<()> = table.with_acquired(&kinds, |held| {
            assert_eq!(held.owner(ResourceKind::Positions).unwrap(), Owner::Compute);
            Err(RenderError::Backend("lost device".to_string()))
        });

        assert!(matches!(result, Err(RenderError::Backend(_))));
        for kind in kinds {
            assert_eq!(table.owner(kind).unwrap(), Owner::Raster);
        }
        assert_eq!(table.with_acquired(&kinds, |_| Ok(7)).unwrap(), 7);
    }

    #[test]
    fn test_partial_acquire_is_rolled_back() {
        let mut table = ResourceTable::new();
        table.acquire(ResourceKind::VisibilityMask).unwrap();

        let kinds = [ResourceKind::Positions, ResourceKind::VisibilityMask];
        assert!(table.acquire_all(&kinds).is_err());
        assert_eq!(table.owner(ResourceKind::Positions).unwrap(), Owner::Raster);
        assert_eq!(table.owner(ResourceKind::VisibilityMask).unwrap(), Owner::Compute);
    }

    #[test]
    fn test_unregistered_kind_is_missing() {
        let table = ResourceTable::default();
        assert!(matches!(
            table.owner(ResourceKind::Albedo),
            Err(RenderError::MissingResource(ResourceKind::Albedo))
        ));
    }
}
