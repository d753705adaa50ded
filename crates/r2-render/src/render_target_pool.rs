//! Pools of reusable render targets.
//!
//! A pool hands out shared [`Rc`] handles to targets. Each target is either
//! in use (handed out) or available (returned and waiting for reuse). The
//! pool accounts for the bytes of every live target against two limits:
//!
//! - above the soft limit, available targets are destroyed, oldest-returned
//!   first, after each new allocation;
//! - an allocation that would take the pool past the hard limit fails with
//!   [`RenderError::PoolHardLimitExceeded`] and leaves the pool untouched.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use r2_core::PoolLimits;

use crate::{
    AmbientOcclusionBuffer, DepthVarianceBuffer, RenderDevice, RenderError, RenderResult,
    RenderTarget, RenderTargetDescription, TextureUnitContext,
};

/// A pool of render targets of one kind.
#[derive(Debug)]
pub struct RenderTargetPool<T: RenderTarget> {
    limits: PoolLimits,
    size_current: u64,
    /// Available targets by description, each list in return order.
    available: HashMap<T::Description, VecDeque<Returned<T>>>,
    returns: u64,
    in_use: Vec<Rc<T>>,
    deleted: bool,
}

#[derive(Debug)]
struct Returned<T> {
    sequence: u64,
    target: Rc<T>,
}

/// A pool of shadow map buffers.
pub type DepthVarianceBufferPool = RenderTargetPool<DepthVarianceBuffer>;

/// A pool of ambient occlusion buffers.
pub type AmbientOcclusionBufferPool = RenderTargetPool<AmbientOcclusionBuffer>;

/// A depth-variance pool shared between the shadow renderer and its owner.
pub type SharedDepthVarianceBufferPool = Rc<RefCell<DepthVarianceBufferPool>>;

impl<T: RenderTarget> RenderTargetPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(limits: PoolLimits) -> Self {
        if limits.soft > limits.hard {
            log::warn!(
                "pool soft limit {} exceeds hard limit {}",
                limits.soft,
                limits.hard
            );
        }
        Self {
            limits,
            size_current: 0,
            available: HashMap::new(),
            returns: 0,
            in_use: Vec::new(),
            deleted: false,
        }
    }

    /// Creates an empty pool wrapped for sharing.
    #[must_use]
    pub fn new_shared(limits: PoolLimits) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(limits)))
    }

    /// Returns a target matching `description`, reusing the most recently
    /// returned one if possible.
    pub fn get(
        &mut self,
        device: &mut dyn RenderDevice,
        texture_units: &mut TextureUnitContext<'_>,
        description: &T::Description,
    ) -> RenderResult<Rc<T>> {
        self.check_live()?;

        if let Some(target) = self.take_available(description) {
            log::trace!("reuse {description:?}");
            self.in_use.push(Rc::clone(&target));
            return Ok(target);
        }

        let requested = description.byte_size();
        let total = self.size_current.saturating_add(requested);
        if total > self.limits.hard {
            log::debug!(
                "refusing {description:?}: {requested} bytes with {} allocated exceeds \
                 hard limit {}",
                self.size_current,
                self.limits.hard
            );
            return Err(RenderError::PoolHardLimitExceeded {
                requested,
                current: self.size_current,
                hard: self.limits.hard,
            });
        }

        let target = Rc::new(T::create(device, texture_units, description)?);
        debug_assert_eq!(target.byte_size(), requested);
        log::debug!("allocate {description:?} ({requested} bytes)");
        self.size_current = total;
        self.in_use.push(Rc::clone(&target));
        self.evict_above_soft_limit(device);
        Ok(target)
    }

    /// Returns a target obtained from [`RenderTargetPool::get`].
    ///
    /// Fails with [`RenderError::PoolObjectReturn`] if the target did not
    /// come from this pool or has already been returned.
    pub fn return_value(&mut self, target: Rc<T>) -> RenderResult<()> {
        self.check_live()?;

        if let Some(index) = self.in_use.iter().position(|t| Rc::ptr_eq(t, &target)) {
            let returned = self.in_use.swap_remove(index);
            log::trace!("return {:?}", returned.description());
            self.returns += 1;
            self.available
                .entry(returned.description().clone())
                .or_default()
                .push_back(Returned {
                    sequence: self.returns,
                    target: returned,
                });
            return Ok(());
        }

        if self.is_available(&target) {
            Err(RenderError::PoolObjectReturn(format!(
                "{:?} has already been returned",
                target.description()
            )))
        } else {
            Err(RenderError::PoolObjectReturn(format!(
                "{:?} was not obtained from this pool",
                target.description()
            )))
        }
    }

    /// Destroys every target, in use or available, and marks the pool
    /// deleted.
    pub fn delete(&mut self, device: &mut dyn RenderDevice) -> RenderResult<()> {
        if self.deleted {
            return Ok(());
        }
        self.deleted = true;

        let mut first_error = None;
        let available = self
            .available
            .drain()
            .flat_map(|(_, returned)| returned.into_iter().map(|r| r.target));
        for target in available.chain(self.in_use.drain(..)) {
            log::trace!("delete {:?}", target.description());
            if let Err(error) = target.delete(device) {
                first_error.get_or_insert(error);
            }
        }
        self.size_current = 0;
        first_error.map_or(Ok(()), Err)
    }

    fn take_available(&mut self, description: &T::Description) -> Option<Rc<T>> {
        let returned = self.available.get_mut(description)?;
        let taken = returned.pop_back().map(|r| r.target);
        if returned.is_empty() {
            self.available.remove(description);
        }
        taken
    }

    fn take_oldest_available(&mut self) -> Option<Rc<T>> {
        let description = self
            .available
            .iter()
            .filter_map(|(description, returned)| {
                returned.front().map(|r| (r.sequence, description))
            })
            .min_by_key(|(sequence, _)| *sequence)
            .map(|(_, description)| description.clone())?;
        let returned = self.available.get_mut(&description)?;
        let taken = returned.pop_front().map(|r| r.target);
        if returned.is_empty() {
            self.available.remove(&description);
        }
        taken
    }

    /// Evicted targets leave the pool even if the device fails to delete
    /// them.
    fn evict_above_soft_limit(&mut self, device: &mut dyn RenderDevice) {
        while self.size_current > self.limits.soft {
            let Some(target) = self.take_oldest_available() else {
                break;
            };
            log::trace!("evict {:?}", target.description());
            self.size_current -= target.byte_size();
            if let Err(error) = target.delete(device) {
                log::warn!("failed to delete evicted {:?}: {error}", target.description());
            }
        }
    }

    fn check_live(&self) -> RenderResult<()> {
        if self.deleted {
            Err(RenderError::PoolDeleted)
        } else {
            Ok(())
        }
    }

    /// Bytes currently allocated by live targets.
    #[must_use]
    pub fn size_current(&self) -> u64 {
        self.size_current
    }

    #[must_use]
    pub fn size_soft(&self) -> u64 {
        self.limits.soft
    }

    #[must_use]
    pub fn size_hard(&self) -> u64 {
        self.limits.hard
    }

    /// Number of targets waiting for reuse.
    #[must_use]
    pub fn count_available(&self) -> usize {
        self.available.values().map(VecDeque::len).sum()
    }

    /// Number of targets handed out.
    #[must_use]
    pub fn count_in_use(&self) -> usize {
        self.in_use.len()
    }

    /// Returns `true` if `target` is waiting in this pool for reuse.
    #[must_use]
    pub fn is_available(&self, target: &Rc<T>) -> bool {
        self.available
            .get(target.description())
            .is_some_and(|returned| returned.iter().any(|r| Rc::ptr_eq(&r.target, target)))
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}
