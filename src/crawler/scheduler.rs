//! Admission control for concurrent traversals
//!
//! This module handles:
//! - The admission gate: a counting semaphore bounding open requests
//! - Pulling work lazily from the request source, one item per admitted slot
//! - Tagging every item with its submission index for ordered reassembly

use crate::CrawlError;
use std::iter::Enumerate;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting gate bounding the number of simultaneously open requests
///
/// A slot is held by an [`OwnedSemaphorePermit`] and released when the permit
/// is dropped, whether the request succeeded, failed, or was cancelled.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    /// Creates a gate with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit, CrawlError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CrawlError::GateClosed)
    }

    /// Closes the gate; pending and future admissions fail
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// An item admitted through the gate
pub struct ScheduledFetch<T> {
    /// Position of the item in the request source
    pub index: usize,

    /// The work item
    pub item: T,

    /// The slot held for this item
    pub permit: OwnedSemaphorePermit,
}

/// Scheduler hands out work items only once a gate slot is free
///
/// The source is pulled lazily, so unbounded sources (such as an id sequence
/// without a limit) are never materialized.
pub struct Scheduler<I: Iterator> {
    source: Enumerate<I>,
    gate: AdmissionGate,
    exhausted: bool,
}

impl<I: Iterator> Scheduler<I> {
    pub fn new(source: I, gate: AdmissionGate) -> Self {
        Self {
            source: source.enumerate(),
            gate,
            exhausted: false,
        }
    }

    /// Waits for a free slot, then takes the next item from the source
    ///
    /// # Returns
    ///
    /// * `Ok(Some(ScheduledFetch))` - An item with its slot
    /// * `Ok(None)` - The source is exhausted
    /// * `Err(CrawlError)` - The gate was closed
    pub async fn next_fetch(&mut self) -> Result<Option<ScheduledFetch<I::Item>>, CrawlError> {
        if self.exhausted {
            return Ok(None);
        }

        let permit = self.gate.admit().await?;

        match self.source.next() {
            Some((index, item)) => Ok(Some(ScheduledFetch {
                index,
                item,
                permit,
            })),
            None => {
                // Permit drops here and the slot returns to the gate
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }
}
