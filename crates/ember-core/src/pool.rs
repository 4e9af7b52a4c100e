/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Reusable buffers for decoders
//!
//! Decoding an image needs a handful of large, short lived allocations
//! (coefficient blocks, sample planes, output pixels). Decoding many
//! images in a row would otherwise pay for these allocations every time,
//! so this module keeps returned buffers around in power of two size classes
//! and hands them out again.
//!
//! A [`PooledBuffer`] is returned to its pool when dropped. To keep the
//! memory instead (e.g. the final pixels handed to a caller) use
//! [`PooledBuffer::into_vec`], which moves the storage out and the pool never
//! sees it again.
//!
//! The pool is safe to share between threads, a rented buffer belongs to
//! exactly one handle at a time.
use core::fmt::{Debug, Formatter};
use core::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

/// Smallest size class, requests below this are rounded up
const MIN_CLASS_SHIFT: usize = 6;
/// Largest size class kept in the pool, larger buffers are allocated
/// and freed directly
const MAX_CLASS_SHIFT: usize = 30;
const NUM_CLASSES: usize = MAX_CLASS_SHIFT - MIN_CLASS_SHIFT + 1;
/// How many free buffers a single size class holds on to
pub const MAX_RETAINED: usize = 8;

/// Pool for byte buffers, used for sample planes and output pixels
pub static BYTE_POOL: BufferPool<u8> = BufferPool::new();
/// Pool for DCT coefficients
pub static COEFF_POOL: BufferPool<i16> = BufferPool::new();

/// A thread safe pool of `Vec<T>` grouped in power of two size classes
pub struct BufferPool<T> {
    classes: Mutex<Vec<Vec<Vec<T>>>>
}

impl<T: Copy + Default> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Size class that can serve a request of `count` items
fn class_for_request(count: usize) -> Option<usize> {
    let shift = count
        .max(1 << MIN_CLASS_SHIFT)
        .checked_next_power_of_two()?
        .trailing_zeros() as usize;

    (shift <= MAX_CLASS_SHIFT).then(|| shift - MIN_CLASS_SHIFT)
}

/// Size class a buffer of `capacity` items belongs to
///
/// Rounds down so every buffer in class `k` holds at least `1 << k` items.
fn class_for_capacity(capacity: usize) -> Option<usize> {
    if capacity < (1 << MIN_CLASS_SHIFT) {
        return None;
    }
    let shift = (usize::BITS - 1 - capacity.leading_zeros()) as usize;

    Some(shift.min(MAX_CLASS_SHIFT) - MIN_CLASS_SHIFT)
}

impl<T: Copy + Default> BufferPool<T> {
    /// Create an empty pool
    pub const fn new() -> BufferPool<T> {
        BufferPool {
            classes: Mutex::new(Vec::new())
        }
    }

    fn take(&self, class: usize) -> Option<Vec<T>> {
        let mut classes = self.classes.lock().unwrap_or_else(PoisonError::into_inner);
        classes.get_mut(class)?.pop()
    }

    /// Rent a buffer of exactly `count` items, all set to `T::default()`
    ///
    /// The buffer goes back to this pool when the handle is dropped.
    pub fn rent(&self, count: usize) -> PooledBuffer<'_, T> {
        let mut data = match class_for_request(count) {
            Some(class) => self
                .take(class)
                .unwrap_or_else(|| Vec::with_capacity(1 << (class + MIN_CLASS_SHIFT))),
            None => Vec::with_capacity(count)
        };
        data.clear();
        data.resize(count, T::default());

        PooledBuffer {
            data,
            pool: Some(self)
        }
    }

    /// Hand a buffer to the pool so later rents can reuse it
    ///
    /// Buffers that are too small, or land in a class that is already
    /// full, are simply dropped.
    pub fn give_back(&self, mut buffer: Vec<T>) {
        let Some(class) = class_for_capacity(buffer.capacity()) else {
            return;
        };
        buffer.clear();

        let mut classes = self.classes.lock().unwrap_or_else(PoisonError::into_inner);

        if classes.len() < NUM_CLASSES {
            classes.resize_with(NUM_CLASSES, Vec::new);
        }
        let slot = &mut classes[class];

        if slot.len() < MAX_RETAINED {
            slot.push(buffer);
        }
    }

    /// Number of free buffers currently held by the pool
    pub fn retained(&self) -> usize {
        let classes = self.classes.lock().unwrap_or_else(PoisonError::into_inner);
        classes.iter().map(Vec::len).sum()
    }

    /// Release every free buffer back to the allocator
    pub fn clear(&self) {
        let mut classes = self.classes.lock().unwrap_or_else(PoisonError::into_inner);
        classes.clear();
    }
}

/// An owned buffer, possibly borrowed from a [`BufferPool`]
pub struct PooledBuffer<'a, T: Copy + Default> {
    data: Vec<T>,
    pool: Option<&'a BufferPool<T>>
}

impl<'a, T: Copy + Default> PooledBuffer<'a, T> {
    /// Wrap caller provided storage
    ///
    /// Such a buffer is not pool owned, dropping it frees the memory.
    pub fn from_vec(data: Vec<T>) -> PooledBuffer<'a, T> {
        PooledBuffer { data, pool: None }
    }

    /// Whether dropping this handle returns the storage to a pool
    pub const fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    /// Take ownership of the storage
    ///
    /// The buffer is detached from its pool and will not be returned.
    pub fn into_vec(mut self) -> Vec<T> {
        self.pool = None;
        core::mem::take(&mut self.data)
    }
}

impl<T: Copy + Default> Deref for PooledBuffer<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T: Copy + Default> DerefMut for PooledBuffer<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Copy + Default> Drop for PooledBuffer<'_, T> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool {
            pool.give_back(core::mem::take(&mut self.data));
        }
    }
}

impl<T: Copy + Default> Debug for PooledBuffer<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.data.len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rented_buffers_are_zeroed_and_reused() {
        let pool = BufferPool::<u8>::new();

        let mut first = pool.rent(100);
        assert_eq!(first.len(), 100);
        first.fill(7);
        let ptr = first.as_ptr();
        drop(first);

        assert_eq!(pool.retained(), 1);

        // same size class (128)
        let second = pool.rent(120);
        assert_eq!(second.as_ptr(), ptr);
        assert_eq!(second.len(), 120);
        assert!(second.iter().all(|x| *x == 0));
        assert_eq!(pool.retained(), 0);
    }

    #[test]
    fn into_vec_detaches_from_pool() {
        let pool = BufferPool::<i16>::new();

        let buffer = pool.rent(4096);
        let owned = buffer.into_vec();
        assert_eq!(owned.len(), 4096);
        assert_eq!(pool.retained(), 0);

        pool.give_back(owned);
        assert_eq!(pool.retained(), 1);
    }

    #[test]
    fn external_buffers_are_not_returned() {
        let pool = BufferPool::<u8>::new();
        let wrapped: PooledBuffer<'_, u8> = PooledBuffer::from_vec(vec![1; 512]);

        assert!(!wrapped.is_pooled());
        drop(wrapped);
        assert_eq!(pool.retained(), 0);
    }

    #[test]
    fn classes_are_bounded() {
        let pool = BufferPool::<u8>::new();
        let buffers: Vec<_> = (0..MAX_RETAINED + 4).map(|_| pool.rent(64)).collect();
        drop(buffers);

        assert_eq!(pool.retained(), MAX_RETAINED);
        // too small for any class
        pool.give_back(Vec::with_capacity(3));
        assert_eq!(pool.retained(), MAX_RETAINED);

        pool.clear();
        assert_eq!(pool.retained(), 0);
    }

    #[test]
    fn concurrent_rent_and_return() {
        let pool = BufferPool::<u8>::new();

        std::thread::scope(|s| {
            for i in 0..8 {
                let pool = &pool;
                s.spawn(move || {
                    for j in 0..50 {
                        let mut buf = pool.rent(1000 + i * 10 + j);
                        assert!(buf.iter().all(|x| *x == 0));
                        buf.fill(i as u8);
                    }
                });
            }
        });
        assert!(pool.retained() <= MAX_RETAINED * NUM_CLASSES);
    }

    #[test]
    fn size_classes() {
        assert_eq!(class_for_request(1), Some(0));
        assert_eq!(class_for_request(64), Some(0));
        assert_eq!(class_for_request(65), Some(1));
        assert_eq!(class_for_capacity(127), Some(0));
        assert_eq!(class_for_capacity(128), Some(1));
        assert_eq!(class_for_request((1 << 30) + 1), None);
    }
}
