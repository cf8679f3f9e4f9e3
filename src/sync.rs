//! Synchronization primitives with conditional compilation.
//!
//! Provides a unified reader-writer lock that uses `parking_lot::RwLock` when
//! the `fast-lock` feature is enabled, falling back to `std::sync::RwLock` otherwise.

#[cfg(feature = "fast-lock")]
use parking_lot::RwLock as ParkingLotRwLock;

#[cfg(not(feature = "fast-lock"))]
use std::sync::RwLock as StdRwLock;

/// Reader-writer lock that conditionally uses parking_lot or std::sync::RwLock.
///
/// When the `fast-lock` feature is enabled, uses `parking_lot::RwLock` for better
/// performance (1.5-3x faster on uncontended locks). Otherwise uses `std::sync::RwLock`.
///
/// # Example
///
/// ```rust
/// use errata::sync::{RwLock, read};
///
/// let data = RwLock::new(42);
/// assert_eq!(*read(&data), 42);
/// ```
#[cfg(feature = "fast-lock")]
pub type RwLock<T> = ParkingLotRwLock<T>;

#[cfg(not(feature = "fast-lock"))]
pub type RwLock<T> = StdRwLock<T>;

/// Acquire a shared read guard, handling poisoning gracefully.
///
/// For `parking_lot::RwLock`, this is just `lock.read()`.
/// For `std::sync::RwLock`, this handles poisoning by recovering the guard.
#[cfg(feature = "fast-lock")]
pub fn read<T>(lock: &RwLock<T>) -> parking_lot::RwLockReadGuard<'_, T> {
    lock.read()
}

#[cfg(not(feature = "fast-lock"))]
pub fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

/// Acquire an exclusive write guard, handling poisoning gracefully.
///
/// For `parking_lot::RwLock`, this is just `lock.write()`.
/// For `std::sync::RwLock`, this handles poisoning by recovering the guard.
#[cfg(feature = "fast-lock")]
pub fn write<T>(lock: &RwLock<T>) -> parking_lot::RwLockWriteGuard<'_, T> {
    lock.write()
}

#[cfg(not(feature = "fast-lock"))]
pub fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
