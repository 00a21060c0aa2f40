//! Locking primitives with conditional compilation.
//!
//! The NER model cache is the only shared mutable state in the crate; its
//! mutex comes from here. `std::sync::Mutex` is the default, with
//! `parking_lot::Mutex` behind the `fast-lock` feature.

/// Mutex type backing the model cache.
#[cfg(feature = "fast-lock")]
pub type Mutex<T> = parking_lot::Mutex<T>;

/// Mutex type backing the model cache.
#[cfg(not(feature = "fast-lock"))]
pub type Mutex<T> = std::sync::Mutex<T>;

/// Lock a mutex, recovering from poisoning for the std backend.
///
/// A panicking tagger must not permanently wedge the model cache, so a
/// poisoned lock is recovered rather than propagated.
#[cfg(feature = "fast-lock")]
pub fn lock<T>(mutex: &Mutex<T>) -> parking_lot::MutexGuard<'_, T> {
    mutex.lock()
}

/// Lock a mutex, recovering from poisoning for the std backend.
#[cfg(not(feature = "fast-lock"))]
pub fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
