//! Thread-shared primitives: valid only among threads holding one instance.

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::{Guard, Held, Primitives};
use crate::error::SyncResult;

/// Binary signal threads can wait on until it is cleared.
#[derive(Debug, Default)]
struct Event {
    raised: Mutex<bool>,
    cleared: Condvar,
}

impl Event {
    fn raise(&self) {
        *self.raised.lock() = true;
    }

    fn clear(&self) {
        *self.raised.lock() = false;
        self.cleared.notify_all();
    }

    fn wait_clear(&self) {
        let mut raised = self.raised.lock();
        while *raised {
            self.cleared.wait(&mut raised);
        }
    }

    fn is_raised(&self) -> bool {
        *self.raised.lock()
    }
}

/// Counting semaphore with a fixed number of units.
#[derive(Debug)]
struct Semaphore {
    available: Mutex<usize>,
    released: Condvar,
    capacity: usize,
}

impl Semaphore {
    fn new(capacity: usize) -> Self {
        Self {
            available: Mutex::new(capacity),
            released: Condvar::new(),
            capacity,
        }
    }

    fn acquire(&self) {
        let mut available = self.available.lock();
        while *available == 0 {
            self.released.wait(&mut available);
        }
        *available -= 1;
    }

    /// Take every unit, picking each one up as soon as it is released.
    fn drain(&self) {
        let mut available = self.available.lock();
        let mut taken = 0;
        while taken < self.capacity {
            while *available == 0 {
                self.released.wait(&mut available);
            }
            let take = (*available).min(self.capacity - taken);
            *available -= take;
            taken += take;
        }
    }

    fn release(&self, units: usize) {
        *self.available.lock() += units;
        self.released.notify_all();
    }

    fn available(&self) -> usize {
        *self.available.lock()
    }
}

struct WriterGuard<'a> {
    _lock: MutexGuard<'a, ()>,
}

impl Held for WriterGuard<'_> {}

struct IntentGuard<'a>(&'a Event);

impl Held for IntentGuard<'_> {}

impl Drop for IntentGuard<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

struct Permit<'a> {
    semaphore: &'a Semaphore,
    units: usize,
}

impl Held for Permit<'_> {}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.semaphore.release(self.units);
    }
}

/// Primitives built from `parking_lot` locks and condition variables.
///
/// `parking_lot` locks do not poison, so a writer that panics inside its
/// critical section still releases everything on unwind.
pub struct ThreadPrimitives {
    writers: Mutex<()>,
    intent: Event,
    admission: Semaphore,
}

impl ThreadPrimitives {
    /// Create primitives with `capacity` admission units, all available.
    pub fn new(capacity: usize) -> Self {
        Self {
            writers: Mutex::new(()),
            intent: Event::default(),
            admission: Semaphore::new(capacity),
        }
    }
}

impl Primitives for ThreadPrimitives {
    fn exclude_writers(&self) -> SyncResult<Guard<'_>> {
        Ok(Box::new(WriterGuard {
            _lock: self.writers.lock(),
        }))
    }

    fn raise_intent(&self) -> SyncResult<Guard<'_>> {
        self.intent.raise();
        Ok(Box::new(IntentGuard(&self.intent)))
    }

    fn wait_intent_clear(&self) -> SyncResult<()> {
        self.intent.wait_clear();
        Ok(())
    }

    fn admit(&self) -> SyncResult<Guard<'_>> {
        self.admission.acquire();
        Ok(Box::new(Permit {
            semaphore: &self.admission,
            units: 1,
        }))
    }

    fn drain(&self) -> SyncResult<Guard<'_>> {
        self.admission.drain();
        Ok(Box::new(Permit {
            semaphore: &self.admission,
            units: self.admission.capacity,
        }))
    }

    fn capacity(&self) -> usize {
        self.admission.capacity
    }
}

impl std::fmt::Debug for ThreadPrimitives {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPrimitives")
            .field("capacity", &self.admission.capacity)
            .field("available", &self.admission.available())
            .field("intent", &self.intent.is_raised())
            .finish()
    }
}
