//! Process-shared primitives built on advisory `flock(2)` locks.
//!
//! Each primitive is a lock file next to the backing file:
//!
//! ```text
//! <file>.writer.lock    writer exclusion (exclusive)
//! <file>.intent.lock    writer intent (writer: exclusive, readers: probe shared)
//! <file>.slot-<i>.lock  one admission unit per slot (exclusive)
//! ```
//!
//! Every acquisition opens a fresh descriptor. `flock` locks belong to the
//! open file description, so two instances in one process contend exactly
//! like two processes do. The kernel drops a lock when its holder exits.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::trace;

use super::{Guard, Held, Primitives};
use crate::error::{SyncError, SyncResult};

impl Held for Flock<File> {}

impl Held for Vec<Flock<File>> {}

/// Primitives shared by every instance opened against the same backing file.
///
/// All participants must agree on the capacity; a participant with fewer
/// slots would drain only part of the pool.
#[derive(Debug)]
pub struct ProcessPrimitives {
    writer_path: PathBuf,
    intent_path: PathBuf,
    slot_paths: Vec<PathBuf>,
    /// Where the next reader starts probing, to spread readers over slots.
    next_slot: AtomicUsize,
}

impl ProcessPrimitives {
    /// Create (if needed) the lock files for `data_path` with `capacity` slots.
    pub fn open(data_path: &Path, capacity: usize) -> SyncResult<Self> {
        if let Some(parent) = data_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| lock_error(parent, e))?;
            }
        }

        let prims = Self {
            writer_path: sibling(data_path, "writer.lock"),
            intent_path: sibling(data_path, "intent.lock"),
            slot_paths: (0..capacity)
                .map(|i| sibling(data_path, &format!("slot-{i}.lock")))
                .collect(),
            next_slot: AtomicUsize::new(0),
        };

        for path in prims.lock_paths() {
            open_lock_file(path)?;
        }
        Ok(prims)
    }

    /// Every lock file this instance uses.
    pub fn lock_paths(&self) -> impl Iterator<Item = &Path> {
        [&self.writer_path, &self.intent_path]
            .into_iter()
            .chain(self.slot_paths.iter())
            .map(PathBuf::as_path)
    }
}

impl Primitives for ProcessPrimitives {
    fn exclude_writers(&self) -> SyncResult<Guard<'_>> {
        Ok(Box::new(lock(&self.writer_path, FlockArg::LockExclusive)?))
    }

    fn raise_intent(&self) -> SyncResult<Guard<'_>> {
        Ok(Box::new(lock(&self.intent_path, FlockArg::LockExclusive)?))
    }

    fn wait_intent_clear(&self) -> SyncResult<()> {
        // Blocks while a writer holds the exclusive lock.
        let probe = lock(&self.intent_path, FlockArg::LockShared)?;
        drop(probe);
        Ok(())
    }

    fn admit(&self) -> SyncResult<Guard<'_>> {
        let capacity = self.slot_paths.len();
        let start = self.next_slot.fetch_add(1, Ordering::Relaxed) % capacity;

        for offset in 0..capacity {
            let path = &self.slot_paths[(start + offset) % capacity];
            if let Some(slot) = try_lock(path)? {
                trace!(slot = %path.display(), "admission slot taken");
                return Ok(Box::new(slot));
            }
        }

        // Every slot is busy: queue on one of them.
        Ok(Box::new(lock(&self.slot_paths[start], FlockArg::LockExclusive)?))
    }

    fn drain(&self) -> SyncResult<Guard<'_>> {
        let slots = self
            .slot_paths
            .iter()
            .map(|path| lock(path, FlockArg::LockExclusive))
            .collect::<SyncResult<Vec<_>>>()?;
        Ok(Box::new(slots))
    }

    fn capacity(&self) -> usize {
        self.slot_paths.len()
    }
}

/// `<dir>/<file name>.<suffix>`
fn sibling(data_path: &Path, suffix: &str) -> PathBuf {
    let mut name = data_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from(shelf_store::DEFAULT_FILE_NAME));
    name.push(".");
    name.push(suffix);
    data_path.with_file_name(name)
}

fn open_lock_file(path: &Path) -> SyncResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| lock_error(path, e))
}

/// Blocking lock, retried when interrupted by a signal.
fn lock(path: &Path, arg: FlockArg) -> SyncResult<Flock<File>> {
    let mut file = open_lock_file(path)?;
    loop {
        match Flock::lock(file, arg) {
            Ok(held) => return Ok(held),
            Err((f, Errno::EINTR)) => file = f,
            Err((_, errno)) => return Err(lock_error(path, errno.into())),
        }
    }
}

/// Non-blocking exclusive lock. `Ok(None)` if someone else holds it.
fn try_lock(path: &Path) -> SyncResult<Option<Flock<File>>> {
    let mut file = open_lock_file(path)?;
    loop {
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(held) => return Ok(Some(held)),
            Err((f, Errno::EINTR)) => file = f,
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => return Ok(None),
            Err((_, errno)) => return Err(lock_error(path, errno.into())),
        }
    }
}

fn lock_error(path: &Path, source: std::io::Error) -> SyncError {
    SyncError::Lock {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    const SETTLE: Duration = Duration::from_millis(100);

    #[test]
    fn open_creates_lock_files() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("db.bin");
        let prims = ProcessPrimitives::open(&data, 3).unwrap();

        assert_eq!(prims.capacity(), 3);
        assert_eq!(prims.lock_paths().count(), 5);
        for path in prims.lock_paths() {
            assert!(path.exists(), "{} missing", path.display());
        }
        assert!(dir.path().join("db.bin.writer.lock").exists());
        assert!(dir.path().join("db.bin.slot-2.lock").exists());
    }

    #[test]
    fn readers_spread_over_free_slots() {
        let dir = tempfile::tempdir().unwrap();
        let prims = ProcessPrimitives::open(&dir.path().join("db.bin"), 2).unwrap();

        let _a = prims.admit().unwrap();
        let _b = prims.admit().unwrap();
        // Both slots are held, so a non-blocking probe of each must fail.
        for path in &prims.slot_paths {
            assert!(try_lock(path).unwrap().is_none());
        }
    }

    #[test]
    fn admission_exhausted_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("db.bin");
        let holder = ProcessPrimitives::open(&data, 1).unwrap();
        let other = Arc::new(ProcessPrimitives::open(&data, 1).unwrap());

        let held = holder.admit().unwrap();
        let entered = Arc::new(AtomicBool::new(false));
        let handle = {
            let other = Arc::clone(&other);
            let entered = Arc::clone(&entered);
            thread::spawn(move || {
                let _unit = other.admit().unwrap();
                entered.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(SETTLE);
        assert!(!entered.load(Ordering::SeqCst));
        drop(held);
        handle.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn drain_waits_for_foreign_reader() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("db.bin");
        let reader = ProcessPrimitives::open(&data, 3).unwrap();
        let writer = Arc::new(ProcessPrimitives::open(&data, 3).unwrap());

        let unit = reader.admit().unwrap();
        let drained = Arc::new(AtomicBool::new(false));
        let handle = {
            let writer = Arc::clone(&writer);
            let drained = Arc::clone(&drained);
            thread::spawn(move || {
                let _all = writer.drain().unwrap();
                drained.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(SETTLE);
        assert!(!drained.load(Ordering::SeqCst));
        drop(unit);
        handle.join().unwrap();
        assert!(drained.load(Ordering::SeqCst));
    }

    #[test]
    fn intent_blocks_foreign_readers() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("db.bin");
        let writer = ProcessPrimitives::open(&data, 1).unwrap();
        let reader = Arc::new(ProcessPrimitives::open(&data, 1).unwrap());

        let intent = writer.raise_intent().unwrap();
        let passed = Arc::new(AtomicBool::new(false));
        let handle = {
            let reader = Arc::clone(&reader);
            let passed = Arc::clone(&passed);
            thread::spawn(move || {
                reader.wait_intent_clear().unwrap();
                passed.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(SETTLE);
        assert!(!passed.load(Ordering::SeqCst));
        drop(intent);
        handle.join().unwrap();
        assert!(passed.load(Ordering::SeqCst));
    }

    #[test]
    fn writers_exclude_each_other_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("db.bin");
        let first = ProcessPrimitives::open(&data, 1).unwrap();
        let second = ProcessPrimitives::open(&data, 1).unwrap();

        let held = first.exclude_writers().unwrap();
        let file = open_lock_file(&second.writer_path).unwrap();
        assert!(Flock::lock(file, FlockArg::LockExclusiveNonblock).is_err());
        drop(held);
        assert!(second.exclude_writers().is_ok());
    }
}
