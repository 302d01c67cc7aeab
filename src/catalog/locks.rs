//! Striped advisory locks serializing probe-then-create steps per level key.
//!
//! A level key always maps to the same stripe, so two creators of one node
//! cannot interleave their probe and their commit. Unrelated keys may share a
//! stripe; that only costs concurrency. Multi-key steps take their stripes in
//! ascending order, and no step holds stripes while acquiring more.

use crate::encoding::keycode::LevelKey;
use crate::error::Result;
use crc::{Crc, CRC_64_ECMA_182};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

pub struct KeyLocks {
    stripes: Vec<Mutex<()>>,
    crc64: Crc<u64>,
}

impl fmt::Debug for KeyLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLocks")
            .field("stripes", &self.stripes.len())
            .finish()
    }
}

/// Held stripes; released on drop.
pub struct KeyGuards<'a> {
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl KeyLocks {
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
            crc64: Crc::<u64>::new(&CRC_64_ECMA_182),
        }
    }

    fn stripe(&self, key: &LevelKey) -> usize {
        (self.crc64.checksum(key.as_bytes()) % self.stripes.len() as u64) as usize
    }

    pub fn lock(&self, keys: &[&LevelKey]) -> Result<KeyGuards<'_>> {
        let mut stripes = keys.iter().map(|k| self.stripe(k)).collect::<Vec<_>>();
        stripes.sort_unstable();
        stripes.dedup();
        let mut guards = Vec::with_capacity(stripes.len());
        for stripe in stripes {
            guards.push(self.stripes[stripe].lock()?);
        }
        Ok(KeyGuards { _guards: guards })
    }
}
