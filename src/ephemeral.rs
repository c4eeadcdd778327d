//! An in-memory, in-process challenge registry. Suitable for a single
//! server instance; a load balanced deployment should implement
//! [ChallengeRegistry] over its shared session store instead so a
//! challenge issued by one instance can be consumed on another.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::constants::CHALLENGE_TIMEOUT_SECONDS;
use crate::interface::{Challenge, ChallengeRegistry};

/// A challenge registry backed by a mutex guarded map. Challenges
/// expire after a timeout, and expiry is enforced at consume time so
/// the one-shot property holds without a background sweeper.
pub struct EphemeralChallengeRegistry {
    timeout: Duration,
    state: Mutex<HashMap<Vec<u8>, Instant>>,
}

impl EphemeralChallengeRegistry {
    /// A registry with the default challenge timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(CHALLENGE_TIMEOUT_SECONDS))
    }

    /// A registry with a caller supplied challenge timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        EphemeralChallengeRegistry {
            timeout,
            state: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Vec<u8>, Instant>> {
        // A poisoned lock only means another thread panicked mid
        // insert or remove, the map itself is still coherent.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for EphemeralChallengeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeRegistry for EphemeralChallengeRegistry {
    fn remember_challenge(&self, challenge: Challenge) {
        let mut state = self.lock();
        state.insert(challenge.0 .0, Instant::now());
    }

    fn consume_challenge(&self, challenge: &[u8]) -> bool {
        // A single remove keeps lookup and invalidation atomic, two
        // racing ceremonies can not both observe the challenge.
        let issued = {
            let mut state = self.lock();
            state.remove(challenge)
        };
        match issued {
            Some(at) => at.elapsed() <= self.timeout,
            None => false,
        }
    }
}
