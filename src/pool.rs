//! Per-user tracking of the notes a [`SwarmUser`](../user/struct.SwarmUser.html) created.
//!
//! Update and delete requests must target notes that exist, so every user remembers the
//! ids returned by the API when it created notes. The pool is owned by exactly one user
//! and is only ever touched from that user's own sequential timeline, so it needs no
//! locking.
//!
//! Two thresholds gate the destructive operations:
//!  - update is eligible once the pool holds at least `low_water` ids, and never while
//!    it is empty,
//!  - delete is eligible once the pool holds more than `high_water` ids.
//!
//! Deletion always removes the oldest id first, emulating realistic churn.

use rand::Rng;
use std::collections::VecDeque;

/// Default number of ids required before updates are scheduled.
pub const DEFAULT_LOW_WATER: usize = 5;

/// Default number of ids that must be exceeded before deletes are scheduled.
pub const DEFAULT_HIGH_WATER: usize = 15;

/// The ids of notes created by a single user, in creation order.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    ids: VecDeque<String>,
    low_water: usize,
    high_water: usize,
}

impl Default for ResourcePool {
    fn default() -> Self {
        ResourcePool::new(DEFAULT_LOW_WATER, DEFAULT_HIGH_WATER)
    }
}

impl ResourcePool {
    /// Create an empty pool with the given low and high-water marks.
    pub fn new(low_water: usize, high_water: usize) -> Self {
        ResourcePool {
            ids: VecDeque::new(),
            low_water,
            high_water,
        }
    }

    /// Track a newly created note.
    ///
    /// A missing or blank id (a malformed create response) leaves the pool untouched and
    /// returns `false`.
    ///
    /// # Example
    /// ```rust
    /// use notesync_swarm::pool::ResourcePool;
    ///
    /// let mut pool = ResourcePool::default();
    /// assert!(pool.add(Some("abc-123")));
    /// assert!(!pool.add(Some("")));
    /// assert!(!pool.add(None));
    /// assert_eq!(pool.len(), 1);
    /// ```
    pub fn add(&mut self, id: Option<&str>) -> bool {
        match id.map(str::trim) {
            Some(id) if !id.is_empty() => {
                self.ids.push_back(id.to_string());
                true
            }
            _ => {
                trace!("ignoring empty note id");
                false
            }
        }
    }

    /// Whether enough notes exist to start updating them. An empty pool never is, even
    /// with a low-water mark of 0.
    pub fn eligible_for_update(&self) -> bool {
        !self.ids.is_empty() && self.ids.len() >= self.low_water
    }

    /// Pick a uniformly random id to update.
    ///
    /// Only valid when [`eligible_for_update`](#method.eligible_for_update) is true; the
    /// scheduler checks first. An ineligible pool yields `None`.
    pub fn sample_for_update<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        debug_assert!(
            self.eligible_for_update(),
            "sample_for_update called on an ineligible pool"
        );
        if !self.eligible_for_update() {
            return None;
        }
        let index = rng.random_range(0..self.ids.len());
        self.ids.get(index).map(String::as_str)
    }

    /// Whether the pool has grown past the high-water mark.
    pub fn eligible_for_delete(&self) -> bool {
        self.ids.len() > self.high_water
    }

    /// Remove and return the oldest id.
    ///
    /// Only valid when [`eligible_for_delete`](#method.eligible_for_delete) is true. The
    /// id is gone from the pool whether or not the delete request later succeeds.
    pub fn pop_oldest_for_delete(&mut self) -> Option<String> {
        debug_assert!(
            self.eligible_for_delete(),
            "pop_oldest_for_delete called on an ineligible pool"
        );
        if !self.eligible_for_delete() {
            return None;
        }
        self.ids.pop_front()
    }

    /// Number of tracked ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if no ids are tracked.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Configured low-water mark.
    pub fn low_water(&self) -> usize {
        self.low_water
    }

    /// Configured high-water mark.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Tracked ids, oldest first.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn filled(count: usize) -> ResourcePool {
        let mut pool = ResourcePool::new(5, 15);
        for i in 0..count {
            assert!(pool.add(Some(&format!("note-{}", i))));
        }
        pool
    }

    #[test]
    fn add_ignores_malformed_ids() {
        let mut pool = filled(3);
        assert!(!pool.add(None));
        assert!(!pool.add(Some("")));
        assert!(!pool.add(Some("   ")));
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn update_eligibility_uses_low_water() {
        let mut pool = filled(4);
        assert!(!pool.eligible_for_update());
        pool.add(Some("note-4"));
        assert!(pool.eligible_for_update());
        assert!(!pool.eligible_for_delete());
    }

    #[test]
    fn empty_pool_never_updates() {
        let mut pool = ResourcePool::new(0, 15);
        assert!(!pool.eligible_for_update());
        pool.add(Some("abc-123"));
        assert!(pool.eligible_for_update());
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(pool.sample_for_update(&mut rng), Some("abc-123"));
    }

    #[test]
    fn sample_is_uniform_and_non_destructive() {
        let pool = filled(5);
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashMap::new();
        for _ in 0..5_000 {
            let id = pool.sample_for_update(&mut rng).expect("pool is eligible");
            *seen.entry(id.to_string()).or_insert(0usize) += 1;
        }
        assert_eq!(pool.len(), 5);
        assert_eq!(seen.len(), 5);
        for count in seen.values() {
            // 1,000 expected per id.
            assert!(*count > 850 && *count < 1_150, "skewed sample: {:?}", seen);
        }
    }

    #[test]
    fn seeded_pool_crosses_high_water() {
        // Ten seeded notes: updates allowed, deletes not.
        let mut pool = filled(10);
        assert!(pool.eligible_for_update());
        assert!(!pool.eligible_for_delete());

        // Six more creates, sixteen in total.
        for i in 10..15 {
            pool.add(Some(&format!("note-{}", i)));
            assert!(!pool.eligible_for_delete());
        }
        pool.add(Some("note-15"));
        assert_eq!(pool.len(), 16);
        assert!(pool.eligible_for_delete());

        assert_eq!(pool.pop_oldest_for_delete().as_deref(), Some("note-0"));
        assert_eq!(pool.len(), 15);
        assert!(!pool.eligible_for_delete());
    }

    #[test]
    fn round_trip_id_is_sampled() {
        let mut pool = ResourcePool::new(1, 15);
        pool.add(Some("abc-123"));
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pool.sample_for_update(&mut rng), Some("abc-123"));
        assert_eq!(pool.ids().collect::<Vec<_>>(), vec!["abc-123"]);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn ineligible_pop_never_goes_negative() {
        let mut pool = ResourcePool::new(5, 0);
        assert_eq!(pool.pop_oldest_for_delete(), None);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "ineligible pool")]
    fn ineligible_pop_is_a_programming_error() {
        let mut pool = ResourcePool::new(5, 0);
        let _ = pool.pop_oldest_for_delete();
    }
}
