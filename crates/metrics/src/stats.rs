//! Named counter set
//!
//! A fixed set of counters registered up front. Increments are lock-free;
//! a snapshot copies every counter without resetting it.

use crate::Counter;

/// A fixed set of named monotonic counters
#[derive(Debug)]
pub struct Stats {
    counters: Vec<(&'static str, Counter)>,
}

impl Stats {
    /// Create a counter set with the given names, all starting at zero
    pub fn new(names: &[&'static str]) -> Self {
        Self {
            counters: names.iter().map(|&name| (name, Counter::new())).collect(),
        }
    }

    /// Increment a counter and return its new value
    ///
    /// Returns `None`, and counts nothing, if `name` was not registered in
    /// [`Stats::new`].
    #[inline]
    pub fn inc(&self, name: &str) -> Option<u64> {
        self.find(name).map(Counter::inc)
    }

    /// Current value of a counter, `None` if it is not registered
    pub fn get(&self, name: &str) -> Option<u64> {
        self.find(name).map(Counter::get)
    }

    /// Copy every counter value
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            counters: self
                .counters
                .iter()
                .map(|(name, counter)| CounterValue {
                    name: *name,
                    value: counter.get(),
                })
                .collect(),
        }
    }

    /// Registered counter names in registration order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.counters.iter().map(|(name, _)| *name)
    }

    #[inline]
    fn find(&self, name: &str) -> Option<&Counter> {
        self.counters
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, counter)| counter)
    }
}

/// One counter in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterValue {
    pub name: &'static str,
    pub value: u64,
}

/// Point-in-time copy of a `Stats` set, in registration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    counters: Vec<CounterValue>,
}

impl Snapshot {
    /// Value of a counter, `None` if it is not in the snapshot
    pub fn get(&self, name: &str) -> Option<u64> {
        self.counters
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value)
    }

    /// Iterate over counters in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CounterValue> {
        self.counters.iter()
    }

    /// Number of counters
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the snapshot has no counters
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
