use std::collections::HashSet;
use std::hash::Hash;

/// Flags for diagnostics that fire at most once per file.
#[derive(Debug, Clone)]
pub struct OneShot<F> {
    fired: HashSet<F>,
}

impl<F> Default for OneShot<F> {
    fn default() -> Self {
        Self {
            fired: HashSet::new(),
        }
    }
}

impl<F: Eq + Hash> OneShot<F> {
    /// True the first time `flag` is seen, false afterwards.
    pub fn first(&mut self, flag: F) -> bool {
        self.fired.insert(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once() {
        let mut once = OneShot::default();
        assert!(once.first("font"));
        assert!(!once.first("font"));
        assert!(once.first("type"));
    }
}
