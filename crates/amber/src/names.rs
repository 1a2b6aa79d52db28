use ahash::{AHashMap, AHashSet};

/// Default prefix for emitted value identifiers (`v1`, `v2`, ...).
pub const VALUE_PREFIX: &str = "v";
/// Base name for an injected bound receiver.
pub const SELF_BASE: &str = "_self";
/// Base name for an injected class heritage target.
pub const SUPER_BASE: &str = "_super";

/// Mints collision-free identifiers for emitted values.
///
/// Keeps a monotonically-increasing counter per prefix and an exclusion set
/// seeded with every identifier collected from the function body plus the
/// free-variable names in scope. Minted names are added to the exclusion set
/// so later mints never collide with earlier ones.
#[derive(Debug, Default)]
pub struct NameAllocator {
    counters: AHashMap<String, u32>,
    exclude: AHashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a name to the exclusion set.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.exclude.insert(name.into());
    }

    /// Adds every name in `names` to the exclusion set.
    pub fn reserve_all<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.reserve(name);
        }
    }

    /// Returns `<prefix><n>` for the smallest counter value not in the
    /// exclusion set, and reserves it.
    pub fn next_name(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_owned()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{prefix}{counter}");
            if !self.exclude.contains(&candidate) {
                self.exclude.insert(candidate.clone());
                return candidate;
            }
        }
    }

    /// Returns `base` itself when free, otherwise `base` with the smallest
    /// numeric tail that avoids a collision (`_self`, `_self2`, ...).
    pub fn tail_name(&mut self, base: &str) -> String {
        if !self.exclude.contains(base) {
            self.exclude.insert(base.to_owned());
            return base.to_owned();
        }
        let mut tail = 2u32;
        loop {
            let candidate = format!("{base}{tail}");
            if !self.exclude.contains(&candidate) {
                self.exclude.insert(candidate.clone());
                return candidate;
            }
            tail += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_increment_per_prefix() {
        let mut names = NameAllocator::new();
        assert_eq!(names.next_name("v"), "v1");
        assert_eq!(names.next_name("v"), "v2");
        assert_eq!(names.next_name("f"), "f1");
    }

    #[test]
    fn excluded_names_are_skipped() {
        let mut names = NameAllocator::new();
        names.reserve("v1");
        names.reserve("v3");
        assert_eq!(names.next_name("v"), "v2");
        assert_eq!(names.next_name("v"), "v4");
    }

    #[test]
    fn tail_names_prefer_the_bare_base() {
        let mut names = NameAllocator::new();
        assert_eq!(names.tail_name("_self"), "_self");
        assert_eq!(names.tail_name("_self"), "_self2");
        names.reserve("_super");
        assert_eq!(names.tail_name("_super"), "_super2");
    }
}
