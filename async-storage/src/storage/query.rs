use crate::Key;
use std::ops::Bound;

/// Interval of keys in byte-lexicographic order.
///
/// The first bound is always the lower end and the second the upper end.
/// Inclusivity of each end is stated explicitly and never inferred.
///
/// ```
/// use async_storage::KeyRange;
///
/// let range = KeyRange::new("b".into(), "d".into(), true, false);
/// assert!(range.contains("b"));
/// assert!(range.contains("c"));
/// assert!(!range.contains("d"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    lower: Bound<Key>,
    upper: Bound<Key>,
}

impl KeyRange {
    /// range between `lower` and `upper` with explicit inclusivity for each end
    pub fn new(lower: Key, upper: Key, lower_inclusive: bool, upper_inclusive: bool) -> Self {
        let lower = if lower_inclusive {
            Bound::Included(lower)
        } else {
            Bound::Excluded(lower)
        };
        let upper = if upper_inclusive {
            Bound::Included(upper)
        } else {
            Bound::Excluded(upper)
        };
        Self { lower, upper }
    }

    /// `[lower, upper)`
    pub fn half_open(lower: Key, upper: Key) -> Self {
        Self::new(lower, upper, true, false)
    }

    /// `[lower, upper]`
    pub fn closed(lower: Key, upper: Key) -> Self {
        Self::new(lower, upper, true, true)
    }

    /// range from raw bounds, either end may be unbounded
    pub fn from_bounds(lower: Bound<Key>, upper: Bound<Key>) -> Self {
        Self { lower, upper }
    }

    /// lower end of the range
    pub fn lower(&self) -> Bound<&str> {
        as_str_bound(&self.lower)
    }

    /// upper end of the range
    pub fn upper(&self) -> Bound<&str> {
        as_str_bound(&self.upper)
    }

    /// whether `key` falls inside the range
    pub fn contains(&self, key: &str) -> bool {
        let above_lower = match self.lower() {
            Bound::Included(lower) => key >= lower,
            Bound::Excluded(lower) => key > lower,
            Bound::Unbounded => true,
        };
        let below_upper = match self.upper() {
            Bound::Included(upper) => key <= upper,
            Bound::Excluded(upper) => key < upper,
            Bound::Unbounded => true,
        };
        above_lower && below_upper
    }

    /// true when no key can satisfy both ends.
    ///
    /// Engines panic or misbehave on inverted bounds, so callers check
    /// this before handing the range down.
    pub fn is_empty(&self) -> bool {
        match (self.lower(), self.upper()) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
            (Bound::Included(lower), Bound::Included(upper)) => lower > upper,
            (Bound::Included(lower), Bound::Excluded(upper))
            | (Bound::Excluded(lower), Bound::Included(upper))
            | (Bound::Excluded(lower), Bound::Excluded(upper)) => lower >= upper,
        }
    }
}

fn as_str_bound(bound: &Bound<Key>) -> Bound<&str> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_str()),
        Bound::Excluded(key) => Bound::Excluded(key.as_str()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Which keys a scan should produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyQuery {
    /// every key
    All,
    /// keys starting with the given bytes
    Prefix(Key),
    /// keys inside the range
    Range(KeyRange),
}

impl KeyQuery {
    /// whether `key` is selected by this query
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyQuery::All => true,
            KeyQuery::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyQuery::Range(range) => range.contains(key),
        }
    }
}
