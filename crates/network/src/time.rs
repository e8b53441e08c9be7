//! Wall-clock time primitives driving timer deadlines.
use std::time::{SystemTime, UNIX_EPOCH};

/// Local time, in milliseconds since the Unix epoch.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Ord, PartialOrd, Default)]
pub struct LocalTime {
    millis: u128,
}

impl LocalTime {
    /// Current system time.
    pub fn now() -> Self {
        SystemTime::now().into()
    }

    /// Local time from whole milliseconds since the epoch.
    pub const fn from_millis(millis: u128) -> Self {
        Self { millis }
    }

    pub const fn as_millis(&self) -> u128 {
        self.millis
    }

    /// Duration elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn duration_since(&self, earlier: LocalTime) -> LocalDuration {
        LocalDuration(self.millis.saturating_sub(earlier.millis))
    }
}

impl From<SystemTime> for LocalTime {
    fn from(system: SystemTime) -> Self {
        let millis = system
            .duration_since(UNIX_EPOCH)
            .expect("system clock is set past the Unix epoch")
            .as_millis();

        Self { millis }
    }
}

impl std::ops::Add<LocalDuration> for LocalTime {
    type Output = LocalTime;

    fn add(self, other: LocalDuration) -> LocalTime {
        LocalTime {
            millis: self.millis + other.0,
        }
    }
}

impl std::ops::Sub<LocalTime> for LocalTime {
    type Output = LocalDuration;

    fn sub(self, other: LocalTime) -> LocalDuration {
        LocalDuration(self.millis.saturating_sub(other.millis))
    }
}

/// Time duration as measured locally, in milliseconds.
#[derive(Debug, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Default)]
pub struct LocalDuration(u128);

impl LocalDuration {
    /// Duration from whole milliseconds.
    pub const fn from_millis(millis: u128) -> Self {
        Self(millis)
    }

    /// Duration from whole seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs as u128 * 1000)
    }

    pub const fn as_millis(&self) -> u128 {
        self.0
    }
}

impl std::fmt::Display for LocalDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ms", self.0)
    }
}

impl From<LocalDuration> for std::time::Duration {
    fn from(other: LocalDuration) -> Self {
        std::time::Duration::from_millis(other.0 as u64)
    }
}

/// Tracks timer deadlines and reports the ones which passed.
pub struct TimeoutManager<K> {
    /// Deadlines sorted by decreasing time, so the earliest one sits at the
    /// end and pops first.
    timeouts: Vec<(K, LocalTime)>,
}

impl<K> Default for TimeoutManager<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TimeoutManager<K> {
    pub fn new() -> Self {
        Self { timeouts: Vec::new() }
    }

    /// Number of deadlines being tracked.
    pub fn len(&self) -> usize {
        self.timeouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeouts.is_empty()
    }

    /// Registers a new deadline with an associated key.
    pub fn register(&mut self, key: K, time: LocalTime) {
        self.timeouts.push((key, time));
        self.timeouts.sort_unstable_by(|(_, a), (_, b)| b.cmp(a));
    }

    /// Minimum duration to wait for at least one deadline to be reached;
    /// `None` if there are no deadlines.
    pub fn next(&self, now: LocalTime) -> Option<LocalDuration> {
        self.timeouts.last().map(|(_, deadline)| *deadline - now)
    }

    /// Pops the keys whose deadline passed into `woken`, returning how many
    /// timed out.
    pub fn wake(&mut self, now: LocalTime, woken: &mut Vec<K>) -> usize {
        let before = woken.len();

        while let Some((key, deadline)) = self.timeouts.pop() {
            if now >= deadline {
                woken.push(key);
            } else {
                self.timeouts.push((key, deadline));
                break;
            }
        }

        woken.len() - before
    }
}
