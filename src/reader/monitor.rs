use std::time::{Duration, Instant};

/// Default time without decoded sentences before the stream counts as stalled
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_millis(5000);

/// Activity change reported by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// First sentence after start, reset or a stall
    Started,
    /// No sentence for the configured timeout
    Stalled,
}

/// Tracks time since the last successfully decoded sentence
///
/// The owning loop calls [`refresh`](ActivityMonitor::refresh) for every
/// decoded sentence and [`tick`](ActivityMonitor::tick) once per iteration.
/// A stall is reported once per onset; the next refresh reports the stream
/// as started again.
#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    timeout: Duration,
    last_activity: Option<Instant>,
    stalled: bool,
}

impl Default for ActivityMonitor {
    fn default() -> Self {
        ActivityMonitor::new(DEFAULT_STALL_TIMEOUT)
    }
}

impl ActivityMonitor {
    pub fn new(timeout: Duration) -> Self {
        ActivityMonitor {
            timeout,
            last_activity: None,
            stalled: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Records a decoded sentence now
    pub fn refresh(&mut self) -> Option<Activity> {
        self.refresh_at(Instant::now())
    }

    /// Records a decoded sentence at `now`
    ///
    /// Returns `Started` if the stream was idle before this sentence.
    pub fn refresh_at(&mut self, now: Instant) -> Option<Activity> {
        let started = self.last_activity.is_none() || self.stalled;
        self.last_activity = Some(now);
        self.stalled = false;
        started.then_some(Activity::Started)
    }

    /// Checks for a stall now
    pub fn tick(&mut self) -> Option<Activity> {
        self.tick_at(Instant::now())
    }

    /// Checks for a stall at `now`
    ///
    /// Returns `Stalled` only on the tick where the timeout is first reached.
    pub fn tick_at(&mut self, now: Instant) -> Option<Activity> {
        match self.last_activity {
            Some(last) if !self.stalled && now.saturating_duration_since(last) >= self.timeout => {
                self.stalled = true;
                Some(Activity::Stalled)
            }
            _ => None,
        }
    }

    /// Clears the baseline so a restarted loop does not report a stale stall
    pub fn reset(&mut self) {
        self.last_activity = None;
        self.stalled = false;
    }

    /// Returns true between stall onset and the next refresh
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Time of the last decoded sentence since start or reset
    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }
}
