//! Performance measurement tools.

use std::{
    fmt,
    time::{Duration, Instant},
};

const MAX_DURATIONS: usize = 250;

/// A timer that can measure and average the time an operation takes.
///
/// Displaying the timer with `{}` ([`std::fmt::Display`]) prints the average of the collected
/// timings. [`FpsCounter::tick_with`] resets them after logging.
pub struct Timer {
    name: &'static str,
    durations: Vec<Duration>,
    /// Number of measurements dropped because `durations` was full.
    dropped: usize,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            durations: Vec::new(),
            dropped: 0,
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&mut self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation using a drop guard.
    ///
    /// When the returned [`TimerGuard`] is dropped, the time between the call to `start` and the
    /// drop is measured and recorded.
    pub fn start(&mut self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn stop(&mut self, start: Instant) {
        if self.durations.len() < MAX_DURATIONS {
            self.durations.push(start.elapsed());
        } else {
            self.dropped += 1;
        }
    }

    /// Returns the average of all durations recorded since the last reset.
    pub fn average(&self) -> Option<Duration> {
        if self.durations.is_empty() {
            return None;
        }
        Some(self.durations.iter().sum::<Duration>() / self.durations.len() as u32)
    }

    /// Returns the number of recorded measurements since the last reset.
    pub fn count(&self) -> usize {
        self.durations.len() + self.dropped
    }

    fn reset(&mut self) {
        self.durations.clear();
        self.dropped = 0;
    }
}

/// Guard returned by [`Timer::start`]. Stops timing the operation when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a mut Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop(self.start);
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.average() {
            Some(avg) => write!(
                f,
                "{}: {}x{:.01}ms",
                self.name,
                self.count(),
                avg.as_secs_f32() * 1000.0
            ),
            None => write!(f, "{}: -", self.name),
        }
    }
}

/// Logs frames per second together with the timings of a set of [`Timer`]s.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Advances the frame counter by 1 and logs FPS and the average of each timer if one second
    /// has passed.
    ///
    /// Timers are reset after being logged.
    pub fn tick_with<'a, I: IntoIterator<Item = &'a mut Timer>>(&mut self, timers: I) {
        self.frames += 1;
        if self.start.elapsed() < Duration::from_secs(1) {
            return;
        }

        let mut extra = String::new();
        for timer in timers {
            if extra.is_empty() {
                extra.push_str(" (");
            } else {
                extra.push_str(", ");
            }
            extra.push_str(&timer.to_string());
            timer.reset();
        }
        if !extra.is_empty() {
            extra.push(')');
        }
        log::debug!("{}: {} FPS{}", self.name, self.frames, extra);

        self.frames = 0;
        self.start = Instant::now();
    }
}
