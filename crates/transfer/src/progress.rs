use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default sliding window for speed estimates.
const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// Percentage step between two reported milestones.
const MILESTONE_STEP: u8 = 10;

// ---------------------------------------------------------------------------
// ProgressMeter
// ---------------------------------------------------------------------------

/// Turns a growing byte count into coarse percentage milestones.
pub struct ProgressMeter {
    total: u64,
    next_milestone: u8,
    speed: SpeedCalculator,
}

impl ProgressMeter {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            next_milestone: MILESTONE_STEP,
            speed: SpeedCalculator::new(None),
        }
    }

    /// Records that `bytes` more have arrived and the transfer now stands at
    /// `done` bytes. Returns the highest milestone crossed by this call.
    pub fn record(&mut self, done: u64, bytes: u64) -> Option<u8> {
        self.speed.add_sample(bytes);

        let pct = percent(done, self.total);
        if self.next_milestone > 100 || pct < self.next_milestone {
            return None;
        }
        let reached = pct - pct % MILESTONE_STEP;
        self.next_milestone = reached + MILESTONE_STEP;
        Some(reached)
    }

    /// Current transfer speed in bytes/second.
    pub fn bytes_per_second(&self) -> f64 {
        self.speed.bytes_per_second()
    }
}

fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) as u128 * 100) / total as u128) as u8
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed over a sliding window of samples.
pub struct SpeedCalculator {
    samples: VecDeque<SpeedSample>,
    window: Duration,
}

impl SpeedCalculator {
    /// Creates a calculator; `window` defaults to 5 s.
    pub fn new(window: Option<Duration>) -> Self {
        Self {
            samples: VecDeque::new(),
            window: window.unwrap_or(DEFAULT_WINDOW),
        }
    }

    /// Records `bytes` transferred at the current instant.
    pub fn add_sample(&mut self, bytes: u64) {
        let now = Instant::now();
        self.samples.push_back(SpeedSample {
            bytes,
            timestamp: now,
        });
        while let Some(front) = self.samples.front() {
            if now.duration_since(front.timestamp) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Average speed in bytes/second within the window.
    ///
    /// Returns 0.0 with fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if self.samples.len() < 2 || elapsed.is_zero() {
            return 0.0;
        }
        let total: u64 = self.samples.iter().map(|s| s.bytes).sum();
        total as f64 / elapsed.as_secs_f64()
    }
}
