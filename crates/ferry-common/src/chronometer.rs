//! Elapsed-time measurement for pipeline stages and individual jobs

use std::future::Future;
use std::time::{Duration, Instant};

/// A started stopwatch.
#[derive(Debug, Clone, Copy)]
pub struct Chronometer {
    started_at: Instant,
}

impl Chronometer {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Await `fut` and return its output together with how long it took.
    pub async fn time<F, T>(fut: F) -> (T, Duration)
    where
        F: Future<Output = T>,
    {
        let chrono = Self::start();
        let output = fut.await;
        (output, chrono.elapsed())
    }
}

/// Render a duration the way stage summaries log it, e.g. `1.25s` or `340ms`.
pub fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_is_monotonic() {
        let chrono = Chronometer::start();
        let first = chrono.elapsed();
        std::thread::sleep(Duration::from_millis(5));
        assert!(chrono.elapsed() > first);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(340)), "340ms");
        assert_eq!(format_duration(Duration::from_millis(1250)), "1.25s");
        assert_eq!(format_duration(Duration::ZERO), "0ms");
    }
}
