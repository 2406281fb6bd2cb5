use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counts finished tasks across batches.
pub struct ProgressTracker {
    total: usize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_completion(&self, success: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_progress(&self) -> ProgressInfo {
        let completed = self.completed.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let elapsed = self.start_time.elapsed();
        let secs = elapsed.as_secs_f64();

        let rate = if secs > 0.0 { completed as f64 / secs } else { 0.0 };

        let eta = if completed > 0 && rate > 0.0 {
            let remaining = self.total.saturating_sub(completed);
            Some(Duration::from_secs_f64(remaining as f64 / rate))
        } else {
            None
        };

        ProgressInfo {
            total: self.total,
            completed,
            errors,
            success: completed - errors,
            elapsed,
            rate,
            eta,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Relaxed) >= self.total
    }
}

#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub total: usize,
    pub completed: usize,
    pub errors: usize,
    pub success: usize,
    pub elapsed: Duration,
    pub rate: f64,
    pub eta: Option<Duration>,
}

impl ProgressInfo {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f64 / self.total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracker() {
        let tracker = ProgressTracker::new(100);

        let progress = tracker.get_progress();
        assert_eq!(progress.total, 100);
        assert_eq!(progress.completed, 0);
        assert_eq!(progress.errors, 0);
        assert!(progress.eta.is_none());
        assert!(!tracker.is_complete());

        for i in 0..50 {
            tracker.record_completion(i % 10 != 0);
        }

        let progress = tracker.get_progress();
        assert_eq!(progress.completed, 50);
        assert_eq!(progress.errors, 5);
        assert_eq!(progress.success, 45);
        assert_eq!(progress.percent(), 50.0);
        assert!(!tracker.is_complete());

        for i in 50..100 {
            tracker.record_completion(i % 10 != 0);
        }

        assert!(tracker.is_complete());
        let final_progress = tracker.get_progress();
        assert_eq!(final_progress.completed, 100);
        assert_eq!(final_progress.errors, 10);
        assert_eq!(final_progress.success, 90);
    }

    #[test]
    fn test_empty_tracker_is_complete() {
        let tracker = ProgressTracker::new(0);
        assert!(tracker.is_complete());
        assert_eq!(tracker.get_progress().percent(), 100.0);
    }
}
