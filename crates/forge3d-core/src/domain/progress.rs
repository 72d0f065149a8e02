//! Aggregate install progress.

/// Computes the session progress fraction across dependency groups.
///
/// `fraction = (groups_done + done_in_group / group_len) / total_groups`,
/// clamped so the reported value never decreases within a session.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    total_groups: usize,
    reported: f64,
}

impl ProgressTracker {
    pub fn new(total_groups: usize) -> Self {
        Self {
            total_groups,
            reported: 0.0,
        }
    }

    /// Start a new session with a different step count. The only way back to zero.
    pub fn reset(&mut self, total_groups: usize) {
        self.total_groups = total_groups;
        self.reported = 0.0;
    }

    pub const fn total_groups(&self) -> usize {
        self.total_groups
    }

    /// Record progress and return the fraction to display.
    #[allow(clippy::cast_precision_loss)]
    pub fn update(&mut self, groups_done: usize, done_in_group: usize, group_len: usize) -> f64 {
        if self.total_groups == 0 {
            return self.reported;
        }
        let within = if group_len == 0 {
            0.0
        } else {
            done_in_group.min(group_len) as f64 / group_len as f64
        };
        let raw = (groups_done as f64 + within) / self.total_groups as f64;
        let raw = raw.clamp(0.0, 1.0);
        if raw > self.reported {
            self.reported = raw;
        }
        self.reported
    }

    pub fn complete(&mut self) -> f64 {
        self.reported = 1.0;
        self.reported
    }

    pub const fn fraction(&self) -> f64 {
        self.reported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_formula() {
        let mut tracker = ProgressTracker::new(4);
        assert!((tracker.update(1, 1, 2) - 0.375).abs() < f64::EPSILON);
        assert!((tracker.update(2, 0, 5) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_never_decreases() {
        let mut tracker = ProgressTracker::new(2);
        let high = tracker.update(1, 1, 2);
        let after = tracker.update(0, 1, 10);
        assert!((after - high).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset_and_empty() {
        let mut tracker = ProgressTracker::new(0);
        assert!(tracker.update(3, 1, 1).abs() < f64::EPSILON);
        tracker.reset(1);
        assert!((tracker.update(0, 1, 1) - 1.0).abs() < f64::EPSILON);
        tracker.reset(3);
        assert!(tracker.fraction().abs() < f64::EPSILON);
    }
}
