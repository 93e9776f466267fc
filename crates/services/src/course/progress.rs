use serde::Serialize;

/// Where the learner is in the course, for a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    /// 1-based; 0 for an empty course.
    pub current_stage: usize,
    pub total_stages: usize,
    pub percent: u32,
}

impl CourseProgress {
    #[must_use]
    pub fn new(current_index: usize, total_stages: usize) -> Self {
        if total_stages == 0 {
            return Self {
                current_stage: 0,
                total_stages,
                percent: 0,
            };
        }
        let current_stage = current_index.min(total_stages - 1) + 1;
        let percent = (current_stage * 200 + total_stages) / (total_stages * 2);
        Self {
            current_stage,
            total_stages,
            percent: u32::try_from(percent).unwrap_or(100),
        }
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.total_stages > 0 && self.current_stage == self.total_stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_counts_the_current_stage() {
        let progress = CourseProgress::new(0, 3);
        assert_eq!(progress.current_stage, 1);
        assert_eq!(progress.percent, 33);
        assert!(!progress.is_last());
        assert_eq!(CourseProgress::new(2, 3).percent, 100);
        assert!(CourseProgress::new(2, 3).is_last());
    }

    #[test]
    fn empty_course_has_no_progress() {
        let progress = CourseProgress::new(0, 0);
        assert_eq!(progress.current_stage, 0);
        assert_eq!(progress.percent, 0);
        assert!(!progress.is_last());
    }
}
