//! Derived per-student academic context

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::entity::EnrollmentStatus;

/// Percentage below which an exam counts as a weak area
pub const WEAK_AREA_THRESHOLD: u32 = 70;

/// One graded exam as seen by the tutor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSummary {
    pub exam_name: String,
    pub exam_type: String,
    pub date: Option<NaiveDate>,
    pub score: f64,
    pub max_score: f64,
    /// `None` when the exam has no positive maximum score
    pub percentage: Option<u32>,
    pub notes: Option<String>,
}

/// A student's standing in one enrolled course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub course_id: String,
    pub course_name: String,
    pub subject: Option<String>,
    pub status: EnrollmentStatus,
    pub start_date: Option<NaiveDate>,
    pub session_count: u32,
    pub grades: Vec<GradeSummary>,
    pub average_grade: Option<f64>,
    pub weak_areas: Vec<String>,
}

/// Everything the tutor knows about a student, recomputed per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentContext {
    pub student_id: String,
    pub student_name: String,
    pub courses: Vec<CourseSummary>,
    /// Mean of every gradable percentage across all courses
    pub overall_average: Option<f64>,
    pub total_exams: usize,
}

impl StudentContext {
    pub fn has_courses(&self) -> bool {
        !self.courses.is_empty()
    }

    /// All weak areas, prefixed with their course name
    pub fn weak_areas(&self) -> Vec<String> {
        self.courses
            .iter()
            .flat_map(|c| {
                c.weak_areas
                    .iter()
                    .map(move |area| format!("{}: {}", c.course_name, area))
            })
            .collect()
    }
}

/// `round(score / max_score * 100)` clamped to `0..=100`
///
/// Returns `None` when `max_score` is not positive or either value is not finite.
pub fn percentage(score: f64, max_score: f64) -> Option<u32> {
    if !score.is_finite() || !max_score.is_finite() || max_score <= 0.0 {
        return None;
    }
    let pct = (score / max_score * 100.0).round().clamp(0.0, 100.0);
    Some(pct as u32)
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[u32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: u64 = values.iter().map(|&v| u64::from(v)).sum();
    Some(sum as f64 / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(17.0, 20.0), Some(85));
        assert_eq!(percentage(2.0, 3.0), Some(67));
        assert_eq!(percentage(0.0, 50.0), Some(0));
    }

    #[test]
    fn test_percentage_clamped() {
        assert_eq!(percentage(110.0, 100.0), Some(100));
        assert_eq!(percentage(-5.0, 100.0), Some(0));
    }

    #[test]
    fn test_percentage_without_max_score() {
        assert_eq!(percentage(10.0, 0.0), None);
        assert_eq!(percentage(10.0, -1.0), None);
        assert_eq!(percentage(f64::NAN, 10.0), None);
        assert_eq!(percentage(10.0, f64::NAN), None);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[100, 0, 0, 0]), Some(25.0));
        assert_eq!(mean(&[85, 60]), Some(72.5));
    }
}
