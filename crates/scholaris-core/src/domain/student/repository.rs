//! Read-only collaborator traits for student records

use async_trait::async_trait;

use crate::error::Result;

use super::entity::{Course, Enrollment, Grade, Student};

#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn find_student(&self, id: &str) -> Result<Option<Student>>;

    async fn find_course(&self, id: &str) -> Result<Option<Course>>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Enrollments of one student, optionally narrowed to one course
    async fn find_by_student(
        &self,
        student_id: &str,
        course_id: Option<&str>,
    ) -> Result<Vec<Enrollment>>;
}

#[async_trait]
pub trait GradeStore: Send + Sync {
    /// Grades of one student recorded against the given enrollments
    async fn find_by_enrollments(
        &self,
        student_id: &str,
        enrollment_ids: &[String],
    ) -> Result<Vec<Grade>>;
}
