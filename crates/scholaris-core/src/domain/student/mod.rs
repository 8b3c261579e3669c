//! Student domain module
//!
//! Read-only student records and the per-request context the tutor sees.

mod assembler;
mod context;
mod entity;
mod repository;

pub use assembler::StudentContextAssembler;
pub use context::{
    CourseSummary, GradeSummary, StudentContext, WEAK_AREA_THRESHOLD, mean, percentage,
};
pub use entity::{Course, Enrollment, EnrollmentStatus, Exam, Grade, Student};
pub use repository::{EnrollmentStore, GradeStore, StudentStore};
