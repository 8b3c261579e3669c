//! Student context assembly
//!
//! Builds a [`StudentContext`] from the student, enrollment and grade
//! stores. Every lookup is keyed by the requesting student, and records that
//! come back for anybody else are dropped before they reach a prompt.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::context::{
    CourseSummary, GradeSummary, StudentContext, WEAK_AREA_THRESHOLD, mean, percentage,
};
use super::entity::{Enrollment, Grade};
use super::repository::{EnrollmentStore, GradeStore, StudentStore};

pub struct StudentContextAssembler {
    students: Arc<dyn StudentStore>,
    enrollments: Arc<dyn EnrollmentStore>,
    grades: Arc<dyn GradeStore>,
}

impl StudentContextAssembler {
    pub fn new(
        students: Arc<dyn StudentStore>,
        enrollments: Arc<dyn EnrollmentStore>,
        grades: Arc<dyn GradeStore>,
    ) -> Self {
        Self {
            students,
            enrollments,
            grades,
        }
    }

    /// Assemble the context of `student_id`, optionally narrowed to one course
    pub async fn assemble(
        &self,
        student_id: &str,
        course_id: Option<&str>,
    ) -> Result<StudentContext> {
        let student = self
            .students
            .find_student(student_id)
            .await?
            .ok_or_else(|| Error::StudentNotFound(student_id.to_string()))?;

        if let Some(course_id) = course_id {
            if self.students.find_course(course_id).await?.is_none() {
                return Err(Error::CourseNotFound(course_id.to_string()));
            }
        }

        let enrollments: Vec<Enrollment> = self
            .enrollments
            .find_by_student(student_id, course_id)
            .await?
            .into_iter()
            .filter(|e| e.student_id == student_id)
            .filter(|e| course_id.is_none_or(|c| e.course_id == c))
            .collect();

        let enrollment_ids: Vec<String> = enrollments.iter().map(|e| e.id.clone()).collect();
        let grades = if enrollment_ids.is_empty() {
            Vec::new()
        } else {
            self.grades
                .find_by_enrollments(student_id, &enrollment_ids)
                .await?
        };

        let owned: HashSet<&str> = enrollment_ids.iter().map(String::as_str).collect();
        let fetched = grades.len();
        let mut by_enrollment: HashMap<String, Vec<Grade>> = HashMap::new();
        for grade in grades {
            if grade.student_id != student_id || !owned.contains(grade.enrollment_id.as_str()) {
                continue;
            }
            by_enrollment
                .entry(grade.enrollment_id.clone())
                .or_default()
                .push(grade);
        }
        let kept: usize = by_enrollment.values().map(Vec::len).sum();
        if kept < fetched {
            warn!(
                student_id,
                discarded = fetched - kept,
                "Discarded grades that do not belong to the student"
            );
        }

        let mut courses = Vec::with_capacity(enrollments.len());
        let mut all_percentages = Vec::new();
        let mut total_exams = 0;

        for enrollment in &enrollments {
            let Some(course) = self.students.find_course(&enrollment.course_id).await? else {
                warn!(
                    enrollment_id = %enrollment.id,
                    course_id = %enrollment.course_id,
                    "Enrollment references an unknown course, skipping"
                );
                continue;
            };

            let mut grades = by_enrollment.remove(&enrollment.id).unwrap_or_default();
            grades.sort_by(|a, b| {
                a.exam
                    .date
                    .cmp(&b.exam.date)
                    .then_with(|| a.exam.name.cmp(&b.exam.name))
            });

            let summaries: Vec<GradeSummary> = grades.into_iter().map(summarize_grade).collect();
            let percentages: Vec<u32> = summaries.iter().filter_map(|g| g.percentage).collect();
            let weak_areas = summaries
                .iter()
                .filter(|g| g.percentage.is_some_and(|p| p < WEAK_AREA_THRESHOLD))
                .map(|g| g.exam_name.clone())
                .collect();

            all_percentages.extend_from_slice(&percentages);
            total_exams += summaries.len();
            courses.push(CourseSummary {
                course_id: course.id,
                course_name: course.name,
                subject: course.subject,
                status: enrollment.status,
                start_date: enrollment.start_date,
                session_count: course.session_count,
                average_grade: mean(&percentages),
                weak_areas,
                grades: summaries,
            });
        }

        debug!(
            student_id,
            courses = courses.len(),
            total_exams,
            "Student context assembled"
        );

        Ok(StudentContext {
            student_id: student.id,
            student_name: student.name,
            courses,
            overall_average: mean(&all_percentages),
            total_exams,
        })
    }
}

fn summarize_grade(grade: Grade) -> GradeSummary {
    GradeSummary {
        percentage: percentage(grade.score, grade.exam.max_score),
        exam_name: grade.exam.name,
        exam_type: grade.exam.exam_type,
        date: grade.exam.date,
        score: grade.score,
        max_score: grade.exam.max_score,
        notes: grade.notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::student::{Course, EnrollmentStatus, Exam, Student};
    use crate::infrastructure::memory::InMemoryStore;
    use async_trait::async_trait;

    fn exam(name: &str, max_score: f64) -> Exam {
        Exam {
            id: format!("exam-{}", name),
            name: name.to_string(),
            exam_type: "quiz".to_string(),
            date: None,
            max_score,
            weight: 1.0,
        }
    }

    fn grade(id: &str, enrollment: &str, student: &str, exam: Exam, score: f64) -> Grade {
        Grade {
            id: id.to_string(),
            enrollment_id: enrollment.to_string(),
            student_id: student.to_string(),
            exam,
            score,
            notes: None,
        }
    }

    fn enrollment(id: &str, student: &str, course: &str) -> Enrollment {
        Enrollment {
            id: id.to_string(),
            student_id: student.to_string(),
            course_id: course.to_string(),
            status: EnrollmentStatus::Enrolled,
            start_date: None,
        }
    }

    fn seeded() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.insert_student(Student {
            id: "s1".into(),
            name: "Ada".into(),
        });
        store.insert_student(Student {
            id: "s2".into(),
            name: "Grace".into(),
        });
        for (id, name) in [("math", "Mathematics"), ("phys", "Physics")] {
            store.insert_course(Course {
                id: id.into(),
                name: name.into(),
                subject: None,
                session_count: 12,
            });
        }
        store.insert_enrollment(enrollment("e1", "s1", "math"));
        store.insert_enrollment(enrollment("e2", "s1", "phys"));
        store.insert_enrollment(enrollment("e3", "s2", "math"));
        store
    }

    fn assembler(store: Arc<InMemoryStore>) -> StudentContextAssembler {
        StudentContextAssembler::new(store.clone(), store.clone(), store)
    }

    #[tokio::test]
    async fn test_unknown_student() {
        let err = assembler(seeded()).assemble("nobody", None).await.unwrap_err();
        assert!(matches!(err, Error::StudentNotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_course() {
        let err = assembler(seeded())
            .assemble("s1", Some("chemistry"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CourseNotFound(_)));
    }

    #[tokio::test]
    async fn test_no_grades_yields_no_averages() {
        let context = assembler(seeded()).assemble("s1", None).await.unwrap();
        assert_eq!(context.courses.len(), 2);
        assert_eq!(context.overall_average, None);
        assert_eq!(context.total_exams, 0);
        assert!(context.courses.iter().all(|c| c.average_grade.is_none()));
    }

    #[tokio::test]
    async fn test_weak_areas_per_course() {
        let store = seeded();
        store.insert_grade(grade("g1", "e1", "s1", exam("Algebra", 100.0), 85.0));
        store.insert_grade(grade("g2", "e2", "s1", exam("Kinematics", 100.0), 60.0));

        let context = assembler(store).assemble("s1", None).await.unwrap();
        let math = context.courses.iter().find(|c| c.course_id == "math").unwrap();
        let phys = context.courses.iter().find(|c| c.course_id == "phys").unwrap();

        assert_eq!(math.average_grade, Some(85.0));
        assert!(math.weak_areas.is_empty());
        assert_eq!(phys.average_grade, Some(60.0));
        assert_eq!(phys.weak_areas, vec!["Kinematics"]);
        assert_eq!(context.overall_average, Some(72.5));
    }

    #[tokio::test]
    async fn test_overall_average_is_mean_of_all_grades() {
        let store = seeded();
        store.insert_grade(grade("g1", "e1", "s1", exam("A", 100.0), 100.0));
        store.insert_grade(grade("g2", "e2", "s1", exam("B", 100.0), 0.0));
        store.insert_grade(grade("g3", "e2", "s1", exam("C", 100.0), 0.0));
        store.insert_grade(grade("g4", "e2", "s1", exam("D", 100.0), 0.0));

        let context = assembler(store).assemble("s1", None).await.unwrap();
        assert_eq!(context.overall_average, Some(25.0));
        assert_eq!(context.total_exams, 4);
    }

    #[tokio::test]
    async fn test_zero_max_score_excluded_from_averages() {
        let store = seeded();
        store.insert_grade(grade("g1", "e1", "s1", exam("Attendance", 0.0), 5.0));
        store.insert_grade(grade("g2", "e1", "s1", exam("Quiz", 10.0), 5.0));

        let context = assembler(store).assemble("s1", Some("math")).await.unwrap();
        assert_eq!(context.courses.len(), 1);
        let math = &context.courses[0];
        assert_eq!(math.grades.len(), 2);
        assert_eq!(math.average_grade, Some(50.0));
        assert_eq!(math.weak_areas, vec!["Quiz"]);
        assert_eq!(context.total_exams, 2);
    }

    #[tokio::test]
    async fn test_grades_of_unknown_course_not_counted() {
        let store = seeded();
        store.insert_enrollment(enrollment("e9", "s1", "archived"));
        store.insert_grade(grade("g1", "e1", "s1", exam("Algebra", 100.0), 80.0));
        store.insert_grade(grade("g2", "e9", "s1", exam("Lost", 100.0), 20.0));

        let context = assembler(store).assemble("s1", None).await.unwrap();
        assert_eq!(context.courses.len(), 2);
        assert_eq!(context.total_exams, 1);
        assert_eq!(context.overall_average, Some(80.0));
    }

    struct LeakyGrades(Vec<Grade>);

    #[async_trait]
    impl GradeStore for LeakyGrades {
        async fn find_by_enrollments(&self, _: &str, _: &[String]) -> Result<Vec<Grade>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_foreign_grades_discarded() {
        let store = seeded();
        let leaky = Arc::new(LeakyGrades(vec![
            grade("g1", "e1", "s1", exam("Mine", 100.0), 90.0),
            grade("g2", "e3", "s2", exam("Theirs", 100.0), 10.0),
            grade("g3", "e3", "s1", exam("Mislabelled", 100.0), 10.0),
        ]));

        let context = StudentContextAssembler::new(store.clone(), store, leaky)
            .assemble("s1", None)
            .await
            .unwrap();

        let names: Vec<&str> = context
            .courses
            .iter()
            .flat_map(|c| c.grades.iter().map(|g| g.exam_name.as_str()))
            .collect();
        assert_eq!(names, vec!["Mine"]);
        assert_eq!(context.total_exams, 1);
    }
}
