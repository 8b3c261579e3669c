//! Prompt composition for the tutoring bot

use std::fmt::Write;

use crate::domain::knowledge::RetrievedKnowledge;
use crate::domain::student::StudentContext;

use super::intent::Intent;

const SYSTEM_INSTRUCTION: &str = "You are a patient, encouraging tutor for students of an education center. \
Answer using the student's academic context and the reference material provided. \
When the reference material does not cover the question, say so and give general study advice. \
Keep answers concise and practical. Never reveal information about other students.";

/// System instruction for one turn
pub fn system_prompt(intent: Intent, language: &str) -> String {
    let mut prompt = String::from(SYSTEM_INSTRUCTION);
    let _ = write!(prompt, "\nAlways answer in {}.", language);
    if let Some(focus) = intent.focus() {
        prompt.push('\n');
        prompt.push_str(focus);
    }
    prompt
}

/// User turn: student context, knowledge snippets, then the raw message
pub fn user_prompt(
    context: &StudentContext,
    knowledge: &[RetrievedKnowledge],
    message: &str,
) -> String {
    let mut prompt = String::new();

    if context.has_courses() {
        prompt.push_str(&render_student_context(context));
    } else {
        let _ = writeln!(
            prompt,
            "Student: {}. The student has no courses yet.",
            context.student_name
        );
    }

    if !knowledge.is_empty() {
        prompt.push('\n');
        prompt.push_str(&render_knowledge(knowledge));
    }

    prompt.push_str("\nStudent question:\n");
    prompt.push_str(message.trim());
    prompt
}

pub fn render_student_context(context: &StudentContext) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Student: {}", context.student_name);
    match context.overall_average {
        Some(avg) => {
            let _ = writeln!(
                out,
                "Overall average: {:.1}% over {} exams",
                avg, context.total_exams
            );
        }
        None => {
            let _ = writeln!(out, "Overall average: no graded exams yet");
        }
    }

    for course in &context.courses {
        let _ = write!(out, "\nCourse: {} ({})", course.course_name, course.status);
        if let Some(subject) = &course.subject {
            let _ = write!(out, ", subject {}", subject);
        }
        if let Some(start) = course.start_date {
            let _ = write!(out, ", started {}", start);
        }
        let _ = writeln!(out, ", {} sessions", course.session_count);

        if let Some(avg) = course.average_grade {
            let _ = writeln!(out, "  Average: {:.1}%", avg);
        }
        for grade in &course.grades {
            let pct = grade
                .percentage
                .map(|p| format!("{}%", p))
                .unwrap_or_else(|| "ungraded".to_string());
            let _ = write!(
                out,
                "  - {} [{}]: {}/{} ({})",
                grade.exam_name, grade.exam_type, grade.score, grade.max_score, pct
            );
            if let Some(notes) = grade.notes.as_deref().filter(|n| !n.trim().is_empty()) {
                let _ = write!(out, ", teacher notes: {}", notes.trim());
            }
            out.push('\n');
        }
        if !course.weak_areas.is_empty() {
            let _ = writeln!(out, "  Weak areas: {}", course.weak_areas.join(", "));
        }
    }
    out
}

pub fn render_knowledge(knowledge: &[RetrievedKnowledge]) -> String {
    let mut out = String::from("Reference material:\n");
    for (i, item) in knowledge.iter().enumerate() {
        let _ = writeln!(
            out,
            "[{}] {} ({})\n{}",
            i + 1,
            item.title,
            item.category,
            item.content.trim()
        );
    }
    out
}
