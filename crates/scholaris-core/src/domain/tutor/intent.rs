//! Conversation intent tags

use serde::{Deserialize, Serialize};

/// What the student is trying to do in this turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    General,
    ExamPrep,
    Homework,
    StudyPlan,
    Progress,
    Motivation,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::ExamPrep => "exam_prep",
            Self::Homework => "homework",
            Self::StudyPlan => "study_plan",
            Self::Progress => "progress",
            Self::Motivation => "motivation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "general" | "" => Some(Self::General),
            "exam_prep" | "exam" => Some(Self::ExamPrep),
            "homework" => Some(Self::Homework),
            "study_plan" | "plan" => Some(Self::StudyPlan),
            "progress" => Some(Self::Progress),
            "motivation" => Some(Self::Motivation),
            _ => None,
        }
    }

    /// Extra instruction appended to the system prompt, if any
    pub fn focus(&self) -> Option<&'static str> {
        match self {
            Self::General => None,
            Self::ExamPrep => Some(
                "Focus on exam preparation: revision strategy, likely topics, and the student's weak areas.",
            ),
            Self::Homework => Some(
                "Guide the student towards the answer step by step instead of solving the task for them.",
            ),
            Self::StudyPlan => Some(
                "Propose a concrete, week-by-week study plan that fits the student's courses.",
            ),
            Self::Progress => Some(
                "Explain the student's progress from their grades, honestly and encouragingly.",
            ),
            Self::Motivation => Some(
                "The student needs encouragement; be warm and suggest one small next step.",
            ),
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
