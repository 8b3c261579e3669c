//! Knowledge entry types
//!
//! A knowledge entry is a titled, categorized unit of reference text the
//! tutoring bot can retrieve. Staff create and edit entries; the retrieval
//! core only reads them and bumps their usage counters.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of a knowledge entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeCategory {
    CourseMaterial,
    StudyGuide,
    ExamPrep,
    GeneralAdvice,
    CourseSpecific,
}

impl KnowledgeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CourseMaterial => "course_material",
            Self::StudyGuide => "study_guide",
            Self::ExamPrep => "exam_prep",
            Self::GeneralAdvice => "general_advice",
            Self::CourseSpecific => "course_specific",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "course_material" => Some(Self::CourseMaterial),
            "study_guide" => Some(Self::StudyGuide),
            "exam_prep" => Some(Self::ExamPrep),
            "general_advice" => Some(Self::GeneralAdvice),
            "course_specific" => Some(Self::CourseSpecific),
            _ => None,
        }
    }

    pub fn all() -> &'static [KnowledgeCategory] {
        &[
            Self::CourseMaterial,
            Self::StudyGuide,
            Self::ExamPrep,
            Self::GeneralAdvice,
            Self::CourseSpecific,
        ]
    }
}

impl std::fmt::Display for KnowledgeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unit of reference text available to the tutoring bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: KnowledgeCategory,
    /// Course this entry belongs to; `None` makes it global
    pub course_id: Option<String>,
    pub tags: BTreeSet<String>,
    /// Absent when the embedding call failed at write time
    pub embedding: Option<Vec<f32>>,
    pub embedding_model: Option<String>,
    /// Admin-tunable multiplier applied to similarity (1.0 = neutral)
    pub relevance_score: f32,
    pub usage_count: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        category: KnowledgeCategory,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            category,
            course_id: None,
            tags: BTreeSet::new(),
            embedding: None,
            embedding_model: None,
            relevance_score: 1.0,
            usage_count: 0,
            last_used: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_course(mut self, course_id: impl Into<String>) -> Self {
        self.course_id = Some(course_id.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>, model: impl Into<String>) -> Self {
        self.embedding = Some(embedding);
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_relevance_score(mut self, relevance_score: f32) -> Self {
        self.relevance_score = relevance_score;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether the entry has a vector usable for similarity scoring
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Text that gets embedded for this entry
    pub fn embedding_text(&self) -> String {
        let mut text = format!("{}\n\n{}", self.title, self.content);
        if !self.tags.is_empty() {
            let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
            text.push_str("\n\nTags: ");
            text.push_str(&tags.join(", "));
        }
        text
    }

    /// Whether the entry is visible inside a course scope
    ///
    /// Global entries are visible everywhere; course entries only in their course.
    pub fn visible_in(&self, course_id: Option<&str>) -> bool {
        match (course_id, self.course_id.as_deref()) {
            (None, _) | (_, None) => true,
            (Some(scope), Some(own)) => scope == own,
        }
    }
}

/// Filter passed to [`KnowledgeStore::find`](super::KnowledgeStore::find)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeFilter {
    /// Course scope: matches entries of this course plus global entries
    pub course_id: Option<String>,
    pub category: Option<KnowledgeCategory>,
    /// Include inactive entries (admin listings only)
    pub include_inactive: bool,
    /// Only entries that carry an embedding
    pub embedded_only: bool,
    /// Only entries whose embedding is absent
    pub missing_embedding_only: bool,
    pub limit: usize,
}

impl KnowledgeFilter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn with_course(mut self, course_id: Option<String>) -> Self {
        self.course_id = course_id;
        self
    }

    pub fn with_category(mut self, category: Option<KnowledgeCategory>) -> Self {
        self.category = category;
        self
    }

    pub fn embedded_only(mut self) -> Self {
        self.embedded_only = true;
        self
    }

    pub fn missing_embedding(mut self) -> Self {
        self.missing_embedding_only = true;
        self
    }

    pub fn including_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    /// Evaluate the filter against one entry (used by in-memory stores)
    pub fn matches(&self, entry: &KnowledgeEntry) -> bool {
        (self.include_inactive || entry.is_active)
            && entry.visible_in(self.course_id.as_deref())
            && self.category.is_none_or(|c| c == entry.category)
            && (!self.embedded_only || entry.has_embedding())
            && (!self.missing_embedding_only || !entry.has_embedding())
    }
}

/// Retrieval scope supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalScope {
    pub course_id: Option<String>,
    pub category: Option<KnowledgeCategory>,
}

impl RetrievalScope {
    pub fn course(course_id: impl Into<String>) -> Self {
        Self {
            course_id: Some(course_id.into()),
            category: None,
        }
    }

    pub fn with_category(mut self, category: KnowledgeCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// How a retrieval result was ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Cosine similarity against the query embedding
    Semantic,
    /// Most-used, then most-recent entries with a neutral score
    Recency,
}

/// One ranked knowledge item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedKnowledge {
    pub knowledge_id: String,
    pub title: String,
    pub content: String,
    pub category: KnowledgeCategory,
    pub score: f32,
}

impl RetrievedKnowledge {
    pub fn from_entry(entry: &KnowledgeEntry, score: f32) -> Self {
        Self {
            knowledge_id: entry.id.clone(),
            title: entry.title.clone(),
            content: entry.content.clone(),
            category: entry.category,
            score,
        }
    }
}

/// Ranked knowledge, sorted by non-increasing score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub strategy: RetrievalStrategy,
    pub items: Vec<RetrievedKnowledge>,
}

impl RetrievalResult {
    pub fn empty(strategy: RetrievalStrategy) -> Self {
        Self {
            strategy,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.knowledge_id.clone()).collect()
    }
}
