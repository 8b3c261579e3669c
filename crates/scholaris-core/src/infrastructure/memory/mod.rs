//! In-memory collaborator store
//!
//! Implements every store trait over plain collections. The CLI loads it
//! from a [`Dataset`] file; tests seed it directly.

mod dataset;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::campaign::{
    Campaign, CampaignStore, CampaignTargeting, EnrollmentLookup, VisitorEnrollment, VisitorKey,
};
use crate::domain::knowledge::{KnowledgeEntry, KnowledgeFilter, KnowledgeOrder, KnowledgeStore};
use crate::domain::student::{
    Course, Enrollment, EnrollmentStore, Grade, GradeStore, Student, StudentStore,
};
use crate::domain::tutor::{ChatMessage, ChatRepository};
use crate::error::Result;

pub use dataset::{Dataset, VisitorEnrollmentRecord};

#[derive(Debug, Default)]
struct State {
    /// Insertion order is the tie-breaker for equal sort keys
    knowledge: Vec<KnowledgeEntry>,
    students: HashMap<String, Student>,
    courses: HashMap<String, Course>,
    enrollments: Vec<Enrollment>,
    grades: Vec<Grade>,
    campaigns: HashMap<String, Campaign>,
    visitor_enrollments: HashMap<VisitorKey, Vec<VisitorEnrollment>>,
    chats: Vec<ChatMessage>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        let store = Self::new();
        {
            let mut state = store.write();
            for student in dataset.students {
                state.students.insert(student.id.clone(), student);
            }
            for course in dataset.courses {
                state.courses.insert(course.id.clone(), course);
            }
            state.enrollments = dataset.enrollments;
            state.grades = dataset.grades;
            for campaign in dataset.campaigns {
                state.campaigns.insert(campaign.id.clone(), campaign);
            }
            for record in dataset.visitor_enrollments {
                state
                    .visitor_enrollments
                    .entry(record.visitor)
                    .or_default()
                    .push(record.enrollment);
            }
        }
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace an entry as-is, counters included
    pub fn insert_knowledge(&self, entry: KnowledgeEntry) {
        let mut state = self.write();
        match state.knowledge.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => state.knowledge.push(entry),
        }
    }

    pub fn knowledge(&self, id: &str) -> Option<KnowledgeEntry> {
        self.read().knowledge.iter().find(|e| e.id == id).cloned()
    }

    pub fn insert_student(&self, student: Student) {
        self.write().students.insert(student.id.clone(), student);
    }

    pub fn insert_course(&self, course: Course) {
        self.write().courses.insert(course.id.clone(), course);
    }

    pub fn insert_enrollment(&self, enrollment: Enrollment) {
        self.write().enrollments.push(enrollment);
    }

    pub fn insert_grade(&self, grade: Grade) {
        self.write().grades.push(grade);
    }

    pub fn insert_campaign(&self, campaign: Campaign) {
        self.write().campaigns.insert(campaign.id.clone(), campaign);
    }

    pub fn insert_visitor_enrollment(&self, key: VisitorKey, enrollment: VisitorEnrollment) {
        self.write()
            .visitor_enrollments
            .entry(key)
            .or_default()
            .push(enrollment);
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn find(
        &self,
        filter: &KnowledgeFilter,
        order: KnowledgeOrder,
    ) -> Result<Vec<KnowledgeEntry>> {
        let mut entries: Vec<KnowledgeEntry> = self
            .read()
            .knowledge
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();

        match order {
            KnowledgeOrder::RecentlyUpdated => {
                entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            }
            KnowledgeOrder::MostUsed => entries.sort_by(|a, b| {
                b.usage_count
                    .cmp(&a.usage_count)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            }),
        }
        entries.truncate(filter.limit);
        Ok(entries)
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeEntry>> {
        Ok(self.knowledge(id))
    }

    async fn save(&self, entry: &KnowledgeEntry) -> Result<()> {
        let mut state = self.write();
        match state.knowledge.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                let mut updated = entry.clone();
                updated.usage_count = existing.usage_count;
                updated.last_used = existing.last_used;
                updated.created_at = existing.created_at;
                *existing = updated;
            }
            None => state.knowledge.push(entry.clone()),
        }
        Ok(())
    }

    async fn increment_usage(&self, id: &str) -> Result<bool> {
        let mut state = self.write();
        match state.knowledge.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.usage_count += 1;
                entry.last_used = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.read().knowledge.len() as u64)
    }
}

#[async_trait]
impl StudentStore for InMemoryStore {
    async fn find_student(&self, id: &str) -> Result<Option<Student>> {
        Ok(self.read().students.get(id).cloned())
    }

    async fn find_course(&self, id: &str) -> Result<Option<Course>> {
        Ok(self.read().courses.get(id).cloned())
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryStore {
    async fn find_by_student(
        &self,
        student_id: &str,
        course_id: Option<&str>,
    ) -> Result<Vec<Enrollment>> {
        Ok(self
            .read()
            .enrollments
            .iter()
            .filter(|e| e.student_id == student_id)
            .filter(|e| course_id.is_none_or(|c| e.course_id == c))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl GradeStore for InMemoryStore {
    async fn find_by_enrollments(
        &self,
        student_id: &str,
        enrollment_ids: &[String],
    ) -> Result<Vec<Grade>> {
        Ok(self
            .read()
            .grades
            .iter()
            .filter(|g| g.student_id == student_id && enrollment_ids.contains(&g.enrollment_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn find_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        Ok(self.read().campaigns.get(id).cloned())
    }

    async fn find_targeting_rules(&self, campaign_id: &str) -> Result<Option<CampaignTargeting>> {
        Ok(self
            .read()
            .campaigns
            .get(campaign_id)
            .map(|c| c.targeting.clone()))
    }
}

#[async_trait]
impl EnrollmentLookup for InMemoryStore {
    async fn enrollments_for(&self, key: &VisitorKey) -> Result<Vec<VisitorEnrollment>> {
        Ok(self
            .read()
            .visitor_enrollments
            .get(key)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChatRepository for InMemoryStore {
    async fn append(&self, message: &ChatMessage) -> Result<()> {
        self.write().chats.push(message.clone());
        Ok(())
    }

    async fn history(
        &self,
        student_id: &str,
        course_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let state = self.read();
        let matching: Vec<&ChatMessage> = state
            .chats
            .iter()
            .filter(|m| m.student_id == student_id && m.course_id.as_deref() == course_id)
            .collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge::KnowledgeCategory;

    #[tokio::test]
    async fn test_save_keeps_usage_counters() {
        let store = InMemoryStore::new();
        let entry = KnowledgeEntry::new("t", "c", KnowledgeCategory::StudyGuide);
        store.save(&entry).await.unwrap();
        store.increment_usage(&entry.id).await.unwrap();

        let mut edited = entry.clone();
        edited.title = "edited".into();
        store.save(&edited).await.unwrap();

        let stored = store.knowledge(&entry.id).unwrap();
        assert_eq!(stored.title, "edited");
        assert_eq!(stored.usage_count, 1);
    }

    #[tokio::test]
    async fn test_from_dataset() {
        let dataset = Dataset::from_json(
            r#"{
                "students": [{"id": "s1", "name": "Ada"}],
                "visitor_enrollments": [
                    {"visitor": {"kind": "customer", "id": "c1"}, "target_id": "math", "kind": "course", "status": "enrolled"}
                ]
            }"#,
        )
        .unwrap();
        let store = InMemoryStore::from_dataset(dataset);

        assert!(store.find_student("s1").await.unwrap().is_some());
        let found = store
            .enrollments_for(&VisitorKey::Customer("c1".into()))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(
            store
                .enrollments_for(&VisitorKey::Lead("c1".into()))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_history_limit_keeps_latest() {
        use crate::domain::tutor::Intent;
        use crate::llm::MessageRole;

        let store = InMemoryStore::new();
        for text in ["a", "b", "c"] {
            store
                .append(&ChatMessage::new("s1", None, MessageRole::User, text, Intent::General))
                .await
                .unwrap();
        }
        let history = store.history("s1", None, 2).await.unwrap();
        let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c"]);
    }
}
