//! Composable targeting rules
//!
//! Each non-empty list of a [`CampaignTargeting`] becomes one rule. The
//! evaluator asks the rules in order and stops at the first match, so cheap
//! identity checks run before enrollment lookups.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domain::student::EnrollmentStatus;
use crate::error::Result;

use super::entity::{CampaignTargeting, EnrollmentKind, Visitor};
use super::repository::EnrollmentLookup;

/// Course enrollment statuses that count as "enrolled" for targeting
pub const COURSE_ENROLLMENT_STATUSES: &[EnrollmentStatus] = &[
    EnrollmentStatus::Pending,
    EnrollmentStatus::Approved,
    EnrollmentStatus::Enrolled,
];

/// Workshop enrollment statuses that count as "enrolled" for targeting
pub const WORKSHOP_ENROLLMENT_STATUSES: &[EnrollmentStatus] =
    &[EnrollmentStatus::Enrolled, EnrollmentStatus::Attended];

#[async_trait]
pub trait TargetingRule: Send + Sync {
    fn name(&self) -> &'static str;

    async fn matches(&self, visitor: &Visitor, enrollments: &dyn EnrollmentLookup) -> Result<bool>;
}

/// Visitor is on one of the allowed domains (case-insensitive)
pub struct DomainRule {
    domains: BTreeSet<String>,
}

impl DomainRule {
    pub fn new<'a>(domains: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            domains: domains.into_iter().map(|d| normalize_domain(d)).collect(),
        }
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_lowercase()
}

#[async_trait]
impl TargetingRule for DomainRule {
    fn name(&self) -> &'static str {
        "domain"
    }

    async fn matches(&self, visitor: &Visitor, _: &dyn EnrollmentLookup) -> Result<bool> {
        Ok(visitor
            .domain
            .as_deref()
            .is_some_and(|d| self.domains.contains(&normalize_domain(d))))
    }
}

/// Visitor is one of the listed customers
pub struct CustomerRule {
    ids: BTreeSet<String>,
}

impl CustomerRule {
    pub fn new(ids: BTreeSet<String>) -> Self {
        Self { ids }
    }
}

#[async_trait]
impl TargetingRule for CustomerRule {
    fn name(&self) -> &'static str {
        "customer"
    }

    async fn matches(&self, visitor: &Visitor, _: &dyn EnrollmentLookup) -> Result<bool> {
        Ok(visitor
            .customer_id
            .as_ref()
            .is_some_and(|id| self.ids.contains(id)))
    }
}

/// Visitor is one of the listed leads
pub struct LeadRule {
    ids: BTreeSet<String>,
}

impl LeadRule {
    pub fn new(ids: BTreeSet<String>) -> Self {
        Self { ids }
    }
}

#[async_trait]
impl TargetingRule for LeadRule {
    fn name(&self) -> &'static str {
        "lead"
    }

    async fn matches(&self, visitor: &Visitor, _: &dyn EnrollmentLookup) -> Result<bool> {
        Ok(visitor.lead_id.as_ref().is_some_and(|id| self.ids.contains(id)))
    }
}

/// Visitor holds a qualifying enrollment in one of the listed courses or workshops
pub struct EnrollmentRule {
    kind: EnrollmentKind,
    target_ids: BTreeSet<String>,
    statuses: &'static [EnrollmentStatus],
}

impl EnrollmentRule {
    pub fn courses(target_ids: BTreeSet<String>) -> Self {
        Self {
            kind: EnrollmentKind::Course,
            target_ids,
            statuses: COURSE_ENROLLMENT_STATUSES,
        }
    }

    pub fn workshops(target_ids: BTreeSet<String>) -> Self {
        Self {
            kind: EnrollmentKind::Workshop,
            target_ids,
            statuses: WORKSHOP_ENROLLMENT_STATUSES,
        }
    }
}

#[async_trait]
impl TargetingRule for EnrollmentRule {
    fn name(&self) -> &'static str {
        match self.kind {
            EnrollmentKind::Course => "course_enrollment",
            EnrollmentKind::Workshop => "workshop_enrollment",
        }
    }

    async fn matches(&self, visitor: &Visitor, enrollments: &dyn EnrollmentLookup) -> Result<bool> {
        for key in visitor.keys() {
            let found = enrollments.enrollments_for(&key).await?;
            if found.iter().any(|e| {
                e.kind == self.kind
                    && self.target_ids.contains(&e.target_id)
                    && self.statuses.contains(&e.status)
            }) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Rules for the non-empty lists of a targeting, cheapest first
///
/// Returns no rules for `show_to_all`; the evaluator handles that case.
pub fn rules_for(targeting: &CampaignTargeting) -> Vec<Box<dyn TargetingRule>> {
    let mut rules: Vec<Box<dyn TargetingRule>> = Vec::new();
    if targeting.show_to_all {
        return rules;
    }
    if !targeting.allowed_domains.is_empty() {
        rules.push(Box::new(DomainRule::new(&targeting.allowed_domains)));
    }
    if !targeting.customer_ids.is_empty() {
        rules.push(Box::new(CustomerRule::new(targeting.customer_ids.clone())));
    }
    if !targeting.lead_ids.is_empty() {
        rules.push(Box::new(LeadRule::new(targeting.lead_ids.clone())));
    }
    if !targeting.course_ids.is_empty() {
        rules.push(Box::new(EnrollmentRule::courses(targeting.course_ids.clone())));
    }
    if !targeting.workshop_ids.is_empty() {
        rules.push(Box::new(EnrollmentRule::workshops(targeting.workshop_ids.clone())));
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::campaign::{VisitorEnrollment, VisitorKey};
    use crate::infrastructure::memory::InMemoryStore;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_domain_rule_case_insensitive() {
        let store = InMemoryStore::new();
        let rule = DomainRule::new(&set(&["School.example"]));
        let visitor = Visitor::anonymous().on_domain("school.EXAMPLE.");
        assert!(rule.matches(&visitor, &store).await.unwrap());
        assert!(!rule.matches(&Visitor::anonymous(), &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_course_rule_status_allow_list() {
        let store = InMemoryStore::new();
        let key = VisitorKey::Lead("l1".into());
        store.insert_visitor_enrollment(
            key.clone(),
            VisitorEnrollment {
                target_id: "math".into(),
                kind: EnrollmentKind::Course,
                status: EnrollmentStatus::Cancelled,
            },
        );
        let rule = EnrollmentRule::courses(set(&["math"]));
        let visitor = Visitor::lead("l1");
        assert!(!rule.matches(&visitor, &store).await.unwrap());

        store.insert_visitor_enrollment(
            key,
            VisitorEnrollment {
                target_id: "math".into(),
                kind: EnrollmentKind::Course,
                status: EnrollmentStatus::Pending,
            },
        );
        assert!(rule.matches(&visitor, &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_workshop_rule_ignores_course_enrollments() {
        let store = InMemoryStore::new();
        store.insert_visitor_enrollment(
            VisitorKey::Customer("c1".into()),
            VisitorEnrollment {
                target_id: "w1".into(),
                kind: EnrollmentKind::Course,
                status: EnrollmentStatus::Enrolled,
            },
        );
        let rule = EnrollmentRule::workshops(set(&["w1"]));
        assert!(!rule.matches(&Visitor::customer("c1"), &store).await.unwrap());

        store.insert_visitor_enrollment(
            VisitorKey::Customer("c1".into()),
            VisitorEnrollment {
                target_id: "w1".into(),
                kind: EnrollmentKind::Workshop,
                status: EnrollmentStatus::Attended,
            },
        );
        assert!(rule.matches(&Visitor::customer("c1"), &store).await.unwrap());
    }

    #[test]
    fn test_rules_for_skips_empty_lists() {
        assert!(rules_for(&CampaignTargeting::default()).is_empty());
        assert!(rules_for(&CampaignTargeting::everyone()).is_empty());

        let targeting = CampaignTargeting {
            lead_ids: set(&["l1"]),
            allowed_domains: set(&["a.example"]),
            ..Default::default()
        };
        let names: Vec<&str> = rules_for(&targeting).iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["domain", "lead"]);
    }
}
