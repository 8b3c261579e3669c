//! Campaign eligibility

use tracing::debug;

use crate::error::Result;

use super::entity::{CampaignTargeting, Visitor};
use super::repository::EnrollmentLookup;
use super::rules::rules_for;

/// Whether `visitor` should see a popup with this targeting
///
/// Evaluated fresh on every call; nothing is cached between requests.
pub async fn is_eligible(
    targeting: &CampaignTargeting,
    visitor: &Visitor,
    enrollments: &dyn EnrollmentLookup,
) -> Result<bool> {
    if targeting.show_to_all {
        return Ok(true);
    }

    for rule in rules_for(targeting) {
        if rule.matches(visitor, enrollments).await? {
            debug!(rule = rule.name(), "Visitor matched targeting rule");
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::domain::campaign::{EnrollmentKind, VisitorEnrollment, VisitorKey};
    use crate::domain::student::EnrollmentStatus;

    /// Lookup that records how often it was asked
    #[derive(Default)]
    struct CountingLookup {
        calls: AtomicUsize,
        enrollments: Vec<VisitorEnrollment>,
    }

    #[async_trait]
    impl EnrollmentLookup for CountingLookup {
        async fn enrollments_for(&self, _key: &VisitorKey) -> Result<Vec<VisitorEnrollment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.enrollments.clone())
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn visitors() -> Vec<Visitor> {
        vec![
            Visitor::anonymous(),
            Visitor::customer("c1"),
            Visitor::lead("l1").on_domain("school.example"),
        ]
    }

    #[tokio::test]
    async fn test_show_to_all_matches_everyone() {
        let lookup = CountingLookup::default();
        let targeting = CampaignTargeting {
            customer_ids: set(&["someone-else"]),
            ..CampaignTargeting::everyone()
        };
        for visitor in visitors() {
            assert!(is_eligible(&targeting, &visitor, &lookup).await.unwrap());
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_targeting_matches_nobody() {
        let lookup = CountingLookup::default();
        for visitor in visitors() {
            assert!(
                !is_eligible(&CampaignTargeting::default(), &visitor, &lookup)
                    .await
                    .unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_domain_only_targeting() {
        let lookup = CountingLookup::default();
        let targeting = CampaignTargeting {
            allowed_domains: set(&["school.example"]),
            ..Default::default()
        };

        let on_domain = Visitor::anonymous().on_domain("School.Example");
        let elsewhere = Visitor::customer("c1").on_domain("other.example");
        assert!(is_eligible(&targeting, &on_domain, &lookup).await.unwrap());
        assert!(!is_eligible(&targeting, &elsewhere, &lookup).await.unwrap());
    }

    #[tokio::test]
    async fn test_short_circuits_before_enrollment_lookup() {
        let lookup = CountingLookup::default();
        let targeting = CampaignTargeting {
            customer_ids: set(&["c1"]),
            course_ids: set(&["math"]),
            ..Default::default()
        };
        assert!(is_eligible(&targeting, &Visitor::customer("c1"), &lookup).await.unwrap());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_course_enrollment_match() {
        let lookup = CountingLookup {
            calls: AtomicUsize::new(0),
            enrollments: vec![VisitorEnrollment {
                target_id: "math".into(),
                kind: EnrollmentKind::Course,
                status: EnrollmentStatus::Approved,
            }],
        };
        let targeting = CampaignTargeting {
            course_ids: set(&["math"]),
            ..Default::default()
        };
        assert!(is_eligible(&targeting, &Visitor::lead("l9"), &lookup).await.unwrap());
        assert!(!is_eligible(&targeting, &Visitor::anonymous(), &lookup).await.unwrap());
    }
}
