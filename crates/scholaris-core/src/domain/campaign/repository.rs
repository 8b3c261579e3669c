//! Collaborator traits for campaign targeting

use async_trait::async_trait;

use crate::error::Result;

use super::entity::{Campaign, CampaignTargeting, VisitorEnrollment, VisitorKey};

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn find_campaign(&self, id: &str) -> Result<Option<Campaign>>;

    /// Targeting rules of a campaign, `None` for an unknown campaign
    async fn find_targeting_rules(&self, campaign_id: &str) -> Result<Option<CampaignTargeting>>;
}

#[async_trait]
pub trait EnrollmentLookup: Send + Sync {
    /// Course and workshop enrollments of a customer or lead
    async fn enrollments_for(&self, key: &VisitorKey) -> Result<Vec<VisitorEnrollment>>;
}
