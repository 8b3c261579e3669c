//! Popup resolution for embedded campaign widgets

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

use super::entity::{PopupPayload, PopupReason, Visitor};
use super::evaluator::is_eligible;
use super::repository::{CampaignStore, EnrollmentLookup};

/// Whether to show a campaign popup, and what to show
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupDecision {
    pub campaign_id: String,
    pub show: bool,
    pub reason: PopupReason,
    /// Present only when `show` is true
    pub popup: Option<PopupPayload>,
}

pub struct PopupService {
    campaigns: Arc<dyn CampaignStore>,
    enrollments: Arc<dyn EnrollmentLookup>,
}

impl PopupService {
    pub fn new(campaigns: Arc<dyn CampaignStore>, enrollments: Arc<dyn EnrollmentLookup>) -> Self {
        Self {
            campaigns,
            enrollments,
        }
    }

    pub async fn resolve(
        &self,
        campaign_id: &str,
        visitor: &Visitor,
        now: DateTime<Utc>,
    ) -> Result<PopupDecision> {
        let campaign = self
            .campaigns
            .find_campaign(campaign_id)
            .await?
            .ok_or_else(|| Error::CampaignNotFound(campaign_id.to_string()))?;

        let reason = match campaign.inactive_reason(now) {
            Some(reason) => reason,
            None => {
                if is_eligible(&campaign.targeting, visitor, self.enrollments.as_ref()).await? {
                    PopupReason::Shown
                } else {
                    PopupReason::NotTargeted
                }
            }
        };
        let show = reason == PopupReason::Shown;

        debug!(campaign_id, show, ?reason, "Popup resolved");

        Ok(PopupDecision {
            campaign_id: campaign.id,
            show,
            reason,
            popup: show.then_some(campaign.popup),
        })
    }
}
