//! Campaign, targeting and visitor types

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::student::EnrollmentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Ended,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who a campaign popup is shown to
///
/// `show_to_all` overrides everything else. Otherwise a visitor qualifies
/// when any non-empty list matches; an empty targeting matches nobody.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignTargeting {
    pub customer_ids: BTreeSet<String>,
    pub lead_ids: BTreeSet<String>,
    pub course_ids: BTreeSet<String>,
    pub workshop_ids: BTreeSet<String>,
    pub allowed_domains: BTreeSet<String>,
    pub show_to_all: bool,
}

impl CampaignTargeting {
    pub fn everyone() -> Self {
        Self {
            show_to_all: true,
            ..Default::default()
        }
    }

    /// True when no rule could ever match
    pub fn is_empty(&self) -> bool {
        !self.show_to_all
            && self.customer_ids.is_empty()
            && self.lead_ids.is_empty()
            && self.course_ids.is_empty()
            && self.workshop_ids.is_empty()
            && self.allowed_domains.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupStyle {
    pub theme: String,
    pub position: String,
    pub delay_secs: u32,
}

impl Default for PopupStyle {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            position: "bottom-right".to_string(),
            delay_secs: 3,
        }
    }
}

/// Popup content, passed through to the embedding site untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupPayload {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub cta_label: Option<String>,
    #[serde(default)]
    pub cta_url: Option<String>,
    #[serde(default)]
    pub style: PopupStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: CampaignStatus,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub targeting: CampaignTargeting,
    pub popup: PopupPayload,
}

impl Campaign {
    /// Why the campaign is not live at `now`, or `None` when it is
    pub fn inactive_reason(&self, now: DateTime<Utc>) -> Option<PopupReason> {
        if self.status != CampaignStatus::Active {
            return Some(PopupReason::NotActive);
        }
        if self.starts_at.is_some_and(|start| now < start) {
            return Some(PopupReason::NotStarted);
        }
        if self.ends_at.is_some_and(|end| now >= end) {
            return Some(PopupReason::Ended);
        }
        None
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.inactive_reason(now).is_none()
    }
}

/// Why a popup was or was not shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupReason {
    Shown,
    NotActive,
    NotStarted,
    Ended,
    NotTargeted,
}

/// Identity of an anonymous or known site visitor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visitor {
    pub customer_id: Option<String>,
    pub lead_id: Option<String>,
    /// Host the popup is embedded on
    pub domain: Option<String>,
}

impl Visitor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn customer(id: impl Into<String>) -> Self {
        Self {
            customer_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn lead(id: impl Into<String>) -> Self {
        Self {
            lead_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn on_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Keys usable for enrollment lookups, customer first
    pub fn keys(&self) -> Vec<VisitorKey> {
        let customer = self
            .customer_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| VisitorKey::Customer(id.to_string()));
        let lead = self
            .lead_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| VisitorKey::Lead(id.to_string()));
        customer.into_iter().chain(lead).collect()
    }
}

/// Key for looking up a visitor's enrollments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum VisitorKey {
    Customer(String),
    Lead(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentKind {
    Course,
    Workshop,
}

/// A course or workshop enrollment of a visitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorEnrollment {
    pub target_id: String,
    pub kind: EnrollmentKind,
    pub status: EnrollmentStatus,
}
