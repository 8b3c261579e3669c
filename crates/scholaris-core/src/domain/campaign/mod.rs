//! Marketing campaign targeting
//!
//! Decides which site visitors see a campaign popup. Targeting is a set of
//! composable rules combined with OR; `show_to_all` bypasses them.

mod entity;
mod evaluator;
mod popup;
mod repository;
mod rules;

pub use entity::{
    Campaign, CampaignStatus, CampaignTargeting, EnrollmentKind, PopupPayload, PopupReason,
    PopupStyle, Visitor, VisitorEnrollment, VisitorKey,
};
pub use evaluator::is_eligible;
pub use popup::{PopupDecision, PopupService};
pub use repository::{CampaignStore, EnrollmentLookup};
pub use rules::{
    COURSE_ENROLLMENT_STATUSES, CustomerRule, DomainRule, EnrollmentRule, LeadRule,
    TargetingRule, WORKSHOP_ENROLLMENT_STATUSES, rules_for,
};
