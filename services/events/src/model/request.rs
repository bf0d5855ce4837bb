use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// PENDING moves to APPROVED or REJECTED exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn status(&self) -> RequestStatus {
        match self {
            Decision::Approve => RequestStatus::Approved,
            Decision::Reject => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRequest {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub campaign_id: Uuid,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RewardRequest {
    pub fn new(principal_id: Uuid, campaign_id: Uuid, status: RequestStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            principal_id,
            campaign_id,
            status,
            requested_at: now,
            processed_at: status.is_terminal().then_some(now),
            operator_id: None,
            reason: None,
            deleted_at: None,
        }
    }
}

/// Listing filter; `None` fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestFilter {
    pub principal_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    pub fn matches(&self, request: &RewardRequest) -> bool {
        request.deleted_at.is_none()
            && self.principal_id.is_none_or(|id| id == request.principal_id)
            && self.campaign_id.is_none_or(|id| id == request.campaign_id)
            && self.status.is_none_or(|status| status == request.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_approved_requests_are_stamped() {
        let approved = RewardRequest::new(Uuid::new_v4(), Uuid::new_v4(), RequestStatus::Approved);
        assert!(approved.processed_at.is_some());
        let pending = RewardRequest::new(Uuid::new_v4(), Uuid::new_v4(), RequestStatus::Pending);
        assert!(pending.processed_at.is_none());
    }

    #[test]
    fn filter_skips_deleted_and_mismatched() {
        let principal = Uuid::new_v4();
        let mut request = RewardRequest::new(principal, Uuid::new_v4(), RequestStatus::Pending);
        let by_owner = RequestFilter {
            principal_id: Some(principal),
            ..RequestFilter::default()
        };
        assert!(by_owner.matches(&request));
        let approved_only = RequestFilter {
            status: Some(RequestStatus::Approved),
            ..RequestFilter::default()
        };
        assert!(!approved_only.matches(&request));
        request.deleted_at = Some(Utc::now());
        assert!(!by_owner.matches(&request));
    }
}
