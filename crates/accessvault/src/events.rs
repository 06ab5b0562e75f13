//! Inbound events from the purchase, refund and subscription collaborators.
//!
//! Events arrive as JSON with a `type` tag and are dispatched by
//! [`AccessController::handle_event`]. Fields are raw strings; validation
//! happens in the controller like for any other call.

use std::fmt;

use accessvault_store::GrantStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::controller::AccessController;
use crate::error::Result;

/// A purchase was confirmed: create or replace the grant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseConfirmed {
    pub content_id: String,
    pub user_id: String,
    pub content_locator: String,
    #[serde(default)]
    pub content_type: String,
    pub purchase_ref: String,
    pub duration_secs: u64,
}

impl fmt::Debug for PurchaseConfirmed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PurchaseConfirmed")
            .field("content_id", &self.content_id)
            .field("user_id", &self.user_id)
            .field("content_locator", &"[redacted]")
            .field("content_type", &self.content_type)
            .field("purchase_ref", &self.purchase_ref)
            .field("duration_secs", &self.duration_secs)
            .finish()
    }
}

/// A refund was issued: revoke the grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundIssued {
    pub content_id: String,
    pub user_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A subscription was renewed: extend the grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRenewed {
    pub content_id: String,
    pub user_id: String,
    pub extra_secs: u64,
}

/// Any inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessEvent {
    PurchaseConfirmed(PurchaseConfirmed),
    RefundIssued(RefundIssued),
    SubscriptionRenewed(SubscriptionRenewed),
}

impl AccessEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            AccessEvent::PurchaseConfirmed(_) => "purchase_confirmed",
            AccessEvent::RefundIssued(_) => "refund_issued",
            AccessEvent::SubscriptionRenewed(_) => "subscription_renewed",
        }
    }
}

impl From<PurchaseConfirmed> for AccessEvent {
    fn from(event: PurchaseConfirmed) -> Self {
        AccessEvent::PurchaseConfirmed(event)
    }
}

impl From<RefundIssued> for AccessEvent {
    fn from(event: RefundIssued) -> Self {
        AccessEvent::RefundIssued(event)
    }
}

impl From<SubscriptionRenewed> for AccessEvent {
    fn from(event: SubscriptionRenewed) -> Self {
        AccessEvent::SubscriptionRenewed(event)
    }
}

impl<S: GrantStore> AccessController<S> {
    /// Apply an inbound event.
    ///
    /// A refund for a grant that is already revoked succeeds. Errors are
    /// those of the operation the event maps to.
    pub async fn handle_event(&self, event: AccessEvent) -> Result<()> {
        debug!(event = event.name(), "handling access event");
        match event {
            AccessEvent::PurchaseConfirmed(purchase) => {
                self.grant_access(&purchase).await?;
            }
            AccessEvent::RefundIssued(refund) => {
                self.revoke_access(&refund.user_id, &refund.content_id, refund.reason.as_deref())
                    .await?;
            }
            AccessEvent::SubscriptionRenewed(renewal) => {
                self.extend_access(&renewal.user_id, &renewal.content_id, renewal.extra_secs)
                    .await?;
            }
        }
        Ok(())
    }
}
