use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Audit Records - Append-Only
// ============================================================================

/// One pickup-verification attempt. Written for every scan, successful or
/// not, and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrScanRecord {
    pub id: Uuid,
    pub courier_id: Uuid,
    pub order_id: Uuid,
    /// Store the code resolved to, when it resolved at all.
    pub store_id: Option<Uuid>,
    pub scanned_code: String,
    pub success: bool,
    pub error: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

impl QrScanRecord {
    pub fn success(
        courier_id: Uuid,
        order_id: Uuid,
        store_id: Uuid,
        scanned_code: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            courier_id,
            order_id,
            store_id: Some(store_id),
            scanned_code,
            success: true,
            error: None,
            scanned_at: now,
        }
    }

    pub fn failure(
        courier_id: Uuid,
        order_id: Uuid,
        store_id: Option<Uuid>,
        scanned_code: String,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            courier_id,
            order_id,
            store_id,
            scanned_code,
            success: false,
            error: Some(error.into()),
            scanned_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReporterRole {
    Customer,
    Courier,
}

/// Free-text problem report raised while an order is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueReport {
    pub id: Uuid,
    pub order_id: Uuid,
    pub reporter_id: Uuid,
    pub reporter_role: ReporterRole,
    pub message: String,
    pub reported_at: DateTime<Utc>,
}

/// Post-delivery customer rating; set exactly once per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub stars: u8,
    pub comment: Option<String>,
    pub rated_at: DateTime<Utc>,
}
