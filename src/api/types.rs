use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Backend identifier of a member
pub type MemberId = i64;

/// Member record as returned by `GET /api/member/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub member_number: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub id_number: String,
    pub date_of_birth: String,
    pub gender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub join_date: String,
    pub status: MemberStatus,
}

impl Member {
    /// First and last name joined for display
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Membership standing of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    New,
    Active,
    Former,
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MemberStatus::New => "new",
            MemberStatus::Active => "active",
            MemberStatus::Former => "former",
        };
        f.write_str(label)
    }
}

/// Partial member update sent with `PATCH /api/member/me`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Credentials accepted by the login endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCredentials {
    pub id_number: String,
    pub phone: String,
}

/// Response of `POST /api/member/login`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default)]
    pub member_id: Option<MemberId>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Days,
    Months,
    Years,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPlan {
    pub id: i64,
    pub name: String,
    pub duration: u32,
    pub duration_unit: DurationUnit,
    pub price: String,
    pub tax_percentage: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: i64,
    pub member_id: MemberId,
    pub plan_id: i64,
    pub start_date: String,
    pub end_date: String,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,
}

impl Subscription {
    /// Days left until `end_date`, counted from `today`. Negative once expired.
    ///
    /// Returns `None` when the backend date cannot be parsed. Both plain
    /// dates and RFC 3339 timestamps are accepted.
    pub fn days_remaining(&self, today: NaiveDate) -> Option<i64> {
        let date_part = self.end_date.get(..10)?;
        let end = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
        Some(end.signed_duration_since(today).num_days())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub member_id: MemberId,
    #[serde(default)]
    pub subscription_id: Option<i64>,
    #[serde(default)]
    pub invoice_id: Option<i64>,
    pub amount: String,
    pub payment_date: String,
    pub payment_method: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: i64,
    pub invoice_number: String,
    pub member_id: MemberId,
    #[serde(default)]
    pub subscription_id: Option<i64>,
    pub amount: String,
    pub status: InvoiceStatus,
    pub issue_date: String,
    pub due_date: String,
    #[serde(default)]
    pub paid_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    pub id: i64,
    pub member_id: MemberId,
    pub check_in_time: String,
    #[serde(default)]
    pub check_out_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub discount_percentage: Option<f64>,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub is_active: bool,
}

/// Errors reported by the remote API client
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Session is not authorized")]
    Unauthorized,
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Request rejected: {0}")]
    Validation(String),
    #[error("Unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    /// True when the server rejected the ambient session credential
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_builder() {
            ApiError::InvalidConfig(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}
