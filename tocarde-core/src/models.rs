use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a carpool or hosting request in its lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    /// A live request counts against uniqueness and, once accepted,
    /// against capacity.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "REJECTED" => Ok(Self::Rejected),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

/// Action an actor can submit against a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestAction {
    Accept,
    Reject,
    Cancel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Mobile,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Transfer => "TRANSFER",
            Self::Mobile => "MOBILE",
            Self::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(Self::Cash),
            "TRANSFER" => Ok(Self::Transfer),
            "MOBILE" => Ok(Self::Mobile),
            "OTHER" => Ok(Self::Other),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}

/// A user's answer when subscribing to an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionAnswer {
    Yes,
    No,
    Maybe,
}

impl SubscriptionAnswer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
            Self::Maybe => "MAYBE",
        }
    }
}

impl std::str::FromStr for SubscriptionAnswer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "YES" => Ok(Self::Yes),
            "NO" => Ok(Self::No),
            "MAYBE" => Ok(Self::Maybe),
            other => Err(format!("unknown subscription answer: {}", other)),
        }
    }
}

/// An event members can attend, host for, or carpool to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub url_signup: Option<String>,
    pub url_website: Option<String>,
    pub prices: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's attendance answer for an event. Unique per (event, user);
/// re-subscribing updates the existing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSubscription {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub answer: SubscriptionAnswer,
    pub can_invite: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A carpool trip offered by a driver. Capacity is `seats_total`; the
/// remaining seat count is derived from accepted requests, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarpoolTrip {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub event_id: Option<Uuid>,
    pub departure_city: String,
    pub departure_address: Option<String>,
    pub arrival_city: String,
    pub arrival_address: Option<String>,
    pub departure_datetime: DateTime<Utc>,
    pub return_datetime: Option<DateTime<Utc>>,
    pub has_return: bool,
    pub seats_total: i32,
    pub price_per_seat_cents: i64,
    pub additional_info: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A passenger's claim on seats in a trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarpoolRequest {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub passenger_id: Uuid,
    pub status: RequestStatus,
    pub seats_requested: i32,
    pub message: Option<String>,
    pub response_message: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CarpoolRequest {
    pub fn new(trip_id: Uuid, passenger_id: Uuid, seats_requested: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trip_id,
            passenger_id,
            status: RequestStatus::Pending,
            seats_requested,
            message: None,
            response_message: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A payment recorded by the driver against an accepted request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarpoolPayment {
    pub id: Uuid,
    pub request_id: Uuid,
    pub amount_cents: i64,
    pub is_completed: bool,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CarpoolPayment {
    pub fn new(request_id: Uuid, amount_cents: i64, payment_method: PaymentMethod) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            request_id,
            amount_cents,
            is_completed: false,
            payment_method,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Beds offered by a host for an event. Unique per (event, host).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHosting {
    pub id: Uuid,
    pub event_id: Uuid,
    pub host_id: Uuid,
    pub available_beds: i32,
    pub custom_rules: Option<String>,
    pub address_override: Option<String>,
    pub city_override: Option<String>,
    pub zip_code_override: Option<String>,
    pub country_override: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A requester's claim on one bed in a hosting. Uniqueness is scoped to
/// the event, not the individual hosting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHostingRequest {
    pub id: Uuid,
    pub hosting_id: Uuid,
    pub requester_id: Uuid,
    pub status: RequestStatus,
    pub message: Option<String>,
    pub host_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventHostingRequest {
    pub fn new(hosting_id: Uuid, requester_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            hosting_id,
            requester_id,
            status: RequestStatus::Pending,
            message: None,
            host_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A yearly subscription fee period paid by a user. Active periods for
/// the same user may not overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(user_id: Uuid, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            start_date,
            end_date,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trip() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Rejected,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(RequestStatus::from_str(status.as_str()), Ok(status));
        }
        assert!(RequestStatus::from_str("OPEN").is_err());
    }

    #[test]
    fn test_live_and_terminal() {
        assert!(RequestStatus::Pending.is_live());
        assert!(RequestStatus::Accepted.is_live());
        assert!(!RequestStatus::Rejected.is_live());
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_action_wire_format() {
        let action: RequestAction = serde_json::from_str("\"accept\"").unwrap();
        assert_eq!(action, RequestAction::Accept);
        assert!(serde_json::from_str::<RequestAction>("\"ACCEPT\"").is_err());
    }
}
