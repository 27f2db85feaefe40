use serde::{Deserialize, Serialize};

/// Local lifecycle of a tenant subscription.
///
/// `Waiting` is the state right after the gateway subscription is created,
/// before a payment method is bound. `Canceled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Waiting,
    PendingPayment,
    Active,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Waiting => "waiting",
            SubscriptionStatus::PendingPayment => "pending_payment",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    /// Map a gateway subscription status string onto the local lifecycle.
    ///
    /// Unknown values never grant access: they land on `PendingPayment`.
    pub fn from_gateway(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "active" => SubscriptionStatus::Active,
            "canceled" | "cancelled" | "expired" => SubscriptionStatus::Canceled,
            "new" | "new_charge" | "waiting" => SubscriptionStatus::Waiting,
            _ => SubscriptionStatus::PendingPayment,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubscriptionStatus::Canceled)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "waiting" => Ok(SubscriptionStatus::Waiting),
            "pending_payment" => Ok(SubscriptionStatus::PendingPayment),
            "active" => Ok(SubscriptionStatus::Active),
            "canceled" | "cancelled" => Ok(SubscriptionStatus::Canceled),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_gateway() {
        assert_eq!(
            SubscriptionStatus::from_gateway("active"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_gateway("canceled"),
            SubscriptionStatus::Canceled
        );
        assert_eq!(
            SubscriptionStatus::from_gateway("expired"),
            SubscriptionStatus::Canceled
        );
        assert_eq!(
            SubscriptionStatus::from_gateway("new"),
            SubscriptionStatus::Waiting
        );
        assert_eq!(
            SubscriptionStatus::from_gateway("new_charge"),
            SubscriptionStatus::Waiting
        );
        // Unknown statuses never grant access
        assert_eq!(
            SubscriptionStatus::from_gateway("something_else"),
            SubscriptionStatus::PendingPayment
        );
    }

    #[test]
    fn test_terminal_and_active() {
        assert!(SubscriptionStatus::Canceled.is_terminal());
        assert!(!SubscriptionStatus::Active.is_terminal());
        assert!(SubscriptionStatus::Active.is_active());
        assert!(!SubscriptionStatus::PendingPayment.is_active());
    }

    #[test]
    fn test_from_str_round_trips_as_str() {
        for status in [
            SubscriptionStatus::Waiting,
            SubscriptionStatus::PendingPayment,
            SubscriptionStatus::Active,
            SubscriptionStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>().unwrap(), status);
        }
        assert!("trialing".parse::<SubscriptionStatus>().is_err());
    }
}
