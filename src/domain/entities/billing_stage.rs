use serde::{Deserialize, Serialize};

/// Pipeline stage of a provisioning or plan-switch request.
///
/// Returned with every billing response so the caller can tell a declined
/// card (`payment`) from a plan setup failure (`plan`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingStage {
    Validation,
    Config,
    Plan,
    Subscription,
    Payment,
    Cancel,
    Persist,
    Done,
}

impl BillingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStage::Validation => "validation",
            BillingStage::Config => "config",
            BillingStage::Plan => "plan",
            BillingStage::Subscription => "subscription",
            BillingStage::Payment => "payment",
            BillingStage::Cancel => "cancel",
            BillingStage::Persist => "persist",
            BillingStage::Done => "done",
        }
    }

    /// Operator-facing hint shown next to a failure at this stage
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            BillingStage::Validation => Some("Check the request body for missing fields."),
            BillingStage::Config => {
                Some("Gateway credentials or certificate are not configured on the server.")
            }
            BillingStage::Plan => Some("The plan could not be created on the payment gateway."),
            BillingStage::Subscription => {
                Some("The gateway rejected the subscription for this plan.")
            }
            BillingStage::Payment => {
                Some("The card was not accepted. Verify the card data or try another card.")
            }
            BillingStage::Cancel => Some("The previous subscription could not be canceled."),
            BillingStage::Persist | BillingStage::Done => None,
        }
    }
}

impl std::fmt::Display for BillingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
