use serde::{Deserialize, Serialize};

/// Status of a single charge attempt recorded in `billing_transactions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum TransactionStatus {
    #[default]
    Waiting,
    Paid,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Waiting => "waiting",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Convert from a gateway charge status string
    pub fn from_gateway_charge_status(s: &str) -> Self {
        match s {
            "paid" | "settled" => TransactionStatus::Paid,
            "unpaid" | "refunded" | "canceled" | "contested" => TransactionStatus::Failed,
            _ => TransactionStatus::Waiting,
        }
    }

    /// Terminal states are not overwritten by later `waiting` upserts
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Paid | TransactionStatus::Failed)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
