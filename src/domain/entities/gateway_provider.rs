use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::gateway_mode::GatewayMode;

/// Payment gateway implementation backing the billing flow
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum GatewayProvider {
    #[default]
    Efi,
    Dummy,
}

impl GatewayProvider {
    pub fn display_name(&self) -> &'static str {
        match self {
            GatewayProvider::Efi => "Efí",
            GatewayProvider::Dummy => "Test Gateway",
        }
    }

    /// Whether this provider needs client credentials and a certificate
    pub fn requires_credentials(&self) -> bool {
        matches!(self, GatewayProvider::Efi)
    }

    pub fn supports_mode(&self, mode: GatewayMode) -> bool {
        match self {
            GatewayProvider::Efi => true,
            // The in-process gateway never moves real money
            GatewayProvider::Dummy => mode == GatewayMode::Sandbox,
        }
    }
}
