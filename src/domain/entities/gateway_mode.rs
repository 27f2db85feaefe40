use serde::{Deserialize, Serialize};

/// Gateway environment - sandbox (homologation) or production
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum GatewayMode {
    #[default]
    Sandbox,
    Production,
}

impl GatewayMode {
    pub fn from_sandbox_flag(sandbox: bool) -> Self {
        if sandbox {
            GatewayMode::Sandbox
        } else {
            GatewayMode::Production
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayMode::Sandbox => "sandbox",
            GatewayMode::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, GatewayMode::Production)
    }

    pub fn is_sandbox(&self) -> bool {
        matches!(self, GatewayMode::Sandbox)
    }
}

impl std::fmt::Display for GatewayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
