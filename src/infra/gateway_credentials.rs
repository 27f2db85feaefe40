//! Resolution of gateway credentials and the mTLS client certificate.
//!
//! Everything here runs before the first network call: a missing or
//! malformed setting is reported as `AppError::Config` naming the variable.

use std::io::Write;
use std::path::PathBuf;

use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::gateway_mode::GatewayMode,
    infra::config::GatewaySettings,
};

/// Credentials ready to build an authenticated gateway client.
pub struct GatewayCredentials {
    pub mode: GatewayMode,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Certificate chain and private key, PEM encoded
    pub identity_pem: Vec<u8>,
    /// Backing file for a certificate supplied inline; removed on drop.
    _materialized_cert: Option<NamedTempFile>,
}

impl std::fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("mode", &self.mode)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("identity_pem_len", &self.identity_pem.len())
            .finish()
    }
}

fn missing(var: &str) -> AppError {
    AppError::Config(format!("{} is not set", var))
}

/// Strip surrounding whitespace; blank becomes `None`.
fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Where the certificate came from
enum CertSource {
    Path(PathBuf),
    Inline(NamedTempFile),
}

fn materialize_base64_cert(blob: &str) -> AppResult<NamedTempFile> {
    // Base64 blobs pasted into env files often carry line breaks.
    let compact: String = blob.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|_| AppError::Config("GATEWAY_CERT_BASE64 is not valid base64".into()))?;

    let mut file = tempfile::Builder::new()
        .prefix("gateway-cert-")
        .suffix(".pem")
        .tempfile()
        .map_err(|e| AppError::Config(format!("Cannot create certificate file: {}", e)))?;
    file.write_all(&decoded)
        .and_then(|_| file.flush())
        .map_err(|e| AppError::Config(format!("Cannot write certificate file: {}", e)))?;

    debug!(path = %file.path().display(), "Materialized inline gateway certificate");
    Ok(file)
}

fn cert_source(settings: &GatewaySettings) -> AppResult<CertSource> {
    if let Some(path) = normalized(settings.cert_path.as_deref()) {
        return Ok(CertSource::Path(PathBuf::from(path)));
    }
    let inline = settings
        .cert_base64
        .as_ref()
        .and_then(|s| normalized(Some(s.expose_secret())));
    match inline {
        Some(blob) => Ok(CertSource::Inline(materialize_base64_cert(&blob)?)),
        None => Err(AppError::Config(
            "GATEWAY_CERT_PATH or GATEWAY_CERT_BASE64 must be set".into(),
        )),
    }
}

fn is_encrypted_pem(pem: &str) -> bool {
    pem.contains("ENCRYPTED PRIVATE KEY") || pem.contains("Proc-Type: 4,ENCRYPTED")
}

/// Check the PEM can be loaded without a passphrase.
fn check_pem(pem: &[u8], passphrase: Option<&str>) -> AppResult<()> {
    let text = std::str::from_utf8(pem)
        .map_err(|_| AppError::Config("Gateway certificate is not a PEM file".into()))?;

    if !text.contains("-----BEGIN CERTIFICATE-----") {
        return Err(AppError::Config(
            "Gateway certificate has no CERTIFICATE block".into(),
        ));
    }
    if !text.contains("PRIVATE KEY-----") {
        return Err(AppError::Config(
            "Gateway certificate has no private key".into(),
        ));
    }

    match (is_encrypted_pem(text), passphrase) {
        (true, Some(_)) => Err(AppError::Config(
            "GATEWAY_CERT_PASSPHRASE: encrypted private keys are not supported, provide a decrypted PEM"
                .into(),
        )),
        (true, None) => Err(AppError::Config(
            "Gateway certificate private key is encrypted and GATEWAY_CERT_PASSPHRASE is not set"
                .into(),
        )),
        (false, Some(_)) => {
            warn!("GATEWAY_CERT_PASSPHRASE is set but the private key is not encrypted; ignoring it");
            Ok(())
        }
        (false, None) => Ok(()),
    }
}

/// Resolve and validate credentials for the real gateway.
pub fn resolve_credentials(settings: &GatewaySettings) -> AppResult<GatewayCredentials> {
    let client_id =
        normalized(settings.client_id.as_deref()).ok_or_else(|| missing("GATEWAY_CLIENT_ID"))?;
    let client_secret = settings
        .client_secret
        .as_ref()
        .and_then(|s| normalized(Some(s.expose_secret())))
        .ok_or_else(|| missing("GATEWAY_CLIENT_SECRET"))?;

    let (identity_pem, materialized) = match cert_source(settings)? {
        CertSource::Path(path) => {
            let bytes = std::fs::read(&path).map_err(|e| {
                AppError::Config(format!(
                    "GATEWAY_CERT_PATH {} cannot be read: {}",
                    path.display(),
                    e
                ))
            })?;
            (bytes, None)
        }
        CertSource::Inline(file) => {
            let bytes = std::fs::read(file.path()).map_err(|e| {
                AppError::Config(format!("Cannot read materialized certificate: {}", e))
            })?;
            (bytes, Some(file))
        }
    };

    let passphrase = settings
        .cert_passphrase
        .as_ref()
        .and_then(|s| normalized(Some(s.expose_secret())));
    check_pem(&identity_pem, passphrase.as_deref())?;

    Ok(GatewayCredentials {
        mode: settings.mode,
        client_id,
        client_secret: SecretString::new(client_secret.into()),
        identity_pem,
        _materialized_cert: materialized,
    })
}
