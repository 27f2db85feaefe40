//! HMAC-SHA256 signatures on inbound gateway notifications.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac of "t.body">`. Several
//! `v1` entries may be present during secret rotation.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::app_error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// Maximum age (either direction) of a signed timestamp.
pub const SIGNATURE_TOLERANCE_SECS: u64 = 300;

fn compute_signature(secret: &str, timestamp: &str, body: &str) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC error".into()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Produce a header value for `body`. Used by tests and local tooling.
pub fn sign_payload(secret: &str, timestamp: i64, body: &str) -> AppResult<String> {
    let signature = compute_signature(secret, &timestamp.to_string(), body)?;
    Ok(format!("t={},v1={}", timestamp, signature))
}

pub fn verify_signature(body: &str, header: &str, secret: &str) -> AppResult<()> {
    verify_signature_at(body, header, secret, chrono::Utc::now().timestamp())
}

pub(crate) fn verify_signature_at(
    body: &str,
    header: &str,
    secret: &str,
    now: i64,
) -> AppResult<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(AppError::InvalidCredentials)?;
    if signatures.is_empty() {
        return Err(AppError::InvalidCredentials);
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| AppError::InvalidCredentials)?;
    if now.abs_diff(ts) > SIGNATURE_TOLERANCE_SECS {
        return Err(AppError::InvalidCredentials);
    }

    let expected = compute_signature(secret, timestamp, body)?;
    if signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected))
    {
        Ok(())
    } else {
        Err(AppError::InvalidCredentials)
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
