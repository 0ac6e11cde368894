//! Audit trail for catalog writes.
//!
//! Events go to the `audit` tracing target as one JSON line each, so the log
//! backend can route them apart from request logs.
//!
//! ```ignore
//! AuditEvent::new(
//!     Some(user.id.to_string()),
//!     "product.create",
//!     Some(format!("product:{}", product.id)),
//!     AuditOutcome::Success,
//! )
//! .with_ip(extract_ip_from_headers(&headers))
//! .with_user_agent(extract_user_agent(&headers))
//! .with_details(json!({"sku": product.sku, "images": 3}))
//! .log();
//! ```

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    /// The write was attempted and rejected (not found, conflict, storage or database error)
    Failure,
}

#[derive(Debug, Serialize)]
pub struct AuditEvent {
    pub user_id: Option<String>,
    /// Dotted `<resource>.<verb>`, e.g. `category.delete`
    pub action: String,
    /// `<resource>:<id>`
    pub resource: Option<String>,
    pub outcome: AuditOutcome,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(
        user_id: Option<String>,
        action: impl Into<String>,
        resource: Option<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            user_id,
            action: action.into(),
            resource,
            outcome,
            ip_address: None,
            user_agent: None,
            timestamp: Utc::now(),
            details: None,
        }
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Details that fail to serialize are dropped.
    pub fn with_details(mut self, details: impl Serialize) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    pub fn log(self) {
        let line = match serde_json::to_string(&self) {
            Ok(line) => line,
            Err(err) => format!("unserializable audit event: {err}"),
        };

        match self.outcome {
            AuditOutcome::Success => tracing::info!(
                target: "audit",
                user_id = self.user_id,
                action = %self.action,
                resource = self.resource,
                outcome = ?self.outcome,
                "{line}"
            ),
            AuditOutcome::Failure => tracing::warn!(
                target: "audit",
                user_id = self.user_id,
                action = %self.action,
                resource = self.resource,
                outcome = ?self.outcome,
                "{line}"
            ),
        }
    }
}

/// Client IP: first hop of `X-Forwarded-For`, else `X-Real-IP`.
pub fn extract_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header_str("x-forwarded-for")
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| header_str("x-real-ip").map(str::to_string))
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_wins_over_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7, 172.16.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.1"));

        assert_eq!(extract_ip_from_headers(&headers).as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.1"));

        assert_eq!(extract_ip_from_headers(&headers).as_deref(), Some("192.168.1.1"));
        assert_eq!(extract_user_agent(&headers), None);
    }

    #[test]
    fn test_failed_delete_serializes_outcome_and_details() {
        let event = AuditEvent::new(
            Some("user-1".to_string()),
            "category.delete",
            Some("category:42".to_string()),
            AuditOutcome::Failure,
        )
        .with_details(serde_json::json!({"error": "Conflict: Category still has products assigned"}));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["action"], "category.delete");
        assert!(json["details"]["error"].as_str().unwrap().contains("products"));
        event.log();
    }
}
