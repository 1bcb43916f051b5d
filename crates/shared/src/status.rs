//! Order lifecycle status and normalization of legacy status strings.
//!
//! Older records (spreadsheet imports, the previous CRM) carry free-form German
//! or English labels. Every write goes through [`normalize_status`], which
//! accepts the canonical value or resolves a legacy label through
//! [`LEGACY_STATUS_RULES`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Processing,
    Success,
    WaitingPayment,
    PaidDeleted,
    CommissionPaid,
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::New
    }
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::New,
        Self::Processing,
        Self::Success,
        Self::WaitingPayment,
        Self::PaidDeleted,
        Self::CommissionPaid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Success => "SUCCESS",
            Self::WaitingPayment => "WAITING_PAYMENT",
            Self::PaidDeleted => "PAID_DELETED",
            Self::CommissionPaid => "COMMISSION_PAID",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exact parse of the canonical value. Use [`normalize_status`] for user input.
impl std::str::FromStr for OrderStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StatusError::Unrecognized(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("status is empty")]
    Empty,

    #[error("unrecognized status: {0}")]
    Unrecognized(String),
}

/// One legacy mapping: input containing `needle` (lower-cased) maps to `status`
#[derive(Debug, Clone, Copy)]
pub struct LegacyStatusRule {
    pub needle: &'static str,
    pub status: OrderStatus,
}

const fn rule(needle: &'static str, status: OrderStatus) -> LegacyStatusRule {
    LegacyStatusRule { needle, status }
}

/// Checked top to bottom, first match wins. More specific labels come first,
/// e.g. "Bezahlt & gelöscht" must hit the deletion rule before anything else.
pub const LEGACY_STATUS_RULES: &[LegacyStatusRule] = &[
    rule("provision", OrderStatus::CommissionPaid),
    rule("commission", OrderStatus::CommissionPaid),
    rule("gelöscht", OrderStatus::PaidDeleted),
    rule("geloescht", OrderStatus::PaidDeleted),
    rule("deleted", OrderStatus::PaidDeleted),
    rule("warte", OrderStatus::WaitingPayment),
    rule("zahlung", OrderStatus::WaitingPayment),
    rule("waiting", OrderStatus::WaitingPayment),
    rule("erfolg", OrderStatus::Success),
    rule("success", OrderStatus::Success),
    rule("bearbeitung", OrderStatus::Processing),
    rule("in arbeit", OrderStatus::Processing),
    rule("processing", OrderStatus::Processing),
    rule("neu", OrderStatus::New),
];

/// Map a canonical or legacy status string to [`OrderStatus`].
///
/// Canonical values are matched case-insensitively with spaces or hyphens in
/// place of underscores (`"waiting payment"` is `WAITING_PAYMENT`).
pub fn normalize_status(input: &str) -> Result<OrderStatus, StatusError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(StatusError::Empty);
    }

    let canonical: String = trimmed
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect();
    if let Ok(status) = canonical.parse::<OrderStatus>() {
        return Ok(status);
    }

    let lowered = trimmed.to_lowercase();
    LEGACY_STATUS_RULES
        .iter()
        .find(|rule| lowered.contains(rule.needle))
        .map(|rule| rule.status)
        .ok_or_else(|| StatusError::Unrecognized(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_values_pass_through() {
        for status in OrderStatus::ALL {
            assert_eq!(normalize_status(status.as_str()), Ok(status));
        }
    }

    #[test]
    fn test_canonical_values_are_case_insensitive() {
        assert_eq!(
            normalize_status("waiting payment"),
            Ok(OrderStatus::WaitingPayment)
        );
        assert_eq!(normalize_status("paid-deleted"), Ok(OrderStatus::PaidDeleted));
        assert_eq!(normalize_status("  new "), Ok(OrderStatus::New));
    }

    #[test]
    fn test_every_rule_resolves_to_its_own_status() {
        // No rule may be shadowed by an earlier one
        for rule in LEGACY_STATUS_RULES {
            assert_eq!(
                normalize_status(rule.needle),
                Ok(rule.status),
                "needle {:?}",
                rule.needle
            );
        }
    }

    #[test]
    fn test_legacy_labels() {
        assert_eq!(normalize_status("Neu"), Ok(OrderStatus::New));
        assert_eq!(normalize_status("Neuer Auftrag"), Ok(OrderStatus::New));
        assert_eq!(normalize_status("In Bearbeitung"), Ok(OrderStatus::Processing));
        assert_eq!(normalize_status("Erfolgreich"), Ok(OrderStatus::Success));
        assert_eq!(
            normalize_status("Warte auf Zahlung"),
            Ok(OrderStatus::WaitingPayment)
        );
        assert_eq!(
            normalize_status("Bezahlt & gelöscht"),
            Ok(OrderStatus::PaidDeleted)
        );
        assert_eq!(
            normalize_status("Provision ausgezahlt"),
            Ok(OrderStatus::CommissionPaid)
        );
    }

    #[test]
    fn test_unrecognized_rejected() {
        assert_eq!(
            normalize_status("quatsch"),
            Err(StatusError::Unrecognized("quatsch".to_string()))
        );
        assert_eq!(normalize_status("   "), Err(StatusError::Empty));
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::CommissionPaid).unwrap(),
            "\"COMMISSION_PAID\""
        );
    }
}
