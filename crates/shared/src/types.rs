//! Common types used across Sternblitz

use serde::{Deserialize, Serialize};

// =============================================================================
// Users
// =============================================================================

/// Role of an internal (team) user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Sales,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Sales
    }
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Sales => "sales",
        }
    }

    /// Admins may charge, override status, delete orders and mint invites
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "sales" => Ok(Self::Sales),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// =============================================================================
// Payments
// =============================================================================

/// Payment state of an order as tracked from Stripe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No payment method stored yet
    Pending,
    /// SetupIntent succeeded, payment method stored off-session
    CardOnFile,
    Processing,
    Paid,
    Failed,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::CardOnFile => "card_on_file",
            Self::Processing => "processing",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "card_on_file" => Ok(Self::CardOnFile),
            "processing" => Ok(Self::Processing),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

/// Kind of stored payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Card,
    SepaDebit,
}

impl PaymentMethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::SepaDebit => "sepa_debit",
        }
    }

    /// Method types offered on a PaymentIntent, the stored kind first.
    ///
    /// An unknown kind (`None`) is treated as card.
    pub fn charge_order(kind: Option<Self>) -> [Self; 2] {
        match kind {
            Some(Self::SepaDebit) => [Self::SepaDebit, Self::Card],
            _ => [Self::Card, Self::SepaDebit],
        }
    }
}

impl std::fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "sepa_debit" => Ok(Self::SepaDebit),
            _ => Err(format!("Unsupported payment method type: {}", s)),
        }
    }
}

// =============================================================================
// Referrals
// =============================================================================

/// How an order came in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralChannel {
    None,
    Referral,
}

impl Default for ReferralChannel {
    fn default() -> Self {
        Self::None
    }
}

impl ReferralChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Referral => "referral",
        }
    }
}

impl std::fmt::Display for ReferralChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Value stored in `orders.referral_award_status` once a referred order is paid
pub const REFERRAL_AWARD_PENDING: &str = "pending";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_parse() {
        assert_eq!("admin".parse::<UserRole>(), Ok(UserRole::Admin));
        assert_eq!(" Sales ".parse::<UserRole>(), Ok(UserRole::Sales));
        assert!("owner".parse::<UserRole>().is_err());
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Sales.is_admin());
    }

    #[test]
    fn test_payment_status_strings() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::CardOnFile,
            PaymentStatus::Processing,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>(), Ok(status));
        }
        assert_eq!(
            serde_json::to_string(&PaymentStatus::CardOnFile).unwrap(),
            "\"card_on_file\""
        );
    }

    #[test]
    fn test_charge_order_prefers_stored_kind() {
        assert_eq!(
            PaymentMethodKind::charge_order(Some(PaymentMethodKind::SepaDebit)),
            [PaymentMethodKind::SepaDebit, PaymentMethodKind::Card]
        );
        assert_eq!(
            PaymentMethodKind::charge_order(Some(PaymentMethodKind::Card)),
            [PaymentMethodKind::Card, PaymentMethodKind::SepaDebit]
        );
        assert_eq!(
            PaymentMethodKind::charge_order(None),
            [PaymentMethodKind::Card, PaymentMethodKind::SepaDebit]
        );
    }

    #[test]
    fn test_unknown_method_kind_rejected() {
        assert!("paypal".parse::<PaymentMethodKind>().is_err());
    }
}
