use core::str::FromStr;

use serde::{Deserialize, Serialize};

use shopfront_core::{DomainError, DomainResult};

/// Order status lifecycle.
///
/// `confirmed` and `completed` are accepted on input as synonyms of `processing`
/// and `delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    #[serde(alias = "confirmed")]
    Processing,
    Shipped,
    #[serde(alias = "completed")]
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Represents physical fulfillment.
    pub fn is_fulfilling(self) -> bool {
        self == OrderStatus::Delivered
    }

    // Position along the forward flow; cancelled sits outside it.
    fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Processing => Some(1),
            OrderStatus::Shipped => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    /// Check that moving from `self` to `next` is allowed.
    ///
    /// Re-applying the current status is accepted as a no-op. Otherwise the flow
    /// only moves forward (steps may be skipped), any non-cancelled order may be
    /// cancelled, and a cancelled order stays cancelled.
    pub fn ensure_can_transition_to(self, next: OrderStatus) -> DomainResult<()> {
        if self == next {
            return Ok(());
        }
        let allowed = match (self.rank(), next.rank()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(from), Some(to)) => to > from,
        };
        if allowed {
            Ok(())
        } else {
            Err(DomainError::invariant(format!(
                "cannot change order status from {} to {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" | "confirmed" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" | "completed" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown order status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::validation(format!("unknown payment status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
    CreditCard,
    Paypal,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Paypal => "paypal",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "paypal" => Ok(PaymentMethod::Paypal),
            other => Err(DomainError::validation(format!("unknown payment method: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn synonyms_parse_to_canonical_status() {
        assert_eq!("completed".parse::<OrderStatus>().unwrap(), Delivered);
        assert_eq!("Confirmed".parse::<OrderStatus>().unwrap(), Processing);
        let parsed: OrderStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, Delivered);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"delivered\"");
    }

    #[test]
    fn forward_flow_and_cancellation_are_allowed() {
        assert!(Pending.ensure_can_transition_to(Processing).is_ok());
        assert!(Processing.ensure_can_transition_to(Shipped).is_ok());
        assert!(Shipped.ensure_can_transition_to(Delivered).is_ok());
        assert!(Pending.ensure_can_transition_to(Delivered).is_ok());
        assert!(Delivered.ensure_can_transition_to(Cancelled).is_ok());
        assert!(Delivered.ensure_can_transition_to(Delivered).is_ok());
    }

    #[test]
    fn backwards_and_out_of_cancelled_are_rejected() {
        match Shipped.ensure_can_transition_to(Pending).unwrap_err() {
            DomainError::InvariantViolation(msg) if msg.contains("shipped to pending") => {}
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(Cancelled.ensure_can_transition_to(Delivered).is_err());
        assert!(Cancelled.ensure_can_transition_to(Cancelled).is_ok());
    }

    #[test]
    fn unknown_values_are_validation_errors() {
        assert!(matches!("lost".parse::<OrderStatus>(), Err(DomainError::Validation(_))));
        assert!(matches!("refunded".parse::<PaymentStatus>(), Err(DomainError::Validation(_))));
        assert_eq!(PaymentMethod::default().as_str(), "cash_on_delivery");
    }
}
