//! Checkout wizard.

use serde::{Deserialize, Serialize};

use super::{CheckoutError, PaymentMethod, ShippingInfo};
use crate::cart::SelectionSet;

/// Wizard steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStep {
    #[default]
    Shipping,
    Payment,
    Review,
}

impl CheckoutStep {
    pub const ALL: [Self; 3] = [Self::Shipping, Self::Payment, Self::Review];

    /// 1-based position shown in the step indicator.
    #[must_use]
    pub const fn number(&self) -> u8 {
        match self {
            Self::Shipping => 1,
            Self::Payment => 2,
            Self::Review => 3,
        }
    }

    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Shipping => "Shipping",
            Self::Payment => "Payment",
            Self::Review => "Review",
        }
    }

    /// The following step; Review stays at Review.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Shipping => Self::Payment,
            Self::Payment | Self::Review => Self::Review,
        }
    }

    /// The preceding step; Shipping stays at Shipping.
    #[must_use]
    pub const fn prev(self) -> Self {
        match self {
            Self::Shipping | Self::Payment => Self::Shipping,
            Self::Review => Self::Payment,
        }
    }
}

/// State of one checkout, kept in the shopper's session between requests.
///
/// `items` is the selection snapshot taken when checkout started; later
/// changes to the cart page selection do not leak into a checkout that is
/// already underway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutWizard {
    step: CheckoutStep,
    shipping: ShippingInfo,
    payment: PaymentMethod,
    items: SelectionSet,
}

impl CheckoutWizard {
    /// Start at the shipping step.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::EmptySelection`] if no line is selected.
    pub fn start(items: SelectionSet, shipping: ShippingInfo) -> Result<Self, CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::EmptySelection);
        }
        Ok(Self {
            step: CheckoutStep::Shipping,
            shipping,
            payment: PaymentMethod::default(),
            items,
        })
    }

    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    #[must_use]
    pub const fn shipping(&self) -> &ShippingInfo {
        &self.shipping
    }

    #[must_use]
    pub const fn payment(&self) -> PaymentMethod {
        self.payment
    }

    #[must_use]
    pub const fn items(&self) -> &SelectionSet {
        &self.items
    }

    /// Mutable access for pruning keys that left the cart.
    pub const fn items_mut(&mut self) -> &mut SelectionSet {
        &mut self.items
    }

    /// Store the submitted shipping form and move to Payment.
    ///
    /// The form is kept even when it is rejected so the shopper does not
    /// have to retype it. A form submitted from a later step is checked the
    /// same way and leaves the step unchanged when valid.
    ///
    /// # Errors
    ///
    /// Whatever [`ShippingInfo::validate`] reports. The wizard is then back
    /// at Shipping, so Review is never reached with incomplete details.
    pub fn submit_shipping(&mut self, shipping: ShippingInfo) -> Result<CheckoutStep, CheckoutError> {
        self.shipping = shipping.trimmed();
        if let Err(e) = self.shipping.validate() {
            self.step = CheckoutStep::Shipping;
            return Err(e);
        }
        match self.step {
            CheckoutStep::Shipping => self.advance(),
            CheckoutStep::Payment | CheckoutStep::Review => Ok(self.step),
        }
    }

    /// Store the chosen payment method and move to Review.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::PaymentUnavailable`] for a disabled method; the
    /// previous choice is kept.
    pub fn submit_payment(&mut self, payment: PaymentMethod) -> Result<CheckoutStep, CheckoutError> {
        if !payment.is_enabled() {
            return Err(CheckoutError::PaymentUnavailable(payment));
        }
        self.payment = payment;
        self.advance()
    }

    /// Move one step forward after checking the current step's input.
    ///
    /// # Errors
    ///
    /// The validation error of the current step.
    pub fn advance(&mut self) -> Result<CheckoutStep, CheckoutError> {
        match self.step {
            CheckoutStep::Shipping => self.shipping.validate()?,
            CheckoutStep::Payment if !self.payment.is_enabled() => {
                return Err(CheckoutError::PaymentUnavailable(self.payment));
            }
            CheckoutStep::Payment | CheckoutStep::Review => {}
        }
        self.step = self.step.next();
        Ok(self.step)
    }

    /// Move one step back. Never validates.
    pub const fn back(&mut self) -> CheckoutStep {
        self.step = self.step.prev();
        self.step
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::LineItemKey;
    use crate::checkout::shipping::test_support::complete_shipping;
    use crate::types::ProductId;

    fn selection() -> SelectionSet {
        [LineItemKey::new(ProductId::new(1), Some("M"))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_step_transitions_saturate() {
        assert_eq!(CheckoutStep::Shipping.prev(), CheckoutStep::Shipping);
        assert_eq!(CheckoutStep::Review.next(), CheckoutStep::Review);
        assert_eq!(CheckoutStep::Shipping.next(), CheckoutStep::Payment);
        assert_eq!(CheckoutStep::Payment.next(), CheckoutStep::Review);
        assert_eq!(CheckoutStep::Review.prev(), CheckoutStep::Payment);
    }

    #[test]
    fn test_steps_are_numbered_in_order() {
        let numbers: Vec<u8> = CheckoutStep::ALL.iter().map(CheckoutStep::number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(CheckoutStep::Shipping < CheckoutStep::Review);
    }

    #[test]
    fn test_start_requires_selection() {
        let err = CheckoutWizard::start(SelectionSet::new(), complete_shipping()).unwrap_err();
        assert!(matches!(err, CheckoutError::EmptySelection));
    }

    #[test]
    fn test_blank_shipping_blocks_advance() {
        let mut wizard = CheckoutWizard::start(selection(), ShippingInfo::default()).unwrap();

        let err = wizard.advance().unwrap_err();
        assert!(matches!(err, CheckoutError::IncompleteShipping(_)));
        assert_eq!(wizard.step(), CheckoutStep::Shipping);

        let mut partial = complete_shipping();
        partial.postal_code.clear();
        assert!(wizard.submit_shipping(partial).is_err());
        assert_eq!(wizard.step(), CheckoutStep::Shipping);
        // The rejected form is kept for re-display.
        assert_eq!(wizard.shipping().city, "Quezon City");
    }

    #[test]
    fn test_full_walk_and_back() {
        let mut wizard = CheckoutWizard::start(selection(), ShippingInfo::default()).unwrap();

        assert_eq!(wizard.submit_shipping(complete_shipping()).unwrap(), CheckoutStep::Payment);

        let err = wizard.submit_payment(PaymentMethod::PayPal).unwrap_err();
        assert!(matches!(err, CheckoutError::PaymentUnavailable(PaymentMethod::PayPal)));
        assert_eq!(wizard.step(), CheckoutStep::Payment);
        assert_eq!(wizard.payment(), PaymentMethod::Cod);

        assert_eq!(wizard.submit_payment(PaymentMethod::Cod).unwrap(), CheckoutStep::Review);
        assert_eq!(wizard.advance().unwrap(), CheckoutStep::Review);

        assert_eq!(wizard.back(), CheckoutStep::Payment);
        assert_eq!(wizard.back(), CheckoutStep::Shipping);
        assert_eq!(wizard.back(), CheckoutStep::Shipping);
    }

    #[test]
    fn test_blank_shipping_from_later_step_returns_to_shipping() {
        let mut wizard = CheckoutWizard::start(selection(), ShippingInfo::default()).unwrap();
        assert_eq!(wizard.submit_shipping(complete_shipping()).unwrap(), CheckoutStep::Payment);

        assert!(wizard.submit_shipping(ShippingInfo::default()).is_err());
        assert_eq!(wizard.step(), CheckoutStep::Shipping);
        assert!(wizard.shipping().validate().is_err());

        assert_eq!(wizard.submit_shipping(complete_shipping()).unwrap(), CheckoutStep::Payment);
        assert_eq!(wizard.submit_payment(PaymentMethod::Cod).unwrap(), CheckoutStep::Review);

        // Resubmitting a valid form at Review keeps the step.
        assert_eq!(wizard.submit_shipping(complete_shipping()).unwrap(), CheckoutStep::Review);
        assert!(wizard.submit_shipping(ShippingInfo::default()).is_err());
        assert_eq!(wizard.step(), CheckoutStep::Shipping);
    }

    #[test]
    fn test_wizard_survives_session_round_trip() {
        let mut wizard = CheckoutWizard::start(selection(), complete_shipping()).unwrap();
        wizard.advance().unwrap();

        let json = serde_json::to_value(&wizard).unwrap();
        let back: CheckoutWizard = serde_json::from_value(json).unwrap();
        assert_eq!(back, wizard);
        assert_eq!(back.step(), CheckoutStep::Payment);
    }
}
