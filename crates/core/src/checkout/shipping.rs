//! Shipping form state.

use serde::{Deserialize, Serialize};

use super::CheckoutError;
use crate::types::Email;

/// A field of the shipping form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingField {
    FirstName,
    LastName,
    Email,
    Phone,
    Address,
    City,
    Province,
    PostalCode,
}

impl ShippingField {
    pub const ALL: [Self; 8] = [
        Self::FirstName,
        Self::LastName,
        Self::Email,
        Self::Phone,
        Self::Address,
        Self::City,
        Self::Province,
        Self::PostalCode,
    ];

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::Email => "Email",
            Self::Phone => "Phone",
            Self::Address => "Address",
            Self::City => "City",
            Self::Province => "Province",
            Self::PostalCode => "Postal code",
        }
    }
}

/// Where the order goes and who to call about it.
///
/// Deserializes from the shipping form; missing fields are blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
}

impl ShippingInfo {
    /// Start from the signed-in shopper's display name and email.
    ///
    /// The first word of the name becomes the first name and the second
    /// word the last name.
    #[must_use]
    pub fn prefill(display_name: &str, email: &str) -> Self {
        let mut words = display_name.split_whitespace();
        Self {
            first_name: words.next().unwrap_or_default().to_string(),
            last_name: words.next().unwrap_or_default().to_string(),
            email: email.trim().to_string(),
            ..Self::default()
        }
    }

    /// Value of one field.
    #[must_use]
    pub fn get(&self, field: ShippingField) -> &str {
        match field {
            ShippingField::FirstName => &self.first_name,
            ShippingField::LastName => &self.last_name,
            ShippingField::Email => &self.email,
            ShippingField::Phone => &self.phone,
            ShippingField::Address => &self.address,
            ShippingField::City => &self.city,
            ShippingField::Province => &self.province,
            ShippingField::PostalCode => &self.postal_code,
        }
    }

    /// Blank fields, in form order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<ShippingField> {
        ShippingField::ALL
            .into_iter()
            .filter(|field| self.get(*field).trim().is_empty())
            .collect()
    }

    /// Check every field is filled in and the email is well formed.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::IncompleteShipping`] listing the blank fields, or
    /// [`CheckoutError::InvalidEmail`].
    pub fn validate(&self) -> Result<(), CheckoutError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(CheckoutError::IncompleteShipping(missing));
        }
        Email::parse(&self.email).map_err(CheckoutError::InvalidEmail)?;
        Ok(())
    }

    /// Copy with surrounding whitespace stripped from every field.
    #[must_use]
    pub fn trimmed(&self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            province: self.province.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::ShippingInfo;

    pub fn complete_shipping() -> ShippingInfo {
        ShippingInfo {
            first_name: "Juan".into(),
            last_name: "Dela Cruz".into(),
            email: "juan@example.ph".into(),
            phone: "09171234567".into(),
            address: "123 Rizal St".into(),
            city: "Quezon City".into(),
            province: "Metro Manila".into(),
            postal_code: "1100".into(),
        }
    }
}
