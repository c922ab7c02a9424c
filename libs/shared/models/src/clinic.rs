// Catalog records owned by the patient/doctor/catalog services.
// The scheduling core only reads them.
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Specialty {
    pub id: Uuid,
    pub name: String,
    pub consultation_price: Decimal,
    pub discount_percentage: Option<Decimal>,
    #[serde(default)]
    pub requires_referral: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Specialty {
    /// Consultation price after discount, rounded half-up to cents.
    /// Without a positive discount the base price is returned as is.
    pub fn final_price(&self) -> Decimal {
        match self.discount_percentage {
            Some(discount) if discount > Decimal::ZERO => {
                let discount_amount = self.consultation_price * discount / Decimal::ONE_HUNDRED;
                (self.consultation_price - discount_amount)
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            }
            _ => self.consultation_price,
        }
    }
}

fn default_true() -> bool {
    true
}
