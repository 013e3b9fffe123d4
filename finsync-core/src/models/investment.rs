use serde::{Deserialize, Serialize};

use super::{percent, RecordId};

/// A holding in a portfolio.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Investment {
    pub id: RecordId,
    pub name: String,
    pub symbol: String,
    pub quantity: f64,
    pub purchase_price: f64,
    pub current_price: f64,
}

impl Investment {
    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.purchase_price
    }

    pub fn gain(&self) -> f64 {
        self.market_value() - self.cost_basis()
    }

    pub fn gain_percent(&self) -> f64 {
        percent(self.gain(), self.cost_basis()).unwrap_or(0.0)
    }
}
