use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingCycle::Weekly => write!(f, "weekly"),
            BillingCycle::Monthly => write!(f, "monthly"),
            BillingCycle::Yearly => write!(f, "yearly"),
        }
    }
}

/// A recurring payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Subscription {
    pub id: RecordId,
    pub name: String,
    pub amount: f64,
    pub billing_cycle: BillingCycle,
    pub next_billing_date: Option<NaiveDate>,
    pub category: String,
    pub active: bool,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            id: RecordId::default(),
            name: String::new(),
            amount: 0.0,
            billing_cycle: BillingCycle::default(),
            next_billing_date: None,
            category: String::new(),
            active: true,
        }
    }
}

impl Subscription {
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>, amount: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            amount,
            ..Default::default()
        }
    }

    pub fn with_cycle(mut self, cycle: BillingCycle) -> Self {
        self.billing_cycle = cycle;
        self
    }

    /// Cost normalized to one month. Inactive subscriptions cost nothing.
    pub fn monthly_cost(&self) -> f64 {
        if !self.active {
            return 0.0;
        }
        match self.billing_cycle {
            BillingCycle::Weekly => self.amount * 52.0 / 12.0,
            BillingCycle::Monthly => self.amount,
            BillingCycle::Yearly => self.amount / 12.0,
        }
    }
}
