use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{percent, RecordId};

/// Bucket of the 50/30/20 budgeting method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetType {
    Needs,
    Wants,
    Savings,
}

impl fmt::Display for BudgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetType::Needs => write!(f, "needs"),
            BudgetType::Wants => write!(f, "wants"),
            BudgetType::Savings => write!(f, "savings"),
        }
    }
}

impl FromStr for BudgetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "needs" => Ok(BudgetType::Needs),
            "wants" => Ok(BudgetType::Wants),
            "savings" => Ok(BudgetType::Savings),
            _ => Err(format!(
                "Invalid budget type '{}'. Valid options: needs, wants, savings",
                s
            )),
        }
    }
}

/// Monthly allowance for one spending category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Budget {
    pub id: RecordId,
    pub category: String,
    /// Allowed amount
    #[serde(rename = "budget")]
    pub amount: f64,
    pub spent: f64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub budget_type: Option<BudgetType>,
}

impl Budget {
    pub fn new(id: impl Into<RecordId>, category: impl Into<String>, amount: f64) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            amount,
            ..Default::default()
        }
    }

    pub fn with_spent(mut self, spent: f64) -> Self {
        self.spent = spent;
        self
    }

    pub fn with_type(mut self, budget_type: BudgetType) -> Self {
        self.budget_type = Some(budget_type);
        self
    }

    /// Share of the allowance already spent. Not capped: overspending
    /// yields more than 100.
    pub fn utilization_percent(&self) -> f64 {
        percent(self.spent, self.amount).unwrap_or(0.0)
    }

    pub fn remaining(&self) -> f64 {
        self.amount - self.spent
    }

    pub fn is_over_budget(&self) -> bool {
        self.spent > self.amount
    }
}

/// A budget shared between family members.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SharedBudget {
    pub id: RecordId,
    pub name: String,
    pub total_budget: f64,
    pub spent: f64,
    pub categories: Vec<String>,
    /// Ids of participating family members
    pub members: Vec<RecordId>,
    pub creator: Option<RecordId>,
    pub status: String,
    /// "monthly", "annual" or "ongoing"
    pub period: String,
}

impl SharedBudget {
    pub fn remaining(&self) -> f64 {
        self.total_budget - self.spent
    }

    pub fn progress_percent(&self) -> f64 {
        percent(self.spent, self.total_budget).unwrap_or(0.0)
    }
}
