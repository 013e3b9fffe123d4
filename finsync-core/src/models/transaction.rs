use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    #[default]
    Expense,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Income => write!(f, "income"),
            TransactionKind::Expense => write!(f, "expense"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            _ => Err(format!(
                "Invalid transaction type '{}'. Valid options: income, expense",
                s
            )),
        }
    }
}

/// A single income or expense. Expenses carry negative amounts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Transaction {
    pub id: RecordId,
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
}

impl Transaction {
    pub fn new(id: impl Into<RecordId>, description: impl Into<String>, amount: f64) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            amount,
            kind: if amount < 0.0 {
                TransactionKind::Expense
            } else {
                TransactionKind::Income
            },
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date {
            Some(date) => write!(f, "{} ", date)?,
            None => write!(f, "---------- ")?,
        }
        write!(f, "{:>10.2}  {}", self.amount, self.description)?;
        if !self.category.is_empty() {
            write!(f, " [{}]", self.category)?;
        }
        Ok(())
    }
}
