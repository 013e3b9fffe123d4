//! Typed payloads stored under each [`DataKey`].
//!
//! Every record type tolerates missing fields, so sparse records written by
//! older clients (`[{"id": 1, "target": 100}]`) still load.

mod budget;
mod family;
mod goal;
mod investment;
mod settings;
mod subscription;
mod transaction;

pub use budget::{Budget, BudgetType, SharedBudget};
pub use family::{FamilyMember, MemberRole};
pub use goal::Goal;
pub use investment::Investment;
pub use settings::{
    NotificationSettings, Preferences, Profile, SecuritySettings, Settings,
};
pub use subscription::{BillingCycle, Subscription};
pub use transaction::{Transaction, TransactionKind};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::keys::DataKey;

/// A payload type bound to the logical key it is stored under.
pub trait Document:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    const KEY: DataKey;
}

impl Document for Settings {
    const KEY: DataKey = DataKey::Settings;
}

impl Document for Vec<FamilyMember> {
    const KEY: DataKey = DataKey::FamilyMembers;
}

impl Document for Vec<SharedBudget> {
    const KEY: DataKey = DataKey::SharedBudgets;
}

impl Document for Vec<Transaction> {
    const KEY: DataKey = DataKey::Transactions;
}

impl Document for Vec<Budget> {
    const KEY: DataKey = DataKey::Budgets;
}

impl Document for Vec<Goal> {
    const KEY: DataKey = DataKey::Goals;
}

impl Document for Vec<Subscription> {
    const KEY: DataKey = DataKey::Subscriptions;
}

impl Document for Vec<Investment> {
    const KEY: DataKey = DataKey::Investments;
}

/// Record identifier. Older records use numbers, newer ones strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl Default for RecordId {
    fn default() -> Self {
        RecordId::Number(0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Number(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

/// `part / whole` as a percentage, or `None` when `whole` is not positive.
pub(crate) fn percent(part: f64, whole: f64) -> Option<f64> {
    if whole > 0.0 {
        Some(part / whole * 100.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_accepts_numbers_and_strings() {
        let ids: Vec<RecordId> = serde_json::from_value(json!([1, "abc"])).unwrap();
        assert_eq!(ids, vec![RecordId::Number(1), RecordId::Text("abc".into())]);
        assert_eq!(serde_json::to_value(&ids).unwrap(), json!([1, "abc"]));
    }

    #[test]
    fn test_document_keys() {
        assert_eq!(<Settings as Document>::KEY, DataKey::Settings);
        assert_eq!(<Vec<Goal> as Document>::KEY, DataKey::Goals);
        assert_eq!(<Vec<SharedBudget> as Document>::KEY, DataKey::SharedBudgets);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(50.0, 200.0), Some(25.0));
        assert_eq!(percent(5.0, 0.0), None);
    }
}
