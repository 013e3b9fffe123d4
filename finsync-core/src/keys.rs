//! Logical data keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The logical domains persisted by the store.
///
/// Each key has a stable export name (`GOALS`) used in backup bundles and a
/// storage key (`userGoals`) used by the backing key-value substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataKey {
    Settings,
    FamilyMembers,
    SharedBudgets,
    Transactions,
    Budgets,
    Goals,
    Subscriptions,
    Investments,
}

impl DataKey {
    /// Number of logical keys.
    pub const COUNT: usize = 8;

    /// Every logical key, in export order.
    pub const ALL: [DataKey; Self::COUNT] = [
        DataKey::Settings,
        DataKey::FamilyMembers,
        DataKey::SharedBudgets,
        DataKey::Transactions,
        DataKey::Budgets,
        DataKey::Goals,
        DataKey::Subscriptions,
        DataKey::Investments,
    ];

    /// Returns the key under which the entry is stored.
    pub fn storage_key(&self) -> &'static str {
        match self {
            DataKey::Settings => "financeAppSettings",
            DataKey::FamilyMembers => "familyMembers",
            DataKey::SharedBudgets => "sharedBudgets",
            DataKey::Transactions => "userTransactions",
            DataKey::Budgets => "userBudgets",
            DataKey::Goals => "userGoals",
            DataKey::Subscriptions => "userSubscriptions",
            DataKey::Investments => "userInvestments",
        }
    }

    /// Returns the name used in export bundles and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            DataKey::Settings => "SETTINGS",
            DataKey::FamilyMembers => "FAMILY_MEMBERS",
            DataKey::SharedBudgets => "SHARED_BUDGETS",
            DataKey::Transactions => "TRANSACTIONS",
            DataKey::Budgets => "BUDGETS",
            DataKey::Goals => "GOALS",
            DataKey::Subscriptions => "SUBSCRIPTIONS",
            DataKey::Investments => "INVESTMENTS",
        }
    }

    /// Parse from either the export name or the storage key.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s) || k.storage_key() == s)
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
