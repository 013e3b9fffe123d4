use clap::{Args, Subcommand};
use serde_json::Value;

use finsync_core::{
    Budget, DataKey, DataService, Goal, Investment, SaveOptions, StoreError, Subscription,
    Transaction, TransactionKind,
};

use super::OutputFormat;

#[derive(Args)]
pub struct DataCommand {
    #[command(subcommand)]
    pub command: DataSubcommand,
}

#[derive(Subcommand)]
pub enum DataSubcommand {
    /// Replace the value stored under a key
    Save {
        /// Key name (GOALS, BUDGETS, ...) or storage key (userGoals, ...)
        key: String,

        /// New value as JSON
        value: String,

        /// Sync right after saving
        #[arg(long)]
        sync: bool,
    },

    /// Print the value stored under a key
    Load {
        key: String,

        /// Print on one line
        #[arg(long)]
        compact: bool,
    },

    /// Show version metadata of a key
    Meta {
        key: String,

        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List every key and whether it holds data
    Keys,

    /// Totals across goals, budgets, transactions, subscriptions and investments
    Summary,
}

impl DataCommand {
    /// Returns true if the command wrote to the store.
    pub fn is_write(&self) -> bool {
        matches!(self.command, DataSubcommand::Save { .. })
    }

    pub async fn run(&self, service: &DataService) -> Result<(), DataCommandError> {
        match &self.command {
            DataSubcommand::Save { key, value, sync } => {
                let key = parse_key(key)?;
                let value = parse_value(value)?;
                let options = if *sync {
                    SaveOptions::immediate()
                } else {
                    SaveOptions::default()
                };
                let receipt = service.save(key, value, options).await?;
                println!("Saved {} (version {})", key, receipt.version);
                println!("  change: {}", receipt.change_id);
            }

            DataSubcommand::Load { key, compact } => {
                let key = parse_key(key)?;
                let value = service.load(key, Value::Null);
                let rendered = if *compact {
                    serde_json::to_string(&value)?
                } else {
                    serde_json::to_string_pretty(&value)?
                };
                println!("{}", rendered);
            }

            DataSubcommand::Meta { key, format } => {
                let key = parse_key(key)?;
                let meta = service.get_meta(key);
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&meta)?),
                    OutputFormat::Text => match meta {
                        Some(meta) => {
                            println!("{}", key);
                            println!("  version:       {}", meta.version);
                            println!("  last modified: {}", meta.last_modified.to_rfc3339());
                            println!("  change:        {}", meta.change_id);
                        }
                        None => println!("{}: no data", key),
                    },
                }
            }

            DataSubcommand::Keys => {
                for key in DataKey::ALL {
                    let marker = if service.get_meta(key).is_some() {
                        "✓"
                    } else {
                        " "
                    };
                    println!("{} {:<15} {}", marker, key.name(), key.storage_key());
                }
            }

            DataSubcommand::Summary => {
                print!("{}", render_summary(service)?);
            }
        }

        Ok(())
    }
}

fn parse_key(raw: &str) -> Result<DataKey, DataCommandError> {
    DataKey::parse(raw).ok_or_else(|| DataCommandError::UnknownKey(raw.to_string()))
}

fn parse_value(raw: &str) -> Result<Value, DataCommandError> {
    serde_json::from_str(raw).map_err(|e| DataCommandError::InvalidJson(e.to_string()))
}

fn render_summary(service: &DataService) -> Result<String, StoreError> {
    let goals: Vec<Goal> = service.load_document()?;
    let budgets: Vec<Budget> = service.load_document()?;
    let transactions: Vec<Transaction> = service.load_document()?;
    let subscriptions: Vec<Subscription> = service.load_document()?;
    let investments: Vec<Investment> = service.load_document()?;

    let mut out = String::new();

    out.push_str(&format!("Goals ({})\n", goals.len()));
    for goal in &goals {
        out.push_str(&format!("  {}\n", goal));
    }

    let over: Vec<&Budget> = budgets.iter().filter(|b| b.is_over_budget()).collect();
    out.push_str(&format!(
        "Budgets ({}, {} over)\n",
        budgets.len(),
        over.len()
    ));
    for budget in over {
        out.push_str(&format!(
            "  {} {:.0}% used\n",
            budget.category,
            budget.utilization_percent()
        ));
    }

    let (income, expenses) = transactions
        .iter()
        .fold((0.0, 0.0), |(inc, exp), t| match t.kind {
            TransactionKind::Income => (inc + t.amount.abs(), exp),
            TransactionKind::Expense => (inc, exp + t.amount.abs()),
        });
    out.push_str(&format!(
        "Transactions ({}): income {:.2}, expenses {:.2}\n",
        transactions.len(),
        income,
        expenses
    ));

    // f64 sums start from -0.0, which formats as "-0.00"
    let monthly = subscriptions
        .iter()
        .filter(|s| s.active)
        .fold(0.0, |total, s| total + s.monthly_cost());
    out.push_str(&format!(
        "Subscriptions ({}): {:.2} per month\n",
        subscriptions.len(),
        monthly
    ));

    let (value, gain) = investments.iter().fold((0.0, 0.0), |(value, gain), i| {
        (value + i.market_value(), gain + i.gain())
    });
    out.push_str(&format!(
        "Investments ({}): value {:.2}, gain {:.2}\n",
        investments.len(),
        value,
        gain
    ));

    Ok(out)
}

/// Errors from data commands
#[derive(Debug)]
pub enum DataCommandError {
    UnknownKey(String),
    InvalidJson(String),
    Store(StoreError),
}

impl std::fmt::Display for DataCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataCommandError::UnknownKey(key) => {
                let names: Vec<&str> = DataKey::ALL.iter().map(|k| k.name()).collect();
                write!(
                    f,
                    "Unknown key '{}'. Valid keys: {}",
                    key,
                    names.join(", ")
                )
            }
            DataCommandError::InvalidJson(e) => write!(f, "Invalid JSON value: {}", e),
            DataCommandError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DataCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataCommandError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for DataCommandError {
    fn from(e: StoreError) -> Self {
        DataCommandError::Store(e)
    }
}

impl From<serde_json::Error> for DataCommandError {
    fn from(e: serde_json::Error) -> Self {
        DataCommandError::Store(StoreError::Serialization(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("goals").unwrap(), DataKey::Goals);
        assert_eq!(parse_key("userBudgets").unwrap(), DataKey::Budgets);

        let err = parse_key("recipes").unwrap_err();
        assert!(err.to_string().contains("Unknown key 'recipes'"));
        assert!(err.to_string().contains("INVESTMENTS"));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("[1, 2]").unwrap(), json!([1, 2]));
        assert!(matches!(
            parse_value("{oops"),
            Err(DataCommandError::InvalidJson(_))
        ));
    }

    #[tokio::test]
    async fn test_render_summary() {
        let service = DataService::in_memory();
        service
            .save_document(
                &vec![
                    Goal::new(1, "Emergency fund", 1000.0).with_current(250.0),
                    Goal::new(2, "Holiday", 500.0),
                ],
                SaveOptions::silent(),
            )
            .await
            .unwrap();
        service
            .save_document(
                &vec![
                    Budget::new(1, "Food", 100.0).with_spent(150.0),
                    Budget::new(2, "Rent", 800.0).with_spent(800.0),
                ],
                SaveOptions::silent(),
            )
            .await
            .unwrap();
        service
            .save_document(
                &vec![
                    Transaction::new(1, "Salary", 2000.0),
                    Transaction::new(2, "Groceries", -50.5),
                ],
                SaveOptions::silent(),
            )
            .await
            .unwrap();

        let summary = render_summary(&service).unwrap();
        assert!(summary.contains("Goals (2)"));
        assert!(summary.contains("Budgets (2, 1 over)"));
        assert!(summary.contains("Food 150% used"));
        assert!(summary.contains("income 2000.00, expenses 50.50"));
        assert!(summary.contains("Subscriptions (0): 0.00 per month"));
    }

    #[test]
    fn test_render_summary_of_empty_data_has_no_negative_zero() {
        let service = DataService::in_memory();

        let summary = render_summary(&service).unwrap();
        assert!(summary.contains("Subscriptions (0): 0.00 per month"));
        assert!(summary.contains("Investments (0): value 0.00, gain 0.00"));
        assert!(summary.contains("income 0.00, expenses 0.00"));
        assert!(!summary.contains("-0.00"));
    }

    #[test]
    fn test_render_summary_reports_mismatched_data() {
        let service = DataService::in_memory();
        service
            .persist(DataKey::Goals, json!({"not": "a list"}), false)
            .unwrap();

        assert!(matches!(
            render_summary(&service),
            Err(StoreError::MalformedStoredData {
                key: DataKey::Goals,
                ..
            })
        ));
    }

    #[test]
    fn test_is_write() {
        let save = DataCommand {
            command: DataSubcommand::Save {
                key: "GOALS".into(),
                value: "[]".into(),
                sync: false,
            },
        };
        let keys = DataCommand {
            command: DataSubcommand::Keys,
        };
        assert!(save.is_write());
        assert!(!keys.is_write());
    }
}
