//! Seed configuration loading from config.toml.
//!
//! On first run (or whenever rows are missing) the envelopes and income
//! sources declared in `config.toml` are inserted for the configured user.
//! Amounts in the file are decimal dollar strings (`"500.00"`) parsed into
//! cents; TOML floats are not accepted for money.

use crate::entities::{envelope, income_source, Envelope, EnvelopeColumn, IncomeSource, IncomeSourceColumn};
use crate::errors::{Error, Result};
use crate::money::Money;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct SeedConfig {
    /// The user all seeded rows belong to
    pub user_id: String,
    /// Envelopes to seed
    #[serde(default)]
    pub envelopes: Vec<EnvelopeSeed>,
    /// Income sources to seed
    #[serde(default)]
    pub income_sources: Vec<IncomeSourceSeed>,
}

/// Configuration for a single envelope
#[derive(Debug, Deserialize, Clone)]
pub struct EnvelopeSeed {
    /// Name of the envelope
    pub name: String,
    /// Priority band: `"essential"`, `"important"`, or `"discretionary"`
    pub category: String,
    /// Target amount as a decimal dollar string
    pub target: String,
    /// Planned per-cycle commitment as a decimal dollar string
    pub pay_cycle_amount: String,
    /// Whether this is the surplus-tracking envelope
    #[serde(default)]
    pub is_surplus: bool,
    /// Whether this is the credit-card holding envelope
    #[serde(default)]
    pub is_cc_holding: bool,
}

/// Configuration for a single income source
#[derive(Debug, Deserialize, Clone)]
pub struct IncomeSourceSeed {
    /// Name of the income source
    pub name: String,
    /// Amount per pay cycle as a decimal dollar string
    pub amount: String,
    /// Pay cadence: `"weekly"`, `"fortnightly"`, or `"monthly"`
    pub pay_cycle: String,
}

const PAY_CYCLES: [&str; 3] = ["weekly", "fortnightly", "monthly"];
const CATEGORIES: [&str; 3] = ["essential", "important", "discretionary"];

/// Loads seed configuration from a TOML file.
///
/// # Errors
/// Returns [`Error::Config`] if the file cannot be read, the TOML is
/// invalid, or any enumerated field holds an unknown value.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SeedConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    let config: SeedConfig = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Loads seed configuration from the default location (./config.toml).
///
/// # Errors
/// Same failure modes as [`load_config`].
pub fn load_default_config() -> Result<SeedConfig> {
    load_config("config.toml")
}

fn validate_config(config: &SeedConfig) -> Result<()> {
    if config.user_id.trim().is_empty() {
        return Err(Error::Config {
            message: "user_id cannot be empty".to_string(),
        });
    }
    for seed in &config.envelopes {
        if !CATEGORIES.contains(&seed.category.as_str()) {
            return Err(Error::Config {
                message: format!(
                    "envelope {:?} has unknown category {:?}",
                    seed.name, seed.category
                ),
            });
        }
    }
    for seed in &config.income_sources {
        if !PAY_CYCLES.contains(&seed.pay_cycle.as_str()) {
            return Err(Error::Config {
                message: format!(
                    "income source {:?} has unknown pay cycle {:?}",
                    seed.name, seed.pay_cycle
                ),
            });
        }
    }
    Ok(())
}

/// Inserts every configured envelope and income source that does not yet
/// exist (matched by name) for the configured user. Existing rows are left
/// untouched.
///
/// # Errors
/// Returns [`Error::Config`] on unparseable amounts, or a database error.
pub async fn seed_database(db: &DatabaseConnection, config: &SeedConfig) -> Result<()> {
    let mut inserted = 0usize;

    for seed in &config.envelopes {
        let existing = Envelope::find()
            .filter(EnvelopeColumn::UserId.eq(config.user_id.as_str()))
            .filter(EnvelopeColumn::Name.eq(seed.name.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            continue;
        }

        let row = envelope::ActiveModel {
            user_id: Set(config.user_id.clone()),
            name: Set(seed.name.clone()),
            category: Set(seed.category.clone()),
            target: Set(Money::parse(&seed.target)?.cents()),
            balance: Set(0),
            pay_cycle_amount: Set(Money::parse(&seed.pay_cycle_amount)?.cents()),
            is_surplus: Set(seed.is_surplus),
            is_cc_holding: Set(seed.is_cc_holding),
            is_suggested: Set(false),
            is_dismissed: Set(false),
            is_deleted: Set(false),
            ..Default::default()
        };
        row.insert(db).await?;
        inserted += 1;
    }

    for seed in &config.income_sources {
        let existing = IncomeSource::find()
            .filter(IncomeSourceColumn::UserId.eq(config.user_id.as_str()))
            .filter(IncomeSourceColumn::Name.eq(seed.name.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            continue;
        }

        let row = income_source::ActiveModel {
            user_id: Set(config.user_id.clone()),
            name: Set(seed.name.clone()),
            amount: Set(Money::parse(&seed.amount)?.cents()),
            pay_cycle: Set(seed.pay_cycle.clone()),
            is_active: Set(true),
            ..Default::default()
        };
        row.insert(db).await?;
        inserted += 1;
    }

    info!(inserted, "database seeding complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_db;

    fn sample_config() -> SeedConfig {
        toml::from_str(
            r#"
            user_id = "household"

            [[envelopes]]
            name = "Groceries"
            category = "essential"
            target = "600.00"
            pay_cycle_amount = "300.00"

            [[envelopes]]
            name = "Surplus"
            category = "discretionary"
            target = "0"
            pay_cycle_amount = "0"
            is_surplus = true

            [[income_sources]]
            name = "Payroll"
            amount = "2000.00"
            pay_cycle = "fortnightly"
        "#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_seed_config() {
        let config = sample_config();
        assert_eq!(config.user_id, "household");
        assert_eq!(config.envelopes.len(), 2);
        assert_eq!(config.envelopes[0].name, "Groceries");
        assert!(!config.envelopes[0].is_surplus);
        assert!(config.envelopes[1].is_surplus);
        assert_eq!(config.income_sources[0].pay_cycle, "fortnightly");
    }

    #[test]
    fn test_validate_rejects_unknown_category() {
        let config: SeedConfig = toml::from_str(
            r#"
            user_id = "household"

            [[envelopes]]
            name = "Groceries"
            category = "mandatory"
            target = "600.00"
            pay_cycle_amount = "300.00"
        "#,
        )
        .unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_pay_cycle() {
        let config: SeedConfig = toml::from_str(
            r#"
            user_id = "household"

            [[income_sources]]
            name = "Payroll"
            amount = "2000.00"
            pay_cycle = "daily"
        "#,
        )
        .unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_seed_database_inserts_missing_rows() -> Result<()> {
        let db = setup_test_db().await?;
        let config = sample_config();

        seed_database(&db, &config).await?;

        let envelopes = Envelope::find().all(&db).await?;
        assert_eq!(envelopes.len(), 2);
        let groceries = envelopes.iter().find(|e| e.name == "Groceries").unwrap();
        assert_eq!(groceries.target, 60_000);
        assert_eq!(groceries.pay_cycle_amount, 30_000);
        assert_eq!(groceries.balance, 0);

        let sources = IncomeSource::find().all(&db).await?;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].amount, 200_000);
        assert!(sources[0].is_active);

        Ok(())
    }

    #[tokio::test]
    async fn test_seed_database_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = sample_config();

        seed_database(&db, &config).await?;
        seed_database(&db, &config).await?;

        assert_eq!(Envelope::find().all(&db).await?.len(), 2);
        assert_eq!(IncomeSource::find().all(&db).await?.len(), 1);

        Ok(())
    }
}
