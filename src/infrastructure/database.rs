//! Relational sink.
//!
//! Writes two tables per run with replace semantics (drop, recreate, bulk
//! insert): the full record table named after the store label, and the dated
//! side index named `{iso date}_{label}`. Both are read back and logged
//! afterwards, a smoke-test pattern rather than a durability guarantee.
//!
//! The dialect is chosen at runtime from the connection parameters, so the
//! sink goes through sqlx's `Any` driver with sqlite and postgres installed.
//! Values are embedded as escaped literals because the two backends disagree
//! on placeholder syntax.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use std::sync::Once;
use tracing::{debug, info};

use crate::domain::record::{ProductTable, SideIndex};
use crate::infrastructure::config::DatabaseConfig;

static INSTALL_DRIVERS: Once = Once::new();

fn ensure_drivers() {
    INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Connection to the destination database.
pub struct RelationalSink {
    pool: AnyPool,
}

impl RelationalSink {
    /// Connect using discrete connection parameters.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Self::connect_url(&config.connection_url()).await
    }

    /// Connect to an explicit database URL. The pool is capped at one
    /// connection; the sink is strictly sequential anyway.
    pub async fn connect_url(url: &str) -> Result<Self> {
        ensure_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .with_context(|| format!("Failed to connect to database: {url}"))?;
        Ok(Self { pool })
    }

    /// Drop and recreate `name` with the given TEXT columns, then bulk
    /// insert the rows.
    async fn replace_table(
        &self,
        name: &str,
        columns: &[String],
        rows: Vec<Vec<String>>,
    ) -> Result<()> {
        let table = quote_ident(name);

        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to drop table {name}"))?;

        let column_defs = columns
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        sqlx::query(&format!("CREATE TABLE {table} ({column_defs})"))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to create table {name}"))?;

        for row in rows {
            let values = row
                .iter()
                .map(|v| quote_literal(v))
                .collect::<Vec<_>>()
                .join(", ");
            sqlx::query(&format!("INSERT INTO {table} VALUES ({values})"))
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to insert into {name}"))?;
        }

        Ok(())
    }

    /// Write the full record table as `{label}`, replacing any previous one.
    pub async fn write_record_table(&self, label: &str, table: &ProductTable) -> Result<()> {
        let columns: Vec<String> = ProductTable::column_names()
            .iter()
            .map(|c| (*c).to_string())
            .collect();
        let rows = table.rows().into_iter().map(Vec::from).collect();
        self.replace_table(label, &columns, rows).await?;
        info!("Wrote {} record(s) to table '{label}'", table.len());
        Ok(())
    }

    /// Write the side index as `{iso date}_{label}` with a friendly-id
    /// column and a value column named after the date. Returns the table
    /// name.
    pub async fn write_side_index(
        &self,
        label: &str,
        run_date: NaiveDate,
        index: &SideIndex,
    ) -> Result<String> {
        let table_name = format!("{run_date}_{label}");
        let columns = vec!["friendly_id".to_string(), run_date.to_string()];
        let rows = index
            .entries()
            .map(|(image, code)| vec![code.to_string(), image.to_string()])
            .collect();
        self.replace_table(&table_name, &columns, rows).await?;
        info!("Wrote {} side-index entry(ies) to table '{table_name}'", index.len());
        Ok(table_name)
    }

    /// Read an entire table back as stringly rows.
    pub async fn read_table(&self, name: &str) -> Result<Vec<Vec<Option<String>>>> {
        let rows = sqlx::query(&format!("SELECT * FROM {}", quote_ident(name)))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read back table {name}"))?;

        rows.iter()
            .map(|row| {
                (0..row.columns().len())
                    .map(|i| {
                        row.try_get::<Option<String>, _>(i)
                            .with_context(|| format!("Unreadable column {i} in {name}"))
                    })
                    .collect()
            })
            .collect()
    }

    /// Write both per-run tables, then read them back and log them.
    pub async fn publish(
        &self,
        label: &str,
        table: &ProductTable,
        index: &SideIndex,
        run_date: NaiveDate,
    ) -> Result<()> {
        self.write_record_table(label, table).await?;
        let side_name = self.write_side_index(label, run_date, index).await?;

        let records = self.read_table(label).await?;
        let side = self.read_table(&side_name).await?;
        info!(
            "Read back {} record row(s) and {} side-index row(s)",
            records.len(),
            side.len()
        );
        for row in &records {
            debug!("record row: {row:?}");
        }
        for row in &side {
            debug!("side-index row: {row:?}");
        }

        Ok(())
    }
}
