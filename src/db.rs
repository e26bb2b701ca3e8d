use std::path::Path;

use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{HarvestError, Result};
use crate::records::{ComponentRecord, FoodRecord};

pub fn connect(config: &DatabaseConfig) -> Result<Connection> {
    let target = config.connection();
    if target != ":memory:" && !target.starts_with("file:") {
        if let Some(dir) = Path::new(target).parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(target)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS food (
            id              INTEGER PRIMARY KEY,
            code            TEXT UNIQUE NOT NULL,
            name            TEXT,
            scientific_name TEXT,
            "group"         TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS food_components (
            id                      INTEGER PRIMARY KEY,
            codigo_alimento         TEXT NOT NULL REFERENCES food(code),
            componente              TEXT NOT NULL,
            unidade                 TEXT NOT NULL,
            valor_por_100g          TEXT,
            desvio_padrao           TEXT,
            valor_minimo            TEXT,
            valor_maximo            TEXT,
            numero_dados_utilizados TEXT,
            referencias             TEXT,
            tipo_de_dado            TEXT,
            created_at              TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_components_key
            ON food_components(codigo_alimento, componente, unidade);
        "#,
    )?;
    Ok(())
}

// ── Sink ──

/// Rows written vs. rows that already existed, for one save call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub inserted: usize,
    pub skipped: usize,
}

impl SaveOutcome {
    fn record(&mut self, changed: usize) {
        if changed > 0 {
            self.inserted += changed;
        } else {
            self.skipped += 1;
        }
    }
}

/// Where harvested records end up. Both saves must be idempotent.
pub trait FoodSink {
    /// Insert each food unless its code is already stored. Empty input is rejected.
    fn save_foods(&self, foods: &[FoodRecord]) -> Result<SaveOutcome>;

    /// Insert each component unless (food, component, unit) is already stored.
    fn save_components(&self, components: &[ComponentRecord]) -> Result<SaveOutcome>;
}

pub struct FoodStore {
    conn: Connection,
}

impl FoodStore {
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        Self::from_connection(connect(config)?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(FoodStore { conn })
    }

    pub fn stats(&self) -> Result<Stats> {
        get_stats(&self.conn)
    }
}

impl FoodSink for FoodStore {
    fn save_foods(&self, foods: &[FoodRecord]) -> Result<SaveOutcome> {
        if foods.is_empty() {
            return Err(HarvestError::InvalidArgument(
                "food list cannot be empty".into(),
            ));
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut outcome = SaveOutcome::default();
        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO food (code, name, scientific_name, "group")
                   VALUES (?1, ?2, ?3, ?4)
                   ON CONFLICT(code) DO NOTHING"#,
            )?;
            for f in foods {
                outcome.record(stmt.execute(params![f.code, f.name, f.scientific_name, f.group])?);
            }
        }
        tx.commit()?;
        debug!(
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "saved foods"
        );
        Ok(outcome)
    }

    fn save_components(&self, components: &[ComponentRecord]) -> Result<SaveOutcome> {
        let mut outcome = SaveOutcome::default();
        if components.is_empty() {
            return Ok(outcome);
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO food_components
                 (codigo_alimento, componente, unidade, valor_por_100g, desvio_padrao,
                  valor_minimo, valor_maximo, numero_dados_utilizados, referencias, tipo_de_dado)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(codigo_alimento, componente, unidade) DO NOTHING",
            )?;
            for c in components {
                let changed = stmt
                    .execute(params![
                        c.food_code, c.component_name, c.unit, c.value, c.std_dev,
                        c.min, c.max, c.sample_count, c.references, c.data_type,
                    ])
                    .map_err(|e| orphan_or_storage(e, &c.food_code))?;
                if changed == 0 {
                    debug!(key = ?c.key(), "component already stored");
                }
                outcome.record(changed);
            }
        }
        tx.commit()?;
        debug!(
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "saved components"
        );
        Ok(outcome)
    }
}

fn orphan_or_storage(e: rusqlite::Error, food_code: &str) -> HarvestError {
    match e {
        rusqlite::Error::SqliteFailure(ref f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            HarvestError::OrphanComponent {
                food_code: food_code.to_string(),
            }
        }
        other => other.into(),
    }
}

// ── Stats ──

pub struct Stats {
    pub foods: usize,
    pub components: usize,
    pub foods_without_components: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let foods: usize = conn.query_row("SELECT COUNT(*) FROM food", [], |r| r.get(0))?;
    let components: usize =
        conn.query_row("SELECT COUNT(*) FROM food_components", [], |r| r.get(0))?;
    let foods_without_components: usize = conn.query_row(
        "SELECT COUNT(*) FROM food f
         WHERE NOT EXISTS (SELECT 1 FROM food_components c WHERE c.codigo_alimento = f.code)",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        foods,
        components,
        foods_without_components,
    })
}

// ── Tests ──
