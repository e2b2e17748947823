//! # Unit Repository
//!
//! Database operations for the unit catalogue.
//!
//! ## Write-Time Cycle Check
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update(mg, base = mg)        → UnitCycle  (self reference)            │
//! │  update(kg, base = mg)        → UnitCycle  (mg → g → kg → mg)          │
//! │  update(in, base = ft)        → ok                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The resolver still guards every walk with a visited set, so rows that
//! were corrupted outside this repository cannot hang a conversion.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use backoffice_core::units::{dependency_order, Unit, UnitGraph, STANDARD_UNITS};
use backoffice_core::validation::{validate_code, validate_conversion_factor, validate_name};
use backoffice_core::CoreError;
use rust_decimal::Decimal;

use super::{new_id, parse_decimal};
use crate::error::{DbError, DbResult};

/// Database shape of a unit; the factor is stored as TEXT.
#[derive(Debug, sqlx::FromRow)]
struct UnitRow {
    id: String,
    code: String,
    name: String,
    base_unit_id: Option<String>,
    conversion_factor: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UnitRow> for Unit {
    type Error = DbError;

    fn try_from(row: UnitRow) -> DbResult<Self> {
        Ok(Unit {
            conversion_factor: parse_decimal("units.conversion_factor", &row.conversion_factor)?,
            id: row.id,
            code: row.code,
            name: row.name,
            base_unit_id: row.base_unit_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_UNITS: &str = r#"
    SELECT id, code, name, base_unit_id, conversion_factor, created_at, updated_at
    FROM units
"#;

/// Outcome of seeding the standard catalogue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub repaired: usize,
    pub unchanged: usize,
}

/// Repository for unit database operations.
///
/// ## Usage
/// ```rust,ignore
/// let units = db.units();
/// units.seed_standard_units().await?;
///
/// let graph = units.graph().await?;
/// let kg = graph.convert(qty, &gram_id, &kilogram_id)?;
/// ```
#[derive(Debug, Clone)]
pub struct UnitRepository {
    pool: SqlitePool,
}

impl UnitRepository {
    /// Creates a new UnitRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UnitRepository { pool }
    }

    /// Lists all units ordered by code.
    pub async fn list(&self) -> DbResult<Vec<Unit>> {
        let mut conn = self.pool.acquire().await?;
        load_units(&mut *conn).await
    }

    /// Loads the whole catalogue as a conversion graph.
    pub async fn graph(&self) -> DbResult<UnitGraph> {
        Ok(UnitGraph::new(self.list().await?))
    }

    /// Gets a unit by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Unit>> {
        let row = sqlx::query_as::<_, UnitRow>(&format!("{} WHERE id = ?1", SELECT_UNITS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Unit::try_from).transpose()
    }

    /// Gets a unit by its code ("kg").
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Unit>> {
        let row = sqlx::query_as::<_, UnitRow>(&format!("{} WHERE code = ?1", SELECT_UNITS))
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Unit::try_from).transpose()
    }

    /// Inserts a new unit.
    ///
    /// Root units are stored with factor 1.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - code already exists
    /// * `Err(DbError::Core(UnitNotFound))` - base unit does not exist
    /// * `Err(DbError::Core(UnitCycle))` - base refers back to this unit
    pub async fn insert(&self, unit: &Unit) -> DbResult<Unit> {
        debug!(code = %unit.code, "Inserting unit");

        let unit = normalized(unit)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO units (
                id, code, name, base_unit_id, conversion_factor, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&unit.id)
        .bind(&unit.code)
        .bind(&unit.name)
        .bind(&unit.base_unit_id)
        .bind(unit.conversion_factor.to_string())
        .bind(unit.created_at)
        .bind(unit.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, &unit))?;

        ensure_acyclic(&mut *tx, &unit).await?;
        tx.commit().await?;

        Ok(unit)
    }

    /// Updates code, name, base link and factor of an existing unit.
    ///
    /// The row is written before the catalogue is reloaded on the same
    /// transaction, so a concurrent relink waits on the write lock and
    /// then sees this one when it checks for a loop.
    pub async fn update(&self, unit: &Unit) -> DbResult<Unit> {
        debug!(id = %unit.id, "Updating unit");

        let mut unit = normalized(unit)?;
        unit.updated_at = Utc::now();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE units SET
                code = ?2,
                name = ?3,
                base_unit_id = ?4,
                conversion_factor = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&unit.id)
        .bind(&unit.code)
        .bind(&unit.name)
        .bind(&unit.base_unit_id)
        .bind(unit.conversion_factor.to_string())
        .bind(unit.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, &unit))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Unit", &unit.id));
        }

        ensure_acyclic(&mut *tx, &unit).await?;
        tx.commit().await?;

        Ok(unit)
    }

    /// Deletes a unit.
    ///
    /// Units derived from it become roots; items still using it as base
    /// unit block the delete with a foreign key violation.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting unit");

        let result = sqlx::query("DELETE FROM units WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Unit", id));
        }

        Ok(())
    }

    /// Creates the standard catalogue (count, weight, length, area, volume,
    /// time). Safe to run repeatedly.
    ///
    /// Existing units are left alone, except that a derived unit found
    /// without its base link gets the link and factor restored.
    pub async fn seed_standard_units(&self) -> DbResult<SeedReport> {
        info!("Seeding standard units");

        let mut tx = self.pool.begin().await?;
        let mut by_code: HashMap<String, Unit> = load_units(&mut *tx)
            .await?
            .into_iter()
            .map(|u| (u.code.clone(), u))
            .collect();

        let mut report = SeedReport::default();
        let now = Utc::now();

        for standard in dependency_order(STANDARD_UNITS) {
            let base_id = match standard.base_code {
                Some(code) => match by_code.get(code) {
                    Some(base) => Some(base.id.clone()),
                    None => {
                        warn!(unit = standard.code, base = code, "Base unit missing, skipping");
                        continue;
                    }
                },
                None => None,
            };

            match by_code.get(standard.code) {
                Some(existing) if existing.base_unit_id.is_none() && base_id.is_some() => {
                    let graph = UnitGraph::new(by_code.values().cloned().collect::<Vec<_>>());
                    if graph.would_create_cycle(&existing.id, base_id.as_deref()) {
                        warn!(
                            unit = standard.code,
                            base = ?standard.base_code,
                            "Base link would close a loop, leaving unit as a root"
                        );
                        report.unchanged += 1;
                        continue;
                    }

                    let existing_id = existing.id.clone();
                    sqlx::query(
                        "UPDATE units SET base_unit_id = ?2, conversion_factor = ?3, updated_at = ?4 WHERE id = ?1",
                    )
                    .bind(&existing_id)
                    .bind(&base_id)
                    .bind(standard.factor().to_string())
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;

                    if let Some(repaired) = by_code.get_mut(standard.code) {
                        repaired.base_unit_id = base_id;
                        repaired.conversion_factor = standard.factor();
                    }

                    debug!(code = standard.code, "Repaired base unit link");
                    report.repaired += 1;
                }
                Some(_) => report.unchanged += 1,
                None => {
                    let unit = Unit {
                        id: new_id(),
                        code: standard.code.to_string(),
                        name: standard.name.to_string(),
                        base_unit_id: base_id,
                        conversion_factor: standard.factor(),
                        created_at: now,
                        updated_at: now,
                    };

                    sqlx::query(
                        r#"
                        INSERT INTO units (
                            id, code, name, base_unit_id, conversion_factor, created_at, updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                        "#,
                    )
                    .bind(&unit.id)
                    .bind(&unit.code)
                    .bind(&unit.name)
                    .bind(&unit.base_unit_id)
                    .bind(unit.conversion_factor.to_string())
                    .bind(unit.created_at)
                    .bind(unit.updated_at)
                    .execute(&mut *tx)
                    .await?;

                    report.created += 1;
                    by_code.insert(unit.code.clone(), unit);
                }
            }
        }

        tx.commit().await?;

        info!(
            created = report.created,
            repaired = report.repaired,
            unchanged = report.unchanged,
            "Standard units seeded"
        );
        Ok(report)
    }
}

/// Field checks that need no database. Roots get factor 1.
fn normalized(unit: &Unit) -> DbResult<Unit> {
    validate_code("code", &unit.code)?;
    validate_name("name", &unit.name)?;

    let mut unit = unit.clone();
    unit.code = unit.code.trim().to_string();
    unit.name = unit.name.trim().to_string();

    match unit.base_unit_id {
        None => unit.conversion_factor = Decimal::ONE,
        Some(_) => validate_conversion_factor(unit.conversion_factor)?,
    }

    Ok(unit)
}

/// Rejects a just-written base link that closes a loop. Run on the
/// transaction holding the write so the graph includes every committed
/// link plus this one.
async fn ensure_acyclic(conn: &mut SqliteConnection, unit: &Unit) -> DbResult<()> {
    let Some(base_id) = unit.base_unit_id.as_deref() else {
        return Ok(());
    };

    let graph = UnitGraph::new(load_units(&mut *conn).await?);
    if graph.would_create_cycle(&unit.id, Some(base_id)) {
        let base = graph
            .get(base_id)
            .map(|b| b.code.clone())
            .unwrap_or_else(|| base_id.to_string());
        return Err(CoreError::UnitCycle {
            unit: unit.code.clone(),
            base,
        }
        .into());
    }

    Ok(())
}

/// Loads every unit on one connection (or open transaction).
pub(crate) async fn load_units(conn: &mut SqliteConnection) -> DbResult<Vec<Unit>> {
    let rows = sqlx::query_as::<_, UnitRow>(&format!("{} ORDER BY code", SELECT_UNITS))
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(Unit::try_from).collect()
}

/// The only unique column is `code` and the only foreign key is the base.
fn write_error(err: sqlx::Error, unit: &Unit) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("code", &unit.code),
        DbError::ForeignKeyViolation { .. } => {
            CoreError::UnitNotFound(unit.base_unit_id.clone().unwrap_or_default()).into()
        }
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::test_db;
    use backoffice_core::Quantity;
    use rust_decimal_macros::dec;

    fn unit(code: &str, base: Option<&str>, factor: Decimal) -> Unit {
        let now = Utc::now();
        Unit {
            id: new_id(),
            code: code.to_string(),
            name: code.to_uppercase(),
            base_unit_id: base.map(str::to_string),
            conversion_factor: factor,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let db = test_db().await;
        let repo = db.units();

        let kg = repo.insert(&unit("kg", None, dec!(5))).await.unwrap();
        assert_eq!(kg.conversion_factor, Decimal::ONE);

        let g = repo.insert(&unit("g", Some(&kg.id), dec!(0.001))).await.unwrap();
        let fetched = repo.get_by_code("g").await.unwrap().unwrap();
        assert_eq!(fetched.id, g.id);
        assert_eq!(fetched.conversion_factor, dec!(0.001));
        assert_eq!(fetched.base_unit_id.as_deref(), Some(kg.id.as_str()));
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = test_db().await;
        let repo = db.units();

        repo.insert(&unit("kg", None, Decimal::ONE)).await.unwrap();
        let err = repo.insert(&unit("kg", None, Decimal::ONE)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "code"));
    }

    #[tokio::test]
    async fn test_non_positive_factor_rejected() {
        let db = test_db().await;
        let repo = db.units();

        let kg = repo.insert(&unit("kg", None, Decimal::ONE)).await.unwrap();
        let err = repo.insert(&unit("g", Some(&kg.id), dec!(0))).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_rejects_cycle() {
        let db = test_db().await;
        let repo = db.units();

        let kg = repo.insert(&unit("kg", None, Decimal::ONE)).await.unwrap();
        let g = repo.insert(&unit("g", Some(&kg.id), dec!(0.001))).await.unwrap();
        let mg = repo.insert(&unit("mg", Some(&g.id), dec!(0.001))).await.unwrap();

        let mut looped = kg.clone();
        looped.base_unit_id = Some(mg.id.clone());
        looped.conversion_factor = dec!(1000000);

        let err = repo.update(&looped).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::UnitCycle { .. })));

        let mut self_ref = g.clone();
        self_ref.base_unit_id = Some(g.id.clone());
        assert!(repo.update(&self_ref).await.is_err());
    }

    #[tokio::test]
    async fn test_update_missing_unit() {
        let db = test_db().await;
        let err = db.units().update(&unit("kg", None, Decimal::ONE)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_unlinks_derived_units() {
        let db = test_db().await;
        let repo = db.units();

        let kg = repo.insert(&unit("kg", None, Decimal::ONE)).await.unwrap();
        let g = repo.insert(&unit("g", Some(&kg.id), dec!(0.001))).await.unwrap();

        repo.delete(&kg.id).await.unwrap();
        let g = repo.get_by_id(&g.id).await.unwrap().unwrap();
        assert!(g.is_root());
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let db = test_db().await;
        let repo = db.units();

        let first = repo.seed_standard_units().await.unwrap();
        assert_eq!(first.created, STANDARD_UNITS.len());

        let second = repo.seed_standard_units().await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.unchanged, STANDARD_UNITS.len());
    }

    #[tokio::test]
    async fn test_seed_repairs_missing_base_link() {
        let db = test_db().await;
        let repo = db.units();

        repo.insert(&unit("kg", None, Decimal::ONE)).await.unwrap();
        repo.insert(&unit("g", None, Decimal::ONE)).await.unwrap();

        let report = repo.seed_standard_units().await.unwrap();
        assert_eq!(report.repaired, 1);

        let graph = repo.graph().await.unwrap();
        let g = repo.get_by_code("g").await.unwrap().unwrap();
        let kg = repo.get_by_code("kg").await.unwrap().unwrap();
        assert_eq!(graph.root_of(&g.id).unwrap().id, kg.id);
    }

    #[tokio::test]
    async fn test_seeded_chains_resolve() {
        let db = test_db().await;
        let repo = db.units();
        repo.seed_standard_units().await.unwrap();

        let graph = repo.graph().await.unwrap();
        let oz = repo.get_by_code("oz").await.unwrap().unwrap();
        let kg = repo.get_by_code("kg").await.unwrap().unwrap();
        let g = repo.get_by_code("g").await.unwrap().unwrap();

        assert_eq!(graph.root_of(&oz.id).unwrap().id, kg.id);
        let converted = graph.convert(Quantity::from_whole(500), &g.id, &kg.id).unwrap();
        assert_eq!(converted, Quantity::from_raw(5000));
    }

    #[tokio::test]
    async fn test_unknown_base_rejected() {
        let db = test_db().await;
        let err = db
            .units()
            .insert(&unit("g", Some("no-such-unit"), dec!(0.001)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::UnitNotFound(ref id)) if id == "no-such-unit"));
        assert!(db.units().get_by_code("g").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_cycle_is_rolled_back() {
        let db = test_db().await;
        let repo = db.units();

        let kg = repo.insert(&unit("kg", None, Decimal::ONE)).await.unwrap();
        let g = repo.insert(&unit("g", Some(&kg.id), dec!(0.001))).await.unwrap();

        let mut looped = kg.clone();
        looped.base_unit_id = Some(g.id.clone());
        looped.conversion_factor = dec!(1000);
        assert!(repo.update(&looped).await.is_err());

        let kg = repo.get_by_id(&kg.id).await.unwrap().unwrap();
        assert!(kg.is_root());
    }

    #[tokio::test]
    async fn test_concurrent_relinks_cannot_close_a_loop() {
        use crate::pool::{Database, DbConfig};

        let path = std::env::temp_dir().join(format!("backoffice-units-{}.db", new_id()));
        let db = Database::new(DbConfig::new(path.clone()).max_connections(4))
            .await
            .unwrap();
        let repo = db.units();

        for i in 0..10 {
            let mut a = repo.insert(&unit(&format!("a{}", i), None, Decimal::ONE)).await.unwrap();
            let mut b = repo.insert(&unit(&format!("b{}", i), None, Decimal::ONE)).await.unwrap();

            a.base_unit_id = Some(b.id.clone());
            a.conversion_factor = dec!(2);
            b.base_unit_id = Some(a.id.clone());
            b.conversion_factor = dec!(2);

            let (ra, rb) = tokio::join!(repo.update(&a), repo.update(&b));
            assert!(ra.is_ok() != rb.is_ok(), "exactly one relink must commit");

            let loser = ra.err().or(rb.err()).unwrap();
            assert!(matches!(loser, DbError::Core(CoreError::UnitCycle { .. })));

            let a = repo.get_by_id(&a.id).await.unwrap().unwrap();
            let b = repo.get_by_id(&b.id).await.unwrap().unwrap();
            assert!(a.is_root() || b.is_root());
        }

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_seed_repair_skips_looping_link() {
        let db = test_db().await;
        let repo = db.units();

        // g is a root while kg hangs off it; linking g back to kg would loop.
        let g = repo.insert(&unit("g", None, Decimal::ONE)).await.unwrap();
        repo.insert(&unit("kg", Some(&g.id), dec!(1000))).await.unwrap();

        let report = repo.seed_standard_units().await.unwrap();
        assert_eq!(report.repaired, 0);

        let g = repo.get_by_code("g").await.unwrap().unwrap();
        assert!(g.is_root());
    }
}
