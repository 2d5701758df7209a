use crate::error::{AppError, AppResult};
use crate::models::{
    AdminStats, Ammunition, AmmunitionInput, ContactInput, ContactMessage, FeatureFlag,
    FeatureFlagInput, Gun, GunInput, NewUser, PolicyRule, Promotion, PromotionInput,
    ReferenceInput, ReferenceItem, ReferenceKind, RoleAssignment, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers, the auth
/// middleware and the policy adapter only ever see `Arc<dyn Repository>`, so the
/// Postgres backend and the in-memory backend are interchangeable.
///
/// Owner-scoped methods take the owner id and treat a record belonging to
/// somebody else exactly like a missing one.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    // Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn update_user_name(&self, id: Uuid, name: &str) -> AppResult<Option<User>>;
    async fn set_subscription(
        &self,
        id: Uuid,
        tier: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<User>>;
    async fn list_users(&self, offset: i64, limit: i64) -> AppResult<Vec<User>>;
    async fn count_users(&self) -> AppResult<i64>;

    // --- Guns (owner-scoped) ---
    async fn list_guns(&self, owner_id: Uuid, offset: i64, limit: i64) -> AppResult<Vec<Gun>>;
    async fn count_guns(&self, owner_id: Uuid) -> AppResult<i64>;
    async fn get_gun(&self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Gun>>;
    async fn create_gun(&self, owner_id: Uuid, input: GunInput) -> AppResult<Gun>;
    async fn update_gun(&self, owner_id: Uuid, id: Uuid, input: GunInput)
    -> AppResult<Option<Gun>>;
    async fn delete_gun(&self, owner_id: Uuid, id: Uuid) -> AppResult<bool>;

    // --- Ammunition (owner-scoped) ---
    async fn list_ammunition(
        &self,
        owner_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> AppResult<Vec<Ammunition>>;
    async fn count_ammunition(&self, owner_id: Uuid) -> AppResult<i64>;
    async fn get_ammunition(&self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Ammunition>>;
    async fn create_ammunition(
        &self,
        owner_id: Uuid,
        input: AmmunitionInput,
    ) -> AppResult<Ammunition>;
    async fn update_ammunition(
        &self,
        owner_id: Uuid,
        id: Uuid,
        input: AmmunitionInput,
    ) -> AppResult<Option<Ammunition>>;
    async fn delete_ammunition(&self, owner_id: Uuid, id: Uuid) -> AppResult<bool>;

    // --- Reference data ---
    async fn list_reference(
        &self,
        kind: ReferenceKind,
        offset: i64,
        limit: i64,
    ) -> AppResult<Vec<ReferenceItem>>;
    async fn count_reference(&self, kind: ReferenceKind) -> AppResult<i64>;
    // Every item of a kind, ordered by name. Used to populate form selects.
    async fn all_reference(&self, kind: ReferenceKind) -> AppResult<Vec<ReferenceItem>>;
    async fn get_reference(&self, kind: ReferenceKind, id: i64)
    -> AppResult<Option<ReferenceItem>>;
    // Names are unique per kind; a duplicate is a `Conflict`.
    async fn create_reference(
        &self,
        kind: ReferenceKind,
        input: ReferenceInput,
    ) -> AppResult<ReferenceItem>;
    async fn update_reference(
        &self,
        kind: ReferenceKind,
        id: i64,
        input: ReferenceInput,
    ) -> AppResult<Option<ReferenceItem>>;
    async fn delete_reference(&self, kind: ReferenceKind, id: i64) -> AppResult<bool>;

    // --- Promotions ---
    async fn list_promotions(&self, offset: i64, limit: i64) -> AppResult<Vec<Promotion>>;
    async fn count_promotions(&self) -> AppResult<i64>;
    async fn get_promotion(&self, id: i64) -> AppResult<Option<Promotion>>;
    async fn create_promotion(&self, input: PromotionInput) -> AppResult<Promotion>;
    async fn update_promotion(&self, id: i64, input: PromotionInput)
    -> AppResult<Option<Promotion>>;
    async fn delete_promotion(&self, id: i64) -> AppResult<bool>;

    // --- Feature flags ---
    async fn list_feature_flags(&self) -> AppResult<Vec<FeatureFlag>>;
    async fn get_feature_flag(&self, id: i64) -> AppResult<Option<FeatureFlag>>;
    // Flag names are unique; a duplicate is a `Conflict`.
    async fn create_feature_flag(&self, input: FeatureFlagInput) -> AppResult<FeatureFlag>;
    async fn update_feature_flag(
        &self,
        id: i64,
        input: FeatureFlagInput,
    ) -> AppResult<Option<FeatureFlag>>;
    async fn set_feature_flag_enabled(&self, id: i64, enabled: bool)
    -> AppResult<Option<FeatureFlag>>;
    async fn delete_feature_flag(&self, id: i64) -> AppResult<bool>;

    // --- Policy storage (database-backed policy source) ---
    async fn list_policy_rules(&self) -> AppResult<Vec<PolicyRule>>;
    // Returns false when the rule already existed.
    async fn add_policy_rule(&self, rule: PolicyRule) -> AppResult<bool>;
    async fn remove_policy_rule(&self, rule: &PolicyRule) -> AppResult<bool>;
    async fn list_role_assignments(&self) -> AppResult<Vec<RoleAssignment>>;
    // Returns false when the assignment already existed.
    async fn assign_role(&self, user_id: &str, role: &str) -> AppResult<bool>;
    async fn remove_role(&self, user_id: &str, role: &str) -> AppResult<bool>;

    // --- Contact & dashboard ---
    async fn create_contact_message(&self, input: ContactInput) -> AppResult<ContactMessage>;
    async fn admin_stats(&self) -> AppResult<AdminStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Queries are checked at runtime so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a unique-constraint violation to `Conflict`, everything else to `Database`.
fn unique_violation(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(err),
    }
}

const USER_COLUMNS: &str =
    "id, email, name, password_hash, subscription_tier, subscription_expires_at, created_at";
const GUN_COLUMNS: &str = "id, owner_id, name, serial_number, manufacturer_id, caliber_id, \
     weapon_type_id, acquired_on, notes, created_at, updated_at";
const AMMO_COLUMNS: &str = "id, owner_id, name, manufacturer_id, caliber_id, casing_id, \
     quantity, notes, created_at, updated_at";
const PROMO_COLUMNS: &str = "id, name, description, promo_type, discount_percent, benefit_days, \
     starts_on, ends_on, active, created_at";
const FLAG_COLUMNS: &str = "id, name, enabled, description, roles, created_at, updated_at";

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// create_user
    ///
    /// New accounts start on the free tier. The unique index on `lower(email)`
    /// turns a duplicate registration into a `Conflict`.
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let sql = format!(
            "INSERT INTO users (id, email, name, password_hash, subscription_tier, created_at) \
             VALUES ($1, $2, $3, $4, 'free', NOW()) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "An account with this email already exists."))
    }

    async fn update_user_name(&self, id: Uuid, name: &str) -> AppResult<Option<User>> {
        let sql = format!("UPDATE users SET name = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_subscription(
        &self,
        id: Uuid,
        tier: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET subscription_tier = $2, subscription_expires_at = $3 \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(tier)
            .bind(expires_at)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self, offset: i64, limit: i64) -> AppResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, email OFFSET $1 LIMIT $2"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }

    // --- GUNS ---

    async fn list_guns(&self, owner_id: Uuid, offset: i64, limit: i64) -> AppResult<Vec<Gun>> {
        let sql = format!(
            "SELECT {GUN_COLUMNS} FROM guns WHERE owner_id = $1 \
             ORDER BY created_at DESC OFFSET $2 LIMIT $3"
        );
        Ok(sqlx::query_as::<_, Gun>(&sql)
            .bind(owner_id)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_guns(&self, owner_id: Uuid) -> AppResult<i64> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM guns WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn get_gun(&self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Gun>> {
        let sql = format!("SELECT {GUN_COLUMNS} FROM guns WHERE id = $1 AND owner_id = $2");
        Ok(sqlx::query_as::<_, Gun>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_gun(&self, owner_id: Uuid, input: GunInput) -> AppResult<Gun> {
        let sql = format!(
            "INSERT INTO guns (id, owner_id, name, serial_number, manufacturer_id, caliber_id, \
             weapon_type_id, acquired_on, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) RETURNING {GUN_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Gun>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner_id)
            .bind(&input.name)
            .bind(&input.serial_number)
            .bind(input.manufacturer_id)
            .bind(input.caliber_id)
            .bind(input.weapon_type_id)
            .bind(input.acquired_on)
            .bind(&input.notes)
            .fetch_one(&self.pool)
            .await?)
    }

    /// update_gun
    ///
    /// Full replacement of the editable fields. The `owner_id` predicate makes
    /// another owner's gun indistinguishable from a missing one.
    async fn update_gun(
        &self,
        owner_id: Uuid,
        id: Uuid,
        input: GunInput,
    ) -> AppResult<Option<Gun>> {
        let sql = format!(
            "UPDATE guns SET name = $3, serial_number = $4, manufacturer_id = $5, \
             caliber_id = $6, weapon_type_id = $7, acquired_on = $8, notes = $9, \
             updated_at = NOW() WHERE id = $1 AND owner_id = $2 RETURNING {GUN_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Gun>(&sql)
            .bind(id)
            .bind(owner_id)
            .bind(&input.name)
            .bind(&input.serial_number)
            .bind(input.manufacturer_id)
            .bind(input.caliber_id)
            .bind(input.weapon_type_id)
            .bind(input.acquired_on)
            .bind(&input.notes)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_gun(&self, owner_id: Uuid, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM guns WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- AMMUNITION ---

    async fn list_ammunition(
        &self,
        owner_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> AppResult<Vec<Ammunition>> {
        let sql = format!(
            "SELECT {AMMO_COLUMNS} FROM ammunition WHERE owner_id = $1 \
             ORDER BY created_at DESC OFFSET $2 LIMIT $3"
        );
        Ok(sqlx::query_as::<_, Ammunition>(&sql)
            .bind(owner_id)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_ammunition(&self, owner_id: Uuid) -> AppResult<i64> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ammunition WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn get_ammunition(&self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Ammunition>> {
        let sql =
            format!("SELECT {AMMO_COLUMNS} FROM ammunition WHERE id = $1 AND owner_id = $2");
        Ok(sqlx::query_as::<_, Ammunition>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_ammunition(
        &self,
        owner_id: Uuid,
        input: AmmunitionInput,
    ) -> AppResult<Ammunition> {
        let sql = format!(
            "INSERT INTO ammunition (id, owner_id, name, manufacturer_id, caliber_id, casing_id, \
             quantity, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) RETURNING {AMMO_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Ammunition>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner_id)
            .bind(&input.name)
            .bind(input.manufacturer_id)
            .bind(input.caliber_id)
            .bind(input.casing_id)
            .bind(input.quantity)
            .bind(&input.notes)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_ammunition(
        &self,
        owner_id: Uuid,
        id: Uuid,
        input: AmmunitionInput,
    ) -> AppResult<Option<Ammunition>> {
        let sql = format!(
            "UPDATE ammunition SET name = $3, manufacturer_id = $4, caliber_id = $5, \
             casing_id = $6, quantity = $7, notes = $8, updated_at = NOW() \
             WHERE id = $1 AND owner_id = $2 RETURNING {AMMO_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Ammunition>(&sql)
            .bind(id)
            .bind(owner_id)
            .bind(&input.name)
            .bind(input.manufacturer_id)
            .bind(input.caliber_id)
            .bind(input.casing_id)
            .bind(input.quantity)
            .bind(&input.notes)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_ammunition(&self, owner_id: Uuid, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM ammunition WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- REFERENCE DATA ---

    async fn list_reference(
        &self,
        kind: ReferenceKind,
        offset: i64,
        limit: i64,
    ) -> AppResult<Vec<ReferenceItem>> {
        Ok(sqlx::query_as::<_, ReferenceItem>(
            "SELECT id, kind, name, detail FROM reference_items WHERE kind = $1 \
             ORDER BY name OFFSET $2 LIMIT $3",
        )
        .bind(kind.as_str())
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_reference(&self, kind: ReferenceKind) -> AppResult<i64> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reference_items WHERE kind = $1")
                .bind(kind.as_str())
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn all_reference(&self, kind: ReferenceKind) -> AppResult<Vec<ReferenceItem>> {
        Ok(sqlx::query_as::<_, ReferenceItem>(
            "SELECT id, kind, name, detail FROM reference_items WHERE kind = $1 ORDER BY name",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_reference(
        &self,
        kind: ReferenceKind,
        id: i64,
    ) -> AppResult<Option<ReferenceItem>> {
        Ok(sqlx::query_as::<_, ReferenceItem>(
            "SELECT id, kind, name, detail FROM reference_items WHERE kind = $1 AND id = $2",
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_reference(
        &self,
        kind: ReferenceKind,
        input: ReferenceInput,
    ) -> AppResult<ReferenceItem> {
        sqlx::query_as::<_, ReferenceItem>(
            "INSERT INTO reference_items (kind, name, detail) VALUES ($1, $2, $3) \
             RETURNING id, kind, name, detail",
        )
        .bind(kind.as_str())
        .bind(&input.name)
        .bind(&input.detail)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "An entry with this name already exists."))
    }

    async fn update_reference(
        &self,
        kind: ReferenceKind,
        id: i64,
        input: ReferenceInput,
    ) -> AppResult<Option<ReferenceItem>> {
        sqlx::query_as::<_, ReferenceItem>(
            "UPDATE reference_items SET name = $3, detail = $4 WHERE kind = $1 AND id = $2 \
             RETURNING id, kind, name, detail",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(&input.name)
        .bind(&input.detail)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "An entry with this name already exists."))
    }

    async fn delete_reference(&self, kind: ReferenceKind, id: i64) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM reference_items WHERE kind = $1 AND id = $2")
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- PROMOTIONS ---

    async fn list_promotions(&self, offset: i64, limit: i64) -> AppResult<Vec<Promotion>> {
        let sql = format!(
            "SELECT {PROMO_COLUMNS} FROM promotions ORDER BY starts_on DESC, id DESC \
             OFFSET $1 LIMIT $2"
        );
        Ok(sqlx::query_as::<_, Promotion>(&sql)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_promotions(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM promotions")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_promotion(&self, id: i64) -> AppResult<Option<Promotion>> {
        let sql = format!("SELECT {PROMO_COLUMNS} FROM promotions WHERE id = $1");
        Ok(sqlx::query_as::<_, Promotion>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_promotion(&self, input: PromotionInput) -> AppResult<Promotion> {
        let sql = format!(
            "INSERT INTO promotions (name, description, promo_type, discount_percent, \
             benefit_days, starts_on, ends_on, active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW()) RETURNING {PROMO_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Promotion>(&sql)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.promo_type)
            .bind(input.discount_percent)
            .bind(input.benefit_days)
            .bind(input.starts_on)
            .bind(input.ends_on)
            .bind(input.active)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_promotion(
        &self,
        id: i64,
        input: PromotionInput,
    ) -> AppResult<Option<Promotion>> {
        let sql = format!(
            "UPDATE promotions SET name = $2, description = $3, promo_type = $4, \
             discount_percent = $5, benefit_days = $6, starts_on = $7, ends_on = $8, \
             active = $9 WHERE id = $1 RETURNING {PROMO_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Promotion>(&sql)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.promo_type)
            .bind(input.discount_percent)
            .bind(input.benefit_days)
            .bind(input.starts_on)
            .bind(input.ends_on)
            .bind(input.active)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_promotion(&self, id: i64) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM promotions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- FEATURE FLAGS ---

    async fn list_feature_flags(&self) -> AppResult<Vec<FeatureFlag>> {
        let sql = format!("SELECT {FLAG_COLUMNS} FROM feature_flags ORDER BY name");
        Ok(sqlx::query_as::<_, FeatureFlag>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_feature_flag(&self, id: i64) -> AppResult<Option<FeatureFlag>> {
        let sql = format!("SELECT {FLAG_COLUMNS} FROM feature_flags WHERE id = $1");
        Ok(sqlx::query_as::<_, FeatureFlag>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_feature_flag(&self, input: FeatureFlagInput) -> AppResult<FeatureFlag> {
        let sql = format!(
            "INSERT INTO feature_flags (name, enabled, description, roles, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING {FLAG_COLUMNS}"
        );
        sqlx::query_as::<_, FeatureFlag>(&sql)
            .bind(&input.name)
            .bind(input.enabled)
            .bind(&input.description)
            .bind(&input.roles)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "A feature flag with this name already exists."))
    }

    async fn update_feature_flag(
        &self,
        id: i64,
        input: FeatureFlagInput,
    ) -> AppResult<Option<FeatureFlag>> {
        let sql = format!(
            "UPDATE feature_flags SET name = $2, enabled = $3, description = $4, roles = $5, \
             updated_at = NOW() WHERE id = $1 RETURNING {FLAG_COLUMNS}"
        );
        sqlx::query_as::<_, FeatureFlag>(&sql)
            .bind(id)
            .bind(&input.name)
            .bind(input.enabled)
            .bind(&input.description)
            .bind(&input.roles)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "A feature flag with this name already exists."))
    }

    async fn set_feature_flag_enabled(
        &self,
        id: i64,
        enabled: bool,
    ) -> AppResult<Option<FeatureFlag>> {
        let sql = format!(
            "UPDATE feature_flags SET enabled = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {FLAG_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, FeatureFlag>(&sql)
            .bind(id)
            .bind(enabled)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_feature_flag(&self, id: i64) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM feature_flags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- POLICY STORAGE ---

    async fn list_policy_rules(&self) -> AppResult<Vec<PolicyRule>> {
        Ok(sqlx::query_as::<_, PolicyRule>(
            "SELECT role, resource, action FROM policy_rules ORDER BY role, resource, action",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn add_policy_rule(&self, rule: PolicyRule) -> AppResult<bool> {
        let res = sqlx::query(
            "INSERT INTO policy_rules (role, resource, action) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(&rule.role)
        .bind(&rule.resource)
        .bind(&rule.action)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn remove_policy_rule(&self, rule: &PolicyRule) -> AppResult<bool> {
        let res = sqlx::query(
            "DELETE FROM policy_rules WHERE role = $1 AND resource = $2 AND action = $3",
        )
        .bind(&rule.role)
        .bind(&rule.resource)
        .bind(&rule.action)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_role_assignments(&self) -> AppResult<Vec<RoleAssignment>> {
        Ok(sqlx::query_as::<_, RoleAssignment>(
            "SELECT user_id, role FROM role_assignments ORDER BY user_id, role",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn assign_role(&self, user_id: &str, role: &str) -> AppResult<bool> {
        let res = sqlx::query(
            "INSERT INTO role_assignments (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn remove_role(&self, user_id: &str, role: &str) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM role_assignments WHERE user_id = $1 AND role = $2")
            .bind(user_id)
            .bind(role)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- CONTACT & DASHBOARD ---

    async fn create_contact_message(&self, input: ContactInput) -> AppResult<ContactMessage> {
        Ok(sqlx::query_as::<_, ContactMessage>(
            "INSERT INTO contact_messages (name, email, message, created_at) \
             VALUES ($1, $2, $3, NOW()) RETURNING id, name, email, message, created_at",
        )
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.message)
        .fetch_one(&self.pool)
        .await?)
    }

    /// admin_stats
    ///
    /// Compiles all dashboard counters in a single round trip.
    async fn admin_stats(&self) -> AppResult<AdminStats> {
        let row: (i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            "SELECT \
               (SELECT COUNT(*) FROM users), \
               (SELECT COUNT(*) FROM guns), \
               (SELECT COUNT(*) FROM ammunition), \
               (SELECT COUNT(*) FROM promotions), \
               (SELECT COUNT(*) FROM feature_flags), \
               (SELECT COUNT(*) FROM contact_messages)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(AdminStats {
            users: row.0,
            guns: row.1,
            ammunition: row.2,
            promotions: row.3,
            feature_flags: row.4,
            contact_messages: row.5,
        })
    }
}
