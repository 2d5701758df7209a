use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// --- Accounts ---

/// User
///
/// An account record from the `users` table. Roles are not stored here; they
/// live in the policy store and are resolved through the RBAC adapter.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    // Argon2id PHC string. Never rendered or serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    // 'free', 'standard' or 'premium'.
    pub subscription_tier: String,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Values needed to insert a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

// --- Collection ---

/// Gun
///
/// A firearm in an owner's collection (`guns` table). Reference ids point into
/// `reference_items` and are optional so a record survives a deleted manufacturer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Gun {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub serial_number: Option<String>,
    pub manufacturer_id: Option<i64>,
    pub caliber_id: Option<i64>,
    pub weapon_type_id: Option<i64>,
    pub acquired_on: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated gun fields, shared by create and update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GunInput {
    pub name: String,
    pub serial_number: Option<String>,
    pub manufacturer_id: Option<i64>,
    pub caliber_id: Option<i64>,
    pub weapon_type_id: Option<i64>,
    pub acquired_on: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Ammunition
///
/// A stock of cartridges in an owner's collection (`ammunition` table).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ammunition {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub manufacturer_id: Option<i64>,
    pub caliber_id: Option<i64>,
    pub casing_id: Option<i64>,
    pub quantity: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated ammunition fields, shared by create and update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmmunitionInput {
    pub name: String,
    pub manufacturer_id: Option<i64>,
    pub caliber_id: Option<i64>,
    pub casing_id: Option<i64>,
    pub quantity: i64,
    pub notes: Option<String>,
}

// --- Reference data ---

/// ReferenceKind
///
/// The four admin-managed lookup tables. They share one storage shape
/// (`reference_items`, discriminated by `kind`) and one set of CRUD handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Manufacturer,
    Caliber,
    WeaponType,
    Casing,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 4] = [
        ReferenceKind::Manufacturer,
        ReferenceKind::Caliber,
        ReferenceKind::WeaponType,
        ReferenceKind::Casing,
    ];

    /// Value stored in the `kind` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manufacturer => "manufacturer",
            Self::Caliber => "caliber",
            Self::WeaponType => "weapon_type",
            Self::Casing => "casing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// URL segment under `/admin`.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Manufacturer => "manufacturers",
            Self::Caliber => "calibers",
            Self::WeaponType => "weapon-types",
            Self::Casing => "casings",
        }
    }

    /// RBAC resource guarding this table.
    pub fn resource(self) -> &'static str {
        match self {
            Self::Manufacturer => "manufacturers",
            Self::Caliber => "calibers",
            Self::WeaponType => "weapon_types",
            Self::Casing => "casings",
        }
    }

    pub fn plural_label(self) -> &'static str {
        match self {
            Self::Manufacturer => "Manufacturers",
            Self::Caliber => "Calibers",
            Self::WeaponType => "Weapon Types",
            Self::Casing => "Casings",
        }
    }

    pub fn singular_label(self) -> &'static str {
        match self {
            Self::Manufacturer => "Manufacturer",
            Self::Caliber => "Caliber",
            Self::WeaponType => "Weapon Type",
            Self::Casing => "Casing",
        }
    }

    /// Label of the free-form `detail` column for this kind.
    pub fn detail_label(self) -> &'static str {
        match self {
            Self::Manufacturer => "Country",
            Self::Caliber => "Nickname",
            Self::WeaponType => "Nickname",
            Self::Casing => "Material",
        }
    }
}

/// ReferenceItem
///
/// One row of a lookup table (manufacturer, caliber, weapon type, casing).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ReferenceItem {
    pub id: i64,
    pub kind: String,
    pub name: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceInput {
    pub name: String,
    pub detail: Option<String>,
}

// --- Promotions & billing ---

/// Promotion
///
/// A marketing promotion shown on the pricing page while active and in range.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Promotion {
    pub id: i64,
    pub name: String,
    pub description: String,
    // 'discount' (percent off) or 'free_trial' (extra benefit days).
    pub promo_type: String,
    pub discount_percent: i32,
    pub benefit_days: i32,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Promotion {
    /// Whether the promotion should be offered on `today`.
    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.active && self.starts_on <= today && today <= self.ends_on
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionInput {
    pub name: String,
    pub description: String,
    pub promo_type: String,
    pub discount_percent: i32,
    pub benefit_days: i32,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub active: bool,
}

/// A subscription tier offered on the pricing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub tier: &'static str,
    pub label: &'static str,
    pub monthly_price_cents: u32,
    pub gun_limit: Option<u32>,
}

/// The fixed plan catalogue.
pub const PLANS: [Plan; 3] = [
    Plan { tier: "free", label: "Free", monthly_price_cents: 0, gun_limit: Some(10) },
    Plan { tier: "standard", label: "Standard", monthly_price_cents: 499, gun_limit: Some(100) },
    Plan { tier: "premium", label: "Premium", monthly_price_cents: 999, gun_limit: None },
];

pub fn plan_for(tier: &str) -> Plan {
    PLANS
        .into_iter()
        .find(|plan| plan.tier == tier)
        .unwrap_or(PLANS[0])
}

// --- Feature flags ---

/// FeatureFlag
///
/// A named toggle, optionally restricted to a set of roles. Flags are created
/// disabled and switched on from the admin UI.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct FeatureFlag {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub description: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFlagInput {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub roles: Vec<String>,
}

// --- Policy records ---

/// PolicyRule
///
/// One `p` line of the policy: `role` may perform `action` on `resource`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, FromRow)]
pub struct PolicyRule {
    pub role: String,
    pub resource: String,
    pub action: String,
}

impl PolicyRule {
    pub fn new(role: &str, resource: &str, action: &str) -> Self {
        Self {
            role: role.to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
        }
    }
}

/// RoleAssignment
///
/// One `g` line of the policy: identity `user` holds `role`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, FromRow)]
pub struct RoleAssignment {
    pub user_id: String,
    pub role: String,
}

// --- Misc ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContactMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactInput {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// AdminStats
///
/// Counters shown on the administrative dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminStats {
    pub users: i64,
    pub guns: i64,
    pub ammunition: i64,
    pub promotions: i64,
    pub feature_flags: i64,
    pub contact_messages: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_kind_round_trips_through_column_value() {
        for kind in ReferenceKind::ALL {
            assert_eq!(ReferenceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ReferenceKind::parse("weapon-types"), None);
    }

    #[test]
    fn promotion_is_current_only_inside_window() {
        let promo = Promotion {
            id: 1,
            name: "Spring".into(),
            description: String::new(),
            promo_type: "discount".into(),
            discount_percent: 20,
            benefit_days: 0,
            starts_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            ends_on: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            active: true,
            created_at: Utc::now(),
        };
        assert!(promo.is_current(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()));
        assert!(!promo.is_current(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()));

        let inactive = Promotion { active: false, ..promo };
        assert!(!inactive.is_current(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()));
    }

    #[test]
    fn unknown_tier_falls_back_to_free_plan() {
        assert_eq!(plan_for("premium").label, "Premium");
        assert_eq!(plan_for("gold").tier, "free");
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.c".into(),
            name: "A".into(),
            password_hash: "$argon2id$secret".into(),
            subscription_tier: "free".into(),
            subscription_expires_at: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
    }
}
