//! Per-page view data.
//!
//! Each page struct carries the request's [`AuthContext`] by composition plus
//! whatever that page renders. Handlers build one, hand it to exactly one
//! template function, and drop it.

use std::collections::HashMap;

use crate::auth::AuthContext;
use crate::forms::FormErrors;
use crate::metrics::ErrorMetric;
use crate::models::{
    AdminStats, Ammunition, FeatureFlag, Gun, Plan, PolicyRule, Promotion, ReferenceItem,
    ReferenceKind, RoleAssignment, User,
};
use crate::pagination::Pagination;

/// A paginated listing.
pub struct ListView<T> {
    pub auth: AuthContext,
    pub title: String,
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> ListView<T> {
    pub fn new(auth: AuthContext, title: impl Into<String>, items: Vec<T>, pagination: Pagination) -> Self {
        Self { auth, title: title.into(), items, pagination }
    }
}

/// FormView
///
/// A form page. `action` is where the form posts; `errors` is empty on the
/// first render and filled when a submission is sent back.
pub struct FormView<F> {
    pub auth: AuthContext,
    pub title: String,
    pub action: String,
    pub values: F,
    pub errors: FormErrors,
}

impl<F> FormView<F> {
    pub fn new(auth: AuthContext, title: impl Into<String>, action: impl Into<String>, values: F) -> Self {
        Self {
            auth,
            title: title.into(),
            action: action.into(),
            values,
            errors: FormErrors::new(),
        }
    }

    pub fn with_errors(mut self, errors: FormErrors) -> Self {
        self.errors = errors;
        self
    }
}

/// Choices for the reference-data dropdowns on collection forms.
#[derive(Debug, Clone, Default)]
pub struct ReferenceOptions {
    pub manufacturers: Vec<ReferenceItem>,
    pub calibers: Vec<ReferenceItem>,
    pub weapon_types: Vec<ReferenceItem>,
    pub casings: Vec<ReferenceItem>,
}

impl ReferenceOptions {
    pub fn for_kind(&self, kind: ReferenceKind) -> &[ReferenceItem] {
        match kind {
            ReferenceKind::Manufacturer => &self.manufacturers,
            ReferenceKind::Caliber => &self.calibers,
            ReferenceKind::WeaponType => &self.weapon_types,
            ReferenceKind::Casing => &self.casings,
        }
    }

    /// Display name of a referenced item, if it still exists.
    pub fn name_of(&self, kind: ReferenceKind, id: Option<i64>) -> Option<&str> {
        let id = id?;
        self.for_kind(kind)
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.name.as_str())
    }
}

pub struct GunDetailView {
    pub auth: AuthContext,
    pub gun: Gun,
    pub options: ReferenceOptions,
}

pub struct AmmunitionDetailView {
    pub auth: AuthContext,
    pub ammunition: Ammunition,
    pub options: ReferenceOptions,
}

/// Owner landing page.
pub struct DashboardView {
    pub auth: AuthContext,
    pub gun_count: i64,
    pub ammunition_count: i64,
    pub recent_guns: Vec<Gun>,
    /// Present only when the ammunition panel flag is on for this caller.
    pub ammunition_panel: Option<Vec<Ammunition>>,
    pub plan: Plan,
}

pub struct AdminDashboardView {
    pub auth: AuthContext,
    pub stats: AdminStats,
    pub policy_degraded: bool,
    pub error_total: u64,
}

pub struct UserDetailView {
    pub auth: AuthContext,
    pub user: User,
    pub roles: Vec<String>,
    pub errors: FormErrors,
}

pub struct PermissionsView {
    pub auth: AuthContext,
    pub rules: Vec<PolicyRule>,
    pub assignments: Vec<RoleAssignment>,
    /// Email per assignment identity, where the identity is a known user.
    pub emails: HashMap<String, String>,
    pub editable: bool,
    pub degraded: bool,
    pub errors: FormErrors,
}

pub struct FeatureFlagsView {
    pub auth: AuthContext,
    pub flags: Vec<FeatureFlag>,
}

pub struct ErrorMetricsView {
    pub auth: AuthContext,
    pub rows: Vec<ErrorMetric>,
    pub total: u64,
}

pub struct PricingView {
    pub auth: AuthContext,
    pub plans: Vec<Plan>,
    /// Current promotions; empty when the banner flag is off.
    pub promotions: Vec<Promotion>,
}

pub struct SubscriptionView {
    pub auth: AuthContext,
    pub plan: Plan,
    pub user: User,
}

pub struct ProfileView {
    pub auth: AuthContext,
    pub user: User,
    pub roles: Vec<String>,
    pub errors: FormErrors,
    pub name_value: String,
}

/// Home page and the other static pages only need the context.
pub struct PageView {
    pub auth: AuthContext,
}
