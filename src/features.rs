//! Feature flag gating.
//!
//! A [`FeatureGate`] is a read-only view over the flag table, loaded once per
//! request by the handlers that need it. All checks are pure lookups.

use std::collections::{BTreeSet, HashMap};

use crate::error::AppResult;
use crate::models::FeatureFlag;
use crate::rbac;
use crate::repository::RepositoryState;

/// Flag controlling the promotions banner on the pricing page.
pub const PROMOTIONS_BANNER: &str = "promotions_banner";
/// Flag controlling the ammunition summary panel on the owner dashboard.
pub const AMMO_DASHBOARD: &str = "ammo_dashboard";

#[derive(Debug, Clone, Default)]
pub struct FeatureGate {
    flags: HashMap<String, FeatureFlag>,
}

impl FeatureGate {
    pub fn new(flags: impl IntoIterator<Item = FeatureFlag>) -> Self {
        Self {
            flags: flags.into_iter().map(|f| (f.name.clone(), f)).collect(),
        }
    }

    /// Loads the current flag set from the repository.
    pub async fn load(repo: &RepositoryState) -> AppResult<Self> {
        Ok(Self::new(repo.list_feature_flags().await?))
    }

    /// is_feature_enabled
    ///
    /// False for unknown flags as well as disabled ones.
    pub fn is_feature_enabled(&self, name: &str) -> bool {
        self.flags.get(name).is_some_and(|f| f.enabled)
    }

    /// can_access_feature
    ///
    /// The flag must be enabled. A flag with no roles attached is open to
    /// everyone; otherwise the caller needs one of its roles, unless they are
    /// the superuser.
    pub fn can_access_feature(&self, roles: &BTreeSet<String>, name: &str) -> bool {
        let Some(flag) = self.flags.get(name) else {
            return false;
        };
        if !flag.enabled {
            return false;
        }
        flag.roles.is_empty()
            || rbac::is_superuser(roles)
            || flag.roles.iter().any(|role| roles.contains(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn flag(name: &str, enabled: bool, roles: &[&str]) -> FeatureFlag {
        FeatureFlag {
            id: 1,
            name: name.to_string(),
            enabled,
            description: String::new(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn roles(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn unknown_and_disabled_flags_are_off() {
        let gate = FeatureGate::new([flag("beta", false, &[])]);
        assert!(!gate.is_feature_enabled("beta"));
        assert!(!gate.is_feature_enabled("missing"));
        assert!(!gate.can_access_feature(&roles(&["admin"]), "beta"));
        assert!(!gate.can_access_feature(&roles(&["admin"]), "missing"));
    }

    #[test]
    fn open_flag_is_available_to_anyone() {
        let gate = FeatureGate::new([flag("beta", true, &[])]);
        assert!(gate.is_feature_enabled("beta"));
        assert!(gate.can_access_feature(&roles(&[]), "beta"));
    }

    #[test]
    fn restricted_flag_requires_a_listed_role() {
        let gate = FeatureGate::new([flag("beta", true, &["owner", "tester"])]);
        assert!(gate.can_access_feature(&roles(&["tester"]), "beta"));
        assert!(!gate.can_access_feature(&roles(&["viewer"]), "beta"));
        assert!(!gate.can_access_feature(&roles(&[]), "beta"));
    }

    #[test]
    fn superuser_passes_role_restrictions_but_not_disabled_flags() {
        let gate = FeatureGate::new([
            flag("restricted", true, &["tester"]),
            flag("off", false, &["tester"]),
        ]);
        assert!(gate.can_access_feature(&roles(&["admin"]), "restricted"));
        assert!(!gate.can_access_feature(&roles(&["admin"]), "off"));
    }
}
