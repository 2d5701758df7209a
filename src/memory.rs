//! In-memory implementation of the `Repository` trait.
//!
//! Exists for local development without a database and for tests. All state is
//! lost on restart. Each table lives behind its own `tokio::sync::RwLock`, so
//! reads proceed concurrently and writes to one table never block another.
//! Ordering and uniqueness rules mirror the Postgres schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    AdminStats, Ammunition, AmmunitionInput, ContactInput, ContactMessage, FeatureFlag,
    FeatureFlagInput, Gun, GunInput, NewUser, PolicyRule, Promotion, PromotionInput,
    ReferenceInput, ReferenceItem, ReferenceKind, RoleAssignment, User,
};
use crate::repository::Repository;

/// In-memory store. Rows are kept in insertion order; "newest first" listings
/// walk the vectors backwards.
#[derive(Default)]
pub struct InMemoryRepository {
    next_id: AtomicI64,
    users: RwLock<Vec<User>>,
    guns: RwLock<Vec<Gun>>,
    ammunition: RwLock<Vec<Ammunition>>,
    reference: RwLock<Vec<ReferenceItem>>,
    promotions: RwLock<Vec<Promotion>>,
    flags: RwLock<Vec<FeatureFlag>>,
    policy_rules: RwLock<BTreeSet<PolicyRule>>,
    role_assignments: RwLock<BTreeSet<RoleAssignment>>,
    contact_messages: RwLock<Vec<ContactMessage>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Newest-first page over an insertion-ordered slice.
fn page_newest_first<T: Clone>(items: impl DoubleEndedIterator<Item = T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .rev()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

fn page<T: Clone>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

fn sorted_by_name(mut items: Vec<ReferenceItem>) -> Vec<ReferenceItem> {
    items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    items
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- Users ---

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(AppError::Conflict(
                "An account with this email already exists.".to_string(),
            ));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            subscription_tier: "free".to_string(),
            subscription_expires_at: None,
            created_at: Utc::now(),
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn update_user_name(&self, id: Uuid, name: &str) -> AppResult<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.iter_mut().find(|u| u.id == id).map(|u| {
            u.name = name.to_string();
            u.clone()
        }))
    }

    async fn set_subscription(
        &self,
        id: Uuid,
        tier: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.iter_mut().find(|u| u.id == id).map(|u| {
            u.subscription_tier = tier.to_string();
            u.subscription_expires_at = expires_at;
            u.clone()
        }))
    }

    async fn list_users(&self, offset: i64, limit: i64) -> AppResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(page_newest_first(users.iter().cloned(), offset, limit))
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(self.users.read().await.len() as i64)
    }

    // --- Guns ---

    async fn list_guns(&self, owner_id: Uuid, offset: i64, limit: i64) -> AppResult<Vec<Gun>> {
        let guns = self.guns.read().await;
        let owned: Vec<Gun> = guns.iter().filter(|g| g.owner_id == owner_id).cloned().collect();
        Ok(page_newest_first(owned.into_iter(), offset, limit))
    }

    async fn count_guns(&self, owner_id: Uuid) -> AppResult<i64> {
        Ok(self
            .guns
            .read()
            .await
            .iter()
            .filter(|g| g.owner_id == owner_id)
            .count() as i64)
    }

    async fn get_gun(&self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Gun>> {
        Ok(self
            .guns
            .read()
            .await
            .iter()
            .find(|g| g.id == id && g.owner_id == owner_id)
            .cloned())
    }

    async fn create_gun(&self, owner_id: Uuid, input: GunInput) -> AppResult<Gun> {
        let now = Utc::now();
        let gun = Gun {
            id: Uuid::new_v4(),
            owner_id,
            name: input.name,
            serial_number: input.serial_number,
            manufacturer_id: input.manufacturer_id,
            caliber_id: input.caliber_id,
            weapon_type_id: input.weapon_type_id,
            acquired_on: input.acquired_on,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };
        self.guns.write().await.push(gun.clone());
        Ok(gun)
    }

    async fn update_gun(
        &self,
        owner_id: Uuid,
        id: Uuid,
        input: GunInput,
    ) -> AppResult<Option<Gun>> {
        let mut guns = self.guns.write().await;
        Ok(guns
            .iter_mut()
            .find(|g| g.id == id && g.owner_id == owner_id)
            .map(|g| {
                g.name = input.name;
                g.serial_number = input.serial_number;
                g.manufacturer_id = input.manufacturer_id;
                g.caliber_id = input.caliber_id;
                g.weapon_type_id = input.weapon_type_id;
                g.acquired_on = input.acquired_on;
                g.notes = input.notes;
                g.updated_at = Utc::now();
                g.clone()
            }))
    }

    async fn delete_gun(&self, owner_id: Uuid, id: Uuid) -> AppResult<bool> {
        let mut guns = self.guns.write().await;
        let before = guns.len();
        guns.retain(|g| !(g.id == id && g.owner_id == owner_id));
        Ok(guns.len() < before)
    }

    // --- Ammunition ---

    async fn list_ammunition(
        &self,
        owner_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> AppResult<Vec<Ammunition>> {
        let ammo = self.ammunition.read().await;
        let owned: Vec<Ammunition> =
            ammo.iter().filter(|a| a.owner_id == owner_id).cloned().collect();
        Ok(page_newest_first(owned.into_iter(), offset, limit))
    }

    async fn count_ammunition(&self, owner_id: Uuid) -> AppResult<i64> {
        Ok(self
            .ammunition
            .read()
            .await
            .iter()
            .filter(|a| a.owner_id == owner_id)
            .count() as i64)
    }

    async fn get_ammunition(&self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Ammunition>> {
        Ok(self
            .ammunition
            .read()
            .await
            .iter()
            .find(|a| a.id == id && a.owner_id == owner_id)
            .cloned())
    }

    async fn create_ammunition(
        &self,
        owner_id: Uuid,
        input: AmmunitionInput,
    ) -> AppResult<Ammunition> {
        let now = Utc::now();
        let ammo = Ammunition {
            id: Uuid::new_v4(),
            owner_id,
            name: input.name,
            manufacturer_id: input.manufacturer_id,
            caliber_id: input.caliber_id,
            casing_id: input.casing_id,
            quantity: input.quantity,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };
        self.ammunition.write().await.push(ammo.clone());
        Ok(ammo)
    }

    async fn update_ammunition(
        &self,
        owner_id: Uuid,
        id: Uuid,
        input: AmmunitionInput,
    ) -> AppResult<Option<Ammunition>> {
        let mut ammo = self.ammunition.write().await;
        Ok(ammo
            .iter_mut()
            .find(|a| a.id == id && a.owner_id == owner_id)
            .map(|a| {
                a.name = input.name;
                a.manufacturer_id = input.manufacturer_id;
                a.caliber_id = input.caliber_id;
                a.casing_id = input.casing_id;
                a.quantity = input.quantity;
                a.notes = input.notes;
                a.updated_at = Utc::now();
                a.clone()
            }))
    }

    async fn delete_ammunition(&self, owner_id: Uuid, id: Uuid) -> AppResult<bool> {
        let mut ammo = self.ammunition.write().await;
        let before = ammo.len();
        ammo.retain(|a| !(a.id == id && a.owner_id == owner_id));
        Ok(ammo.len() < before)
    }

    // --- Reference data ---

    async fn list_reference(
        &self,
        kind: ReferenceKind,
        offset: i64,
        limit: i64,
    ) -> AppResult<Vec<ReferenceItem>> {
        let all = self.all_reference(kind).await?;
        Ok(page(all, offset, limit))
    }

    async fn count_reference(&self, kind: ReferenceKind) -> AppResult<i64> {
        Ok(self
            .reference
            .read()
            .await
            .iter()
            .filter(|r| r.kind == kind.as_str())
            .count() as i64)
    }

    async fn all_reference(&self, kind: ReferenceKind) -> AppResult<Vec<ReferenceItem>> {
        let items = self.reference.read().await;
        Ok(sorted_by_name(
            items.iter().filter(|r| r.kind == kind.as_str()).cloned().collect(),
        ))
    }

    async fn get_reference(
        &self,
        kind: ReferenceKind,
        id: i64,
    ) -> AppResult<Option<ReferenceItem>> {
        Ok(self
            .reference
            .read()
            .await
            .iter()
            .find(|r| r.id == id && r.kind == kind.as_str())
            .cloned())
    }

    async fn create_reference(
        &self,
        kind: ReferenceKind,
        input: ReferenceInput,
    ) -> AppResult<ReferenceItem> {
        let mut items = self.reference.write().await;
        if items.iter().any(|r| r.kind == kind.as_str() && r.name == input.name) {
            return Err(AppError::Conflict(
                "An entry with this name already exists.".to_string(),
            ));
        }
        let item = ReferenceItem {
            id: self.allocate_id(),
            kind: kind.as_str().to_string(),
            name: input.name,
            detail: input.detail,
        };
        items.push(item.clone());
        Ok(item)
    }

    async fn update_reference(
        &self,
        kind: ReferenceKind,
        id: i64,
        input: ReferenceInput,
    ) -> AppResult<Option<ReferenceItem>> {
        let mut items = self.reference.write().await;
        if items
            .iter()
            .any(|r| r.kind == kind.as_str() && r.name == input.name && r.id != id)
        {
            return Err(AppError::Conflict(
                "An entry with this name already exists.".to_string(),
            ));
        }
        Ok(items
            .iter_mut()
            .find(|r| r.id == id && r.kind == kind.as_str())
            .map(|r| {
                r.name = input.name;
                r.detail = input.detail;
                r.clone()
            }))
    }

    /// delete_reference
    ///
    /// Mirrors `ON DELETE SET NULL`: collection rows pointing at the deleted
    /// item lose the reference but survive.
    async fn delete_reference(&self, kind: ReferenceKind, id: i64) -> AppResult<bool> {
        let removed = {
            let mut items = self.reference.write().await;
            let before = items.len();
            items.retain(|r| !(r.id == id && r.kind == kind.as_str()));
            items.len() < before
        };
        if removed {
            for gun in self.guns.write().await.iter_mut() {
                for slot in [&mut gun.manufacturer_id, &mut gun.caliber_id, &mut gun.weapon_type_id] {
                    if *slot == Some(id) {
                        *slot = None;
                    }
                }
            }
            for ammo in self.ammunition.write().await.iter_mut() {
                for slot in [&mut ammo.manufacturer_id, &mut ammo.caliber_id, &mut ammo.casing_id] {
                    if *slot == Some(id) {
                        *slot = None;
                    }
                }
            }
        }
        Ok(removed)
    }

    // --- Promotions ---

    async fn list_promotions(&self, offset: i64, limit: i64) -> AppResult<Vec<Promotion>> {
        let mut promos = self.promotions.read().await.clone();
        promos.sort_by(|a, b| b.starts_on.cmp(&a.starts_on).then(b.id.cmp(&a.id)));
        Ok(page(promos, offset, limit))
    }

    async fn count_promotions(&self) -> AppResult<i64> {
        Ok(self.promotions.read().await.len() as i64)
    }

    async fn get_promotion(&self, id: i64) -> AppResult<Option<Promotion>> {
        Ok(self.promotions.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn create_promotion(&self, input: PromotionInput) -> AppResult<Promotion> {
        let promo = Promotion {
            id: self.allocate_id(),
            name: input.name,
            description: input.description,
            promo_type: input.promo_type,
            discount_percent: input.discount_percent,
            benefit_days: input.benefit_days,
            starts_on: input.starts_on,
            ends_on: input.ends_on,
            active: input.active,
            created_at: Utc::now(),
        };
        self.promotions.write().await.push(promo.clone());
        Ok(promo)
    }

    async fn update_promotion(
        &self,
        id: i64,
        input: PromotionInput,
    ) -> AppResult<Option<Promotion>> {
        let mut promos = self.promotions.write().await;
        Ok(promos.iter_mut().find(|p| p.id == id).map(|p| {
            p.name = input.name;
            p.description = input.description;
            p.promo_type = input.promo_type;
            p.discount_percent = input.discount_percent;
            p.benefit_days = input.benefit_days;
            p.starts_on = input.starts_on;
            p.ends_on = input.ends_on;
            p.active = input.active;
            p.clone()
        }))
    }

    async fn delete_promotion(&self, id: i64) -> AppResult<bool> {
        let mut promos = self.promotions.write().await;
        let before = promos.len();
        promos.retain(|p| p.id != id);
        Ok(promos.len() < before)
    }

    // --- Feature flags ---

    async fn list_feature_flags(&self) -> AppResult<Vec<FeatureFlag>> {
        let mut flags = self.flags.read().await.clone();
        flags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(flags)
    }

    async fn get_feature_flag(&self, id: i64) -> AppResult<Option<FeatureFlag>> {
        Ok(self.flags.read().await.iter().find(|f| f.id == id).cloned())
    }

    async fn create_feature_flag(&self, input: FeatureFlagInput) -> AppResult<FeatureFlag> {
        let mut flags = self.flags.write().await;
        if flags.iter().any(|f| f.name == input.name) {
            return Err(AppError::Conflict(
                "A feature flag with this name already exists.".to_string(),
            ));
        }
        let now = Utc::now();
        let flag = FeatureFlag {
            id: self.allocate_id(),
            name: input.name,
            enabled: input.enabled,
            description: input.description,
            roles: input.roles,
            created_at: now,
            updated_at: now,
        };
        flags.push(flag.clone());
        Ok(flag)
    }

    async fn update_feature_flag(
        &self,
        id: i64,
        input: FeatureFlagInput,
    ) -> AppResult<Option<FeatureFlag>> {
        let mut flags = self.flags.write().await;
        if flags.iter().any(|f| f.name == input.name && f.id != id) {
            return Err(AppError::Conflict(
                "A feature flag with this name already exists.".to_string(),
            ));
        }
        Ok(flags.iter_mut().find(|f| f.id == id).map(|f| {
            f.name = input.name;
            f.enabled = input.enabled;
            f.description = input.description;
            f.roles = input.roles;
            f.updated_at = Utc::now();
            f.clone()
        }))
    }

    async fn set_feature_flag_enabled(
        &self,
        id: i64,
        enabled: bool,
    ) -> AppResult<Option<FeatureFlag>> {
        let mut flags = self.flags.write().await;
        Ok(flags.iter_mut().find(|f| f.id == id).map(|f| {
            f.enabled = enabled;
            f.updated_at = Utc::now();
            f.clone()
        }))
    }

    async fn delete_feature_flag(&self, id: i64) -> AppResult<bool> {
        let mut flags = self.flags.write().await;
        let before = flags.len();
        flags.retain(|f| f.id != id);
        Ok(flags.len() < before)
    }

    // --- Policy storage ---

    async fn list_policy_rules(&self) -> AppResult<Vec<PolicyRule>> {
        Ok(self.policy_rules.read().await.iter().cloned().collect())
    }

    async fn add_policy_rule(&self, rule: PolicyRule) -> AppResult<bool> {
        Ok(self.policy_rules.write().await.insert(rule))
    }

    async fn remove_policy_rule(&self, rule: &PolicyRule) -> AppResult<bool> {
        Ok(self.policy_rules.write().await.remove(rule))
    }

    async fn list_role_assignments(&self) -> AppResult<Vec<RoleAssignment>> {
        Ok(self.role_assignments.read().await.iter().cloned().collect())
    }

    async fn assign_role(&self, user_id: &str, role: &str) -> AppResult<bool> {
        Ok(self.role_assignments.write().await.insert(RoleAssignment {
            user_id: user_id.to_string(),
            role: role.to_string(),
        }))
    }

    async fn remove_role(&self, user_id: &str, role: &str) -> AppResult<bool> {
        Ok(self.role_assignments.write().await.remove(&RoleAssignment {
            user_id: user_id.to_string(),
            role: role.to_string(),
        }))
    }

    // --- Contact & dashboard ---

    async fn create_contact_message(&self, input: ContactInput) -> AppResult<ContactMessage> {
        let message = ContactMessage {
            id: self.allocate_id(),
            name: input.name,
            email: input.email,
            message: input.message,
            created_at: Utc::now(),
        };
        self.contact_messages.write().await.push(message.clone());
        Ok(message)
    }

    async fn admin_stats(&self) -> AppResult<AdminStats> {
        Ok(AdminStats {
            users: self.users.read().await.len() as i64,
            guns: self.guns.read().await.len() as i64,
            ammunition: self.ammunition.read().await.len() as i64,
            promotions: self.promotions.read().await.len() as i64,
            feature_flags: self.flags.read().await.len() as i64,
            contact_messages: self.contact_messages.read().await.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Tester".to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict_regardless_of_case() {
        let repo = InMemoryRepository::new();
        repo.create_user(new_user("a@example.com")).await.unwrap();
        let err = repo.create_user(new_user("A@Example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn guns_are_scoped_to_their_owner() {
        let repo = InMemoryRepository::new();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let gun = repo
            .create_gun(owner, GunInput { name: "Model 70".into(), ..GunInput::default() })
            .await
            .unwrap();

        assert!(repo.get_gun(stranger, gun.id).await.unwrap().is_none());
        assert!(!repo.delete_gun(stranger, gun.id).await.unwrap());
        assert_eq!(repo.count_guns(owner).await.unwrap(), 1);
        assert!(repo.delete_gun(owner, gun.id).await.unwrap());
        assert_eq!(repo.count_guns(owner).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn guns_list_newest_first_with_paging() {
        let repo = InMemoryRepository::new();
        let owner = Uuid::new_v4();
        for i in 0..5 {
            repo.create_gun(owner, GunInput { name: format!("gun {i}"), ..GunInput::default() })
                .await
                .unwrap();
        }
        let first_page = repo.list_guns(owner, 0, 2).await.unwrap();
        let names: Vec<_> = first_page.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["gun 4", "gun 3"]);

        let last_page = repo.list_guns(owner, 4, 2).await.unwrap();
        assert_eq!(last_page.len(), 1);
        assert_eq!(last_page[0].name, "gun 0");
    }

    #[tokio::test]
    async fn reference_names_are_unique_per_kind() {
        let repo = InMemoryRepository::new();
        let input = ReferenceInput { name: "9mm".into(), detail: None };
        repo.create_reference(ReferenceKind::Caliber, input.clone()).await.unwrap();
        let err = repo
            .create_reference(ReferenceKind::Caliber, input.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        // Same name under another kind is fine.
        repo.create_reference(ReferenceKind::Casing, input).await.unwrap();
    }

    #[tokio::test]
    async fn deleting_reference_clears_collection_links() {
        let repo = InMemoryRepository::new();
        let owner = Uuid::new_v4();
        let maker = repo
            .create_reference(
                ReferenceKind::Manufacturer,
                ReferenceInput { name: "Ruger".into(), detail: Some("USA".into()) },
            )
            .await
            .unwrap();
        let gun = repo
            .create_gun(
                owner,
                GunInput {
                    name: "10/22".into(),
                    manufacturer_id: Some(maker.id),
                    ..GunInput::default()
                },
            )
            .await
            .unwrap();

        assert!(repo.delete_reference(ReferenceKind::Manufacturer, maker.id).await.unwrap());
        let gun = repo.get_gun(owner, gun.id).await.unwrap().unwrap();
        assert_eq!(gun.manufacturer_id, None);
    }

    #[tokio::test]
    async fn policy_rules_are_a_set() {
        let repo = InMemoryRepository::new();
        let rule = PolicyRule::new("viewer", "dashboard", "read");
        assert!(repo.add_policy_rule(rule.clone()).await.unwrap());
        assert!(!repo.add_policy_rule(rule.clone()).await.unwrap());
        assert!(repo.remove_policy_rule(&rule).await.unwrap());
        assert!(repo.list_policy_rules().await.unwrap().is_empty());
    }
}
