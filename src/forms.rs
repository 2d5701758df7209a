//! Submitted HTML forms and their validation.
//!
//! Every form keeps the raw submitted strings so a failed submission can be
//! re-rendered exactly as typed. `validate` turns a form into the typed input
//! the repository expects, or into a [`FormErrors`] keyed by field name.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::models::{
    AmmunitionInput, ContactInput, FeatureFlag, FeatureFlagInput, Gun, GunInput, PolicyRule,
    Promotion, PromotionInput, ReferenceInput, ReferenceItem, Ammunition,
};

pub const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 100;
const MAX_SERIAL_LEN: usize = 64;
const MAX_FLAG_NAME_LEN: usize = 64;

/// FormErrors
///
/// Field name to message, in the order the problems were found. Only the
/// first message per field is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    entries: Vec<(String, String)>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        if self.get(field).is_none() {
            self.entries.push((field.to_string(), message.into()));
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, message)| message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(f, m)| (f.as_str(), m.as_str()))
    }

    pub fn merge(&mut self, other: FormErrors) {
        for (field, message) in other.entries {
            self.add(&field, message);
        }
    }

    fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

// --- Field helpers ---

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn required(errors: &mut FormErrors, field: &str, value: &str, max: usize) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, "This field is required.");
    } else if trimmed.chars().count() > max {
        errors.add(field, format!("Must be at most {max} characters."));
    }
    trimmed.to_string()
}

fn optional_id(errors: &mut FormErrors, field: &str, value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<i64>() {
        Ok(id) if id > 0 => Some(id),
        _ => {
            errors.add(field, "Choose a value from the list.");
            None
        }
    }
}

fn parse_date(errors: &mut FormErrors, field: &str, value: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(field, "Use the format YYYY-MM-DD.");
            None
        }
    }
}

fn checked(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty() && v != "false" && v != "off")
}

fn is_identifier(value: &str, extra: &[char]) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || extra.contains(&c))
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// --- Accounts ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

impl RegisterForm {
    /// Everything except "email already taken", which needs the repository.
    pub fn validate(&self) -> Result<(String, String), FormErrors> {
        let mut errors = FormErrors::new();
        let name = required(&mut errors, "name", &self.name, MAX_NAME_LEN);
        let email = self.email.trim().to_lowercase();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            errors.add("email", "Enter a valid email address.");
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.add(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LEN} characters."),
            );
        }
        if self.password != self.password_confirmation {
            errors.add("password_confirmation", "Passwords do not match.");
        }
        errors.into_result((name, email))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub name: String,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let name = required(&mut errors, "name", &self.name, MAX_NAME_LEN);
        errors.into_result(name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactForm {
    pub fn validate(&self) -> Result<ContactInput, FormErrors> {
        let mut errors = FormErrors::new();
        let name = required(&mut errors, "name", &self.name, MAX_NAME_LEN);
        let email = self.email.trim().to_string();
        if !email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }
        let message = required(&mut errors, "message", &self.message, 5000);
        errors.into_result(ContactInput { name, email, message })
    }
}

// --- Collection ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GunForm {
    pub name: String,
    pub serial_number: String,
    pub manufacturer_id: String,
    pub caliber_id: String,
    pub weapon_type_id: String,
    pub acquired_on: String,
    pub notes: String,
}

impl GunForm {
    pub fn from_gun(gun: &Gun) -> Self {
        Self {
            name: gun.name.clone(),
            serial_number: gun.serial_number.clone().unwrap_or_default(),
            manufacturer_id: opt_to_string(gun.manufacturer_id),
            caliber_id: opt_to_string(gun.caliber_id),
            weapon_type_id: opt_to_string(gun.weapon_type_id),
            acquired_on: opt_to_string(gun.acquired_on),
            notes: gun.notes.clone().unwrap_or_default(),
        }
    }

    /// Shape checks only; the handler confirms referenced ids exist.
    pub fn validate(&self) -> Result<GunInput, FormErrors> {
        let mut errors = FormErrors::new();
        let name = required(&mut errors, "name", &self.name, MAX_NAME_LEN);
        let serial_number = optional(&self.serial_number);
        if serial_number.as_ref().is_some_and(|s| s.chars().count() > MAX_SERIAL_LEN) {
            errors.add("serial_number", format!("Must be at most {MAX_SERIAL_LEN} characters."));
        }
        let manufacturer_id = optional_id(&mut errors, "manufacturer_id", &self.manufacturer_id);
        let caliber_id = optional_id(&mut errors, "caliber_id", &self.caliber_id);
        let weapon_type_id = optional_id(&mut errors, "weapon_type_id", &self.weapon_type_id);
        let acquired_on = if self.acquired_on.trim().is_empty() {
            None
        } else {
            parse_date(&mut errors, "acquired_on", &self.acquired_on)
        };
        errors.into_result(GunInput {
            name,
            serial_number,
            manufacturer_id,
            caliber_id,
            weapon_type_id,
            acquired_on,
            notes: optional(&self.notes),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AmmunitionForm {
    pub name: String,
    pub manufacturer_id: String,
    pub caliber_id: String,
    pub casing_id: String,
    pub quantity: String,
    pub notes: String,
}

impl AmmunitionForm {
    pub fn from_ammunition(ammo: &Ammunition) -> Self {
        Self {
            name: ammo.name.clone(),
            manufacturer_id: opt_to_string(ammo.manufacturer_id),
            caliber_id: opt_to_string(ammo.caliber_id),
            casing_id: opt_to_string(ammo.casing_id),
            quantity: ammo.quantity.to_string(),
            notes: ammo.notes.clone().unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<AmmunitionInput, FormErrors> {
        let mut errors = FormErrors::new();
        let name = required(&mut errors, "name", &self.name, MAX_NAME_LEN);
        let manufacturer_id = optional_id(&mut errors, "manufacturer_id", &self.manufacturer_id);
        let caliber_id = optional_id(&mut errors, "caliber_id", &self.caliber_id);
        let casing_id = optional_id(&mut errors, "casing_id", &self.casing_id);
        let quantity = match self.quantity.trim().parse::<i64>() {
            Ok(count) if count >= 0 => count,
            Ok(_) => {
                errors.add("quantity", "Count cannot be negative.");
                0
            }
            Err(_) => {
                errors.add("quantity", "Enter a whole number.");
                0
            }
        };
        errors.into_result(AmmunitionInput {
            name,
            manufacturer_id,
            caliber_id,
            casing_id,
            quantity,
            notes: optional(&self.notes),
        })
    }
}

// --- Admin ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReferenceForm {
    pub name: String,
    pub detail: String,
}

impl ReferenceForm {
    pub fn from_item(item: &ReferenceItem) -> Self {
        Self {
            name: item.name.clone(),
            detail: item.detail.clone().unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<ReferenceInput, FormErrors> {
        let mut errors = FormErrors::new();
        let name = required(&mut errors, "name", &self.name, MAX_NAME_LEN);
        errors.into_result(ReferenceInput { name, detail: optional(&self.detail) })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromotionForm {
    pub name: String,
    pub description: String,
    pub promo_type: String,
    pub discount_percent: String,
    pub benefit_days: String,
    pub starts_on: String,
    pub ends_on: String,
    pub active: Option<String>,
}

impl PromotionForm {
    pub fn from_promotion(promo: &Promotion) -> Self {
        Self {
            name: promo.name.clone(),
            description: promo.description.clone(),
            promo_type: promo.promo_type.clone(),
            discount_percent: promo.discount_percent.to_string(),
            benefit_days: promo.benefit_days.to_string(),
            starts_on: promo.starts_on.to_string(),
            ends_on: promo.ends_on.to_string(),
            active: promo.active.then(|| "on".to_string()),
        }
    }

    pub fn is_active(&self) -> bool {
        checked(&self.active)
    }

    pub fn validate(&self) -> Result<PromotionInput, FormErrors> {
        let mut errors = FormErrors::new();
        let name = required(&mut errors, "name", &self.name, MAX_NAME_LEN);
        let promo_type = match self.promo_type.trim() {
            "" | "discount" => "discount".to_string(),
            "free_trial" => "free_trial".to_string(),
            _ => {
                errors.add("promo_type", "Choose discount or free trial.");
                String::new()
            }
        };
        let discount_percent = match self.discount_percent.trim() {
            "" => 0,
            raw => match raw.parse::<i32>() {
                Ok(pct) if (0..=100).contains(&pct) => pct,
                _ => {
                    errors.add("discount_percent", "Discount must be between 0 and 100.");
                    0
                }
            },
        };
        let benefit_days = match self.benefit_days.trim() {
            "" => 0,
            raw => match raw.parse::<i32>() {
                Ok(days) if days >= 0 => days,
                _ => {
                    errors.add("benefit_days", "Benefit days cannot be negative.");
                    0
                }
            },
        };
        let starts_on = parse_date(&mut errors, "starts_on", &self.starts_on);
        let ends_on = parse_date(&mut errors, "ends_on", &self.ends_on);
        if let (Some(start), Some(end)) = (starts_on, ends_on) {
            if start > end {
                errors.add("ends_on", "End date must not be before the start date.");
            }
        }

        match (starts_on, ends_on) {
            (Some(starts_on), Some(ends_on)) if errors.is_empty() => Ok(PromotionInput {
                name,
                description: self.description.trim().to_string(),
                promo_type,
                discount_percent,
                benefit_days,
                starts_on,
                ends_on,
                active: self.is_active(),
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeatureFlagForm {
    pub name: String,
    pub description: String,
    /// Comma-separated role names.
    pub roles: String,
    pub enabled: Option<String>,
}

impl FeatureFlagForm {
    pub fn from_flag(flag: &FeatureFlag) -> Self {
        Self {
            name: flag.name.clone(),
            description: flag.description.clone(),
            roles: flag.roles.join(", "),
            enabled: flag.enabled.then(|| "on".to_string()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        checked(&self.enabled)
    }

    /// validate
    ///
    /// The `enabled` checkbox is honoured as submitted; the create handler
    /// overrides it so new flags always start disabled.
    pub fn validate(&self) -> Result<FeatureFlagInput, FormErrors> {
        let mut errors = FormErrors::new();
        let name = self.name.trim().to_string();
        if name.is_empty() {
            errors.add("name", "This field is required.");
        } else if name.len() > MAX_FLAG_NAME_LEN {
            errors.add("name", format!("Must be at most {MAX_FLAG_NAME_LEN} characters."));
        } else if !is_identifier(&name, &[]) {
            errors.add("name", "Use lowercase letters, digits and underscores only.");
        }

        let mut roles: Vec<String> = Vec::new();
        for role in self.roles.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            if !is_identifier(role, &['-']) {
                errors.add("roles", format!("'{role}' is not a valid role name."));
            } else if !roles.iter().any(|r| r == role) {
                roles.push(role.to_string());
            }
        }

        errors.into_result(FeatureFlagInput {
            name,
            description: self.description.trim().to_string(),
            enabled: self.is_enabled(),
            roles,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyForm {
    pub role: String,
    pub resource: String,
    pub action: String,
}

impl PolicyForm {
    pub fn validate(&self) -> Result<PolicyRule, FormErrors> {
        let mut errors = FormErrors::new();
        let check = |errors: &mut FormErrors, field: &str, value: &str| {
            if !is_identifier(value, &['*', '-']) {
                errors.add(field, "Use lowercase letters, digits, '_', '-' or '*'.");
            }
        };
        let (role, resource, action) =
            (self.role.trim(), self.resource.trim(), self.action.trim());
        check(&mut errors, "role", role);
        check(&mut errors, "resource", resource);
        check(&mut errors, "action", action);
        errors.into_result(PolicyRule::new(role, resource, action))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoleForm {
    pub role: String,
}

impl RoleForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let role = self.role.trim();
        if !is_identifier(role, &['-']) {
            errors.add("role", "Use lowercase letters, digits, '_' or '-'.");
        }
        errors.into_result(role.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rules() {
        let form = RegisterForm {
            name: "Sam".into(),
            email: "not-an-email".into(),
            password: "short".into(),
            password_confirmation: "different".into(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.get("email").is_some());
        assert!(errors.get("password").is_some());
        assert!(errors.get("password_confirmation").is_some());

        let form = RegisterForm {
            name: "Sam".into(),
            email: " Sam@Example.com ".into(),
            password: "long enough".into(),
            password_confirmation: "long enough".into(),
        };
        assert_eq!(form.validate().unwrap(), ("Sam".to_string(), "sam@example.com".to_string()));
    }

    #[test]
    fn gun_form_checks_lengths_and_date() {
        let form = GunForm {
            name: "x".repeat(101),
            serial_number: "s".repeat(65),
            acquired_on: "12/05/2020".into(),
            ..GunForm::default()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 3);

        let form = GunForm {
            name: "Glock 19".into(),
            manufacturer_id: "3".into(),
            acquired_on: "2020-05-12".into(),
            ..GunForm::default()
        };
        let input = form.validate().unwrap();
        assert_eq!(input.manufacturer_id, Some(3));
        assert_eq!(input.serial_number, None);
        assert_eq!(input.acquired_on, NaiveDate::from_ymd_opt(2020, 5, 12));
    }

    #[test]
    fn ammunition_count_must_be_non_negative() {
        let form = AmmunitionForm { name: "FMJ".into(), quantity: "-1".into(), ..Default::default() };
        assert!(form.validate().unwrap_err().get("quantity").is_some());

        let form = AmmunitionForm { name: "FMJ".into(), quantity: "0".into(), ..Default::default() };
        assert_eq!(form.validate().unwrap().quantity, 0);
    }

    #[test]
    fn promotion_dates_and_discount() {
        let form = PromotionForm {
            name: "Spring".into(),
            discount_percent: "120".into(),
            starts_on: "2026-04-01".into(),
            ends_on: "2026-03-01".into(),
            ..Default::default()
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.get("discount_percent").is_some());
        assert!(errors.get("ends_on").is_some());

        let form = PromotionForm {
            name: "Spring".into(),
            discount_percent: "20".into(),
            starts_on: "2026-03-01".into(),
            ends_on: "2026-03-31".into(),
            active: Some("on".into()),
            ..Default::default()
        };
        let input = form.validate().unwrap();
        assert!(input.active);
        assert_eq!(input.promo_type, "discount");
    }

    #[test]
    fn flag_names_are_snake_case_identifiers() {
        for bad in ["", "New Feature", "new-feature", "UPPER"] {
            let form = FeatureFlagForm { name: bad.into(), ..Default::default() };
            assert!(form.validate().is_err(), "{bad:?} should be rejected");
        }
        let form = FeatureFlagForm {
            name: "new_ammo_feature".into(),
            roles: "owner, tester, owner".into(),
            ..Default::default()
        };
        let input = form.validate().unwrap();
        assert_eq!(input.roles, vec!["owner", "tester"]);
        assert!(!input.enabled);
    }

    #[test]
    fn policy_fields_allow_wildcards() {
        let form = PolicyForm { role: "editor".into(), resource: "promotions".into(), action: "*".into() };
        assert_eq!(form.validate().unwrap(), PolicyRule::new("editor", "promotions", "*"));

        let form = PolicyForm { role: "".into(), resource: "a b".into(), action: "read".into() };
        let errors = form.validate().unwrap_err();
        assert!(errors.get("role").is_some());
        assert!(errors.get("resource").is_some());
    }

    #[test]
    fn form_errors_keep_first_message_per_field() {
        let mut errors = FormErrors::new();
        errors.add("name", "first");
        errors.add("name", "second");
        errors.add("email", "bad");
        assert_eq!(errors.get("name"), Some("first"));
        let fields: Vec<_> = errors.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, ["name", "email"]);
    }
}
