//! Role-based access control backed by the casbin policy engine.
//!
//! The policy is compiled into an immutable [`PolicySnapshot`]. A
//! [`PolicyHandle`] shares the current snapshot with every request; reloading
//! builds a new snapshot off to the side and swaps it in with one write, so a
//! request never observes a half-loaded policy.
//!
//! When the policy cannot be loaded the handle is *degraded*: every RBAC
//! check denies and role lookups return nothing. Login and public pages keep
//! working.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::Request,
    http::Method,
    response::{IntoResponse, Redirect, Response},
};
use casbin::{CoreApi, DefaultModel, Enforcer, MemoryAdapter, MgmtApi};
use tokio::sync::RwLock;
use tower::{Layer, Service};

use crate::auth::AuthContext;
use crate::error::{AppError, AppResult};
use crate::models::{PolicyRule, RoleAssignment};
use crate::repository::RepositoryState;

/// The role that bypasses every policy check.
pub const SUPERUSER_ROLE: &str = "admin";

/// Resource guarding the admin dashboard, and with it the "Admin" nav entry.
pub const DASHBOARD_RESOURCE: &str = "dashboard";

pub const ACTION_READ: &str = "read";
pub const ACTION_WRITE: &str = "write";

const MODEL_CONF: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && (r.act == p.act || p.act == "*")
"#;

/// Rules installed into an empty policy store at first start.
pub fn default_policy() -> Vec<PolicyRule> {
    vec![
        PolicyRule::new("owner", "ammunition", ACTION_READ),
        PolicyRule::new("owner", "ammunition", ACTION_WRITE),
        PolicyRule::new("viewer", DASHBOARD_RESOURCE, ACTION_READ),
    ]
}

/// is_superuser
///
/// The single definition of "this caller bypasses RBAC".
pub fn is_superuser(roles: &BTreeSet<String>) -> bool {
    roles.contains(SUPERUSER_ROLE)
}

/// Only a superuser may hand out or take away the superuser role.
pub fn may_manage_role(caller_roles: &BTreeSet<String>, role: &str) -> bool {
    role != SUPERUSER_ROLE || is_superuser(caller_roles)
}

/// Maps an HTTP method onto the policy action it needs.
pub fn action_for_method(method: &Method) -> &'static str {
    if method == Method::GET || method == Method::HEAD {
        ACTION_READ
    } else {
        ACTION_WRITE
    }
}

/// Where policy rules and role assignments come from.
#[derive(Debug, Clone)]
pub enum PolicySource {
    /// A casbin-style CSV file (`p, role, resource, action` and `g, user, role`).
    /// Read-only from the admin UI.
    File(PathBuf),
    /// The `policy_rules` and `role_assignments` tables.
    Repository,
}

/// PolicySnapshot
///
/// A compiled, immutable policy. Built once per load or reload.
pub struct PolicySnapshot {
    enforcer: Enforcer,
    rules: Vec<PolicyRule>,
    assignments: Vec<RoleAssignment>,
    roles_by_identity: HashMap<String, BTreeSet<String>>,
}

impl PolicySnapshot {
    /// build
    ///
    /// Compiles rules and assignments into a casbin enforcer over the embedded model.
    pub async fn build(
        mut rules: Vec<PolicyRule>,
        mut assignments: Vec<RoleAssignment>,
    ) -> AppResult<Self> {
        rules.sort();
        rules.dedup();
        assignments.sort();
        assignments.dedup();

        let model = DefaultModel::from_str(MODEL_CONF).await?;
        let mut enforcer = Enforcer::new(model, MemoryAdapter::default()).await?;

        for rule in &rules {
            enforcer
                .add_policy(vec![rule.role.clone(), rule.resource.clone(), rule.action.clone()])
                .await?;
        }
        for assignment in &assignments {
            enforcer
                .add_grouping_policy(vec![assignment.user_id.clone(), assignment.role.clone()])
                .await?;
        }
        enforcer.build_role_links()?;

        let mut roles_by_identity: HashMap<String, BTreeSet<String>> = HashMap::new();
        for assignment in &assignments {
            roles_by_identity
                .entry(assignment.user_id.clone())
                .or_default()
                .insert(assignment.role.clone());
        }

        Ok(Self { enforcer, rules, assignments, roles_by_identity })
    }

    fn roles(&self, identity: &str) -> BTreeSet<String> {
        self.roles_by_identity.get(identity).cloned().unwrap_or_default()
    }

    fn allows(&self, subject: &str, resource: &str, action: &str) -> bool {
        match self.enforcer.enforce((subject, resource, action)) {
            Ok(allowed) => allowed,
            Err(err) => {
                tracing::error!(error = %err, subject, resource, action, "policy evaluation failed");
                false
            }
        }
    }
}

/// PolicyHandle
///
/// Cheap to clone; every clone sees the same current snapshot.
#[derive(Clone)]
pub struct PolicyHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    source: PolicySource,
    repo: RepositoryState,
    snapshot: RwLock<Option<Arc<PolicySnapshot>>>,
}

impl PolicyHandle {
    /// load
    ///
    /// Builds the initial snapshot. A failure is logged and yields a degraded
    /// handle rather than an error, so the server still starts.
    pub async fn load(source: PolicySource, repo: RepositoryState) -> Self {
        let snapshot = match build_from_source(&source, &repo).await {
            Ok(snapshot) => {
                tracing::info!(
                    rules = snapshot.rules.len(),
                    assignments = snapshot.assignments.len(),
                    "policy loaded"
                );
                Some(Arc::new(snapshot))
            }
            Err(err) => {
                tracing::error!(error = %err, "policy failed to load; RBAC routes will deny");
                None
            }
        };
        Self::with_snapshot(source, repo, snapshot)
    }

    /// A handle that denies every RBAC check until a reload succeeds.
    pub fn degraded(source: PolicySource, repo: RepositoryState) -> Self {
        Self::with_snapshot(source, repo, None)
    }

    fn with_snapshot(
        source: PolicySource,
        repo: RepositoryState,
        snapshot: Option<Arc<PolicySnapshot>>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner { source, repo, snapshot: RwLock::new(snapshot) }),
        }
    }

    /// reload_policy
    ///
    /// Rebuilds from the source and swaps the result in. On failure the
    /// previous snapshot stays active and the error is returned.
    pub async fn reload_policy(&self) -> AppResult<()> {
        let fresh = build_from_source(&self.inner.source, &self.inner.repo).await?;
        tracing::info!(
            rules = fresh.rules.len(),
            assignments = fresh.assignments.len(),
            "policy reloaded"
        );
        *self.inner.snapshot.write().await = Some(Arc::new(fresh));
        Ok(())
    }

    async fn current(&self) -> Option<Arc<PolicySnapshot>> {
        self.inner.snapshot.read().await.clone()
    }

    pub async fn is_degraded(&self) -> bool {
        self.current().await.is_none()
    }

    /// Whether admins may add and remove rules from the UI.
    pub fn is_editable(&self) -> bool {
        matches!(self.inner.source, PolicySource::Repository)
    }

    /// Roles held by `identity`; empty when unknown or degraded.
    pub async fn get_user_roles(&self, identity: &str) -> BTreeSet<String> {
        match self.current().await {
            Some(snapshot) => snapshot.roles(identity),
            None => BTreeSet::new(),
        }
    }

    /// is_authorized
    ///
    /// Superusers pass. Otherwise the engine must grant `action` on `resource`
    /// to the identity itself or to one of `roles`. A degraded handle denies
    /// everyone, superusers included.
    pub async fn is_authorized(
        &self,
        identity: &str,
        roles: &BTreeSet<String>,
        resource: &str,
        action: &str,
    ) -> bool {
        let Some(snapshot) = self.current().await else {
            return false;
        };
        if is_superuser(roles) {
            return true;
        }
        snapshot.allows(identity, resource, action)
            || roles.iter().any(|role| snapshot.allows(role, resource, action))
    }

    pub async fn policies(&self) -> Vec<PolicyRule> {
        self.current().await.map(|s| s.rules.clone()).unwrap_or_default()
    }

    pub async fn role_assignments(&self) -> Vec<RoleAssignment> {
        self.current().await.map(|s| s.assignments.clone()).unwrap_or_default()
    }
}

async fn build_from_source(source: &PolicySource, repo: &RepositoryState) -> AppResult<PolicySnapshot> {
    let (rules, assignments) = match source {
        PolicySource::File(path) => read_policy_file(path).await?,
        PolicySource::Repository => (
            repo.list_policy_rules().await?,
            repo.list_role_assignments().await?,
        ),
    };
    PolicySnapshot::build(rules, assignments).await
}

async fn read_policy_file(path: &Path) -> AppResult<(Vec<PolicyRule>, Vec<RoleAssignment>)> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Policy(format!("cannot read {}: {e}", path.display())))?;
    parse_policy_csv(&text)
}

/// parse_policy_csv
///
/// Accepts `p, role, resource, action` and `g, user, role` lines. Blank lines
/// and `#` comments are skipped; anything else is an error.
pub fn parse_policy_csv(text: &str) -> AppResult<(Vec<PolicyRule>, Vec<RoleAssignment>)> {
    let mut rules = Vec::new();
    let mut assignments = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        match fields.as_slice() {
            ["p", role, resource, action] => {
                rules.push(PolicyRule::new(role, resource, action));
            }
            ["g", user, role] => assignments.push(RoleAssignment {
                user_id: user.to_string(),
                role: role.to_string(),
            }),
            _ => {
                return Err(AppError::Policy(format!(
                    "malformed policy line {}: {line}",
                    index + 1
                )));
            }
        }
    }
    Ok((rules, assignments))
}

// --- Route guard ---

/// RequirePermissionLayer
///
/// Route guard for one RBAC resource. The action follows the HTTP method
/// unless fixed with [`with_action`](Self::with_action). Expects
/// `auth_context_middleware` to have run.
#[derive(Clone)]
pub struct RequirePermissionLayer {
    policy: PolicyHandle,
    resource: &'static str,
    action: Option<&'static str>,
}

impl RequirePermissionLayer {
    pub fn new(policy: PolicyHandle, resource: &'static str) -> Self {
        Self { policy, resource, action: None }
    }

    pub fn with_action(mut self, action: &'static str) -> Self {
        self.action = Some(action);
        self
    }
}

impl<S> Layer<S> for RequirePermissionLayer {
    type Service = RequirePermission<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermission { inner, guard: self.clone() }
    }
}

#[derive(Clone)]
pub struct RequirePermission<S> {
    inner: S,
    guard: RequirePermissionLayer,
}

impl<S> Service<Request> for RequirePermission<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let guard = self.guard.clone();
        // Take the service that was driven to readiness; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let auth = req.extensions().get::<AuthContext>().cloned().unwrap_or_default();
            let Some(user_id) = auth.user_id.filter(|_| auth.authenticated) else {
                return Ok(Redirect::to("/login").into_response());
            };

            let action = guard.action.unwrap_or_else(|| action_for_method(req.method()));
            let allowed = guard
                .policy
                .is_authorized(&user_id.to_string(), &auth.roles, guard.resource, action)
                .await;

            if !allowed {
                tracing::warn!(
                    user = %user_id,
                    resource = guard.resource,
                    action,
                    path = %req.uri().path(),
                    "authorization denied"
                );
                return Ok(AppError::Forbidden.into_response());
            }

            inner.call(req).await
        })
    }
}
