/// Router Module Index
///
/// Routes are grouped by who may reach them. Guards are attached as route
/// layers on each group, so a handler is never mounted without the check its
/// group demands.

/// Pages open to everyone, signed in or not.
pub mod public;

/// The collection area. Requires a signed-in user; ammunition additionally
/// requires the `ammunition` permission.
pub mod owner;

/// The administrative area. Every sub-router is guarded by its own RBAC
/// resource on top of the login check.
pub mod admin;
