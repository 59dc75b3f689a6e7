// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role names and role checks.
//!
//! Roles are plain strings carried in the token. A check is an exact,
//! case-sensitive match against the identity's role list: no hierarchy, no
//! wildcards, no normalization.

/// Role required by the administrative routes.
pub const ADMIN_ROLE: &str = "admin";

/// Check whether `roles` contains `required`.
pub fn has_role(roles: &[String], required: &str) -> bool {
    roles.iter().any(|role| role == required)
}

/// A role requirement known at compile time.
///
/// Used by the [`Authorized`](super::extractor::Authorized) extractor so a
/// handler signature states the role it needs:
///
/// ```rust,ignore
/// async fn rotate(Authorized(identity, ..): Authorized<Admin>) -> impl IntoResponse { .. }
/// ```
pub trait RequiredRole: Send + Sync + 'static {
    /// Exact role name to look for.
    const NAME: &'static str;
}

/// Marker for [`ADMIN_ROLE`].
#[derive(Debug, Clone, Copy)]
pub struct Admin;

impl RequiredRole for Admin {
    const NAME: &'static str = ADMIN_ROLE;
}
