//! Namespace grants and the permission evaluator.
//!
//! A grant pairs a [`NamespacePattern`] with [`Permissions`]. A grant on a
//! prefix is inherited by everything below it; when several grants cover a
//! namespace the most specific one decides. Explicit checks ignore
//! inheritance and only consider grants naming the namespace itself.

use meshgate_core::{EntityId, Namespace, NamespacePattern, Permissions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered list of namespace grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    grants: Vec<(NamespacePattern, Permissions)>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grant. A later grant on the same pattern replaces the earlier.
    pub fn grant(mut self, pattern: &str, permissions: Permissions) -> Self {
        self.insert(NamespacePattern::parse(pattern), permissions);
        self
    }

    pub fn insert(&mut self, pattern: NamespacePattern, permissions: Permissions) {
        match self.grants.iter_mut().find(|(p, _)| *p == pattern) {
            Some(existing) => existing.1 = permissions,
            None => self.grants.push((pattern, permissions)),
        }
    }

    pub fn grants(&self) -> &[(NamespacePattern, Permissions)] {
        &self.grants
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Layer `other` on top of `self`; `other` wins on identical patterns.
    pub fn merge(&self, other: &PermissionSet) -> PermissionSet {
        let mut merged = self.clone();
        for (pattern, permissions) in &other.grants {
            merged.insert(pattern.clone(), *permissions);
        }
        merged
    }

    /// Same grants with everything but READ stripped.
    pub fn read_only(&self) -> PermissionSet {
        PermissionSet {
            grants: self
                .grants
                .iter()
                .map(|(p, perms)| (p.clone(), perms.read_only()))
                .collect(),
        }
    }

    /// Bits granted on `ns`. Empty when no grant applies.
    pub fn effective(&self, ns: &Namespace, explicit: bool) -> Permissions {
        best_grant(std::iter::once(self), ns, explicit).unwrap_or_default()
    }

    pub fn check(&self, ns: &Namespace, required: Permissions, explicit: bool) -> bool {
        self.effective(ns, explicit).contains(required)
    }
}

/// Most specific grant across layered sets; later layers win ties.
fn best_grant<'a>(
    layers: impl Iterator<Item = &'a PermissionSet>,
    ns: &Namespace,
    explicit: bool,
) -> Option<Permissions> {
    let mut best: Option<((usize, usize), Permissions)> = None;
    for set in layers {
        for (pattern, permissions) in &set.grants {
            let applies = if explicit {
                pattern.matches_exactly(ns)
            } else {
                pattern.covers(ns)
            };
            if !applies {
                continue;
            }
            let rank = pattern.specificity();
            if best.map_or(true, |(current, _)| rank >= current) {
                best = Some((rank, *permissions));
            }
        }
    }
    best.map(|(_, permissions)| permissions)
}

// ============================================================================
// IDENTITY
// ============================================================================

/// Who is asking. Authentication happens outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    Anonymous,
    User(EntityId),
    /// An organisation API key.
    OrgKey(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequesterIdentity {
    pub principal: Principal,
    /// Read-only keys never carry more than READ.
    pub read_only: bool,
}

impl RequesterIdentity {
    pub fn anonymous() -> Self {
        Self {
            principal: Principal::Anonymous,
            read_only: false,
        }
    }

    pub fn user(id: EntityId) -> Self {
        Self {
            principal: Principal::User(id),
            read_only: false,
        }
    }

    pub fn org_key(id: EntityId) -> Self {
        Self {
            principal: Principal::OrgKey(id),
            read_only: false,
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal != Principal::Anonymous
    }
}

impl Default for RequesterIdentity {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Permission evaluator consumed by the redaction pass.
pub trait PermissionEvaluator: Send + Sync {
    fn check(
        &self,
        identity: &RequesterIdentity,
        namespace: &Namespace,
        required: Permissions,
        explicit: bool,
    ) -> bool;
}

// ============================================================================
// GRANT TABLE
// ============================================================================

/// Grants per principal, layered over shared baselines.
///
/// Resolution order, later layers winning ties: the anonymous baseline,
/// the authenticated baseline (any non-anonymous principal), then the
/// principal's own grants.
#[derive(Debug, Clone, Default)]
pub struct GrantTable {
    anonymous: PermissionSet,
    authenticated: PermissionSet,
    principals: HashMap<Principal, PermissionSet>,
}

impl GrantTable {
    pub fn new(anonymous: PermissionSet) -> Self {
        Self {
            anonymous,
            ..Self::default()
        }
    }

    pub fn with_authenticated(mut self, authenticated: PermissionSet) -> Self {
        self.authenticated = authenticated;
        self
    }

    /// Add grants for one principal, merging with any it already has.
    pub fn with_principal(mut self, principal: Principal, grants: PermissionSet) -> Self {
        let merged = match self.principals.get(&principal) {
            Some(existing) => existing.merge(&grants),
            None => grants,
        };
        self.principals.insert(principal, merged);
        self
    }

    /// Public data readable by everyone, `users`-level data readable by
    /// any authenticated requester. Private data needs an explicit grant.
    pub fn peering_defaults() -> Self {
        Self::new(PermissionSet::new().grant("org", Permissions::READ)).with_authenticated(
            PermissionSet::new()
                .grant("org.*.network.*.poc_set.users", Permissions::READ)
                .grant(
                    "org.*.internetexchange.*.ixlan.*.ixf_ixp_member_list_url.users",
                    Permissions::READ,
                ),
        )
    }

    fn layers<'a>(&'a self, identity: &RequesterIdentity) -> Vec<&'a PermissionSet> {
        let mut layers = vec![&self.anonymous];
        if identity.is_authenticated() {
            layers.push(&self.authenticated);
            if let Some(own) = self.principals.get(&identity.principal) {
                layers.push(own);
            }
        }
        layers
    }

    /// The full grant set in effect for `identity`.
    pub fn resolve(&self, identity: &RequesterIdentity) -> PermissionSet {
        let merged = self
            .layers(identity)
            .into_iter()
            .fold(PermissionSet::new(), |acc, set| acc.merge(set));
        if identity.read_only {
            merged.read_only()
        } else {
            merged
        }
    }
}

impl PermissionEvaluator for GrantTable {
    fn check(
        &self,
        identity: &RequesterIdentity,
        namespace: &Namespace,
        required: Permissions,
        explicit: bool,
    ) -> bool {
        let granted = best_grant(self.layers(identity).into_iter(), namespace, explicit)
            .unwrap_or_default();
        let granted = if identity.read_only {
            granted.read_only()
        } else {
            granted
        };
        granted.contains(required)
    }
}
