//! PTA role registry and role predicates.
//!
//! Eight fixed roles, each created once from a capability template.
//! Capability sets are a point-in-time copy from the template's base role;
//! later changes to the base role do not propagate.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::User;
use crate::store::{CapabilitySet, RoleStore, UserStore};

/// The fixed PTA roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtaRole {
    SysAdmin,
    CityOfficer,
    CityExecutive,
    CityDirector,
    ProjectCommittee,
    PrCommittee,
    BlockOfficer,
    SchoolOfficer,
}

/// All roles, in registration order.
pub const ALL_ROLES: [PtaRole; 8] = [
    PtaRole::SysAdmin,
    PtaRole::CityOfficer,
    PtaRole::CityExecutive,
    PtaRole::CityDirector,
    PtaRole::ProjectCommittee,
    PtaRole::PrCommittee,
    PtaRole::BlockOfficer,
    PtaRole::SchoolOfficer,
];

impl PtaRole {
    /// Machine name used in the role store and on users.
    pub fn machine_name(&self) -> &'static str {
        match self {
            PtaRole::SysAdmin => "pta_sys_admin",
            PtaRole::CityOfficer => "pta_city_officer",
            PtaRole::CityExecutive => "pta_city_executive",
            PtaRole::CityDirector => "pta_city_director",
            PtaRole::ProjectCommittee => "pta_project_committee",
            PtaRole::PrCommittee => "pta_pr_committee",
            PtaRole::BlockOfficer => "pta_block_officer",
            PtaRole::SchoolOfficer => "pta_school_officer",
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            PtaRole::SysAdmin => "PTA システム管理者",
            PtaRole::CityOfficer => "PTA 市協議会役員",
            PtaRole::CityExecutive => "PTA 市協議会常任理事",
            PtaRole::CityDirector => "PTA 市協議会理事",
            PtaRole::ProjectCommittee => "PTA プロジェクト委員",
            PtaRole::PrCommittee => "PTA 広報委員",
            PtaRole::BlockOfficer => "PTA 区連協議会役員",
            PtaRole::SchoolOfficer => "PTA 単位PTA役員",
        }
    }

    /// Capability template this role is created from.
    pub fn template(&self) -> CapabilityTemplate {
        match self {
            PtaRole::SysAdmin => CapabilityTemplate::Administrator,
            PtaRole::CityOfficer => CapabilityTemplate::Editor,
            PtaRole::CityExecutive
            | PtaRole::CityDirector
            | PtaRole::ProjectCommittee
            | PtaRole::PrCommittee => CapabilityTemplate::AuthorWithPrivate,
            PtaRole::BlockOfficer => CapabilityTemplate::EditorLimited,
            PtaRole::SchoolOfficer => CapabilityTemplate::SubscriberWithPrivate,
        }
    }
}

/// Capability templates resolved against the host's base roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityTemplate {
    Administrator,
    Editor,
    /// Same capability set as `Editor`; the restriction is enforced by the
    /// access decision procedure, not by capabilities.
    EditorLimited,
    AuthorWithPrivate,
    SubscriberWithPrivate,
}

impl CapabilityTemplate {
    /// Parse a template name; unknown names yield `None` (callers fall back
    /// to a read-only set).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "administrator" => Some(CapabilityTemplate::Administrator),
            "editor" => Some(CapabilityTemplate::Editor),
            "editor_limited" => Some(CapabilityTemplate::EditorLimited),
            "author_with_private" => Some(CapabilityTemplate::AuthorWithPrivate),
            "subscriber_with_private" => Some(CapabilityTemplate::SubscriberWithPrivate),
            _ => None,
        }
    }

    /// The host base role this template copies from.
    fn base_role(&self) -> &'static str {
        match self {
            CapabilityTemplate::Administrator => "administrator",
            CapabilityTemplate::Editor | CapabilityTemplate::EditorLimited => "editor",
            CapabilityTemplate::AuthorWithPrivate => "author",
            CapabilityTemplate::SubscriberWithPrivate => "subscriber",
        }
    }

    /// Extra capabilities granted on top of the copied base set.
    fn extra_capabilities(&self) -> &'static [&'static str] {
        match self {
            CapabilityTemplate::AuthorWithPrivate | CapabilityTemplate::SubscriberWithPrivate => {
                &["read_private_pages", "read_private_posts"]
            }
            _ => &[],
        }
    }
}

/// The capability set for an unrecognized template name.
pub fn fallback_capabilities() -> CapabilitySet {
    let mut caps = CapabilitySet::new();
    caps.insert("read".to_string(), true);
    caps
}

/// Whether the user holds a role with unrestricted content access.
pub fn is_pta_admin(user: &User) -> bool {
    user.has_role(PtaRole::SysAdmin.machine_name())
        || user.has_role(PtaRole::CityOfficer.machine_name())
}

/// Whether the user holds the block officer role. Other roles may coexist.
pub fn is_block_officer(user: &User) -> bool {
    user.has_role(PtaRole::BlockOfficer.machine_name())
}

/// Role registration and per-user block attribute access.
#[derive(Clone)]
pub struct RoleRegistry {
    roles: Arc<dyn RoleStore>,
    users: Arc<dyn UserStore>,
}

impl RoleRegistry {
    pub fn new(roles: Arc<dyn RoleStore>, users: Arc<dyn UserStore>) -> Self {
        RoleRegistry { roles, users }
    }

    /// Create each PTA role that does not already exist. Existing roles are
    /// never updated in place.
    pub async fn register_roles(&self) -> Result<()> {
        for role in ALL_ROLES {
            let name = role.machine_name();
            if self.roles.exists(name).await? {
                debug!(role = name, "role already registered");
                continue;
            }

            let caps = self.resolve_capabilities(role.template()).await?;
            self.roles.create(name, role.display_name(), caps).await?;
            info!(role = name, "registered role");
        }
        Ok(())
    }

    /// Remove all PTA roles (deactivation path).
    pub async fn remove_roles(&self) -> Result<()> {
        for role in ALL_ROLES {
            self.roles.remove(role.machine_name()).await?;
        }
        info!("removed PTA roles");
        Ok(())
    }

    /// Resolve a template into a concrete capability set.
    ///
    /// The base role's set is copied verbatim; a missing base role yields an
    /// empty set rather than an error.
    pub async fn resolve_capabilities(&self, template: CapabilityTemplate) -> Result<CapabilitySet> {
        let mut caps = self
            .roles
            .capabilities(template.base_role())
            .await?
            .unwrap_or_default();

        for cap in template.extra_capabilities() {
            caps.insert((*cap).to_string(), true);
        }

        Ok(caps)
    }

    /// Resolve a template by name; unknown names get a read-only set.
    pub async fn resolve_capabilities_by_name(&self, name: &str) -> Result<CapabilitySet> {
        match CapabilityTemplate::from_name(name) {
            Some(template) => self.resolve_capabilities(template).await,
            None => Ok(fallback_capabilities()),
        }
    }

    /// The user's assigned block, defaulting to the empty string.
    pub async fn user_block(&self, user_id: Uuid) -> Result<String> {
        self.users.block_of(user_id).await
    }

    /// Explicitly initialize a new user's block to the empty string.
    pub async fn init_user_block(&self, user_id: Uuid) -> Result<()> {
        self.users.set_block(user_id, "").await
    }
}

impl std::fmt::Debug for RoleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleRegistry").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn user_with_roles(roles: &[&str]) -> User {
        User {
            id: Uuid::now_v7(),
            name: "test".to_string(),
            roles: roles.iter().map(|r| (*r).to_string()).collect(),
        }
    }

    #[test]
    fn admin_predicate_covers_both_admin_roles() {
        assert!(is_pta_admin(&user_with_roles(&["pta_sys_admin"])));
        assert!(is_pta_admin(&user_with_roles(&["pta_city_officer"])));
        assert!(is_pta_admin(&user_with_roles(&[
            "pta_block_officer",
            "pta_sys_admin"
        ])));
        assert!(!is_pta_admin(&user_with_roles(&["pta_block_officer"])));
        assert!(!is_pta_admin(&user_with_roles(&["pta_school_officer"])));
        assert!(!is_pta_admin(&user_with_roles(&[])));
    }

    #[test]
    fn block_officer_is_presence_not_exclusivity() {
        assert!(is_block_officer(&user_with_roles(&["pta_block_officer"])));
        assert!(is_block_officer(&user_with_roles(&[
            "pta_school_officer",
            "pta_block_officer"
        ])));
        assert!(!is_block_officer(&user_with_roles(&["pta_sys_admin"])));
    }

    #[test]
    fn every_role_has_a_machine_name_and_template() {
        for role in ALL_ROLES {
            assert!(role.machine_name().starts_with("pta_"));
            assert!(!role.display_name().is_empty());
            // Template resolution must be total.
            let _ = role.template();
        }
    }

    #[test]
    fn template_names_parse() {
        for name in [
            "administrator",
            "editor",
            "editor_limited",
            "author_with_private",
            "subscriber_with_private",
        ] {
            assert!(CapabilityTemplate::from_name(name).is_some());
        }
        assert!(CapabilityTemplate::from_name("superuser").is_none());
    }

    #[test]
    fn editor_limited_copies_editor() {
        assert_eq!(CapabilityTemplate::EditorLimited.base_role(), "editor");
        assert!(CapabilityTemplate::EditorLimited.extra_capabilities().is_empty());
    }

    #[test]
    fn private_templates_add_read_caps() {
        for t in [
            CapabilityTemplate::AuthorWithPrivate,
            CapabilityTemplate::SubscriberWithPrivate,
        ] {
            assert_eq!(
                t.extra_capabilities(),
                &["read_private_pages", "read_private_posts"]
            );
        }
    }

    #[test]
    fn fallback_is_read_only() {
        let caps = fallback_capabilities();
        assert_eq!(caps.len(), 1);
        assert_eq!(caps.get("read"), Some(&true));
    }
}
