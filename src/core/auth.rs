//! Authorization - maps principal roles to permitted operations.
//!
//! A [`Principal`] is the authenticated identity threaded explicitly through
//! every write operation (no request-global current user). Gate helpers
//! return [`Error::Authorization`] when the role set is insufficient.

use crate::{
    entities::{Role, UserRole, harvest, user, user_role},
    errors::{Error, Result},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Authenticated (or anonymous) caller identity with its role set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// User id; `None` for unauthenticated public callers
    pub user_id: Option<i64>,
    /// Roles granted to the user
    pub roles: Vec<Role>,
}

impl Principal {
    /// Unauthenticated caller (public intake forms).
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            roles: Vec::new(),
        }
    }

    /// Principal for a known user with an explicit role set.
    #[must_use]
    pub fn new(user_id: i64, roles: Vec<Role>) -> Self {
        Self {
            user_id: Some(user_id),
            roles,
        }
    }

    /// Loads the principal for a user from the role table.
    pub async fn for_user(db: &DatabaseConnection, user_id: i64) -> Result<Self> {
        let roles = UserRole::find()
            .filter(user_role::Column::UserId.eq(user_id))
            .all(db)
            .await?
            .into_iter()
            .map(|row| row.role)
            .collect();
        Ok(Self::new(user_id, roles))
    }

    /// Whether the principal holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Staff means core member or pick leader; admins count too.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.roles
            .iter()
            .any(|r| r.is_staff_role() || *r == Role::Admin)
    }

    /// Core member or admin.
    #[must_use]
    pub fn is_core_or_admin(&self) -> bool {
        self.has_role(Role::Core) || self.has_role(Role::Admin)
    }

    /// Site administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Whether this principal may edit the given harvest: its pick leader,
    /// or a core member / admin.
    #[must_use]
    pub fn may_edit_harvest(&self, harvest: &harvest::Model) -> bool {
        if self.is_core_or_admin() {
            return true;
        }
        match (self.user_id, harvest.pick_leader_id) {
            (Some(uid), Some(leader)) => uid == leader,
            _ => false,
        }
    }
}

/// Requires staff (pick leader, core or admin) for list/detail queries.
pub fn require_staff(principal: &Principal) -> Result<()> {
    if principal.is_staff() {
        Ok(())
    } else {
        Err(Error::authorization(
            "viewing this page is restricted to staff members",
        ))
    }
}

/// Requires core member or admin (property validation, member management).
pub fn require_core_or_admin(principal: &Principal) -> Result<()> {
    if principal.is_core_or_admin() {
        Ok(())
    } else {
        Err(Error::authorization(
            "this action is restricted to core and admin users",
        ))
    }
}

/// Requires the admin role (bulk maintenance actions).
pub fn require_admin(principal: &Principal) -> Result<()> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(Error::authorization(
            "this action is restricted to administrators",
        ))
    }
}

/// Requires the harvest's pick leader, or core/admin.
pub fn require_harvest_editor(principal: &Principal, harvest: &harvest::Model) -> Result<()> {
    if principal.may_edit_harvest(harvest) {
        Ok(())
    } else {
        Err(Error::authorization(
            "only the pick leader or a core member may modify this harvest",
        ))
    }
}

/// Step a freshly invited user must complete before anything else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstLoginStep {
    /// Replace the temporary password
    ChangePassword,
    /// Accept the terms and conditions
    AcceptTerms,
}

/// A user is onboarding while they hold the volunteer role with a temporary
/// password and have not yet been promoted to pick leader.
#[must_use]
pub fn is_onboarding(user: &user::Model, roles: &[Role]) -> bool {
    roles.contains(&Role::Volunteer)
        && user.has_temporary_password
        && !roles.contains(&Role::Pickleader)
}

/// Forced first-login sequencing: password change first, then terms.
/// `None` once both are done.
#[must_use]
pub fn first_login_step(user: &user::Model) -> Option<FirstLoginStep> {
    if user.has_temporary_password {
        Some(FirstLoginStep::ChangePassword)
    } else if !user.agreed_terms {
        Some(FirstLoginStep::AcceptTerms)
    } else {
        None
    }
}
