// SPDX-License-Identifier: MIT

//! Session/role state machine.
//!
//! Tracks identity resolution -> role selection -> ready, with a separate
//! branch for admins who pick a console view or emulate a student/teacher
//! session-locally. The machine is pure; HTTP handlers drive it with
//! events and persist side effects (role writes) themselves.
//!
//! Two load-failure rules matter for correctness:
//! - a store-unreachable resolution keeps the machine in `AuthLoading`
//!   instead of falling through to default free entitlements, and
//! - a blocked account forces `Unauthenticated` from any state.

use crate::models::{Role, UserEntitlement};
use serde::{Deserialize, Serialize};

/// Admin screen choice after sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdminView {
    Dashboard,
    ActAsStudent,
    ActAsTeacher,
}

/// Session states gating which screen renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    AuthLoading,
    #[serde(rename_all = "camelCase")]
    Unauthenticated {
        /// True when the session ended because the account was blocked;
        /// the client shows a notice instead of the plain sign-in screen.
        blocked: bool,
    },
    RoleUnset,
    StudentReady,
    TeacherReady,
    AdminViewUnselected,
    AdminDashboard,
    AdminActingAsStudent,
    AdminActingAsTeacher,
}

/// The facts from an entitlement load that drive resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub is_admin: bool,
    pub role: Option<Role>,
    pub blocked: bool,
}

impl From<&UserEntitlement> for ResolvedIdentity {
    fn from(entitlement: &UserEntitlement) -> Self {
        Self {
            is_admin: entitlement.is_admin,
            role: entitlement.role,
            blocked: entitlement.is_blocked(),
        }
    }
}

/// Events applied to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Identity provider reported no session.
    NoSession,
    /// Entitlement loaded; branch on admin/role/blocked.
    AuthResolved(ResolvedIdentity),
    /// Entitlement load failed (store unreachable). Stay in AuthLoading
    /// rather than presenting default entitlements.
    AuthFailed,
    /// Regular user picks a role (caller persists it).
    SelectRole(Role),
    /// Regular user asks to change role (caller clears the persisted role).
    ChangeRole,
    /// Admin picks a console or emulation view (session-local only).
    AdminSelectView(AdminView),
    /// Admin leaves an emulation/console view back to the selector.
    AdminSwitchRole,
    /// Account became blocked mid-session.
    AccountBlocked,
    SignOut,
}

/// Session state machine. Invalid events leave the state unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionMachine {
    state: SessionState,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    /// Fresh machine awaiting identity resolution.
    pub fn new() -> Self {
        Self {
            state: SessionState::AuthLoading,
        }
    }

    /// Machine already resolved against a loaded entitlement.
    pub fn resolved(entitlement: &UserEntitlement) -> Self {
        let mut machine = Self::new();
        machine.apply(SessionEvent::AuthResolved(entitlement.into()));
        machine
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Role in effect for rendering and (for admins) emulation.
    ///
    /// Admin emulation views yield a role without touching the persisted
    /// entitlement.
    pub fn effective_role(&self) -> Option<Role> {
        match self.state {
            SessionState::StudentReady | SessionState::AdminActingAsStudent => Some(Role::Student),
            SessionState::TeacherReady | SessionState::AdminActingAsTeacher => Some(Role::Teacher),
            _ => None,
        }
    }

    /// Apply an event; returns the resulting state.
    pub fn apply(&mut self, event: SessionEvent) -> SessionState {
        use SessionState::*;

        self.state = match (self.state, event) {
            // Blocked wins over everything, from any state.
            (_, SessionEvent::AccountBlocked) => Unauthenticated { blocked: true },
            (_, SessionEvent::SignOut) => Unauthenticated { blocked: false },

            (AuthLoading, SessionEvent::NoSession) => Unauthenticated { blocked: false },
            (AuthLoading, SessionEvent::AuthFailed) => AuthLoading,
            (AuthLoading, SessionEvent::AuthResolved(identity)) => {
                if identity.blocked {
                    Unauthenticated { blocked: true }
                } else if identity.is_admin {
                    AdminViewUnselected
                } else {
                    match identity.role {
                        Some(Role::Student) => StudentReady,
                        Some(Role::Teacher) => TeacherReady,
                        None => RoleUnset,
                    }
                }
            }

            (RoleUnset, SessionEvent::SelectRole(Role::Student)) => StudentReady,
            (RoleUnset, SessionEvent::SelectRole(Role::Teacher)) => TeacherReady,
            (StudentReady | TeacherReady, SessionEvent::ChangeRole) => RoleUnset,

            (AdminViewUnselected, SessionEvent::AdminSelectView(view)) => match view {
                AdminView::Dashboard => AdminDashboard,
                AdminView::ActAsStudent => AdminActingAsStudent,
                AdminView::ActAsTeacher => AdminActingAsTeacher,
            },
            (
                AdminDashboard | AdminActingAsStudent | AdminActingAsTeacher,
                SessionEvent::AdminSwitchRole,
            ) => AdminViewUnselected,

            // Anything else is not a legal transition.
            (state, _) => state,
        };

        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountStatus;
    use chrono::NaiveDate;

    fn entitlement(is_admin: bool, role: Option<Role>) -> UserEntitlement {
        let today = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let mut ent = UserEntitlement::new_signup("uid-1", None, 0, today, "now");
        ent.is_admin = is_admin;
        ent.role = role;
        ent
    }

    #[test]
    fn test_no_session_goes_unauthenticated() {
        let mut machine = SessionMachine::new();
        assert_eq!(
            machine.apply(SessionEvent::NoSession),
            SessionState::Unauthenticated { blocked: false },
        );
    }

    #[test]
    fn test_load_failure_stays_loading() {
        // Never fall through to default/free entitlements on a load failure.
        let mut machine = SessionMachine::new();
        assert_eq!(
            machine.apply(SessionEvent::AuthFailed),
            SessionState::AuthLoading,
        );
    }

    #[test]
    fn test_regular_user_role_flow() {
        let mut machine = SessionMachine::resolved(&entitlement(false, None));
        assert_eq!(machine.state(), SessionState::RoleUnset);

        machine.apply(SessionEvent::SelectRole(Role::Teacher));
        assert_eq!(machine.state(), SessionState::TeacherReady);
        assert_eq!(machine.effective_role(), Some(Role::Teacher));

        machine.apply(SessionEvent::ChangeRole);
        assert_eq!(machine.state(), SessionState::RoleUnset);
        assert_eq!(machine.effective_role(), None);

        machine.apply(SessionEvent::SelectRole(Role::Student));
        assert_eq!(machine.state(), SessionState::StudentReady);
    }

    #[test]
    fn test_persisted_role_resolves_ready() {
        let machine = SessionMachine::resolved(&entitlement(false, Some(Role::Student)));
        assert_eq!(machine.state(), SessionState::StudentReady);
    }

    #[test]
    fn test_admin_view_flow() {
        let mut machine = SessionMachine::resolved(&entitlement(true, None));
        assert_eq!(machine.state(), SessionState::AdminViewUnselected);

        machine.apply(SessionEvent::AdminSelectView(AdminView::ActAsStudent));
        assert_eq!(machine.state(), SessionState::AdminActingAsStudent);
        assert_eq!(machine.effective_role(), Some(Role::Student));

        // Switching re-enters the selector, distinct from a user role change.
        machine.apply(SessionEvent::AdminSwitchRole);
        assert_eq!(machine.state(), SessionState::AdminViewUnselected);

        machine.apply(SessionEvent::AdminSelectView(AdminView::Dashboard));
        assert_eq!(machine.state(), SessionState::AdminDashboard);
        assert_eq!(machine.effective_role(), None);
    }

    #[test]
    fn test_admin_emulation_does_not_persist_role() {
        let ent = entitlement(true, None);
        let mut machine = SessionMachine::resolved(&ent);
        machine.apply(SessionEvent::AdminSelectView(AdminView::ActAsTeacher));

        // The machine carries the emulated role; the entitlement is untouched.
        assert_eq!(machine.effective_role(), Some(Role::Teacher));
        assert!(ent.role.is_none());
        assert!(ent.is_admin);
    }

    #[test]
    fn test_blocked_resolution() {
        let mut ent = entitlement(false, Some(Role::Student));
        ent.account_status = AccountStatus::Blocked;
        let machine = SessionMachine::resolved(&ent);
        assert_eq!(
            machine.state(),
            SessionState::Unauthenticated { blocked: true },
        );
    }

    #[test]
    fn test_blocked_overrides_any_state() {
        let states = [
            SessionEvent::NoSession,
            SessionEvent::AuthResolved(ResolvedIdentity {
                is_admin: true,
                role: None,
                blocked: false,
            }),
        ];
        for seed in states {
            let mut machine = SessionMachine::new();
            machine.apply(seed);
            assert_eq!(
                machine.apply(SessionEvent::AccountBlocked),
                SessionState::Unauthenticated { blocked: true },
            );
        }
    }

    #[test]
    fn test_sign_out_resets() {
        let mut machine = SessionMachine::resolved(&entitlement(true, None));
        machine.apply(SessionEvent::AdminSelectView(AdminView::ActAsStudent));
        assert_eq!(
            machine.apply(SessionEvent::SignOut),
            SessionState::Unauthenticated { blocked: false },
        );
        assert_eq!(machine.effective_role(), None);
    }

    #[test]
    fn test_invalid_events_ignored() {
        let mut machine = SessionMachine::resolved(&entitlement(false, None));
        assert_eq!(machine.state(), SessionState::RoleUnset);

        // Admin events mean nothing to a regular user session.
        machine.apply(SessionEvent::AdminSelectView(AdminView::Dashboard));
        assert_eq!(machine.state(), SessionState::RoleUnset);
        machine.apply(SessionEvent::AdminSwitchRole);
        assert_eq!(machine.state(), SessionState::RoleUnset);

        // ChangeRole before a role exists is a no-op.
        machine.apply(SessionEvent::ChangeRole);
        assert_eq!(machine.state(), SessionState::RoleUnset);
    }
}
