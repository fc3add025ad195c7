use serde::{Deserialize, Serialize};

use rapport_data::Role;

/// What a signed-in user may do. Both dashboards consult these flags
/// instead of carrying their own role-specific code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCapabilities {
    pub can_validate: bool,
    pub can_edit_resources: bool,
    pub can_delete_reports: bool,
    pub can_view_all: bool,
}

impl RoleCapabilities {
    pub fn for_role(role: Role) -> Self {
        if role.is_manager() {
            Self {
                can_validate: true,
                can_edit_resources: true,
                can_delete_reports: true,
                can_view_all: true,
            }
        } else {
            Self {
                can_validate: false,
                can_edit_resources: false,
                can_delete_reports: false,
                can_view_all: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managers_get_full_capabilities() {
        let caps = RoleCapabilities::for_role(Role::Responsable);
        assert!(caps.can_validate);
        assert!(caps.can_edit_resources);
        assert!(caps.can_delete_reports);
        assert!(caps.can_view_all);

        assert_eq!(
            RoleCapabilities::for_role(Role::Admin),
            RoleCapabilities::for_role(Role::Responsable)
        );
    }

    #[test]
    fn agents_get_none() {
        let caps = RoleCapabilities::for_role(Role::Agent);
        assert!(!caps.can_validate);
        assert!(!caps.can_edit_resources);
        assert!(!caps.can_delete_reports);
        assert!(!caps.can_view_all);
    }
}
