// Role model and the access-rule evaluator guarding every server action

pub mod evaluator;
pub mod roles;

pub use evaluator::{check_authorization, evaluate_access, AccessRule, ResolvedAccess};
pub use roles::{OrganizationRole, ProjectPermission, TeamRole};
