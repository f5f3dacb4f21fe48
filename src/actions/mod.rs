//! Named server actions. Every mutation the API offers is one `ServerAction`, run through
//! the same pipeline: validate input, authorize, execute, invalidate caches.

pub mod api_keys;
pub mod contacts;
pub mod integrations;
pub mod organizations;
pub mod pipeline;
pub mod registry;
pub mod segments;
pub mod surveys;
pub mod teams;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::authz::{AccessRule, OrganizationRole, ProjectPermission};
use crate::cache::CacheTag;
use crate::middleware::AuthUser;
use crate::services::{ServiceResult, Validate};
use crate::state::AppState;

pub use pipeline::run_action;
pub use registry::{ActionRegistry, DynAction};

/// Who is calling and with which shared handles
pub struct ActionContext<'a> {
    pub state: &'a AppState,
    pub user: &'a AuthUser,
}

/// Authorization requirement of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Any signed-in user
    Authenticated,
    /// At least one of `rules` must hold inside the organization
    Rules {
        organization_id: Uuid,
        rules: Vec<AccessRule>,
    },
}

impl Access {
    pub fn organization(organization_id: Uuid, rules: Vec<AccessRule>) -> Self {
        Access::Rules { organization_id, rules }
    }

    pub fn org_admins(organization_id: Uuid) -> Self {
        Self::organization(organization_id, vec![AccessRule::org_admins()])
    }

    pub fn org_members(organization_id: Uuid) -> Self {
        Self::organization(
            organization_id,
            vec![AccessRule::Organization {
                roles: vec![OrganizationRole::Owner, OrganizationRole::Manager, OrganizationRole::Member],
            }],
        )
    }
}

#[async_trait]
pub trait ServerAction: Send + Sync + 'static {
    const NAME: &'static str;

    type Input: DeserializeOwned + Validate + Send + Sync;
    type Output: Serialize + Send + Sync;

    /// Resolve which grants allow this call. Runs after validation and before `execute`.
    async fn access(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Access>;

    async fn execute(&self, ctx: &ActionContext<'_>, input: &Self::Input) -> ServiceResult<Self::Output>;

    /// Cache tags dropped after a successful `execute`
    fn invalidations(&self, _input: &Self::Input, _output: &Self::Output) -> Vec<CacheTag> {
        Vec::new()
    }
}

/// Owner or manager of the environment's organization, or a team member holding `min` on its project
pub async fn environment_access(
    ctx: &ActionContext<'_>,
    environment_id: Uuid,
    min: ProjectPermission,
) -> ServiceResult<Access> {
    let scope = ctx.state.organizations().environment_scope(environment_id).await?;
    Ok(Access::organization(
        scope.organization_id,
        vec![AccessRule::org_admins(), AccessRule::project(scope.project_id, min)],
    ))
}
