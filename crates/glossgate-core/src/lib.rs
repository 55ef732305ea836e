pub mod acl;
pub mod engine;
pub mod model;
pub mod policy;
pub mod session;
pub mod token;

pub use acl::{AclAction, AclEntry, AclPermission, AclSource, GrantAclSource};
pub use engine::{
    CheckEngine, CheckError, CheckRequest, CheckResult, DirectEngine, PermissionReader,
    PrincipalResolution, PrincipalResolver, PrincipalSet,
};
pub use model::{
    Actor, ActorId, CompositeId, DefaultFor, Grant, GrantId, GrantScope, OrganizationId,
    PermissionTemplate, SessionId, SubjectRef, TemplateId, VisibilityState,
};
pub use policy::{GrantQuery, Policy};
pub use session::resolve_effective_session;
pub use token::PrincipalToken;
