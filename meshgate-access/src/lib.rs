//! MESHGATE Access - Namespace Permissions and Redaction
//!
//! Hierarchical namespace grants, the static handler table for namespaces
//! with special rules, and the redaction pass that strips whatever a
//! requester may not read from a rendered response.

pub mod grants;
pub mod handlers;
pub mod redaction;

pub use grants::{GrantTable, PermissionEvaluator, PermissionSet, Principal, RequesterIdentity};
pub use handlers::{
    ConditionalFn, HandlerTable, NamespaceHandler, PermissionCheck, MEMBER_LIST_URL_FIELD,
    MEMBER_LIST_VISIBILITY_FIELD,
};
pub use redaction::{RedactionOutcome, RedactionPass};
