//! Session identity: claims, signed tokens, the permission gate and login.
//! Keep the public surface thin and split implementation across sub-modules.

mod authorizer;
mod claims;
mod provider;
mod request_context;
mod token;

pub use authorizer::{authorize, authorize_all, Decision};
pub use claims::{deserialize_permissions, AccountStatus, Claims, PermissionSet, TimeWindow};
pub use provider::{AuthProvider, DirectoryAuthProvider, LoginRequest, LoginResponse};
pub use request_context::RequestContext;
pub use token::{bearer_token, TokenError, TokenService, DEFAULT_TTL_SECS};
