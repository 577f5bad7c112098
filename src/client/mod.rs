//! Browser-side pieces of the session model: the session store, route guarding, token
//! persistence and the HTTP client that talks to the server.

pub mod api;
pub mod notify;
pub mod routes;
pub mod session;
pub mod storage;

pub use api::{ApiFailure, AuthApi, HttpAuthApi};
pub use notify::Notification;
pub use routes::{Access, Navigation, ResolvedRoute, Route, RouteTable, HOME_PATH, LOGIN_PATH};
pub use session::{decode_claims, SessionContext, SessionState, LANDING_PATH};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
