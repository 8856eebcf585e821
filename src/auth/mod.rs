//! # 认证模块
//!
//! 主身份提供方登录（授权码模式 + CSRF state + 身份令牌校验）、
//! 本地用户同步、数据库会话存储，以及页面与接口两种认证中间件。

pub mod gate;
pub mod identity;
pub mod jwks;
pub mod session;
pub mod state;
pub mod store;
pub mod users;

pub use gate::{CurrentUser, require_api_user, require_session};
pub use identity::{IdentityClaims, IdentityClient, ProviderTokens};
pub use session::{AuthSession, SESSION_COOKIE_NAME, SessionProfile};
pub use store::SqlSessionStore;
pub use users::{ProfileFields, UserService};
