//! # Web 层
//!
//! 路由、处理器、响应信封与服务器启动。

pub mod handlers;
pub mod response;
pub mod routes;
pub mod server;

pub use routes::build_router;
pub use server::serve;
