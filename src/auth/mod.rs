//! Authentication and authorization module

pub mod guard;
pub mod jwt;
pub mod middleware;
pub mod share_token;

pub use guard::{authorize, authorize_global, GlobalGuard, Guard};
pub use jwt::{Claims, JwtService};
pub use middleware::{authenticate, bearer_token, AuthContext};
pub use share_token::ShareTokenGenerator;
