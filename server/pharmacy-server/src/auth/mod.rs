pub mod tokens;

pub use tokens::{Claims, JwtService, Role, TokenError};
