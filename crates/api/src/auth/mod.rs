//! Authentication for internal users

pub mod invites;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod tokens;

pub use invites::{invite_state, InviteManager, InviteRecord, InviteState};
pub use jwt::{Claims, JwtError, JwtManager};
pub use middleware::{optional_auth, require_auth, AuthUser};
pub use password::{hash_password, validate_password_strength, verify_password, PasswordError};
pub use tokens::{generate_token, hash_token};
