//! Authentication: token codec, request gate and handler extractor.

pub mod extractor;
pub mod gate;
pub mod jwt;
pub mod password;
pub mod types;

pub use extractor::Auth;
pub use gate::{bearer_token, AuthGate, AuthRejection};
pub use jwt::{TokenCodec, TokenError};
pub use password::{hash_password, verify_dummy_password, verify_password, DUMMY_PASSWORD_HASH};
pub use types::{Claims, Principal};
