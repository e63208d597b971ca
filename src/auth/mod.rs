//! Authentication and authorization
//!
//! Provides:
//! - JWT session tokens for the admin backend
//! - Password hashing with Argon2
//! - Step-up password re-verification for restore operations

pub mod jwt;
pub mod password;

pub use jwt::{extract_bearer, Claims, JwtValidator};
pub use password::{hash_password, verify_password};
