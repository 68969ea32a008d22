pub mod error;
pub mod secret;
pub mod vault;

pub use error::VaultError;
pub use secret::{hash, verify, Commitment, Secret, SECRET_LEN};
pub use vault::SecretVault;
