pub mod password;

pub use password::{CredentialVault, Password, PasswordHashString};
