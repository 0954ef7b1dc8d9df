//! Credential and secret-lifecycle core for the client onboarding portal.
//!
//! Everything security-critical that the portal's CRUD layers lean on lives
//! here: password hashing, access/refresh token issuance with server-side
//! revocation, one-time passcode verification for email and phone, field-
//! level authenticated encryption for regulated personal data (TFN, ABN,
//! signatures), and role-based authorization with audit on denial.
//!
//! The crate is transport- and storage-agnostic: HTTP routing, cookie
//! handling, template rendering and the relational engine sit behind the
//! narrow contracts in [`services`]. Components are constructed once from an
//! immutable [`config::CoreConfig`] and shared by reference across request
//! handlers.

pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod services;
pub mod utils;

pub use config::CoreConfig;
pub use error::CoreError;
pub use models::{Identity, OtpPurpose, Permission, PermissionSet};
pub use services::{Decision, FieldCipher, OtpEngine, PermissionGate, TokenService};
pub use utils::{CredentialVault, Password, PasswordHashString};
