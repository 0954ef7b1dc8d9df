pub mod credential;
pub mod otp_record;
pub mod permission;
pub mod refresh_token;

pub use credential::Credential;
pub use otp_record::{OtpChannel, OtpPurpose, OtpRecord};
pub use permission::{Identity, Permission, PermissionSet, Role};
pub use refresh_token::RefreshToken;
