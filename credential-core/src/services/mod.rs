pub mod audit;
pub mod field_cipher;
pub mod notification;
pub mod otp;
pub mod permission_gate;
pub mod store;
pub mod token;

pub use audit::{AuditEvent, AuditEventKind, AuditSink, RecordingAuditSink, TracingAuditSink};
pub use field_cipher::{FieldCipher, ENVELOPE_PREFIX};
pub use notification::{EmailTemplate, NotificationProvider, RecordingNotifier, SentMessage};
pub use otp::{spawn_cleanup, OtpEngine, OtpReceipt};
pub use permission_gate::{Decision, PermissionGate, RequestMeta};
pub use store::{
    InMemoryOtpStore, InMemoryRefreshTokenStore, InMemoryRoleDirectory, OtpStore,
    RefreshTokenStore, RoleDirectory,
};
pub use token::{AccessClaims, TokenPair, TokenService};
