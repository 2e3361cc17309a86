pub mod credential_store;
pub mod dashboard;
pub mod gateway;
pub mod session;

pub use credential_store::{CredentialStore, FileMedium, MemoryMedium, StorageMedium};
pub use dashboard::DashboardApi;
pub use gateway::{GatewayClient, GatewayResponse};
pub use session::{SessionManager, SubscriptionId};
