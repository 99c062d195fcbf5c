pub mod flow_state;
pub mod gateway;
pub mod portal;

pub use flow_state::{AuthRequest, AuthResponse, ExistingGrant, GrantProcessInfo};
pub use gateway::GatewayOAuth2Config;
pub use portal::{Application, ApiDescriptor, Grant, PortalUser, Registration, RegistrationPool, Subscription};
