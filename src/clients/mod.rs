pub mod gateway;
pub mod portal;

pub use gateway::GatewayClient;
pub use portal::PortalClient;
