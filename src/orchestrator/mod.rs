pub mod flow;
pub mod password_grant;
pub mod refresh_grant;
pub mod scope;

pub use flow::{AuthorizeOutcome, FlowOrchestrator};
