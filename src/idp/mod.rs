pub mod dummy;
pub mod local;
pub mod registry;
pub mod stub;

pub use registry::IdpRegistry;

use async_trait::async_trait;

use crate::clients::PortalClient;
use crate::error::FlowError;
use crate::models::AuthResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum IdpType {
    Local,
    OAuth2,
    Saml,
    Twitter,
    Dummy,
}

/// Where an IdP wants the browser sent to authenticate (§4.10).
#[derive(Debug, Clone)]
pub enum AuthorizeUiOutcome {
    /// The IdP authenticated the user itself, headlessly (the dummy IdP).
    Authenticated(AuthResponse),
    /// The browser must be redirected to `location` to continue (e.g. a login form).
    Redirect { location: String },
}

#[derive(Debug, Clone)]
pub struct IdpEndpoints {
    pub login_path: String,
}

/// The pluggable identity-provider capability (§2 leaf 5, §4.10): `{getType, getRouter,
/// authorizeWithUi, endpoints, authorizeByUserPass, checkRefreshToken}`. `getRouter` is
/// realized by each router module mounting its own login routes rather than a method
/// here, since axum routers aren't trait objects.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn get_type(&self) -> IdpType;

    fn endpoints(&self) -> IdpEndpoints;

    /// Drives the login UI portion of `AuthorizeStart`/`LoginUi` (§4.1).
    async fn authorize_with_ui(
        &self,
        auth_method_id: &str,
        portal: &PortalClient,
    ) -> Result<AuthorizeUiOutcome, FlowError>;

    /// Used only by the password grant (§4.7): authenticates a username/password pair
    /// directly, without a UI round-trip.
    async fn authorize_by_user_pass(
        &self,
        portal: &PortalClient,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, FlowError>;

    /// Used only by the refresh grant's non-passthrough branch (§4.8 case 1): confirms
    /// the user behind `authenticated_userid` is still valid for this IdP.
    async fn check_refresh_token(&self, portal: &PortalClient, authenticated_userid: &str) -> Result<(), FlowError>;
}
