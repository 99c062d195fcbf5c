pub mod oauth;
pub mod profile;
pub mod verify;

pub use oauth::{
    AuthorizeQuery, GrantDecisionForm, LoginForm, OpenIdConfiguration, RegisterForm, SelectNamespaceForm, TokenRequest,
    TokenResponse,
};
pub use profile::OidcProfile;
pub use verify::{ForgotPasswordForm, VerifyForm};
