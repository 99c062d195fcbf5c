pub mod cookie;

pub use cookie::{mint_cookie, verify_cookie, SESSION_COOKIE_NAME};
