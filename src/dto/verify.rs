use serde::Deserialize;

/// Body of `POST /verify` and `POST /verifyemail` (§4.5): the verification id the user
/// followed from their email.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyForm {
    pub id: String,
}

/// Body of `POST /forgotpassword` (§4.5/§7): answered identically whether or not the
/// email is registered, to avoid leaking account existence.
#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}
