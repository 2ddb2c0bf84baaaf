use serde::{Deserialize, Serialize};

/// JWT payload issued on login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,        // user id
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub iat: usize,         // issued at (unix timestamp)
    pub exp: usize,         // expires at (unix timestamp)
    pub iss: String,        // issuer
    pub aud: String,        // audience
}
