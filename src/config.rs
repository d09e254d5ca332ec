use serde::Deserialize;

/// Token path appended to the login URL when none is configured.
pub const DEFAULT_TOKEN_PATH: &str = "/services/oauth2/token";

/// Identity settings for a [`JwtBearer`](crate::JwtBearer), in a shape any
/// serde-backed configuration source can fill in.
///
/// ```toml
/// client_id = "3MVG9..."
/// username = "integration@example.com"
/// login_url = "https://login.salesforce.com"
/// # token_path = "/services/oauth2/token"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JwtBearerConfig {
    /// OAuth client identifier, sent as `iss`.
    pub client_id: String,
    /// User to request a token for, sent as `sub`.
    pub username: String,
    /// Identity provider login URL, sent as `aud`.
    pub login_url: String,
    /// Path of the token endpoint relative to `login_url`.
    #[serde(default = "default_token_path")]
    pub token_path: String,
}

fn default_token_path() -> String {
    DEFAULT_TOKEN_PATH.to_string()
}
