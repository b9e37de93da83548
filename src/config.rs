#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub upstream_api_base: String,
    pub upstream_timeout_seconds: u64,
    pub redis_url: Option<String>,
    pub session_ttl_seconds: u64,
    pub session_key_prefix: String,
    pub cookie_secure: bool,
    pub cookie_domain: Option<String>,
    pub checkout_ttl_seconds: u64,

    // Public key id handed to the browser's payment widget.
    pub payment_gateway_key_id: Option<String>,
    pub media_upload_folder: String,
    pub cors_allowed_origin: Option<String>,
}
