use std::env;

use crate::crypto::ClaimKey;

/// Process configuration, loaded once at startup.
///
/// Required settings cause startup to fail with a list of every missing
/// variable, so a misconfigured deployment never serves traffic.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Xendit secret API key for invoice creation/lookup.
    pub gateway_api_key: String,
    /// Shared secret the gateway sends in the x-callback-token header.
    pub callback_token: String,
    /// Master key for claim-link encryption (base64, 32 bytes decoded).
    pub claim_key: ClaimKey,
    /// Resend API key for outbound fulfillment email.
    pub mail_api_key: String,
    pub mail_from: String,
    pub mail_subject: String,
    /// Where the gateway redirects the buyer after checkout.
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
    /// Public origin of this server, used to build image URLs.
    pub server_origin: String,
    /// Frontend origin, used to build claim links.
    pub frontend_origin: String,
    /// Directory holding product zip archives.
    pub zip_dir: String,
    /// Directory holding product images, served under /static.
    pub static_dir: String,
    pub dev_mode: bool,
}

impl Config {
    /// Load configuration from the environment (and .env in dev).
    /// Returns an error naming every missing required variable.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("BOOKSHIP_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let mut missing = Vec::new();
        let mut required = |name: &'static str| -> String {
            match env::var(name) {
                Ok(v) if !v.trim().is_empty() => v,
                _ => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let gateway_api_key = required("XENDIT_API_KEY");
        let callback_token = required("XENDIT_CALLBACK_TOKEN");
        let claim_key_b64 = required("CLAIM_MASTER_KEY");
        let mail_api_key = required("RESEND_API_KEY");
        let mail_from = required("EMAIL_SENDER_FROM");
        let success_redirect_url = required("SUCCESS_PAYMENT_URL");
        let failure_redirect_url = required("FAILED_PAYMENT_URL");
        let server_origin = required("SERVER_ORIGIN");
        let frontend_origin = required("FRONTEND_ORIGIN");

        if !missing.is_empty() {
            return Err(format!(
                "Missing required configuration: {}",
                missing.join(", ")
            ));
        }

        let claim_key = ClaimKey::from_base64(&claim_key_b64)
            .map_err(|e| format!("CLAIM_MASTER_KEY: {}", e))?;

        Ok(Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "bookship.db".to_string()),
            gateway_api_key,
            callback_token,
            claim_key,
            mail_api_key,
            mail_from,
            mail_subject: env::var("EMAIL_SENDER_SUBJECT")
                .unwrap_or_else(|_| "Your e-book purchase".to_string()),
            success_redirect_url,
            failure_redirect_url,
            server_origin,
            frontend_origin,
            zip_dir: env::var("ZIP_DIR").unwrap_or_else(|_| "_zip".to_string()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "public/static".to_string()),
            dev_mode,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
