//! Service configuration from flags, environment and `.env`

use crate::auth::token::ExpiredTokenPolicy;
use crate::middleware::RateLimitConfig;
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "cmt-admin")]
#[command(about = "Client master tracker admin backend")]
pub struct Config {
    /// HTTP listen port
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path to the SQLite database
    #[arg(long, env = "DB_PATH", default_value = "cmt_admin.db")]
    pub db_path: String,

    /// Lifetime of a login token, in minutes
    #[arg(long, env = "TOKEN_TTL_MINUTES", default_value_t = 180)]
    pub token_ttl_minutes: i64,

    /// What to do with a matching token after it expired
    #[arg(long, env = "EXPIRED_TOKEN_POLICY", value_enum, default_value_t = ExpiredTokenPolicy::Accept)]
    pub expired_token_policy: ExpiredTokenPolicy,

    /// Login attempts allowed per client IP per window
    #[arg(long, env = "LOGIN_RATE_LIMIT", default_value_t = 10)]
    pub login_rate_limit: u32,

    #[arg(long, env = "LOGIN_RATE_WINDOW_SECS", default_value_t = 60)]
    pub login_rate_window_secs: u64,

    /// Email of the super admin seeded into an empty database
    #[arg(long, env = "ADMIN_EMAIL", default_value = "admin@example.com")]
    pub admin_email: String,

    #[arg(long, env = "ADMIN_PASSWORD", default_value = "admin12345", hide_env_values = true)]
    pub admin_password: String,
}

impl Config {
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.token_ttl_minutes.max(1))
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.login_rate_limit.max(1),
            window: Duration::from_secs(self.login_rate_window_secs.max(1)),
        }
    }
}
