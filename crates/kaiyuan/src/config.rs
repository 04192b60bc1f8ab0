use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "kaiyuan")]
#[command(about = "Kaiyuan event backend: account login and session credentials", long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Start the API server
    Serve(ServeConfig),

    /// Run database migrations
    Migrate {
        /// Database connection URL
        #[arg(
            long,
            env = "DATABASE_URL",
            default_value = "sqlite://./kaiyuan.db?mode=rwc"
        )]
        database_url: String,
    },

    /// Create a password account
    CreateUser {
        /// Database connection URL
        #[arg(
            long,
            env = "DATABASE_URL",
            default_value = "sqlite://./kaiyuan.db?mode=rwc"
        )]
        database_url: String,

        /// Display name
        #[arg(short, long)]
        username: String,

        /// Login email
        #[arg(short, long)]
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,
    },

    /// List all accounts
    ListUsers {
        /// Database connection URL
        #[arg(
            long,
            env = "DATABASE_URL",
            default_value = "sqlite://./kaiyuan.db?mode=rwc"
        )]
        database_url: String,
    },

    /// Grant a permission to an account
    GrantPermission {
        /// Database connection URL
        #[arg(
            long,
            env = "DATABASE_URL",
            default_value = "sqlite://./kaiyuan.db?mode=rwc"
        )]
        database_url: String,

        /// Account email
        #[arg(short, long)]
        email: String,

        /// Permission identifier, e.g. "event:write"
        #[arg(short = 'n', long)]
        permission: String,
    },
}

#[derive(Debug, Clone, Parser)]
pub struct ServeConfig {
    /// Database connection URL
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://./kaiyuan.db?mode=rwc"
    )]
    pub database_url: String,

    /// Server bind address
    #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:8080")]
    pub bind_address: String,

    /// Allowed CORS origins (comma-separated)
    #[arg(
        long,
        env = "CORS_ORIGINS",
        default_value = "http://localhost:3000"
    )]
    pub cors_origins: String,

    /// Log level
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// OAuth client id registered with the identity provider
    #[arg(long, env = "OAUTH_CLIENT_ID", default_value = "")]
    pub oauth_client_id: String,

    /// OAuth client secret registered with the identity provider
    #[arg(long, env = "OAUTH_CLIENT_SECRET", default_value = "")]
    pub oauth_client_secret: String,

    /// Provider endpoint exchanging an authorization code for an access token
    #[arg(long, env = "OAUTH_TOKEN_URL", default_value = "")]
    pub oauth_token_url: String,

    /// Provider endpoint returning the profile for a bearer access token
    #[arg(long, env = "OAUTH_PROFILE_URL", default_value = "")]
    pub oauth_profile_url: String,

    /// Timeout in seconds for each call to the identity provider
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value = "10")]
    pub provider_timeout_secs: u64,

    /// Secret used to sign session credentials (HS256)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: String,

    /// Session credential lifetime in seconds
    #[arg(long, env = "TOKEN_TTL_SECS", default_value = "86400")]
    pub token_ttl_secs: i64,
}

impl ServeConfig {
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn oauth_configured(&self) -> bool {
        !self.oauth_client_id.trim().is_empty()
            && !self.oauth_client_secret.trim().is_empty()
            && !self.oauth_token_url.trim().is_empty()
            && !self.oauth_profile_url.trim().is_empty()
    }

    /// Fail fast on settings that would make every login fail.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        if self.token_ttl_secs <= 0 {
            anyhow::bail!("TOKEN_TTL_SECS must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_serve_config() -> ServeConfig {
    ServeConfig {
        database_url: "sqlite::memory:".to_string(),
        bind_address: "127.0.0.1:8080".to_string(),
        cors_origins: "http://localhost:3000, http://example.com".to_string(),
        log_level: "info".to_string(),
        oauth_client_id: "client".to_string(),
        oauth_client_secret: "secret".to_string(),
        oauth_token_url: "http://provider/token".to_string(),
        oauth_profile_url: "http://provider/user".to_string(),
        provider_timeout_secs: 10,
        jwt_secret: "test-secret".to_string(),
        token_ttl_secs: 3600,
    }
}
