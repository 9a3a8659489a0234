use std::{env, io::Write};

use chrono::Duration;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::json;
use slm_common::Secret;
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_SLM_HOST: &str = "127.0.0.1";
const DEFAULT_SLM_PORT: u16 = 8360;
const DEFAULT_SLM_DATABASE_URL: &str = "sqlite://data/seamline.db";
const DEFAULT_SHUTDOWN_GRACE_PERIOD: u64 = 3;
const DEFAULT_ACCESS_TOKEN_VALIDITY: Duration = Duration::minutes(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Seconds the server waits for in-flight requests to finish after a shutdown signal.
    pub shutdown_grace_period: u64,
    pub auth: AuthConfig,
    /// The key the payment gateway signs webhook bodies with. When it is not configured, the
    /// webhook scope accepts unsigned requests.
    pub payment_webhook_secret: Option<Secret<String>>,
    /// If true, a pending Pay First order is approved as soon as the gateway confirms its
    /// payment, without waiting for the manager.
    pub auto_approve_on_payment: bool,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address,
    /// rather than the connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather
    /// than the connection's remote address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SLM_HOST.to_string(),
            port: DEFAULT_SLM_PORT,
            database_url: DEFAULT_SLM_DATABASE_URL.to_string(),
            shutdown_grace_period: DEFAULT_SHUTDOWN_GRACE_PERIOD,
            auth: AuthConfig::default(),
            payment_webhook_secret: None,
            auto_approve_on_payment: false,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SLM_HOST").ok().unwrap_or_else(|| DEFAULT_SLM_HOST.into());
        let port = env::var("SLM_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SLM_PORT. {e} Using the default, {DEFAULT_SLM_PORT}, instead."
                    );
                    DEFAULT_SLM_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SLM_PORT);
        let database_url = env::var("SLM_DATABASE_URL").ok().unwrap_or_else(|| {
            error!(
                "🪛️ SLM_DATABASE_URL is not set. Using the default, {DEFAULT_SLM_DATABASE_URL}, which is only \
                 suitable for local development."
            );
            DEFAULT_SLM_DATABASE_URL.to_string()
        });
        let shutdown_grace_period = env::var("SLM_SHUTDOWN_GRACE_PERIOD")
            .map_err(|_| {
                info!(
                    "🪛️ SLM_SHUTDOWN_GRACE_PERIOD is not set. Using the default value of \
                     {DEFAULT_SHUTDOWN_GRACE_PERIOD}s."
                )
            })
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for SLM_SHUTDOWN_GRACE_PERIOD. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_SHUTDOWN_GRACE_PERIOD);
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let payment_webhook_secret = match env::var("SLM_PAYMENT_WEBHOOK_SECRET") {
            Ok(s) if !s.is_empty() => Some(Secret::new(s)),
            _ => {
                warn!(
                    "🚨️ SLM_PAYMENT_WEBHOOK_SECRET is not set. Payment webhook signatures will NOT be checked. Do \
                     not run a production instance like this."
                );
                None
            },
        };
        let auto_approve_on_payment =
            env::var("SLM_AUTO_APPROVE_ON_PAYMENT").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let use_x_forwarded_for =
            env::var("SLM_USE_X_FORWARDED_FOR").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let use_forwarded = env::var("SLM_USE_FORWARDED").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        Self {
            host,
            port,
            database_url,
            shutdown_grace_period,
            auth,
            payment_webhook_secret,
            auto_approve_on_payment,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret used to sign and verify the access tokens this server issues.
    pub jwt_signing_key: Secret<String>,
    /// The shared secret the identity provider signs login tokens with.
    pub identity_secret: Secret<String>,
    /// How long an issued access token stays valid.
    pub access_token_validity: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT signing key has not been set. I'm using a random value for this session. DO NOT operate \
             on production like this since every issued token dies with this process. 🚨️🚨️🚨️"
        );
        let jwt_signing_key = random_key();
        let identity_secret = random_key();
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({
                    "jwt_signing_key": jwt_signing_key,
                    "identity_secret": identity_secret,
                })
                .to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The session keys were written to {}. If this is a production instance, you are \
                         doing it wrong! Set the SLM_JWT_SIGNING_KEY and SLM_IDENTITY_SECRET environment variables \
                         instead. 🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the session keys to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the session keys.");
            },
        }
        Self {
            jwt_signing_key: Secret::new(jwt_signing_key),
            identity_secret: Secret::new(identity_secret),
            access_token_validity: DEFAULT_ACCESS_TOKEN_VALIDITY,
        }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let jwt_signing_key = env::var("SLM_JWT_SIGNING_KEY")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [SLM_JWT_SIGNING_KEY]")))?;
        if jwt_signing_key.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "SLM_JWT_SIGNING_KEY must be at least 32 characters long.".to_string(),
            ));
        }
        let identity_secret = env::var("SLM_IDENTITY_SECRET")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [SLM_IDENTITY_SECRET]")))?;
        let access_token_validity = access_token_validity_from_env();
        Ok(Self {
            jwt_signing_key: Secret::new(jwt_signing_key),
            identity_secret: Secret::new(identity_secret),
            access_token_validity,
        })
    }
}

fn access_token_validity_from_env() -> Duration {
    env::var("SLM_ACCESS_TOKEN_VALIDITY")
        .map_err(|_| {
            info!(
                "🪛️ SLM_ACCESS_TOKEN_VALIDITY is not set. Using the default value of {} minutes.",
                DEFAULT_ACCESS_TOKEN_VALIDITY.num_minutes()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::minutes)
                .map_err(|e| warn!("🪛️ Invalid configuration value for SLM_ACCESS_TOKEN_VALIDITY. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_ACCESS_TOKEN_VALIDITY)
}

fn random_key() -> String {
    thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect()
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------

/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep
/// this as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub auto_approve_on_payment: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            auto_approve_on_payment: config.auto_approve_on_payment,
        }
    }
}
