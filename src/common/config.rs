// src/common/config.rs
//! Runtime configuration
//!
//! Every knob is read from the environment (after `dotenv`) and falls back to
//! its default when the variable is missing or does not parse. Demo mode can
//! additionally be toggled from the command line.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Read `key` from the environment, falling back to `default` when the
/// variable is absent or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(val) => val,
            Err(_) => {
                warn!(key = %key, value = %raw, "Ignoring unparsable configuration value");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.trim().to_lowercase() == "true")
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Lifetime of a freshly issued credential
    pub token_ttl_secs: i64,
    /// Period of the session-expiry watch
    pub expiry_check_interval_secs: u64,
    /// Period of the authentication-state refresh loop
    pub auth_refresh_interval_secs: u64,
    /// Period of the per-table synchronization loop
    pub sync_interval_secs: u64,
    /// Chance that a synchronization tick observes a new upstream row
    pub new_row_probability: f64,
    /// Rows generated when a table is created
    pub seed_row_count: usize,
    /// How far back generated dates may reach
    pub date_window_days: i64,
    /// Artificial latency applied by the stub remote collaborators
    pub simulated_latency_ms: u64,
    pub jwt_secret: String,
    /// When set, credentials persist to this JSON file instead of memory
    pub session_store_path: Option<PathBuf>,
    pub demo: DemoModeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 5 * 60,
            expiry_check_interval_secs: 60,
            auth_refresh_interval_secs: 1,
            sync_interval_secs: 5,
            new_row_probability: 0.3,
            seed_row_count: 5,
            date_window_days: 365,
            simulated_latency_ms: 0,
            jwt_secret: "replace_with_strong_secret".to_string(),
            session_store_path: None,
            demo: DemoModeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut new_row_probability =
            env_or("NEW_ROW_PROBABILITY", defaults.new_row_probability);
        if !(0.0..=1.0).contains(&new_row_probability) {
            warn!(
                value = new_row_probability,
                "NEW_ROW_PROBABILITY outside [0, 1], using default"
            );
            new_row_probability = defaults.new_row_probability;
        }

        let mut token_ttl_secs = env_or("TOKEN_TTL_SECS", defaults.token_ttl_secs);
        if token_ttl_secs <= 0 {
            warn!(value = token_ttl_secs, "TOKEN_TTL_SECS must be positive, using default");
            token_ttl_secs = defaults.token_ttl_secs;
        }

        Self {
            token_ttl_secs,
            expiry_check_interval_secs: env_or(
                "EXPIRY_CHECK_INTERVAL_SECS",
                defaults.expiry_check_interval_secs,
            )
            .max(1),
            auth_refresh_interval_secs: env_or(
                "AUTH_REFRESH_INTERVAL_SECS",
                defaults.auth_refresh_interval_secs,
            )
            .max(1),
            sync_interval_secs: env_or("SYNC_INTERVAL_SECS", defaults.sync_interval_secs).max(1),
            new_row_probability,
            seed_row_count: env_or("SEED_ROW_COUNT", defaults.seed_row_count),
            date_window_days: env_or("DATE_WINDOW_DAYS", defaults.date_window_days).max(1),
            simulated_latency_ms: env_or("SIMULATED_LATENCY_MS", defaults.simulated_latency_ms),
            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            session_store_path: env::var("SESSION_STORE_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            demo: DemoModeConfig::from_env(),
        }
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_secs)
    }

    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_check_interval_secs)
    }

    pub fn auth_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.auth_refresh_interval_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

/// Demo mode seeds a user and a table at startup so the sync loop has
/// something to show without any interactive input.
#[derive(Debug, Clone)]
pub struct DemoModeConfig {
    pub enabled: bool,
    pub user_email: String,
    pub user_name: String,
    pub user_password: String,
    pub sheet_url: String,
}

impl Default for DemoModeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            user_email: "demo@example.com".to_string(),
            user_name: "Demo User".to_string(),
            user_password: "demo-password".to_string(),
            sheet_url: "https://docs.google.com/spreadsheets/d/demo".to_string(),
        }
    }
}

impl DemoModeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_flag("DEMO_MODE", defaults.enabled),
            user_email: env::var("DEMO_USER_EMAIL").unwrap_or(defaults.user_email),
            user_name: env::var("DEMO_USER_NAME").unwrap_or(defaults.user_name),
            user_password: env::var("DEMO_USER_PASSWORD").unwrap_or(defaults.user_password),
            sheet_url: env::var("DEMO_SHEET_URL").unwrap_or(defaults.sheet_url),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Print demo mode status on startup
pub fn print_demo_mode_status(config: &DemoModeConfig) {
    if config.enabled {
        println!("🧪 DEMO MODE ENABLED");
        println!("   Demo User: {} ({})", config.user_name, config.user_email);
        println!("   Demo Sheet: {}", config.sheet_url);
        println!();
    } else {
        println!("🔒 Interactive mode - no demo data will be seeded");
    }
}

/// CLI argument parsing for demo mode
pub fn parse_demo_mode_args<I, S>(args: I) -> Option<bool>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for arg in args {
        match arg.as_ref() {
            "--demo" => return Some(true),
            "--no-demo" => return Some(false),
            _ => {}
        }
    }

    None
}

/// Override demo mode from CLI args
pub fn apply_cli_override(mut config: AppConfig) -> AppConfig {
    if let Some(cli_demo_mode) = parse_demo_mode_args(env::args().skip(1)) {
        println!("🔧 CLI override: DEMO_MODE = {}", cli_demo_mode);
        config.demo.enabled = cli_demo_mode;
    }

    config
}
