use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Load environment variables from a dotenv file without overwriting existing ones.
///
/// Order:
/// - explicit path via ENV_FILE or DOTENV_PATH
/// - `.env` discovered from the working directory upward
///
/// Returns a description of the source used ("none" when nothing was loaded).
pub fn load_env_file() -> String {
    for key in ["ENV_FILE", "DOTENV_PATH"] {
        if let Ok(p) = std::env::var(key) {
            let p = p.trim();
            if !p.is_empty()
                && std::path::Path::new(p).is_file()
                && dotenvy::from_filename(p).is_ok()
            {
                return format!("{p} ({key})");
            }
        }
    }

    match dotenvy::dotenv() {
        Ok(path) => path.display().to_string(),
        Err(_) => "none".into(),
    }
}

/// Initialize structured tracing.
///
/// RUST_LOG wins when set; otherwise the configured level is used, with
/// `tower_http` request spans at info.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| format!("{},tower_http=info", logging.level));
    let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if logging.format == "text" {
        tracing::subscriber::set_global_default(fmt().with_env_filter(filter).finish())
    } else {
        tracing::subscriber::set_global_default(fmt().json().with_env_filter(filter).finish())
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
