// Structured logging setup for hosts embedding the orchestrator
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Logging options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
    /// Emit one JSON object per event instead of human-readable lines
    pub json: bool,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: false,
            service_name: "switchboard".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Defaults overlaid with `SWITCHBOARD_LOG_FORMAT=json` and `SWITCHBOARD_SERVICE_NAME`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("SWITCHBOARD_LOG_FORMAT") {
            cfg.json = v.trim().eq_ignore_ascii_case("json");
        }
        if let Ok(v) = std::env::var("SWITCHBOARD_SERVICE_NAME") {
            if !v.trim().is_empty() {
                cfg.service_name = v.trim().to_string();
            }
        }
        cfg
    }
}

/// Install the global subscriber. Returns false if one was already installed.
pub fn init_tracing(config: &TelemetryConfig) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let json_layer = config.json.then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!config.json).then(tracing_subscriber::fmt::layer);

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .is_ok();

    if installed {
        info!(
            target: "telemetry",
            service_name = %config.service_name,
            json = config.json,
            "Tracing initialized"
        );
    }
    installed
}
