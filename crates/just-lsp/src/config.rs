//
// config.rs
//
// Server settings read from initializationOptions and
// workspace/didChangeConfiguration
//

/// Settings that change how requests are answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Apply the `{{ }}` / recipe-header context rule to hover, the same way
    /// go-to-definition does. When false, hover prefers a recipe and falls
    /// back to a variable wherever the cursor is.
    pub hover_follows_context: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hover_follows_context: true,
        }
    }
}

/// Read settings of the form `{"hover": {"followContext": bool}}`.
///
/// Returns `None` when `settings` carries none of the known sections, so the
/// caller can keep its current configuration. Unknown keys are ignored.
///
/// ```ignore
/// let cfg = parse_server_config(&json!({"hover": {"followContext": false}})).unwrap();
/// assert!(!cfg.hover_follows_context);
/// ```
pub fn parse_server_config(settings: &serde_json::Value) -> Option<ServerConfig> {
    let hover = settings.get("hover")?;

    let mut config = ServerConfig::default();

    if let Some(v) = hover.get("followContext").and_then(|v| v.as_bool()) {
        config.hover_follows_context = v;
    }

    log::info!("Configuration loaded from LSP settings:");
    log::info!("  hover_follows_context: {}", config.hover_follows_context);

    Some(config)
}
