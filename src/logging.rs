use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

/// Picks the first usable directive from `SPOTS_LOG`, `RUST_LOG`, then the
/// config file, falling back to warnings only.
pub fn resolve_filter(
    spots_log: Option<&str>,
    rust_log: Option<&str>,
    configured: Option<&str>,
) -> EnvFilter {
    [spots_log, rust_log, configured]
        .into_iter()
        .flatten()
        .filter(|directive| !directive.trim().is_empty())
        .find_map(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the stderr subscriber. Repeated calls are ignored so tests and
/// the binary can both call it.
pub fn init_logging(configured: Option<&str>) {
    let spots_log = std::env::var("SPOTS_LOG").ok();
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = resolve_filter(spots_log.as_deref(), rust_log.as_deref(), configured);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::resolve_filter;

    #[test]
    fn first_non_blank_source_wins() {
        let filter = resolve_filter(Some("  "), Some("artspots=debug"), Some("error"));
        assert_eq!(filter.to_string(), "artspots=debug");
    }

    #[test]
    fn falls_back_to_config_then_warn() {
        assert_eq!(resolve_filter(None, None, Some("info")).to_string(), "info");
        assert_eq!(resolve_filter(None, None, None).to_string(), "warn");
    }
}
