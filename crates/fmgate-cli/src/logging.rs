//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Crates whose logs `--verbose` raises to debug.
const CRATES: [&str; 4] = ["fmgate_core", "fmgate_proxy", "fmgate_runtime", "fmgate_cli"];

/// Filter used when `RUST_LOG` is not set.
///
/// Single-prompt runs only report warnings so the answer is not buried.
pub fn default_directives(verbose: bool, single_prompt: bool) -> String {
    let base = if single_prompt { "warn" } else { "info" };
    if !verbose {
        return base.to_string();
    }
    CRATES
        .iter()
        .fold(base.to_string(), |acc, krate| format!("{acc},{krate}=debug"))
}

/// Install the global subscriber.
///
/// Server logs go to stdout. In single-prompt mode they go to stderr so
/// stdout carries only the generated text.
pub fn init_logging(verbose: bool, single_prompt: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose, single_prompt)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).compact();
    // A second init (tests, embedding) is not an error worth failing on.
    let _ = if single_prompt {
        builder.with_writer(std::io::stderr).try_init()
    } else {
        builder.with_writer(std::io::stdout).try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives(false, false), "info");
        assert_eq!(default_directives(false, true), "warn");

        let verbose = default_directives(true, false);
        assert!(verbose.starts_with("info,"));
        assert!(verbose.contains("fmgate_proxy=debug"));
        assert!(verbose.parse::<EnvFilter>().is_ok());
    }
}
