//! Tracing subscriber setup

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Log level for a `-v` style verbosity count
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install a formatting subscriber for screenrec logs
///
/// `RUST_LOG` is honored; the verbosity only sets the `screenrec` target.
/// Returns `false` if a global subscriber was already installed.
pub fn init(verbosity: u8) -> bool {
    let mut filter = EnvFilter::from_default_env();
    match format!("screenrec_core={}", level_for(verbosity)).parse::<Directive>() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring log directive: {}", e),
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for(0), Level::WARN);
        assert_eq!(level_for(1), Level::INFO);
        assert_eq!(level_for(2), Level::DEBUG);
        assert_eq!(level_for(9), Level::TRACE);
    }

    #[test]
    fn test_init_twice() {
        init(1);
        assert!(!init(2));
    }
}
