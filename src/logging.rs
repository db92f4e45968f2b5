use std::io::Write;

use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;

/// Maps the classic `-debug`/`--verbose` level onto a log filter.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install a stderr logger with local timestamps. Safe to call more than once;
/// only the first call wins.
pub fn init(verbosity: u8) {
    let _ = Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%x - %I:%M.%S%p"),
                record.level(),
                record.args()
            )
        })
        .filter_level(level_for(verbosity))
        .target(Target::Stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(7), LevelFilter::Trace);
    }
}
