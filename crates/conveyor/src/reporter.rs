/// Sink for user-facing progress and advisories.
pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Writes `[info]`, `[warn]` and `[error]` lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("{}", format_line("info", msg));
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("{}", format_line("warn", msg));
    }

    fn error(&mut self, msg: &str) {
        eprintln!("{}", format_line("error", msg));
    }
}

/// Forwards to `tracing` at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn info(&mut self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn warn(&mut self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn error(&mut self, msg: &str) {
        tracing::error!("{msg}");
    }
}

fn format_line(level: &str, msg: &str) -> String {
    format!("[{level}] {msg}")
}
