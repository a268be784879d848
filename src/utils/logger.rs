use std::io;
use std::path::Path;
use std::sync::Mutex;

use backtrace::Backtrace;
use slog::{o, Drain, Logger};

/// Builds the process logger: JSON records on stdout.
pub fn get_logger() -> Logger {
    let drain = slog_json::Json::default(io::stdout()).fuse();
    let drain = Mutex::new(drain).fuse();
    Logger::root(drain, o!())
}

/// Captures the current stack as "dir/file:line func" lines, for attaching
/// to error log records.
pub fn error_trace() -> String {
    let bt = Backtrace::new();
    let mut lines = Vec::new();

    for frame in bt.frames() {
        for symbol in frame.symbols() {
            let func = symbol
                .name()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".to_owned());
            let source = symbol
                .filename()
                .and_then(|p| p.to_str())
                .map(|s| {
                    // Keep only the last two path components.
                    let path = Path::new(s);
                    match (path.parent().and_then(|p| p.file_name()), path.file_name()) {
                        (Some(parent), Some(file)) => {
                            format!("{}/{}", parent.to_string_lossy(), file.to_string_lossy())
                        }
                        _ => s.to_owned(),
                    }
                })
                .unwrap_or_else(|| "unknown".to_owned());
            let line = symbol.lineno().unwrap_or(0);
            lines.push(format!("{}:{} {}", source, line, func));
        }
    }

    lines.join("\n")
}
