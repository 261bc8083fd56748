use chrono::Local;
use simplelog::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// "debug" | "info" | "warn" | "error" | "trace" | "off"; anything else is Info
pub fn level_from_str(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// log_<date>_<time>.txt inside `dir`
pub fn log_file_name(dir: &Path) -> PathBuf {
    let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
    dir.join(format!("log_{}.txt", date_and_time))
}

/// Terminal logger plus, when `log_to_file` is set, a timestamped log file in the working
/// directory. Returns the file path when one was created. A second call is a no-op since the
/// global logger can only be set once.
pub fn init_logger(level: &str, log_to_file: bool) -> Option<PathBuf> {
    let level = level_from_str(level);
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    let mut file_name = None;
    if log_to_file {
        let name = log_file_name(Path::new("."));
        match File::create(&name) {
            Ok(file) => {
                loggers.push(WriteLogger::new(level, Config::default(), file));
                file_name = Some(name);
            }
            Err(e) => eprintln!("cannot create log file {}: {}", name.display(), e),
        }
    }
    if CombinedLogger::init(loggers).is_err() {
        return None;
    }
    file_name
}
