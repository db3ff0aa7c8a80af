use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE: &str = "emulator.log";

/// `log` backend that appends every record to `logs/emulator.log` and echoes
/// warnings and errors to stderr.
#[derive(Debug)]
pub struct FileLogger {
    // 全域 log 檔案鎖，避免多執行緒寫入衝突
    file: Mutex<Option<File>>,
    echo: Level,
}

impl FileLogger {
    /// Opens (or creates) the log file. When the file can't be opened the
    /// logger still echoes to stderr.
    pub fn new(path: &Path) -> Self {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let file = OpenOptions::new().create(true).append(true).open(path).ok();
        FileLogger {
            file: Mutex::new(file),
            echo: Level::Warn,
        }
    }

    pub fn default_path() -> PathBuf {
        Path::new(LOG_DIR).join(LOG_FILE)
    }

    fn format(record: &Record) -> String {
        format!("[{}] {}: {}", record.level(), record.target(), record.args())
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format(record);
        if record.level() <= self.echo {
            eprintln!("{line}");
        }
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(file) = guard.as_mut() {
            let _ = writeln!(file, "{line}");
        }
    }

    fn flush(&self) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

pub fn level_for(debug: bool) -> LevelFilter {
    if debug { LevelFilter::Trace } else { LevelFilter::Info }
}

/// Installs the file logger. A second call keeps the first logger and only
/// adjusts the level.
pub fn init(debug: bool) {
    let logger: &'static FileLogger = Box::leak(Box::new(FileLogger::new(&FileLogger::default_path())));
    if log::set_logger(logger).is_err() {
        log::debug!("logger already installed");
    }
    log::set_max_level(level_for(debug));
}
