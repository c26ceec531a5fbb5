use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex};
use std::thread;

// Log entry structure
struct LogEntry {
    domain: String,
    message: String,
    timestamp: String,
}

lazy_static::lazy_static! {
    static ref LOG_TX: Mutex<Option<mpsc::Sender<LogEntry>>> = Mutex::new(None);
    static ref LOG_DIR_PATH: Mutex<Option<PathBuf>> = Mutex::new(None);
}

/// Install the process-wide logger: terminal plus `logs/app.log`.
pub fn init(root: &Path, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_dir = root.join("logs");
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory {:?}: {}", log_dir, e);
    }

    let term: Box<dyn SharedLogger> =
        TermLogger::new(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto);
    let result = match open_append(&log_dir.join("app.log")) {
        Ok(file) => CombinedLogger::init(vec![term, WriteLogger::new(level, Config::default(), file)]),
        Err(e) => {
            eprintln!("Failed to open app.log, logging to terminal only: {}", e);
            CombinedLogger::init(vec![term])
        }
    };
    if let Err(e) = result {
        eprintln!("Logger already initialized: {}", e);
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize the log directory and start the background domain-log thread
pub fn init_log_dir(path: PathBuf) {
    // Store path for panic hook
    if let Ok(mut dir) = LOG_DIR_PATH.lock() {
        *dir = Some(path.clone());
    }

    let (tx, rx) = mpsc::channel::<LogEntry>();

    if let Ok(mut global_tx) = LOG_TX.lock() {
        *global_tx = Some(tx);
    }

    thread::spawn(move || {
        let mut file_cache: HashMap<&'static str, File> = HashMap::new();
        let log_dir = path.join("logs");

        if !log_dir.exists() {
            let _ = std::fs::create_dir_all(&log_dir);
        }

        while let Ok(entry) = rx.recv() {
            let (filename, domain_prefix) = match entry.domain.as_str() {
                "audit" => ("audit.log", "[AUDIT]"),
                "crash" => ("crash.log", "[CRASH]"),
                _ => ("custom.log", ""),
            };

            let file = match file_cache.entry(filename) {
                std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::hash_map::Entry::Vacant(e) => {
                    match open_append(&log_dir.join(filename)) {
                        Ok(file) => e.insert(file),
                        Err(err) => {
                            eprintln!("Failed to open {}: {}", filename, err);
                            continue;
                        }
                    }
                }
            };

            let final_message =
                if !domain_prefix.is_empty() && !entry.message.contains(domain_prefix) {
                    format!("{} {}", domain_prefix, entry.message)
                } else {
                    entry.message
                };

            if let Err(e) = writeln!(file, "[{}] {}", entry.timestamp, final_message) {
                eprintln!("Failed to write log: {}", e);
                // Reopen on the next entry.
                file_cache.remove(filename);
            }
        }
    });
}

/// Setup panic hook to log crashes to crash.log
/// Note: Panic hook runs in the crashing thread, so we avoid using the channel
/// to ensure we can write even if the logger thread is dead or deadlocked.
pub fn setup_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let msg = format!(
            "{}\nBacktrace: {:?}\n",
            info,
            std::backtrace::Backtrace::capture()
        );
        eprintln!("{}", msg);

        if let Ok(guard) = LOG_DIR_PATH.lock() {
            if let Some(ref dir) = *guard {
                let crash_file = dir.join("logs").join("crash.log");
                if let Some(parent) = crash_file.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }

                if let Ok(mut file) = open_append(&crash_file) {
                    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                    let _ = writeln!(file, "[{}] {}", timestamp, msg);
                }
            }
        }
    }));
}

/// Queue a message to be written to a specialized domain log file
pub fn write_domain_log(domain: &str, message: &str) -> std::io::Result<()> {
    if let Ok(guard) = LOG_TX.lock() {
        if let Some(tx) = &*guard {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            let _ = tx.send(LogEntry {
                domain: domain.to_string(),
                message: message.to_string(),
                timestamp,
            });
            return Ok(());
        }
    }
    // Unit tests and library embedders may never initialize the domain logs.
    Err(std::io::Error::other("Logger not initialized"))
}
