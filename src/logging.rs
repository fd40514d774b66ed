//! Run logging.
//!
//! Every run writes its log records both to stderr and to a per-run file
//! under `<outputDir>/logs/`, so a fleet host keeps a local audit trail of
//! what ran even when nobody watched the console.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::{Env, Target};

/// Writer duplicating every record to stderr and the run log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Initialize logging for a run. Creates `<outputDir>/logs/` and returns
/// the path of the new log file. Filter level defaults to "info" and is
/// overridable through `RUST_LOG` as usual.
pub fn init_run_logging(output_dir: &Path) -> Result<PathBuf> {
    let log_dir = output_dir.join("logs");
    fs::create_dir_all(&log_dir)
        .wrap_err_with(|| format!("Failed to create log directory '{}'", log_dir.display()))?;

    let timestamp = Utc::now().format("%Y%m%d-%H%M%SZ");
    let log_path = log_dir.join(format!("probemesh_run_{timestamp}.log"));
    let file = File::create(&log_path)
        .wrap_err_with(|| format!("Failed to create log file '{}'", log_path.display()))?;

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(Tee { file })))
        .init();

    log::info!("Logging to {}", log_path.display());
    Ok(log_path)
}

/// Console-only logging for subcommands that produce no run directory.
pub fn init_console_logging() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
