//! Operator commands typed into a sample stream.
//!
//! Lines starting with `!` are commands, everything else belongs to the
//! link:
//!
//! | Line                   | Command                                 |
//! |------------------------|-----------------------------------------|
//! | `!height <cm>`         | `SetDesiredHeight`                      |
//! | `!mode`                | `CycleMode`                             |
//! | `!power <pct>`         | `SetManualPower`                        |
//! | `!calibrate <history>` | `Recalibrate` from a history CSV file   |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;

use crate::app::commands::OperatorCommand;
use crate::calibration::history::parse_history;
use crate::calibration::{CalibrationResult, Calibrator};
use crate::config::SystemConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorLine {
    Command(OperatorCommand),
    /// Recalibrate from the history log at this path.
    Calibrate(PathBuf),
}

/// `None` for link lines and malformed commands.
pub fn parse_operator_line(line: &str) -> Option<OperatorLine> {
    let mut parts = line.trim().strip_prefix('!')?.split_whitespace();
    let cmd = parts.next()?;
    let arg = parts.next();
    let value = arg.and_then(|v| v.parse::<f32>().ok());
    let command = match (cmd, value) {
        ("height", Some(h)) => OperatorCommand::SetDesiredHeight(h),
        ("mode", _) => OperatorCommand::CycleMode,
        ("power", Some(p)) => OperatorCommand::SetManualPower(p),
        ("calibrate", _) => return arg.map(|p| OperatorLine::Calibrate(PathBuf::from(p))),
        _ => return None,
    };
    Some(OperatorLine::Command(command))
}

/// Parse and calibrate a history log.
pub fn calibrate_from_file(path: &Path, config: &SystemConfig) -> Result<CalibrationResult> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let parsed = parse_history(&text);
    if parsed.skipped > 0 {
        warn!(
            "CALIB: skipped {} malformed lines in {}",
            parsed.skipped,
            path.display()
        );
    }
    Calibrator::new(config)
        .calibrate(&parsed.records)
        .with_context(|| format!("calibrating from {}", path.display()))
}

/// Turn a parsed line into a command the arbiter accepts.
pub fn resolve(line: OperatorLine, config: &SystemConfig) -> Result<OperatorCommand> {
    match line {
        OperatorLine::Command(cmd) => Ok(cmd),
        OperatorLine::Calibrate(path) => Ok(OperatorCommand::Recalibrate(Box::new(
            calibrate_from_file(&path, config)?,
        ))),
    }
}
