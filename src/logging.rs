use std::io::Write;

use anyhow::Result;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use log::Level;
use serde_json::{Value, json};

use crate::cli::command::{Cli, LogFormat};

/// A log record as one JSON object.
pub fn json_record(ts: &str, level: Level, target: &str, msg: &str) -> Value {
    json!({
        "ts": ts,
        "lvl": level.as_str(),
        "target": target,
        "msg": msg,
    })
}

/// Installs the global logger.
///
/// Returns the progress container when `--progress` is set; log lines are then
/// routed through it so they do not tear the spinner.
pub fn init<'a>(cli: &Cli, multi: &'a MultiProgress) -> Result<Option<&'a MultiProgress>> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(cli.loglevel.to_level_filter());

    match cli.log_format {
        LogFormat::Plain => {
            builder.format_timestamp_secs();
        }
        LogFormat::Json => {
            builder.format(|buf, record| {
                let line = json_record(
                    &buf.timestamp().to_string(),
                    record.level(),
                    record.target(),
                    &record.args().to_string(),
                );
                writeln!(buf, "{line}")
            });
        }
    }

    if !cli.progress {
        builder.try_init()?;
        return Ok(None);
    }

    LogWrapper::new(multi.clone(), builder.build()).try_init()?;
    Ok(Some(multi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_record_escapes_message() -> Result<()> {
        let msg = "page \"7\"\tskipped\n\u{1}";
        let record = json_record("2026-01-01T00:00:00Z", Level::Warn, "oggpcm::process", msg);
        let line = record.to_string();

        assert!(!line.contains('\n'));
        assert!(line.contains(r#"\"7\""#));
        assert!(line.contains(r"\u0001"));

        let parsed: Value = serde_json::from_str(&line)?;
        assert_eq!(parsed["msg"], msg);
        assert_eq!(parsed["lvl"], "WARN");
        assert_eq!(parsed["target"], "oggpcm::process");
        Ok(())
    }
}
