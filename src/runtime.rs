use serde::Serialize;
use std::path::PathBuf;

/// Snapshot of process and host facts shown by `lifeline info`.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeInfo {
    pub version: String,
    pub pid: u32,
    pub pointer_width: u32,
    pub is_64bit: bool,
    pub os: &'static str,
    pub arch: &'static str,
    pub executable: Option<PathBuf>,
    pub locale: String,
}

impl RuntimeInfo {
    pub fn collect() -> Self {
        let pointer_width = usize::BITS;
        let executable = match std::env::current_exe() {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::debug!(error = %e, "could not resolve executable path");
                None
            }
        };

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            pid: std::process::id(),
            pointer_width,
            is_64bit: pointer_width == 64,
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            executable,
            locale: locale_from(|key| std::env::var(key).ok()),
        }
    }
}

/// Resolve the message locale with POSIX precedence: LC_ALL, LC_MESSAGES, LANG.
/// Empty values are skipped; nothing set means the "C" locale.
fn locale_from(lookup: impl Fn(&str) -> Option<String>) -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| lookup(*key))
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "C".to_string())
}
