use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_SETTINGS_FILE: &str = "workstation.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub poll_interval_ms: u64,
    pub retry_delay_ms: u64,
    /// Consecutive transport failures tolerated while polling; `None` retries forever.
    pub max_transport_retries: Option<u32>,
    pub dpi: Option<u32>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".into(),
            poll_interval_ms: 2000,
            retry_delay_ms: 5000,
            max_transport_retries: None,
            dpi: None,
        }
    }
}

impl ClientSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server_url: Option<String>,
    poll_interval_ms: Option<u64>,
    retry_delay_ms: Option<u64>,
    max_transport_retries: Option<u32>,
    dpi: Option<u32>,
}

/// Defaults, then `workstation.toml` in the working directory, then environment.
pub fn load_settings() -> anyhow::Result<ClientSettings> {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?;
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut ClientSettings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: SettingsFile = toml::from_str(raw)?;
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.poll_interval_ms {
        settings.poll_interval_ms = v;
    }
    if let Some(v) = file_cfg.retry_delay_ms {
        settings.retry_delay_ms = v;
    }
    if file_cfg.max_transport_retries.is_some() {
        settings.max_transport_retries = file_cfg.max_transport_retries;
    }
    if file_cfg.dpi.is_some() {
        settings.dpi = file_cfg.dpi;
    }
    Ok(())
}

fn apply_env_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("WORKSTATION_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = lookup("APP__POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        settings.poll_interval_ms = v;
    }
    if let Some(v) = lookup("APP__RETRY_DELAY_MS").and_then(|v| v.parse().ok()) {
        settings.retry_delay_ms = v;
    }

    if let Some(v) = lookup("APP__MAX_TRANSPORT_RETRIES") {
        // Empty or "unbounded" clears a bound set in the file.
        settings.max_transport_retries = match v.trim() {
            "" | "unbounded" => None,
            other => other.parse().ok().or(settings.max_transport_retries),
        };
    }

    if let Some(v) = lookup("APP__DPI").and_then(|v| v.parse().ok()) {
        settings.dpi = Some(v);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    #[test]
    fn defaults_match_backend_cadence() {
        let settings = ClientSettings::default();
        assert_eq!(settings.poll_interval(), Duration::from_millis(2000));
        assert_eq!(settings.retry_delay(), Duration::from_millis(5000));
        assert_eq!(settings.max_transport_retries, None);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = ClientSettings::default();
        apply_file(
            &mut settings,
            "server_url = \"http://10.0.0.2:5000\"\nmax_transport_retries = 3\ndpi = 150\n",
        )
        .expect("parse");
        assert_eq!(settings.server_url, "http://10.0.0.2:5000");
        assert_eq!(settings.max_transport_retries, Some(3));
        assert_eq!(settings.dpi, Some(150));
        assert_eq!(settings.poll_interval_ms, 2000);
    }

    #[test]
    fn env_overrides_file_and_can_clear_retry_bound() {
        let mut settings = ClientSettings {
            max_transport_retries: Some(3),
            ..ClientSettings::default()
        };
        let env: HashMap<&str, &str> = HashMap::from([
            ("APP__SERVER_URL", "http://backend:8000"),
            ("APP__POLL_INTERVAL_MS", "250"),
            ("APP__MAX_TRANSPORT_RETRIES", "unbounded"),
            ("APP__DPI", "not-a-number"),
        ]);
        apply_env_overrides(&mut settings, |key| env.get(key).map(|v| v.to_string()));
        assert_eq!(settings.server_url, "http://backend:8000");
        assert_eq!(settings.poll_interval_ms, 250);
        assert_eq!(settings.max_transport_retries, None);
        assert_eq!(settings.dpi, None);
    }

    #[test]
    fn rejects_malformed_settings_file() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("workstation_settings_test_{suffix}.toml"));
        fs::write(&path, "poll_interval_ms = \"fast\"").expect("write");

        let err = load_settings_from(&path).expect_err("must fail");
        assert!(err.to_string().contains("invalid settings file"));

        fs::remove_file(path).expect("cleanup");
    }
}
