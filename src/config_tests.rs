//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[discord]
token = "bot-token"
source_channel = "bets"
target_channel = "results"
"#;

    #[test]
    fn test_marker_config_default() {
        let markers = MarkerConfig::default();
        assert_eq!(markers.upvote, "👍");
        assert_eq!(markers.downvote, "👎");
        assert_eq!(markers.success, "✅");
        assert_eq!(markers.fail, "❌");
        assert_eq!(markers.resolved_set(), ["✅", "❌", "🚫", "💰"]);
    }

    #[test]
    fn test_voting_config_defaults() {
        let config: VotingConfig = toml::from_str("").unwrap();
        assert_eq!(config.pass_threshold, 1);
        assert_eq!(config.reject_threshold, 2);
        assert_eq!(config.group_code, "GB");
        assert!(config.individual_code.is_none());
        assert_eq!(config.retention_days, 14);
    }

    #[test]
    fn test_reporting_config_defaults() {
        let config: ReportingConfig = toml::from_str("").unwrap();
        assert!(!config.enabled);
        assert!(config.cutoff.is_none());
        assert_eq!(config.sheet_name, "Bets");
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay_ms, 400);
        assert_eq!(config.backoff_factor, 1.6);
    }

    #[test]
    fn test_reporting_cutoff_parsing() {
        let toml_str = r#"
enabled = true
cutoff = "2025-09-01T00:00:00Z"
spreadsheet_id = "sheet-1"
access_token = "ya29.token"
"#;
        let config: ReportingConfig = toml::from_str(toml_str).unwrap();
        let cutoff = config.cutoff.unwrap();
        assert_eq!(cutoff.to_rfc3339(), "2025-09-01T00:00:00+00:00");
    }

    #[test]
    fn test_discord_config_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.discord.api_base, "https://discord.com/api/v10");
        assert!(config.discord.gateway_url.starts_with("wss://gateway.discord.gg"));
        assert!(config.discord.guild_id.is_none());
        assert!(config.ledger_retention_days.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_token() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.discord.token = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.voting.reject_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_reporting_requires_credentials() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.reporting.enabled = true;
        assert!(config.validate().is_err());

        config.reporting.spreadsheet_id = "sheet".to_string();
        config.reporting.access_token = "token".to_string();
        assert!(config.validate().is_ok());

        config.reporting.backoff_factor = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_backoff() {
        let toml_src = format!(
            "{}\n[reporting]\nenabled = true\nspreadsheet_id = \"s\"\naccess_token = \"t\"\nbackoff_factor = nan\n",
            MINIMAL
        );
        let mut config: Config = toml::from_str(&toml_src).unwrap();
        assert!(config.reporting.backoff_factor.is_nan());
        assert!(config.validate().is_err());

        config.reporting.backoff_factor = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            "{}\n[voting]\npass_threshold = 3\n",
            MINIMAL
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.discord.token, "bot-token");
        assert_eq!(config.voting.pass_threshold, 3);
        assert_eq!(config.voting.reject_threshold, 2);
    }
}
