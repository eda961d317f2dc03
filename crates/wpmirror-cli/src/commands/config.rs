//! Config command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use wpmirror_core::Config;

use crate::output::{Output, OutputFormat};

/// Show the effective configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            // Never print the password
            let mut value = serde_json::to_value(&config)?;
            value["password"] = serde_json::Value::String(mask(&config.password));
            println!("{}", value);
        }
        OutputFormat::Quiet => {
            println!("{}", config.remote_url);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  remote_url:               {}", config.remote_url);
            println!("  username:                 {}", config.username);
            println!("  password:                 {}", mask(&config.password));
            println!("  user_agent:               {}", config.user_agent);
            println!("  per_page:                 {}", config.per_page);
            println!("  max_pages_per_round:      {}", config.max_pages_per_round);
            println!("  workers:                  {}", config.workers);
            println!("  update_period_secs:       {}", config.update_period_secs);
            println!("  retry_delay_ms:           {}", config.retry_delay_ms);
            println!("  request_timeout_secs:     {}", config.request_timeout_secs);
            println!("  bind_addr:                {}", config.bind_addr);
            println!(
                "  client_idle_timeout_secs: {}",
                config.client_idle_timeout_secs
            );
            println!("  log_level:                {}", config.log_level);
            println!();
            println!(
                "Config file: {}{}",
                effective_path.display(),
                if effective_path.exists() {
                    ""
                } else {
                    " (not found, using defaults)"
                }
            );
        }
    }

    Ok(())
}

fn mask(password: &str) -> String {
    if password.is_empty() {
        "(empty)".to_string()
    } else {
        "********".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask(""), "(empty)");
        assert_eq!(mask("hunter2"), "********");
    }
}
