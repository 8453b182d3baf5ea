//! # Command Line Interface
//!
//! Flags override values loaded from the environment (and `.env`).

use crate::config::AppConfig;
use crate::errors::Result;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "idp-bridge")]
#[command(about = "Certificate trust and login/consent challenge broker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Listen address, `host:port` or `:port`
    #[arg(long)]
    pub listen: Option<String>,

    /// Authz Server admin API base URL
    #[arg(long)]
    pub admin_url: Option<String>,

    /// Secret Store address
    #[arg(long)]
    pub vault_url: Option<String>,

    /// OIDC issuer of bearer tokens
    #[arg(long)]
    pub issuer: Option<String>,

    /// Expected bearer token audience
    #[arg(long)]
    pub client_id: Option<String>,

    /// PostgreSQL DSN of the user database
    #[arg(long)]
    pub dsn: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Apply the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(listen) = &self.listen {
            config.server.apply_listen(listen)?;
        }
        if let Some(url) = &self.admin_url {
            config.authz.admin_url = url.clone();
        }
        if let Some(url) = &self.vault_url {
            config.vault.address = url.clone();
        }
        if let Some(issuer) = &self.issuer {
            config.oidc.issuer = issuer.clone();
        }
        if let Some(client_id) = &self.client_id {
            config.oidc.client_id = client_id.clone();
        }
        if let Some(dsn) = &self.dsn {
            config.database.url = dsn.clone();
        }
        if self.json_logs {
            config.observability.json_logging = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "idp-bridge",
            "--listen",
            ":9443",
            "--admin-url",
            "https://hydra:4445",
            "--dsn",
            "postgres://idp@db/idp",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config).unwrap();

        assert_eq!(config.server.port, 9443);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.authz.admin_url, "https://hydra:4445");
        assert_eq!(config.database.url, "postgres://idp@db/idp");
        assert_eq!(config.vault.address, AppConfig::default().vault.address);
    }

    #[test]
    fn bad_listen_flag_is_rejected() {
        let cli = Cli::parse_from(["idp-bridge", "--listen", "nope"]);
        assert!(cli.apply(&mut AppConfig::default()).is_err());
    }
}
