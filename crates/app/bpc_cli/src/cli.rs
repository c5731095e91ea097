use bpc_core::scopes::Operation;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bpc", version, about = "Brave BPC token and blueprint engine")]
pub struct Cli {
    /// PostgreSQL connection URL. Overrides `DATABASE_URL` from the config.
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum number of database connections.
    #[arg(long, global = true, default_value_t = 5)]
    pub max_connections: u32,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the scopes each operation requires.
    Scopes {
        /// Only this operation.
        #[arg(long)]
        operation: Option<Operation>,
    },

    /// Print an SSO authorization URL for linking a character.
    AuthorizeUrl {
        /// Operation whose scopes to request.
        #[arg(long, default_value_t = Operation::Admin)]
        operation: Operation,
    },

    /// Link a character from an SSO authorization code.
    Link {
        /// Authorization code from the SSO callback.
        #[arg(long)]
        code: String,

        /// PKCE verifier printed by `authorize-url`.
        #[arg(long)]
        verifier: String,
    },

    /// Remove a character's stored token.
    Unlink {
        #[arg(long)]
        character: i64,
    },

    /// List linked characters and their scopes.
    Characters,

    /// Show which characters cover an operation for a corporation.
    Resolve {
        #[arg(long)]
        corporation: i64,

        #[arg(long, default_value_t = Operation::Admin)]
        operation: Operation,
    },

    /// Reconcile a corporation's blueprints against ESI.
    Sync {
        #[arg(long)]
        corporation: i64,
    },

    /// Print version.
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("bpc").chain(args.iter().copied()))
    }

    #[test]
    fn sync_requires_corporation() {
        assert!(parse(&["sync"]).is_err());
        let cli = parse(&["sync", "--corporation", "98000001"]).unwrap();
        assert!(matches!(cli.command, Commands::Sync { corporation: 98000001 }));
    }

    #[test]
    fn resolve_defaults_to_admin() {
        let cli = parse(&["resolve", "--corporation", "1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Resolve {
                corporation: 1,
                operation: Operation::Admin
            }
        ));
    }

    #[test]
    fn operation_is_parsed_by_name() {
        let cli = parse(&["scopes", "--operation", "corporation-blueprints"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Scopes {
                operation: Some(Operation::CorporationBlueprints)
            }
        ));
        assert!(parse(&["scopes", "--operation", "billing"]).is_err());
    }

    #[test]
    fn database_url_is_global() {
        let cli = parse(&["characters", "--database-url", "postgres://db/bpc"]).unwrap();
        assert_eq!(cli.database_url.as_deref(), Some("postgres://db/bpc"));
    }

    #[test]
    fn link_needs_code_and_verifier() {
        assert!(parse(&["link", "--code", "abc"]).is_err());
        assert!(parse(&["link", "--code", "abc", "--verifier", "xyz"]).is_ok());
    }
}
