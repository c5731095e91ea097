//! Command handlers.

use std::sync::Arc;
use std::time::Duration;

use bpc_core::config::CoreConfig;
use bpc_core::esi::client::EsiClient;
use bpc_core::esi::oauth::{SsoClient, token_from_response};
use bpc_core::ids::IdentifierIssuer;
use bpc_core::models::{CharacterId, CorporationId, ReconciliationEvent};
use bpc_core::reconcile::{
    BlueprintSync, PgSnapshotRepository, ReconcileRunner, Reconciler, RunOutcome,
};
use bpc_core::scopes::{Operation, ScopeResolver};
use bpc_core::tokens::{PgTokenRepository, SsoTokenRefresher, TokenStore};
use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::{Error, Result};

pub async fn execute(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Scopes { operation } => {
            print_scopes(*operation);
            Ok(())
        }
        Commands::AuthorizeUrl { operation } => authorize_url(*operation),
        Commands::Link { code, verifier } => {
            let engine = Engine::connect(&cli).await?;
            engine.link(code, verifier).await
        }
        Commands::Unlink { character } => {
            let engine = Engine::connect(&cli).await?;
            engine.unlink(*character).await
        }
        Commands::Characters => {
            let engine = Engine::connect(&cli).await?;
            engine.list_characters();
            Ok(())
        }
        Commands::Resolve {
            corporation,
            operation,
        } => {
            let engine = Engine::connect(&cli).await?;
            engine.resolve(*corporation, *operation).await
        }
        Commands::Sync { corporation } => {
            let engine = Engine::connect(&cli).await?;
            engine.sync(*corporation).await
        }
    }
}

fn print_scopes(only: Option<Operation>) {
    let operations: Vec<Operation> = match only {
        Some(op) => vec![op],
        None => Operation::ALL.to_vec(),
    };
    for op in operations {
        println!("{op}");
        for scope in op.scope_names() {
            println!("  {scope}");
        }
    }
}

fn authorize_url(operation: Operation) -> Result<()> {
    let config = CoreConfig::from_env()?;
    let sso = SsoClient::new(config.sso, config.esi_timeout)?;
    let required = operation.required_scopes();
    let request = sso.authorize(&required)?;

    println!("{}", request.url);
    println!("state:    {}", request.state);
    println!("verifier: {}", request.code_verifier);
    Ok(())
}

/// Configured engine components over a Postgres pool.
struct Engine {
    config: CoreConfig,
    pool: PgPool,
    store: Arc<TokenStore>,
    sso: SsoClient,
    esi: EsiClient,
}

impl Engine {
    async fn connect(cli: &Cli) -> Result<Self> {
        let mut config = CoreConfig::from_env()?;
        if let Some(url) = &cli.database_url {
            config.database_url = url.clone();
        }

        info!(max_connections = cli.max_connections, "connecting to database");
        let pool = PgPoolOptions::new()
            .max_connections(cli.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.database_url)
            .await?;

        let store = Arc::new(TokenStore::new(Arc::new(PgTokenRepository::new(
            pool.clone(),
        ))));
        store.load().await?;

        let sso = SsoClient::new(config.sso.clone(), config.esi_timeout)?;
        let esi = EsiClient::new(config.esi_timeout)?;

        Ok(Self {
            config,
            pool,
            store,
            sso,
            esi,
        })
    }

    fn resolver(&self) -> Arc<ScopeResolver> {
        Arc::new(ScopeResolver::new(
            Arc::clone(&self.store),
            Arc::new(SsoTokenRefresher::new(self.sso.clone())),
            self.config.skew_policy(),
        ))
    }

    async fn link(&self, code: &str, verifier: &str) -> Result<()> {
        let response = self.sso.exchange_authorization_code(code, verifier).await?;
        let token = token_from_response(response, Utc::now())?;
        let corporation_id = self.esi.character_corporation(token.character_id).await?;
        let token = token.with_corporation(corporation_id);

        println!(
            "linked {} ({}) in corporation {} with {} scopes",
            token.character_name,
            token.character_id,
            corporation_id,
            token.granted_scopes().len()
        );
        self.store.put(token).await?;
        Ok(())
    }

    async fn unlink(&self, character_id: CharacterId) -> Result<()> {
        match self.store.remove(character_id).await? {
            Some(token) => {
                println!("unlinked {} ({})", token.character_name, character_id);
                Ok(())
            }
            None => Err(Error::Custom(format!(
                "character {character_id} is not linked"
            ))),
        }
    }

    fn list_characters(&self) {
        for character_id in self.store.characters() {
            let Some(token) = self.store.get(character_id) else {
                continue;
            };
            let corporation = token
                .corporation_id
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".into());
            println!(
                "{character_id}\t{}\tcorp {corporation}\texpires {}",
                token.character_name, token.expires_at
            );
            for scope in token.granted_scopes() {
                println!("  {scope}");
            }
        }
    }

    async fn resolve(&self, corporation_id: CorporationId, operation: Operation) -> Result<()> {
        let pairs = self
            .resolver()
            .resolve_operation(operation, corporation_id)
            .await?;
        for pair in pairs {
            println!("{}\t{}", pair.scope, pair.character_id);
        }
        Ok(())
    }

    async fn sync(&self, corporation_id: CorporationId) -> Result<()> {
        let runner = ReconcileRunner::new(
            Reconciler::new(IdentifierIssuer::new()),
            Arc::new(PgSnapshotRepository::new(self.pool.clone())),
            self.config.esi_timeout,
        );
        let sync = BlueprintSync::new(self.resolver(), self.esi.clone(), runner)
            .with_admin_character(self.config.admin_character);

        match sync.sync(corporation_id).await? {
            RunOutcome::Skipped => println!("skipped: sync already running"),
            RunOutcome::Completed { events } => {
                for event in &events {
                    println!("{}", describe(event));
                }
                println!("{} change(s)", events.len());
            }
        }
        Ok(())
    }
}

fn describe(event: &ReconciliationEvent) -> String {
    match event.subject() {
        Some(bp) => format!(
            "{}\ttype {}\tlocation {}\tME {} TE {} runs {}",
            event.kind,
            bp.type_id,
            bp.location_id,
            bp.material_efficiency,
            bp.time_efficiency,
            bp.runs
        ),
        None => event.kind.to_string(),
    }
}
