use std::sync::Arc;

use clap::Parser;
use glossgate_core::{SessionId, SubjectRef};
use glossgate_server::cli::{Cli, Command};
use glossgate_server::config::{AppConfig, LogFormat};
use glossgate_server::error::ApiError;
use glossgate_server::service::{AuthzService, CheckInput, Evaluator};
use glossgate_server::telemetry;
use glossgate_storage::PostgresStore;
use glossgate_storage::postgres::migrations;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[cfg(feature = "telemetry")]
type OtelProvider = opentelemetry_sdk::trace::TracerProvider;
#[cfg(not(feature = "telemetry"))]
type OtelProvider = ();

fn init_logging(config: &AppConfig) -> Option<OtelProvider> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    // The OTel layer is typed to the bare Registry, so it goes first:
    // Registry, OTel, EnvFilter, fmt.
    let registry = tracing_subscriber::registry();

    let otel_provider = telemetry::init_telemetry(&config.tracing);

    #[cfg(feature = "telemetry")]
    let registry = registry.with(otel_provider.as_ref().map(telemetry::make_otel_layer));

    let registry = registry.with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json();
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty();
            registry.with(fmt_layer).init();
        }
    }

    if otel_provider.is_some() {
        tracing::info!("OpenTelemetry tracing enabled");
    }

    otel_provider
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    let otel_provider = init_logging(&config);

    let result = match cli.command {
        Command::Migrate => run_migrate(&config).await,
        Command::Check {
            session,
            cookie,
            action,
            subject,
            target,
            evaluator,
        } => {
            let input = CheckArgs {
                session,
                cookie,
                action,
                subject,
                target,
            };
            run_check(&config, input, evaluator).await
        }
        Command::Principals { session, subject } => {
            run_principals(&config, session, subject.as_deref()).await
        }
    };

    #[cfg(feature = "telemetry")]
    if let Some(provider) = otel_provider {
        telemetry::shutdown_telemetry(provider);
    }
    #[cfg(not(feature = "telemetry"))]
    let _ = otel_provider;

    result
}

struct CheckArgs {
    session: Option<i64>,
    cookie: Option<String>,
    action: String,
    subject: String,
    target: String,
}

async fn connect_service(
    config: &AppConfig,
    evaluator: Option<Evaluator>,
) -> Result<AuthzService<PostgresStore>, Box<dyn std::error::Error>> {
    let store =
        PostgresStore::connect(&config.database.url, config.database.max_connections).await?;
    Ok(AuthzService::new(
        Arc::new(store),
        config.to_policy(),
        config.desktop.enabled,
        evaluator.unwrap_or(config.engine.evaluator),
    ))
}

async fn run_migrate(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("running database migrations");
    let store =
        PostgresStore::connect(&config.database.url, config.database.max_connections).await?;
    migrations::run_migrations(store.pool()).await?;
    tracing::info!("migrations completed successfully");
    Ok(())
}

async fn run_check(
    config: &AppConfig,
    args: CheckArgs,
    evaluator: Option<Evaluator>,
) -> Result<(), Box<dyn std::error::Error>> {
    let target: SubjectRef = args.target.parse()?;
    let service = connect_service(config, evaluator).await?;

    let mut input = CheckInput::new(
        args.session.map(SessionId::new),
        args.action,
        args.subject,
        target,
    );
    input.desktop_cookie = args.cookie;

    let result = service.check_permission(&input).await?;
    tracing::debug!(evaluator = %service.evaluator(), allowed = result.allowed, "check finished");

    println!("{}", if result.allowed { "allowed" } else { "denied" });
    Ok(())
}

async fn run_principals(
    config: &AppConfig,
    session: i64,
    subject: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = connect_service(config, None).await?;

    // In desktop mode the session travels as the cookie.
    let cookie = session.to_string();
    let principals = service
        .require_principals(Some(SessionId::new(session)), Some(&cookie), subject)
        .await;

    match principals {
        Ok(principals) => {
            for token in principals.iter() {
                println!("{token}");
            }
        }
        Err(ApiError::InvalidSession(_)) => println!("invalid session"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
