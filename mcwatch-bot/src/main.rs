mod discord_commands;
use anyhow::Context as _;
use mcwatch_bot::activity::DiscordActivity;
use mcwatch_bot::config::Config;
use mcwatch_bot::create_app;
use mcwatch_core::{
    AccrualLoop, JsonFileStore, Ledger, Poller, PresenceCache, ServerListPing, Verifier, shutdown,
};
use poise::{Framework, FrameworkOptions, PrefixFrameworkOptions, serenity_prelude as serenity};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

type Context<'a> = poise::Context<'a, crate::Data, crate::discord_commands::Error>;

pub(crate) struct Data {
    pub(crate) cache: PresenceCache,
    pub(crate) ledger: Arc<Ledger<JsonFileStore>>,
    pub(crate) verifier: Verifier<JsonFileStore>,
    pub(crate) confirm_timeout: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = "debug";
    #[cfg(not(debug_assertions))]
    let log_level = "info";

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting mcwatch...");

    let config = Config::from_env();
    let address = config.server_address()?;
    let token = config.discord_token()?.to_string();
    tracing::info!(
        "Configuration: server={}, user_data={}, poll={}s, accrual={}s, port={}",
        address,
        config.user_data_file,
        config.poll_interval.as_secs(),
        config.accrual_interval.as_secs(),
        config.port
    );

    let ledger = Arc::new(Ledger::load(JsonFileStore::new(&config.user_data_file)).await);
    let cache = PresenceCache::new();
    let activity = Arc::new(DiscordActivity::new());
    let (shutdown_trigger, shutdown) = shutdown::channel();

    let poller = Poller::new(
        ServerListPing::new(address, config.query_timeout),
        cache.clone(),
        activity.clone(),
        config.poll_interval,
    );
    let accrual = AccrualLoop::new(cache.clone(), ledger.clone(), config.accrual_interval);
    let loops = [
        tokio::spawn(poller.run(shutdown.clone())),
        tokio::spawn(accrual.run(shutdown.clone())),
    ];

    let app = create_app(cache.clone(), ledger.clone(), Duration::from_secs(30));
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Status server listening on {}", addr);

    // guild messages, message content for prefix commands, reactions for the verify gate
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let data = Data {
        cache: cache.clone(),
        ledger: ledger.clone(),
        verifier: Verifier::new(cache, ledger, config.verifier()),
        confirm_timeout: config.confirm_timeout,
    };
    let prefix = config.command_prefix.clone();

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![
                discord_commands::online(),
                discord_commands::shame(),
                discord_commands::playtime(),
                discord_commands::ping(),
                discord_commands::whois(),
                discord_commands::verify(),
            ],
            prefix_options: PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Executing command '{}' by user '{}'",
                        ctx.command().name,
                        ctx.author().name
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Finished command '{}' by user '{}'",
                        ctx.command().name,
                        ctx.author().name
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    if let Err(e) = poise::builtins::on_error(error).await {
                        tracing::error!("Error while handling command error: {}", e);
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                tracing::info!(
                    "Connected to {}",
                    ready
                        .guilds
                        .iter()
                        .map(|g| format!("[{}]", g.id))
                        .collect::<Vec<_>>()
                        .join(" ")
                );
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                activity.attach(ctx.clone());
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .context("Error creating Discord client")?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!("Axum server error: {}", e);
            }
        }
        result = client.start() => {
            if let Err(e) = result {
                tracing::error!("Discord client error: {:?}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    // Let an in-progress poll or accrual tick finish so the ledger file is never torn.
    shutdown_trigger.trigger();
    for handle in loops {
        if let Err(e) = handle.await {
            tracing::error!("background loop panicked: {}", e);
        }
    }
    client.shard_manager.shutdown_all().await;
    tracing::info!("mcwatch stopped");
    Ok(())
}
