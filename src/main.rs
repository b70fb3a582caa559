use std::sync::Arc;

use anyhow::Context;

use slack_onboarding::bot::{self, OnboardingBot};
use slack_onboarding::config::{BotConfig, LoggingConfig};
use slack_onboarding::onboarding::{EventRouter, Onboarding, SessionStore};
use slack_onboarding::slack::{SlackApi, SlackClient, SocketModeListener};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    let logging = LoggingConfig::from_env();
    let (writer, _log_guard) = match logging.log_dir {
        Some(ref dir) => tracing_appender::non_blocking(tracing_appender::rolling::daily(
            dir,
            "slack-onboarding.log",
        )),
        None => tracing_appender::non_blocking(std::io::stderr()),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(writer)
        .init();

    let config = BotConfig::from_env().context("Failed to load configuration")?;

    eprintln!("🤖 Slack onboarding bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: {}", config.api_base_url);
    eprintln!("   API timeout: {}s", config.api_timeout.as_secs());
    if let Some(ref dir) = logging.log_dir {
        eprintln!("   Logs: {}", dir.display());
    }

    let client = Arc::new(SlackClient::from_config(&config));

    // ── Health check ────────────────────────────────────────────────────
    let bot_user_id = client
        .auth_test()
        .await
        .context("Slack auth.test failed; check SLACK_BOT_TOKEN")?;
    tracing::info!(bot_user_id = %bot_user_id, "Authenticated with Slack");

    // ── Startup announcement ────────────────────────────────────────────
    if let Some(ref channel) = config.announce_channel {
        eprintln!("   Announce: #{channel}");
        bot::announce(&*client, channel, &config.announce_text).await;
    }

    // ── Onboarding ──────────────────────────────────────────────────────
    let store = Arc::new(SessionStore::new());
    let api: Arc<dyn SlackApi> = client.clone();
    let onboarding = Arc::new(Onboarding::new(store, api));
    let router = EventRouter::onboarding(onboarding, Some(bot_user_id));

    // ── Transport ───────────────────────────────────────────────────────
    let listener = SocketModeListener::new(
        Arc::clone(&client),
        config.app_token.clone(),
        config.reconnect_delay,
    );
    let events = listener
        .start()
        .await
        .context("Failed to open Socket Mode connection; check SLACK_APP_TOKEN")?;

    eprintln!("   Events: {}\n", router.event_types().join(", "));

    OnboardingBot::new(router).run(events).await;

    Ok(())
}
