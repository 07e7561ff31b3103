//! Huddle - interactive console for the dialogue core
//!
//! Reads messages from stdin and prints the bot's replies. `/as <user>
//! <channel>` switches who is talking and where; `/mention` prefixes the
//! next message as addressed to the bot.

use huddle::capability::{CapabilityRegistry, ExtractionCapability};
use huddle::channel::StaticChannelConfig;
use huddle::clock::SystemClock;
use huddle::config::DialogueConfig;
use huddle::dialogue::IntentClassifier;
use huddle::fallback::FallbackResponder;
use huddle::llm::{LlmConfig, ModelRegistry};
use huddle::message::InboundMessage;
use huddle::observe::TracingSink;
use huddle::runtime::{spawn_sweeper, DialogueStores, TurnDispatcher};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so replies on stdout stay readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = DialogueConfig::from_env()?;
    let channels = StaticChannelConfig::from_env()?;
    tracing::info!(channels = channels.len(), "Loaded channel configuration");

    let llm_config = LlmConfig::from_env();
    let llm_registry = ModelRegistry::new(&llm_config);
    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!("No LLM API keys configured. Set ANTHROPIC_API_KEY or LLM_GATEWAY.");
    }
    let llm = llm_registry.default_service();

    let capabilities = CapabilityRegistry::new()
        .with(Arc::new(ExtractionCapability::event_creation(llm.clone())))
        .with(Arc::new(ExtractionCapability::configuration(llm.clone())))
        .with(Arc::new(ExtractionCapability::participation(llm.clone())));

    let stores = DialogueStores::in_memory(&config, Arc::new(SystemClock));
    let cancel = CancellationToken::new();
    let sweeper = spawn_sweeper(
        stores.clone(),
        config.retry_window,
        config.sweep_interval,
        cancel.clone(),
    );

    let dispatcher = TurnDispatcher::new(
        config,
        stores,
        IntentClassifier::standard()?,
        capabilities,
        FallbackResponder::new(llm),
    )?
    .with_channels(Arc::new(channels))
    .with_sink(Arc::new(TracingSink));

    let mut user = "user".to_string();
    let mut channel = "general".to_string();
    let mut addressed = false;
    println!("huddle ready. Speaking as {user} in {channel}. /as <user> <channel>, /mention, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["/quit"] => break,
            ["/as", new_user, new_channel] => {
                user = (*new_user).to_string();
                channel = (*new_channel).to_string();
                println!("Speaking as {user} in {channel}");
                continue;
            }
            ["/mention"] => {
                addressed = true;
                continue;
            }
            _ => {}
        }

        let mut message = InboundMessage::new(&user, &channel, line);
        if std::mem::take(&mut addressed) {
            message = message.addressed();
        }
        let outcome = dispatcher.handle(message).await;
        match outcome.reply {
            Some(reply) => println!("bot> {reply}"),
            None => println!("bot> ..."),
        }
    }

    cancel.cancel();
    sweeper.await?;
    Ok(())
}
