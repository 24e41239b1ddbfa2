use std::io::Write;
use std::sync::Arc;

use agent_core::{ChatReply, ChatRuntime};
use ai_agent::{LanguageModelClient, StreamingModelClient, WorkflowEvent, WorkflowOutcome};
use anyhow::{bail, Result};
use clap::Parser;
use llm_router::{AnthropicClient, LlmRouter, OfflineClient, RoutingPolicy};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod server;

use config::{Cli, Command, Settings, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_filter.as_deref());

    let settings = Settings::resolve(&cli)?;
    let (model, streamer) = route_models(&settings);

    match cli.command {
        Some(Command::Ask { question, direct }) => {
            let mut settings = settings;
            if direct {
                settings.chat.agent_mode = false;
            }
            let runtime = build_runtime(&settings, model);
            ask(&runtime, &question.join(" ")).await
        }
        Some(Command::Serve { .. }) | None => {
            let runtime = build_runtime(&settings, model);
            let state = server::AppState {
                runtime: Arc::new(runtime),
                streamer,
                trust_proxy: settings.trust_proxy,
            };
            server::serve(settings.listen, state).await
        }
    }
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn route_models(
    settings: &Settings,
) -> (Arc<dyn LanguageModelClient>, Arc<dyn StreamingModelClient>) {
    let mut builder = AnthropicClient::builder()
        .base_url(settings.base_url.clone())
        .timeout(settings.request_timeout());
    if let Some(key) = &settings.api_key {
        builder = builder.api_key(key.clone());
    }

    let client = match builder.build() {
        Ok(client) => Some(client),
        Err(err) => {
            warn!(error = %err, "Anthropic client not configured; answers will use fallbacks");
            None
        }
    };

    let router = LlmRouter::new(client);
    let policy = RoutingPolicy::default();
    let model = router.route(&policy).unwrap_or_else(|err| {
        Arc::new(OfflineClient::new(err.to_string())) as Arc<dyn LanguageModelClient>
    });
    let streamer = router.route_streaming(&policy).unwrap_or_else(|err| {
        Arc::new(OfflineClient::new(err.to_string())) as Arc<dyn StreamingModelClient>
    });
    (model, streamer)
}

fn build_runtime(settings: &Settings, model: Arc<dyn LanguageModelClient>) -> ChatRuntime {
    info!(
        model = %settings.chat.workflow.model_options.model,
        agent_mode = settings.chat.agent_mode,
        "chat runtime configured"
    );
    ChatRuntime::builder(model)
        .with_config(settings.chat.clone())
        .with_rate_limits(settings.rate_limits)
        .build()
}

async fn ask(runtime: &ChatRuntime, question: &str) -> Result<()> {
    let progress = |event: WorkflowEvent| match event {
        WorkflowEvent::WorkflowUpdate { message, .. } => eprintln!("» {message}"),
        WorkflowEvent::ExecutionStepStart { step_index, step } => {
            eprintln!("  step {}: {}", step_index + 1, step.title)
        }
        _ => {}
    };

    match runtime.respond(question, &progress).await? {
        ChatReply::Direct { content } => println!("{content}"),
        ChatReply::Workflow(WorkflowOutcome::Completed { summary, .. }) => println!("{summary}"),
        ChatReply::Workflow(WorkflowOutcome::Failed { error }) => bail!("workflow failed: {error}"),
    }
    std::io::stdout().flush()?;
    Ok(())
}
