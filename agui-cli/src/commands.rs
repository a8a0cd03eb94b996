//! Command handlers.

use std::path::Path;

use agui_client::interactive::StdinPrompter;
use agui_client::{
    AguiClient, ApprovalMode, ClientConfig, ClientError, JsonRenderer, LogFormat, OutputMode,
    Renderer, RunRequest, SessionStore, TextRenderer,
};
use agui_server::{AguiRouter, RecipeConfig};

use crate::args::{
    ApprovalArg, Cli, Command, ConfigCommand, FormatArg, ServeArgs, SessionCommand, SharedCommand,
    ToolsCommand,
};

pub async fn run(cli: Cli) -> Result<(), ClientError> {
    let config_dir = ClientConfig::config_dir();
    let config_path = ClientConfig::config_path(&config_dir);

    let mut config = ClientConfig::load(&config_path)?;
    config.apply_env();
    apply_flags(&mut config, &cli);

    init_logging(&config);

    match cli.command {
        Command::Version => {
            println!("agui {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Serve(args) => serve(args).await,
        Command::Chat(args) => {
            run_endpoint(
                &config_dir,
                &config_path,
                config,
                "/agentic_chat",
                Some(args.message),
                args.interactive,
                ApprovalMode::Auto,
            )
            .await
        }
        Command::Ui(args) => {
            run_endpoint(
                &config_dir,
                &config_path,
                config,
                "/tool_based_generative_ui",
                args.message,
                false,
                ApprovalMode::Auto,
            )
            .await
        }
        Command::Stream(args) => {
            run_endpoint(
                &config_dir,
                &config_path,
                config,
                &args.endpoint,
                args.message,
                false,
                ApprovalMode::Auto,
            )
            .await
        }
        Command::HumanLoop(args) => {
            let approval = match args.approval {
                ApprovalArg::Auto => ApprovalMode::Auto,
                ApprovalArg::Manual => ApprovalMode::Manual,
            };
            run_endpoint(
                &config_dir,
                &config_path,
                config,
                "/human_in_the_loop",
                Some(args.message),
                false,
                approval,
            )
            .await
        }
        Command::State(args) => {
            run_endpoint(
                &config_dir,
                &config_path,
                config,
                "/agentic_generative_ui",
                args.message,
                false,
                ApprovalMode::Auto,
            )
            .await
        }
        Command::Predictive(args) => {
            run_endpoint(
                &config_dir,
                &config_path,
                config,
                "/predictive_state_updates",
                args.message,
                false,
                ApprovalMode::Auto,
            )
            .await
        }
        Command::Shared { command } => shared(&config_dir, config, command).await,
        Command::Tools { command } => tools(&config_dir, config, command).await,
        Command::Session { command } => {
            session(&config_dir, &config_path, config, command).await
        }
        Command::Config { command } => config_cmd(&config_dir, &config_path, config, command),
    }
}

fn apply_flags(config: &mut ClientConfig, cli: &Cli) {
    if let Some(server) = &cli.common.server {
        config.server = server.clone();
    }
    if let Some(key) = &cli.common.api_key {
        config.api_key = Some(key.clone());
    }
    if let Some(header) = &cli.common.auth_header {
        config.auth_header = header.clone();
    }
    if let Some(scheme) = &cli.common.auth_scheme {
        config.auth_scheme = Some(scheme.clone());
    }
    if let Some(level) = &cli.common.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.common.log_format {
        config.log_format = match format {
            FormatArg::Json => LogFormat::Json,
            FormatArg::Text => LogFormat::Text,
        };
    }
    if let Some(output) = cli.common.output {
        config.output = match output {
            FormatArg::Json => OutputMode::Json,
            FormatArg::Text => OutputMode::Text,
        };
    }
}

fn init_logging(config: &ClientConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}

fn renderer_for(config: &ClientConfig) -> Box<dyn Renderer> {
    match config.output {
        OutputMode::Json => Box::new(JsonRenderer),
        OutputMode::Text => Box::new(TextRenderer),
    }
}

fn build_client(config_dir: &Path, config: ClientConfig) -> Result<AguiClient, ClientError> {
    let store = SessionStore::new(config_dir)?;
    AguiClient::new(config, store)
}

async fn serve(args: ServeArgs) -> Result<(), ClientError> {
    let mut recipe_config = RecipeConfig::default();
    if let Some(delay) = args.chunk_delay_ms {
        recipe_config.chunk_delay_ms = delay;
    }
    if let Some(delay) = args.step_delay_ms {
        recipe_config.step_delay_ms = delay;
    }

    let mut router = AguiRouter::new().with_config(recipe_config);
    if args.cors {
        router = router.with_cors();
    }

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    println!("agui demo producer listening on http://{}", args.addr);
    axum::serve(listener, router.build()).await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_endpoint(
    config_dir: &Path,
    config_path: &Path,
    config: ClientConfig,
    endpoint: &str,
    message: Option<String>,
    interactive: bool,
    approval: ApprovalMode,
) -> Result<(), ClientError> {
    let client = build_client(config_dir, config.clone())?;
    let renderer = renderer_for(&config);

    // Remember which thread this command ran on.
    let session = client.resolve_session()?;
    persist_last_session(config_path, Some(&session.thread_id))?;

    let request = RunRequest {
        endpoint,
        message: message.as_deref(),
        interactive,
        approval,
    };

    tokio::select! {
        outcome = client.execute(request, renderer.as_ref(), &StdinPrompter) => {
            outcome?;
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => Err(ClientError::Cancelled),
    }
}

async fn shared(
    config_dir: &Path,
    config: ClientConfig,
    command: SharedCommand,
) -> Result<(), ClientError> {
    let client = build_client(config_dir, config.clone())?;

    match command {
        SharedCommand::Watch { cid, demo, limit } => {
            let renderer = renderer_for(&config);
            tokio::select! {
                result = client.watch_shared(cid.as_deref(), demo, renderer.as_ref(), limit) => {
                    result?;
                    Ok(())
                }
                _ = tokio::signal::ctrl_c() => Ok(()),
            }
        }
        SharedCommand::Increment => mutate(&client, "increment_counter", None).await,
        SharedCommand::Decrement => mutate(&client, "decrement_counter", None).await,
        SharedCommand::Reset => mutate(&client, "reset_counter", None).await,
        SharedCommand::Add { value } => {
            let value = value.map(|raw| {
                serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
            });
            mutate(&client, "add_item", value).await
        }
        SharedCommand::Clear => mutate(&client, "clear_items", None).await,
    }
}

async fn mutate(
    client: &AguiClient,
    op: &str,
    value: Option<serde_json::Value>,
) -> Result<(), ClientError> {
    let response = client.mutate_shared(op, value).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn tools(
    config_dir: &Path,
    config: ClientConfig,
    command: ToolsCommand,
) -> Result<(), ClientError> {
    let client = build_client(config_dir, config.clone())?;

    match command {
        ToolsCommand::List => {
            let listing = client.list_server_tools().await?;
            if config.output == OutputMode::Json {
                println!("{}", listing);
                return Ok(());
            }
            let tools = listing["tools"].as_array().cloned().unwrap_or_default();
            for tool in tools {
                println!(
                    "{}: {}",
                    tool["name"].as_str().unwrap_or("?"),
                    tool["description"].as_str().unwrap_or("")
                );
            }
            Ok(())
        }
        ToolsCommand::Describe { name } => {
            let listing = client.list_server_tools().await?;
            let tool = listing["tools"]
                .as_array()
                .and_then(|tools| tools.iter().find(|t| t["name"] == name.as_str()))
                .cloned()
                .ok_or_else(|| {
                    ClientError::Validation(format!("no tool named '{}'", name))
                })?;
            println!("{}", serde_json::to_string_pretty(&tool)?);
            Ok(())
        }
        ToolsCommand::Run { name, args } => {
            let execution = client
                .registry()
                .run(&name, &args)
                .await
                .ok_or_else(|| {
                    ClientError::Validation(format!("no local tool named '{}'", name))
                })?;
            println!(
                "{}",
                serde_json::to_string_pretty(&execution.to_result_json())?
            );
            if execution.success {
                Ok(())
            } else {
                Err(ClientError::ToolExecution(format!(
                    "tool '{}' failed",
                    name
                )))
            }
        }
    }
}

async fn session(
    config_dir: &Path,
    config_path: &Path,
    config: ClientConfig,
    command: SessionCommand,
) -> Result<(), ClientError> {
    let store = SessionStore::new(config_dir)?;

    match command {
        SessionCommand::Open { label, meta } => {
            let session = store.open_session(label, parse_metadata(&meta)?)?;
            persist_last_session(config_path, Some(&session.thread_id))?;
            println!("opened session {}", session.thread_id);
            Ok(())
        }
        SessionCommand::Close => {
            store.close_session()?;
            println!("session closed");
            Ok(())
        }
        SessionCommand::List => {
            let sessions = store.list_sessions()?;
            if sessions.is_empty() {
                println!("no stored sessions");
                return Ok(());
            }
            for summary in sessions {
                println!(
                    "{}  {:>4} messages  updated {}  {}",
                    summary.thread_id,
                    summary.message_count,
                    summary.updated_at.format("%Y-%m-%d %H:%M:%S"),
                    summary.label.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
        SessionCommand::Save { path } => {
            let session = store
                .get_active_session()?
                .ok_or_else(|| ClientError::Validation("no active session".to_string()))?;
            store.export(&session.thread_id, &path)?;
            println!("saved {} to {}", session.thread_id, path.display());
            Ok(())
        }
        SessionCommand::Load { thread_id } => {
            let session = store.set_active_session(&thread_id, None)?;
            persist_last_session(config_path, Some(&session.thread_id))?;
            println!("active session is now {}", session.thread_id);
            Ok(())
        }
        SessionCommand::Resume => {
            let thread_id = match config.last_session.clone() {
                Some(thread_id) => thread_id,
                None => store
                    .list_sessions()?
                    .first()
                    .map(|s| s.thread_id.clone())
                    .ok_or_else(|| {
                        ClientError::Validation("no session to resume".to_string())
                    })?,
            };
            let session = store.set_active_session(&thread_id, None)?;
            persist_last_session(config_path, Some(&session.thread_id))?;
            println!("resumed session {}", session.thread_id);
            Ok(())
        }
        SessionCommand::Export { thread_id, path } => {
            store.export(&thread_id, &path)?;
            println!("exported {} to {}", thread_id, path.display());
            Ok(())
        }
        SessionCommand::Import { path } => {
            let session = store.import(&path)?;
            println!("imported session {}", session.thread_id);
            Ok(())
        }
        SessionCommand::History { thread_id } => {
            let thread_id = match thread_id {
                Some(thread_id) => thread_id,
                None => store
                    .get_active_session()?
                    .map(|s| s.thread_id)
                    .ok_or_else(|| ClientError::Validation("no active session".to_string()))?,
            };
            for message in store.get_session_history(&thread_id)? {
                let role = format!("{:?}", message.role).to_lowercase();
                match (&message.content, &message.tool_calls) {
                    (Some(content), _) => println!("[{}] {}", role, content),
                    (None, Some(calls)) => {
                        for call in calls {
                            println!("[{}] tool call {}({})", role, call.function.name, call.function.arguments);
                        }
                    }
                    (None, None) => println!("[{}]", role),
                }
            }
            Ok(())
        }
        SessionCommand::Delete { thread_id } => {
            store.delete_session(&thread_id)?;
            if config.last_session.as_deref() == Some(thread_id.as_str()) {
                persist_last_session(config_path, None)?;
            }
            println!("deleted session {}", thread_id);
            Ok(())
        }
    }
}

fn config_cmd(
    config_dir: &Path,
    config_path: &Path,
    config: ClientConfig,
    command: ConfigCommand,
) -> Result<(), ClientError> {
    match command {
        ConfigCommand::Show => {
            let rendered = serde_yaml::to_string(&config)
                .map_err(|e| ClientError::Configuration(e.to_string()))?;
            print!("{}", rendered);
            Ok(())
        }
        ConfigCommand::Paths => {
            println!("config:   {}", config_path.display());
            println!("sessions: {}", config_dir.join("sessions").display());
            println!("pointer:  {}", config_dir.join("session.json").display());
            Ok(())
        }
        ConfigCommand::Get { key } => {
            let value = config
                .get(&key)
                .ok_or_else(|| ClientError::Validation(format!("'{}' is not set", key)))?;
            println!("{}", value);
            Ok(())
        }
        ConfigCommand::Set { key, value } => {
            // Operate on the stored file, not the env/flag-merged view.
            let mut stored = ClientConfig::load(config_path)?;
            stored.set(&key, &value)?;
            stored.save(config_path)?;
            Ok(())
        }
        ConfigCommand::Unset { key } => {
            let mut stored = ClientConfig::load(config_path)?;
            stored.unset(&key)?;
            stored.save(config_path)?;
            Ok(())
        }
    }
}

/// Update only `last_session` in the stored config file.
fn persist_last_session(config_path: &Path, thread_id: Option<&str>) -> Result<(), ClientError> {
    let mut stored = ClientConfig::load(config_path)?;
    stored.last_session = thread_id.map(str::to_string);
    stored.save(config_path)
}

/// Parse repeated `KEY=VALUE` metadata flags.
fn parse_metadata(
    entries: &[String],
) -> Result<std::collections::HashMap<String, String>, ClientError> {
    let mut metadata = std::collections::HashMap::new();
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(ClientError::Validation(format!(
                "metadata must be KEY=VALUE, got '{}'",
                entry
            )));
        };
        metadata.insert(key.to_string(), value.to_string());
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        let metadata =
            parse_metadata(&["env=prod".to_string(), "team=infra".to_string()]).unwrap();
        assert_eq!(metadata["env"], "prod");
        assert_eq!(metadata["team"], "infra");
    }

    #[test]
    fn test_parse_metadata_rejects_bare_keys() {
        let result = parse_metadata(&["no-equals".to_string()]);
        assert!(matches!(result, Err(ClientError::Validation(_))));
    }

    #[test]
    fn test_parse_metadata_keeps_equals_in_value() {
        let metadata = parse_metadata(&["query=a=b".to_string()]).unwrap();
        assert_eq!(metadata["query"], "a=b");
    }
}
