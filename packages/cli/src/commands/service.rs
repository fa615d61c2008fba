use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::agent::AgentClient;
use crate::config::Settings;
use crate::definition::{ServiceDefinition, TagOutcome, ENV_SERVICE_ID};

/// Environment variable that points at the definition file
pub const ENV_DEFINITION_PATH: &str = "CONSULCTL_SERVICE_DEFINITION_PATH";

const DEFAULT_DEFINITION_PATH: &str = "./service.json";

/// Flags of the `service` command
#[derive(Debug, Clone, Default, Args)]
pub struct ServiceArgs {
    /// Set the service name
    #[arg(long)]
    pub name: Option<String>,

    /// Set the service id (unique on a per node basis).
    /// Defaults to CONSUL_SERVICE_ID, then the service name
    #[arg(long)]
    pub id: Option<String>,

    /// Add a new tag to your consul service
    #[arg(long)]
    pub add_tag: Option<String>,

    /// Register the service with Consul
    #[arg(long)]
    pub register: bool,

    /// Deregister the service with Consul
    #[arg(long)]
    pub deregister: bool,

    /// Path of the service definition json file (default ./service.json)
    #[arg(long)]
    pub definition_path: Option<PathBuf>,
}

/// Values the service command takes from the environment
#[derive(Debug, Clone, Default)]
pub struct ServiceEnv {
    pub id_override: Option<String>,
    pub definition_path: Option<PathBuf>,
}

impl ServiceEnv {
    pub fn from_env() -> Self {
        Self {
            id_override: std::env::var(ENV_SERVICE_ID).ok(),
            definition_path: std::env::var_os(ENV_DEFINITION_PATH).map(PathBuf::from),
        }
    }
}

/// What a run of the service command did
#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub path: PathBuf,
    pub definition: ServiceDefinition,
    pub tag: Option<TagOutcome>,
    pub registered: bool,
    pub deregistered: bool,
}

/// Pick the definition file: flag, then environment, then ./service.json
pub fn definition_path(args: &ServiceArgs, env: &ServiceEnv) -> PathBuf {
    args.definition_path
        .clone()
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(|| env.definition_path.clone().filter(|p| !p.as_os_str().is_empty()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DEFINITION_PATH))
}

/// Load, update, sync and save the service definition
///
/// The definition is saved even when syncing fails so local changes are
/// kept; the sync error is returned afterwards.
pub async fn run(settings: &Settings, args: &ServiceArgs, env: &ServiceEnv) -> Result<ServiceReport> {
    let path = definition_path(args, env);

    let mut definition = match ServiceDefinition::load(&path, env.id_override.as_deref()) {
        Ok(definition) => definition,
        Err(e) => {
            warn!(error = %e, "Starting from an empty service definition");
            println!("{} {}. Creating {}", "!".yellow().bold(), e, path.display());
            ServiceDefinition::default()
        }
    };

    if let Some(name) = &args.name {
        definition.set_name(name);
    }
    if let Some(id) = &args.id {
        definition.set_id(id);
    }

    let tag = args.add_tag.as_deref().map(|tag| {
        let outcome = definition.add_tag(tag);
        if outcome == TagOutcome::Duplicate {
            println!("{} duplicate tag not added: {}", "!".yellow().bold(), tag);
        }
        outcome
    });

    let synced = sync(settings, args, &definition).await;

    let saved = definition.save(&path);
    if let Err(e) = &saved {
        warn!(error = %e, "Service definition not saved");
    }

    synced?;
    saved.with_context(|| format!("Failed to save service definition to {}", path.display()))?;

    Ok(ServiceReport {
        path,
        definition,
        tag,
        registered: args.register,
        deregistered: args.deregister,
    })
}

async fn sync(
    settings: &Settings,
    args: &ServiceArgs,
    definition: &ServiceDefinition,
) -> Result<()> {
    if !args.register && !args.deregister {
        return Ok(());
    }

    let agent = AgentClient::new(settings)?;
    debug!(base_url = %agent.base_url(), "Using consul agent");

    if args.register {
        agent
            .register(definition)
            .await
            .context("Failed to register service")?;
        println!(
            "{} Registered {} ({})",
            "✓".green().bold(),
            definition.name.bold(),
            definition.effective_id()
        );
    }

    if args.deregister {
        agent
            .deregister(definition)
            .await
            .context("Failed to deregister service")?;
        println!(
            "{} Deregistered {}",
            "✓".green().bold(),
            definition.effective_id().bold()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn offline_settings() -> Settings {
        Settings {
            host: "127.0.0.1".to_string(),
            port: 1,
            protocol: crate::config::Protocol::Http,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_definition_path_precedence() {
        let env = ServiceEnv {
            id_override: None,
            definition_path: Some(PathBuf::from("/etc/web/service.json")),
        };
        let args = ServiceArgs {
            definition_path: Some(PathBuf::from("/tmp/flag.json")),
            ..ServiceArgs::default()
        };

        assert_eq!(definition_path(&args, &env), PathBuf::from("/tmp/flag.json"));
        assert_eq!(
            definition_path(&ServiceArgs::default(), &env),
            PathBuf::from("/etc/web/service.json")
        );
        assert_eq!(
            definition_path(&ServiceArgs::default(), &ServiceEnv::default()),
            PathBuf::from("./service.json")
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.json");
        let args = ServiceArgs {
            name: Some("web".to_string()),
            add_tag: Some("v1".to_string()),
            definition_path: Some(path.clone()),
            ..ServiceArgs::default()
        };

        let report = run(&offline_settings(), &args, &ServiceEnv::default()).await.unwrap();
        assert_eq!(report.tag, Some(TagOutcome::Added));
        assert!(!report.registered);

        let saved = std::fs::read_to_string(&path).unwrap();
        assert_eq!(saved, r#"{"name":"web","tags":["v1"]}"#);
    }

    #[tokio::test]
    async fn test_duplicate_tag_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.json");
        std::fs::write(&path, r#"{"name":"web","tags":["v1"]}"#).unwrap();
        let args = ServiceArgs {
            add_tag: Some("v1".to_string()),
            definition_path: Some(path.clone()),
            ..ServiceArgs::default()
        };

        let report = run(&offline_settings(), &args, &ServiceEnv::default()).await.unwrap();
        assert_eq!(report.tag, Some(TagOutcome::Duplicate));
        assert_eq!(report.definition.tags, vec!["v1"]);
    }

    #[tokio::test]
    async fn test_id_flag_beats_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.json");
        std::fs::write(&path, r#"{"name":"web"}"#).unwrap();
        let env = ServiceEnv {
            id_override: Some("from-env".to_string()),
            definition_path: None,
        };
        let args = ServiceArgs {
            id: Some("from-flag".to_string()),
            definition_path: Some(path.clone()),
            ..ServiceArgs::default()
        };

        let report = run(&offline_settings(), &args, &env).await.unwrap();
        assert_eq!(report.definition.id, "from-flag");
    }

    #[tokio::test]
    async fn test_failed_sync_still_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.json");
        std::fs::write(&path, r#"{"name":"web"}"#).unwrap();
        let args = ServiceArgs {
            add_tag: Some("canary".to_string()),
            register: true,
            definition_path: Some(path.clone()),
            ..ServiceArgs::default()
        };

        let result = run(&offline_settings(), &args, &ServiceEnv::default()).await;
        assert!(result.is_err());

        let saved: ServiceDefinition =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.tags, vec!["canary"]);
    }
}
