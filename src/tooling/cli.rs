//! CLI Tooling
//!
//! Operator command-line interface over [`RegistryService`]. The CLI is
//! synchronous; each command runs to completion on a runtime owned by the
//! context.

use crate::config::{ConfigLoader, LoggingConfig, RegistryConfig};
use crate::entity::EntityType;
use crate::error::ApiError;
use crate::importer::RawRecord;
use crate::registry::RegistryService;
use crate::resolver::ResolutionResult;
use crate::tooling::format::{
    format_decision_text, format_health_text, format_import_text, format_record_text,
    format_resolution_text, format_section_heading, format_validation_status_text,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::Instant;
use tracing::info;

/// Agent Registry CLI - resilient resolution, validation and bulk import
#[derive(Parser)]
#[command(name = "agent-registry")]
#[command(about = "Resolve, validate and bulk-import agent registry records")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Working directory searched for registry.toml
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: String,

    /// Enable verbose logging (debug level)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Load configuration from `--config` or the working directory.
    pub fn load_config(&self) -> Result<RegistryConfig, ApiError> {
        Ok(ConfigLoader::load_with_override(
            self.config.as_deref(),
            &self.workdir,
        )?)
    }

    /// Apply command-line logging flags on top of the configured values.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut logging = base.clone();
        if self.verbose {
            logging.level = "debug".to_string();
        }
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve one or more identifiers through the fallback chain
    Resolve {
        /// Entity type (profile, creation, application, webhook)
        entity_type: EntityType,
        /// Ids or handles to resolve
        #[arg(required = true)]
        identifiers: Vec<String>,
        /// Overall deadline for the resolution in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
    /// Import creations from a JSON array or JSON Lines file
    Import {
        file: PathBuf,
        /// Stop pulling new items after this many milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
    /// Validation policy commands
    Validation {
        #[command(subcommand)]
        command: ValidationCommands,
    },
    /// Archive a stored record
    Archive {
        entity_type: EntityType,
        identifier: String,
    },
    /// Probe every source and show the validation policy
    Health,
}

#[derive(Subcommand)]
pub enum ValidationCommands {
    /// Show effective modes and active overrides
    Status,
    /// Run a payload through the gate without writing it
    Check {
        /// Collection name, e.g. profiles
        collection: String,
        /// JSON payload, or @path to read it from a file
        payload: String,
    },
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ApiError::InvalidInput(format!(
                "Invalid format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }
}

/// CLI context holding the service and the runtime it runs on
pub struct CliContext {
    runtime: Runtime,
    service: RegistryService,
    format: OutputFormat,
}

impl CliContext {
    /// Load configuration and open the registry.
    pub fn new(
        workdir: PathBuf,
        config_path: Option<PathBuf>,
        format: &str,
    ) -> Result<Self, ApiError> {
        let config = ConfigLoader::load_with_override(config_path.as_deref(), &workdir)?;
        Self::from_config(&config, format)
    }

    /// Open the registry from an already loaded configuration.
    pub fn from_config(config: &RegistryConfig, format: &str) -> Result<Self, ApiError> {
        let format = format.parse::<OutputFormat>()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to start runtime: {}", e)))?;
        // sled and the HTTP client must be created inside the runtime context
        let service = {
            let _guard = runtime.enter();
            RegistryService::open(config)?
        };
        Ok(Self {
            runtime,
            service,
            format,
        })
    }

    pub fn service(&self) -> &RegistryService {
        &self.service
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Resolve {
                entity_type,
                identifiers,
                deadline_ms,
            } => self.handle_resolve(*entity_type, identifiers, *deadline_ms),
            Commands::Import { file, deadline_ms } => self.handle_import(file, *deadline_ms),
            Commands::Validation { command } => match command {
                ValidationCommands::Status => self.handle_validation_status(),
                ValidationCommands::Check {
                    collection,
                    payload,
                } => self.handle_validation_check(collection, payload),
            },
            Commands::Archive {
                entity_type,
                identifier,
            } => self.handle_archive(*entity_type, identifier),
            Commands::Health => self.handle_health(),
        }
    }

    fn handle_resolve(
        &self,
        entity_type: EntityType,
        identifiers: &[String],
        deadline_ms: Option<u64>,
    ) -> Result<String, ApiError> {
        let results = self.runtime.block_on(async {
            let deadline = deadline_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
            self.service
                .resolver()
                .resolve_many(entity_type, identifiers, deadline)
                .await
        });

        match self.format {
            OutputFormat::Json => {
                let entries: Vec<Value> = identifiers
                    .iter()
                    .zip(results.iter())
                    .map(|(identifier, result)| match result {
                        Ok(result) => json!({ "identifier": identifier, "result": result }),
                        Err(e) => json!({ "identifier": identifier, "error": e.to_string() }),
                    })
                    .collect();
                to_json(&entries)
            }
            OutputFormat::Text => Ok(identifiers
                .iter()
                .zip(results.iter())
                .map(|(identifier, result)| format_resolve_entry(identifier, result))
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    fn handle_import(&self, file: &Path, deadline_ms: Option<u64>) -> Result<String, ApiError> {
        let items = read_import_file(file)?;
        info!(file = %file.display(), items = items.len(), "Importing file");
        let outcome = self.runtime.block_on(async {
            match deadline_ms {
                Some(ms) => {
                    let deadline = Instant::now() + Duration::from_millis(ms);
                    self.service
                        .import_stream(futures::stream::iter(items), Some(deadline))
                        .await
                }
                None => self.service.import(items).await,
            }
        });
        match self.format {
            OutputFormat::Json => to_json(&outcome),
            OutputFormat::Text => Ok(format_import_text(&outcome)),
        }
    }

    fn handle_validation_status(&self) -> Result<String, ApiError> {
        let status = self.service.validation_status();
        match self.format {
            OutputFormat::Json => to_json(&status),
            OutputFormat::Text => Ok(format_validation_status_text(&status)),
        }
    }

    fn handle_validation_check(&self, collection: &str, payload: &str) -> Result<String, ApiError> {
        let payload = read_payload(payload)?;
        let decision = self.service.gate().check_write(collection, &payload);
        match self.format {
            OutputFormat::Json => to_json(&decision),
            OutputFormat::Text => Ok(format_decision_text(collection, &decision)),
        }
    }

    fn handle_archive(&self, entity_type: EntityType, identifier: &str) -> Result<String, ApiError> {
        let record = self
            .runtime
            .block_on(self.service.archive(entity_type, identifier))?;
        match self.format {
            OutputFormat::Json => to_json(&record),
            OutputFormat::Text => Ok(format!(
                "{}\n\n{}",
                format_section_heading("Archived"),
                format_record_text(&record)
            )),
        }
    }

    fn handle_health(&self) -> Result<String, ApiError> {
        let report = self.runtime.block_on(self.service.health());
        match self.format {
            OutputFormat::Json => to_json(&report),
            OutputFormat::Text => Ok(format_health_text(&report)),
        }
    }
}

fn format_resolve_entry(identifier: &str, result: &Result<ResolutionResult, ApiError>) -> String {
    match result {
        Ok(result) => format_resolution_text(identifier, result),
        Err(e) => format!(
            "{}\n\n  Error: {}\n",
            format_section_heading(&format!("Resolution: {}", identifier)),
            e
        ),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::InvalidInput(format!("Failed to serialize output: {}", e)))
}

/// Read import items from a JSON array or a JSON Lines file.
pub fn read_import_file(path: &Path) -> Result<Vec<RawRecord>, ApiError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ApiError::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_import_items(&content)
}

/// Decode import entries. Only a JSON array that cannot be parsed at all is
/// an error; individual entries that cannot be mapped become failed items.
pub fn parse_import_items(content: &str) -> Result<Vec<RawRecord>, ApiError> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let entries: Vec<Value> = serde_json::from_str(trimmed)
            .map_err(|e| ApiError::InvalidInput(format!("Invalid import array: {}", e)))?;
        return Ok(entries.into_iter().map(RawRecord::from_value).collect());
    }
    Ok(content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| match serde_json::from_str::<Value>(line) {
            Ok(value) => RawRecord::from_value(value),
            Err(e) => RawRecord::malformed(format!("line {}: {}", n + 1, e)),
        })
        .collect())
}

/// Inline JSON, or `@path` to read it from a file.
fn read_payload(arg: &str) -> Result<Value, ApiError> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| ApiError::InvalidInput(format!("Failed to read {}: {}", path, e)))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).map_err(|e| ApiError::InvalidInput(format!("Invalid JSON payload: {}", e)))
}
