//! Command handlers for the `schema-guard` CLI.
//!
//! Handlers return the rendered output and an exit code instead of printing,
//! so that they can be exercised from tests.

use std::{
    fs::read_to_string,
    io::{self, Read},
    path::{Path, PathBuf},
    time::Duration
};

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    cli::{Commands, Format, OwnerArgs, Provider, SnapshotCommand, SqlInput},
    config::Config,
    error::{AppResult, config_error, file_read_error, input_error, unauthorized_error},
    guard::{DangerAction, Guard, overall_verdict},
    identity::{OwnerId, owner_from_jwt},
    introspect::{IntrospectOptions, introspect},
    llm::{LlmClient, LlmProvider},
    output::{
        FingerprintResult, GenerationResult, OutputFormat, OutputOptions, PromptPreview,
        format_danger, format_decisions, format_diff, format_extraction, format_fingerprint,
        format_generation, format_introspection, format_meta, format_prompt_preview,
        format_snapshot_list, format_update, format_validation
    },
    prompt::{build_system_prompt, build_user_prompt},
    schema::{SchemaSnapshot, SqlDialect, Tables, diff, load_snapshot, load_tables},
    snapshots::SnapshotService,
    sql::{DangerClassifier, DangerPolicy, ReferenceExtractor},
    store::FsSnapshotStore,
    validate::SchemaValidator
};

/// Rendered command output and process exit code
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output:    String
}

impl CommandOutput {
    fn new(exit_code: i32, output: String) -> Self {
        Self {
            exit_code,
            output
        }
    }
}

/// Convert CLI format to internal OutputFormat
pub fn convert_format(format: Format) -> OutputFormat {
    match format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
        Format::Yaml => OutputFormat::Yaml
    }
}

/// Create output options from parameters
pub fn create_output_options(format: Format, no_color: bool) -> OutputOptions {
    OutputOptions {
        format:  convert_format(format),
        colored: !no_color
    }
}

/// Read a file, or stdin for `-`
pub fn read_input(path: &Path) -> AppResult<String> {
    if path.to_str() == Some("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| file_read_error("stdin", e))?;
        Ok(buffer)
    } else {
        read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e))
    }
}

/// SQL text from `--sql` or `--file`
pub fn read_sql(input: &SqlInput) -> AppResult<String> {
    match (&input.sql, &input.file) {
        (Some(sql), _) => Ok(sql.clone()),
        (None, Some(path)) => read_input(path),
        (None, None) => Err(input_error("SQL text is required (use --sql or --file)"))
    }
}

/// Snapshot from a schema file, named after the file stem when ad hoc
pub fn load_schema_file(path: &Path, dialect: Option<&str>) -> AppResult<SchemaSnapshot> {
    let text = read_input(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| *s != "-")
        .unwrap_or("schema");
    load_snapshot(&text, name, dialect)
}

/// Tables from a schema file
pub fn load_tables_file(path: &Path, dialect: Option<&str>) -> AppResult<Tables> {
    let text = read_input(path)?;
    let dialect = dialect.map(SqlDialect::from_name).unwrap_or_default();
    load_tables(&text, dialect)
}

/// Guard from configuration with command-line overrides
pub fn build_guard(
    config: &Config,
    action: Option<DangerAction>,
    allow_unknown: bool
) -> AppResult<Guard> {
    let policy = match &config.guard.dangerous_keywords {
        Some(keywords) => DangerPolicy::new(keywords)?,
        None => DangerPolicy::default()
    };
    let classifier = DangerClassifier::new(policy)?;
    let validator = SchemaValidator::new(ReferenceExtractor::default());
    Ok(Guard::new(classifier, validator)
        .with_action(action.unwrap_or(config.guard.danger_action))
        .with_reject_unknown(config.guard.reject_unknown_references && !allow_unknown)
        .with_savepoint_name(config.guard.savepoint_name.clone()))
}

/// Owner from `--owner` or `--token`
pub fn resolve_owner(args: &OwnerArgs) -> AppResult<OwnerId> {
    match (&args.owner, &args.token) {
        (Some(owner), _) => OwnerId::new(owner.clone()),
        (None, Some(token)) if token.trim().to_ascii_lowercase().starts_with("bearer ") => {
            OwnerId::from_bearer(token)
        }
        (None, Some(token)) => owner_from_jwt(token),
        (None, None) => Err(unauthorized_error(
            "An owner is required (use --owner or --token)"
        ))
    }
}

/// Snapshot service over the filesystem store
pub fn open_service(store: Option<PathBuf>, config: &Config) -> SnapshotService<FsSnapshotStore> {
    let root = store.unwrap_or_else(|| config.storage.resolved_root());
    tracing::debug!(root = %root.display(), "opening snapshot store");
    SnapshotService::new(FsSnapshotStore::new(root))
}

/// Build LLM provider from parameters
pub fn build_llm_provider(
    provider: Provider,
    api_key: Option<String>,
    model: String,
    ollama_url: String
) -> AppResult<LlmProvider> {
    match provider {
        Provider::OpenAI => {
            let key = api_key.ok_or_else(|| {
                config_error("API key required for OpenAI (use --api-key or LLM_API_KEY)")
            })?;
            Ok(LlmProvider::OpenAI {
                api_key: key,
                model
            })
        }
        Provider::Anthropic => {
            let key = api_key.ok_or_else(|| {
                config_error("API key required for Anthropic (use --api-key or LLM_API_KEY)")
            })?;
            Ok(LlmProvider::Anthropic {
                api_key: key,
                model
            })
        }
        Provider::Ollama => Ok(LlmProvider::Ollama {
            base_url: ollama_url,
            model
        })
    }
}

/// Provider from the flag, then configuration, then OpenAI
pub fn effective_provider(flag: Option<Provider>, config: &Config) -> AppResult<Provider> {
    if let Some(provider) = flag {
        return Ok(provider);
    }
    match config.llm.provider.as_deref() {
        Some(name) => Provider::from_name(name)
            .ok_or_else(|| config_error(format!("Unknown LLM provider '{}'", name))),
        None => Ok(Provider::OpenAI)
    }
}

/// Run one command
pub async fn run_command(
    command: Commands,
    config: &Config,
    opts: &OutputOptions
) -> AppResult<CommandOutput> {
    match command {
        Commands::Classify {
            input
        } => {
            let sql = read_sql(&input)?;
            let report = build_guard(config, None, false)?.classifier().classify(&sql);
            let code = if report.blocked { 2 } else { 0 };
            Ok(CommandOutput::new(code, format_danger(&report, opts)))
        }
        Commands::Extract {
            input
        } => {
            let sql = read_sql(&input)?;
            let extraction = ReferenceExtractor::default().extract(&sql);
            Ok(CommandOutput::new(0, format_extraction(&extraction, opts)))
        }
        Commands::Validate {
            schema,
            dialect,
            input
        } => {
            let sql = read_sql(&input)?;
            let snapshot = load_schema_file(&schema, dialect.as_deref())?;
            let report = SchemaValidator::default().validate(&snapshot, &sql);
            let code = if report.ok { 0 } else { 1 };
            Ok(CommandOutput::new(code, format_validation(&report, opts)))
        }
        Commands::Check {
            schema,
            dialect,
            danger_action,
            allow_unknown,
            input
        } => {
            let sql = read_sql(&input)?;
            let snapshot = schema
                .map(|path| load_schema_file(&path, dialect.as_deref()))
                .transpose()?;
            let guard = build_guard(config, danger_action, allow_unknown)?;
            let decisions = guard.check_batch(&sql, snapshot.as_ref())?;
            let code = overall_verdict(&decisions).exit_code();
            Ok(CommandOutput::new(code, format_decisions(&decisions, opts)))
        }
        Commands::Generate {
            request,
            schema,
            dialect,
            provider,
            api_key,
            model,
            ollama_url,
            danger_action,
            dry_run
        } => {
            run_generate(
                GenerateParams {
                    request,
                    schema,
                    dialect,
                    provider,
                    api_key,
                    model,
                    ollama_url,
                    danger_action,
                    dry_run
                },
                config,
                opts
            )
            .await
        }
        Commands::Diff {
            old,
            new
        } => {
            let old = load_schema_file(&old, None)?;
            let new = load_schema_file(&new, None)?;
            let changes = diff(&old, &new);
            let code = if changes.is_empty() { 0 } else { 1 };
            Ok(CommandOutput::new(code, format_diff(&changes, opts)))
        }
        Commands::Fingerprint {
            file
        } => {
            let snapshot = load_schema_file(&file, None)?;
            let result = FingerprintResult {
                name:     snapshot.name().to_string(),
                checksum: snapshot.checksum().to_string(),
                tables:   snapshot.tables().len()
            };
            Ok(CommandOutput::new(0, format_fingerprint(&result, opts)))
        }
        Commands::Snapshot {
            owner,
            store,
            action
        } => {
            let owner = resolve_owner(&owner)?;
            let service = open_service(store, config);
            run_snapshot(&service, &owner, action, opts)
        }
        Commands::Introspect {
            db_url,
            schema,
            max_tables,
            allow_data_access,
            save_as,
            owner,
            store
        } => {
            let mut options = IntrospectOptions::from(&config.introspect);
            if let Some(schema) = schema {
                options.schema = schema;
            }
            if let Some(max_tables) = max_tables {
                options.max_tables = max_tables;
            }
            if allow_data_access {
                options.enforce_catalog_only = false;
            }
            let result = introspect(&db_url, &options).await?;
            let mut output = format_introspection(&result, opts);
            if let Some(name) = save_as {
                let owner = resolve_owner(&owner)?;
                let service = open_service(store, config);
                let meta =
                    service.save(&owner, &name, Some(result.dialect.clone()), result.tables.clone())?;
                if matches!(opts.format, OutputFormat::Text) {
                    output.push_str(&format_meta(&meta, opts));
                }
            }
            let code = if result.warning.is_some() { 1 } else { 0 };
            Ok(CommandOutput::new(code, output))
        }
    }
}

/// Parameters for the generate command
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub request:       String,
    pub schema:        Option<PathBuf>,
    pub dialect:       String,
    pub provider:      Option<Provider>,
    pub api_key:       Option<String>,
    pub model:         Option<String>,
    pub ollama_url:    Option<String>,
    pub danger_action: Option<DangerAction>,
    pub dry_run:       bool
}

/// Generate SQL with the language model and run it through the guard
pub async fn run_generate(
    params: GenerateParams,
    config: &Config,
    opts: &OutputOptions
) -> AppResult<CommandOutput> {
    let request = params.request.trim();
    if request.is_empty() {
        return Err(input_error("A natural-language request is required"));
    }
    let snapshot = params
        .schema
        .as_deref()
        .map(|path| load_schema_file(path, Some(&params.dialect)))
        .transpose()?;
    let schema_text = snapshot
        .as_ref()
        .map(SchemaSnapshot::to_summary)
        .unwrap_or_default();
    let system = build_system_prompt(&params.dialect);
    let user = build_user_prompt(request, &schema_text, &params.dialect);
    if params.dry_run {
        let preview = PromptPreview {
            system,
            user
        };
        return Ok(CommandOutput::new(0, format_prompt_preview(&preview, opts)));
    }

    let provider = effective_provider(params.provider, config)?;
    let api_key = params.api_key.or_else(|| config.llm.api_key.clone());
    let model = params
        .model
        .or_else(|| config.llm.model.clone())
        .unwrap_or_else(|| provider.default_model().to_string());
    let ollama_url = params
        .ollama_url
        .or_else(|| config.llm.ollama_url.clone())
        .unwrap_or_else(|| String::from("http://localhost:11434"));
    let llm_provider = build_llm_provider(provider, api_key, model, ollama_url)?;
    let guard = build_guard(config, params.danger_action, false)?;

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Generating SQL...");
    pb.enable_steady_tick(Duration::from_millis(100));
    let client = LlmClient::with_retry_config(llm_provider, config.retry.clone())
        .with_sampling(&config.llm);
    let generated = client.generate_sql(&system, &user).await;
    pb.finish_and_clear();

    let decision = guard.check(&generated?, snapshot.as_ref())?;
    let code = decision.verdict.exit_code();
    let result = GenerationResult {
        request: request.to_string(),
        dialect: params.dialect,
        decision
    };
    Ok(CommandOutput::new(code, format_generation(&result, opts)))
}

fn run_snapshot(
    service: &SnapshotService<FsSnapshotStore>,
    owner: &OwnerId,
    action: SnapshotCommand,
    opts: &OutputOptions
) -> AppResult<CommandOutput> {
    match action {
        SnapshotCommand::List => {
            let items = service.list(owner)?;
            Ok(CommandOutput::new(0, format_snapshot_list(&items, opts)))
        }
        SnapshotCommand::Save {
            name,
            schema,
            dialect
        } => {
            let tables = load_tables_file(&schema, Some(&dialect))?;
            let meta = service.save(owner, &name, Some(dialect), tables)?;
            Ok(CommandOutput::new(0, format_meta(&meta, opts)))
        }
        SnapshotCommand::Get {
            name
        } => {
            let raw = service.get_raw(owner, &name)?;
            Ok(CommandOutput::new(0, raw))
        }
        SnapshotCommand::Delete {
            name
        } => {
            if service.delete(owner, &name)? {
                Ok(CommandOutput::new(0, format!("Deleted '{}'\n", name)))
            } else {
                Ok(CommandOutput::new(1, format!("Snapshot '{}' did not exist\n", name)))
            }
        }
        SnapshotCommand::Diff {
            name,
            schema
        } => {
            let dialect = service.get(owner, &name)?.dialect().map(str::to_string);
            let tables = load_tables_file(&schema, dialect.as_deref())?;
            let changes = service.diff(owner, &name, tables)?;
            let code = if changes.is_empty() { 0 } else { 1 };
            Ok(CommandOutput::new(code, format_diff(&changes, opts)))
        }
        SnapshotCommand::Update {
            name,
            schema
        } => {
            let dialect = service.get(owner, &name)?.dialect().map(str::to_string);
            let tables = load_tables_file(&schema, dialect.as_deref())?;
            let outcome = service.update(owner, &name, tables)?;
            Ok(CommandOutput::new(0, format_update(&outcome, opts)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_format_json() {
        assert!(matches!(convert_format(Format::Json), OutputFormat::Json));
    }

    #[test]
    fn test_resolve_owner_requires_a_source() {
        let args = OwnerArgs {
            owner: None,
            token: None
        };
        assert!(resolve_owner(&args).is_err());
    }

    #[test]
    fn test_resolve_owner_from_token() {
        let args = OwnerArgs {
            owner: None,
            token: Some("Bearer e30.eyJzdWIiOiJ1c2VyLTQyIn0.c2ln".to_string())
        };
        assert_eq!(resolve_owner(&args).unwrap().as_str(), "user-42");
    }

    #[test]
    fn test_build_llm_provider_openai_requires_key() {
        assert!(
            build_llm_provider(Provider::OpenAI, None, "m".into(), String::new()).is_err()
        );
    }

    #[test]
    fn test_effective_provider_from_config() {
        let mut config = Config::default();
        config.llm.provider = Some("Anthropic".into());
        assert_eq!(
            effective_provider(None, &config).unwrap(),
            Provider::Anthropic
        );
        config.llm.provider = Some("bogus".into());
        assert!(effective_provider(None, &config).is_err());
    }

    #[test]
    fn test_build_guard_rejects_empty_keyword_list() {
        let mut config = Config::default();
        config.guard.dangerous_keywords = Some(Vec::new());
        assert!(build_guard(&config, None, false).is_err());
    }
}
