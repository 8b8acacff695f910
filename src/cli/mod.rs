//! Command-line interface for query-export
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and CLI overrides
//! - One-shot exports to a file or stdout
//! - Configuration and format listing subcommands

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::config::{Config, LogLevel};
use crate::error::{ConfigError, ExportError, Result};
use crate::export::{ExportOptions, ExportOutput, ExporterRegistry};
use crate::query::{FixtureStore, QueryStore, parse_params};
use crate::utils::convert::format_bytes;
use crate::utils::fs::expand_home;

/// Query export tool: serve and run saved-query exports
#[derive(Parser, Debug)]
#[command(
    name = "query-export",
    version,
    about = "Export saved query results as CSV, JSON or spreadsheets",
    long_about = "Runs saved queries and exports their results as CSV (materialized or
streamed), JSON or XLSX, either over HTTP or as one-shot exports from the command line."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for query-export
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP export server
    Serve {
        /// Address to listen on
        #[arg(long, value_name = "ADDR")]
        bind: Option<SocketAddr>,

        /// Saved queries file (JSON)
        #[arg(long, value_name = "FILE")]
        queries: Option<String>,
    },

    /// Run one export and write the result
    Export {
        /// Saved queries file (JSON)
        #[arg(long, value_name = "FILE")]
        queries: Option<String>,

        /// Query identifier
        #[arg(long, value_name = "ID")]
        query: String,

        /// Format identifier
        #[arg(short = 'f', long, value_name = "FORMAT")]
        format: Option<String>,

        /// CSV delimiter (single character or "tab")
        #[arg(short = 'd', long, value_name = "DELIM")]
        delim: Option<String>,

        /// Query parameter as name:value (repeatable)
        #[arg(short = 'p', long = "param", value_name = "NAME:VALUE")]
        params: Vec<String>,

        /// Output file; stdout when omitted
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List configured export formats
    Formats,

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Show version information
    Version,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_logging_args(config, args);
        Self::apply_server_args(config, args);
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Apply server-related CLI arguments to configuration
    fn apply_server_args(config: &mut Config, args: &CliArgs) {
        let queries = match &args.command {
            Some(Commands::Serve { bind, queries }) => {
                if let Some(bind) = bind {
                    config.server.bind = *bind;
                }
                queries
            }
            Some(Commands::Export { queries, .. }) => queries,
            _ => return,
        };

        if let Some(path) = queries {
            config.server.queries = Some(expand_home(path));
        }
    }

    /// Load the saved queries named by configuration
    pub fn load_store(&self) -> Result<FixtureStore> {
        let path = self.config.server.queries.as_ref().ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "server.queries".to_string(),
                value: "<unset>".to_string(),
            }
        })?;

        let store = FixtureStore::from_file(path)?;
        if store.is_empty() {
            warn!("No saved queries in {}", path.display());
        } else {
            info!("Loaded {} saved queries from {}", store.len(), path.display());
            debug!("Saved queries: {}", store.ids().collect::<Vec<_>>().join(", "));
        }
        Ok(store)
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to start the server
    pub async fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Version) => {
                self.show_version();
                Ok(true)
            }
            Some(Commands::Formats) => {
                self.list_formats()?;
                Ok(true)
            }
            Some(Commands::Config { show, validate }) => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            Some(Commands::Export {
                query,
                format,
                delim,
                params,
                output,
                ..
            }) => {
                let params = params
                    .iter()
                    .flat_map(|raw| parse_params(raw))
                    .collect::<BTreeMap<_, _>>();
                self.run_export(query, format.as_deref(), delim.clone(), params, output.clone())
                    .await?;
                Ok(true)
            }
            Some(Commands::Serve { .. }) | None => Ok(false),
        }
    }

    /// Run one export and write the bytes to `output` or stdout
    ///
    /// Streamed outputs are written chunk by chunk as they are produced.
    async fn run_export(
        &self,
        query_id: &str,
        format: Option<&str>,
        delim: Option<String>,
        params: BTreeMap<String, String>,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let store = self.load_store()?;
        let registry = ExporterRegistry::from_config(&self.config.export)?;
        let exporter = registry.resolve(format.unwrap_or_else(|| registry.default_format()))?;

        let mut query = store
            .get(query_id)
            .ok_or_else(|| ExportError::NotFound(format!("query '{query_id}'")))?;
        if !params.is_empty() {
            query.set_params(params);
        }

        let mut options = ExportOptions::new().with_title(query.title());
        options.delim = delim;

        let result = match exporter.get_output(query.as_ref(), &options).await {
            Ok(result) => result,
            Err(ExportError::Query(e)) => {
                return Err(ExportError::Query(crate::error::QueryError::new(format!(
                    "Error executing query {}: {}",
                    query.title(),
                    e
                ))));
            }
            Err(e) => return Err(e),
        };

        let mut writer: Box<dyn AsyncWrite + Unpin + Send> = match &output {
            Some(path) => Box::new(tokio::fs::File::create(path).await?),
            None => Box::new(tokio::io::stdout()),
        };

        let written = write_output(result, &mut writer).await?;
        writer.flush().await?;

        if let Some(path) = &output
            && !self.args.quiet
        {
            eprintln!(
                "Wrote {} ({}) to {}",
                exporter.name(),
                format_bytes(written),
                path.display()
            );
        }

        Ok(())
    }

    /// List configured formats
    fn list_formats(&self) -> Result<()> {
        let registry = ExporterRegistry::from_config(&self.config.export)?;
        for entry in registry.formats() {
            let exporter = registry.resolve(&entry.id)?;
            let marker = if entry.id == registry.default_format() {
                " (default)"
            } else {
                ""
            };
            println!(
                "{:<12} {:<14} {:<26} {}{}",
                entry.id,
                exporter.name(),
                exporter.content_type(),
                exporter.file_extension(),
                marker
            );
        }
        Ok(())
    }

    /// Show version information
    fn show_version(&self) {
        println!("query-export version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Handle config subcommand
    ///
    /// # Arguments
    /// * `show` - Whether to show configuration
    /// * `validate` - Whether to validate configuration
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file()?;
        }

        if show || !validate {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist, defaults apply");
            return Ok(());
        }

        match Config::load_from_file(Some(&path)) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("Configuration is valid"),
                Err(e) => println!("Configuration validation failed: {}", e),
            },
            Err(e) => println!("Failed to load configuration: {}", e),
        }

        Ok(())
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        println!("# Configuration file: {}", self.get_config_path().display());
        println!("{}", self.config.to_toml()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_config_path)
    }
}

/// Copy an export output into a writer
///
/// # Returns
/// * `Result<u64>` - Number of bytes written
async fn write_output<W>(output: ExportOutput, writer: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    match output {
        ExportOutput::Materialized(bytes) => {
            writer.write_all(&bytes).await?;
            Ok(bytes.len() as u64)
        }
        ExportOutput::Streamed(mut source) => {
            let mut written = 0u64;
            while let Some(chunk) = source.next_chunk().await? {
                writer.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            Ok(written)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const QUERIES: &str = r#"[
        {
            "id": "orders",
            "title": "Open Orders",
            "headers": ["id", "region"],
            "rows": [[1, "$$region$$"], [2, "apac"]]
        },
        { "id": "broken", "title": "Broken", "headers": [], "rows": [], "error": "syntax error" }
    ]"#;

    fn queries_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(QUERIES.as_bytes()).unwrap();
        file
    }

    fn cli(argv: &[&str]) -> CliInterface {
        let missing = tempfile::tempdir().unwrap().path().join("config.toml");
        let mut full = vec!["query-export", "-c", missing.to_str().unwrap()];
        full.extend_from_slice(argv);
        CliInterface::from_args(CliArgs::try_parse_from(full).unwrap()).unwrap()
    }

    #[test]
    fn test_cli_args_parsing() {
        let args = CliArgs::try_parse_from([
            "query-export",
            "export",
            "--query",
            "orders",
            "-p",
            "region:emea",
            "--param",
            "limit:5",
        ])
        .unwrap();
        match args.command {
            Some(Commands::Export { query, params, .. }) => {
                assert_eq!(query, "orders");
                assert_eq!(params, vec!["region:emea", "limit:5"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_logging_overrides() {
        assert_eq!(cli(&["-v", "formats"]).config().logging.level, LogLevel::Debug);
        assert_eq!(cli(&["--vv", "formats"]).config().logging.level, LogLevel::Trace);
        assert_eq!(cli(&["-q", "formats"]).config().logging.level, LogLevel::Error);
    }

    #[test]
    fn test_serve_overrides() {
        let interface = cli(&["serve", "--bind", "0.0.0.0:9000", "--queries", "/tmp/q.json"]);
        assert_eq!(interface.config().server.bind.port(), 9000);
        assert_eq!(
            interface.config().server.queries.as_deref(),
            Some(std::path::Path::new("/tmp/q.json"))
        );
    }

    #[tokio::test]
    async fn test_export_to_file_with_params() {
        let queries = queries_file();
        let out = tempfile::tempdir().unwrap();
        let out_path = out.path().join("orders.csv");

        let interface = cli(&[
            "export",
            "--queries",
            queries.path().to_str().unwrap(),
            "--query",
            "orders",
            "--format",
            "csv-stream",
            "--delim",
            "tab",
            "--param",
            "region:emea",
            "--output",
            out_path.to_str().unwrap(),
        ]);
        assert!(interface.handle_subcommand().await.unwrap());

        let written = std::fs::read(&out_path).unwrap();
        assert_eq!(written, b"id\tregion\r\n1\temea\r\n2\tapac\r\n");
    }

    #[tokio::test]
    async fn test_export_query_failure() {
        let queries = queries_file();
        let interface = cli(&[
            "export",
            "--queries",
            queries.path().to_str().unwrap(),
            "--query",
            "broken",
        ]);
        let err = interface.handle_subcommand().await.err().unwrap();
        assert_eq!(err.to_string(), "Error executing query Broken: syntax error");
    }

    #[tokio::test]
    async fn test_export_unknown_query() {
        let queries = queries_file();
        let interface = cli(&[
            "export",
            "--queries",
            queries.path().to_str().unwrap(),
            "--query",
            "missing",
        ]);
        let err = interface.handle_subcommand().await.err().unwrap();
        assert!(matches!(err, ExportError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_export_without_queries_file() {
        let interface = cli(&["export", "--query", "orders"]);
        let err = interface.handle_subcommand().await.err().unwrap();
        assert!(matches!(err, ExportError::Config(_)));
    }

    #[tokio::test]
    async fn test_serve_is_not_handled_here() {
        assert!(!cli(&["serve"]).handle_subcommand().await.unwrap());
        assert!(!cli(&[]).handle_subcommand().await.unwrap());
    }

    #[tokio::test]
    async fn test_write_output_materialized() {
        let mut buf: Vec<u8> = Vec::new();
        let written = write_output(ExportOutput::Materialized(Bytes::from_static(b"abc")), &mut buf)
            .await
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(buf, b"abc");
    }
}
