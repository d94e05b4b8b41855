//! Command-line interface for portal-export
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading, environment overrides and validation
//! - Dispatch of the search, download, columns and config commands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, LogLevel};
use crate::connection::ElasticClient;
use crate::error::Result;
use crate::executor::{DownloadParams, RecordExecutor, SearchParams};
use crate::formatter::{Formatter, OutputFormat};

/// Search, join and export records of a data portal index
#[derive(Parser, Debug)]
#[command(
    name = "portal-export",
    version,
    about = "Search and export records from a data portal's search index",
    long_about = "Query an Elasticsearch-compatible index, flatten its nested documents,
optionally join two indices and export the result as CSV or TSV."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Search node URL
    #[arg(long, value_name = "URL", global = true)]
    pub node: Option<String>,

    /// Username for basic authentication
    #[arg(short = 'u', long, value_name = "USERNAME", global = true)]
    pub username: Option<String>,

    /// Password for basic authentication
    #[arg(short = 'p', long, value_name = "PASSWORD", global = true)]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Console output format (table, json, json-pretty)
    #[arg(long, value_name = "FORMAT", global = true)]
    pub output_format: Option<String>,

    /// Disable progress bars
    #[arg(long = "no-progress", global = true)]
    pub no_progress: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for portal-export
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one search and print the page
    Search {
        /// Indices to search, comma separated
        #[arg(value_name = "INDICES", value_delimiter = ',', required = true)]
        indices: Vec<String>,

        /// Source fields to return, comma separated
        #[arg(long = "source", value_name = "FIELDS", value_delimiter = ',')]
        source: Vec<String>,

        /// Page size
        #[arg(long, default_value_t = 10)]
        size: usize,

        /// Page offset
        #[arg(long, default_value_t = 0)]
        from: usize,

        /// Sort spec, e.g. `year:desc`
        #[arg(long, value_name = "SPEC")]
        sort: Option<String>,

        /// Free-text query
        #[arg(long = "query", value_name = "Q")]
        q: Option<String>,

        /// Filter `field=value1,value2` (repeatable)
        #[arg(long = "filter", value_name = "FILTER")]
        filters: Vec<String>,

        /// Aggregation `name=field` (repeatable)
        #[arg(long = "agg", value_name = "AGG")]
        aggregations: Vec<String>,
    },

    /// Fetch every matching record and export it to a file
    Download {
        /// Indices to fetch, comma separated
        #[arg(value_name = "INDICES", value_delimiter = ',', required = true)]
        indices: Vec<String>,

        /// Output columns, comma separated (defaults per index)
        #[arg(long, value_name = "FIELDS", value_delimiter = ',')]
        columns: Vec<String>,

        /// Sort spec, e.g. `year:desc`
        #[arg(long, value_name = "SPEC")]
        sort: Option<String>,

        /// Free-text query
        #[arg(long = "query", value_name = "Q")]
        q: Option<String>,

        /// Filter `field=value1,value2` (repeatable)
        #[arg(long = "filter", value_name = "FILTER")]
        filters: Vec<String>,

        /// Second index to join with
        #[arg(long = "join", value_name = "INDEX")]
        join_with: Option<String>,

        /// Export format (csv, tsv)
        #[arg(long, value_name = "FORMAT")]
        format: Option<String>,

        /// Output file (defaults to data.<ext> in the output directory)
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Documents per page
        #[arg(long, value_name = "N")]
        page_size: Option<usize>,
    },

    /// List available and default columns of every index
    Columns {
        /// Directory containing `<index>.json` mapping descriptions
        #[arg(long, value_name = "DIR")]
        mapping_dir: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Effective configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface from the process arguments
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from parsed arguments
    ///
    /// The configuration file is loaded first, then environment variables
    /// and finally command-line arguments are applied on top.
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        config.apply_env();
        Self::apply_args_to_config(&mut config, &args);

        if !matches!(args.command, Commands::Config { .. }) {
            config.validate()?;
        }

        Ok(Self { args, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_store_args(config, args);
        Self::apply_logging_args(config, args);

        if args.no_progress {
            config.export.progress = false;
        }

        match &args.command {
            Commands::Download {
                page_size: Some(size),
                ..
            } => config.fetch.page_size = *size,
            Commands::Columns {
                mapping_dir: Some(dir),
            } => config.export.mapping_dir = dir.clone(),
            _ => {}
        }
    }

    fn apply_store_args(config: &mut Config, args: &CliArgs) {
        if let Some(node) = &args.node {
            config.store.node = node.clone();
        }
        if let Some(username) = &args.username {
            config.store.username = Some(username.clone());
        }
        if let Some(password) = &args.password {
            config.store.password = Some(password.clone());
        }
        if let Some(timeout) = args.timeout {
            config.store.timeout = timeout;
        }
    }

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

    fn formatter(&self) -> Formatter {
        let format = self
            .args
            .output_format
            .as_deref()
            .map(OutputFormat::parse)
            .unwrap_or_default();
        Formatter::new(format)
    }

    fn executor(&self, cancel_token: CancellationToken) -> Result<RecordExecutor> {
        let client = ElasticClient::new(&self.config.store)?;
        Ok(RecordExecutor::new(Arc::new(client), self.config.clone()).with_cancellation(cancel_token))
    }

    /// Run the selected command
    ///
    /// # Arguments
    /// * `cancel_token` - Aborts in-flight fetches and exports when cancelled
    pub async fn execute(&self, cancel_token: CancellationToken) -> Result<()> {
        match &self.args.command {
            Commands::Search {
                indices,
                source,
                size,
                from,
                sort,
                q,
                filters,
                aggregations,
            } => {
                let params = SearchParams {
                    indices: indices.clone(),
                    source: source.clone(),
                    size: *size,
                    from: *from,
                    sort: sort.clone(),
                    q: q.clone(),
                    filters: filters.clone(),
                    aggregations: aggregations.clone(),
                };
                let page = self.executor(cancel_token)?.search(&params).await?;
                println!("{}", self.formatter().format_page(&page)?);
            }
            Commands::Download {
                indices,
                columns,
                sort,
                q,
                filters,
                join_with,
                format,
                output,
                ..
            } => {
                let params = DownloadParams {
                    indices: indices.clone(),
                    columns: columns.clone(),
                    sort: sort.clone(),
                    filters: filters.clone(),
                    q: q.clone(),
                    join_with: join_with.clone(),
                    format: format.clone(),
                    output: output.clone(),
                };
                let result = self.executor(cancel_token)?.download(&params).await?;
                if !self.args.quiet {
                    println!("{}", self.formatter().format_export(&result)?);
                }
            }
            Commands::Columns { .. } => {
                let catalog = self.executor(cancel_token)?.columns()?;
                println!("{}", self.formatter().format_catalog(&catalog)?);
            }
            Commands::Config { show, validate } => {
                self.handle_config_command(*show, *validate)?;
            }
        }
        Ok(())
    }

    /// Handle config subcommand
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            println!("Validating configuration file: {}", self.config_path().display());
            match self.config.validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(e) => println!("Configuration validation failed: {}", e),
            }
        }

        if show || !validate {
            println!("Configuration file: {}", self.config_path().display());
            println!();
            println!("{}", self.config.to_display_toml()?);
        }

        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(argv: &[&str]) -> CliInterface {
        let mut full = vec!["portal-export", "--config", "/nonexistent/portal.toml"];
        full.extend_from_slice(argv);
        let args = CliArgs::try_parse_from(full).unwrap();
        let mut config = Config::default();
        CliInterface::apply_args_to_config(&mut config, &args);
        CliInterface { args, config }
    }

    #[test]
    fn test_download_args() {
        let cli = cli(&[
            "download",
            "file,specimen",
            "--columns",
            "filename,specimen",
            "--filter",
            "species.text=Bos taurus,Sus scrofa",
            "--filter",
            "paperPublished=false",
            "--join",
            "specimen",
            "--format",
            "tsv",
            "--page-size",
            "1000",
        ]);

        let Commands::Download {
            indices,
            columns,
            filters,
            join_with,
            format,
            ..
        } = &cli.args.command
        else {
            panic!("expected download");
        };
        assert_eq!(indices, &vec!["file", "specimen"]);
        assert_eq!(columns, &vec!["filename", "specimen"]);
        assert_eq!(filters[0], "species.text=Bos taurus,Sus scrofa");
        assert_eq!(join_with.as_deref(), Some("specimen"));
        assert_eq!(format.as_deref(), Some("tsv"));
        assert_eq!(cli.config.fetch.page_size, 1000);
    }

    #[test]
    fn test_search_args() {
        let cli = cli(&[
            "search",
            "organism",
            "--size",
            "5",
            "--agg",
            "sex=sex.text",
            "--query",
            "breed.text:Holstein",
        ]);
        let Commands::Search {
            size, aggregations, q, ..
        } = &cli.args.command
        else {
            panic!("expected search");
        };
        assert_eq!(*size, 5);
        assert_eq!(aggregations, &vec!["sex=sex.text"]);
        assert_eq!(q.as_deref(), Some("breed.text:Holstein"));
    }

    #[test]
    fn test_global_flags_override_config() {
        let cli = cli(&[
            "--node",
            "https://es.example.org:9200",
            "-u",
            "reader",
            "--no-progress",
            "-v",
            "columns",
            "--mapping-dir",
            "/srv/mapping",
        ]);
        assert_eq!(cli.config.store.node, "https://es.example.org:9200");
        assert_eq!(cli.config.store.username.as_deref(), Some("reader"));
        assert!(!cli.config.export.progress);
        assert_eq!(cli.config.logging.level, LogLevel::Debug);
        assert_eq!(cli.config.export.mapping_dir, PathBuf::from("/srv/mapping"));
    }

    #[test]
    fn test_missing_indices_rejected() {
        assert!(CliArgs::try_parse_from(["portal-export", "download"]).is_err());
    }

    #[test]
    fn test_explicit_missing_config_file_fails() {
        let args =
            CliArgs::try_parse_from(["portal-export", "-c", "/nonexistent/portal.toml", "columns"]).unwrap();
        assert!(CliInterface::from_args(args).is_err());
    }
}
