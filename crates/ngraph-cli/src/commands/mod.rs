//! CLI command definitions and dispatch.

pub mod scan;
pub mod serve;
pub mod textfile;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ngraph_common::config::{CollectorConfig, SourceAddress};
use ngraph_common::constants;
use ngraph_common::types::ExclusionList;

/// ngraph — inbound and outbound TCP connections as Prometheus metrics.
#[derive(Parser, Debug)]
#[command(name = "ngraph", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Scan every network namespace instead of only the host's.
    #[arg(long = "all", global = true, env = "NGRAPH_ALL_NAMESPACES")]
    pub all_namespaces: bool,

    /// Comma-separated address prefixes whose connections are ignored.
    #[arg(long, global = true, env = "NGRAPH_EXCLUDE", value_name = "PREFIXES")]
    pub exclude: Option<ExclusionList>,

    /// Report public peer addresses instead of `external_ip`.
    #[arg(long, global = true, env = "NGRAPH_ALLOW_PUBLIC_IP")]
    pub allow_public_ip: bool,

    /// Address reported as the source of each connection.
    #[arg(long, global = true, value_enum, default_value_t = SourceArg::Host, env = "NGRAPH_SOURCE_ADDRESS")]
    pub source_address: SourceArg,

    /// File holding the ephemeral local port range.
    #[arg(long, global = true, default_value = constants::IP_LOCAL_PORT_RANGE_FILE)]
    pub port_range_file: PathBuf,

    /// Mount point of procfs.
    #[arg(long, global = true, default_value = constants::DEFAULT_PROC_ROOT)]
    pub proc_root: PathBuf,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "NGRAPH_LOG_FORMAT")]
    pub log_format: LogFormat,
}

/// Source label policy as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    /// The host's primary IPv4 address.
    Host,
    /// Each socket's own local address.
    Socket,
}

impl From<SourceArg> for SourceAddress {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Host => Self::Host,
            SourceArg::Socket => Self::Socket,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve metrics over HTTP, collecting on every scrape.
    Serve(serve::ServeArgs),
    /// Periodically write metrics to a node-exporter text file.
    Textfile(textfile::TextfileArgs),
    /// Run one collection pass and print the result.
    Scan(scan::ScanArgs),
}

impl Cli {
    /// Collector settings assembled from the global flags.
    #[must_use]
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            all_namespaces: self.all_namespaces,
            exclusions: self.exclude.clone().unwrap_or_default(),
            allow_public_ip: self.allow_public_ip,
            source_address: self.source_address.into(),
            port_range_path: self.port_range_file.clone(),
            proc_root: self.proc_root.clone(),
        }
    }
}

fn log_startup(config: &CollectorConfig) {
    let rules: Vec<&str> = config.exclusions.effective_rules().map(|r| r.as_str()).collect();
    tracing::info!(
        all_namespaces = config.all_namespaces,
        allow_public_ip = config.allow_public_ip,
        source = ?config.source_address,
        exclusions = ?rules,
        "collector configured"
    );
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.collector_config();
    log_startup(&config);
    match cli.command {
        Command::Serve(args) => serve::execute(args, config),
        Command::Textfile(args) => textfile::execute(args, config),
        Command::Scan(args) => scan::execute(&args, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_build_collector_config() {
        let cli = Cli::try_parse_from([
            "ngraph",
            "scan",
            "--all",
            "--exclude",
            " 10.32.68 ,,192.168.",
            "--source-address",
            "socket",
        ])
        .expect("parse");
        let cfg = cli.collector_config();
        assert!(cfg.all_namespaces);
        assert!(!cfg.allow_public_ip);
        assert_eq!(cfg.source_address, SourceAddress::Socket);
        let rules: Vec<&str> = cfg.exclusions.effective_rules().map(|r| r.as_str()).collect();
        assert_eq!(rules, vec!["10.32.68", "192.168."]);
    }

    #[test]
    fn defaults_match_host_collection() {
        let cli = Cli::try_parse_from(["ngraph", "scan"]).expect("parse");
        let cfg = cli.collector_config();
        assert!(!cfg.all_namespaces);
        assert_eq!(cfg.source_address, SourceAddress::Host);
        assert_eq!(cfg.port_range_path, PathBuf::from(constants::IP_LOCAL_PORT_RANGE_FILE));
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn global_flags_are_accepted_before_subcommand() {
        let cli = Cli::try_parse_from(["ngraph", "--allow-public-ip", "serve"]).expect("parse");
        assert!(cli.allow_public_ip);
        assert!(matches!(cli.command, Command::Serve(_)));
    }

    #[test]
    fn unknown_source_address_is_rejected() {
        assert!(Cli::try_parse_from(["ngraph", "--source-address", "peer", "scan"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }
}
