//! 🚀 inlet-cli — the front door.
//!
//! Thin wrapper: set up logging, merge flags over env and config file, drain the source
//! to NDJSON, print the summary. The real work happens in the `inlet` crate. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use inlet::{ConfigOverrides, SourceKind};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Read documents from files, folders, Elasticsearch or Solr and write them as NDJSON.
#[derive(Debug, Parser)]
#[command(name = "inlet", version, about)]
struct Cli {
    /// File, folder, or server address. Overrides `input.source`.
    source: Option<String>,

    /// auto, solr, elastic, json_stream, large_json or folder.
    #[arg(long)]
    source_type: Option<SourceKind>,

    /// Field holding the text to extract.
    #[arg(long)]
    content_field: Option<String>,

    /// TOML config file. Environment variables (INLET_*) are always read.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Write NDJSON here instead of stdout.
    #[arg(long, short)]
    output: Option<String>,

    /// Stop after this many records.
    #[arg(long)]
    limit: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            source: self.source.clone(),
            source_type: self.source_type,
            content_field: self.content_field.clone(),
            output_file: self.output.clone(),
            limit: self.limit,
        }
    }
}

/// 🕵️ Does anything in the chain smell like "the server isn't there"?
fn looks_like_connection_trouble(err: &anyhow::Error) -> bool {
    err.chain().skip(1).any(|cause| {
        let cause_str = cause.to_string();
        cause_str.contains("error sending request")
            || cause_str.contains("connection refused")
            || cause_str.contains("Connection refused")
            || cause_str.contains("tcp connect error")
            || cause_str.contains("dns error")
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // -- logs go to stderr so stdout stays clean NDJSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(config_file) = &cli.config {
        let exists = config_file.try_exists().with_context(|| {
            format!(
                "💀 Couldn't check whether the config file exists. If it's a relative path, \
                 try an absolute one. Was checking here: '{}'",
                config_file.display()
            )
        })?;
        if !exists {
            anyhow::bail!(
                "💀 Config file '{}' does not exist. Double check the path (and your cwd).",
                config_file.display()
            );
        }
    }

    let app_config = inlet::load_config_with(cli.config.as_deref(), &cli.overrides())
        .context("💀 In inlet-cli, we couldn't assemble a configuration. Pass a SOURCE, or set input.source in the config file or INLET_INPUT__SOURCE")?;

    match inlet::run(app_config).await {
        Ok(summary) => {
            eprintln!("{}", summary.render());
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
            }
            if looks_like_connection_trouble(&err) {
                error!(
                    "🔧 hint: looks like a service isn't reachable. Double-check that \
                     Elasticsearch or Solr is actually running and the address is right. \
                     If you're using Docker, `docker ps` will tell you who's home."
                );
            }
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_flags_become_overrides() {
        let cli = Cli::parse_from([
            "inlet",
            "/data/articles.json",
            "--source-type",
            "large_json",
            "--content-field",
            "abstract",
            "--limit",
            "10",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.source.as_deref(), Some("/data/articles.json"));
        assert_eq!(overrides.source_type, Some(SourceKind::LargeJson));
        assert_eq!(overrides.content_field.as_deref(), Some("abstract"));
        assert_eq!(overrides.limit, Some(10));
        assert!(overrides.output_file.is_none());
    }

    #[test]
    fn the_one_where_a_bogus_source_type_is_rejected_by_clap() {
        assert!(Cli::try_parse_from(["inlet", "x", "--source-type", "mongodb"]).is_err());
    }

    #[test]
    fn the_one_where_connection_refused_earns_a_hint() {
        let err = anyhow::anyhow!("tcp connect error: Connection refused").context("💀 scroll failed");
        assert!(looks_like_connection_trouble(&err));
        let err = anyhow::anyhow!("index_not_found_exception").context("💀 scroll failed");
        assert!(!looks_like_connection_trouble(&err));
    }
}
