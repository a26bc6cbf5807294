// adminprobe entry point.

use std::path::PathBuf;
use std::process;

use adminprobe::config::HarnessConfig;
use adminprobe::exit_code::ExitCode;
use adminprobe::output::{print_error, print_report, OutputFormat};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ADMINPROBE_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "adminprobe",
    version,
    about = "Conformance harness for a document server's admin console"
)]
struct Cli {
    /// Config file (default: ~/.adminprobe/config.toml when present).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Server base URL, e.g. https://127.0.0.1:9980.
    #[arg(long, value_name = "URL")]
    server_url: Option<String>,

    #[arg(long)]
    admin_user: Option<String>,

    /// Prefer ADMINPROBE_ADMIN_PASSWORD; flags are visible in process listings.
    #[arg(long)]
    admin_password: Option<String>,

    /// Force the TLS-only steps on or off instead of inferring from the URL.
    #[arg(long, value_name = "BOOL")]
    secure_transport: Option<bool>,

    /// Per-exchange timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    message_timeout_ms: Option<u64>,

    /// Whole-run timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    run_timeout_ms: Option<u64>,

    /// Directory holding hello.odt and insert-delete.odp.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Skip the rmdoc notification step.
    #[arg(long)]
    skip_rmdoc: bool,

    /// Emit the report as JSON even on a terminal.
    #[arg(long)]
    json: bool,

    /// tracing filter directive (falls back to ADMINPROBE_LOG, then `info`).
    #[arg(long, value_name = "FILTER")]
    log_filter: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(url) = &self.server_url {
            config.server_url = url.clone();
        }
        if let Some(user) = &self.admin_user {
            config.admin_user = user.clone();
        }
        if let Some(password) = &self.admin_password {
            config.admin_password = password.clone();
        }
        if let Some(secure) = self.secure_transport {
            config.secure_transport = Some(secure);
        }
        if let Some(ms) = self.message_timeout_ms {
            config.message_timeout_ms = ms;
        }
        if let Some(ms) = self.run_timeout_ms {
            config.run_timeout_ms = ms;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if self.skip_rmdoc {
            config.rmdoc_check = false;
        }
    }

    fn resolve_config(&self) -> anyhow::Result<HarnessConfig> {
        let base = match &self.config {
            Some(path) => HarnessConfig::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => HarnessConfig::load().context("failed to load default config")?,
        };
        let mut config = base.with_env();
        self.apply(&mut config);
        config.endpoints().context("invalid server url")?;
        Ok(config)
    }
}

fn init_tracing(directive: Option<&str>) -> anyhow::Result<()> {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log filter `{directive}`"))?,
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    Ok(())
}

#[tokio::main]
async fn main() -> process::ExitCode {
    let cli = Cli::parse();
    let format = OutputFormat::detect(cli.json);

    if let Err(err) = init_tracing(cli.log_filter.as_deref()) {
        print_error(format, &err);
        return ExitCode::Usage.into();
    }

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(err) => {
            print_error(format, &err);
            return ExitCode::Usage.into();
        }
    };

    match adminprobe::run(&config).await {
        Ok(report) => {
            if let Err(err) = print_report(format, &report) {
                tracing::warn!(%err, "failed to write report");
            }
            ExitCode::from_verdict(report.verdict).into()
        }
        Err(err) => {
            print_error(format, &err);
            ExitCode::from_error(&err).into()
        }
    }
}
