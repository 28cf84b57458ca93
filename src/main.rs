mod config;
mod runtime;
mod shutdown;
mod signals;
mod update;
mod version;
mod view;

use clap::{Parser, Subcommand};
use shutdown::{MainView, ShutdownCoordinator, ShutdownPolicy};
use signals::ProcessSignals;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use update::{UpdateChecker, UpdateStatus};
use version::Version;

/// A console application that shuts down cleanly on Ctrl-C/SIGTERM and can
/// check a published manifest for newer releases.
#[derive(Parser, Debug)]
#[command(name = "lifeline", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "lifeline.toml", global = true)]
    config: PathBuf,

    /// Extra logging (signal delivery, update requests)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the interactive console until quit or a stop signal
    Run {
        /// Do not intercept SIGINT/SIGTERM (overrides config)
        #[arg(long)]
        no_intercept: bool,
    },
    /// Compare a dotted-triplet version against a reference
    Compare {
        /// Candidate version, e.g. 1.4.0
        candidate: String,
        /// Reference version (default: this build)
        reference: Option<String>,
    },
    /// Fetch the published manifest and report whether an update exists
    CheckUpdate {
        /// Manifest URL (overrides config)
        #[arg(long)]
        manifest_url: Option<String>,
        /// Pretend to be this version instead of the running build
        #[arg(long)]
        current: Option<String>,
    },
    /// Print process and platform details
    Info {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    tracing::debug!(?cli, "parsed CLI arguments");

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "lifeline failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "lifeline=debug"
    } else if quiet {
        "lifeline=warn"
    } else {
        "lifeline=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

async fn dispatch(cli: Cli) -> CliResult {
    match cli.command {
        Command::Compare {
            candidate,
            reference,
        } => compare(&candidate, reference.as_deref()),
        Command::Info { json } => info(json),
        Command::CheckUpdate {
            manifest_url,
            current,
        } => {
            let config = config::load(&cli.config)?;
            let url = manifest_url
                .or(config.update.manifest_url.clone())
                .ok_or("no manifest URL: pass --manifest-url or set update.manifest_url")?;
            let running = match current {
                Some(v) => v.parse()?,
                None => Version::current(),
            };
            check_update(&config.update, &url, &running).await
        }
        Command::Run { no_intercept } => {
            let mut config = config::load(&cli.config)?;
            if no_intercept {
                config.shutdown.intercept = false;
            }
            run(config).await
        }
    }
}

fn compare(candidate: &str, reference: Option<&str>) -> CliResult {
    let reference = match reference {
        Some(r) => r.parse()?,
        None => Version::current(),
    };
    let symbol = match version::compare_version_signed(candidate, &reference)? {
        n if n < 0 => "<",
        0 => "==",
        _ => ">",
    };
    println!("{candidate} {symbol} {reference}");
    Ok(ExitCode::SUCCESS)
}

fn info(json: bool) -> CliResult {
    let info = runtime::RuntimeInfo::collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print!("{}", view::format_info(&info));
    }
    Ok(ExitCode::SUCCESS)
}

async fn check_update(
    config: &config::UpdateConfig,
    url: &str,
    running: &Version,
) -> CliResult {
    let checker = UpdateChecker::new(config)?;
    match checker.check(url, running).await? {
        UpdateStatus::Available {
            version,
            download_url,
            notes,
        } => {
            println!("update available: {version} (running {running})");
            if let Some(link) = download_url {
                println!("download: {link}");
            }
            if let Some(notes) = notes {
                println!("{notes}");
            }
        }
        UpdateStatus::UpToDate => println!("up to date ({running})"),
        UpdateStatus::Ahead { version } => {
            println!("running {running}, newer than published {version}")
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run(config: config::LifelineConfig) -> CliResult {
    let console = Arc::new(view::ConsoleView::new());
    let main_view: Arc<dyn MainView> = console.clone();

    let coordinator = if config.shutdown.intercept {
        install_coordinator(&config.shutdown, &main_view)
    } else {
        tracing::info!("shutdown interception disabled by configuration");
        None
    };

    if config.update.check_on_start {
        spawn_update_check(config.update);
    }

    let reason = console
        .run(view::stdin_lines(), tokio::io::stdout())
        .await?;
    tracing::info!(?reason, closed = console.is_closed(), "console exited");

    if let Some(coordinator) = coordinator {
        coordinator.clear_main_view();
        coordinator.disable()?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Hook stop requests to the console. Failure is logged and the console runs
/// without graceful interrupt handling.
fn install_coordinator(
    config: &config::ShutdownConfig,
    main_view: &Arc<dyn MainView>,
) -> Option<ShutdownCoordinator<ProcessSignals>> {
    let host = match ProcessSignals::new() {
        Ok(host) => host,
        Err(e) => {
            tracing::warn!(error = %e, "signal host unavailable, running without interception");
            return None;
        }
    };

    let coordinator = ShutdownCoordinator::new(
        host,
        ShutdownPolicy {
            swallow_without_view: config.swallow_without_view,
        },
    );
    coordinator.set_main_view(main_view);
    if let Err(e) = coordinator.enable() {
        tracing::warn!(error = %e, "failed to intercept stop signals, running without");
        return None;
    }
    tracing::debug!(
        policy = ?coordinator.policy(),
        hooked = coordinator.is_hooked(),
        "stop requests will close the console"
    );
    Some(coordinator)
}

fn spawn_update_check(config: config::UpdateConfig) {
    let Some(url) = config.manifest_url.clone() else {
        tracing::warn!("update.check_on_start is set but update.manifest_url is missing");
        return;
    };

    tokio::spawn(async move {
        let checker = match UpdateChecker::new(&config) {
            Ok(checker) => checker,
            Err(e) => {
                tracing::warn!(error = %e, "update check skipped");
                return;
            }
        };
        match checker.check(&url, &Version::current()).await {
            Ok(UpdateStatus::Available { version, .. }) => {
                tracing::info!(%version, "a newer lifeline release is available")
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "update check failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_compare() {
        let cli = Cli::try_parse_from(["lifeline", "compare", "1.2.3", "1.2.4"]).unwrap();
        match cli.command {
            Command::Compare {
                candidate,
                reference,
            } => {
                assert_eq!(candidate, "1.2.3");
                assert_eq!(reference.as_deref(), Some("1.2.4"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["lifeline", "run", "--no-intercept", "-v", "-c", "x.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert!(matches!(cli.command, Command::Run { no_intercept: true }));
    }

    #[test]
    fn test_cli_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["lifeline", "-v", "-q", "info"]).is_err());
    }

    #[test]
    fn test_compare_rejects_bad_candidate() {
        assert!(compare("1.2.3.4", Some("1.2.3")).is_err());
        assert!(compare("1.2.3", Some("1.2")).is_err());
    }

    #[test]
    fn test_compare_accepts_valid_pair() {
        assert!(compare("2.0.0", Some("1.99.99")).is_ok());
    }
}
