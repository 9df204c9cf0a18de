//! Run command - resolve or reuse the cache, then launch the JVM

use crate::cache::{CacheGate, CacheOutcome};
use crate::cli::args::Cli;
use crate::config::Config;
use crate::coordinate::ArtifactCoordinate;
use crate::error::GetrunResult;
use crate::launch::{build_classpath, LaunchSpec, ProcessSupervisor};
use crate::repository::RepositoryChain;
use crate::resolve::MavenResolver;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Execute the run command, returning the child's exit code
pub async fn execute(args: &Cli, config: &Config) -> GetrunResult<u8> {
    let coord = ArtifactCoordinate::new(&args.group, &args.artifact, &args.version)?;

    let chain = RepositoryChain::from_sources(&config.repositories, config.resolver.timeout())?;
    debug!("Repository chain: {}", chain.names().join(", "));
    let resolver = MavenResolver::new(chain, config.resolver.verify_checksums);

    let gate = CacheGate::new(&config.cache.dir, &resolver)
        .verify_coordinate(config.cache.verify_coordinate);

    if args.refresh {
        gate.clear().await?;
    }

    let pb = (!gate.is_populated())
        .then(|| create_progress_bar(&format!("Resolving {}...", coord)));
    let obtained = gate.obtain(&coord).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let (files, outcome) = obtained?;

    if outcome == CacheOutcome::Reused {
        eprintln!(
            "{} {} folder detected... skipping download.",
            style("!").yellow(),
            gate.dir().display()
        );
    }

    let classpath = build_classpath(gate.dir(), &files);
    if classpath.is_empty() {
        debug!("Classpath is empty");
    }

    let spec = LaunchSpec {
        java: config.launch.java_executable(),
        jvm_args: config.launch.jvm_args.clone(),
        classpath,
        entry_point: args.main_class.clone(),
    };

    let mut supervisor = ProcessSupervisor::new(spec, config.launch.shutdown_grace());
    let exit = supervisor.launch_and_supervise().await?;

    Ok(exit.exit_byte())
}

fn create_progress_bar(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
