use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use portup_resolver::InstallAction;
use tracing::{debug, warn};

use crate::InstallLayout;

/// Builds and installs the files of one package.
pub trait PortBuilder {
    fn build(&mut self, action: &InstallAction) -> Result<()>;
}

/// Runs the definition's `build` command inside a fresh buildtree.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    layout: InstallLayout,
}

impl CommandBuilder {
    pub fn new(layout: InstallLayout) -> Self {
        Self { layout }
    }
}

impl PortBuilder for CommandBuilder {
    fn build(&mut self, action: &InstallAction) -> Result<()> {
        let spec = &action.spec;
        let buildtree = self.layout.buildtree_path(spec);
        let install_dir = self.layout.package_dir(spec);

        if buildtree.exists() {
            fs::remove_dir_all(&buildtree).with_context(|| {
                format!("failed to clear stale buildtree: {}", buildtree.display())
            })?;
        }
        fs::create_dir_all(&buildtree)
            .with_context(|| format!("failed to create buildtree: {}", buildtree.display()))?;
        fs::create_dir_all(&install_dir).with_context(|| {
            format!("failed to create install directory: {}", install_dir.display())
        })?;

        let result = match &action.definition.build {
            Some(argv) => run_build_command(action, argv, &buildtree, &install_dir),
            None => {
                debug!(%spec, "port has no build command; recording install only");
                Ok(())
            }
        };

        if result.is_err() {
            if let Err(err) = fs::remove_dir_all(&install_dir) {
                warn!(%spec, error = %err, "failed to discard partial install");
            }
        }
        if !action.build_options.retain_buildtrees {
            if let Err(err) = fs::remove_dir_all(&buildtree) {
                warn!(%spec, error = %err, "failed to clean buildtree");
            }
        }

        result
    }
}

fn run_build_command(
    action: &InstallAction,
    argv: &[String],
    buildtree: &Path,
    install_dir: &Path,
) -> Result<()> {
    let Some((program, args)) = argv.split_first() else {
        return Err(anyhow!("build command for '{}' is empty", action.spec));
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(buildtree)
        .env("PORTUP_PORT", action.spec.name())
        .env("PORTUP_VERSION", action.definition.version.as_str())
        .env("PORTUP_TRIPLET", action.spec.triplet().as_str())
        .env("PORTUP_INSTALL_DIR", install_dir)
        .env("PORTUP_BUILDTREE", buildtree)
        .env(
            "PORTUP_ALLOW_DOWNLOADS",
            flag(action.build_options.allow_downloads),
        )
        .env("PORTUP_USE_HEAD", flag(action.build_options.use_head_version));

    debug!(spec = %action.spec, %program, "running build command");
    run_command(&mut command, &format!("build of '{}' failed", action.spec))
}

fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
