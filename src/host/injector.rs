use std::{process::Command, sync::Arc};

use anyhow::{bail, Context, Result};

use crate::settings::HostSettings;

/// Types one key on the host so it shows up on the device under test.
///
/// Called from the blocking pool.
pub trait KeyInjector: Send + Sync {
    fn inject(&self, key: char) -> Result<()>;
}

/// Runs an external program per keypress with the key as its last argument,
/// e.g. `xdotool type m`.
#[derive(Debug, Clone)]
pub struct CommandInjector {
    program: String,
    args: Vec<String>,
}

impl CommandInjector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl KeyInjector for CommandInjector {
    fn inject(&self, key: char) -> Result<()> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(key.to_string())
            .output()
            .with_context(|| format!("failed to run {}", self.program))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

/// Logs keypresses without sending them anywhere.
pub struct DryRunInjector;

impl KeyInjector for DryRunInjector {
    fn inject(&self, key: char) -> Result<()> {
        log::info!("dry run: would press {:?}", key);
        Ok(())
    }
}

pub fn injector_from_settings(settings: &HostSettings) -> Arc<dyn KeyInjector> {
    match &settings.injector_program {
        Some(program) => Arc::new(CommandInjector::new(program.clone(), settings.injector_args.clone())),
        None => {
            log::warn!("No key injector configured; keypresses will only be logged");
            Arc::new(DryRunInjector)
        }
    }
}
