use anyhow::{bail, Context, Result};
use tokio::process::Command;

use crate::settings::AdbSettings;

/// Launches the capture app on the attached device with the host port and
/// forwards that port back to this machine. Failures are logged; the host
/// keeps listening either way so the app can be started by hand.
pub async fn prepare_device(settings: &AdbSettings, port: u16) {
    let port_arg = port.to_string();

    let launch = [
        "shell",
        "am",
        "start",
        "-n",
        settings.component.as_str(),
        "--es",
        settings.port_extra.as_str(),
        port_arg.as_str(),
    ];
    match run(&settings.program, &launch).await {
        Ok(out) => log::info!("Launched capture app: {}", out.trim()),
        Err(err) => log::error!("Failed to launch capture app: {err:#}"),
    }

    let tcp = format!("tcp:{port}");
    match run(&settings.program, &["reverse", tcp.as_str(), tcp.as_str()]).await {
        Ok(_) => log::info!("Reverse port forwarding set up for {}", tcp),
        Err(err) => log::error!("Failed to set up reverse port forwarding: {err:#}"),
    }
}

async fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("failed to run {program}"))?;

    if !output.status.success() {
        bail!(
            "{program} {} exited with {}: {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
