use colored::Colorize;
use scwflow_cloud::OpContext;
use scwflow_cloud_scaleway::{ScalewayClient, sweepers};
use scwflow_config::ProviderConfig;
use std::path::Path;
use std::time::Duration;

pub async fn handle(
    config_path: Option<&Path>,
    kind: Option<&str>,
    timeout_secs: u64,
    yes: bool,
) -> anyhow::Result<()> {
    let kinds: Vec<&str> = match kind {
        Some(k) if sweepers::KINDS.contains(&k) => vec![k],
        Some(k) => anyhow::bail!(
            "unknown kind '{}' (known: {})",
            k,
            sweepers::KINDS.join(", ")
        ),
        None => sweepers::KINDS.to_vec(),
    };

    let config = match config_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
            ProviderConfig::from_value(serde_json::from_str(&raw)?)?
        }
        None => ProviderConfig {
            profile_path: Some(scwflow_config::default_profile_path()?),
            ..Default::default()
        },
    }
    .resolve()?;
    config.validate()?;

    println!("{}", "Resources to sweep:".bold());
    for k in &kinds {
        println!("  • {}", k.cyan());
    }
    if !yes {
        println!();
        println!(
            "{}",
            "Warning: every resource of these kinds in every known locality will be deleted."
                .yellow()
        );
        println!("Pass --yes to run the sweep");
        return Ok(());
    }

    let client = ScalewayClient::new(&config)?;
    let ctx = OpContext::with_cancellation(
        Duration::from_secs(timeout_secs),
        super::interrupt_token(),
    );

    let mut failed = 0;
    for k in kinds {
        let report = sweepers::sweep_kind(&ctx, &client, k).await?;
        println!(
            "{} {}: {} deleted, {} failed ({} ms)",
            if report.is_success() { "✓".green() } else { "✗".red() },
            k,
            report.succeeded.len(),
            report.failed.len(),
            report.duration_ms
        );
        for failure in &report.failed {
            println!(
                "    {} {}",
                failure.target.dimmed(),
                failure.error.as_deref().unwrap_or_default().red()
            );
        }
        failed += report.failed.len();
    }

    if failed > 0 {
        anyhow::bail!("{} resources could not be swept", failed);
    }
    Ok(())
}
