use anyhow::Context;
use clap::Parser;
use screendiff::{
    ARTIFACT_TIMESTAMP_FORMAT, DiffArtifact, DiffRequest, RenderMode, artifact_file_name,
    compute_diff,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status when the diff exceeds `--fail-above`.
const EXIT_DIFF_TOO_LARGE: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "diff_tester")]
#[command(
    about = "Compare two screenshots and write a PNG showing where they differ",
    long_about = None
)]
struct Cli {
    /// The "before" image
    image_a: PathBuf,

    /// The "after" image; the artifact is drawn from its pixels
    image_b: PathBuf,

    /// Sensitivity in percent of the 8-bit channel range
    #[arg(
        short,
        long,
        default_value_t = screendiff::DEFAULT_THRESHOLD_PERCENT,
        allow_negative_numbers = true
    )]
    threshold: f64,

    /// transparent-overlay or highlighted-blend
    #[arg(short, long, default_value_t = RenderMode::TransparentOverlay)]
    mode: RenderMode,

    /// Output file (default: a timestamped name inside --out-dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for generated output names
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Print statistics as JSON
    #[arg(long)]
    json: bool,

    /// Exit with status 2 when the difference percentage is above this value
    #[arg(long)]
    fail_above: Option<f64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(artifact) => match cli.fail_above {
            Some(limit) if artifact.stats.difference_percentage > limit => {
                eprintln!(
                    "Difference {:.4}% exceeds allowed {limit}%",
                    artifact.stats.difference_percentage
                );
                ExitCode::from(EXIT_DIFF_TOO_LARGE)
            }
            _ => ExitCode::SUCCESS,
        },
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<DiffArtifact> {
    let request = DiffRequest::new(&cli.image_a, &cli.image_b)
        .with_threshold(cli.threshold)
        .with_mode(cli.mode);
    let artifact = compute_diff(&request)?;

    let output = match &cli.output {
        Some(path) => path.clone(),
        None => {
            let stamp = chrono::Utc::now().format(ARTIFACT_TIMESTAMP_FORMAT);
            cli.out_dir.join(artifact_file_name(stamp))
        }
    };
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    std::fs::write(&output, &artifact.png)
        .with_context(|| format!("writing {}", output.display()))?;
    tracing::info!(output = %output.display(), "diff written");

    let stats = &artifact.stats;
    if cli.json {
        let report = serde_json::json!({
            "stats": stats,
            "mode": artifact.mode,
            "output": output,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Different pixels:     {}", stats.different_pixel_count);
        println!("Total pixels:         {}", stats.total_pixel_count);
        println!("Difference:           {:.4}%", stats.difference_percentage);
        println!("Dimensions:           {}x{}", stats.width, stats.height);
        println!("Output ({}): {}", artifact.mode, output.display());
    }

    Ok(artifact)
}
