//! mlserve-compliance: check (and optionally fix) a bucket's security settings.
//!
//! Exit status is 0 only when the bucket ends up fully compliant.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use mlserve_compliance::{BucketConfigClient, ComplianceChecker, ComplianceError, StateFileClient};

#[derive(Parser, Debug)]
#[command(
    name = "mlserve-compliance",
    about = "Validate encryption and public-access settings of a storage bucket"
)]
struct Args {
    /// Bucket to check
    #[arg(long)]
    bucket: String,

    /// Apply safe defaults for every violation found
    #[arg(long)]
    fix: bool,

    /// AWS region
    #[arg(long, default_value = "us-east-1", env = "AWS_REGION")]
    region: String,

    /// Read bucket configuration from a YAML state file instead of the cloud API
    #[arg(long)]
    state: Option<PathBuf>,
}

async fn backend(args: &Args) -> Result<Arc<dyn BucketConfigClient>, ComplianceError> {
    if let Some(path) = &args.state {
        return Ok(Arc::new(StateFileClient::load(path)?));
    }

    #[cfg(feature = "aws")]
    {
        Ok(Arc::new(mlserve_compliance::S3ConfigClient::new(&args.region).await))
    }

    #[cfg(not(feature = "aws"))]
    {
        Err(ComplianceError::Backend(
            "no backend: pass --state FILE or build with the `aws` feature".into(),
        ))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    tracing::info!(bucket = %args.bucket, fix = args.fix, region = %args.region, "checking bucket compliance");

    let client = match backend(&args).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "backend setup failed");
            return ExitCode::FAILURE;
        }
    };

    let checker = ComplianceChecker::new(client, args.bucket.clone());
    let report = checker.run(args.fix).await;
    println!("{report}");

    if !args.fix && !report.violations().is_empty() {
        println!("run with --fix to apply safe defaults");
    }

    if report.is_compliant() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
