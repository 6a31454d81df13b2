use anyhow::Result;

use etl_redact::aws::{make_s3_client, S3Store};
use etl_redact::config::JobArgs;
use etl_redact::logging::init_logging;
use etl_redact::Job;

#[tokio::main]
async fn main() -> Result<()> {
    let args = JobArgs::parse_known(std::env::args_os());
    init_logging(args.log_format)?;

    let config = args.into_config()?;

    // init client
    let client = make_s3_client(config.endpoint_url.as_deref()).await;
    let store = S3Store::new(client);

    let job = Job::init(config);
    let report = match job.run(&store).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, source_error = e.is_source_error(), "job failed");
            return Err(e.into());
        }
    };

    let report = job.commit(report);
    println!("{}", serde_json::to_string(&report)?);

    Ok(())
}
