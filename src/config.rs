// Configuration for the redaction job //

use std::ffi::OsString;

use clap::{CommandFactory, Parser, ValueEnum};

use crate::error::{Error, Result};
use crate::redact::{MissingFieldPolicy, RedactionSet};
use crate::store::ObjectLocation;

pub const DEFAULT_DROP_FIELDS: [&str; 2] = ["invoiceId", "accountId"];
pub const MAX_ROWS_PER_FILE: usize = 100_000;
pub const READ_CONCURRENCY: usize = 4;
pub const RUN_ID_FORMAT: &str = "%Y%m%d%H%M%S%3f";
pub const EXTENSION: &str = ".csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Invocation parameters. Every flag can also come from the environment
/// variable of the same name.
#[derive(Debug, Parser)]
#[command(version, about = "Copy CSV objects between S3 locations with fields removed")]
pub struct JobArgs {
    /// Identifier for the run, reported on commit
    #[arg(long = "JOB_NAME", env = "JOB_NAME")]
    pub job_name: String,

    /// Bucket (optionally bucket/prefix) to read from
    #[arg(long = "SOURCE_BUCKETNAME", env = "SOURCE_BUCKETNAME")]
    pub source_bucket_name: String,

    /// Bucket (optionally bucket/prefix) to write to
    #[arg(long = "TARGET_BUCKETNAME", env = "TARGET_BUCKETNAME")]
    pub target_bucket_name: String,

    /// Comma-separated field names to remove [default: invoiceId,accountId]
    #[arg(long = "DROP_FIELDS", env = "DROP_FIELDS")]
    pub drop_fields: Option<String>,

    /// What to do when a field to drop is absent from the header
    #[arg(long = "MISSING_FIELD_POLICY", env = "MISSING_FIELD_POLICY", value_enum, default_value_t = MissingFieldPolicy::Ignore)]
    pub missing_field_policy: MissingFieldPolicy,

    /// Data rows per output object
    #[arg(long = "MAX_ROWS_PER_FILE", env = "MAX_ROWS_PER_FILE", default_value_t = MAX_ROWS_PER_FILE)]
    pub max_rows_per_file: usize,

    /// Source objects fetched ahead of the writer
    #[arg(long = "READ_CONCURRENCY", env = "READ_CONCURRENCY", default_value_t = READ_CONCURRENCY)]
    pub read_concurrency: usize,

    /// Custom S3 endpoint, e.g. a local S3-compatible server
    #[arg(long = "ENDPOINT_URL", env = "ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    #[arg(long = "LOG_FORMAT", env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl JobArgs {
    /// Parses the process arguments after dropping flags the job does not
    /// declare. The job runner passes its own `--key value` pairs
    /// (`--job-bookmark-option`, `--enable-metrics`, ...) to every job.
    pub fn parse_known<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::parse_from(known_args(args))
    }

    pub fn try_parse_known<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(known_args(args))
    }

    pub fn into_config(self) -> Result<JobConfig> {
        if self.job_name.trim().is_empty() {
            return Err(Error::Config("JOB_NAME must not be empty".to_string()));
        }

        let redaction = match &self.drop_fields {
            Some(list) => RedactionSet::parse(list)?,
            None => RedactionSet::default(),
        };

        if self.max_rows_per_file == 0 {
            return Err(Error::Config("MAX_ROWS_PER_FILE must be positive".to_string()));
        }
        if self.read_concurrency == 0 {
            return Err(Error::Config("READ_CONCURRENCY must be positive".to_string()));
        }

        Ok(JobConfig {
            job_name: self.job_name.trim().to_string(),
            source: ObjectLocation::parse(&self.source_bucket_name)?,
            target: ObjectLocation::parse(&self.target_bucket_name)?,
            redaction,
            missing_field_policy: self.missing_field_policy,
            max_rows_per_file: self.max_rows_per_file,
            read_concurrency: self.read_concurrency,
            endpoint_url: self.endpoint_url,
            log_format: self.log_format,
        })
    }
}

/// Filters `args` (binary name first) down to the long flags `JobArgs`
/// declares. An unknown `--flag` is dropped together with its value: the
/// inline `=value`, or the next argument unless that is itself a flag.
pub fn known_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let command = JobArgs::command();
    let known: Vec<&str> = command
        .get_arguments()
        .filter_map(|arg| arg.get_long())
        .chain(["help", "version"])
        .collect();

    let mut args = args.into_iter().map(Into::<OsString>::into).peekable();
    let mut kept: Vec<OsString> = args.next().into_iter().collect();

    while let Some(arg) = args.next() {
        let flag = arg
            .to_str()
            .and_then(|text| text.strip_prefix("--"))
            .map(|flag| match flag.split_once('=') {
                Some((name, _)) => (name.to_string(), true),
                None => (flag.to_string(), false),
            });

        match flag {
            None => kept.push(arg),
            Some((name, _)) if known.contains(&name.as_str()) => kept.push(arg),
            Some((_, true)) => {}
            Some((_, false)) => {
                args.next_if(|next| !is_long_flag(next));
            }
        }
    }

    kept
}

fn is_long_flag(arg: &OsString) -> bool {
    arg.to_str().is_some_and(|text| text.starts_with("--"))
}

/// Validated job configuration.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub job_name: String,
    pub source: ObjectLocation,
    pub target: ObjectLocation,
    pub redaction: RedactionSet,
    pub missing_field_policy: MissingFieldPolicy,
    pub max_rows_per_file: usize,
    pub read_concurrency: usize,
    pub endpoint_url: Option<String>,
    pub log_format: LogFormat,
}

impl JobConfig {
    /// Defaults for everything but the three required parameters.
    pub fn new(job_name: &str, source: ObjectLocation, target: ObjectLocation) -> Self {
        Self {
            job_name: job_name.to_string(),
            source,
            target,
            redaction: RedactionSet::default(),
            missing_field_policy: MissingFieldPolicy::Ignore,
            max_rows_per_file: MAX_ROWS_PER_FILE,
            read_concurrency: READ_CONCURRENCY,
            endpoint_url: None,
            log_format: LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<JobArgs, clap::Error> {
        JobArgs::try_parse_from(std::iter::once("etl_redact").chain(args.iter().copied()))
    }

    #[test]
    fn test_required_parameters() {
        let args = parse(&[
            "--JOB_NAME",
            "glue-etl-job",
            "--SOURCE_BUCKETNAME",
            "production-data",
            "--TARGET_BUCKETNAME",
            "nonproduction-data",
        ])
        .unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.job_name, "glue-etl-job");
        assert_eq!(config.source.to_string(), "s3://production-data/");
        assert_eq!(config.target.to_string(), "s3://nonproduction-data/");
        assert_eq!(config.redaction.fields(), &["invoiceId", "accountId"]);
        assert_eq!(config.missing_field_policy, MissingFieldPolicy::Ignore);
        assert_eq!(config.max_rows_per_file, MAX_ROWS_PER_FILE);
    }

    #[test]
    fn test_optional_parameters() {
        let args = parse(&[
            "--JOB_NAME=j",
            "--SOURCE_BUCKETNAME=s3://src/in/",
            "--TARGET_BUCKETNAME=dst",
            "--DROP_FIELDS=email, phone",
            "--MISSING_FIELD_POLICY=fail",
            "--MAX_ROWS_PER_FILE=10",
            "--READ_CONCURRENCY=2",
            "--LOG_FORMAT=json",
        ])
        .unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.source.prefix, "in/");
        assert_eq!(config.redaction.fields(), &["email", "phone"]);
        assert_eq!(config.missing_field_policy, MissingFieldPolicy::Fail);
        assert_eq!(config.max_rows_per_file, 10);
        assert_eq!(config.read_concurrency, 2);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_runner_arguments_are_ignored() {
        let argv = [
            "etl_redact",
            "--JOB_NAME",
            "glue-etl-job",
            "--job-bookmark-option",
            "job-bookmark-disable",
            "--job-language",
            "python",
            "--enable-metrics",
            "",
            "--spark-event-logs-path",
            "s3://internal-infrastructure-logs/glue-etl-job/logs/",
            "--enable-continuous-cloudwatch-log",
            "true",
            "--SOURCE_BUCKETNAME",
            "production-data",
            "--TARGET_BUCKETNAME",
            "nonproduction-data",
        ];
        assert!(JobArgs::try_parse_from(argv).is_err());

        let config = JobArgs::try_parse_known(argv).unwrap().into_config().unwrap();
        assert_eq!(config.job_name, "glue-etl-job");
        assert_eq!(config.source.to_string(), "s3://production-data/");
        assert_eq!(config.target.to_string(), "s3://nonproduction-data/");
    }

    #[test]
    fn test_known_args_filtering() {
        let kept = known_args([
            "etl_redact",
            "--TempDir=s3://tmp/",
            "--enable-glue-datacatalog",
            "--JOB_NAME=j",
            "--job-bookmark-option",
            "job-bookmark-disable",
            "--DROP_FIELDS",
            "email",
        ]);
        assert_eq!(
            kept,
            vec!["etl_redact", "--JOB_NAME=j", "--DROP_FIELDS", "email"]
        );
    }

    #[test]
    fn test_missing_required_parameter() {
        assert!(parse(&["--JOB_NAME", "j", "--SOURCE_BUCKETNAME", "s"]).is_err());
    }

    #[test]
    fn test_rejects_zero_rows_per_file() {
        let args = parse(&[
            "--JOB_NAME=j",
            "--SOURCE_BUCKETNAME=s",
            "--TARGET_BUCKETNAME=t",
            "--MAX_ROWS_PER_FILE=0",
        ])
        .unwrap();
        assert!(matches!(args.into_config(), Err(Error::Config(_))));
    }
}
