use chrono::{DateTime, Utc};
use csv::ByteRecord;
use futures::StreamExt;
use serde::Serialize;
use std::time::Instant;

use crate::config::{JobConfig, RUN_ID_FORMAT};
use crate::csvchunker::CsvChunkerWriter;
use crate::error::{Error, Result};
use crate::parser::{CsvFormat, CsvObjectReader};
use crate::redact::{MissingFieldPolicy, Projection, RedactionSet};
use crate::store::{ObjectLocation, ObjectStore};

/// Knobs of a single copy that are not locations or field names.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub run_id: String,
    pub format: CsvFormat,
    pub missing_field_policy: MissingFieldPolicy,
    pub max_rows_per_file: usize,
    pub read_concurrency: usize,
}

/// Counters for one `redact_and_copy` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CopyStats {
    pub objects_read: usize,
    pub objects_skipped: usize,
    pub objects_empty: usize,
    pub rows_read: u64,
    pub rows_written: u64,
    pub parts: Vec<String>,
    pub output_header: Vec<String>,
    pub missing_fields: Vec<String>,
}

/// Outcome of a committed run.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_name: String,
    pub run_id: String,
    pub source: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub stats: CopyStats,
}

/// One run of the job: `init`, then `run`, then `commit`.
pub struct Job {
    config: JobConfig,
    run_id: String,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl Job {
    pub fn init(config: JobConfig) -> Self {
        let started_at = Utc::now();
        let run_id = started_at.format(RUN_ID_FORMAT).to_string();

        tracing::info!(
            job = %config.job_name,
            run_id = %run_id,
            source = %config.source,
            target = %config.target,
            drop_fields = ?config.redaction.fields(),
            "job initialized"
        );

        Self {
            config,
            run_id,
            started_at,
            started: Instant::now(),
        }
    }

    /// Overrides the timestamp-derived run id.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub async fn run<S: ObjectStore + ?Sized>(&self, store: &S) -> Result<JobReport> {
        let options = CopyOptions {
            run_id: self.run_id.clone(),
            format: CsvFormat::default(),
            missing_field_policy: self.config.missing_field_policy,
            max_rows_per_file: self.config.max_rows_per_file,
            read_concurrency: self.config.read_concurrency,
        };

        let stats = redact_and_copy(
            store,
            &self.config.source,
            &self.config.target,
            &self.config.redaction,
            &options,
        )
        .await?;

        Ok(JobReport {
            job_name: self.config.job_name.clone(),
            run_id: self.run_id.clone(),
            source: self.config.source.to_string(),
            target: self.config.target.to_string(),
            started_at: self.started_at,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            stats,
        })
    }

    /// Marks the run as successful. Only reachable with a report from `run`.
    pub fn commit(self, report: JobReport) -> JobReport {
        tracing::info!(
            job = %report.job_name,
            run_id = %report.run_id,
            objects = report.stats.objects_read,
            rows = report.stats.rows_written,
            parts = report.stats.parts.len(),
            elapsed_ms = report.elapsed_ms,
            "job committed"
        );
        report
    }
}

/// Keys under `source` that hold data. Folder markers and anything below a
/// `_` or `.` prefixed path segment (`_SUCCESS`, `_temporary/`, `.crc`) are
/// left out.
pub fn is_data_key(source: &ObjectLocation, key: &str) -> bool {
    if key.ends_with('/') {
        return false;
    }
    let relative = key.strip_prefix(source.prefix.as_str()).unwrap_or(key);
    !relative
        .split('/')
        .any(|segment| segment.starts_with('_') || segment.starts_with('.'))
}

async fn discover_objects<S: ObjectStore + ?Sized>(
    store: &S,
    source: &ObjectLocation,
) -> Result<(Vec<String>, usize)> {
    let listed = store.list(source).await?;
    let total = listed.len();

    let mut keys: Vec<String> = listed
        .into_iter()
        .filter(|key| {
            let keep = is_data_key(source, key);
            if !keep {
                tracing::debug!(key = %key, "skipping non-data object");
            }
            keep
        })
        .collect();
    keys.sort();

    let skipped = total - keys.len();
    Ok((keys, skipped))
}

/// The output side, opened once the first header is known.
struct Sink<'s, S: ObjectStore + ?Sized> {
    first_key: String,
    header: ByteRecord,
    projection: Projection,
    writer: CsvChunkerWriter<'s, S>,
}

impl<'s, S: ObjectStore + ?Sized> Sink<'s, S> {
    fn open(
        store: &'s S,
        target: &ObjectLocation,
        key: &str,
        header: ByteRecord,
        fields_to_drop: &RedactionSet,
        options: &CopyOptions,
    ) -> Result<Self> {
        let projection = fields_to_drop.project(&header);
        options.missing_field_policy.check(&projection)?;

        tracing::info!(
            key = %key,
            input_fields = header.len(),
            output_fields = projection.header().len(),
            "schema resolved"
        );

        let writer = CsvChunkerWriter::new(
            store,
            target,
            &options.run_id,
            options.format,
            projection.header().clone(),
            options.max_rows_per_file,
        )?;

        Ok(Self {
            first_key: key.to_string(),
            header,
            projection,
            writer,
        })
    }

    /// `None` when `header` matches the first header exactly. A header with
    /// the same field names in another order gets a projection matched by
    /// name. Any other header is an error.
    fn check_header(&self, key: &str, header: &ByteRecord) -> Result<Option<Projection>> {
        if *header == self.header {
            return Ok(None);
        }

        match self.projection.realign(&self.header, header) {
            Some(aligned) => {
                tracing::info!(key = %key, first_key = %self.first_key, "columns reordered, matching by name");
                Ok(Some(aligned))
            }
            None => Err(Error::InconsistentHeader {
                key: key.to_string(),
                first_key: self.first_key.clone(),
            }),
        }
    }
}

/// Reads every CSV object under `source`, removes `fields_to_drop` from each
/// record and writes the records to `target` as rotated CSV parts.
///
/// Objects are fetched up to `read_concurrency` at a time; rows are decoded,
/// projected and written in key order. Any error aborts the copy, leaving
/// parts that were already uploaded in place.
pub async fn redact_and_copy<S: ObjectStore + ?Sized>(
    store: &S,
    source: &ObjectLocation,
    target: &ObjectLocation,
    fields_to_drop: &RedactionSet,
    options: &CopyOptions,
) -> Result<CopyStats> {
    let (keys, skipped) = discover_objects(store, source).await?;
    tracing::info!(source = %source, objects = keys.len(), skipped, "discovered source objects");

    let mut stats = CopyStats {
        objects_skipped: skipped,
        ..CopyStats::default()
    };

    let fetches = futures::stream::iter(keys.iter())
        .map(|key| async move { store.get(&source.bucket, key).await.map(|data| (key, data)) })
        .buffered(options.read_concurrency.max(1));
    futures::pin_mut!(fetches);

    let mut sink: Option<Sink<'_, S>> = None;
    let mut record = ByteRecord::new();
    let mut projected = ByteRecord::new();

    while let Some(fetched) = fetches.next().await {
        let (key, data) = fetched?;
        let mut reader = CsvObjectReader::new(key, &data, &options.format)?;
        stats.objects_read += 1;

        let header = match reader.header() {
            Some(header) => header.clone(),
            None => {
                tracing::debug!(key = %key, "empty object");
                stats.objects_empty += 1;
                continue;
            }
        };

        let (sink, realigned) = match sink.take() {
            Some(existing) => {
                let realigned = existing.check_header(key, &header)?;
                (sink.insert(existing), realigned)
            }
            None => (
                sink.insert(Sink::open(store, target, key, header, fields_to_drop, options)?),
                None,
            ),
        };
        let projection = realigned.as_ref().unwrap_or(&sink.projection);

        let mut rows = 0u64;
        while reader.read_record(&mut record)? {
            projection.apply_into(&record, &mut projected);
            sink.writer.write_record(&projected).await?;
            rows += 1;
        }
        stats.rows_read += rows;
        tracing::info!(key = %key, rows, bytes = data.len(), "processed object");
    }

    match sink {
        Some(sink) => {
            stats.output_header = sink
                .projection
                .header()
                .iter()
                .map(|name| String::from_utf8_lossy(name).into_owned())
                .collect();
            stats.missing_fields = sink.projection.missing().to_vec();

            let summary = sink.writer.finalize().await?;
            stats.rows_written = summary.rows_written;
            stats.parts = summary.parts;
        }
        None => {
            tracing::info!(source = %source, "no records under source, nothing written");
        }
    }

    Ok(stats)
}
