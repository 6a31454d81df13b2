use csv::{ByteRecord, Writer};

use crate::config::EXTENSION;
use crate::error::{Error, Result};
use crate::parser::CsvFormat;
use crate::store::{ObjectLocation, ObjectStore};

/// Buffers output rows as CSV and uploads a new part object every
/// `max_rows` rows. Every part starts with the header.
pub struct CsvChunkerWriter<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    target: ObjectLocation,
    run_id: String,
    format: CsvFormat,
    header: ByteRecord,
    file_index: usize,
    current_rows: usize,
    max_rows: usize,
    rows_written: u64,
    parts: Vec<String>,
    writer: Writer<Vec<u8>>,
}

/// What a finished writer left behind.
#[derive(Debug, Clone, Default)]
pub struct ChunkSummary {
    pub parts: Vec<String>,
    pub rows_written: u64,
}

impl<'s, S: ObjectStore + ?Sized> CsvChunkerWriter<'s, S> {
    pub fn new(
        store: &'s S,
        target: &ObjectLocation,
        run_id: &str,
        format: CsvFormat,
        header: ByteRecord,
        max_rows: usize,
    ) -> Result<Self> {
        let writer = new_part_writer(&format, &header)?;

        Ok(Self {
            store,
            target: target.clone(),
            run_id: run_id.to_string(),
            format,
            header,
            file_index: 0,
            current_rows: 0,
            max_rows: max_rows.max(1),
            rows_written: 0,
            parts: Vec::new(),
            writer,
        })
    }

    fn current_key(&self) -> String {
        self.target.key(&format!(
            "run-{}-part-r-{:05}{}",
            self.run_id, self.file_index, EXTENSION
        ))
    }

    async fn upload(&mut self, finished: Writer<Vec<u8>>) -> Result<()> {
        let data = finished
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;

        let key = self.current_key();
        tracing::info!(
            bucket = %self.target.bucket,
            key = %key,
            rows = self.current_rows,
            bytes = data.len(),
            "uploading part"
        );
        self.store.put(&self.target.bucket, &key, data).await?;
        self.parts.push(key);

        Ok(())
    }

    async fn rotate(&mut self) -> Result<()> {
        let fresh = new_part_writer(&self.format, &self.header)?;
        let finished = std::mem::replace(&mut self.writer, fresh);
        self.upload(finished).await?;

        self.file_index += 1;
        self.current_rows = 0;
        Ok(())
    }

    pub async fn write_record(&mut self, rec: &ByteRecord) -> Result<()> {
        // rotate before writing the next row if reached limit
        if self.current_rows >= self.max_rows {
            self.rotate().await?;
        }
        self.writer.write_byte_record(rec)?;
        self.current_rows += 1;
        self.rows_written += 1;
        Ok(())
    }

    /// Uploads the last part. A writer that saw no rows still uploads one
    /// header-only part.
    pub async fn finalize(mut self) -> Result<ChunkSummary> {
        if self.current_rows > 0 || self.parts.is_empty() {
            let finished = std::mem::replace(
                &mut self.writer,
                self.format.writer_builder().from_writer(Vec::new()),
            );
            self.upload(finished).await?;
        }

        Ok(ChunkSummary {
            parts: self.parts,
            rows_written: self.rows_written,
        })
    }
}

fn new_part_writer(format: &CsvFormat, header: &ByteRecord) -> Result<Writer<Vec<u8>>> {
    let mut writer = format.writer_builder().from_writer(Vec::new());
    writer.write_byte_record(header)?;
    Ok(writer)
}
