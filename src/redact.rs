use clap::ValueEnum;
use csv::ByteRecord;

use crate::config::DEFAULT_DROP_FIELDS;
use crate::error::{Error, Result};

/// Field names removed from every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionSet {
    fields: Vec<String>,
}

impl Default for RedactionSet {
    fn default() -> Self {
        Self {
            fields: DEFAULT_DROP_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl RedactionSet {
    /// Names are trimmed and deduplicated, keeping first-seen order.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = Vec::new();
        for field in fields {
            let name = field.as_ref().trim();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }

        if names.is_empty() {
            return Err(Error::Config("redaction set must name at least one field".to_string()));
        }

        Ok(Self { fields: names })
    }

    /// Comma-separated list, e.g. `invoiceId,accountId`.
    pub fn parse(list: &str) -> Result<Self> {
        Self::new(list.split(','))
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn contains(&self, name: &[u8]) -> bool {
        self.fields.iter().any(|f| f.as_bytes() == name)
    }

    /// Works out which columns of `header` survive redaction.
    pub fn project(&self, header: &ByteRecord) -> Projection {
        let keep: Vec<usize> = header
            .iter()
            .enumerate()
            .filter(|(_, name)| !self.contains(name))
            .map(|(i, _)| i)
            .collect();

        let missing = self
            .fields
            .iter()
            .filter(|f| !header.iter().any(|name| name == f.as_bytes()))
            .cloned()
            .collect();

        let mut projected = ByteRecord::with_capacity(0, keep.len());
        for &i in &keep {
            projected.push_field(&header[i]);
        }

        Projection {
            keep,
            missing,
            header: projected,
        }
    }
}

/// Columns retained from one source header.
#[derive(Debug, Clone)]
pub struct Projection {
    keep: Vec<usize>,
    missing: Vec<String>,
    header: ByteRecord,
}

impl Projection {
    /// The output header.
    pub fn header(&self) -> &ByteRecord {
        &self.header
    }

    /// Redaction-set names the source header did not have.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Copies the retained fields of `record` into `out`, bytes untouched.
    pub fn apply_into(&self, record: &ByteRecord, out: &mut ByteRecord) {
        out.clear();
        for &i in &self.keep {
            out.push_field(&record[i]);
        }
    }

    /// Re-targets this projection at `header`, which holds the same field
    /// names as `source` in another order. Output columns are matched by
    /// name; the n-th duplicate name matches the n-th occurrence. `None`
    /// when the two headers do not carry the same names.
    pub fn realign(&self, source: &ByteRecord, header: &ByteRecord) -> Option<Projection> {
        let mut expected: Vec<&[u8]> = source.iter().collect();
        let mut actual: Vec<&[u8]> = header.iter().collect();
        expected.sort_unstable();
        actual.sort_unstable();
        if expected != actual {
            return None;
        }

        let mut keep = Vec::with_capacity(self.keep.len());
        for (i, name) in self.header.iter().enumerate() {
            let occurrence = self.header.iter().take(i).filter(|n| *n == name).count();
            let index = header
                .iter()
                .enumerate()
                .filter(|(_, n)| *n == name)
                .nth(occurrence)
                .map(|(j, _)| j)?;
            keep.push(index);
        }

        Some(Projection {
            keep,
            missing: self.missing.clone(),
            header: self.header.clone(),
        })
    }

    pub fn apply(&self, record: &ByteRecord) -> ByteRecord {
        let mut out = ByteRecord::with_capacity(record.as_slice().len(), self.keep.len());
        self.apply_into(record, &mut out);
        out
    }
}

/// Behaviour when a field to drop is absent from the source header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MissingFieldPolicy {
    /// Removing an absent field is a no-op.
    Ignore,
    /// No-op, but logged.
    Warn,
    /// The job fails.
    Fail,
}

impl MissingFieldPolicy {
    pub fn check(&self, projection: &Projection) -> Result<()> {
        let missing = projection.missing();
        if missing.is_empty() {
            return Ok(());
        }

        match self {
            MissingFieldPolicy::Ignore => {
                tracing::debug!(?missing, "fields to drop not present in header");
                Ok(())
            }
            MissingFieldPolicy::Warn => {
                tracing::warn!(?missing, "fields to drop not present in header");
                Ok(())
            }
            MissingFieldPolicy::Fail => Err(Error::SchemaMismatch {
                missing: missing.to_vec(),
            }),
        }
    }
}
