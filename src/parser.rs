use csv::{ByteRecord, QuoteStyle, Reader, ReaderBuilder, WriterBuilder};

use crate::error::{Error, Result};

/// Delimited-text layout shared by the source and the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvFormat {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
        }
    }
}

impl CsvFormat {
    pub fn reader_builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(self.delimiter)
            .quote(self.quote)
            .has_headers(true)
            .flexible(false);
        builder
    }

    pub fn writer_builder(&self) -> WriterBuilder {
        let mut builder = WriterBuilder::new();
        builder
            .delimiter(self.delimiter)
            .quote(self.quote)
            .quote_style(QuoteStyle::Necessary)
            .has_headers(false);
        builder
    }
}

/// Reads the header and rows of one downloaded source object.
pub struct CsvObjectReader<'a> {
    key: &'a str,
    reader: Reader<&'a [u8]>,
    header: Option<ByteRecord>,
}

impl<'a> CsvObjectReader<'a> {
    pub fn new(key: &'a str, data: &'a [u8], format: &CsvFormat) -> Result<Self> {
        let mut reader = format.reader_builder().from_reader(data);

        let header = reader
            .byte_headers()
            .map_err(|e| source_read(key, e))?
            .clone();

        // a zero-byte object has no header at all
        let header = if header.is_empty() { None } else { Some(header) };

        Ok(Self { key, reader, header })
    }

    pub fn header(&self) -> Option<&ByteRecord> {
        self.header.as_ref()
    }

    /// Fills `record` with the next row; `false` once the object is exhausted.
    pub fn read_record(&mut self, record: &mut ByteRecord) -> Result<bool> {
        if self.header.is_none() {
            return Ok(false);
        }
        self.reader
            .read_byte_record(record)
            .map_err(|e| source_read(self.key, e))
    }
}

fn source_read(key: &str, err: csv::Error) -> Error {
    Error::SourceRead {
        key: key.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(data: &[u8]) -> Result<(Option<ByteRecord>, Vec<ByteRecord>)> {
        let mut reader = CsvObjectReader::new("in/data.csv", data, &CsvFormat::default())?;
        let header = reader.header().cloned();
        let mut rows = Vec::new();
        let mut record = ByteRecord::new();
        while reader.read_record(&mut record)? {
            rows.push(record.clone());
        }
        Ok((header, rows))
    }

    #[test]
    fn test_reads_header_and_rows() {
        let (header, rows) = read_all(b"invoiceId,accountId,city\ni-1,a-1,NYC\ni-2,a-2,LA\n").unwrap();
        assert_eq!(header.unwrap(), ByteRecord::from(vec!["invoiceId", "accountId", "city"]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], ByteRecord::from(vec!["i-2", "a-2", "LA"]));
    }

    #[test]
    fn test_quoted_fields_are_unescaped() {
        let (_, rows) = read_all(b"a,b\n\"x, y\",\"say \"\"hi\"\"\"\n").unwrap();
        assert_eq!(&rows[0][0], b"x, y");
        assert_eq!(&rows[0][1], b"say \"hi\"");
    }

    #[test]
    fn test_empty_object_has_no_header() {
        let (header, rows) = read_all(b"").unwrap();
        assert!(header.is_none());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_header_only_without_newline() {
        let (header, rows) = read_all(b"invoiceId,city").unwrap();
        assert_eq!(header.unwrap().len(), 2);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_ragged_row_is_source_error() {
        let err = read_all(b"a,b\n1,2\n3\n").unwrap_err();
        match err {
            Error::SourceRead { key, .. } => assert_eq!(key, "in/data.csv"),
            other => panic!("expected source read error, got {:?}", other),
        }
    }

    #[test]
    fn test_writer_quotes_only_when_needed() {
        let mut writer = CsvFormat::default().writer_builder().from_writer(Vec::new());
        writer
            .write_record(&ByteRecord::from(vec!["plain", "a,b", "q\"t"]))
            .unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.get_ref().as_slice(), b"plain,\"a,b\",\"q\"\"t\"\n");
    }
}
