//! Synthetic purchase exports shaped like the production data the job
//! redacts. Used to seed a source bucket before a run.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::Result;
use crate::parser::CsvFormat;

pub const HEADER: [&str; 6] = [
    "invoiceId",
    "accountId",
    "purchaseTime",
    "purchaseAmount",
    "purchaseItemNumber",
    "location",
];
pub const FIRST_INVOICE: u64 = 1000;
pub const FILES: usize = 2;
pub const RECORDS_PER_FILE: usize = 100;

/// Produces purchase records. Invoice ids keep counting across files.
pub struct PurchaseGenerator<R> {
    rng: R,
    next_invoice: u64,
    now_ms: i64,
}

impl<R: Rng> PurchaseGenerator<R> {
    /// `now_ms` anchors `purchaseTime`, which lands up to a second before it.
    pub fn new(rng: R, now_ms: i64) -> Self {
        Self {
            rng,
            next_invoice: FIRST_INVOICE,
            now_ms,
        }
    }

    pub fn next_record(&mut self) -> [String; 6] {
        let invoice = self.next_invoice;
        self.next_invoice += 1;

        [
            format!("i-{}", invoice),
            format!("a-{}", 1000 + self.rng.random_range(0..10)),
            (self.now_ms - self.rng.random_range(0..1000i64)).to_string(),
            (10 + self.rng.random_range(0..1000)).to_string(),
            (1 + self.rng.random_range(0..10)).to_string(),
            self.rng.random_range(0..100).to_string(),
        ]
    }

    /// Writes the header and `records` rows to `out`.
    pub fn write_dataset<W: io::Write>(&mut self, out: W, records: usize) -> Result<()> {
        let mut writer = CsvFormat::default().writer_builder().from_writer(out);
        writer.write_record(HEADER)?;
        for _ in 0..records {
            writer.write_record(self.next_record())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes `dataset_0.csv` .. `dataset_<files - 1>.csv` into `dir`.
    pub fn write_files(&mut self, dir: &Path, files: usize, records: usize) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(files);
        for n in 0..files {
            let path = dir.join(format!("dataset_{}.csv", n));
            self.write_dataset(File::create(&path)?, records)?;
            tracing::info!(path = %path.display(), records, "wrote dataset");
            paths.push(path);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const NOW_MS: i64 = 1_700_000_000_000;

    fn generator(seed: u64) -> PurchaseGenerator<StdRng> {
        PurchaseGenerator::new(StdRng::seed_from_u64(seed), NOW_MS)
    }

    #[test]
    fn test_dataset_shape() {
        let mut out = Vec::new();
        generator(7).write_dataset(&mut out, 100).unwrap();

        let mut reader = csv::Reader::from_reader(out.as_slice());
        assert_eq!(reader.headers().unwrap(), &csv::StringRecord::from(HEADER.to_vec()));

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 100);
        assert_eq!(&rows[0][0], "i-1000");
        assert_eq!(&rows[99][0], "i-1099");
    }

    #[test]
    fn test_value_ranges() {
        let mut generator = generator(11);
        for _ in 0..500 {
            let record = generator.next_record();

            let account: u32 = record[1].strip_prefix("a-").unwrap().parse().unwrap();
            assert!((1000..1010).contains(&account));

            let time: i64 = record[2].parse().unwrap();
            assert!(time > NOW_MS - 1000 && time <= NOW_MS);

            let amount: u32 = record[3].parse().unwrap();
            assert!((10..1010).contains(&amount));

            let items: u32 = record[4].parse().unwrap();
            assert!((1..=10).contains(&items));

            let location: u32 = record[5].parse().unwrap();
            assert!(location < 100);
        }
    }

    #[test]
    fn test_invoice_ids_continue_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = generator(3)
            .write_files(dir.path(), FILES, RECORDS_PER_FILE)
            .unwrap();

        assert_eq!(
            paths,
            vec![dir.path().join("dataset_0.csv"), dir.path().join("dataset_1.csv")]
        );

        let mut reader = csv::Reader::from_path(&paths[1]).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), RECORDS_PER_FILE);
        assert_eq!(&rows[0][0], "i-1100");
    }
}
