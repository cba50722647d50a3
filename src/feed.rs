use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::item::Item;

/// Writes one spider's items as JSON lines.
pub struct FeedExporter {
    path: PathBuf,
    writer: BufWriter<File>,
    exported: u64,
}

impl FeedExporter {
    /// `<spider>-<YYYYMMDD>.json`
    pub fn file_name(spider_name: &str, run_date: NaiveDate) -> String {
        format!("{}-{}.json", spider_name, run_date.format("%Y%m%d"))
    }

    /// Opens the spider's feed for `run_date` in `dir`, appending when a feed
    /// of the same day already exists.
    pub fn open(dir: &Path, spider_name: &str, run_date: NaiveDate) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name(spider_name, run_date));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            exported: 0,
        })
    }

    pub fn export(&mut self, item: &Item) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, item)?;
        self.writer.write_all(b"\n")?;
        self.exported += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exported(&self) -> u64 {
        self.exported
    }
}
