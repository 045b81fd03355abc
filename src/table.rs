use std::io::Write;
use std::path::Path;

use crate::error::Error;

/// One output row: the file's basename followed by the concatenated feature
/// vectors of every extractor in registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub filename: String,
    pub features: Vec<f64>,
}

/// Accumulated rows plus the header they must align with. Rows of any other
/// width are rejected at insertion, so a table can never hold a row whose
/// column count differs from the header's.
#[derive(Debug)]
pub struct ResultTable {
    header: Vec<String>,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    #[inline]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    #[inline]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn push_row(&mut self, row: ResultRow) -> Result<(), Error> {
        let got = 1 + row.features.len();
        if got != self.header.len() {
            return Err(Error::RowWidth {
                filename: row.filename,
                expected: self.header.len(),
                got,
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Serialize as CSV: comma-joined header line first, then one line per
    /// row in insertion order. Float formatting uses the shortest
    /// round-trip representation, which is deterministic across runs.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.header)?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(self.header.len());
            record.push(row.filename.clone());
            record.extend(row.features.iter().map(|v| format!("{v}")));
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write the table to a path, wrapping the error with the path context.
    pub fn write_csv_to_path(&self, path: &Path) -> Result<(), Error> {
        let file = std::fs::File::create(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.write_csv(file).map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
