use crate::error::{ForecastError, Result};
use crate::table::{CellValue, ForecastTable};
use std::io::Write;

pub(crate) fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv_writer_to(Vec::new())
}

fn csv_writer_to<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer)
}

pub(crate) fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ForecastError::Io(std::io::Error::new(e.error().kind(), e.to_string())))?;
    String::from_utf8(bytes).map_err(|e| ForecastError::Parse(e.to_string()))
}

impl ForecastTable {
    /// Writes the table as comma-separated values: one header row, one line
    /// per data row, `\n` terminators. Numbers use the shortest text that
    /// parses back to the same `f64`.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv_writer_to(writer);
        writer.write_record(self.columns())?;
        for row in self.rows() {
            writer.write_record(row.iter().map(CellValue::to_string))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(buffer)
    }

    pub fn to_csv_string(&self) -> Result<String> {
        String::from_utf8(self.to_csv_bytes()?).map_err(|e| ForecastError::Parse(e.to_string()))
    }
}
