//! JSON Lines export of stored records

use crate::output::traits::OutputResult;
use crate::storage::Storage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes every stored record as one JSON object per line
///
/// Records are written in append order. Returns the number of lines written.
pub fn export_jsonl(
    storage: &dyn Storage,
    output_path: &Path,
    include_failed: bool,
) -> OutputResult<usize> {
    let file = File::create(output_path)?;
    let mut writer = BufWriter::new(file);
    let written = write_jsonl(storage, &mut writer, include_failed)?;
    writer.flush()?;
    Ok(written)
}

/// Writes stored records as JSON Lines to any writer
pub fn write_jsonl<W: Write>(
    storage: &dyn Storage,
    writer: &mut W,
    include_failed: bool,
) -> OutputResult<usize> {
    let records = storage
        .load_records()
        .map_err(|e| crate::output::OutputError::Storage(e.to_string()))?;

    let mut written = 0;
    for record in records.iter().filter(|r| include_failed || !r.is_failed) {
        // Payloads are stored as JSON; re-encode to guarantee a single line
        let value: serde_json::Value = serde_json::from_str(&record.payload)?;
        serde_json::to_writer(&mut *writer, &value)?;
        writer.write_all(b"\n")?;
        written += 1;
    }

    Ok(written)
}
