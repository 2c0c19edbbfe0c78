//! Spreadsheet sources: Australia DFAT consolidated list

use super::{pseudo_id, FragmentSink, Row, SourceFile};
use crate::error::{Result, ScreeningError};
use crate::types::EntityFragment;
use calamine::{Data, Reader, Xlsx};
use std::io::Cursor;

const AU_ID_FIELDS: &[&str] = &["Reference", "id"];
const AU_NAME_FIELDS: &[&str] = &["Name of Individual or Entity", "name"];

/// Decode the first worksheet of an XLSX workbook into header -> value rows.
pub fn decode_workbook(bytes: &[u8]) -> Result<Vec<Row>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| ScreeningError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ScreeningError::Spreadsheet("workbook has no worksheets".to_string()))?
        .map_err(|e| ScreeningError::Spreadsheet(e.to_string()))?;

    let mut cells = range.rows();
    let Some(header) = cells.next() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = header.iter().map(cell_text).collect();

    Ok(cells
        .map(|cells| {
            header
                .iter()
                .zip(cells.iter().map(cell_text))
                .filter(|(field, _)| !field.is_empty())
                .map(|(field, value)| (field.as_str(), value))
                .collect()
        })
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn normalize(file: SourceFile, rows: &[Row]) -> Vec<EntityFragment> {
    let mut sink = FragmentSink::new();
    let list = file.source_list();

    for row in rows {
        let Some(name) = row.first_of(AU_NAME_FIELDS) else {
            continue;
        };
        let id = row
            .first_of(AU_ID_FIELDS)
            .map(str::to_string)
            .unwrap_or_else(|| pseudo_id(list, name));

        sink.primary(list, &id, name);
        if let Some(committees) = row.get("Committees") {
            sink.program(list, &id, &format!("AU: {}", committees));
        }
        if let Some(citizenship) = row.get("Citizenship") {
            sink.address(list, &id, &format!("Citizenship: {}", citizenship));
        }
        if let Some(address) = row.get("Address") {
            sink.address(list, &id, address);
        }
    }

    sink.into_fragments()
}
