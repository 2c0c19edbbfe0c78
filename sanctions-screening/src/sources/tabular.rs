//! Delimited-text sources: OFAC SDN/Consolidated, BIS, EU, UK, World Bank

use super::{present, pseudo_id, FragmentSink, Row, SourceFile};
use crate::error::Result;
use crate::types::EntityFragment;

// Headerless OFAC SDN layouts, per the SLS file documentation
const SDN_COLUMNS: &[&str] = &[
    "ent_num", "SDN_Name", "SDN_Type", "Program", "Title", "Call_Sign", "Vess_Type", "Tonnage",
    "GRT", "Vess_Flag", "Vess_Owner", "Remarks",
];
const SDN_ALT_COLUMNS: &[&str] = &["ent_num", "alt_num", "alt_type", "alt_name", "remarks"];
const SDN_ADD_COLUMNS: &[&str] = &[
    "ent_num", "add_num", "Address", "CityStateProvincePostalCode", "Country", "remarks",
];

const OFAC_ID_FIELDS: &[&str] = &[
    "Entity Number", "Entity_Number", "entity_number", "EntNum", "ent_num", "ID", "Id",
];
const OFAC_NAME_FIELDS: &[&str] = &[
    "Name", "name", "Entity Name", "entity_name", "SDN_Name", "alt_name",
];
const OFAC_PROGRAM_FIELDS: &[&str] = &["Program", "Programs", "program", "Sanctions Program"];
const OFAC_ADDRESS_FIELDS: &[&str] = &[
    "Address", "Street", "City", "State/Province", "Postal Code", "Country",
    "CityStateProvincePostalCode",
];

const BIS_ADDRESS_FIELDS: &[&str] =
    &["Address", "City", "State/Province", "Postal Code", "Country"];
const BIS_LIST_CODES: &[(&str, &str)] = &[
    ("EL", "BIS-EL"),
    ("DPL", "BIS-DPL"),
    ("UVL", "BIS-UVL"),
    ("MEU", "BIS-MEU"),
];

const EU_ADDRESS_FIELDS: &[&str] = &["Addr_street", "Addr_city", "Addr_country"];

const UK_GIVEN_NAME_FIELDS: &[&str] = &["Name 1", "Name 2", "Name 3", "Name 4", "Name 5"];
const UK_SURNAME_FIELD: &str = "Name 6";
const UK_ADDRESS_FIELDS: &[&str] = &["Address Line 1", "Address Line 2", "Address Country"];
const UK_PREAMBLE: &str = "Report Date";

const WB_PROGRAM: &str = "World Bank Debarment";

/// How to split one delimited file into rows
#[derive(Debug, Clone, Copy)]
pub struct TabularLayout {
    pub delimiter: u8,
    /// Fixed column names for files without a header row
    pub columns: Option<&'static [&'static str]>,
    /// First-line prefix identifying a preamble to drop
    pub preamble: Option<&'static str>,
}

impl Default for TabularLayout {
    fn default() -> Self {
        Self {
            delimiter: b',',
            columns: None,
            preamble: None,
        }
    }
}

pub fn layout(file: SourceFile) -> TabularLayout {
    match file {
        SourceFile::OfacSdnPrimary => TabularLayout {
            columns: Some(SDN_COLUMNS),
            ..Default::default()
        },
        SourceFile::OfacSdnAlias => TabularLayout {
            columns: Some(SDN_ALT_COLUMNS),
            ..Default::default()
        },
        SourceFile::OfacSdnAddress => TabularLayout {
            columns: Some(SDN_ADD_COLUMNS),
            ..Default::default()
        },
        SourceFile::EuConsolidated => TabularLayout {
            delimiter: b';',
            ..Default::default()
        },
        SourceFile::UkSanctions => TabularLayout {
            preamble: Some(UK_PREAMBLE),
            ..Default::default()
        },
        _ => TabularLayout::default(),
    }
}

/// Decode delimited bytes into rows. Invalid UTF-8 is replaced, a BOM is dropped.
pub fn decode_rows(bytes: &[u8], layout: &TabularLayout) -> Result<Vec<Row>> {
    let decoded = String::from_utf8_lossy(bytes);
    let mut text: &str = decoded.strip_prefix('\u{feff}').unwrap_or(&decoded);

    if let Some(preamble) = layout.preamble {
        if text.starts_with(preamble) {
            text = text.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(layout.delimiter)
        .has_headers(layout.columns.is_none())
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = match layout.columns {
        Some(columns) => columns.iter().map(|c| c.to_string()).collect(),
        None => reader.headers()?.iter().map(|h| h.trim().to_string()).collect(),
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| (header.as_str(), value))
                .collect(),
        );
    }

    Ok(rows)
}

pub(crate) fn normalize(file: SourceFile, rows: &[Row]) -> Vec<EntityFragment> {
    let mut sink = FragmentSink::new();
    let list = file.source_list();

    match file {
        SourceFile::OfacConsPrimary | SourceFile::OfacSdnPrimary => {
            ofac_primary(list, rows, &mut sink)
        }
        SourceFile::OfacConsAlias | SourceFile::OfacSdnAlias => ofac_aliases(list, rows, &mut sink),
        SourceFile::OfacConsAddress | SourceFile::OfacSdnAddress => {
            ofac_addresses(list, rows, &mut sink)
        }
        SourceFile::BisEntityList
        | SourceFile::BisDeniedPersons
        | SourceFile::BisUnverified
        | SourceFile::BisMilitaryEndUser => bis(list, rows, &mut sink),
        SourceFile::EuConsolidated => eu(list, rows, &mut sink),
        SourceFile::UkSanctions => uk(list, rows, &mut sink),
        SourceFile::WbDebarred => world_bank(list, rows, &mut sink),
        _ => {}
    }

    sink.into_fragments()
}

fn ofac_primary(list: &str, rows: &[Row], sink: &mut FragmentSink) {
    for row in rows {
        let (Some(id), Some(name)) = (row.first_of(OFAC_ID_FIELDS), row.first_of(OFAC_NAME_FIELDS))
        else {
            continue;
        };
        sink.primary(list, id, name);
        if let Some(program) = row.first_of(OFAC_PROGRAM_FIELDS) {
            sink.program(list, id, program);
        }
    }
}

fn ofac_aliases(list: &str, rows: &[Row], sink: &mut FragmentSink) {
    for row in rows {
        let id = row.first_of(OFAC_ID_FIELDS);
        let name = row.first_of(OFAC_NAME_FIELDS);
        if let (Some(id), Some(name)) = (id, name) {
            sink.alias(list, id, name);
        }
    }
}

fn ofac_addresses(list: &str, rows: &[Row], sink: &mut FragmentSink) {
    for row in rows {
        let Some(id) = row.first_of(OFAC_ID_FIELDS) else {
            continue;
        };
        let address = row
            .joined(OFAC_ADDRESS_FIELDS, ", ")
            .or_else(|| row.get("address").map(str::to_string));
        if let Some(address) = address {
            sink.address(list, id, &address);
        }
    }
}

fn bis_list(row: &Row, default_list: &str) -> String {
    match row.get("Source List") {
        Some(code) => BIS_LIST_CODES
            .iter()
            .find(|(short, _)| *short == code)
            .map(|(_, list)| list.to_string())
            .unwrap_or_else(|| format!("BIS-{}", code)),
        // no Source List: keep the file's own list instead of a generic "BIS" bucket
        None => default_list.to_string(),
    }
}

fn bis(default_list: &str, rows: &[Row], sink: &mut FragmentSink) {
    for row in rows {
        let Some(name) = row.get("Name") else {
            continue;
        };
        let list = bis_list(row, default_list);
        let id = row
            .get("Entity Number")
            .map(str::to_string)
            .unwrap_or_else(|| pseudo_id(&list, name));

        sink.primary(&list, &id, name);
        if let Some(requirement) = row.get("License Requirement") {
            sink.program(&list, &id, requirement);
        }
        if let Some(policy) = row.get("License Policy") {
            sink.program(&list, &id, &format!("Policy: {}", policy));
        }
        if let Some(address) = row.joined(BIS_ADDRESS_FIELDS, ", ") {
            sink.address(&list, &id, &address);
        }
    }
}

fn eu(list: &str, rows: &[Row], sink: &mut FragmentSink) {
    for row in rows {
        // Entity_logical_id appears twice in the export header; the name alias id is unique
        let Some(id) = row.get("Naal_logical_id") else {
            continue;
        };
        let name = row
            .get("Naal_wholename")
            .map(str::to_string)
            .or_else(|| row.joined(&["Naal_firstname", "Naal_lastname"], " "));
        let Some(name) = name else {
            continue;
        };

        sink.primary(list, id, &name);
        if let Some(programme) = row.get("Programme") {
            sink.program(list, id, &format!("EU: {}", programme));
        }
        if let Some(address) = row.joined(EU_ADDRESS_FIELDS, ", ") {
            sink.address(list, id, &address);
        }
    }
}

fn uk(list: &str, rows: &[Row], sink: &mut FragmentSink) {
    for row in rows {
        let Some(id) = row.get("Unique ID") else {
            continue;
        };
        let parts = UK_GIVEN_NAME_FIELDS
            .iter()
            .chain(std::iter::once(&UK_SURNAME_FIELD))
            .map(|field| row.get(field));
        let Some(name) = super::join_present(parts, " ") else {
            continue;
        };

        sink.primary(list, id, &name);
        if let Some(regime) = row.get("Regime Name") {
            sink.program(list, id, &format!("UK: {}", regime));
        }
        if let Some(imposed) = row.get("Sanctions Imposed") {
            sink.program(list, id, imposed);
        }
        if let Some(address) = row.joined(UK_ADDRESS_FIELDS, ", ") {
            sink.address(list, id, &address);
        }
    }
}

fn world_bank(list: &str, rows: &[Row], sink: &mut FragmentSink) {
    for row in rows {
        let Some(name) = row.get("name") else {
            continue;
        };
        let id = row
            .get("id")
            .map(str::to_string)
            .unwrap_or_else(|| pseudo_id(list, name));

        sink.primary(list, &id, name);
        if let Some(aliases) = row.get("aliases") {
            for alias in aliases.split(';').filter_map(present) {
                sink.alias(list, &id, alias);
            }
        }
        if let Some(countries) = row.get("countries") {
            sink.address(list, &id, countries);
        }
        sink.program(list, &id, WB_PROGRAM);
    }
}
