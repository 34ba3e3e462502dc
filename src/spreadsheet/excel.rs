//! Pieces shared by the two Excel containers.

use crate::error::Result;
use crate::for_each_xml_event;
use crate::helpers::xml::AttributeLookup;
use crate::helpers::zip::ZipLookup;
use crate::spreadsheet::cell::CellType;
use quick_xml::events::Event;
use std::collections::HashMap;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// The cell type of every cell style, given each style's number format id.
pub(crate) fn load_number_formats(format_ids: &[u16], custom_formats: &HashMap<u16, CellType>) -> Vec<CellType> {
    format_ids
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::from_builtin_format(*id))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Worksheet targets of a relationships part, by relationship id.
pub(crate) fn load_relationships(zip: &mut impl ZipLookup, path: &str) -> Result<HashMap<String, String>> {
    let mut relationships = HashMap::new();
    let Some(mut reader) = zip.xml_entry(path)? else {
        return Ok(relationships);
    };
    for_each_xml_event!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.attribute("Id")?;
            let kind = event.attribute("Type")?;
            let target = event.attribute("Target")?;
            if kind.map(|kind| kind.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id, to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves a relationship target against the `xl/` folder.
pub(crate) fn to_zip_path(target: &str) -> String {
    let target = target.replace('\\', "/");
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_owned()
    } else if target.starts_with("xl/") {
        target
    } else {
        format!("xl/{}", target.trim_start_matches("./"))
    }
}
