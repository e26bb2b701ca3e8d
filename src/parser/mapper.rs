use super::table::RawRow;
use crate::error::{HarvestError, Result};
use crate::records::{ComponentRecord, FoodRecord};

const FOOD_FIELDS: [&str; 4] = ["code", "name", "scientific name", "group"];

const COMPONENT_FIELDS: [&str; 9] = [
    "component",
    "unit",
    "value",
    "standard deviation",
    "minimum",
    "maximum",
    "sample count",
    "references",
    "data type",
];

/// Master-list row → food. Cells: code, name, scientific name, group.
pub fn row_to_food(row: &RawRow) -> Result<FoodRecord> {
    let [code, name, scientific_name, group] = take_cells(row, FOOD_FIELDS)?;
    Ok(FoodRecord {
        code,
        name,
        scientific_name,
        group,
    })
}

/// Detail-page row → component of `food_code`. All nine cells must be present.
pub fn row_to_component(food_code: &str, row: &RawRow) -> Result<ComponentRecord> {
    let [component_name, unit, value, std_dev, min, max, sample_count, references, data_type] =
        take_cells(row, COMPONENT_FIELDS)?;
    Ok(ComponentRecord {
        food_code: food_code.trim().to_string(),
        component_name,
        unit,
        value,
        std_dev,
        min,
        max,
        sample_count,
        references,
        data_type,
    })
}

fn take_cells<const N: usize>(row: &RawRow, fields: [&'static str; N]) -> Result<[String; N]> {
    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for (pos, field) in fields.into_iter().enumerate() {
        out[pos] = row
            .cells
            .get(pos)
            .and_then(|c| c.as_deref())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| HarvestError::MalformedRow {
                row: row.index,
                missing: field,
            })?;
    }
    Ok(out)
}

// ── Tests ──
