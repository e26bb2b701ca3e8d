use serde::{Deserialize, Serialize};

/// One entry of the master food list. `code` is unique across the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodRecord {
    pub code: String,
    pub name: String,
    pub scientific_name: String,
    pub group: String,
}

/// One nutrient line of a food's detail page.
///
/// Values are kept as the source prints them (decimal commas, footnote
/// markers, "tr", "NA"); callers parse them if they need numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub food_code: String,
    pub component_name: String,
    pub unit: String,
    pub value: String,
    pub std_dev: String,
    pub min: String,
    pub max: String,
    pub sample_count: String,
    pub references: String,
    pub data_type: String,
}

impl ComponentRecord {
    /// Natural key: (food_code, component_name, unit).
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.food_code, &self.component_name, &self.unit)
    }
}
