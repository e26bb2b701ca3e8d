pub mod mapper;
pub mod table;

use std::sync::LazyLock;

use scraper::Html;

use table::{CellMode, CellSpec, RawRow, RowSpec};

/// Master list: code, name, scientific name, group. All four required.
static FOOD_LIST: LazyLock<RowSpec> = LazyLock::new(|| {
    RowSpec::parse("table tr", &[CellSpec::required(CellMode::Text); 4]).unwrap()
});

/// Detail table. Only component, unit and value are needed to accept a row;
/// the unit and the trailing six cells are read as raw markup, which is how
/// the page serves them.
static COMPONENTS: LazyLock<RowSpec> = LazyLock::new(|| {
    let optional = CellSpec::optional(CellMode::InnerHtml);
    RowSpec::parse(
        "table#tabela1 tr",
        &[
            CellSpec::required(CellMode::Text),
            CellSpec::required(CellMode::InnerHtml),
            CellSpec::required(CellMode::Text),
            optional,
            optional,
            optional,
            optional,
            optional,
            optional,
        ],
    )
    .unwrap()
});

// `Html` is not `Send`, so the page helpers parse and collect in one
// synchronous step instead of holding the document across an await.

pub fn food_rows(html: &str) -> Vec<RawRow> {
    let doc = Html::parse_document(html);
    table::extract_rows(&doc, &FOOD_LIST).collect()
}

pub fn component_rows(html: &str) -> Vec<RawRow> {
    let doc = Html::parse_document(html);
    table::extract_rows(&doc, &COMPONENTS).collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::mapper::{row_to_component, row_to_food};
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn food_list_rows() {
        let rows = food_rows(&fixture("food_list"));
        let foods: Vec<_> = rows.iter().map(|r| row_to_food(r).unwrap()).collect();
        assert_eq!(foods.len(), 3);
        assert_eq!(foods[0].code, "BRC0001C");
        assert_eq!(foods[0].name, "Abacate, polpa, in natura, Brasil");
        assert_eq!(foods[0].scientific_name, "Persea americana Mill.");
        assert_eq!(foods[0].group, "Frutas e derivados");
        assert_eq!(foods[2].code, "BRC0004C");
    }

    #[test]
    fn food_list_short_row_skipped() {
        let rows = food_rows(&fixture("food_list_short_row"));
        assert_eq!(rows.len(), 1);
        assert_eq!(row_to_food(&rows[0]).unwrap().code, "BRC0001C");
    }

    #[test]
    fn food_list_without_table() {
        assert!(food_rows(&fixture("no_table")).is_empty());
    }

    #[test]
    fn detail_rows_keep_markup_asymmetry() {
        let rows = component_rows(&fixture("food_detail"));
        assert_eq!(rows.len(), 4);

        let energy = row_to_component("BRC0001C", &rows[0]).unwrap();
        assert_eq!(energy.component_name, "Energia");
        assert_eq!(energy.unit, "kJ");
        assert_eq!(energy.value, "319");

        // Unit cell is read as markup, component cell as text.
        let vit = row_to_component("BRC0001C", &rows[2]).unwrap();
        assert_eq!(vit.component_name, "Vitamina A (RAE)");
        assert_eq!(vit.unit, "<span>mcg</span>");
        assert_eq!(vit.references, "<a href=\"ref.php?id=12\">12</a>");
    }

    #[test]
    fn detail_rows_only_from_component_table() {
        // The footer table on the fixture also has <td> rows.
        let rows = component_rows(&fixture("food_detail"));
        assert!(rows
            .iter()
            .all(|r| r.cells[0].as_deref() != Some("Fonte")));
    }

    #[test]
    fn detail_row_missing_trailing_cells_fails_mapping() {
        let rows = component_rows(&fixture("food_detail"));
        // Fourth row only has the three required cells.
        assert_eq!(rows[3].cells[3], None);
        assert!(row_to_component("BRC0001C", &rows[3]).is_err());
    }
}
