use scraper::{ElementRef, Html, Selector};

use crate::error::{HarvestError, Result};

/// How a cell's content is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMode {
    /// Visible text, entity-decoded, tags dropped.
    Text,
    /// Raw inner markup as served.
    InnerHtml,
}

#[derive(Debug, Clone, Copy)]
pub struct CellSpec {
    pub mode: CellMode,
    pub required: bool,
}

impl CellSpec {
    pub const fn required(mode: CellMode) -> Self {
        CellSpec { mode, required: true }
    }

    pub const fn optional(mode: CellMode) -> Self {
        CellSpec { mode, required: false }
    }
}

/// Row selector plus the positional layout of the `<td>` cells in each row.
#[derive(Debug)]
pub struct RowSpec {
    rows: Selector,
    cells: Vec<CellSpec>,
}

impl RowSpec {
    pub fn parse(row_selector: &str, cells: &[CellSpec]) -> Result<Self> {
        let rows = Selector::parse(row_selector).map_err(|e| {
            HarvestError::InvalidArgument(format!("invalid CSS selector '{row_selector}': {e}"))
        })?;
        Ok(RowSpec {
            rows,
            cells: cells.to_vec(),
        })
    }
}

/// A matched table row. `cells[i]` is `None` when an optional cell is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based position among all rows the selector matched.
    pub index: usize,
    pub cells: Vec<Option<String>>,
}

/// Walk every row matching `spec` in document order.
///
/// Rows missing a required cell are dropped without error. Header rows built
/// from `<th>` have no `<td>` children and fall out the same way. The
/// iterator borrows `doc`; calling again starts over.
pub fn extract_rows<'a>(doc: &'a Html, spec: &'a RowSpec) -> impl Iterator<Item = RawRow> + 'a {
    doc.select(&spec.rows)
        .enumerate()
        .filter_map(move |(i, row)| {
            let tds: Vec<ElementRef> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|el| el.value().name() == "td")
                .collect();

            let mut cells = Vec::with_capacity(spec.cells.len());
            for (pos, cell) in spec.cells.iter().enumerate() {
                match tds.get(pos) {
                    Some(el) => cells.push(Some(read_cell(*el, cell.mode))),
                    None if cell.required => return None,
                    None => cells.push(None),
                }
            }
            Some(RawRow { index: i + 1, cells })
        })
}

fn read_cell(el: ElementRef, mode: CellMode) -> String {
    match mode {
        CellMode::Text => el.text().collect::<String>().trim().to_string(),
        CellMode::InnerHtml => el.inner_html().trim().to_string(),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cols() -> RowSpec {
        RowSpec::parse(
            "table tr",
            &[
                CellSpec::required(CellMode::Text),
                CellSpec::optional(CellMode::InnerHtml),
            ],
        )
        .unwrap()
    }

    #[test]
    fn skips_rows_missing_required_cells() {
        let doc = Html::parse_document(
            "<table>
               <tr><th>A</th><th>B</th></tr>
               <tr><td> one </td><td><b>x</b></td></tr>
               <tr></tr>
               <tr><td>two</td></tr>
             </table>",
        );
        let spec = two_cols();
        let rows: Vec<RawRow> = extract_rows(&doc, &spec).collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells, vec![Some("one".into()), Some("<b>x</b>".into())]);
        assert_eq!(rows[1].cells, vec![Some("two".into()), None]);
        assert_eq!(rows[1].index, 4);
    }

    #[test]
    fn text_and_markup_modes_differ() {
        let doc = Html::parse_document("<table><tr><td> <i>mg</i> </td><td> <i>mg</i> </td></tr></table>");
        let spec = RowSpec::parse(
            "tr",
            &[
                CellSpec::required(CellMode::Text),
                CellSpec::required(CellMode::InnerHtml),
            ],
        )
        .unwrap();
        let row = extract_rows(&doc, &spec).next().unwrap();
        assert_eq!(row.cells[0].as_deref(), Some("mg"));
        assert_eq!(row.cells[1].as_deref(), Some("<i>mg</i>"));
    }

    #[test]
    fn sequence_restarts_on_each_call() {
        let doc = Html::parse_document("<table><tr><td>a</td></tr><tr><td>b</td></tr></table>");
        let spec = two_cols();
        assert_eq!(extract_rows(&doc, &spec).count(), 2);
        assert_eq!(extract_rows(&doc, &spec).count(), 2);
    }

    #[test]
    fn no_table_yields_nothing() {
        let doc = Html::parse_document("<p>Manutenção</p>");
        let spec = two_cols();
        assert_eq!(extract_rows(&doc, &spec).next(), None);
    }

    #[test]
    fn bad_selector_is_invalid_argument() {
        let err = RowSpec::parse("td[", &[]).unwrap_err();
        assert!(matches!(err, HarvestError::InvalidArgument(_)));
    }
}
