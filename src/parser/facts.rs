use std::sync::LazyLock;

use scraper::{Html, Selector};

static TABLE_ROWS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table tr").unwrap());
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static SUB_LABEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td.sub-label").unwrap());
static SPANNING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td[colspan]").unwrap());

/// The nutrition table pivoted into one wide row. Produced as a complete
/// unit or not at all; there is no partially filled variant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FactRow {
    pub energy: String,
    pub fats: String,
    pub carbs: String,
    pub fibers: String,
    pub protein: String,
    pub salt: String,
}

/// Reshape the page's tall nutrition table into a `FactRow`.
///
/// The source table interleaves section headers, grouping rows, and
/// sub-item rows ("waarvan verzadigd") with the six genuine fact rows.
/// A row qualifies only if it has no `th` cell, no `td.sub-label` cell,
/// and no `td[colspan]` cell. The six survivors are pivoted positionally
/// into energy, fats, carbs, fibers, protein, salt. Any other qualifying
/// row count, or a qualifying row without a value, degrades to None.
pub fn extract_facts(doc: &Html) -> Option<FactRow> {
    let mut values = Vec::new();

    for row in doc.select(&TABLE_ROWS) {
        if row.select(&HEADER_CELL).next().is_some()
            || row.select(&SUB_LABEL).next().is_some()
            || row.select(&SPANNING).next().is_some()
        {
            continue;
        }

        // Stripped text leaves in document order: label first, value(s) after.
        // The label only identifies the row and is dropped by the pivot.
        let strings: Vec<&str> = row
            .text()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if strings.len() < 2 {
            return None;
        }
        values.push(strings[1..].join(" "));
    }

    let [energy, fats, carbs, fibers, protein, salt] = <[String; 6]>::try_from(values).ok()?;
    Some(FactRow {
        energy,
        fats,
        carbs,
        fibers,
        protein,
        salt,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(fixture: &str) -> Html {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        Html::parse_document(&html)
    }

    #[test]
    fn kipfilet_facts_in_document_order() {
        let doc = parse("kipfilet");
        let f = extract_facts(&doc).unwrap();
        assert_eq!(f.energy, "485 kJ");
        assert_eq!(f.fats, "1,2 g");
        assert_eq!(f.carbs, "0 g");
        assert_eq!(f.fibers, "0 g");
        assert_eq!(f.protein, "23 g");
        assert_eq!(f.salt, "0,14 g");
    }

    #[test]
    fn header_sublabel_and_spanning_rows_are_skipped() {
        let doc = Html::parse_document(
            r#"<table>
                 <tr><th>Voedingswaarde</th><th>Per 100g</th></tr>
                 <tr><td colspan="2">Per 100 gram</td></tr>
                 <tr><td>Energie</td><td>485 kJ</td></tr>
                 <tr><td>Vetten</td><td>1,2 g</td></tr>
                 <tr><td class="sub-label">Waarvan verzadigd</td><td>0,4 g</td></tr>
                 <tr><td>Koolhydraten</td><td>0 g</td></tr>
                 <tr><td>Vezels</td><td>0 g</td></tr>
                 <tr><td>Eiwitten</td><td>23 g</td></tr>
                 <tr><td>Zout</td><td>0,14 g</td></tr>
               </table>"#,
        );
        let f = extract_facts(&doc).unwrap();
        assert_eq!(f.energy, "485 kJ");
        assert_eq!(f.salt, "0,14 g");
    }

    #[test]
    fn missing_table_yields_none() {
        assert_eq!(extract_facts(&parse("no_facts")), None);
        assert_eq!(extract_facts(&parse("empty")), None);
    }

    #[test]
    fn five_rows_is_not_a_fact_row() {
        let doc = Html::parse_document(
            r#"<table>
                 <tr><td>Energie</td><td>485 kJ</td></tr>
                 <tr><td>Vetten</td><td>1,2 g</td></tr>
                 <tr><td>Koolhydraten</td><td>0 g</td></tr>
                 <tr><td>Vezels</td><td>0 g</td></tr>
                 <tr><td>Eiwitten</td><td>23 g</td></tr>
               </table>"#,
        );
        assert_eq!(extract_facts(&doc), None);
    }

    #[test]
    fn seven_rows_is_not_a_fact_row() {
        let doc = Html::parse_document(
            r#"<table>
                 <tr><td>Energie</td><td>485 kJ</td></tr>
                 <tr><td>Vetten</td><td>1,2 g</td></tr>
                 <tr><td>Koolhydraten</td><td>0 g</td></tr>
                 <tr><td>Vezels</td><td>0 g</td></tr>
                 <tr><td>Eiwitten</td><td>23 g</td></tr>
                 <tr><td>Zout</td><td>0,14 g</td></tr>
                 <tr><td>Water</td><td>75 g</td></tr>
               </table>"#,
        );
        assert_eq!(extract_facts(&doc), None);
    }

    #[test]
    fn qualifying_row_without_value_is_malformed() {
        let doc = Html::parse_document(
            r#"<table>
                 <tr><td>Energie</td></tr>
                 <tr><td>Vetten</td><td>1,2 g</td></tr>
                 <tr><td>Koolhydraten</td><td>0 g</td></tr>
                 <tr><td>Vezels</td><td>0 g</td></tr>
                 <tr><td>Eiwitten</td><td>23 g</td></tr>
                 <tr><td>Zout</td><td>0,14 g</td></tr>
               </table>"#,
        );
        assert_eq!(extract_facts(&doc), None);
    }

    #[test]
    fn extra_value_cells_join_into_one_value() {
        let doc = Html::parse_document(
            r#"<table>
                 <tr><td>Energie</td><td>485 kJ</td><td>116 kcal</td></tr>
                 <tr><td>Vetten</td><td>1,2 g</td></tr>
                 <tr><td>Koolhydraten</td><td>0 g</td></tr>
                 <tr><td>Vezels</td><td>0 g</td></tr>
                 <tr><td>Eiwitten</td><td>23 g</td></tr>
                 <tr><td>Zout</td><td>0,14 g</td></tr>
               </table>"#,
        );
        let f = extract_facts(&doc).unwrap();
        assert_eq!(f.energy, "485 kJ 116 kcal");
    }

    #[test]
    fn idempotent_on_same_document() {
        let doc = parse("kipfilet");
        assert_eq!(extract_facts(&doc), extract_facts(&doc));
    }
}
