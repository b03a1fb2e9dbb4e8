//! Static pivot-table visualization of the record table.
//!
//! Renders a self-contained HTML page that feeds the record rows, inlined as
//! JSON, to pivottable.js loaded from its CDN, the same artifact shape the
//! `pivottablejs` helper produces. Written into the canonical folder next to
//! the JSON dump.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::domain::record::ProductTable;

/// File name of the pivot view inside the canonical folder.
pub const PIVOT_REPORT_FILE: &str = "pivottablejs.html";

/// Render the pivot page for a record table.
pub fn render_pivot_html(table: &ProductTable) -> Result<String> {
    let column_names = ProductTable::column_names();
    let rows: Vec<serde_json::Value> = table
        .rows()
        .into_iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            for (name, value) in column_names.iter().zip(row) {
                object.insert((*name).to_string(), serde_json::Value::String(value));
            }
            serde_json::Value::Object(object)
        })
        .collect();

    let data = serde_json::to_string(&rows).context("Failed to serialize pivot rows")?;

    Ok(format!(
        r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Product records</title>
    <script src="https://cdnjs.cloudflare.com/ajax/libs/jquery/3.7.1/jquery.min.js"></script>
    <script src="https://cdnjs.cloudflare.com/ajax/libs/jqueryui/1.13.2/jquery-ui.min.js"></script>
    <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/pivottable/2.23.0/pivot.min.css">
    <script src="https://cdnjs.cloudflare.com/ajax/libs/pivottable/2.23.0/pivot.min.js"></script>
    <style>body {{ font-family: Verdana, sans-serif; }}</style>
</head>
<body>
    <div id="output" style="margin: 30px;"></div>
    <script type="text/javascript">
        var data = {data};
        $(function() {{
            $("#output").pivotUI(data, {{}});
        }});
    </script>
</body>
</html>
"##
    ))
}

/// Write the pivot page into the given folder, overwriting on each run.
pub async fn write_pivot_report(dir: &Path, table: &ProductTable) -> Result<PathBuf> {
    let path = dir.join(PIVOT_REPORT_FILE);
    let html = render_pivot_html(table)?;
    fs::write(&path, html)
        .await
        .with_context(|| format!("Failed to write pivot report: {}", path.display()))?;
    info!("Wrote pivot report to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{ProductRecord, QuantityPrice};
    use tempfile::tempdir;

    fn table_with_one_row() -> ProductTable {
        let mut table = ProductTable::default();
        table.push(ProductRecord {
            link: "https://example.com/turmeric".to_string(),
            uuid_primary: "8066-120".to_string(),
            uuid_secondary: "abc-def".to_string(),
            quantity_and_price: QuantityPrice::Parts(vec!["120 caps ".into(), "17.95".into()]),
            usage: "Two capsules daily".to_string(),
            product_category: "Turmeric".to_string(),
        });
        table
    }

    #[test]
    fn rendered_html_embeds_rows_and_columns() {
        let html = render_pivot_html(&table_with_one_row()).unwrap();
        assert!(html.contains("pivotUI"));
        assert!(html.contains("8066-120"));
        assert!(html.contains("\"product_category\":\"Turmeric\""));
        for key in ProductTable::column_names() {
            assert!(html.contains(key), "missing column {key}");
        }
    }

    #[tokio::test]
    async fn report_lands_in_target_folder() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = write_pivot_report(dir.path(), &table_with_one_row()).await?;
        assert_eq!(path.file_name().unwrap(), PIVOT_REPORT_FILE);
        assert!(path.exists());
        Ok(())
    }
}
