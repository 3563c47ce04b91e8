use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::state::StoredRecord;

pub fn render_records_table(records: &[StoredRecord]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Kind", "Name", "Version / Cluster", "Last Slot", "Notified"]);

    for record in records {
        let (name, detail, slot) = match record {
            StoredRecord::SolanaCluster(r) => {
                ("solana".to_string(), format!("{} on {}", r.version, r.cluster), None)
            }
            StoredRecord::GithubVersion(r) => (r.name.clone(), r.version.clone(), None),
            StoredRecord::Program(r) => (r.name.clone(), r.cluster.clone(), Some(r.last_slot)),
        };
        let notified = if record.notified() {
            Cell::new("YES").fg(Color::Green)
        } else {
            Cell::new("NO").fg(Color::Yellow)
        };
        table.add_row(Row::from(vec![
            Cell::new(record.kind().to_string()),
            Cell::new(name),
            Cell::new(detail),
            Cell::new(
                slot.map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            notified,
        ]));
    }
    table.to_string()
}
