//! CSV output formatter

use vaultkeeper_core::ownership::ClassKind;
use vaultkeeper_core::{Classification, CleanupPlan};

pub fn format_plan(plan: &CleanupPlan) -> String {
    let mut output = String::from("number,risk_tier,title,estimated_rows,executable\n");

    for (i, action) in plan.actions.iter().enumerate() {
        output.push_str(&format!(
            "{},{},{},{},{}\n",
            i + 1,
            action.risk_tier,
            escape_csv(&action.title),
            action.estimated_row_count,
            action.is_executable() && !plan.is_blocked()
        ));
    }

    output
}

pub fn format_classification(classification: &Classification) -> String {
    let mut output =
        String::from("class,references,item_rows,building_rows,building_pieces,placeables\n");

    for kind in ClassKind::ALL {
        output.push_str(&format!(
            "{},{},{},{},{},{}\n",
            escape_csv(kind.label()),
            classification.references.get(kind),
            classification.item_rows.get(kind),
            classification.building_rows.get(kind),
            classification.building_pieces.get(kind),
            classification.placeables.get(kind)
        ));
    }

    output
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
