//! Vacuum command

use crate::app::OutputFormat;
use anyhow::Result;
use vaultkeeper_core::Database;

pub fn run(db: &Database, format: OutputFormat) -> Result<()> {
    let before = db.get_stats()?;
    db.vacuum()?;
    let after = db.get_stats()?;
    let reclaimed = (before.page_count.saturating_sub(after.page_count)) * after.page_size;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "pages_before": before.page_count,
                "pages_after": after.page_count,
                "reclaimed_bytes": reclaimed,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("Pages before:  {}", before.page_count);
            println!("Pages after:   {}", after.page_count);
            println!("Reclaimed:     {} bytes", reclaimed);
        }
    }
    Ok(())
}
