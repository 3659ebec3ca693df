//! Terminal output formatter

use std::io;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use vaultkeeper_core::ownership::{slot_name, ClassKind};
use vaultkeeper_core::{
    Analysis, CleanupAction, CleanupPlan, ExecutionOutcome, HealthGrade, HintPriority, RiskTier,
};

const RULE: &str =
    "================================================================================";
const LEADING_RANGES: usize = 10;

pub fn stdout() -> StandardStream {
    StandardStream::stdout(ColorChoice::Auto)
}

fn tier_color(tier: RiskTier) -> ColorSpec {
    let mut spec = ColorSpec::new();
    match tier {
        RiskTier::Safe => spec.set_fg(Some(Color::Green)),
        RiskTier::Conservative => spec.set_fg(Some(Color::Yellow)),
        RiskTier::Dangerous => spec.set_fg(Some(Color::Red)),
        RiskTier::Blocked => spec.set_fg(Some(Color::Red)).set_bold(true),
    };
    spec
}

fn bold() -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_bold(true);
    spec
}

fn heading<W: WriteColor>(w: &mut W, title: &str) -> io::Result<()> {
    writeln!(w)?;
    w.set_color(&bold())?;
    writeln!(w, "{}", title)?;
    w.reset()?;
    writeln!(w, "{}", &RULE[..title.len().min(RULE.len())])
}

pub fn write_analysis<W: WriteColor>(w: &mut W, analysis: &Analysis) -> io::Result<()> {
    let c = &analysis.classification;

    heading(w, "Database")?;
    writeln!(w, "Character table: {}", analysis.schema.character_table)?;
    writeln!(
        w,
        "Pages:           {} x {} bytes ({} free)",
        analysis.stats.page_count, analysis.stats.page_size, analysis.stats.freelist_count
    )?;

    heading(w, "Ownership")?;
    writeln!(
        w,
        "{:<18} {:>10} {:>12} {:>10} {:>10} {:>10}",
        "Class", "Refs", "Item rows", "Buildings", "Pieces", "Placeables"
    )?;
    for kind in ClassKind::ALL {
        writeln!(
            w,
            "{:<18} {:>10} {:>12} {:>10} {:>10} {:>10}",
            kind.label(),
            c.references.get(kind),
            c.item_rows.get(kind),
            c.building_rows.get(kind),
            c.building_pieces.get(kind),
            c.placeables.get(kind)
        )?;
    }
    if c.unowned_item_rows > 0 {
        writeln!(w, "Unowned (owner 0) item rows: {}", c.unowned_item_rows)?;
    }

    let mut grade = ColorSpec::new();
    grade.set_bold(true).set_fg(Some(match analysis.health {
        HealthGrade::Excellent | HealthGrade::VeryGood => Color::Green,
        HealthGrade::Good => Color::Yellow,
        HealthGrade::NeedsAttention => Color::Red,
    }));
    write!(w, "\nHealth: ")?;
    w.set_color(&grade)?;
    write!(w, "{}", analysis.health)?;
    w.reset()?;
    writeln!(w, " ({})", analysis.health.summary())?;

    let patterns = &analysis.patterns;
    if patterns.orphaned_count > 0 {
        heading(w, "Orphaned ids")?;
        if let (Some(min), Some(max)) = (patterns.min_id, patterns.max_id) {
            writeln!(w, "Range:  {} to {}", min, max)?;
        }
        writeln!(
            w,
            "Blocks: {} ranges over {} ids",
            patterns.range_count, patterns.orphaned_count
        )?;
        let shown: Vec<String> = patterns
            .leading_ranges(LEADING_RANGES)
            .iter()
            .map(|r| r.to_string())
            .collect();
        writeln!(w, "First:  {}", shown.join(", "))?;
        if patterns.appears_sequential {
            writeln!(
                w,
                "Pattern: long sequential blocks, possibly a mass deletion (heuristic)"
            )?;
        }

        write_forensics(w, analysis)?;
    }

    heading(w, "Damage check")?;
    writeln!(w, "Active characters scanned: {}", analysis.damage.scanned)?;
    if analysis.damage.affected.is_empty() {
        writeln!(w, "No signs of earlier cleanup damage")?;
    } else {
        w.set_color(&tier_color(RiskTier::Blocked))?;
        writeln!(
            w,
            "{} characters may have lost external storage items or all of their items",
            analysis.damage.affected.len()
        )?;
        w.reset()?;
        for player in &analysis.damage.affected {
            let slots: Vec<String> = player.slot_types.iter().map(|&s| slot_name(s)).collect();
            writeln!(
                w,
                "  {:<24} lvl {:>3}  {:>5} items  {:<26} {}",
                player.display_name,
                player.level.map(|l| l.to_string()).unwrap_or_else(|| "?".into()),
                player.remaining_item_total,
                player.status.map(|s| s.to_string()).unwrap_or_default(),
                slots.join(", ")
            )?;
        }
        writeln!(
            w,
            "Note: players who never owned a chest are flagged too. Review the list manually."
        )?;
    }

    heading(w, "Recommendations")?;
    for hint in &analysis.hints {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(match hint.priority {
            HintPriority::High => Color::Red,
            HintPriority::Medium => Color::Yellow,
            HintPriority::Low => Color::Cyan,
        }));
        w.set_color(&spec)?;
        write!(w, "[{}]", hint.priority)?;
        w.reset()?;
        writeln!(w, " {}", hint.title)?;
        writeln!(w, "       {}", hint.detail)?;
    }

    write_plan(w, &analysis.plan)
}

fn write_forensics<W: WriteColor>(w: &mut W, analysis: &Analysis) -> io::Result<()> {
    let forensics = &analysis.forensics;

    if !forensics.orphaned_owners.is_empty() {
        writeln!(w, "\nTop orphaned owners:")?;
        for owner in forensics.orphaned_owners.iter().take(10) {
            writeln!(
                w,
                "  {:>12}  {:>6} items  {:>3} slot types  {:>4} templates",
                owner.owner_id, owner.item_count, owner.slot_type_count, owner.template_count
            )?;
        }
    }

    if !forensics.slot_distribution.is_empty() {
        writeln!(w, "\nOrphaned items by slot:")?;
        for slot in &forensics.slot_distribution {
            writeln!(
                w,
                "  {:<24} {:>6} items  {:>5} owners  {}",
                slot.name,
                slot.item_count,
                slot.owner_count,
                slot.category.map(|c| c.to_string()).unwrap_or_else(|| "Unknown".into())
            )?;
        }
    }

    if !forensics.common_templates.is_empty() {
        writeln!(w, "\nMost common orphaned templates:")?;
        for template in &forensics.common_templates {
            writeln!(
                w,
                "  {:>10}  {:>6} items  {:>5} owners",
                template.template_id, template.item_count, template.owner_count
            )?;
        }
    }

    if !forensics.traces.is_empty() {
        writeln!(w, "\nReferences in other tables (sampled ids):")?;
        for trace in &forensics.traces {
            writeln!(w, "  {}.{}: {}", trace.table, trace.column, trace.references)?;
        }
    }
    Ok(())
}

pub fn write_plan<W: WriteColor>(w: &mut W, plan: &CleanupPlan) -> io::Result<()> {
    heading(w, "Cleanup plan")?;
    for (i, action) in plan.actions.iter().enumerate() {
        w.set_color(&tier_color(action.risk_tier))?;
        write!(w, "{}. [{}]", i + 1, action.risk_tier)?;
        w.reset()?;
        writeln!(w, " {}", action.title)?;
        writeln!(w, "   Rows: {}  {}", action.estimated_row_count, action.impact)?;
    }
    if plan.is_blocked() {
        w.set_color(&tier_color(RiskTier::Blocked))?;
        writeln!(w, "\nCleanup is blocked until the damage is addressed.")?;
        w.reset()?;
    }
    Ok(())
}

pub fn write_action<W: WriteColor>(
    w: &mut W,
    number: usize,
    action: &CleanupAction,
) -> io::Result<()> {
    w.set_color(&tier_color(action.risk_tier))?;
    writeln!(w, "Action {} [{}]", number, action.risk_tier)?;
    w.reset()?;
    writeln!(w, "{}", action.title)?;
    writeln!(w)?;
    writeln!(w, "{}", action.description)?;
    writeln!(w)?;
    writeln!(w, "Filter:    {}", action.predicate)?;
    writeln!(w, "Estimate:  {} rows", action.estimated_row_count)?;
    writeln!(w, "Impact:    {}", action.impact)?;
    if let Some(guard) = &action.guard {
        w.set_color(&tier_color(RiskTier::Dangerous))?;
        writeln!(w, "Warning:   {}", guard)?;
        w.reset()?;
    }
    if let Some(statement) = &action.statement {
        writeln!(w)?;
        writeln!(w, "{};", statement)?;
    }
    Ok(())
}

pub fn write_outcome<W: WriteColor>(w: &mut W, outcome: &ExecutionOutcome) -> io::Result<()> {
    writeln!(w, "Executed: {}", outcome.action)?;
    writeln!(w, "Rows deleted: {} (estimated {})", outcome.affected, outcome.estimated)?;
    if outcome.anomaly {
        w.set_color(&tier_color(RiskTier::Conservative))?;
        writeln!(
            w,
            "Anomaly: the real count diverges from the estimate by {:.0}%. Re-run the analysis.",
            outcome.divergence * 100.0
        )?;
        w.reset()?;
    }
    if outcome.vacuumed {
        writeln!(w, "Database vacuumed")?;
    }
    if let Some(warning) = &outcome.vacuum_warning {
        writeln!(w, "VACUUM failed (cleanup kept): {}", warning)?;
    }
    Ok(())
}
