//! Plan display - per-item symbols and attribute diffs

use colored::Colorize;
use reconcile::{Attributes, Operation, OperationKind, Plan, RemoteState};
use similar::{ChangeTag, TextDiff};

/// Display a plan in a user-friendly format
///
/// `state` is the remote state the plan was built from; updates show a line
/// diff of their attributes against it.
pub fn display_plan(plan: &Plan, state: &RemoteState, instance: &str) {
    if plan.is_empty() {
        println!();
        println!(
            "  {} No changes needed ({} up to date)",
            "✓".green(),
            plan.unchanged.len()
        );
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        format!("{} · {instance}", plan.kind.name).bold()
    );
    println!("│");

    for op in &plan.operations {
        display_operation(op, state);
    }

    let summary = plan.summary();
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} to create, {} to update, {} to delete), {} unchanged",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.removals.to_string().red(),
        summary.unchanged
    );
    println!("└─────────────────────────────────────────────────────┘");
}

fn display_operation(op: &Operation, state: &RemoteState) {
    let symbol = match op.kind {
        OperationKind::Create => "+".green(),
        OperationKind::Update => "~".yellow(),
        OperationKind::Delete => "-".red(),
    };
    let id = op
        .remote_id
        .as_deref()
        .map(|id| format!("({id})"))
        .unwrap_or_default();
    println!("│ {} {:<30} {}", symbol, op.name, id.dimmed());

    if !op.depends_on.is_empty() {
        println!(
            "│     {}",
            format!("after: {}", op.depends_on.join(", ")).dimmed()
        );
    }
    if let Some(error) = &op.preflight {
        println!("│     {} {}", "✗".red(), error.to_string().red());
    }

    if op.kind == OperationKind::Update
        && let Some(entry) = state.get(&op.name)
    {
        for line in attribute_diff(&entry.attributes, &op.attributes) {
            println!("│     {line}");
        }
    }
}

/// Colored `+`/`-` lines between two attribute maps, pretty-printed as JSON
fn attribute_diff(old: &Attributes, new: &Attributes) -> Vec<String> {
    let (Ok(old), Ok(new)) = (
        serde_json::to_string_pretty(old),
        serde_json::to_string_pretty(new),
    ) else {
        return Vec::new();
    };

    changed_lines(&old, &new)
        .into_iter()
        .map(|(tag, line)| match tag {
            ChangeTag::Delete => format!("- {line}").red().to_string(),
            ChangeTag::Insert => format!("+ {line}").green().to_string(),
            ChangeTag::Equal => line,
        })
        .collect()
}

fn changed_lines(old: &str, new: &str) -> Vec<(ChangeTag, String)> {
    TextDiff::from_lines(old, new)
        .iter_all_changes()
        .filter(|c| c.tag() != ChangeTag::Equal)
        .map(|c| (c.tag(), c.value().trim_end().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_changed_lines_only_reports_differences() {
        let old: Attributes = [("description".to_string(), json!("edge"))].into();
        let new: Attributes = [
            ("description".to_string(), json!("core")),
            ("overridable".to_string(), json!(false)),
        ]
        .into();
        let old = serde_json::to_string_pretty(&old).unwrap();
        let new = serde_json::to_string_pretty(&new).unwrap();

        let lines = changed_lines(&old, &new);
        assert!(lines.contains(&(ChangeTag::Delete, "  \"description\": \"edge\"".to_string())));
        assert!(lines.contains(&(ChangeTag::Insert, "  \"overridable\": false".to_string())));
        assert!(lines.iter().all(|(tag, _)| *tag != ChangeTag::Equal));
    }

    #[test]
    fn test_identical_attributes_have_no_diff() {
        let attrs: Attributes = [("value".to_string(), json!("10.0.0.1"))].into();
        assert!(attribute_diff(&attrs, &attrs).is_empty());
    }
}
