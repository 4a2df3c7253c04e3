use anyhow::Result;
use colored::Colorize;
use reconcile::kind;

use crate::fmc::objects::Endpoint;
use crate::ui;

/// List every supported kind with its FMC endpoint and reference fields
pub fn run() -> Result<()> {
    ui::header("Resource kinds");

    for kind in kind::ALL {
        let endpoint = Endpoint::for_kind(kind).map_or("-", |e| e.path);
        let references: Vec<&str> = kind.reference_fields.iter().map(|f| f.attribute).collect();
        let references = if references.is_empty() {
            String::new()
        } else {
            format!("references: {}", references.join(", "))
        };

        println!(
            "  {} {} {}",
            format!("{:<18}", kind.name).bold(),
            format!("{endpoint:<22}").dimmed(),
            references.cyan()
        );
    }

    Ok(())
}
