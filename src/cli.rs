use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fmcsync")]
#[command(version)]
#[command(about = "Reconcile FMC object collections from declarative files", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to ~/.config/fmcsync/config.toml)
    #[arg(long, global = true, env = "FMCSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what an apply would change
    Plan(PlanArgs),

    /// Create, update and delete objects to match a document
    Apply(ApplyArgs),

    /// Inspect or edit persisted state
    #[command(subcommand)]
    State(StateCommand),

    /// List supported resource kinds
    Kinds,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct PlanArgs {
    /// Desired-state document (TOML)
    pub file: PathBuf,

    /// Plan against persisted state without listing the remote
    #[arg(long)]
    pub no_refresh: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Desired-state document (TOML)
    pub file: PathBuf,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Simulate the apply against persisted state; nothing is sent to FMC
    #[arg(long)]
    pub dry_run: bool,

    /// Parallel workers (defaults to [apply] jobs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Apply against persisted state without listing the remote
    #[arg(long)]
    pub no_refresh: bool,
}

#[derive(Subcommand)]
pub enum StateCommand {
    /// Show persisted instances, or the items of one instance
    Show {
        /// Instance name
        instance: Option<String>,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Forget an instance without touching FMC
    Rm {
        /// Instance name
        instance: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from(["fmcsync", "-vv", "apply", "groups.toml", "-y", "-j", "8"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(args.yes);
        assert!(!args.dry_run);
        assert_eq!(args.jobs, Some(8));
        assert_eq!(args.file, PathBuf::from("groups.toml"));
    }

    #[test]
    fn test_parse_state_show() {
        let cli = Cli::try_parse_from(["fmcsync", "state", "show", "lab", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::State(StateCommand::Show { instance: Some(ref i), json: true }) if i == "lab"
        ));
    }
}
