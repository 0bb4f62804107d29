mod cmd_board;
mod cmd_config;
mod cmd_deals;
mod cmd_filter;
mod cmd_init;
mod cmd_move;
mod cmd_note;
mod cmd_task;
mod cmd_timeline;
mod logging;
mod session;
#[cfg(feature = "tui")]
mod tui;

use clap::{Parser, Subcommand};

use cmd_config::ConfigCmd;
use cmd_filter::{FilterArgs, FilterCmd};
use cmd_task::TaskCmd;

#[derive(Parser)]
#[command(name = "dealboard", version, about = "Kanban deal board with inline detail panels")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new .dealboard/ directory
    Init {
        /// Seed the board with demo deals, users and history
        #[arg(long)]
        demo: bool,
    },
    /// Open the interactive board
    Board,
    /// Print the filtered board
    Deals {
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Ignore the saved filter and use only the flags given here
        #[arg(long)]
        ad_hoc: bool,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Move a deal to another stage
    Move {
        /// Deal id
        deal: u64,
        /// Target stage (e.g. rfq, "Won")
        stage: String,
    },
    /// Show the merged history of a deal
    Timeline {
        /// Deal id
        deal: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a manual timeline entry to a deal
    Note {
        /// Deal id
        deal: u64,
        /// Note text
        text: String,
    },
    /// Manage a deal's action items
    Task {
        #[command(subcommand)]
        cmd: TaskCmd,
    },
    /// Inspect or edit the saved board filter
    Filter {
        #[command(subcommand)]
        cmd: FilterCmd,
    },
    /// Manage board configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let repo_root = std::env::current_dir()?;

    if cli.cmd.owns_terminal() {
        logging::init_file(&repo_root);
    } else {
        logging::init_stderr();
    }
    run(cli.cmd, &repo_root)
}

impl Command {
    /// The interactive board draws on the terminal, so its logs go to a file.
    fn owns_terminal(&self) -> bool {
        matches!(self, Command::Board)
    }
}

fn run(cmd: Command, repo_root: &std::path::Path) -> anyhow::Result<()> {
    match cmd {
        Command::Init { demo } => cmd_init::execute(repo_root, demo),
        Command::Board => cmd_board::execute(repo_root),
        Command::Deals {
            json,
            ad_hoc,
            filter,
        } => cmd_deals::execute(repo_root, &filter, ad_hoc, json),
        Command::Move { deal, stage } => cmd_move::execute(repo_root, deal, &stage),
        Command::Timeline { deal, json } => cmd_timeline::execute(repo_root, deal, json),
        Command::Note { deal, text } => cmd_note::execute(repo_root, deal, &text),
        Command::Task { cmd } => cmd_task::run(cmd, repo_root),
        Command::Filter { cmd } => cmd_filter::run(cmd, repo_root),
        Command::Config { cmd } => cmd_config::run(cmd, repo_root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_board_logs_to_file() {
        let parse = |args: &[&str]| Cli::try_parse_from(args).unwrap().cmd;
        assert!(parse(&["dealboard", "board"]).owns_terminal());
        assert!(!parse(&["dealboard", "deals", "--json"]).owns_terminal());
        assert!(!parse(&["dealboard", "move", "3", "Won"]).owns_terminal());
    }
}
