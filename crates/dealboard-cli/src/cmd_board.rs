use std::path::Path;

/// Open the interactive board.
///
/// With the `tui` feature (default): the ratatui board.
/// Without: prints the filtered board once.
pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    #[cfg(feature = "tui")]
    {
        crate::tui::run(repo_root)
    }

    #[cfg(not(feature = "tui"))]
    {
        eprintln!("dealboard board (plain mode: rebuild with the `tui` feature for the interactive board)");
        crate::cmd_deals::execute(repo_root, &crate::cmd_filter::FilterArgs::default(), false, false)
    }
}
