use dealboard_core::detail::AddDetail;
use std::path::Path;

use crate::session::Session;

/// `dealboard note <deal> <text>`
pub fn execute(repo_root: &Path, deal: u64, text: &str) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        anyhow::bail!("note text is empty");
    }
    let session = Session::open(repo_root)?;
    let mut panel = session.panel(deal)?;
    panel.add_detail(
        &session.store,
        AddDetail::Note {
            message: text.to_string(),
        },
    )?;
    println!("Added note to deal {deal}");
    Ok(())
}
