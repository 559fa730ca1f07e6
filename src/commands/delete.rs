//! Delete command - Tear down the clusters a grid created and unregister it
//!
//! Usage: kubectl-grid delete <grid>
//!
//! Clusters the grid only connected to are left untouched.

use clap::Args;

use super::{GlobalArgs, TimeoutArgs};
use crate::Result;

/// Delete a grid
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Name of the grid to delete
    pub name: String,

    #[command(flatten)]
    pub(crate) timeouts: TimeoutArgs,
}

/// Run the delete command
pub async fn run(args: DeleteArgs, global: &GlobalArgs) -> Result<()> {
    let orchestrator = super::orchestrator(global, (&args.timeouts).into())?;
    orchestrator.delete_by_name(&args.name).await?;
    println!("Grid {} deleted", args.name);
    Ok(())
}
