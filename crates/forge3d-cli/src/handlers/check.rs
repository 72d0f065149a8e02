//! `forge3d check`: probe and print.

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use super::probe;
use crate::bootstrap::CliContext;
use crate::presentation::print_snapshot;

pub async fn execute(ctx: &CliContext, json: bool) -> Result<()> {
    let snapshot = probe(ctx, &CancellationToken::new()).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}
