use clap::{Args, Subcommand};
use oppnote_sync::OpportunityDirectory;

use crate::{App, OutputFormat};

#[derive(Args, Debug)]
pub struct OpportunitiesArgs {
    #[command(subcommand)]
    pub command: OpportunitiesCommand,
}

#[derive(Subcommand, Debug)]
pub enum OpportunitiesCommand {
    /// List opportunities.
    List,
    /// Show one opportunity and its note history.
    Show {
        /// Opportunity ID.
        id: String,
    },
}

pub async fn run(
    app: &App,
    args: &OpportunitiesArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let session = app.session()?;
    let crm = app.crm()?;

    match &args.command {
        OpportunitiesCommand::List => {
            let rows = crm.list(&session).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
                OutputFormat::Text => {
                    println!("{} opportunities:", rows.len());
                    for row in &rows {
                        println!("  {} | {} | {}", row.id, row.name, row.account_name());
                    }
                }
            }
        }
        OpportunitiesCommand::Show { id } => {
            let opp = crm.get_detail(&session, id).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&opp)?),
                OutputFormat::Text => {
                    println!("{} ({})", opp.name, opp.id);
                    println!("Account: {}", opp.summary().account_name());
                    let blocks = opp.content_blocks.as_deref().unwrap_or_default();
                    println!("History: {} entries", blocks.len());
                    for block in blocks {
                        let kind = block["type"].as_str().unwrap_or("?");
                        let created = block["createdDate"].as_str().unwrap_or("");
                        let files = block["files"].as_array().map_or(0, Vec::len);
                        println!("  [{kind}] {created} ({files} file(s))");
                    }
                }
            }
        }
    }
    Ok(())
}
