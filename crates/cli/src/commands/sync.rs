use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use oppnote_sync::{MailContext, OpportunityDirectory, SyncOrchestrator, SyncOutcome, SyncRequest};
use tracing::{debug, info};

use crate::mail::ManifestMailbox;
use crate::{App, OutputFormat};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Target opportunity ID.
    #[arg(long)]
    pub opportunity: String,
    /// Message manifest (JSON).
    #[arg(long)]
    pub message: PathBuf,
    /// Attachment to include, in upload order. Repeatable.
    #[arg(long = "attachment", conflicts_with = "all_attachments")]
    pub attachments: Vec<String>,
    /// Include every attachment of the message.
    #[arg(long)]
    pub all_attachments: bool,
    /// Free text placed above the email in the note.
    #[arg(long)]
    pub notes: Option<String>,
}

pub async fn run(app: &App, args: &SyncArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let session = app.session()?;
    let crm = Arc::new(app.crm()?);
    let mail = Arc::new(ManifestMailbox::load(&args.message).await?);

    // The orchestrator works on a loaded snapshot; fetch it here.
    let detail = crm.get_detail(&session, &args.opportunity).await?;
    debug!(blocks = detail.history_len(), "loaded opportunity detail");

    let attachment_ids = if args.all_attachments {
        mail.list_attachments().into_iter().map(|a| a.id).collect()
    } else {
        args.attachments.clone()
    };

    let mut request = SyncRequest::new(args.opportunity.clone())
        .with_detail(detail)
        .with_attachments(attachment_ids);
    if let Some(notes) = &args.notes {
        request = request.with_notes(notes.clone());
    }

    let orchestrator = SyncOrchestrator::new(mail, crm.clone(), crm)
        .with_composer(app.config.note.composer()?);

    let mut phases = orchestrator.subscribe();
    let progress = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow_and_update();
            info!(%phase, "sync phase");
            if phase.is_terminal() {
                break;
            }
        }
    });

    let outcome = orchestrator.run(Some(&session), request).await;
    drop(orchestrator);
    let _ = progress.await;

    print_outcome(&outcome, format)?;
    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_outcome(outcome: &SyncOutcome, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => match outcome {
            SyncOutcome::Succeeded(s) => {
                println!("{}", s.message);
                println!("  Note:  {}", s.block.id);
                for file in &s.block.files {
                    println!("  File:  {} ({})", file.file_name, file.file_id);
                }
            }
            SyncOutcome::Failed(f) => {
                eprintln!("{}", f.message);
                eprintln!("  Failed during: {}", f.phase);
                for file in &f.orphaned_files {
                    eprintln!("  Orphaned upload: {} ({})", file.file_name, file.file_id);
                }
            }
        },
    }
    Ok(())
}
