use std::path::PathBuf;

use clap::Args;
use oppnote_sync::MailContext;

use crate::OutputFormat;
use crate::mail::ManifestMailbox;

#[derive(Args, Debug)]
pub struct AttachmentsArgs {
    /// Message manifest (JSON).
    #[arg(long)]
    pub message: PathBuf,
}

pub async fn run(args: &AttachmentsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let mail = ManifestMailbox::load(&args.message).await?;
    let attachments = mail.list_attachments();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&attachments)?),
        OutputFormat::Text => {
            if attachments.is_empty() {
                println!("No attachments.");
            }
            for a in &attachments {
                let inline = if a.is_inline { " inline" } else { "" };
                println!(
                    "  {id} | {name} | {mime} | {size} bytes{inline}",
                    id = a.id,
                    name = a.display_name,
                    mime = a.mime_type,
                    size = a.size_bytes,
                );
            }
        }
    }
    Ok(())
}
