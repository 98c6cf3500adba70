use clap::Args;
use tracing::warn;

use crate::{App, OutputFormat};

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email address.
    #[arg(long, env = "OPPNOTE_EMAIL")]
    pub email: String,
    /// Account password.
    #[arg(long, env = "OPPNOTE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(app: &App, args: &LoginArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let auth = app.auth()?;
    let session = auth.login(&args.email, &args.password).await?;
    app.store.set_session(session.clone())?;

    // A missing display name only affects note attribution.
    let session = match app.store.resolve_display_name(&auth, session.clone()).await {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(error = %e, "could not resolve display name");
            session
        }
    };

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "userId": session.user_id,
                "userName": session.user_display_name,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => match &session.user_display_name {
            Some(name) => println!("Signed in as {name} ({}).", session.user_id),
            None => println!("Signed in as user {}.", session.user_id),
        },
    }
    Ok(())
}
