use chrono::Utc;

use crate::{App, OutputFormat};

pub fn run(app: &App, format: &OutputFormat) -> anyhow::Result<()> {
    let Some(session) = app.store.current() else {
        anyhow::bail!("not signed in");
    };
    let expired = session.access_token_expired(Utc::now());

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "userId": session.user_id,
                "userName": session.user_display_name,
                "exp": session.access_token_expiry,
                "expired": expired,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("User ID:  {}", session.user_id);
            println!(
                "Name:     {}",
                session.user_display_name.as_deref().unwrap_or("-")
            );
            let state = if expired { " (expired)" } else { "" };
            println!("Expires:  {}{state}", session.access_token_expiry);
        }
    }
    Ok(())
}
