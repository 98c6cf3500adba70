use crate::App;

pub fn run(app: &App) -> anyhow::Result<()> {
    let was_signed_in = app.store.current().is_some();
    app.store.clear()?;
    if was_signed_in {
        println!("Signed out.");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}
