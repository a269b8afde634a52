use anyhow::{bail, Result};

use contact_directory_core::service::ContactService;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Prints a single contact, failing if the id is unknown.
pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let contact = ContactService::new(&store).fetch_for_edit(id).await?;
    drop(store);
    pool.close().await;

    let Some(c) = contact else {
        bail!("contact not found: {}", id);
    };

    println!("--- contact ---");
    println!("id:            {}", c.id);
    println!("first_name:    {}", c.first_name);
    println!("last_name:     {}", c.last_name);
    println!("email_address: {}", c.email_address);
    println!("gender:        {} ({})", c.gender_label(), c.gender);
    Ok(())
}
