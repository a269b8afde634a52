use anyhow::{bail, Result};

use contact_directory_core::models::Gender;
use contact_directory_core::query::ContactQuery;
use contact_directory_core::service::ContactService;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Prints one page of contacts matching the given filters.
pub async fn run_list(
    config: &Config,
    search: Option<String>,
    gender: Option<String>,
    page: u32,
) -> Result<()> {
    if page < 1 {
        bail!("--page must be >= 1");
    }
    let gender = match gender.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        None => None,
        Some(code) => match Gender::from_code(&code.to_uppercase()) {
            Some(g) => Some(g),
            None => bail!("Unknown gender: {}. Use M or F.", code),
        },
    };
    let search = search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let list = ContactService::new(&store)
        .list_contacts(&ContactQuery::new(search, gender, page))
        .await?;
    drop(store);
    pool.close().await;

    if list.contacts.is_empty() {
        println!("No contacts.");
        return Ok(());
    }

    for c in &list.contacts {
        println!(
            "{:>6}  {:<30}  {:<32}  {}",
            c.id,
            c.full_name(),
            c.email_address,
            c.gender_label()
        );
    }
    match list.next_page {
        Some(next) => println!("\nMore results: --page {}", next),
        None => println!("\n{} contact(s) on last page.", list.contacts.len()),
    }

    Ok(())
}
