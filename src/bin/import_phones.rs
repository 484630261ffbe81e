//! Seed phone numbers and coordinates onto profiles that lack them,
//! so the SMS fan-out has someone to talk to in a test deployment.

use anyhow::{bail, Result};
use clap::Parser;
use serde_json::{json, Value};

use relief_app::config::AppConfig;
use relief_app::store::models::User;
use relief_app::store::Store;

const SAMPLE_PHONES: [&str; 10] = [
    "+919876543210",
    "+919876543211",
    "+919876543212",
    "+919876543213",
    "+919876543214",
    "+919876543215",
    "+919876543216",
    "+919876543217",
    "+919876543218",
    "+919876543219",
];

// Coordinates of major Indian cities, cycled across the users.
const SAMPLE_LOCATIONS: [(f64, f64); 10] = [
    (28.6139, 77.2090), // Delhi
    (19.0760, 72.8777), // Mumbai
    (12.9716, 77.5946), // Bangalore
    (13.0827, 80.2707), // Chennai
    (22.5726, 88.3639), // Kolkata
    (18.5204, 73.8567), // Pune
    (26.9124, 75.7873), // Jaipur
    (17.3850, 78.4867), // Hyderabad
    (23.0225, 72.5714), // Ahmedabad
    (25.3176, 82.9739), // Varanasi
];

#[derive(Parser)]
#[command(name = "import-phones")]
#[command(about = "Backfill test phone numbers and coordinates onto user profiles")]
struct Args {
    /// Maximum number of users to update
    #[arg(long, default_value_t = SAMPLE_PHONES.len())]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    if !config.is_store_configured() {
        bail!("Store not configured. Set STORE_URL and STORE_API_KEY.");
    }
    let store = Store::new(&config.store_url, &config.store_api_key)?;

    let missing: Vec<User> = store
        .table("users")
        .select("id, name, email")
        .is_null("phone")
        .fetch()
        .await?;

    if missing.is_empty() {
        println!("All users already have phone numbers");
        return Ok(());
    }
    println!("Found {} users without phone numbers", missing.len());

    let mut updated = 0usize;
    for (i, user) in missing.iter().take(args.limit.min(SAMPLE_PHONES.len())).enumerate() {
        let phone = SAMPLE_PHONES[i];
        let (lat, lon) = SAMPLE_LOCATIONS[i % SAMPLE_LOCATIONS.len()];

        let result: Result<Vec<Value>, _> = store
            .table("users")
            .eq("id", user.id)
            .update(&json!({
                "phone": phone,
                "latitude": lat,
                "longitude": lon,
            }))
            .await;

        let display = user.name.as_deref().unwrap_or("unnamed user");
        match result {
            Ok(rows) if !rows.is_empty() => {
                println!("Updated {} with phone {}", display, phone);
                updated += 1;
            }
            Ok(_) => println!("Failed to update {}", display),
            Err(err) => println!("Error updating {}: {}", display, err),
        }
    }

    println!("Updated {} users with phone numbers and locations", updated);
    Ok(())
}
