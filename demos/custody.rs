//! Walks one donation through the request/approve handshake and prints its trail.
//!
//! Run with `cargo run --example custody`.
//!
//! Set `BLOOD_CUSTODY_DB` to keep the store between runs and `RUST_LOG` to
//! adjust logging, e.g. `RUST_LOG=blood_custody=debug`.
use anyhow::Context;
use blood_custody::{BloodType, CustodyEngine, CustodyError, Identity, config::EngineConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env()?;
    let db = config.open_db()?;

    let admin = Identity::generate();
    let engine = match CustodyEngine::initialize(db, admin, config) {
        Ok(engine) => engine,
        Err(CustodyError::AlreadyInitialized) => {
            anyhow::bail!("store already initialized, the demo needs a fresh store")
        }
        Err(e) => return Err(e).context("failed to initialize custody registry"),
    };

    let bank = Identity::generate();
    let hospital = Identity::generate();
    engine.add_bank(&admin, bank)?;
    engine.add_hospital(&admin, hospital)?;

    let unit_id = engine
        .create_unit(&bank, "Aman Kumar", BloodType::APositive.ordinal())
        .context("bank failed to record unit")?;
    info!(unit_id, available = engine.list_available().len(), "stock after recording");

    engine
        .request_unit(&hospital, unit_id)
        .context("hospital failed to request unit")?;
    engine
        .approve_transfer(&bank, unit_id, &hospital)
        .context("bank failed to approve transfer")?;

    let unit = engine.get_unit(unit_id)?;
    println!("{unit:#?}");
    for event in engine.unit_history(unit_id)? {
        println!("{event}");
    }
    println!("state digest {}", engine.state_digest()?);

    Ok(())
}
