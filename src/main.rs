use anyhow::Result;
use log::info;

use edu_ledger::{Blockchain, ChainConfig, Telemetry, Wallet};

fn load_config() -> Result<ChainConfig> {
    match std::env::var("LEDGER_CONFIG") {
        Ok(path) => {
            info!("Loading chain config from {}", path);
            Ok(ChainConfig::load(path)?)
        }
        Err(_) => Ok(ChainConfig::default()),
    }
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let telemetry = Telemetry::new("ledger");

    let wallet = Wallet::with_telemetry(telemetry.child("wallet"))?;
    println!("private key {}", wallet.private_key_hex());
    println!("public key  {}", wallet.public_key_hex());
    println!("address     {}", wallet.address());

    let blockchain = Blockchain::with_config(
        wallet.address().clone(),
        load_config()?,
        telemetry.child("blockchain"),
    )?;

    blockchain.add_transaction("A", "B", 1.0);
    blockchain.mine()?;

    blockchain.add_transaction("C", "D", 2.0);
    blockchain.add_transaction("X", "Y", 3.0);
    blockchain.mine()?;

    print!("{}", blockchain);
    blockchain.verify()?;

    println!("{}", serde_json::to_string_pretty(&blockchain.last_block())?);

    for address in [wallet.address().as_str(), "A", "B", "C", "D", "X", "Y"] {
        println!("{:<36} {:.1}", address, blockchain.calculate_total_amount(address));
    }

    Ok(())
}
