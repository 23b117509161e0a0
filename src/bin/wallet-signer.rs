//! 1/1 wallet whose only signer is another account.
//!
//! Usage:
//!   cargo run --bin wallet-signer

use std::sync::Arc;

use sequence_account::logging::init_logging;
use sequence_account::settings::Settings;
use sequence_account::{
    default_contexts, Account, AccountOptions, LocalSigner, Result, SignatureOrchestrator, Signer,
    SignerLeaf, SimpleConfig,
};

async fn run() -> Result<()> {
    let settings = Settings::from_env()?;
    let tracker = settings.tracker()?;
    let contexts = default_contexts()?;

    let inner_signer = Arc::new(LocalSigner::random());
    println!("Created inner signer: {:?}", inner_signer.address());

    // Account that acts as the signer of the wallet below
    let signer = Arc::new(
        Account::new(AccountOptions {
            config: SimpleConfig::new(1, 1, vec![SignerLeaf::new(inner_signer.address(), 1)]).into(),
            tracker: tracker.clone(),
            orchestrator: SignatureOrchestrator::new(vec![inner_signer]),
            contexts: contexts.clone(),
            networks: settings.networks.clone(),
        })
        .await?,
    );

    let wallet = Account::new(AccountOptions {
        config: SimpleConfig::new(1, 1, vec![SignerLeaf::new(signer.address(), 1)]).into(),
        tracker,
        orchestrator: SignatureOrchestrator::new(vec![Arc::new(signer.signer())]),
        contexts,
        networks: settings.networks.clone(),
    })
    .await?;
    println!("Created wallet: {:?}", wallet.address());

    wallet.publish_witness().await?;
    println!("Published witness");

    let signer2 = LocalSigner::random();
    println!("Created signer2: {:?}", signer2.address());

    let next = SimpleConfig::new(
        1,
        2,
        vec![
            SignerLeaf::new(signer.address(), 1),
            SignerLeaf::new(signer2.address(), 1),
        ],
    );
    wallet.update_config(&next.into()).await?;
    println!("Updated config");

    wallet.publish_witness().await?;
    println!("Published witness");

    Ok(())
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        eprintln!("Failed: {}", e);
        std::process::exit(1);
    }
}
