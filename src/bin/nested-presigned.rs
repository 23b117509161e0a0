//! Nested signer tree used as the signer of a 1/1 wallet, followed by a
//! presigned update saved explicitly with the tracker.
//!
//! The signer account needs both branches: each branch is 1-of-3 over a
//! recovery key, a backup key and one live signer.
//!
//! Usage:
//!   cargo run --bin nested-presigned

use std::sync::Arc;

use sequence_account::logging::init_logging;
use sequence_account::settings::Settings;
use sequence_account::signature::CHAIN_AGNOSTIC;
use sequence_account::{
    default_contexts, hash_set_image_hash, Account, AccountOptions, LocalSigner,
    PresignedConfigUpdate, Result, SignatureOrchestrator, Signer, SignerLeaf, SimpleConfig,
    Topology, WalletConfig,
};

/// 1-of-3 branch: two placeholder keys nobody holds, plus `live`.
fn branch(weight: u8, live: &LocalSigner) -> Topology {
    let recovery = LocalSigner::random().address();
    let backup = LocalSigner::random().address();
    Topology::nested(
        weight,
        1,
        Topology::node(
            Topology::node(Topology::signer(recovery, 1), Topology::signer(backup, 1)),
            Topology::signer(live.address(), 1),
        ),
    )
}

async fn run() -> Result<()> {
    let settings = Settings::from_env()?;
    let tracker = settings.tracker()?;
    let contexts = default_contexts()?;

    let inner_signer1 = Arc::new(LocalSigner::random());
    println!("Created inner signer1: {:?}", inner_signer1.address());
    let inner_signer2 = Arc::new(LocalSigner::random());
    println!("Created inner signer2: {:?}", inner_signer2.address());

    let signer_config = WalletConfig::new(
        3,
        0,
        Topology::node(branch(1, &inner_signer1), branch(2, &inner_signer2)),
    );
    let signer = Arc::new(
        Account::new(AccountOptions {
            config: signer_config,
            tracker: tracker.clone(),
            orchestrator: SignatureOrchestrator::new(vec![inner_signer1, inner_signer2]),
            contexts: contexts.clone(),
            networks: settings.networks.clone(),
        })
        .await?,
    );

    let wallet = Account::new(AccountOptions {
        config: SimpleConfig::new(1, 1, vec![SignerLeaf::new(signer.address(), 1)]).into(),
        tracker: tracker.clone(),
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

    let next_config = WalletConfig::new(
        1,
        2,
        Topology::node(
            Topology::signer(signer.address(), 1),
            Topology::signer(signer2.address(), 1),
        ),
    );
    let update_struct = hash_set_image_hash(next_config.image_hash());

    // Chain-agnostic so the update can be applied on any network later
    let signature = wallet.sign_digest(update_struct, CHAIN_AGNOSTIC).await?;

    tracker.save_wallet_config(&next_config).await?;
    tracker
        .save_presigned_configuration(&PresignedConfigUpdate {
            wallet: wallet.address(),
            next_config,
            signature,
        })
        .await?;
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
