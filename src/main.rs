use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tss_signer::cli::{Cli, Commands};
use tss_signer::config::{BroadcastConfig, SignerConfig, SignerSource};
use tss_signer::error::TssError;
use tss_signer::pipeline::{Broadcast, Finalizer};
use tss_signer::signing::{LocalKeySigner, RemoteSigner, SigningPort};
use tss_signer::tx::RpcBroadcaster;
use tss_signer::types::{BroadcastOutcome, MessageArtifact, SignedArtifact, TransactionArtifact};
use tss_signer::utils::{logging, to_checksum_address};
use tss_signer::{log_error, log_info, log_warn};

const LOG_MODULE: &str = "main";

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::set_min_level(cli.global.log_level);
    let json = cli.global.json;

    match run(cli) {
        Ok(artifact) => match print_artifact(&artifact, json) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            log_error!(LOG_MODULE, "Signing failed", error = format!("{:#}", e));
            if json {
                let body = match e.downcast_ref::<TssError>() {
                    Some(tss) => serde_json::json!({ "error": tss }),
                    None => serde_json::json!({ "error": { "message": format!("{:#}", e) } }),
                };
                println!("{}", body);
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<SignedArtifact> {
    let config = SignerConfig::from_args(&cli.global).map_err(TssError::from)?;

    let signer: Box<dyn SigningPort> = match config.source {
        SignerSource::DevKey(key) => {
            let signer = LocalKeySigner::new(&key)?;
            log_warn!(
                LOG_MODULE,
                "Signing with a local development key",
                address = to_checksum_address(signer.address().as_bytes())
            );
            Box::new(signer)
        }
        SignerSource::Remote(backend) => {
            log_info!(LOG_MODULE, "Using threshold backend", url = &backend.url, vault = &backend.vault);
            Box::new(RemoteSigner::new(backend)?)
        }
    };
    let finalizer = Finalizer::new(signer, config.expected_address);

    match &cli.command {
        Commands::Message(args) => {
            let artifact = finalizer.sign_message(args.message.as_bytes())?;
            Ok(SignedArtifact::Message(artifact))
        }
        Commands::Tx(args) => {
            let tx = args.to_unsigned()?;
            let broadcast_config = BroadcastConfig::from_args(args).map_err(TssError::from)?;
            let broadcaster = broadcast_config
                .as_ref()
                .map(|c| RpcBroadcaster::new(c.rpc_url.as_str()))
                .transpose()
                .context("cannot set up broadcaster")?;
            let broadcast = match (&broadcaster, &broadcast_config) {
                (Some(port), Some(c)) => {
                    log_info!(LOG_MODULE, "Broadcast enabled", rpc_url = port.url());
                    Some(Broadcast {
                        port,
                        explorer: c.explorer.as_deref(),
                    })
                }
                _ => None,
            };

            let artifact = finalizer.sign_transaction(&tx, broadcast)?;
            Ok(SignedArtifact::Transaction(artifact))
        }
    }
}

fn print_artifact(artifact: &SignedArtifact, json: bool) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(artifact).context("cannot serialize artifact")?
        );
        return Ok(());
    }

    match artifact {
        SignedArtifact::Message(m) => print_message(m),
        SignedArtifact::Transaction(t) => print_transaction(t),
    }
    Ok(())
}

fn verified_label(verified: bool) -> &'static str {
    if verified {
        "yes"
    } else {
        "NO (no expected address)"
    }
}

fn print_message(m: &MessageArtifact) {
    println!("Digest:            {}", m.digest_hash);
    println!("Signature:         {}", m.signature);
    println!("Recovery id:       {}", m.recovery_id);
    println!("Recovered address: {}", m.recovered_address);
    println!("Verified:          {}", verified_label(m.verified));
}

fn print_transaction(t: &TransactionArtifact) {
    println!("Digest:             {}", t.digest_hash);
    println!("Signature:          {}", t.signature);
    println!("Chain id:           {}", t.chain_id);
    println!("v:                  {}", t.v);
    println!("Recovered address:  {}", t.recovered_address);
    println!("From address:       {}", t.from_address);
    println!("Verified:           {}", verified_label(t.verified));
    println!("Transaction hash:   {}", t.transaction_hash);
    println!("Signed transaction: {}", t.signed_transaction);

    if t.address_mismatch {
        println!();
        println!("WARNING: the encoded transaction's sender does not match the recovered signer");
    }

    match &t.broadcast {
        Some(BroadcastOutcome::Submitted {
            tx_hash,
            explorer_url,
        }) => {
            println!();
            println!("Broadcast:          submitted {}", tx_hash);
            if let Some(url) = explorer_url {
                println!("Explorer:           {}", url);
            }
        }
        Some(BroadcastOutcome::Failed { error }) => {
            println!();
            println!("WARNING: broadcast failed: {}", error);
        }
        None => {}
    }
}
