use anyhow::Result;
use clap::{Parser, Subcommand};
use ledger_core::{
    constants::DEFAULT_DIFFICULTY, digest, hash_bytes, pow::count_leading_zero_nibbles, report,
    select::prompt_selection, Chain, Miner, MinerConfig, TransactionPool,
};
use std::io;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Interactive client for the in-memory proof-of-work ledger")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pick pooled transactions for each block on stdin, then list and verify the chain
    Session {
        /// Leading zero hex digits required of every block hash
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: u32,
        /// Blocks to build
        #[arg(long, default_value_t = 2)]
        blocks: usize,
        /// Print blocks as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the SHA-256 digest of some text
    Hash {
        /// Text to digest
        text: String,
    },
}

fn session(difficulty: u32, blocks: usize, json: bool) -> Result<()> {
    let miner = Miner::from_config(MinerConfig {
        difficulty,
        ..MinerConfig::default()
    })?;
    let mut chain = Chain::with_pool(TransactionPool::reference());
    let mut input = io::stdin().lock();
    let mut last = String::new();

    for _ in 0..blocks {
        let picks = prompt_selection(chain.pool(), &mut input, io::stdout().lock())?;
        let selected = chain.pool().select(&picks)?;
        let previous = chain.head_hash().to_owned();
        let block = chain.build_block_with(&previous, selected, &miner)?;

        if block.verify_nonce(difficulty) {
            println!("Nonce is valid for the block!");
        } else {
            println!("Nonce is not valid for the block!");
        }
        println!("Mined Block:");
        if json {
            println!("{}", report::block_json(block)?);
        } else {
            print!("{}", report::render_block(block));
        }
        last = block.hash().to_owned();
    }

    println!();
    if json {
        println!("{}", report::chain_json(&chain)?);
    } else {
        print!("{}", report::render_chain(&chain));
    }

    let verification = chain.verify_from(&last);
    info!(?verification, "session finished");
    match verification.failure_index() {
        None => println!("\nChain Verified: All blocks are connected and valid."),
        Some(index) => println!("\nChain Invalid at Block {index}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .pretty()
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Session {
            difficulty,
            blocks,
            json,
        } => session(difficulty, blocks, json)?,
        Command::Hash { text } => {
            let raw = hash_bytes(text.as_bytes());
            println!("{}", digest(text.as_bytes()));
            println!("leading zeros: {}", count_leading_zero_nibbles(&raw));
        }
    }
    Ok(())
}
