use anyhow::{Context, Result};
use clap::Parser;
use ledger_core::{report, Block, Chain, MinerConfig, SharedChain, TransactionPool, Verification};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod node;

use node::Node;

#[derive(Parser, Debug)]
#[command(name = "ledger-node")]
#[command(about = "Several nodes mining onto one shared in-memory chain")]
struct Args {
    /// JSON miner config; the flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Leading zero hex digits required of every block hash
    #[arg(long, env = "LEDGER_DIFFICULTY")]
    difficulty: Option<u32>,

    /// Threads searching nonces for one block
    #[arg(long)]
    threads: Option<usize>,

    /// Cancel a search that runs longer than this
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Nodes mining one block each after the bootstrap blocks
    #[arg(long, default_value_t = 3)]
    nodes: usize,

    /// Print the chain as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn miner_config(&self) -> Result<MinerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                MinerConfig::from_json_str(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => MinerConfig::default(),
        };
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if self.timeout_ms.is_some() {
            config.timeout_ms = self.timeout_ms;
        }
        config.validate()?;
        Ok(config)
    }
}

fn print_chain(chain: &Chain, json: bool) -> Result<()> {
    if json {
        println!("{}", report::chain_json(chain)?);
    } else {
        print!("{}", report::render_chain(chain));
    }
    Ok(())
}

fn print_mined(node: usize, block: &Block, json: bool) -> Result<()> {
    println!("\nNode {node} mined a new block:");
    if json {
        println!("{}", report::block_json(block)?);
    } else {
        print!("{}", report::render_block(block));
    }
    Ok(())
}

fn print_verification(verification: Verification) {
    match verification {
        Verification::Valid { .. } => {
            println!("\nChain Verified: All blocks are connected and valid.")
        }
        Verification::Invalid { index } => println!("\nChain Invalid at Block {index}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.miner_config()?;
    info!(?config, nodes = args.nodes, "starting ledger-node");

    let chain = SharedChain::new(Chain::with_pool(TransactionPool::reference()));
    let pool_len = chain.pool_len();

    // Two bootstrap blocks; the first one is genesis.
    let bootstrap = Node::new(0, chain.clone(), config.clone());
    let (_, first) = bootstrap.mine_block(vec![0, 1, 2]).await?;
    print_mined(0, &first, args.json)?;
    let (_, second) = bootstrap.mine_block(vec![3, 4]).await?;
    print_mined(0, &second, args.json)?;

    print_chain(&chain.snapshot(), args.json)?;
    print_verification(chain.verify_from(second.hash()));

    let mut handles = Vec::with_capacity(args.nodes);
    for id in 1..=args.nodes {
        let node = Node::new(id, chain.clone(), config.clone());
        let picks = vec![(id + 4) % pool_len, (id + 7) % pool_len];
        handles.push((id, tokio::spawn(async move { node.mine_block(picks).await })));
    }

    // The block with the highest index is the head everybody built towards.
    let mut head: Option<(usize, String)> = None;
    for (id, handle) in handles {
        let (index, block) = handle.await??;
        print_mined(id, &block, args.json)?;
        if head.as_ref().map_or(true, |(best, _)| index > *best) {
            head = Some((index, block.hash().to_owned()));
        }
    }

    print_chain(&chain.snapshot(), args.json)?;
    if let Some((_, last)) = head {
        print_verification(chain.verify_from(&last));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::LedgerError;
    use std::io::Write;

    fn config_file(json: &str) -> anyhow::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(json.as_bytes())?;
        Ok(file)
    }

    fn parse(args: &[&str]) -> anyhow::Result<Args> {
        Ok(Args::try_parse_from(
            std::iter::once("ledger-node").chain(args.iter().copied()),
        )?)
    }

    #[test]
    fn defaults_without_config_or_flags() -> anyhow::Result<()> {
        let args = parse(&["--difficulty", "2"])?;
        assert_eq!(args.miner_config()?, MinerConfig::default());
        assert_eq!(args.nodes, 3);
        Ok(())
    }

    #[test]
    fn config_file_is_read() -> anyhow::Result<()> {
        let file = config_file(r#"{"difficulty":3,"threads":2,"timeout_ms":500}"#)?;
        let path = file.path().to_string_lossy().into_owned();
        let config = parse(&["--config", &path])?.miner_config()?;
        // LEDGER_DIFFICULTY, when set in the environment, replaces the file's value.
        if std::env::var_os("LEDGER_DIFFICULTY").is_none() {
            assert_eq!(config.difficulty, 3);
        }
        assert_eq!(config.threads, 2);
        assert_eq!(config.timeout_ms, Some(500));
        Ok(())
    }

    #[test]
    fn flags_override_config_file() -> anyhow::Result<()> {
        let file = config_file(r#"{"difficulty":3,"threads":2,"timeout_ms":500}"#)?;
        let path = file.path().to_string_lossy().into_owned();
        let args = parse(&[
            "--config",
            &path,
            "--difficulty",
            "1",
            "--threads",
            "4",
            "--timeout-ms",
            "20",
        ])?;
        let config = args.miner_config()?;
        assert_eq!(config.difficulty, 1);
        assert_eq!(config.threads, 4);
        assert_eq!(config.timeout_ms, Some(20));
        assert_eq!(config.max_attempts, None);
        Ok(())
    }

    #[test]
    fn impossible_difficulty_is_rejected() -> anyhow::Result<()> {
        let err = parse(&["--difficulty", "65"])?.miner_config().unwrap_err();
        assert_eq!(
            err.downcast_ref::<LedgerError>(),
            Some(&LedgerError::InvalidDifficulty(65))
        );
        Ok(())
    }

    #[test]
    fn invalid_config_file_is_reported() -> anyhow::Result<()> {
        let file = config_file("{not json")?;
        let path = file.path().to_string_lossy().into_owned();
        let err = parse(&["--config", &path])?.miner_config().unwrap_err();
        assert!(err.to_string().starts_with("parsing "));
        Ok(())
    }
}
