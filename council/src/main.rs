//! Council-member executable: runs one Paxos node and proposes each
//! candidate read from standard input.

use std::path::PathBuf;

use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(StructOpt)]
#[structopt(name = "council")]
struct Opt {
    /// Unique member ID
    #[structopt(short = "i", long = "id")]
    id: usize,

    /// Path to the membership file (one `id,host,port` line per member)
    #[structopt(short = "c", long = "config", default_value = "network.config")]
    config: PathBuf,

    /// Log level filter
    #[structopt(short = "l", long = "log", default_value = "info")]
    log: log::LevelFilter,
}

fn init_logger(filter: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}][{}] {}", record.level(), record.target(), message))
        })
        .level(filter)
        .chain(std::io::stdout())
        .apply()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();
    init_logger(opt.log)?;

    let config = paxos::Config::load(opt.id, &opt.config)?;
    let server = paxos::Server::start(config).await?;

    println!("Enter a candidate to propose (one per line):");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let candidate = line.trim();
        if candidate.is_empty() {
            match server.node().learner().last_learned() {
                Some(value) => println!("learned: {}", value),
                None => println!("nothing learned yet"),
            }
            continue;
        }
        server.propose(candidate);
    }

    server.shutdown();
    Ok(())
}
