use async_storage::thread_pool::*;
use async_storage::{
    AsyncStorage, BackendKind, KeyRange, KvStore, PoolKind, Reply, Request, Result, StorageModule,
    StoreConfig, StoreError, StoreErrorKind,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::exit;
use tokio::runtime::Handle;
use tracing::{debug, info, Level};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: SubCommand,

    #[clap(long)]
    #[clap(help = "JSON config file, flags below override its values")]
    config: Option<PathBuf>,

    #[clap(long)]
    #[clap(help = "Storage directory")]
    path: Option<PathBuf>,

    #[clap(long)]
    #[clap(help = "Storage engine: sled or memory")]
    backend: Option<BackendKind>,

    #[clap(long)]
    #[clap(help = "Thread pool: naive, shared_queue or rayon")]
    pool: Option<PoolKind>,

    #[clap(long)]
    #[clap(help = "Number of pool workers")]
    threads: Option<usize>,

    #[clap(short, long, parse(from_occurrences))]
    #[clap(help = "Log more, repeat for more detail")]
    verbose: u64,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    #[clap(about = "Get the values of the given keys")]
    Get {
        #[clap(required = true, help = "The string keys")]
        keys: Vec<String>,
    },

    #[clap(about = "Set key value pairs in one atomic batch")]
    Set {
        #[clap(required = true, help = "Alternating keys and values")]
        pairs: Vec<String>,
    },

    #[clap(about = "Remove the given keys in one atomic batch")]
    Rm {
        #[clap(required = true, help = "The string keys to remove")]
        keys: Vec<String>,
    },

    #[clap(about = "Remove every key")]
    Clear,

    #[clap(about = "List keys in ascending order")]
    Keys {
        #[clap(long, conflicts_with_all = &["from", "to"])]
        #[clap(help = "Only keys starting with this prefix")]
        prefix: Option<String>,

        #[clap(long, requires = "to")]
        #[clap(help = "Lower bound of the range, inclusive by default")]
        from: Option<String>,

        #[clap(long, requires = "from")]
        #[clap(help = "Upper bound of the range, exclusive by default")]
        to: Option<String>,

        #[clap(long, requires = "from")]
        exclusive_lower: bool,

        #[clap(long, requires = "to")]
        inclusive_upper: bool,
    },

    #[clap(about = "Run a bridge request given as JSON and print the reply")]
    Call {
        #[clap(help = r#"e.g. {"method":"multiGet","args":["k1"]}"#)]
        request: String,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // set log collector
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(log_level(args.verbose))
        .init();

    info!("Application Started: Version {}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };
    debug!("using {:?}", config);

    let res = match config.pool {
        PoolKind::Naive => run::<NaiveThreadPool>(&config, args.command).await,
        PoolKind::SharedQueue => run::<SharedQueueThreadPool>(&config, args.command).await,
        PoolKind::Rayon => run::<RayonThreadPool>(&config, args.command).await,
    };

    match res {
        Ok(true) => {}
        Ok(false) => exit(1),
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    }
}

fn log_level(verbose: u64) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn load_config(args: &Args) -> Result<StoreConfig> {
    let mut config = match &args.config {
        Some(file) => StoreConfig::from_file(file)?,
        None => StoreConfig::default(),
    };
    if let Some(path) = &args.path {
        config.path = path.clone();
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(pool) = args.pool {
        config.pool = pool;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    config.validate()?;
    Ok(config)
}

// Ok(false) means the command ran but reported a failure on stdout
async fn run<P: ThreadPool>(config: &StoreConfig, command: SubCommand) -> Result<bool> {
    let store = KvStore::<P>::from_config(config)?;

    match command {
        SubCommand::Get { keys } => {
            for (_, val) in store.multi_get(keys).await? {
                match val {
                    Some(val) => println!("{}", String::from_utf8_lossy(&val)),
                    None => println!("Key not found"),
                }
            }
        }

        SubCommand::Set { pairs } => {
            if pairs.len() % 2 != 0 {
                return Err(StoreError::new(
                    StoreErrorKind::InvalidArgument,
                    format!("key {} has no value", pairs[pairs.len() - 1]),
                ));
            }
            let entries = pairs
                .chunks(2)
                .map(|pair| (pair[0].clone(), pair[1].clone().into_bytes()))
                .collect();
            store.multi_set(entries).await?;
        }

        SubCommand::Rm { keys } => store.multi_remove(keys).await?,

        SubCommand::Clear => store.clear().await?,

        SubCommand::Keys {
            prefix,
            from,
            to,
            exclusive_lower,
            inclusive_upper,
        } => {
            let keys = match (prefix, from, to) {
                (Some(prefix), _, _) => store.get_all_keys_with_prefix(prefix).await?,
                (None, Some(lower), Some(upper)) => {
                    let range = KeyRange::new(lower, upper, !exclusive_lower, inclusive_upper);
                    store.get_all_keys_in_range(range).await?
                }
                _ => store.get_all_keys().await?,
            };
            for key in keys {
                println!("{}", key);
            }
        }

        SubCommand::Call { request } => {
            let reply = match Request::from_json(&request) {
                Ok(request) => StorageModule::new(store, Handle::current()).call(request).await,
                Err(err) => Reply::from(err),
            };
            println!("{}", serde_json::to_string(&reply)?);
            return Ok(reply.is_success());
        }
    }

    Ok(true)
}
