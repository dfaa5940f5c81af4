use bson::Timestamp;
use clap::{Parser, Subcommand};
use mongo_mirror::{MirrorConfig, Replicator};
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "One-way MongoDB replication: snapshot, stage, replay.")]
struct Opts {
    /// configuration file path.
    #[arg(short, long, default_value = "config.toml")]
    conf: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// full snapshot of the selected namespaces, then tail the oplog forever.
    Sync,
    /// snapshot only.
    Snapshot,
    /// tail the source oplog into syncoplog.oplog.rs for deferred replay.
    Stage {
        /// start timestamp as `seconds,ordinal`; defaults to the primary's latest.
        #[arg(long)]
        start: Option<String>,
    },
    /// replay oplog entries against the destination.
    Replay {
        /// start timestamp as `seconds,ordinal`.
        #[arg(long)]
        start: String,
        /// end timestamp as `seconds,ordinal`; absent means tail forever.
        #[arg(long)]
        end: Option<String>,
        /// read entries from this namespace instead of local.oplog.rs.
        #[arg(long)]
        from_ns: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();
    let _guards = mongo_mirror::init_logger();

    let data = std::fs::read(&opts.conf)?;
    let conf: MirrorConfig = toml::from_slice(&data)?;
    let replicator = Replicator::connect(conf.get_src(), conf.get_dst())?;

    match opts.command {
        Command::Snapshot => {
            run_snapshot(&replicator, &conf)?;
        }
        Command::Sync => {
            let watermark = replicator.latest_oplog_ts()?;
            info!(?watermark, "Snapshot watermark recorded.");
            run_snapshot(&replicator, &conf)?;
            replicator.replay_oplog(
                watermark,
                None,
                None,
                conf.get_namespaces(),
                conf.get_ns_map(),
            )?;
        }
        Command::Stage { start } => {
            let start_ts = match start {
                Some(s) => parse_ts(&s)?,
                None => replicator.latest_oplog_ts()?,
            };
            replicator.stage_oplog(start_ts)?;
        }
        Command::Replay {
            start,
            end,
            from_ns,
        } => {
            let end_ts = match end {
                Some(s) => Some(parse_ts(&s)?),
                None => None,
            };
            replicator.replay_oplog(
                parse_ts(&start)?,
                end_ts,
                from_ns.as_deref(),
                conf.get_namespaces(),
                conf.get_ns_map(),
            )?;
        }
    }
    Ok(())
}

fn run_snapshot(replicator: &Replicator, conf: &MirrorConfig) -> mongo_mirror::Result<()> {
    let namespaces = if conf.get_namespaces().is_empty() {
        let mut all = Vec::new();
        for db in replicator.list_non_system_databases()? {
            for coll in replicator.list_collections(&db)? {
                all.push(format!("{}.{}", db, coll));
            }
        }
        all
    } else {
        conf.get_namespaces().to_vec()
    };

    let fallback = conf.get_fallback();
    for ns in &namespaces {
        let dst_ns = conf
            .get_ns_map()
            .get(ns)
            .cloned()
            .unwrap_or_else(|| ns.clone());
        replicator.copy_collection(
            ns,
            &dst_ns,
            conf.get_policy(),
            conf.skip_indexes(),
            &fallback,
        )?;
    }
    Ok(())
}

fn parse_ts(input: &str) -> Result<Timestamp, String> {
    let (time, increment) = input
        .split_once(',')
        .ok_or_else(|| format!("invalid timestamp {:?}, expected `seconds,ordinal`", input))?;
    let time = time
        .trim()
        .parse()
        .map_err(|e| format!("invalid timestamp seconds in {:?}: {}", input, e))?;
    let increment = increment
        .trim()
        .parse()
        .map_err(|e| format!("invalid timestamp ordinal in {:?}: {}", input, e))?;
    Ok(Timestamp { time, increment })
}
