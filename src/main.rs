use clap::Parser;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use rootwalk::resolver::DEFAULT_ROOT_SERVERS;
use rootwalk::transport::UdpTransport;
use rootwalk::{RecordType, Resolver, ResolverConfig, TraceEvent, TraceSink};

#[derive(Parser)]
#[command(name = "rootwalk")]
#[command(about = "Resolve a name by walking delegations from the root", long_about = None)]
struct Args {
    /// Name to resolve
    name: String,

    /// Record type (A, NS, CNAME, AAAA, MX, TXT, SOA or TYPE<n>)
    #[arg(default_value = "A")]
    qtype: RecordType,

    /// Root server to start from (repeatable; the first one is used)
    #[arg(short, long = "root")]
    roots: Vec<Ipv4Addr>,

    /// Per-query timeout in milliseconds
    #[arg(short, long, default_value = "3000")]
    timeout_ms: u64,

    /// Nameserver port
    #[arg(short, long, default_value = "53")]
    port: u16,

    /// Print each step of the walk
    #[arg(long)]
    trace: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

/// Prints the walk indented by depth.
struct PrintSink;

impl TraceSink for PrintSink {
    fn event(&self, event: &TraceEvent) {
        match event {
            TraceEvent::Query {
                name,
                qtype,
                server,
                depth,
            } => println!("{:indent$}> {} {} @{}", "", name, qtype, server, indent = depth * 2),
            TraceEvent::CacheHit { name, qtype, depth } => {
                println!("{:indent$}> {} {} (cached)", "", name, qtype, indent = depth * 2)
            }
            TraceEvent::Cname { target, depth, .. } => {
                println!("{:indent$}  CNAME -> {}", "", target, indent = depth * 2)
            }
            TraceEvent::Referral {
                nameserver,
                server,
                glue,
                depth,
            } => {
                let via = if *glue { "glue" } else { "lookup" };
                println!(
                    "{:indent$}  NS {} = {} ({})",
                    "",
                    nameserver,
                    server,
                    via,
                    indent = depth * 2
                )
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
        .ok();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let root_servers = if args.roots.is_empty() {
        DEFAULT_ROOT_SERVERS.to_vec()
    } else {
        args.roots
    };
    let config = ResolverConfig {
        root_servers,
        timeout: Duration::from_millis(args.timeout_ms),
        ..ResolverConfig::default()
    };

    let transport = Arc::new(UdpTransport::with_port(args.port));
    let mut resolver = Resolver::new(config, transport)?.with_trace_sink(Arc::new(PrintSink));
    resolver.set_trace(args.trace);

    let records = resolver.resolve(&args.name, args.qtype).await?;
    for r in &records {
        println!("{}\t{}\t{}\t{}", r.name, r.ttl, r.rtype, r.display_data());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(run(args))
}
