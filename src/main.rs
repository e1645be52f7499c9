//! Purpose: `ravendb` CLI entry point.
//! Role: Binary crate root; parses args, builds a store, runs one command, emits JSON on stdout.
//! Invariants: Successful results are a single JSON value on stdout.
//! Invariants: Errors are emitted as JSON on stderr (plain text on a terminal).
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Logs go to stderr only and stay off unless `RUST_LOG` enables them.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use ravendb_client::api::{DocumentStore, Error, ErrorKind, HttpExecutor, UreqTransport, to_exit_code};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

#[derive(Parser)]
#[command(
    name = "ravendb",
    version,
    about = "Talk to a RavenDB server from the command line",
    long_about = r#"Run admin and document commands against one RavenDB node.

Results are printed as JSON on stdout. Failures are printed as JSON on stderr
and mapped to a stable exit code per error kind."#,
    after_help = r#"EXAMPLES
  $ ravendb databases list
  $ ravendb --database orders stats
  $ ravendb --database orders indexing stop
  $ ravendb --database orders put users/1 '{"Name":"John"}' --collection User
  $ ravendb raw GET '{url}/databases/{db}/indexes'"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "http://127.0.0.1:8080",
        help = "Server url (http or https, no path)",
        value_hint = ValueHint::Url
    )]
    url: String,
    #[arg(long, short = 'd', help = "Database for database-scoped commands")]
    database: Option<String>,
    #[arg(long, help = "Request timeout in seconds")]
    timeout: Option<u64>,
    #[arg(long, help = "PEM file with CA certificates to trust", value_hint = ValueHint::FilePath)]
    tls_ca: Option<PathBuf>,
    #[arg(long, help = "Skip TLS certificate verification (testing only)")]
    tls_skip_verify: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(arg_required_else_help = true, about = "List, create, and delete databases")]
    Databases {
        #[command(subcommand)]
        command: DatabasesCommand,
    },
    #[command(about = "Show statistics for --database")]
    Stats {
        #[arg(long, help = "Debug tag appended to the request")]
        debug_tag: Option<String>,
    },
    #[command(about = "Show the database topology for --database")]
    Topology,
    #[command(arg_required_else_help = true, about = "Inspect and change cluster membership")]
    Cluster {
        #[command(subcommand)]
        command: ClusterCommand,
    },
    #[command(arg_required_else_help = true, about = "Pause or resume indexing for --database")]
    Indexing {
        #[command(subcommand)]
        command: IndexingCommand,
    },
    #[command(arg_required_else_help = true, about = "Define indexes for --database")]
    Indexes {
        #[command(subcommand)]
        command: IndexesCommand,
    },
    #[command(about = "Store a JSON document in --database")]
    Put {
        #[arg(help = "Document id (empty with --collection lets the server assign one)")]
        id: String,
        #[arg(help = "Document body as a JSON object")]
        json: String,
        #[arg(long, help = "Type name used to derive the @collection")]
        collection: Option<String>,
        #[arg(long, help = "Expected change vector for an optimistic write")]
        change_vector: Option<String>,
    },
    #[command(about = "Run an RQL query against --database")]
    Query {
        #[arg(help = "RQL text, e.g. \"from Users\"")]
        rql: String,
        #[arg(long, help = "Wait for non-stale results (optional timeout in seconds)")]
        wait_for_non_stale: Option<Option<u64>>,
        #[arg(long, help = "Order results randomly")]
        random: bool,
        #[arg(long, help = "Seed for --random")]
        seed: Option<String>,
        #[arg(long, help = "Ask the server not to serve a cached result")]
        no_caching: bool,
        #[arg(long, help = "Use the streaming endpoint")]
        stream: bool,
        #[arg(long, help = "Maximum results to return")]
        take: Option<usize>,
    },
    #[command(about = "Send an arbitrary request; {url} and {db} are expanded")]
    Raw {
        #[arg(help = "HTTP method (GET, POST, PUT, DELETE)")]
        method: String,
        #[arg(help = "Url template, e.g. '{url}/databases/{db}/stats'")]
        template: String,
        #[arg(long, help = "JSON request body")]
        body: Option<String>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ ravendb completion bash > ~/.local/share/bash-completion/completions/ravendb
  $ ravendb completion zsh > ~/.zfunc/_ravendb"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum DatabasesCommand {
    #[command(about = "List database names")]
    List {
        #[arg(long, default_value_t = 0)]
        start: usize,
        #[arg(long, help = "Page size (defaults to the client conventions)")]
        page_size: Option<usize>,
    },
    #[command(about = "Create a database")]
    Create {
        name: String,
        #[arg(long, default_value_t = 1)]
        replication_factor: u32,
    },
    #[command(about = "Delete a database")]
    Delete {
        name: String,
        #[arg(long, help = "Also remove the data directory")]
        hard_delete: bool,
        #[arg(long, help = "Only delete from this node")]
        from_node: Option<String>,
    },
    #[command(about = "Hard-delete every database whose name starts with --prefix")]
    Cleanup {
        #[arg(long, default_value = "tst_")]
        prefix: String,
    },
}

#[derive(Subcommand)]
enum ClusterCommand {
    #[command(about = "Show cluster topology")]
    Topology,
    #[command(about = "Remove a node from the cluster")]
    RemoveNode {
        node: String,
        #[arg(long, help = "Node tag (defaults to the node name)")]
        tag: Option<String>,
    },
}

#[derive(Subcommand)]
enum IndexingCommand {
    Stop,
    Start,
}

#[derive(Subcommand)]
enum IndexesCommand {
    #[command(about = "Create or replace an index (`_` in the name becomes `/`)")]
    Put {
        name: String,
        #[arg(long, required = true, help = "Map function; repeat for a multi-map index")]
        map: Vec<String>,
        #[arg(long)]
        reduce: Option<String>,
    },
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Usage)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `ravendb --help`."));
            }
        },
    };

    init_tracing();
    command_dispatch::dispatch_command(cli)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr)
        .try_init();
}

fn build_store(cli: &Cli) -> Result<DocumentStore, Error> {
    let mut transport = UreqTransport::new();
    if let Some(seconds) = cli.timeout {
        transport = transport
            .with_timeout(Duration::from_secs(seconds))
            .with_connect_timeout(Duration::from_secs(seconds));
    }
    if let Some(path) = &cli.tls_ca {
        transport = transport.with_tls_ca_file(path)?;
    }
    if cli.tls_skip_verify {
        transport = transport.with_tls_skip_verify();
    }
    let database = cli.database.clone().unwrap_or_default();
    let store = DocumentStore::new(&cli.url, database)
        .map_err(|err| err.with_hint("Pass --url as http(s)://host:port without a path."))?;
    Ok(store.with_executor(Arc::new(HttpExecutor::with_transport(transport))))
}

fn require_database(cli: &Cli) -> Result<(), Error> {
    match cli.database.as_deref() {
        Some(name) if !name.is_empty() => Ok(()),
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message("this command needs a database")
            .with_hint("Pass --database <name>.")),
    }
}

fn parse_json_arg(raw: &str, what: &str) -> Result<Value, Error> {
    serde_json::from_str(raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("{what} is not valid JSON"))
            .with_source(err)
    })
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Request\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Transport => "transport error".to_string(),
        ErrorKind::Decode => "unexpected response body".to_string(),
        kind => format!("request failed ({})", kind.as_str()),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(err.kind().as_str()));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(url) = err.url() {
        inner.insert("url".to_string(), json!(url));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if let Some(server_type) = err.server_type() {
        inner.insert("type".to_string(), json!(server_type));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(status) = err.status() {
        lines.push(format!("status: {status} ({})", err.kind().as_str()));
    }
    if let Some(url) = err.url() {
        lines.push(format!("url: {url}"));
    }
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    for cause in error_causes(err) {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
