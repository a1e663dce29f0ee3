//! `keelctl`: command-line client for the installer API.
//!
//! - **`routes`**: list every endpoint the schema declares, with its signature.
//! - **`call`**: call one endpoint with named arguments and print the result.
//! - **`watch`**: follow the installer state through `/meta/status` until it
//!   reaches a terminal state.
//!
//! The server address comes from `--url` or `KEEL_URL`.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use keel::{EndpointTable, Method, SchemaError};
use keel_client::{ApiClient, Args, ClientError, HttpTransport};
use keel_installer_api::{installer_table, net_event_table, ApplicationState, ApplicationStatus};
use serde_json::Value;

/// keelctl: installer API client
#[derive(Parser)]
#[command(name = "keelctl", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Api {
    /// The API served by the installer.
    Installer,
    /// The API a client serves to receive network events.
    NetEvent,
}

#[derive(Subcommand)]
enum Command {
    /// Print the endpoint table, one signature per line.
    Routes {
        #[arg(long, value_enum, default_value = "installer")]
        api: Api,

        /// Also print each endpoint's description.
        #[arg(long)]
        docs: bool,
    },

    /// Call one endpoint and print its result as JSON.
    ///
    /// Examples:
    ///   keelctl call GET /meta/status
    ///   keelctl call POST /shutdown --arg mode=REBOOT --arg immediate=true
    ///   keelctl call POST /identity --data identity.json
    Call {
        /// HTTP method: GET | POST | PUT | DELETE
        method: Method,

        /// Endpoint path, e.g. /storage/guided
        path: String,

        /// A named argument as NAME=VALUE. VALUE is JSON; anything that does
        /// not parse as JSON is sent as a string. Repeatable.
        #[arg(long = "arg", value_name = "NAME=VALUE", value_parser = parse_arg)]
        args: Vec<(String, Value)>,

        /// JSON file for the endpoint's body parameter, or `-` for stdin.
        #[arg(long, value_name = "FILE")]
        data: Option<PathBuf>,

        #[command(flatten)]
        server: Server,
    },

    /// Print each installer state change until the install finishes or fails.
    Watch {
        #[command(flatten)]
        server: Server,
    },
}

#[derive(clap::Args)]
struct Server {
    /// Base URL of the server.
    #[arg(long, env = "KEEL_URL", default_value = "http://127.0.0.1:7777")]
    url: String,

    /// Give up on a request after this many seconds. Long polls wait
    /// indefinitely when unset.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

impl Server {
    fn client(&self, table: EndpointTable) -> ApiClient {
        let transport = match self.timeout {
            Some(secs) => HttpTransport::with_timeout(&self.url, Duration::from_secs(secs)),
            None => HttpTransport::new(&self.url),
        }
        .unwrap_or_else(|e| fatal(&e.to_string()));
        ApiClient::new(Arc::new(table), transport)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Routes { api, docs } => {
            let table = load(api);
            for entry in table.iter() {
                println!("{}", entry.signature());
                if docs {
                    if let Some(doc) = &entry.doc {
                        println!("    {doc}");
                    }
                }
            }
        }

        Command::Call {
            method,
            path,
            args,
            data,
            server,
        } => {
            let client = server.client(load(Api::Installer));
            let stub = client.stub(method, &path).unwrap_or_else(|e| fatal(&e.to_string()));

            let mut call_args = Args::new();
            for (name, value) in args {
                call_args = call_args.json(name, value);
            }
            if let Some(file) = data {
                let Some(body) = stub.entry().body_param() else {
                    fatal(&format!("{method} {path} takes no body"));
                };
                let value = serde_json::from_str(&read_input(&file))
                    .unwrap_or_else(|e| fatal(&format!("invalid JSON in {}: {e}", file.display())));
                call_args = call_args.json(body.name.clone(), value);
            }

            match stub.call_json(call_args).await {
                Ok(Value::Null) => {}
                Ok(value) => print_json(&value),
                Err(e) => fail(&e),
            }
        }

        Command::Watch { server } => {
            let client = server.client(load(Api::Installer));
            let stub = client
                .stub(Method::Get, "/meta/status")
                .unwrap_or_else(|e| fatal(&e.to_string()));

            let mut current: Option<ApplicationState> = None;
            loop {
                let args = Args::new().with("cur", current);
                let status: ApplicationStatus = match stub.call(args).await {
                    Ok(status) => status,
                    Err(e) => fail(&e),
                };
                println!("{}", state_name(status.state));
                if status.state.is_terminal() {
                    if let Some(report) = status.error {
                        eprintln!("keelctl: installer failed, error report {}", report.id);
                        process::exit(1);
                    }
                    break;
                }
                current = Some(status.state);
            }
        }
    }
}

fn load(api: Api) -> EndpointTable {
    let table: Result<EndpointTable, SchemaError> = match api {
        Api::Installer => installer_table(),
        Api::NetEvent => net_event_table(),
    };
    table.unwrap_or_else(|e| fatal(&format!("schema is invalid: {e}")))
}

fn state_name(state: ApplicationState) -> String {
    match serde_json::to_value(state) {
        Ok(Value::String(name)) => name,
        _ => format!("{state:?}"),
    }
}

/// Parse `NAME=VALUE`, taking VALUE as JSON when it parses and as a string
/// otherwise.
fn parse_arg(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))?;
    if name.is_empty() {
        return Err(format!("missing argument name in {raw:?}"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => fatal(&format!("could not print result: {e}")),
    }
}

/// Read the full contents of a file, or stdin when the path is `"-"`.
fn read_input(path: &PathBuf) -> String {
    if path.to_str() == Some("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .unwrap_or_else(|e| fatal(&format!("failed to read stdin: {}", e)));
        buf
    } else {
        fs::read_to_string(path)
            .unwrap_or_else(|e| fatal(&format!("failed to read {}: {}", path.display(), e)))
    }
}

/// Report a failed call and exit with code 1.
fn fail(err: &ClientError) -> ! {
    match err {
        ClientError::Api { kind, .. } => eprintln!("keelctl: {kind}: {}", err.user_message()),
        _ => eprintln!("keelctl: {}", err.user_message()),
    }
    if let Some(report) = err.report() {
        eprintln!("keelctl: error report {}", report.id);
    }
    process::exit(1);
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("keelctl: {}", msg);
    process::exit(2);
}
