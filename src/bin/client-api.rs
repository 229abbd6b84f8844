use std::error::Error;
use std::io::{IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use api_mux::client::settings::{infer_name, resolve, Settings, SettingsError, Sources};
use api_mux::client::{Client, Payload, RawResponse};
use axum::http::{HeaderMap, Method};
use clap::Parser;
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(name = "client-api", version)]
#[command(about = "Send a request to a JSON API and print the response")]
#[command(override_usage = "client-api [options] METHOD /endpoint [body]")]
struct Cli {
    /// API URL
    #[arg(long)]
    api: Option<String>,

    /// API key or token
    #[arg(long)]
    token: Option<String>,

    /// Header used to send the token (default "Authorization")
    #[arg(long)]
    header: Option<String>,

    /// Word sent in the header before the token (default "Bearer")
    #[arg(long)]
    token_prefix: Option<String>,

    /// Query parameter used to send the token (eg, "private_token")
    #[arg(long)]
    token_param: Option<String>,

    /// Connect through this unix socket
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Origin header for websocket connections
    #[arg(long)]
    origin: Option<String>,

    /// Name of this service (default: inferred from "<name>-api")
    #[arg(long)]
    name: Option<String>,

    /// Show headers sent and received
    #[arg(short, long)]
    verbose: bool,

    /// Read the request body from stdin
    #[arg(short, long)]
    stdin: bool,

    /// GET, POST, PUT, DELETE, ... or WS for a websocket
    method: String,

    endpoint: String,

    body: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let program = std::env::args().next().unwrap_or_default();
    let name = cli
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .or_else(|| infer_name(&program));

    let flags = Settings {
        api: cli.api.clone(),
        token: cli.token.clone(),
        header: cli.header.clone(),
        token_prefix: cli.token_prefix.clone(),
        token_param: cli.token_param.clone(),
    };
    let settings = resolve(name.as_deref(), flags, &Sources::system())?;

    let agent = match &name {
        Some(name) => format!("{name}-api"),
        None => "client-api".to_owned(),
    };
    let mut client = settings
        .client()
        .with_user_agent(format!("{agent}/{} (api-mux)", env!("CARGO_PKG_VERSION")));
    if let Some(socket) = &cli.socket {
        client = client.with_unix_socket(socket);
    }
    if let Some(origin) = &cli.origin {
        client = client.with_websocket_origin(origin.as_str());
    }

    let body = match (cli.stdin, cli.body) {
        (true, Some(_)) => return Err(SettingsError::StdinWithBody.into()),
        (true, None) => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .map_err(SettingsError::Stdin)?;
            body
        }
        (false, body) => body.unwrap_or_default(),
    };

    if cli.method.eq_ignore_ascii_case("WS") {
        return websocket(&client, &cli.endpoint).await;
    }

    let method = Method::from_bytes(cli.method.as_bytes())?;
    let payload = if body.is_empty() {
        Payload::None
    } else {
        Payload::raw(body)
    };
    let response = client.send(method.clone(), &cli.endpoint, payload).await?;

    if cli.verbose {
        let (url, headers) = client.url_and_headers(&cli.endpoint)?;
        println!("> {method} {url}");
        print_headers("> ", &headers);
        println!();
        println!("{:?} {}", response.version, response.status);
        print_headers("", &response.headers);
        println!();
    }

    print_body(&response)?;
    Ok(())
}

fn print_headers(prefix: &str, headers: &HeaderMap) {
    for (name, value) in headers {
        println!("{prefix}{name}: {}", String::from_utf8_lossy(value.as_bytes()));
    }
}

fn print_body(response: &RawResponse) -> Result<(), Box<dyn Error>> {
    let mut stdout = std::io::stdout().lock();
    let is_json = response.content_type().as_deref() == Some("application/json");
    if stdout.is_terminal() && is_json {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&response.body) {
            writeln!(stdout, "{}", serde_json::to_string_pretty(&value)?)?;
            return Ok(());
        }
    }
    stdout.write_all(&response.body)?;
    stdout.flush()?;
    Ok(())
}

async fn websocket(client: &Client, endpoint: &str) -> Result<(), Box<dyn Error>> {
    let mut ws = client.ws(endpoint).await?;
    // messages are printed as received, one per line
    while let Some(Ok(message)) = ws.next().await {
        match message {
            Message::Text(text) => println!("{}", text.as_str()),
            Message::Binary(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}
