//! prayer-ctl: command-line client for the prayer-guide command API.
//!
//! Sends one HTTP request per invocation and prints the JSON reply.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "prayer-ctl", about = "Control a running prayer-guide-rs")]
struct Args {
    /// Command API base URL
    #[arg(long, default_value = "http://127.0.0.1:8768")]
    api: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the displayed prayer and playback state
    Status,
    /// Reload prompts from the configured source
    Reload,
    /// Pick a new prompt for every category
    Regenerate,
    /// Pick a new prompt for one category
    Refresh { category: String },
    /// Return to the previous prompt for one category
    Back { category: String },
    /// Open, edit or lock a reflection
    Reflect {
        category: String,
        /// Replace the reflection text
        #[arg(long)]
        text: Option<String>,
        /// Lock the reflection for saving
        #[arg(long)]
        lock: bool,
    },
    /// Start narration, or resume if paused
    Play,
    /// Pause or resume narration
    Pause,
    Stop,
    /// Save the displayed prayer
    Save,
    /// Days in a month with saved prayers
    Calendar { year: i32, month: u32 },
    /// Prayers saved on a date (YYYY-MM-DD)
    Day { date: String },
    /// Show one saved prayer
    Recall { date: String, id: String },
    /// Look up a scripture passage
    Scripture { reference: String },
    /// Show settings
    Settings,
    /// Update settings from a JSON object, e.g. '{"pause_secs": 5}'
    Configure { json: String },
    SignIn { user: String },
    SignOut,
}

fn request(client: &Client, base: &str, command: Command) -> Result<RequestBuilder, String> {
    let call = |method: Method, path: &str| client.request(method, format!("{base}{path}"));
    let path_segment = |s: &str| s.replace('%', "%25").replace(' ', "%20").replace('/', "%2F");

    let builder = match command {
        Command::Status => call(Method::GET, "/status"),
        Command::Reload => call(Method::POST, "/reload"),
        Command::Regenerate => call(Method::POST, "/regenerate"),
        Command::Refresh { category } => call(
            Method::POST,
            &format!("/prompts/{}/refresh", path_segment(&category)),
        ),
        Command::Back { category } => call(
            Method::POST,
            &format!("/prompts/{}/back", path_segment(&category)),
        ),
        Command::Reflect {
            category,
            text: Some(text),
            ..
        } => call(
            Method::PUT,
            &format!("/reflections/{}", path_segment(&category)),
        )
        .json(&json!({ "text": text })),
        Command::Reflect {
            category,
            lock: true,
            ..
        } => call(
            Method::POST,
            &format!("/reflections/{}/lock", path_segment(&category)),
        ),
        Command::Reflect { category, .. } => call(
            Method::POST,
            &format!("/reflections/{}/toggle", path_segment(&category)),
        ),
        Command::Play => call(Method::POST, "/play"),
        Command::Pause => call(Method::POST, "/pause"),
        Command::Stop => call(Method::POST, "/stop"),
        Command::Save => call(Method::POST, "/save"),
        Command::Calendar { year, month } => call(Method::GET, &format!("/calendar/{year}/{month}")),
        Command::Day { date } => call(Method::GET, &format!("/sessions/{date}")),
        Command::Recall { date, id } => call(Method::GET, &format!("/sessions/{date}/{id}")),
        Command::Scripture { reference } => {
            call(Method::GET, "/scripture").query(&[("reference", reference)])
        }
        Command::Settings => call(Method::GET, "/settings"),
        Command::Configure { json } => {
            let body: Value =
                serde_json::from_str(&json).map_err(|e| format!("invalid settings JSON: {e}"))?;
            call(Method::PUT, "/settings").json(&body)
        }
        Command::SignIn { user } => call(Method::POST, "/sign-in").json(&json!({ "user": user })),
        Command::SignOut => call(Method::POST, "/sign-out"),
    };
    Ok(builder)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let client = Client::builder()
        .connect_timeout(Duration::from_millis(300))
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new());

    let base = args.api.trim_end_matches('/');
    let builder = match request(&client, base, args.command) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let resp = match builder.send().await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("prayer-guide API unreachable at {base}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    match serde_json::to_string_pretty(&body) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{body}"),
    }

    if status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
