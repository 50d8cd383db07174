use std::{
    io::{self, BufRead, Write},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use vidqa_core::{
    ApiClient, ClientConfig, ErrorKind, FileSessionStore, PollPolicy, QuestionFlow, Route, Router,
    Session, TranscriptionFlow, VidqaError, format_history, format_video_details,
    format_video_line, poll_until_complete, video, video_library,
};

use crate::render::render_markup;

mod render;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

#[derive(Parser)]
#[command(name = "vidqa")]
#[command(about = "Transcribe YouTube videos and ask questions about them")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend address (overrides VIDQA_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Print raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// Log requests to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session token
    Login {
        #[arg(short, long)]
        username: Option<String>,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// End the session (always clears the local token)
    Logout,
    /// Submit a video URL and wait for its transcript
    Transcribe {
        /// Watch URL, e.g. https://youtube.com/watch?v=...
        url: String,
        /// Return right after submitting
        #[arg(long)]
        no_wait: bool,
    },
    /// Show transcription status for a video
    Status {
        video_id: String,
        /// Keep polling until the transcript is ready
        #[arg(short, long)]
        wait: bool,
    },
    /// Ask a question about a transcribed video
    Ask {
        video_id: String,
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Questions previously asked about a video
    History { video_id: String },
    /// Videos you have submitted
    Videos,
    /// Details for one video
    Video { video_id: String },
}

impl Command {
    fn route(&self) -> Option<Route> {
        match self {
            Command::Login { .. } => Some(Route::Login),
            Command::Register { .. } => Some(Route::Register),
            Command::Logout => None,
            _ => Some(Route::Home),
        }
    }
}

struct App {
    client: ApiClient,
    router: Arc<Router>,
    policy: PollPolicy,
    json: bool,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .expect("valid spinner template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vidqa={level},vidqa_core={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn password_or_prompt(password: Option<String>) -> io::Result<String> {
    match password {
        Some(password) => Ok(password),
        None => rpassword::prompt_password("Password: "),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn success(msg: impl std::fmt::Display) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Cancelled on Ctrl-C or when the returned guard drops with the view.
fn view_cancellation() -> (CancellationToken, tokio_util::sync::DropGuard) {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = on_interrupt.cancelled() => {}
            _ = tokio::signal::ctrl_c() => on_interrupt.cancel(),
        }
    });
    (cancel.clone(), cancel.drop_guard())
}

impl App {
    async fn run(&self, command: Command) -> Result<()> {
        if let Some(requested) = command.route() {
            let shown = self.router.navigate(requested);
            if shown != requested {
                return self.redirected(requested, shown);
            }
        }

        match command {
            Command::Login { username, password } => self.login(username, password).await,
            Command::Register {
                username,
                email,
                password,
            } => self.register(&username, &email, password).await,
            Command::Logout => self.logout().await,
            Command::Transcribe { url, no_wait } => self.transcribe(&url, no_wait).await,
            Command::Status { video_id, wait } => self.status(&video_id, wait).await,
            Command::Ask { video_id, question } => self.ask(&video_id, &question.join(" ")).await,
            Command::History { video_id } => self.history(&video_id).await,
            Command::Videos => self.videos().await,
            Command::Video { video_id } => self.video(&video_id).await,
        }
    }

    fn redirected(&self, requested: Route, shown: Route) -> Result<()> {
        match shown {
            Route::Login => {
                show_login_hint();
                Err(VidqaError::NotAuthenticated.into())
            }
            Route::Home if requested == Route::Login => {
                success("Already logged in. Run `vidqa logout` to switch accounts.");
                Ok(())
            }
            _ => {
                println!(
                    "{}",
                    style("Log out before creating another account.").yellow()
                );
                Ok(())
            }
        }
    }

    async fn login(&self, username: Option<String>, password: Option<String>) -> Result<()> {
        let username = match username {
            Some(username) => username,
            None => prompt("Username: ")?,
        };
        let password = password_or_prompt(password)?;

        let spinner = create_spinner("Logging in...");
        let result = self.client.login(&username, &password).await;
        spinner.finish_and_clear();
        result?;

        self.router.navigate(Route::Home);
        success(format!("Logged in as {}", style(&username).cyan()));
        Ok(())
    }

    async fn register(&self, username: &str, email: &str, password: Option<String>) -> Result<()> {
        let password = password_or_prompt(password)?;

        let spinner = create_spinner("Creating account...");
        let result = self.client.register(username, email, &password).await;
        spinner.finish_and_clear();
        let account = result?;

        if self.json {
            return print_json(&account);
        }
        self.router.navigate(Route::Login);
        success(
            account
                .message
                .unwrap_or_else(|| format!("Account {} created", username)),
        );
        println!("{}", style("Run `vidqa login` to sign in.").dim());
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.client.logout().await?;
        self.router.navigate(Route::Login);
        success("Logged out");
        Ok(())
    }

    async fn transcribe(&self, url: &str, no_wait: bool) -> Result<()> {
        let mut flow = TranscriptionFlow::new(self.client.clone(), self.policy);

        let spinner = create_spinner("Submitting video...");
        let submitted = flow.submit(url).await;
        spinner.finish_and_clear();
        let submission = submitted?;

        success(format!(
            "Submitted {} {}",
            style(&submission.video_id).cyan(),
            style(submission.ack.message.as_deref().unwrap_or("")).dim()
        ));
        if no_wait {
            return Ok(());
        }

        let started = Instant::now();
        let (cancel, _guard) = view_cancellation();
        let spinner = create_spinner("Waiting for transcript...");
        let result = flow
            .wait(&cancel, |status| {
                spinner.set_message(format!(
                    "Transcribing {} ({})",
                    submission.video_id,
                    status.status.as_str()
                ));
            })
            .await;
        spinner.finish_and_clear();
        let status = result?;

        if self.json {
            return print_json(&status);
        }
        success(format!(
            "Transcript ready {}",
            style(format!("[{}]", format_duration(started.elapsed()))).dim()
        ));
        println!(
            "{}",
            style(format!(
                "Ask away: vidqa ask {} \"your question\"",
                submission.video_id
            ))
            .dim()
        );
        Ok(())
    }

    async fn status(&self, video_id: &str, wait: bool) -> Result<()> {
        let status = if wait {
            let (cancel, _guard) = view_cancellation();
            let spinner = create_spinner(&format!("Checking {}...", video_id));
            let result = poll_until_complete(&self.client, video_id, self.policy, &cancel, |s| {
                spinner.set_message(format!("{} is {}", video_id, s.status.as_str()))
            })
            .await;
            spinner.finish_and_clear();
            result?
        } else {
            self.client.transcription_status(video_id).await?
        };

        if self.json {
            return print_json(&status);
        }
        println!(
            "{} {}",
            style(video_id).cyan(),
            style(status.status.as_str()).yellow()
        );
        Ok(())
    }

    async fn ask(&self, video_id: &str, question: &str) -> Result<()> {
        let flow = QuestionFlow::new(self.client.clone(), video_id);

        let spinner = create_spinner("Thinking...");
        let result = flow.ask(question).await;
        spinner.finish_and_clear();
        let (answer, history) = result?;

        if self.json {
            return print_json(&answer);
        }
        println!("{}", style("─".repeat(60)).dim());
        print!("{}", render_markup(&answer.answer));
        println!("{}", style("─".repeat(60)).dim());
        println!(
            "{}",
            style(format!("{} questions in history", history.len())).dim()
        );
        Ok(())
    }

    async fn history(&self, video_id: &str) -> Result<()> {
        let flow = QuestionFlow::new(self.client.clone(), video_id);

        let spinner = create_spinner("Loading history...");
        let result = flow.history().await;
        spinner.finish_and_clear();
        let history = result?;

        if self.json {
            return print_json(&history);
        }
        print!("{}", render_markup(&format_history(&history)));
        Ok(())
    }

    async fn videos(&self) -> Result<()> {
        let spinner = create_spinner("Loading videos...");
        let result = video_library(&self.client, true).await;
        spinner.finish_and_clear();
        let videos = result?;

        if self.json {
            return print_json(&videos);
        }
        if videos.is_empty() {
            println!("{}", style("No videos yet. Try `vidqa transcribe <url>`.").dim());
        }
        for video in &videos {
            println!("{}", format_video_line(video));
        }
        Ok(())
    }

    async fn video(&self, video_id: &str) -> Result<()> {
        let spinner = create_spinner("Loading video...");
        let result = video(&self.client, video_id, true).await;
        spinner.finish_and_clear();
        let video = result?;

        if self.json {
            return print_json(&video);
        }
        print!("{}", render_markup(&format_video_details(&video)));
        Ok(())
    }
}

fn show_login_hint() {
    println!(
        "{} {}",
        style(Route::Login.path()).dim(),
        style("Run `vidqa login` to sign in.").yellow()
    );
}

/// Apply the error policy: one notification, or the login view on expiry.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<VidqaError>() {
        Some(e) if e.kind() == ErrorKind::SessionExpired => show_login_hint(),
        Some(VidqaError::NotAuthenticated) => {}
        Some(e) => {
            if let Some(msg) = e.notification() {
                eprintln!("{} {}", style("Error:").red().bold(), msg);
            }
            tracing::debug!(error = %e, "command failed");
        }
        None => eprintln!("{} {:#}", style("Error:").red().bold(), err),
    }
}

fn build_app(cli: &Cli) -> Result<App> {
    let mut config = ClientConfig::load()?;
    if let Some(url) = &cli.api_url {
        config.base_url = url.clone();
    }
    tracing::debug!(base_url = config.base_url(), "configuration loaded");

    let session = Arc::new(Session::restore(FileSessionStore::new(config.session_path())));
    let router = Arc::new(Router::new(Arc::clone(&session)));
    let client = ApiClient::new(&config, session, router.clone())?;

    Ok(App {
        client,
        router,
        policy: PollPolicy::from(&config),
        json: cli.json,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match build_app(&cli) {
        Ok(app) => app.run(cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        report(&e);
        std::process::exit(1);
    }
    Ok(())
}
