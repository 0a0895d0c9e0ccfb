//! AlumniBridge command-line client.
//!
//! Signs in against the backend, manages connections and event registrations,
//! and opens an interactive chat with live delivery over STOMP/WebSocket.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin alumnibridge-client -- login alice@example.com --password secret1
//! cargo run --bin alumnibridge-client -- network --search rust --sort batch
//! cargo run --bin alumnibridge-client -- events create --title Meetup --date 2025-12-10 --time 18:00 --location "Hall A"
//! cargo run --bin alumnibridge-client -- chat --user 9
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use rustyline::DefaultEditor;

use alumnibridge_client::{
    api::{ApiClient, DirectoryApi},
    config::{ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_SESSION_FILE, DEFAULT_WS_URL},
    domain::{
        EventId, RequestId, Role, UserId,
        connection::SortKey,
        validation::{EventForm, RegistrationForm},
    },
    error::ClientError,
    live::{LiveChannelConfig, LiveLink},
    navigation::{LoggingNavigator, Navigator},
    session::SessionStorage,
    ui::{Formatter, run_chat_session},
    usecase::{AuthUseCase, ChatTimers, ChatView, EventsView, NetworkView, RequestTab},
};
use alumnibridge_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};

#[derive(Parser, Debug)]
#[command(name = "alumnibridge-client")]
#[command(about = "AlumniBridge client: connections, events and direct messaging", long_about = None)]
struct Args {
    /// Base URL of the backend API
    #[arg(long, default_value = DEFAULT_API_BASE_URL, global = true)]
    api_url: String,

    /// WebSocket URL of the live messaging channel
    #[arg(long, default_value = DEFAULT_WS_URL, global = true)]
    ws_url: String,

    /// File the session is persisted in
    #[arg(long, default_value = DEFAULT_SESSION_FILE, global = true)]
    session_file: PathBuf,

    /// Chat polling interval in seconds
    #[arg(long, default_value_t = 5, global = true)]
    poll_secs: u64,

    /// Disable the live channel and rely on polling only
    #[arg(long, global = true)]
    no_live: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        email: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Defaults to the password
        #[arg(long)]
        confirm_password: Option<String>,
        /// STUDENT or ALUMNI
        #[arg(long)]
        role: String,
        #[arg(long)]
        institute: Option<String>,
        #[arg(long)]
        batch_year: Option<i32>,
        #[arg(long)]
        degree: Option<String>,
    },
    /// Clear the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show people, connections and requests
    Network {
        #[arg(short, long, default_value_t = String::new())]
        search: String,
        /// name, name-desc, batch, batch-asc, degree or role
        #[arg(long, default_value = "name")]
        sort: SortKey,
        #[arg(long, value_enum, default_value_t = NetworkTab::Browse)]
        tab: NetworkTab,
    },
    /// Send a connection request
    Connect { user_id: UserId },
    /// Accept a received request
    Accept { request_id: i64 },
    /// Reject a received request
    Reject { request_id: i64 },
    /// Cancel a sent request to a user
    Cancel { user_id: UserId },
    /// Remove an accepted connection
    Disconnect { user_id: UserId },
    /// List active events, or manage them
    Events {
        #[command(subcommand)]
        command: Option<EventsCommand>,
    },
    /// Register for an event
    Register { event_id: i64 },
    /// Cancel an event registration
    Unregister { event_id: i64 },
    /// Open the interactive chat
    Chat {
        /// Pre-select the conversation with this user
        #[arg(short, long)]
        user: Option<UserId>,
    },
    /// Batches and degrees
    Directory {
        #[command(subcommand)]
        command: DirectoryCommand,
    },
}

#[derive(Subcommand, Debug)]
enum DirectoryCommand {
    Batches,
    Degrees,
    /// Members of a batch
    Batch { batch_id: i64 },
}

#[derive(Subcommand, Debug)]
enum EventsCommand {
    /// List active events
    List,
    /// Create an event
    Create(EventArgs),
    /// Replace the details of an event
    Update {
        event_id: i64,
        #[command(flatten)]
        details: EventArgs,
    },
    /// Delete an event
    Delete { event_id: i64 },
}

#[derive(clap::Args, Debug)]
struct EventArgs {
    #[arg(long)]
    title: String,
    /// YYYY-MM-DD
    #[arg(long)]
    date: String,
    /// HH:MM
    #[arg(long)]
    time: String,
    #[arg(long)]
    location: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    organizer: Option<String>,
    /// Defaults to 100 seats
    #[arg(long)]
    capacity: Option<u32>,
    /// Hide the event from the active list
    #[arg(long)]
    inactive: bool,
}

impl From<EventArgs> for EventForm {
    fn from(args: EventArgs) -> Self {
        Self {
            title: args.title,
            description: args.description,
            date: args.date,
            time: args.time,
            location: args.location,
            organizer: args.organizer,
            capacity: args.capacity,
            is_active: !args.inactive,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum NetworkTab {
    Browse,
    Connections,
    Received,
    Sent,
}

/// Dependencies shared by every subcommand
struct App {
    config: ClientConfig,
    api: Arc<ApiClient>,
    auth: AuthUseCase,
    clock: Arc<dyn Clock>,
}

impl App {
    fn new(args: &Args) -> Self {
        let mut config = ClientConfig::for_backend(&args.api_url, &args.ws_url);
        config.session_file = args.session_file.clone();
        config.poll_interval = Duration::from_secs(args.poll_secs.max(1));
        config.live_channel = !args.no_live;

        let storage = SessionStorage::file(&config.session_file);
        let navigator: Arc<dyn Navigator> = Arc::new(LoggingNavigator);
        let api = Arc::new(ApiClient::new(&config, storage.clone(), navigator.clone()));
        let auth = AuthUseCase::new(api.clone(), api.clone(), storage, navigator);
        Self {
            config,
            api,
            auth,
            clock: Arc::new(SystemClock),
        }
    }

    fn network_view(&self) -> NetworkView {
        NetworkView::new(self.api.clone(), self.api.clone())
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let app = App::new(&args);

    if let Err(e) = run(&app, args.command).await {
        tracing::error!("Client error: {}", e);
        print!("{}", Formatter::format_alert(&e.user_message()));
        std::process::exit(1);
    }
}

async fn run(app: &App, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => read_line("Password: ")?,
            };
            let session = app.auth.login(&email, &password).await?;
            let name = app.auth.display_name().await;
            print!(
                "{}",
                Formatter::format_notice(&format!("Signed in as {} ({})", name, session.role))
            );
        }
        Command::Signup {
            name,
            email,
            password,
            confirm_password,
            role,
            institute,
            batch_year,
            degree,
        } => {
            let form = RegistrationForm {
                name,
                email,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
                role: Role::parse(&role),
                institute,
                batch_year,
                degree_name: degree,
            };
            let session = app.auth.register(&form).await?;
            print!(
                "{}",
                Formatter::format_notice(&format!("Account created ({})", session.role))
            );
        }
        Command::Logout => {
            app.auth.logout()?;
            print!("{}", Formatter::format_notice("Signed out"));
        }
        Command::Whoami => {
            let session = app.auth.require_auth()?;
            let name = app.auth.display_name().await;
            println!("{} [{}] {}", name, session.user_id, session.role);
        }
        Command::Network { search, sort, tab } => {
            app.auth.require_auth()?;
            let view = app.network_view();
            view.set_search(search).await;
            view.set_sort(sort).await;
            // Partial failures are reported through the alert
            view.refresh().await?;
            let state = view.snapshot().await;

            print!("{}", Formatter::format_badges(&state.badges()));
            if let Some(alert) = &state.alert {
                print!("{}", Formatter::format_alert(alert));
            }
            let now = app.clock.now();
            match tab {
                NetworkTab::Browse => print_cards(&state.cards()),
                NetworkTab::Connections => print_cards(&state.connection_cards()),
                NetworkTab::Received => {
                    for request in state.requests(RequestTab::Received) {
                        print!("{}", Formatter::format_request(request, RequestTab::Received, now));
                    }
                }
                NetworkTab::Sent => {
                    for request in state.requests(RequestTab::Sent) {
                        print!("{}", Formatter::format_request(request, RequestTab::Sent, now));
                    }
                }
            }
        }
        Command::Connect { user_id } => {
            app.auth.require_auth()?;
            let view = app.network_view();
            view.send_request(user_id).await?;
            print_network_notice(&view).await;
        }
        Command::Accept { request_id } => respond(app, RequestId(request_id), true).await?,
        Command::Reject { request_id } => respond(app, RequestId(request_id), false).await?,
        Command::Cancel { user_id } => {
            app.auth.require_auth()?;
            let view = app.network_view();
            view.cancel_request(user_id).await?;
            print_network_notice(&view).await;
        }
        Command::Disconnect { user_id } => {
            app.auth.require_auth()?;
            let view = app.network_view();
            view.disconnect(user_id).await?;
            print_network_notice(&view).await;
        }
        Command::Events { command } => {
            app.auth.require_auth()?;
            let view = EventsView::new(app.api.clone());
            let now = app.clock.now();
            match command.unwrap_or(EventsCommand::List) {
                EventsCommand::List => {
                    view.load().await?;
                    print_event_board(&view, now).await;
                }
                EventsCommand::Create(details) => {
                    let created = view.create(&details.into()).await?;
                    print_event_outcome(&view, Some(created), now).await;
                }
                EventsCommand::Update { event_id, details } => {
                    let updated = view.update(EventId(event_id), &details.into()).await?;
                    print_event_outcome(&view, Some(updated), now).await;
                }
                EventsCommand::Delete { event_id } => {
                    view.delete(EventId(event_id)).await?;
                    print_event_outcome(&view, None, now).await;
                }
            }
        }
        Command::Register { event_id } => {
            app.auth.require_auth()?;
            let view = EventsView::new(app.api.clone());
            view.load().await?;
            let updated = view.register(EventId(event_id)).await?;
            print_event_outcome(&view, updated, app.clock.now()).await;
        }
        Command::Unregister { event_id } => {
            app.auth.require_auth()?;
            let view = EventsView::new(app.api.clone());
            view.load().await?;
            let updated = view.unregister(EventId(event_id)).await?;
            print_event_outcome(&view, updated, app.clock.now()).await;
        }
        Command::Chat { user } => {
            let session = app.auth.require_auth()?;
            let live = app.config.live_channel.then(|| {
                LiveLink::start(LiveChannelConfig {
                    url: app.config.ws_url.clone(),
                    token: session.token.clone(),
                    user_id: session.user_id,
                    policy: app.config.reconnect,
                })
            });
            let view = ChatView::mount(
                app.api.clone(),
                session.user_id,
                ChatTimers::from(&app.config),
                live,
                user,
            )
            .await?;
            run_chat_session(view, app.clock.clone()).await?;
        }
        Command::Directory { command } => {
            app.auth.require_auth()?;
            match command {
                DirectoryCommand::Batches => {
                    print!("{}", Formatter::format_batches(&app.api.batches().await?));
                }
                DirectoryCommand::Degrees => {
                    print!("{}", Formatter::format_degrees(&app.api.degrees().await?));
                }
                DirectoryCommand::Batch { batch_id } => {
                    let members = app.api.batch_members(batch_id).await?;
                    if members.is_empty() {
                        println!("(No members)");
                    }
                    for person in &members {
                        print!("{}", Formatter::format_person_summary(person));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Accept or reject a received request, looked up by its id
async fn respond(app: &App, request_id: RequestId, accept: bool) -> Result<(), ClientError> {
    app.auth.require_auth()?;
    let view = app.network_view();
    view.refresh().await?;
    let state = view.snapshot().await;
    let Some(request) = state
        .requests(RequestTab::Received)
        .iter()
        .find(|request| request.id == request_id)
    else {
        print!(
            "{}",
            Formatter::format_alert(&format!("No received request #{}", request_id))
        );
        return Ok(());
    };

    let sender_id = request.sender.id;
    if accept {
        view.accept_request(request_id, sender_id).await?;
    } else {
        view.reject_request(request_id, sender_id).await?;
    }
    print_network_notice(&view).await;
    Ok(())
}

fn print_cards(cards: &[alumnibridge_client::usecase::PersonCard]) {
    if cards.is_empty() {
        println!("(No people found)");
    }
    for card in cards {
        print!("{}", Formatter::format_person_card(card));
    }
}

async fn print_network_notice(view: &NetworkView) {
    let state = view.snapshot().await;
    if let Some(notice) = &state.notice {
        print!("{}", Formatter::format_notice(notice));
    }
    if let Some(alert) = &state.alert {
        print!("{}", Formatter::format_alert(alert));
    }
}

async fn print_event_board(view: &EventsView, now: chrono::DateTime<chrono::Utc>) {
    let state = view.snapshot().await;
    if state.board.events().is_empty() {
        println!("(No upcoming events)");
    }
    for event in state.board.events() {
        print!("{}", Formatter::format_event(event, now));
    }
}

async fn print_event_outcome(
    view: &EventsView,
    updated: Option<alumnibridge_client::domain::Event>,
    now: chrono::DateTime<chrono::Utc>,
) {
    let state = view.snapshot().await;
    if let Some(notice) = &state.notice {
        print!("{}", Formatter::format_notice(notice));
    }
    if let Some(alert) = &state.alert {
        print!("{}", Formatter::format_alert(alert));
    }
    if let Some(event) = updated {
        print!("{}", Formatter::format_event(&event, now));
    }
}

/// Read one line from the terminal
fn read_line(prompt: &str) -> Result<String, ClientError> {
    let mut rl = DefaultEditor::new().map_err(|e| ClientError::Terminal(e.to_string()))?;
    rl.readline(prompt)
        .map(|line| line.trim().to_string())
        .map_err(|e| ClientError::Terminal(e.to_string()))
}
