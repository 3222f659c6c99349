use anyhow::Context;
use clap::{Parser, Subcommand};
use roomsync_config::load as load_config;
use roomsync_gateway::{create_router, GatewayState};
use roomsync_runtime::{telemetry, BackendServices};
use roomsync_sync::{CreateRoomRequest, DocumentStore, RoomDirectory};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "roomsync")]
#[command(about = "Real-time collaborative document server (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Start the HTTP and WebSocket server
    Serve,
    /// Create a room owned by a user
    CreateRoom {
        #[arg(long)]
        name: String,
        #[arg(long)]
        owner: String,
        /// Let any user join without being a member
        #[arg(long)]
        public: bool,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        language: Option<String>,
    },
    /// List the rooms visible to a user
    ListRooms {
        #[arg(long)]
        user: String,
    },
    /// Print a room, its document and its retained history
    DumpRoom { room_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;
    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(&config, &services).await,
        Commands::CreateRoom {
            name,
            owner,
            public,
            description,
            language,
        } => {
            let mut request = CreateRoomRequest::new(name, owner).public(public);
            if let Some(description) = description {
                request = request.description(description);
            }
            if let Some(language) = language {
                request = request.language(language);
            }
            create_room(&services, request).await
        }
        Commands::ListRooms { user } => list_rooms(&services, &user).await,
        Commands::DumpRoom { room_id } => dump_room(&services, &room_id).await,
    };

    services.shutdown().await;
    result
}

async fn run_server(
    config: &roomsync_config::AppConfig,
    services: &BackendServices,
) -> anyhow::Result<()> {
    info!("starting roomsync server");

    let app = create_router(GatewayState::new(services.engine.clone()));

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(roomsync_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("server shut down");
    Ok(())
}

async fn create_room(services: &BackendServices, request: CreateRoomRequest) -> anyhow::Result<()> {
    let room = services
        .directory
        .create_room(request)
        .await
        .context("failed to create room")?;

    println!("Created room {}", room.id);
    println!("  name:       {}", room.name);
    println!("  owner:      {}", room.owner_id);
    println!("  language:   {}", room.language);
    println!("  visibility: {}", visibility(room.is_public));
    Ok(())
}

async fn list_rooms(services: &BackendServices, user_id: &str) -> anyhow::Result<()> {
    let rooms = services
        .directory
        .list_rooms_for(user_id)
        .await
        .context("failed to list rooms")?;

    if rooms.is_empty() {
        println!("No rooms visible to {user_id}");
        return Ok(());
    }

    println!("Found {} rooms:", rooms.len());
    println!(
        "{:<26} {:<30} {:<15} {:<10} {:<8} {:<25}",
        "ID", "Name", "Owner", "Language", "Members", "Created At"
    );
    println!("{}", "-".repeat(120));
    for room in rooms {
        println!(
            "{:<26} {:<30} {:<15} {:<10} {:<8} {:<25}",
            room.id,
            room.name,
            room.owner_id,
            room.language,
            room.members.len(),
            room.created_at
        );
    }
    Ok(())
}

async fn dump_room(services: &BackendServices, room_id: &str) -> anyhow::Result<()> {
    let room = services
        .directory
        .find_room(room_id)
        .await
        .context("failed to load room")?
        .with_context(|| format!("room {room_id} not found"))?;

    println!("=== ROOM ===");
    println!("{} ({}, {})", room.name, room.id, visibility(room.is_public));
    println!("owner: {}", room.owner_id);
    println!("members: {}", room.members.join(", "));

    let document = services
        .documents
        .load(room_id)
        .await
        .context("failed to load document")?;

    println!("\n=== DOCUMENT ===");
    println!(
        "version {} (last editor: {})",
        document.version,
        document.last_editor.as_deref().unwrap_or("none")
    );
    println!("{}", document.content);

    let history = services
        .documents
        .history(room_id)
        .await
        .context("failed to load history")?;

    println!("\n=== HISTORY ===");
    if history.is_empty() {
        println!("No history recorded");
        return Ok(());
    }
    println!("{:<8} {:<15} {:<25} {:<50}", "Version", "Editor", "Timestamp", "Content (truncated)");
    println!("{}", "-".repeat(100));
    for entry in history {
        println!(
            "{:<8} {:<15} {:<25} {:<50}",
            entry.version,
            entry.editor,
            entry.timestamp,
            truncate(&entry.content, 47)
        );
    }
    Ok(())
}

fn visibility(is_public: bool) -> &'static str {
    if is_public {
        "public"
    } else {
        "private"
    }
}

fn truncate(content: &str, max_chars: usize) -> String {
    let single_line = content.replace('\n', "\\n");
    if single_line.chars().count() > max_chars {
        let head: String = single_line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        single_line
    }
}
