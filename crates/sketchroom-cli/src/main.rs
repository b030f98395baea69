//! SketchRoom command-line client.
//!
//! Joins rooms headlessly: follow a room, draw a shape into it, or inspect
//! and clear the locally stored snapshot.

use clap::{Parser, Subcommand};
use kurbo::{Point, Size};
use sketchroom_core::storage::{FileStorage, create_default_storage};
use sketchroom_core::sync::NativeWebSocket;
use sketchroom_core::{
    ClientConfig, Connection, ConnectionState, HttpHistoryFetcher, RoomSession, SnapshotStore,
    ToolKind,
};
use sketchroom_render::{DisplayList, RenderContext, Renderer};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const PUMP_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "sketchroom", version, about = "Headless client for SketchRoom rooms")]
struct Cli {
    /// JSON config file (SKETCHROOM_* environment variables otherwise)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding room snapshots
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a room and log every change
    Watch {
        #[arg(long)]
        room: String,
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Draw one shape into a room
    Draw {
        #[arg(long)]
        room: String,
        #[arg(long, default_value = "circle")]
        tool: ToolKind,
        /// Press position, as `x,y`
        #[arg(long, value_parser = parse_point)]
        from: Point,
        /// Release position, as `x,y`
        #[arg(long, value_parser = parse_point)]
        to: Point,
        /// How long to stay connected so peers receive the shape
        #[arg(long, default_value_t = 500)]
        linger_ms: u64,
    },
    /// Print the stored snapshot as JSON
    Show {
        #[arg(long)]
        room: String,
        /// Print an SVG rendering instead
        #[arg(long)]
        svg: bool,
        #[arg(long, default_value_t = 800.0)]
        width: f64,
        #[arg(long, default_value_t = 600.0)]
        height: f64,
    },
    /// Delete the stored snapshot
    Clear {
        #[arg(long)]
        room: String,
    },
    /// List rooms with a stored snapshot
    List,
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got {s:?}"))?;
    let coord = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate {v:?}: {e}"))
    };
    Ok(Point::new(coord(x)?, coord(y)?))
}

fn load_config(cli: &Cli) -> Result<ClientConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ClientConfig::from_env(),
    };
    if let Some(dir) = &cli.storage_dir {
        config.storage_dir = Some(dir.clone());
    }
    Ok(config)
}

fn open_storage(config: &ClientConfig) -> Result<FileStorage, Box<dyn Error>> {
    let storage = match &config.storage_dir {
        Some(dir) => FileStorage::new(dir.clone())?,
        None => create_default_storage()?,
    };
    log::debug!("Snapshots stored in {}", storage.base_path().display());
    Ok(storage)
}

/// Open the room view and start connecting to the relay.
async fn join(
    config: &ClientConfig,
    room: &str,
    tool: ToolKind,
    store: Arc<FileStorage>,
) -> Result<(RoomSession<FileStorage>, NativeWebSocket), Box<dyn Error>> {
    let history = HttpHistoryFetcher::new(config.http_backend_url()?);
    let session = RoomSession::open(room, config.credential(), tool, store, &history).await;

    let mut conn = NativeWebSocket::new();
    conn.connect(config.ws_url_with_token()?.as_str())?;
    Ok((session, conn))
}

async fn watch(
    config: &ClientConfig,
    room: &str,
    store: Arc<FileStorage>,
    seconds: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let (mut session, mut conn) = join(config, room, ToolKind::default(), store).await?;
    log::info!("Watching room {} ({} shapes)", room, session.snapshot().len());

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    let mut interval = tokio::time::interval(PUMP_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            _ = interval.tick() => {}
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break Ok(());
        }

        session.pump(&mut conn);
        if session.take_redraw() {
            log::info!("Room {} now has {} shapes", room, session.snapshot().len());
        }
        if conn.state() == ConnectionState::Error {
            break Err("connection to relay failed".into());
        }
    };

    session.close();
    conn.disconnect();
    result
}

async fn draw(
    config: &ClientConfig,
    room: &str,
    tool: ToolKind,
    (from, to): (Point, Point),
    store: Arc<FileStorage>,
    linger: Duration,
) -> Result<(), Box<dyn Error>> {
    let (mut session, mut conn) = join(config, room, tool, store).await?;

    let before = session.snapshot().len();
    session.press(from);
    session.drag(to);
    session.release(to);
    let drawn = &session.shapes()[before..];
    for shape in drawn {
        println!("{}", shape.to_json()?);
    }

    // Keep pumping so the broadcast goes out and joiners get caught up
    let deadline = Instant::now() + linger;
    let mut interval = tokio::time::interval(PUMP_INTERVAL);
    while Instant::now() < deadline {
        interval.tick().await;
        session.pump(&mut conn);
        if conn.state() == ConnectionState::Error {
            log::warn!("Relay unreachable; shape kept locally only");
            break;
        }
    }

    session.close();
    conn.disconnect();
    Ok(())
}

fn show(store: &FileStorage, room: &str, svg: bool, size: Size) -> Result<(), Box<dyn Error>> {
    let snapshot = store.load_snapshot(room).unwrap_or_default();
    if svg {
        let mut list = DisplayList::new();
        list.build_scene(&RenderContext::new(snapshot.shapes(), size));
        println!("{}", list.to_svg()?);
    } else {
        println!("{}", snapshot.to_json()?);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let store = Arc::new(open_storage(&config)?);

    match cli.command {
        Commands::Watch { room, seconds } => watch(&config, &room, store, seconds).await,
        Commands::Draw {
            room,
            tool,
            from,
            to,
            linger_ms,
        } => {
            draw(
                &config,
                &room,
                tool,
                (from, to),
                store,
                Duration::from_millis(linger_ms),
            )
            .await
        }
        Commands::Show {
            room,
            svg,
            width,
            height,
        } => show(&store, &room, svg, Size::new(width, height)),
        Commands::Clear { room } => {
            store.clear(&room)?;
            log::info!("Cleared stored snapshot for room {}", room);
            Ok(())
        }
        Commands::List => {
            for room in store.list()? {
                println!("{room}");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("10,20").unwrap(), Point::new(10.0, 20.0));
        assert_eq!(parse_point(" -1.5 , 2 ").unwrap(), Point::new(-1.5, 2.0));
        assert!(parse_point("10").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn test_parse_draw_command() {
        let cli = Cli::try_parse_from([
            "sketchroom", "draw", "--room", "r1", "--tool", "rect", "--from", "10,10", "--to", "50,40",
        ])
        .unwrap();
        match cli.command {
            Commands::Draw { room, tool, from, to, linger_ms } => {
                assert_eq!(room, "r1");
                assert_eq!(tool, ToolKind::Rectangle);
                assert_eq!(from, Point::new(10.0, 10.0));
                assert_eq!(to, Point::new(50.0, 40.0));
                assert_eq!(linger_ms, 500);
            }
            _ => panic!("expected draw"),
        }
    }

    #[test]
    fn test_rejects_unknown_tool() {
        assert!(
            Cli::try_parse_from([
                "sketchroom", "draw", "--room", "r1", "--tool", "star", "--from", "0,0", "--to", "1,1",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_storage_dir_override() {
        let cli = Cli::try_parse_from(["sketchroom", "show", "--room", "r", "--storage-dir", "/tmp/x"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.storage_dir, Some(PathBuf::from("/tmp/x")));
    }
}
