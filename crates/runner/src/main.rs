// main.rs
//
// Entry point: loads configuration, connects the lead client, then launches
// either the hypercube swarm or a set of motion-model bots.

mod transport;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use swarm_core::config::Config;
use swarm_core::geometry::{rotate_and_project, AngleMatrix, HypercubeLayout};
use swarm_core::motion::AnimationState;
use swarm_core::peers::PeerRegistry;
use swarm_core::pose::{Glyph, Pose};
use swarm_core::protocol::{PartyEvent, Session};

type SharedRegistry = Arc<RwLock<PeerRegistry>>;

/// One live connection: the session task plus the handles the animation side
/// needs (shared pose to write, dispatched events to read).
struct Bot {
    sid: String,
    pose: Arc<Mutex<Pose>>,
    events: mpsc::UnboundedReceiver<PartyEvent>,
    session: JoinHandle<()>,
}

async fn spawn_bot(config: &Config, registry: SharedRegistry) -> Result<Bot> {
    let connection = transport::connect(&config.server.uri, &config.server.origin).await?;
    let pose = Arc::new(Mutex::new(Pose::default()));
    let (dispatch_tx, events) = mpsc::unbounded_channel();
    let session = Session::new(connection.outbound, dispatch_tx, registry, pose.clone());
    let handle = tokio::spawn(session.run(connection.events));
    Ok(Bot {
        sid: connection.sid,
        pose,
        events,
        session: handle,
    })
}

/// Waits for the synthesized self-joined dispatch that marks the session live.
async fn wait_until_live(bot: &mut Bot) -> Result<()> {
    while let Some(event) = bot.events.recv().await {
        if matches!(event, PartyEvent::SelfJoined(_)) {
            return Ok(());
        }
    }
    anyhow::bail!("connection closed before handshake completed")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Arc::new(Config::load_from_file(&path)?);
    let registry: SharedRegistry = Arc::new(RwLock::new(PeerRegistry::new()));

    let mut lead = spawn_bot(&config, registry.clone()).await?;
    wait_until_live(&mut lead).await?;
    info!(id = %lead.sid, "lead client live");
    {
        let mut pose = lead.pose.lock().await;
        pose.set_position(0.01, 0.02)
            .set_glyph(Glyph::PointerBack)
            .rotate();
    }

    if config.motion.model == "cube" {
        run_cube_swarm(config, registry, lead).await
    } else {
        run_model_swarm(config, registry, lead).await
    }
}

async fn run_cube_swarm(
    config: Arc<Config>,
    registry: SharedRegistry,
    mut lead: Bot,
) -> Result<()> {
    // Geometry is a startup precondition; fail before opening swarm sockets.
    let layout = HypercubeLayout::new(config.cube.dimensions)?;
    let count = layout.slot_count(config.cube.resolution);
    info!(
        dimensions = config.cube.dimensions,
        resolution = config.cube.resolution,
        size = config.cube.size,
        speed = config.cube.speed,
        count,
        "starting cursorbots animation"
    );

    let center = Arc::new(Mutex::new((0.5, 0.5)));
    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel::<String>();
    let (go_tx, go_rx) = watch::channel(false);
    let mut peer_count = registry.read().await.watch_count();

    for slot in 0..count {
        let bot = spawn_bot(&config, registry.clone()).await?;
        let point = layout
            .slot_position(slot, config.cube.resolution)
            .context("swarm slot out of range")?;
        info!(slot, id = %bot.sid, "starting client");
        tokio::spawn(run_spin_bot(
            bot,
            point,
            Arc::clone(&config),
            Arc::clone(&center),
            go_rx.clone(),
            ready_tx.clone(),
        ));
    }
    drop(ready_tx);

    // Rendezvous: every client reports live, then every client is visible as
    // a peer, then the swarm is released to animate.
    let mut ready_ids = Vec::with_capacity(count);
    while ready_ids.len() < count {
        let Some(id) = ready_rx.recv().await else {
            anyhow::bail!("a swarm client failed before reporting ready");
        };
        info!(%id, ready = ready_ids.len() + 1, count, "client joined");
        ready_ids.push(id);
    }
    for id in &ready_ids {
        while !registry.read().await.contains(id) {
            peer_count.changed().await.context("peer registry closed")?;
        }
    }
    go_tx.send(true).ok();
    info!("swarm released");

    // The lead keeps the projection center glued to the configured cursor.
    while let Some(event) = lead.events.recv().await {
        if let PartyEvent::MouseCoords(coords) = event {
            if config.server.center.as_deref() == Some(coords.id.as_str()) {
                *center.lock().await = (coords.mouse.x, coords.mouse.y);
            }
        }
    }
    Ok(())
}

async fn run_spin_bot(
    mut bot: Bot,
    point: Vec<f64>,
    config: Arc<Config>,
    center: Arc<Mutex<(f64, f64)>>,
    mut go: watch::Receiver<bool>,
    ready: mpsc::UnboundedSender<String>,
) {
    if wait_until_live(&mut bot).await.is_err() {
        error!(id = %bot.sid, "client dropped during handshake");
        return;
    }
    ready.send(bot.sid.clone()).ok();
    bot.events.close();
    if go.wait_for(|&released| released).await.is_err() {
        return;
    }

    let mut angles = AngleMatrix::zeroed(config.cube.dimensions);
    let mut ticker = interval(Duration::from_secs_f64(1.0 / config.motion.fps));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if bot.session.is_finished() {
            break;
        }
        let center = *center.lock().await;
        let (x, y) = rotate_and_project(&point, &angles, config.cube.size, center);
        {
            let mut pose = bot.pose.lock().await;
            pose.set_position(x, y)
                .set_scale(0.25)
                .set_glyph(Glyph::Wait);
        }
        angles.advance(config.cube.speed);
    }
}

async fn run_model_swarm(
    config: Arc<Config>,
    registry: SharedRegistry,
    mut lead: Bot,
) -> Result<()> {
    let count = config.motion.bots;
    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel::<String>();
    let (go_tx, go_rx) = watch::channel(false);

    for index in 0..count {
        let bot = spawn_bot(&config, registry.clone()).await?;
        info!(index, id = %bot.sid, "starting client");
        tokio::spawn(run_model_bot(
            bot,
            Arc::clone(&config),
            registry.clone(),
            go_rx.clone(),
            ready_tx.clone(),
        ));
    }
    drop(ready_tx);

    let mut ready = 0usize;
    while ready < count {
        let Some(id) = ready_rx.recv().await else {
            anyhow::bail!("a swarm client failed before reporting ready");
        };
        ready += 1;
        info!(%id, ready, count, "client joined");
    }
    go_tx.send(true).ok();
    info!(model = %config.motion.model, count, "swarm released");

    while lead.events.recv().await.is_some() {}
    Ok(())
}

async fn run_model_bot(
    mut bot: Bot,
    config: Arc<Config>,
    registry: SharedRegistry,
    mut go: watch::Receiver<bool>,
    ready: mpsc::UnboundedSender<String>,
) {
    if wait_until_live(&mut bot).await.is_err() {
        error!(id = %bot.sid, "client dropped during handshake");
        return;
    }
    ready.send(bot.sid.clone()).ok();
    bot.events.close();
    if go.wait_for(|&released| released).await.is_err() {
        return;
    }

    let mut rng = StdRng::from_entropy();
    let mut state = AnimationState::new(&config.motion.model);
    state.x = rng.gen_range(0.1..0.9);
    state.y = rng.gen_range(0.1..0.9);

    let mut ticker = interval(Duration::from_secs_f64(1.0 / config.motion.fps));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();
    loop {
        ticker.tick().await;
        if bot.session.is_finished() {
            break;
        }
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;

        let mut peers = registry.read().await.snapshot();
        // The registry reflects everyone at the party, ourselves included.
        peers.remove(&bot.sid);
        state.tick(dt, &peers, now, &mut rng);

        let mut pose = bot.pose.lock().await;
        pose.set_position(state.x, state.y);
    }
}
