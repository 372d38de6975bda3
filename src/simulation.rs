use async_stream::stream;
use futures::stream::{Stream, StreamExt};
use quire_document::{AnchorId, AnchorPolicy, AnchorType, Document, SharedDocument};
use quire_manager::{DocumentManager, EditorId, FileContents, InMemoryLoader, ManagerConfig, ManagerError};
use quire_reorder::{ReorderError, Reorderer, ReordererConfigBuilder, TokioTimerFactory, Version};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const COLLABORATOR: AnchorType = AnchorType::new("sim", "collaborator");
const ALPHABET: &[u8] = b"abcdefghij  \n";
const SIMULATED_PATH: &str = "/workspace/notes.txt";

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Manager error: {0}")]
    Manager(#[from] ManagerError),

    #[error("Reorderer error: {0}")]
    Reorder(#[from] ReorderError),

    #[error("Simulated file {0} is not editable")]
    NotEditable(String),

    #[error("Client diverged from server (seed {seed})")]
    Diverged { seed: u64 },
}

/// One edit as shipped from the server to the client.
#[derive(Clone, Debug)]
pub enum Delta {
    Insert {
        line_number: usize,
        column: usize,
        text: String,
    },
    Delete {
        line_number: usize,
        column: usize,
        count: usize,
    },
}

impl Delta {
    fn apply(&self, document: &mut Document) -> quire_document::Result<()> {
        match self {
            Delta::Insert {
                line_number,
                column,
                text,
            } => document.insert_text_at(*line_number, *column, text).map(|_| ()),
            Delta::Delete {
                line_number,
                column,
                count,
            } => document.delete_text_at(*line_number, *column, *count).map(|_| ()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub edits: usize,
    /// Deliveries are shuffled within windows of this many versions.
    pub reorder_window: usize,
    /// Chance that a delivery is lost and has to be resent after a gap timeout.
    pub drop_rate: f64,
    pub gap_timeout: Duration,
    pub collaborators: usize,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            edits: 500,
            reorder_window: 8,
            drop_rate: 0.02,
            gap_timeout: Duration::from_millis(20),
            collaborators: 3,
            seed: None,
        }
    }
}

/// Statistics collected during a simulation run
#[derive(Clone, Debug)]
pub struct SimulationStats {
    pub edits: usize,
    pub deliveries: usize,
    pub dropped: usize,
    pub gap_timeouts: usize,
    pub resent: usize,
    pub final_lines: usize,
    pub final_chars: usize,
    pub surviving_cursors: usize,
    pub total_time: Duration,
    pub edits_per_second: f64,
}

impl SimulationStats {
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Simulation Statistics                         ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Edits Generated:           {:>30} ║", self.edits);
        println!("║  Deliveries Attempted:      {:>30} ║", self.deliveries);
        println!("║  Deliveries Dropped:        {:>30} ║", self.dropped);
        println!("║  Gap Timeouts:              {:>30} ║", self.gap_timeouts);
        println!("║  Edits Resent:              {:>30} ║", self.resent);
        println!("║  Final Lines:               {:>30} ║", self.final_lines);
        println!("║  Final Characters:          {:>30} ║", self.final_chars);
        println!("║  Surviving Cursors:         {:>30} ║", self.surviving_cursors);
        println!("║  Total Time:                {:>29}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("║  Edits/Second:              {:>30.0} ║", self.edits_per_second);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

/// Map a character offset onto a (line number, column) pair.
fn locate(document: &Document, mut offset: usize) -> (usize, usize) {
    let last = document.last_line_number();
    for (number, line) in document.lines().enumerate() {
        if offset < line.len() || number == last {
            return (number, offset);
        }
        offset -= line.len();
    }
    (last, 0)
}

fn random_text(rng: &mut StdRng) -> String {
    let len = rng.gen_range(1..=8);
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Make a random edit on the server copy and return it as a delta.
fn generate_edit(server: &mut Document, rng: &mut StdRng) -> Option<Delta> {
    let total = server.text().chars().count();
    let delta = if total == 0 || rng.gen_bool(0.6) {
        let (line_number, column) = locate(server, rng.gen_range(0..=total));
        Delta::Insert {
            line_number,
            column,
            text: random_text(rng),
        }
    } else {
        let offset = rng.gen_range(0..total);
        let (line_number, column) = locate(server, offset);
        let count = rng.gen_range(1..=(total - offset).min(6));
        Delta::Delete {
            line_number,
            column,
            count,
        }
    };

    match delta.apply(server) {
        Ok(()) => Some(delta),
        Err(err) => {
            error!(error = %err, ?delta, "Server rejected generated edit");
            None
        }
    }
}

/// Yields versioned deltas shuffled within each window, losing some.
fn delivery_stream(
    log: Arc<Vec<Delta>>,
    window: usize,
    drop_rate: f64,
    seed: u64,
    dropped: Arc<AtomicUsize>,
) -> impl Stream<Item = (Version, Delta)> {
    stream! {
        let mut rng = StdRng::seed_from_u64(seed);
        let versions: Vec<Version> = (1..=log.len() as Version).collect();
        for chunk in versions.chunks(window.max(1)) {
            let mut chunk = chunk.to_vec();
            chunk.shuffle(&mut rng);
            for version in chunk {
                if rng.gen_bool(drop_rate) {
                    debug!(version, "Delivery lost");
                    dropped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                yield (version, log[version as usize - 1].clone());
                tokio::task::yield_now().await;
            }
        }
    }
}

fn place_collaborators(client: &SharedDocument, count: usize, rng: &mut StdRng) -> Vec<AnchorId> {
    let mut anchors = Vec::with_capacity(count);
    client
        .edit(|doc| {
            let total = doc.text().chars().count();
            for i in 0..count {
                let (number, column) = locate(doc, rng.gen_range(0..=total));
                let line = match doc.line_info(number) {
                    Ok(info) => info.line(),
                    Err(err) => {
                        warn!(error = %err, "Could not place collaborator");
                        continue;
                    }
                };
                match doc.create_anchor_with_value(
                    COLLABORATOR,
                    line,
                    Some(number),
                    Some(column),
                    AnchorPolicy::CURSOR,
                    format!("collaborator-{i}"),
                ) {
                    Ok(id) => anchors.push(id),
                    Err(err) => warn!(error = %err, "Could not place collaborator"),
                }
            }
        })
        .unwrap_or_else(|err| error!(error = %err, "Client document busy"));
    anchors
}

fn check_convergence(server: &Document, client: &Document, seed: u64) -> Result<(), SimulationError> {
    if client.text() == server.text() && client.line_count() == server.line_count() {
        return Ok(());
    }
    error!(seed, "Client diverged from server");
    Err(SimulationError::Diverged { seed })
}

/// Count collaborator cursors that still resolve to a valid position.
fn surviving_cursors(client: &Document, anchors: &[AnchorId]) -> usize {
    anchors
        .iter()
        .filter(|id| match client.anchor_position(**id) {
            Ok(position) => client
                .line(position.line_info().line())
                .is_some_and(|line| position.column() <= line.len()),
            Err(_) => false,
        })
        .count()
}

fn resend(
    reorderer: &mut Reorderer<Delta>,
    log: &[Delta],
    from: Version,
    to: Version,
    resent: &mut usize,
) {
    for version in from..to {
        if let Some(delta) = log.get(version as usize - 1) {
            reorderer.accept_item(delta.clone(), version);
            *resent += 1;
        }
    }
}

/// Run one server/client session and check that both copies converge.
pub async fn run_simulation(config: SimulationConfig) -> Result<SimulationStats, SimulationError> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        Reordered Delivery Simulation                       ║");
    println!(
        "║  Edits: {} | Window: {} | Drop rate: {:.2} | Cursors: {} ║",
        config.edits, config.reorder_window, config.drop_rate, config.collaborators
    );
    println!("╚════════════════════════════════════════════════════════════╝");

    let start = Instant::now();
    let seed = config.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    info!(seed, "Starting simulation");

    let initial = "fn main() {\n    println!(\"hello\");\n}\n";
    let loader = InMemoryLoader::new();
    loader.insert(FileContents::new(SIMULATED_PATH, initial).with_session_key("sim-session"));

    let manager = DocumentManager::new(ManagerConfig::default(), loader)?;
    let client = manager
        .load_document(SIMULATED_PATH)
        .await?
        .into_document()
        .ok_or_else(|| SimulationError::NotEditable(SIMULATED_PATH.to_string()))?;
    manager.attach_to_editor(&client, EditorId(1))?;

    println!("\n[Phase 1/3] Generating server edits...");
    let mut server = Document::from_text(initial);
    let mut log = Vec::with_capacity(config.edits);
    while log.len() < config.edits {
        if let Some(delta) = generate_edit(&mut server, &mut rng) {
            log.push(delta);
        }
    }
    let log = Arc::new(log);
    let last_version = log.len() as Version;
    println!("[Phase 1/3] ✓ Completed");

    println!("[Phase 2/3] Delivering through the reorderer...");
    let anchors = place_collaborators(&client, config.collaborators, &mut rng);

    let (gap_tx, mut gap_rx) = mpsc::unbounded_channel::<Option<Version>>();
    let gap_timeouts = Arc::new(AtomicUsize::new(0));
    let applied = Arc::new(AtomicUsize::new(0));

    let sink = {
        let client = client.clone();
        let applied = applied.clone();
        move |delta: Delta, version: Version| {
            match client.edit(|doc| delta.apply(doc)) {
                Ok(Ok(())) => {
                    applied.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(err)) => error!(version, error = %err, "Client rejected delta"),
                Err(err) => error!(version, error = %err, "Client document busy"),
            }
        }
    };
    let on_gap = {
        let gap_timeouts = gap_timeouts.clone();
        move |last: Option<Version>| {
            gap_timeouts.fetch_add(1, Ordering::Relaxed);
            let _ = gap_tx.send(last);
        }
    };

    let timers = TokioTimerFactory::current()?;
    let reorderer_config = ReordererConfigBuilder::new()
        .first_version(1)
        .timeout(config.gap_timeout)
        .build();
    let mut reorderer = Reorderer::from_config(reorderer_config, sink, on_gap, &timers)?;

    let dropped = Arc::new(AtomicUsize::new(0));
    let mut deliveries = Box::pin(delivery_stream(
        log.clone(),
        config.reorder_window,
        config.drop_rate,
        seed ^ 0x5eed,
        dropped.clone(),
    ));

    let mut delivered = 0;
    let mut resent = 0;
    let mut stream_done = false;
    while reorderer.next_expected_version() <= last_version {
        tokio::select! {
            item = deliveries.next(), if !stream_done => match item {
                Some((version, delta)) => {
                    delivered += 1;
                    reorderer.accept_item(delta, version);
                }
                None => stream_done = true,
            },
            Some(last) = gap_rx.recv() => {
                let from = last.map_or(1, |v| v + 1);
                let to = reorderer
                    .pending_versions()
                    .first()
                    .copied()
                    .unwrap_or(last_version + 1);
                debug!(from, to, "Resending after gap timeout");
                resend(&mut reorderer, &log, from, to, &mut resent);
            }
            _ = tokio::time::sleep(config.gap_timeout * 4), if stream_done => {
                // Losses at the tail leave no later item to open a gap.
                let from = reorderer.next_expected_version();
                resend(&mut reorderer, &log, from, last_version + 1, &mut resent);
            }
        }
    }
    reorderer.cleanup();
    println!("[Phase 2/3] ✓ Completed");

    println!("[Phase 3/3] Checking convergence...");
    let (convergence, final_lines, final_chars, cursors) = {
        let doc = client.read();
        (
            check_convergence(&server, &doc, seed),
            doc.line_count(),
            doc.text().chars().count(),
            surviving_cursors(&doc, &anchors),
        )
    };
    if convergence.is_ok() {
        println!("[Phase 3/3] ✓ Completed");
    } else {
        println!("[Phase 3/3] ✗ Client diverged (seed {seed})");
    }

    {
        let doc = client.read();
        for id in &anchors {
            if let (Some(anchor), Ok(position)) = (doc.anchor(*id), doc.anchor_position(*id)) {
                let name = anchor.value::<String>().map(String::as_str).unwrap_or("?");
                debug!(name, %position, "Collaborator cursor");
            }
        }
    }

    manager.cleanup();
    convergence?;

    let total_time = start.elapsed();
    let edits_per_second = applied.load(Ordering::Relaxed) as f64 / total_time.as_secs_f64();

    Ok(SimulationStats {
        edits: log.len(),
        deliveries: delivered,
        dropped: dropped.load(Ordering::Relaxed),
        gap_timeouts: gap_timeouts.load(Ordering::Relaxed),
        resent,
        final_lines,
        final_chars,
        surviving_cursors: cursors,
        total_time,
        edits_per_second,
    })
}
