use std::{cell::RefCell, fs, path::PathBuf, rc::Rc};

use anyhow::Context;
use neotris_engine::{
    EngineConfig, GameEngine, GameEvent, GameSnapshot, ParseSeedError, PieceSeed, Validation,
};
use serde::Serialize;

use crate::util::{self, Output};

use self::script::ScriptStep;

mod script;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SimulateArg {
    /// Script file: one action per line (`left 2`, `cw`, `hard`, `wait 500`, `garbage 3`)
    script: PathBuf,
    /// Engine configuration JSON; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Piece seed, as a decimal integer or 32 hex digits (random when omitted)
    #[arg(long, value_parser = parse_seed)]
    seed: Option<PieceSeed>,
    /// Length of one host frame in milliseconds
    #[arg(long, default_value_t = 1000.0 / 60.0)]
    frame_ms: f64,
    /// Leave the event stream out of the report
    #[arg(long)]
    no_events: bool,
    /// Output file path (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn parse_seed(s: &str) -> Result<PieceSeed, ParseSeedError> {
    s.parse::<u64>()
        .map_or_else(|_| s.parse(), |seed| Ok(PieceSeed::from(seed)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationReport {
    seed: PieceSeed,
    frames: u64,
    host_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<GameEvent>>,
    board: Vec<String>,
    snapshot: GameSnapshot,
    validation: Validation,
}

/// Host loop feeding the engine fixed-length frames.
struct Host {
    engine: GameEngine,
    frame_ms: f64,
    now_ms: f64,
    frames: u64,
}

impl Host {
    fn new(mut engine: GameEngine, frame_ms: f64) -> Self {
        engine.frame(0.0);
        Self {
            engine,
            frame_ms,
            now_ms: 0.0,
            frames: 0,
        }
    }

    fn tick(&mut self) {
        self.now_ms += self.frame_ms;
        self.frames += 1;
        self.engine.frame(self.now_ms);
    }

    fn run(&mut self, step: ScriptStep) {
        match step {
            ScriptStep::Input(action) => {
                self.engine.queue_input(action);
                self.tick();
            }
            ScriptStep::Wait { ms } => {
                let until = self.now_ms + ms;
                while self.now_ms < until && !self.engine.status().is_game_over() {
                    self.tick();
                }
            }
            ScriptStep::Garbage { lines } => {
                self.engine.add_garbage(lines);
                self.tick();
            }
        }
    }
}

pub(crate) fn run(arg: &SimulateArg) -> anyhow::Result<()> {
    let SimulateArg {
        script: script_path,
        config,
        seed,
        frame_ms,
        no_events,
        output,
    } = arg;

    if !(*frame_ms > 0.0 && frame_ms.is_finite()) {
        anyhow::bail!("--frame-ms must be a positive number, got {frame_ms}");
    }
    let config: EngineConfig = match config {
        Some(path) => util::read_json_file("config", path)?,
        None => EngineConfig::default(),
    };
    let text = fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read script file: {}", script_path.display()))?;
    let steps = script::parse(&text)
        .with_context(|| format!("Failed to parse script file: {}", script_path.display()))?;

    let mut engine = match seed {
        Some(seed) => GameEngine::with_seed(config, *seed),
        None => GameEngine::new(config),
    }
    .context("Invalid engine configuration")?;
    log::info!("simulating {} steps with seed {}", steps.len(), engine.seed());

    let events = Rc::new(RefCell::new(Vec::new()));
    if !no_events {
        let sink = Rc::clone(&events);
        engine.subscribe(move |event: &GameEvent| sink.borrow_mut().push(event.clone()));
    }

    let mut host = Host::new(engine, *frame_ms);
    for step in steps {
        if host.engine.status().is_game_over() {
            log::info!("game over after {} frames; skipping the rest", host.frames);
            break;
        }
        host.run(step);
    }

    let snapshot = host.engine.snapshot();
    let validation = host.engine.validate();
    let report = SimulationReport {
        seed: host.engine.seed(),
        frames: host.frames,
        host_time_ms: host.now_ms,
        events: (!no_events).then(|| events.take()),
        board: snapshot.visible_rows_ascii(),
        snapshot,
        validation: validation.clone(),
    };
    Output::save_json(&report, output.clone())?;

    if !validation.valid {
        anyhow::bail!(
            "engine self-check failed: {}",
            validation.errors.join("; ")
        );
    }
    Ok(())
}
