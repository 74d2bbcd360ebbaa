//! Synthesis loop - applies bridge commands and ticks the graph in real time

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rtrb::{Consumer, RingBuffer};

use crate::batch::BATCH_DURATION;
use crate::bridge::{Bridge, Command};
use crate::config::EngineConfig;
use crate::error::Error;
use crate::graph::Graph;

/// The synthesis side of the engine: owns the [`Graph`] and every node in it.
///
/// Created together with its [`Bridge`] by [`Engine::new`]. Graph edits made on
/// the bridge are applied at the start of the next [`tick`](Self::tick).
///
/// # Processing Audio
///
/// Either call [`tick`](Self::tick) yourself (offline rendering, tests), or let
/// [`run`](Self::run) pace ticks against the wall clock, typically on its own
/// thread through [`spawn`](Self::spawn):
///
/// ```no_run
/// # use klotz::{Engine, EngineConfig};
/// let (engine, mut bridge) = Engine::new(EngineConfig::default());
/// let handle = engine.spawn().unwrap();
///
/// let sine = bridge.spawn("sine").unwrap();
/// // ...
///
/// handle.stop().unwrap();
/// ```
pub struct Engine {
    graph: Graph,
    commands: Consumer<Command>,
    config: EngineConfig,
    stopped: Arc<AtomicBool>,
}

impl Engine {
    /// Create an engine and the bridge that controls it, with the built-in
    /// block types registered.
    pub fn new(config: EngineConfig) -> (Self, Bridge) {
        let (producer, consumer) = RingBuffer::new(config.command_capacity);
        let stopped = Arc::new(AtomicBool::new(false));
        let bridge = Bridge::new(config.clone(), producer, Arc::clone(&stopped)).with_builtin_blocks();
        let engine = Self {
            graph: Graph::new(),
            commands: consumer,
            config,
            stopped,
        };
        (engine, bridge)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply every queued bridge command. Returns how many were applied.
    pub fn apply_commands(&mut self) -> Result<usize, Error> {
        let mut applied = 0;
        while let Ok(command) = self.commands.pop() {
            match command {
                Command::Insert { id, name, node } => {
                    let added = self.graph.add_named(name, node);
                    debug_assert_eq!(added, id, "bridge and graph disagree on node ids");
                }
                Command::Connect { from, output, to, input } => {
                    self.graph.connect(from, output, to, input)?;
                }
            }
            applied += 1;
        }
        Ok(applied)
    }

    /// Apply pending commands, then advance the graph by one batch.
    pub fn tick(&mut self) -> Result<(), Error> {
        self.apply_commands()?;
        self.graph.tick()
    }

    /// Tick in real time until `shutdown` is set or a tick fails.
    ///
    /// The loop keeps `lookahead_batches` ticks ahead of the wall clock and
    /// sleeps in between. Failures are logged and returned.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), Error> {
        let start = Instant::now();
        let first = self.graph.ticks();
        let nap = Duration::from_secs_f64(BATCH_DURATION / 4.0);

        tracing::debug!(lookahead = self.config.lookahead_batches, "synthesis loop started");

        while !shutdown.load(Ordering::Acquire) {
            // Ticks that should have completed by now
            let target = first + (start.elapsed().as_secs_f64() / BATCH_DURATION) as u64 + self.config.lookahead_batches;

            while self.graph.ticks() < target && !shutdown.load(Ordering::Acquire) {
                if let Err(e) = self.tick() {
                    tracing::error!(error = %e, tick = self.graph.ticks(), "synthesis stopped");
                    return Err(e);
                }
            }

            std::thread::sleep(nap);
        }

        tracing::debug!(ticks = self.graph.ticks() - first, "synthesis loop stopped");
        Ok(())
    }

    /// Run the synthesis loop on a dedicated thread.
    pub fn spawn(mut self) -> Result<EngineHandle, Error> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let thread = std::thread::Builder::new()
            .name("klotz-synth".into())
            .spawn(move || self.run(&flag))?;

        Ok(EngineHandle {
            shutdown,
            thread: Some(thread),
        })
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Nothing drains the command queue from here on.
        self.stopped.store(true, Ordering::Release);
    }
}

/// Owner of a running synthesis thread. Dropping it stops the thread.
pub struct EngineHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), Error>>>,
}

impl EngineHandle {
    /// Whether the loop has exited, either by request or because a tick failed.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the loop and wait for it, returning the error that ended it, if any.
    pub fn stop(mut self) -> Result<(), Error> {
        self.join()
    }

    fn join(&mut self) -> Result<(), Error> {
        self.shutdown.store(true, Ordering::Release);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| Error::EnginePanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            tracing::warn!(error = %e, "synthesis thread ended with an error");
        }
    }
}
