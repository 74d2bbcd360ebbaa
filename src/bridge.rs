//! Control-side handle for building a patch while the engine runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use rtrb::Producer;

use crate::config::EngineConfig;
use crate::error::Error;
use crate::node::{Node, NodeId, Transform};
use crate::nodes::{Ejector, Filter, Gain, Injector, Mixer, Sine};
use crate::ring::RingReader;
use crate::value::ValueCell;

/// Builds a node for a block type.
pub type Factory = Box<dyn Fn(&EngineConfig) -> Box<dyn Node> + Send>;

/// Graph edits travelling from the [`Bridge`] to the [`Engine`](crate::Engine).
pub(crate) enum Command {
    Insert {
        id: NodeId,
        name: String,
        node: Box<dyn Node>,
    },
    Connect {
        from: NodeId,
        output: usize,
        to: NodeId,
        input: usize,
    },
}

/// What the bridge remembers about a node after handing it to the engine.
struct NodeInfo {
    name: String,
    inputs: usize,
    outputs: usize,
    value: Option<ValueCell>,
    reader: Option<RingReader>,
}

/// The control side of an [`Engine`](crate::Engine).
///
/// Nodes are created by block type name from registered factories, and every
/// edit is validated here before it is queued for the synthesis thread, so a bad
/// request comes back as an error right away and never reaches the running graph.
///
/// ```
/// use klotz::{Engine, EngineConfig};
///
/// let (mut engine, mut bridge) = Engine::new(EngineConfig::default());
///
/// let freq = bridge.spawn("value").unwrap();
/// let sine = bridge.spawn("sine").unwrap();
/// let out = bridge.spawn("output").unwrap();
/// bridge.connect(freq, 0, sine, 0).unwrap();
/// bridge.connect(sine, 0, out, 0).unwrap();
/// bridge.set_value(freq, 440.0).unwrap();
///
/// let mut reader = bridge.take_output(out).unwrap();
/// for _ in 0..4 {
///     engine.tick().unwrap();
/// }
/// assert!(reader.pop().is_some());
/// ```
pub struct Bridge {
    config: EngineConfig,
    factories: HashMap<String, Factory>,
    /// Per block type, how many nodes have been spawned so far.
    counters: HashMap<String, usize>,
    nodes: Vec<NodeInfo>,
    commands: Producer<Command>,
    /// Set once the engine is dropped and nothing drains `commands` anymore.
    stopped: Arc<AtomicBool>,
}

impl Bridge {
    pub(crate) fn new(config: EngineConfig, commands: Producer<Command>, stopped: Arc<AtomicBool>) -> Self {
        Self {
            config,
            factories: HashMap::new(),
            counters: HashMap::new(),
            nodes: Vec::new(),
            commands,
            stopped,
        }
    }

    /// Register every built-in block type:
    ///
    /// | name        | inputs                      | outputs |
    /// |-------------|-----------------------------|---------|
    /// | `value`     | none                        | value   |
    /// | `sine`      | frequency (Hz)              | signal  |
    /// | `mix`       | a, b                        | a + b   |
    /// | `gain`      | signal, gain                | product |
    /// | `low_pass`  | signal, f0, gain (dB), slope | signal |
    /// | `high_pass` | signal, f0, gain (dB), slope | signal |
    /// | `output`    | signal                      | none    |
    pub fn with_builtin_blocks(mut self) -> Self {
        self.register_factory("value", |_| Box::new(Injector::default()));
        self.register_factory("sine", |_| Transform::boxed(Sine::new()));
        self.register_factory("mix", |_| Transform::boxed(Mixer::pair()));
        self.register_factory("gain", |_| Transform::boxed(Gain::new()));
        self.register_factory("low_pass", |_| Transform::boxed(Filter::low_pass()));
        self.register_factory("high_pass", |_| Transform::boxed(Filter::high_pass()));
        self.register_factory("output", |config| Box::new(Ejector::new(config)));
        self
    }

    /// Make a block type available to [`spawn`](Self::spawn), replacing any
    /// factory already registered under that name.
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&EngineConfig) -> Box<dyn Node> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!(%name, "registering block type");
        if self.factories.insert(name.clone(), Box::new(factory)).is_some() {
            tracing::debug!(%name, "replaced existing factory");
        }
    }

    /// Registered block type names, in no particular order.
    pub fn block_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Create a node of the given block type and queue it for insertion.
    ///
    /// The node is named after its type and a per-type counter, e.g. `sine#2`.
    pub fn spawn(&mut self, block: &str) -> Result<NodeId, Error> {
        self.check_running()?;
        let factory = self
            .factories
            .get(block)
            .ok_or_else(|| Error::UnknownBlock(block.to_owned()))?;

        let mut node = factory(&self.config);
        if self.commands.is_full() {
            return Err(Error::QueueFull);
        }

        let counter = self.counters.entry_ref(block).or_insert(0);
        let name = format!("{}#{}", block, counter);
        *counter += 1;

        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeInfo {
            name: name.clone(),
            inputs: node.num_inputs(),
            outputs: node.num_outputs(),
            value: node.value_cell(),
            reader: node.take_reader(),
        });

        tracing::debug!(%id, %name, "spawned");
        self.send(Command::Insert { id, name, node })?;
        Ok(id)
    }

    /// Connect output `output` of `from` to input `input` of `to`.
    pub fn connect(&mut self, from: NodeId, output: usize, to: NodeId, input: usize) -> Result<(), Error> {
        self.check_running()?;
        let source = self.info(from)?;
        if output >= source.outputs {
            return Err(Error::OutputPort { port: output, count: source.outputs });
        }
        let dest = self.info(to)?;
        if input >= dest.inputs {
            return Err(Error::InputPort { port: input, count: dest.inputs });
        }

        self.send(Command::Connect { from, output, to, input })
    }

    /// Set the value an injector node outputs from the next tick on.
    pub fn set_value(&self, id: NodeId, value: f32) -> Result<(), Error> {
        match &self.info(id)?.value {
            Some(cell) => {
                cell.set(value);
                Ok(())
            }
            None => Err(Error::NotInjector(id)),
        }
    }

    /// The shared value cell of an injector node, for setting it from another thread.
    pub fn value_cell(&self, id: NodeId) -> Result<ValueCell, Error> {
        self.info(id)?.value.clone().ok_or(Error::NotInjector(id))
    }

    /// Take the ring buffer reader of an output node, to hand to the audio callback.
    ///
    /// Returns `None` for unknown nodes, nodes without a stream, or if the reader
    /// was already taken.
    pub fn take_output(&mut self, id: NodeId) -> Option<RingReader> {
        self.nodes.get_mut(id.0)?.reader.take()
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id.0).map(|n| n.name.as_str())
    }

    /// Number of nodes spawned so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the engine behind this bridge has stopped, on request or after a failed tick.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn check_running(&self) -> Result<(), Error> {
        if self.is_stopped() {
            Err(Error::EngineStopped)
        } else {
            Ok(())
        }
    }

    fn info(&self, id: NodeId) -> Result<&NodeInfo, Error> {
        self.nodes.get(id.0).ok_or(Error::UnknownNode(id))
    }

    fn send(&mut self, command: Command) -> Result<(), Error> {
        self.commands.push(command).map_err(|_| Error::QueueFull)
    }
}
