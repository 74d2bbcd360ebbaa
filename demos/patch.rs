//! Filtered sine with a sweeping cutoff
//!
//! Run with: cargo run --example patch --features cpal_sink

use std::thread::sleep;
use std::time::{Duration, Instant};

use klotz::{CpalDevice, Engine, EngineConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let device = CpalDevice::default_output()?;
    println!("Playing on {} ({} ch)", device.name(), device.channels());

    let (engine, mut bridge) = Engine::new(EngineConfig::default());

    // freq -> sine -> low_pass -> gain -> output
    let freq = bridge.spawn("value")?;
    let sine = bridge.spawn("sine")?;
    let cutoff = bridge.spawn("value")?;
    let slope = bridge.spawn("value")?;
    let lp = bridge.spawn("low_pass")?;
    let level = bridge.spawn("value")?;
    let gain = bridge.spawn("gain")?;
    let out = bridge.spawn("output")?;

    bridge.connect(freq, 0, sine, 0)?;
    bridge.connect(sine, 0, lp, 0)?;
    bridge.connect(cutoff, 0, lp, 1)?;
    bridge.connect(slope, 0, lp, 3)?;
    bridge.connect(lp, 0, gain, 0)?;
    bridge.connect(level, 0, gain, 1)?;
    bridge.connect(gain, 0, out, 0)?;

    bridge.set_value(freq, 110.0)?;
    bridge.set_value(slope, 1.0)?;
    bridge.set_value(level, 0.3)?;

    let reader = bridge.take_output(out).ok_or("output already taken")?;
    let stream = device.play(reader)?;
    let synth = engine.spawn()?;

    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(10) {
        let t = start.elapsed().as_secs_f32();
        bridge.set_value(cutoff, 300.0 + 2000.0 * (0.5 + 0.5 * (t * 0.8).sin()))?;
        if stream.check_underrun() {
            println!("underrun ({} frames so far)", stream.underrun_frames());
        }
        sleep(Duration::from_millis(10));
    }

    synth.stop()?;
    Ok(())
}
