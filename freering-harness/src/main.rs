//! Synthetic host: clocks a fake render thread against a live session.
//!
//! No audio device is opened. A sine generator stands in for the capture
//! path, a second thread feeds the injection queue, and the "callback" is
//! paced at real quantum rate so the diagnostics reflect realistic timing.

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;

use freering_core::{
    AudioSession, BridgeSnapshot, GainProcessor, InjectionPolicy, SessionConfig, WorkerSnapshot,
};

#[derive(Debug)]
struct Args {
    seconds: u64,
    channels: usize,
    gain: f32,
    policy: InjectionPolicy,
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Report {
    config: SessionConfig,
    seconds: u64,
    quanta: usize,
    output_peak: f32,
    output_rms: f32,
    bridge: BridgeSnapshot,
    worker: WorkerSnapshot,
}

fn parse_args() -> Result<Args> {
    let mut seconds = 2u64;
    let mut channels = 1usize;
    let mut gain = 0.5f32;
    let mut policy = InjectionPolicy::Replace;
    let mut output = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--seconds" => {
                let v = it.next().context("missing value for --seconds")?;
                seconds = v.parse::<u64>().context("invalid value for --seconds")?.clamp(1, 600);
            }
            "--channels" => {
                let v = it.next().context("missing value for --channels")?;
                channels = v.parse::<usize>().context("invalid value for --channels")?;
            }
            "--gain" => {
                let v = it.next().context("missing value for --gain")?;
                gain = v.parse::<f32>().context("invalid value for --gain")?;
            }
            "--mix" => policy = InjectionPolicy::Mix,
            "--output" => {
                let v = it.next().context("missing value for --output")?;
                output = Some(PathBuf::from(v));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: freering-harness [--seconds <n>] [--channels <n>] \\
  [--gain <f>] [--mix] [--output <file.json>]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    Ok(Args {
        seconds,
        channels,
        gain,
        policy,
        output,
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freering=info,freering_core=info".parse().unwrap()),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("harness failed: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = parse_args()?;

    let config = SessionConfig {
        channel_count: args.channels,
        injection_policy: args.policy,
        ..Default::default()
    };
    let quantum = config.quantum_frames;
    let frame_size = config.frame_size;
    let sample_rate = config.sample_rate;
    let quantum_period = Duration::from_secs_f64(quantum as f64 / f64::from(sample_rate));

    info!(
        seconds = args.seconds,
        channels = args.channels,
        gain = args.gain,
        policy = ?args.policy,
        "harness starting"
    );

    let mut session = AudioSession::new(config.clone(), Box::new(GainProcessor::new(args.gain)))?;
    let mut handles = session.start()?;

    // Injection producer: an independently-timed 220 Hz triangle wave,
    // pushed one processing frame at a time like a UI-driven generator.
    let injecting = Arc::new(AtomicBool::new(true));
    let injector = {
        let injecting = Arc::clone(&injecting);
        let mut producer = handles.injection;
        let channels = args.channels;
        thread::spawn(move || {
            let mut phase = 0.0f32;
            let step = 220.0 / sample_rate as f32;
            let mut block = vec![vec![0.0f32; frame_size]; channels];
            while injecting.load(Ordering::Relaxed) {
                for i in 0..frame_size {
                    let tri = 4.0 * (phase - (phase + 0.5).floor()).abs() - 1.0;
                    for lane in block.iter_mut() {
                        lane[i] = 0.25 * tri;
                    }
                    phase = (phase + step).fract();
                }
                // Push-or-drop, like any best-effort external producer.
                producer.push(&block, frame_size);
                thread::sleep(Duration::from_millis(20));
            }
        })
    };

    // Simulated render callback: 440 Hz sine in, processed audio out,
    // paced at the real quantum period.
    let mut captured = vec![vec![0.0f32; quantum]; args.channels];
    let mut playback = vec![vec![0.0f32; quantum]; args.channels];
    let mut phase = 0.0f32;
    let step = 440.0 / sample_rate as f32;
    let mut peak = 0.0f32;
    let mut sum_sq = 0.0f64;
    let mut rendered_samples = 0usize;
    let mut quanta = 0usize;

    let run_for = Duration::from_secs(args.seconds);
    let started = Instant::now();
    let mut next_deadline = started;

    while started.elapsed() < run_for {
        for i in 0..quantum {
            let s = 0.8 * (TAU * phase).sin();
            for lane in captured.iter_mut() {
                lane[i] = s;
            }
            phase = (phase + step).fract();
        }

        handles.bridge.render_quantum(&captured, &mut playback);
        quanta += 1;

        for lane in &playback {
            for s in lane {
                peak = peak.max(s.abs());
                sum_sq += f64::from(*s) * f64::from(*s);
            }
            rendered_samples += lane.len();
        }

        next_deadline += quantum_period;
        if let Some(wait) = next_deadline.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }

    injecting.store(false, Ordering::Relaxed);
    let _ = injector.join();
    session.stop()?;

    let report = Report {
        config,
        seconds: args.seconds,
        quanta,
        output_peak: peak,
        output_rms: if rendered_samples == 0 {
            0.0
        } else {
            ((sum_sq / rendered_samples as f64) as f32).sqrt()
        },
        bridge: session.bridge_diagnostics_snapshot(),
        worker: session.worker_diagnostics_snapshot(),
    };

    info!(
        quanta = report.quanta,
        underruns = report.bridge.output_underruns,
        overruns = report.bridge.input_overruns,
        cycles = report.worker.cycles,
        "harness finished"
    );

    let json = serde_json::to_string_pretty(&report)?;
    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&out, json)?;
        println!("Wrote harness report: {}", out.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
