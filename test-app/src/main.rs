// trx test application -- CLI tool for exercising a device session and the
// radio I/O loop against the mock peripheral.
//
// Usage:
//   trx-test-app info
//   trx-test-app --device-rate 400000 --baseband-rate 1625000/6 info
//   trx-test-app run --cycles 500 --pa-off-cycles 20
//   trx-test-app --log-level debug run --cycles 50 --fault-prob 0.05 --seed 7
//   trx-test-app resample --blocks 10

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::Level;

use trx::dsp::{ResampleRatio, ResamplingStage};
use trx::mock::MockRadio;
use trx::{
    AsyncEvent, AsyncEventCode, BasebandReceiver, Complex32, IqSample, PaController, RadioIoLoop,
    SampleRate, SessionBuilder, SessionEvent, baseband_channels,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// trx test application -- exercises the timed sample I/O layer.
#[derive(Parser)]
#[command(name = "trx-test-app", version, about)]
struct Cli {
    /// Device streaming rate in Hz, as "n" or "n/d".
    #[arg(long, default_value = "400000")]
    device_rate: SampleRate,

    /// Baseband rate in Hz, as "n" or "n/d".
    #[arg(long, default_value = "1625000/6")]
    baseband_rate: SampleRate,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the rate conversion geometry.
    Info,

    /// Run the I/O loop as a loopback repeater on the mock peripheral.
    Run {
        /// Number of pull/push cycles.
        #[arg(long, default_value_t = 200)]
        cycles: u32,

        /// Cycles to run with the amplifier off before switching it on.
        #[arg(long, default_value_t = 10)]
        pa_off_cycles: u32,

        /// Probability per cycle of injecting a transmit underflow.
        #[arg(long, default_value_t = 0.0)]
        fault_prob: f64,

        /// Samples per mock receive packet.
        #[arg(long, default_value_t = 2040)]
        spp: usize,

        /// Device samples the transmit stream runs ahead of receive.
        #[arg(long, default_value_t = 4000)]
        tx_lead: u64,

        /// Seed for fault injection; random when omitted.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Push a tone through both resamplers and report the level.
    Resample {
        /// Number of receive chunks to convert.
        #[arg(long, default_value_t = 10)]
        blocks: usize,
    },
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_info(device_rate: SampleRate, baseband_rate: SampleRate) -> Result<()> {
    let stage = ResamplingStage::new(device_rate, baseband_rate)
        .context("rates cannot be converted")?;
    let rx = stage.rx_ratio();

    println!("Device rate:     {device_rate}");
    println!("Baseband rate:   {baseband_rate}");
    println!("RX ratio (P/Q):  {rx}");
    println!("TX ratio (P/Q):  {}", stage.tx_ratio());
    println!(
        "RX chunk:        {} -> {} samples",
        stage.rx_input_chunk(),
        rx.output_len(stage.rx_input_chunk())
    );
    println!(
        "TX chunk:        {} -> {} samples",
        stage.tx_input_chunk(),
        stage.tx_output_chunk()
    );
    Ok(())
}

struct RunOptions {
    cycles: u32,
    pa_off_cycles: u32,
    fault_prob: f64,
    spp: usize,
    tx_lead: u64,
    seed: Option<u64>,
}

async fn cmd_run(
    device_rate: SampleRate,
    baseband_rate: SampleRate,
    opts: RunOptions,
) -> Result<()> {
    if !(0.0..=1.0).contains(&opts.fault_prob) {
        bail!("--fault-prob must be within 0.0..=1.0");
    }
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mock = Arc::new(MockRadio::new());
    mock.set_synthetic_stream(opts.spp, 0);

    let mut session = SessionBuilder::new()
        .device_rate(device_rate)
        .baseband_rate(baseband_rate)
        .build(mock.clone())?;
    let mut events = session.subscribe();
    session.open().await?;
    session.start().await?;

    let pa = Arc::new(PaController::new());
    let (rx_sink, mut rx_out) = baseband_channels(64);
    let (tx_in, tx_source) = baseband_channels(64);
    let mut io = RadioIoLoop::new(session, pa.clone(), rx_sink, tx_source)?;
    io.set_write_cursor(opts.tx_lead);

    println!("Loopback: {} cycles, PA off for the first {}", opts.cycles, opts.pa_off_cycles);

    let start = Instant::now();
    let mut rx_samples = 0usize;
    let mut injected = 0u32;
    for cycle in 1..=opts.cycles {
        if cycle == opts.pa_off_cycles + 1 {
            pa.on();
        }

        io.pull_buffer()
            .await
            .with_context(|| format!("pull cycle {cycle} failed"))?;
        // Repeat what was received.
        while let Some(block) = next_block(&mut rx_out)? {
            rx_samples += block.len();
            tx_in.send(block).await?;
            io.push_buffer()
                .await
                .with_context(|| format!("push cycle {cycle} failed"))?;
        }

        if opts.fault_prob > 0.0 && rng.gen_bool(opts.fault_prob) {
            mock.push_async_event(AsyncEvent::new(AsyncEventCode::Underflow));
            injected += 1;
        }
    }
    let elapsed = start.elapsed();

    let read_cursor = io.read_cursor();
    let write_cursor = io.write_cursor();
    let mut session = io.into_session();
    session.close().await?;

    let (mut lost, mut realigned, mut dropped, mut overflowed) = (0u32, 0u32, 0u32, 0u64);
    loop {
        match events.try_recv() {
            Ok(SessionEvent::AlignmentLost { .. }) => lost += 1,
            Ok(SessionEvent::Realigned { dropped: n }) => {
                realigned += 1;
                dropped += n;
            }
            Ok(SessionEvent::RxOverflow { lost }) => overflowed += lost,
            Ok(SessionEvent::Started | SessionEvent::Stopped) => {}
            Err(TryRecvError::Lagged(missed)) => {
                eprintln!("Warning: {missed} session events missed");
            }
            Err(_) => break,
        }
    }

    let sent = mock.sent_packets();
    println!();
    println!("Results:");
    println!("  Read cursor:       {read_cursor}");
    println!("  Write cursor:      {write_cursor}");
    println!("  Baseband received: {rx_samples} samples");
    println!("  Packets sent:      {} ({} samples)", sent.len(), mock.sent_samples());
    println!("  Faults injected:   {injected}");
    println!("  Alignment lost:    {lost}");
    println!("  Realignments:      {realigned} ({dropped} packets dropped)");
    println!("  RX overflow:       {overflowed} samples");
    println!("  Elapsed:           {:.3} s", elapsed.as_secs_f64());

    // Transmit timestamps must be contiguous apart from gated and dropped
    // cycles, which only ever skip forward.
    for pair in sent.windows(2) {
        let expected = pair[0].timestamp + pair[0].samples.len() as u64;
        if pair[1].timestamp < expected {
            bail!(
                "transmit packet at {} overlaps previous packet ending at {expected}",
                pair[1].timestamp
            );
        }
    }
    Ok(())
}

fn next_block(rx: &mut BasebandReceiver) -> Result<Option<trx::BasebandBuffer>> {
    Ok(rx.try_recv()?)
}

fn cmd_resample(device_rate: SampleRate, baseband_rate: SampleRate, blocks: usize) -> Result<()> {
    let ratio = ResampleRatio::between(device_rate, baseband_rate)?;
    let mut stage = ResamplingStage::new(device_rate, baseband_rate)?;
    let chunk = stage.rx_input_chunk();

    let amplitude = 10_000.0f32;
    let step = 0.01f32;
    let mut baseband = Vec::new();
    let mut device = Vec::new();
    for b in 0..blocks {
        let tone: Vec<IqSample> = (0..chunk)
            .map(|n| {
                let ph = (b * chunk + n) as f32 * step;
                IqSample::from_complex_saturating(Complex32::from_polar(amplitude, ph))
            })
            .collect();
        let start = baseband.len();
        stage.rx_convert(&tone, &mut baseband);
        stage.tx_convert(&baseband[start..], &mut device);
    }

    let settled = |s: &[Complex32]| -> f32 {
        let tail = &s[s.len() / 2..];
        tail.iter().map(|c| c.norm()).sum::<f32>() / tail.len().max(1) as f32
    };
    let device_c: Vec<Complex32> = device.iter().map(|s| s.to_complex()).collect();

    println!("Ratio:            {ratio}");
    println!("Device in:        {} samples", blocks * chunk);
    println!("Baseband out:     {} samples", baseband.len());
    println!("Round-trip out:   {} samples", device.len());
    println!("Input level:      {amplitude:.1}");
    println!("Baseband level:   {:.1}", settled(&baseband));
    println!("Round-trip level: {:.1}", settled(&device_c));
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();

    match cli.command {
        Command::Info => cmd_info(cli.device_rate, cli.baseband_rate),
        Command::Run {
            cycles,
            pa_off_cycles,
            fault_prob,
            spp,
            tx_lead,
            seed,
        } => {
            let opts = RunOptions {
                cycles,
                pa_off_cycles,
                fault_prob,
                spp,
                tx_lead,
                seed,
            };
            cmd_run(cli.device_rate, cli.baseband_rate, opts).await
        }
        Command::Resample { blocks } => cmd_resample(cli.device_rate, cli.baseband_rate, blocks),
    }
}
