use clap::Parser;
use log::{info, trace, warn};
use mpu_serial::{
    parse_orientation_line, Euler, History, ImuError, LineSource, PortProvider, SystemPorts, Vector3,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// At most BURST lines are drained per ~50 Hz refresh.
const BURST: usize = 20;
const REFRESH: Duration = Duration::from_millis(20);

/// Follow `pitch,roll,yaw` lines from an MPU board over a rolling window.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(short, long)]
    port: String,

    #[arg(short, long, default_value_t = 230_400)]
    baud: u32,

    /// Samples kept for the min/max summary
    #[arg(short, long, default_value_t = 200)]
    window: usize,
}

fn pitch_range(window: &History<Euler>) -> (f64, f64) {
    window.iter().fold((f64::MAX, f64::MIN), |(lo, hi), e| {
        let pitch = f64::from(e.pitch);
        (lo.min(pitch), hi.max(pitch))
    })
}

fn main() -> Result<(), ImuError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .map_err(|e| ImuError::DeviceError(e.to_string()))?;
    }

    let mut link = SystemPorts.open(&args.port, args.baud, Duration::from_millis(100))?;
    info!("Reading orientation from {} at {} baud", args.port, args.baud);

    let mut window = History::new(args.window.max(1));
    let nose = Vector3::new(1.0, 0.0, 0.0);
    let mut samples: u64 = 0;

    while running.load(Ordering::SeqCst) {
        let mut fresh = false;
        for _ in 0..BURST {
            match link.read_line() {
                Ok(Some(line)) => match parse_orientation_line(&line) {
                    Ok(orientation) => {
                        window.push(orientation);
                        samples += 1;
                        fresh = true;
                    }
                    Err(e) => trace!("Discarding line: {}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("Read error: {}", e);
                    break;
                }
            }
        }

        if let (true, Some(latest)) = (fresh, window.latest()) {
            let axis = latest.rotate(nose);
            let (lo, hi) = pitch_range(&window);
            info!(
                "#{:<6} pitch {: >7.2} roll {: >7.2} yaw {: >7.2} | nose ({: >5.2}, {: >5.2}, {: >5.2}) | pitch [{:.1}, {:.1}] over {}",
                samples,
                latest.pitch,
                latest.roll,
                latest.yaw,
                axis.x,
                axis.y,
                axis.z,
                lo,
                hi,
                window.len()
            );
        }

        thread::sleep(REFRESH);
    }

    info!("Stopped after {} samples", samples);
    Ok(())
}
