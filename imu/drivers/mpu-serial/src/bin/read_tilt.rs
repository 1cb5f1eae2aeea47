use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal;
use log::{info, warn};
use mpu_serial::fallback::{KeyState, TiltInput};
use mpu_serial::{MpuSerialReader, ReaderConfig};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

/// Print the smoothed tilt of a serial MPU board, or arrow-key input when
/// no board answers.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial port to open directly, skipping discovery
    #[arg(short, long)]
    port: Option<String>,

    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,

    /// Refresh rate of the printed value
    #[arg(long, default_value_t = 60)]
    rate_hz: u32,
}

fn connect(reader: &MpuSerialReader, args: &Args) -> bool {
    let connected = match &args.port {
        Some(port) => match reader.connect(port) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to open {}: {}", port, e);
                false
            }
        },
        None => reader.discover_and_connect(),
    };

    if connected && !reader.start() {
        warn!("Failed to start polling {:?}", reader.port_name());
        reader.stop();
        return false;
    }
    connected
}

// Terminals only report presses, so a held key shows up through auto-repeat.
fn poll_keys() -> io::Result<(KeyState, bool)> {
    let mut keys = KeyState::default();
    let mut quit = false;

    while event::poll(Duration::ZERO)? {
        if let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        {
            match code {
                KeyCode::Left | KeyCode::Char('a') => keys.left = true,
                KeyCode::Right | KeyCode::Char('d') => keys.right = true,
                KeyCode::Up | KeyCode::Char('w') => keys.up = true,
                KeyCode::Down | KeyCode::Char('s') => keys.down = true,
                KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => quit = true,
                KeyCode::Esc | KeyCode::Char('q') => quit = true,
                _ => (),
            }
        }
    }

    Ok((keys, quit))
}

fn run(input: &TiltInput<MpuSerialReader>, frame: Duration) -> io::Result<()> {
    let mut stdout = io::stdout();

    loop {
        let (keys, quit) = poll_keys()?;
        if quit {
            break;
        }

        let tilt = input.read(&keys);
        write!(
            stdout,
            "\r{:<15} x: {: >7.3} y: {: >7.3}",
            input.label(),
            tilt.x,
            tilt.y
        )?;
        stdout.flush()?;

        thread::sleep(frame);
    }

    write!(stdout, "\r\n")?;
    Ok(())
}

// Raw mode drops the carriage return from '\n', so log lines from the
// polling thread would smear the status line.
fn with_logging_muted<T>(f: impl FnOnce() -> T) -> T {
    let level = log::max_level();
    log::set_max_level(log::LevelFilter::Off);
    let out = f();
    log::set_max_level(level);
    out
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ReaderConfig::default().with_baud_rate(args.baud);
    let reader = MpuSerialReader::with_config(config)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    if connect(&reader, &args) {
        info!("Reading tilt from {:?}", reader.port_name());
    } else {
        warn!("No MPU found, falling back to keyboard input");
    }
    let input = TiltInput::from_reader(reader);
    let frame = Duration::from_secs_f64(1.0 / f64::from(args.rate_hz.max(1)));

    info!("Press q or Esc to quit");
    terminal::enable_raw_mode()?;
    let result = with_logging_muted(|| run(&input, frame));
    terminal::disable_raw_mode()?;

    input.stop();
    result
}
