//! Game Boy emulator binary.
//!
//! Runs a cartridge headless for a number of frames, with optional
//! scripted input, PNG capture and battery-save output.

use std::path::{Path, PathBuf};
use std::process;

use emu_gameboy::{GbButton, SessionHandle, SessionTable, TableConfig, capture};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

/// A scripted press: button, first frame, frames held.
struct Press {
    button: GbButton,
    frame: u64,
    hold: u64,
}

struct CliArgs {
    rom_path: Option<PathBuf>,
    ram_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    frames: u32,
    screenshot_path: Option<PathBuf>,
    record_dir: Option<PathBuf>,
    save_ram_path: Option<PathBuf>,
    presses: Vec<Press>,
    serial: bool,
}

/// Parse `<button>@<frame>[:<hold>]`. Hold defaults to 5 frames.
fn parse_press(arg: &str) -> Option<Press> {
    let (name, timing) = arg.split_once('@')?;
    let button = GbButton::from_name(name)?;
    let (frame, hold) = match timing.split_once(':') {
        Some((frame, hold)) => (frame.parse().ok()?, hold.parse().ok()?),
        None => (timing.parse().ok()?, 5),
    };
    Some(Press {
        button,
        frame,
        hold,
    })
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        rom_path: None,
        ram_path: None,
        config_path: None,
        frames: 200,
        screenshot_path: None,
        record_dir: None,
        save_ram_path: None,
        presses: Vec::new(),
        serial: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--rom" => {
                i += 1;
                cli.rom_path = args.get(i).map(PathBuf::from);
            }
            "--ram" => {
                i += 1;
                cli.ram_path = args.get(i).map(PathBuf::from);
            }
            "--config" => {
                i += 1;
                cli.config_path = args.get(i).map(PathBuf::from);
            }
            "--frames" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.frames = s.parse().unwrap_or(200);
                }
            }
            "--screenshot" => {
                i += 1;
                cli.screenshot_path = args.get(i).map(PathBuf::from);
            }
            "--record" => {
                i += 1;
                cli.record_dir = args.get(i).map(PathBuf::from);
            }
            "--save-ram" => {
                i += 1;
                cli.save_ram_path = args.get(i).map(PathBuf::from);
            }
            "--press" => {
                i += 1;
                let value = args.get(i).map_or("", String::as_str);
                match parse_press(value) {
                    Some(press) => cli.presses.push(press),
                    None => {
                        eprintln!("Bad --press value: {value} (expected <button>@<frame>[:<hold>])");
                        process::exit(1);
                    }
                }
            }
            "--serial" => {
                cli.serial = true;
            }
            "--help" | "-h" => {
                eprintln!("Usage: emu-gameboy [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --rom <file>               Game Boy ROM file (.gb)");
                eprintln!("  --ram <file>               Battery save to restore");
                eprintln!("  --config <file>            JSON table config (max_loaded, palette)");
                eprintln!("  --frames <n>               Number of frames to run [default: 200]");
                eprintln!("  --screenshot <file>        Save a PNG of the last frame");
                eprintln!("  --record <dir>             Record every frame to directory");
                eprintln!("  --save-ram <file>          Write the battery save after the run");
                eprintln!("  --press <btn>@<f>[:<hold>] Press a button at frame f (repeatable)");
                eprintln!("  --serial                   Print serial output to stdout");
                eprintln!();
                eprintln!("Set RUST_LOG (e.g. RUST_LOG=emu_gameboy=debug) for logs.");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path, what: &str) -> Vec<u8> {
    std::fs::read(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {what} file {}: {e}", path.display());
        process::exit(1);
    })
}

fn load_config(cli: &CliArgs) -> TableConfig {
    let Some(path) = cli.config_path.as_ref() else {
        return TableConfig::default();
    };
    let text = read_file(path, "config");
    serde_json::from_slice(&text).unwrap_or_else(|e| {
        eprintln!("Invalid config {}: {e}", path.display());
        process::exit(1);
    })
}

fn load_session(cli: &CliArgs, table: &SessionTable) -> SessionHandle {
    let rom_path = cli.rom_path.as_ref().unwrap_or_else(|| {
        eprintln!("No ROM file specified. Use --rom <file.gb>");
        process::exit(1);
    });
    let rom = read_file(rom_path, "ROM");
    let ram = cli
        .ram_path
        .as_ref()
        .map(|path| read_file(path, "RAM"))
        .unwrap_or_default();

    match table.load(&rom, &ram) {
        Ok(handle) => {
            eprintln!("Loaded ROM: {}", rom_path.display());
            handle
        }
        Err(e) => {
            eprintln!("Failed to load ROM: {e}");
            process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Headless run
// ---------------------------------------------------------------------------

fn run(cli: &CliArgs, table: &SessionTable, handle: SessionHandle) {
    table.with_machine(handle, |gb| {
        for press in &cli.presses {
            gb.input_queue()
                .enqueue_button(press.button, press.frame, press.hold);
        }
    });

    if let Some(ref dir) = cli.record_dir {
        if let Err(e) = capture::record(table, handle, dir, cli.frames) {
            eprintln!("Record error: {e}");
            process::exit(1);
        }
        return;
    }

    let mut last = None;
    for _ in 0..cli.frames {
        match table.render_frame(handle) {
            Ok(frame) => last = Some(frame),
            Err(e) => {
                eprintln!("Emulation stopped: {e}");
                break;
            }
        }
    }

    if let Some((micros, rate)) =
        table.with_machine(handle, |gb| (gb.emulated_micros(), gb.frame_rate()))
    {
        eprintln!(
            "Emulated {} ms of machine time ({rate:.2} frames/s)",
            micros / 1000
        );
    }

    if let (Some(path), Some(frame)) = (cli.screenshot_path.as_ref(), last.as_ref()) {
        if let Err(e) = capture::save_screenshot(frame, path) {
            eprintln!("Screenshot error: {e}");
            process::exit(1);
        }
        eprintln!("Screenshot saved to {}", path.display());
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args();
    let table = SessionTable::new(load_config(&cli));
    let handle = load_session(&cli, &table);

    run(&cli, &table, handle);

    if cli.serial {
        let output = table
            .with_machine(handle, |gb| gb.serial_output().to_vec())
            .unwrap_or_default();
        println!("{}", String::from_utf8_lossy(&output));
    }

    let save = table.unload(handle);
    if let Some(path) = cli.save_ram_path.as_ref() {
        match save {
            Some(data) => {
                if let Err(e) = std::fs::write(path, data) {
                    eprintln!("Failed to write save {}: {e}", path.display());
                    process::exit(1);
                }
                eprintln!("Save RAM written to {}", path.display());
            }
            None => eprintln!("Cartridge has no battery; nothing saved"),
        }
    }
}
