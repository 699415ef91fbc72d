use log::debug;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process;

use scummasm::verify::round_trip;
use scummasm::{Config, Disassembler, OpcodeTable};

fn parse_number(text: &str) -> Option<usize> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn option_value(args: &[String], i: usize) -> &str {
    match args.get(i + 1) {
        Some(value) => value.as_str(),
        None => {
            eprintln!("Error: {} requires a value", args[i]);
            process::exit(1);
        }
    }
}

fn number_value(args: &[String], i: usize) -> usize {
    let value = option_value(args, i);
    parse_number(value).unwrap_or_else(|| {
        eprintln!("Error: {} expects a number, got '{}'", args[i], value);
        process::exit(1);
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();

    let mut offset = 0usize;
    let mut length = None;
    let mut annotate = false;
    let mut recursive = false;
    let mut verify = false;
    let mut config_file = None;
    let mut filename = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--offset" => {
                offset = number_value(&args, i);
                i += 1;
            }
            "--length" => {
                length = Some(number_value(&args, i));
                i += 1;
            }
            "--config" => {
                config_file = Some(option_value(&args, i).to_string());
                i += 1;
            }
            "-a" => annotate = true,
            "--recursive" => recursive = true,
            "--verify" => verify = true,
            "-h" | "--help" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                filename = Some(arg.to_string());
                break;
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let filename = filename.unwrap_or_else(|| {
        eprintln!("Usage: {} [options] <script-file>", args[0]);
        eprintln!("Try '{} -h' for help", args[0]);
        process::exit(1);
    });

    let mut config = match &config_file {
        Some(path) => Config::load(Path::new(path))?,
        None => Config::default(),
    };
    if annotate {
        config.disassembly.annotate = true;
    }
    // A config file may ask for verification; without one it is opt-in.
    let verify = verify || (config_file.is_some() && config.verify.round_trip);

    let mut file = File::open(&filename)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    debug!("Loaded {} bytes from {}", data.len(), filename);

    let end = match length {
        Some(length) => offset.checked_add(length),
        None => Some(data.len()),
    };
    let bytes = match end.and_then(|end| data.get(offset..end)) {
        Some(bytes) => bytes,
        None => {
            eprintln!(
                "Error: range {}+{:?} lies outside the {} byte file",
                offset,
                length,
                data.len()
            );
            process::exit(1);
        }
    };

    let table = OpcodeTable::standard();
    let disasm = Disassembler::new(table, config.disassembly.clone());
    let output = match disasm.disassemble(bytes, recursive) {
        Ok(output) => output,
        Err(err) => {
            eprintln!("Disassembly error: {}", err);
            process::exit(1);
        }
    };
    print!("{output}");

    if verify {
        match round_trip(table, &config.disassembly, bytes, recursive) {
            Ok(report) => match report.first_difference() {
                None => eprintln!("Round trip: identical ({} bytes)", bytes.len()),
                Some(at) => eprintln!("Round trip: MISMATCH at offset 0x{:04x}", at),
            },
            Err(err) => eprintln!("Round trip: listing does not reassemble: {}", err),
        }
    }

    Ok(())
}

fn print_usage(program_name: &str) {
    eprintln!("Usage: {} [options] <script-file>", program_name);
    eprintln!("\nOptions:");
    eprintln!("  --offset N       Start of the script in the file (decimal or 0x hex)");
    eprintln!("  --length N       Script length in bytes (default: rest of file)");
    eprintln!("  -a               Annotate statements with offset and opcode");
    eprintln!("  --recursive      Treat the script as recursive (no terminal line)");
    eprintln!("  --verify         Reassemble the listing and compare the bytes");
    eprintln!("  --config PATH    TOML configuration file");
    eprintln!("  -h               Show this help message");
}
