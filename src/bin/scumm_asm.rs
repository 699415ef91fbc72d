// scumm-asm - SCUMM v5 script assembler
// Assembles statement listings back into script bytecode

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use scummasm::verify::round_trip;
use scummasm::{Assembler, Config, OpcodeTable};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let mut input_file = "";
    let mut output_file = String::new();
    let mut config_file = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-o" | "--output" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: -o requires a filename");
                    process::exit(1);
                }
                output_file = args[i + 1].clone();
                i += 2;
            }
            "--config" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --config requires a path");
                    process::exit(1);
                }
                config_file = Some(args[i + 1].clone());
                i += 2;
            }
            "-v" | "--verbose" => {
                verbose = true;
                i += 1;
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option '{}'", arg);
                print_usage(&args[0]);
                process::exit(1);
            }
            _ => {
                if input_file.is_empty() {
                    input_file = &args[i];
                } else {
                    eprintln!("Error: Multiple input files specified");
                    process::exit(1);
                }
                i += 1;
            }
        }
    }

    let filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if input_file.is_empty() {
        eprintln!("Error: No input file specified");
        print_usage(&args[0]);
        process::exit(1);
    }

    if output_file.is_empty() {
        let input_path = Path::new(input_file);
        let base_name = input_path.file_stem().unwrap_or_else(|| {
            eprintln!("Error: Invalid input filename");
            process::exit(1);
        });
        output_file = format!("{}.bin", base_name.to_string_lossy());
    }

    let config = match &config_file {
        Some(path) => match Config::load(Path::new(path)) {
            Ok(config) => Some(config),
            Err(err) => {
                eprintln!("Error: {}", err);
                process::exit(1);
            }
        },
        None => None,
    };

    if verbose {
        println!("Assembling {} -> {}", input_file, output_file);
    }

    let source = match fs::read_to_string(input_file) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error reading '{}': {}", input_file, err);
            process::exit(1);
        }
    };

    let table = OpcodeTable::standard();
    let bytes = match Assembler::new(table).assemble(&source) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("Assembly error: {}", err);
            process::exit(1);
        }
    };

    // The produced bytes must survive their own disassembly.
    if let Some(config) = config.as_ref().filter(|c| c.verify.round_trip) {
        match round_trip(table, &config.disassembly, &bytes, false) {
            Ok(report) if !report.is_identical() => {
                eprintln!("Warning: output does not survive a round trip");
            }
            Ok(_) => {}
            Err(err) => eprintln!("Warning: output does not disassemble: {}", err),
        }
    }

    if let Err(err) = fs::write(&output_file, &bytes) {
        eprintln!("Error writing '{}': {}", output_file, err);
        process::exit(1);
    }

    if verbose {
        println!("Assembled {} bytes to {}", bytes.len(), output_file);
    }
}

fn print_usage(program_name: &str) {
    println!("Usage: {} [options] <input.scu>", program_name);
    println!();
    println!("Options:");
    println!("  -o, --output <file>    Output filename (default: input.bin)");
    println!("  --config <path>        TOML configuration file");
    println!("  -v, --verbose          Verbose output");
    println!("  -h, --help             Show this help message");
}
