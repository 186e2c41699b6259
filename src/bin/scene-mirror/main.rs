//! scene-mirror CLI - Tool for inspecting session folders and documents.

use std::env;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use scene_mirror::connection::{parse_session_number, Connection, ConnectionSettings, LocalConnection};
use scene_mirror::document::{compose, decode, detect, encode, Encoding};
use scene_mirror::volume::{read_grids, GRID_EXTENSION};
use scene_mirror::Logger;

const BUILD_STAMP: &str = env!("SCENE_MIRROR_BUILD_STAMP");

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    init_tracing(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        "sessions" | "s" => match filtered_args.get(1) {
            Some(dir) => cmd_sessions(dir),
            None => usage("scene-mirror sessions <dir>"),
        },
        "dump" | "d" => match filtered_args.get(1) {
            Some(doc) => cmd_dump(doc),
            None => usage("scene-mirror dump <document>"),
        },
        "flatten" | "f" => match filtered_args.get(1..4) {
            Some(&[delta, canonical, out]) => cmd_flatten(delta, canonical, out),
            _ => usage("scene-mirror flatten <delta> <canonical> <out>"),
        },
        "grid" | "g" => match filtered_args.get(1) {
            Some(file) => cmd_grid(file),
            None => usage(&format!("scene-mirror grid <file.{}>", GRID_EXTENSION)),
        },
        "version" | "-V" | "--version" => {
            println!("scene-mirror {} ({})", env!("CARGO_PKG_VERSION"), BUILD_STAMP);
            Ok(())
        }
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn usage(text: &str) -> Result<()> {
    bail!("missing argument\nUsage: {}", text)
}

fn print_help() {
    println!("scene-mirror - Scene session toolkit");
    println!();
    println!("USAGE:");
    println!("    scene-mirror [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    s, sessions <dir>                     List Session_<N> folders");
    println!("    d, dump     <document>                Print a document as text");
    println!("    f, flatten  <delta> <canonical> <out> Compose a delta over a document");
    println!("    g, grid     <file.{}>              Summarize a voxel grid file", GRID_EXTENSION);
    println!("    version                               Show version and build stamp");
    println!("    h, help                               Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!();
    println!("NOTES:");
    println!("    - RUST_LOG overrides the verbosity flags");
}

fn cmd_sessions(dir: &str) -> Result<()> {
    let mut conn = LocalConnection::new(Logger::tracing_only());
    let settings = ConnectionSettings {
        host: String::new(),
        working_directory: dir.to_string(),
        check_write_permissions: false,
    };
    if !conn.initialize(&settings) {
        bail!("cannot open '{}'", dir);
    }

    let mut sessions: Vec<(i32, String)> = conn
        .list_entries("")
        .into_iter()
        .filter(|e| !e.is_file)
        .filter_map(|e| parse_session_number(e.name()).map(|n| (n, e.path.clone())))
        .collect();
    sessions.sort();

    for (_, path) in &sessions {
        let entries = conn.list_entries(path);
        println!("{:<16} {} entries", path, entries.len());
    }
    match conn.max_session_number() {
        n if n >= 0 => println!("latest session: {}", n),
        _ => println!("no sessions"),
    }
    conn.shutdown();
    Ok(())
}

fn read_document(path: &str) -> Result<(Encoding, scene_mirror::document::Layer)> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read '{}'", path))?;
    let encoding = detect(&bytes);
    debug!("{}: {:?} encoding, {} bytes", path, encoding, bytes.len());
    let layer = decode(&bytes).with_context(|| format!("cannot decode '{}'", path))?;
    Ok((encoding, layer))
}

fn cmd_dump(path: &str) -> Result<()> {
    let (_, layer) = read_document(path)?;
    let text = encode(&layer, Encoding::Text)?;
    println!("{}", String::from_utf8_lossy(&text));
    Ok(())
}

fn cmd_flatten(delta: &str, canonical: &str, out: &str) -> Result<()> {
    let (_, strong) = read_document(delta)?;
    let (encoding, weak) = read_document(canonical)?;
    let flat = compose(&strong, &weak);

    let bytes = encode(&flat, encoding)?;
    std::fs::write(out, bytes).with_context(|| format!("cannot write '{}'", out))?;
    info!("flattened {} prims into {}", flat.prims.len(), out);
    Ok(())
}

fn cmd_grid(path: &str) -> Result<()> {
    let ext_ok = Path::new(path)
        .extension()
        .is_some_and(|e| e == GRID_EXTENSION);
    if !ext_ok {
        debug!("{} does not carry the .{} extension", path, GRID_EXTENSION);
    }
    let bytes = std::fs::read(path).with_context(|| format!("cannot read '{}'", path))?;
    let file = read_grids(&bytes).with_context(|| format!("cannot parse '{}'", path))?;

    println!("{}: {} grid(s)", path, file.grids.len());
    for grid in &file.grids {
        println!(
            "  {:<16} {:<6} {:>8} leaves {:>10} active voxels",
            grid.name(),
            grid.value_type().name(),
            grid.leaf_count(),
            grid.active_voxel_count()
        );
    }
    Ok(())
}
