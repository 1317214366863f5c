//! Reads the period blocks of one list dataset from an input file and writes
//! them back out in canonical form.
//!
//! ```text
//! listdata [--shape NLAY,NROW,NCOL] <schema.json> <package> <dataset> <input-file> [settings-file]
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use listdata::config::Settings;
use listdata::context::{ModelContext, PackageDimensions};
use listdata::grid::{ModelGrid, StructuredGrid};
use listdata::reader::BlockHeader;
use listdata::storage::read_text_file;
use listdata::structure::SchemaRepository;
use listdata::transient::TransientDataList;
use listdata::{ListError, Result};

const USAGE: &str = "usage: listdata [--shape NLAY,NROW,NCOL] <schema.json> <package> <dataset> <input-file> [settings-file]";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let shape = match take_shape(&mut args) {
        Ok(shape) => shape,
        Err(message) => {
            eprintln!("{}\n{}", message, USAGE);
            return ExitCode::from(2);
        }
    };
    if args.len() < 4 {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    }
    match run(&args, shape) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "reformatting failed");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn take_shape(args: &mut Vec<String>) -> std::result::Result<Option<Vec<usize>>, String> {
    let Some(position) = args.iter().position(|a| a == "--shape") else {
        return Ok(None);
    };
    args.remove(position);
    if position >= args.len() {
        return Err(String::from("--shape needs a value"));
    }
    let value = args.remove(position);
    let shape: std::result::Result<Vec<usize>, _> = value.split(',').map(|n| n.trim().parse::<usize>()).collect();
    match shape {
        Ok(shape) if (1..=3).contains(&shape.len()) => Ok(Some(shape)),
        _ => Err(format!("invalid grid shape \"{}\"", value)),
    }
}

fn grid_of(shape: &[usize]) -> Arc<dyn ModelGrid> {
    match shape {
        [nlay, nrow, ncol] => Arc::new(StructuredGrid::dis(*nlay, *nrow, *ncol)),
        [nlay, ncpl] => Arc::new(StructuredGrid::disv(*nlay, *ncpl)),
        _ => Arc::new(StructuredGrid::disu(shape.iter().product())),
    }
}

fn run(args: &[String], shape: Option<Vec<usize>>) -> Result<String> {
    let settings = Settings::load(args.get(4).map(Path::new))?;
    let schema = SchemaRepository::from_json(&read_text_file(Path::new(&args[0]))?)?;
    let structure = schema
        .dataset(&args[1], &args[2])
        .ok_or_else(|| ListError::Schema(format!("no dataset \"{}\" in package \"{}\"", args[2], args[1])))?;
    let content = read_text_file(Path::new(&args[3]))?;

    let headers: Vec<BlockHeader> = content
        .lines()
        .filter_map(BlockHeader::parse)
        .filter(|h| h.name().eq_ignore_ascii_case(structure.block()))
        .collect();
    let stress_periods = headers.iter().filter_map(BlockHeader::period).max().unwrap_or(1);

    let mut context = ModelContext::new(settings).with_stress_periods(stress_periods);
    context = match shape {
        Some(shape) => context.with_model("model", grid_of(&shape)),
        None => context.with_package(PackageDimensions::new().with_dimension("ncelldim", 3)),
    };
    let mut transient = TransientDataList::new(structure, Arc::new(context));

    let mut lines = content.lines().map(str::to_string);
    let mut loaded = Vec::new();
    while let Some(line) = lines.next() {
        let Some(header) = BlockHeader::parse(&line) else {
            continue;
        };
        if !header.name().eq_ignore_ascii_case(transient.structure().block()) {
            continue;
        }
        let Some(first_line) = lines.next() else {
            break;
        };
        let result = transient.load(&first_line, &mut lines, &header, None)?;
        loaded.push(header);
        if !result.complete {
            break;
        }
    }
    info!(blocks = loaded.len(), "blocks loaded");

    let mut output = String::new();
    for header in &loaded {
        let period = header.period().unwrap_or(1);
        output.push_str(&format!("BEGIN {} {}\n", header.name().to_uppercase(), period));
        output.push_str(&transient.get_file_entry(period.saturating_sub(1))?);
        output.push_str(&format!("END {}\n\n", header.name().to_uppercase()));
    }
    Ok(output)
}
