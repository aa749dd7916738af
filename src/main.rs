use std::{fs, io, path::PathBuf, process::ExitCode};

use anyhow::Context;
use log::{error, info, LevelFilter};

use vmsim::{report::Report, synth::SynthTrace, trace, Config, Trace};

const DEFAULT_TRACE: &str = "trace.out";

fn main() -> ExitCode {
    let mut args = pico_args::Arguments::from_env();
    let verbose = args.contains(["-v", "--verbose"]);
    env_logger::Builder::new()
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    match run(args, verbose) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(mut args: pico_args::Arguments, verbose: bool) -> anyhow::Result<()> {
    let heartbeat_int: u64 = args
        .opt_value_from_str("-h")
        .context("-h should be an integer")?
        .unwrap_or(0);
    let synth_refs: Option<usize> = args
        .opt_value_from_str("-s")
        .context("-s should be an integer")?;
    let seed: u64 = args
        .opt_value_from_str("--seed")
        .context("--seed should be an integer")?
        .unwrap_or(0);
    let records_per_block: usize = args
        .opt_value_from_str("--buffer-size")
        .context("--buffer-size must be an integer")?
        .unwrap_or(1024 * 16);
    let blocks_per_queue: usize = args
        .opt_value_from_str("--queue-size")
        .context("--queue-size must be an integer")?
        .unwrap_or(32);
    let inline_config: Option<String> = args.opt_value_from_str("--config")?;
    let config_path: Option<PathBuf> = args.opt_value_from_str("-p")?;
    let trace_path: Option<PathBuf> = args.opt_value_from_str("-t")?;
    let emit_path: Option<PathBuf> = args.opt_value_from_str("--emit")?;
    let stats_path: Option<PathBuf> = args.opt_value_from_str("--json")?;
    for extra in args.finish() {
        error!("ignoring unexpected argument {:?}", extra);
    }

    let loaded = match (inline_config, config_path) {
        (Some(json), _) => Some(Config::from_json(&json)),
        (None, Some(path)) => Some(Config::load(&path)),
        (None, None) => None,
    };
    let config = match loaded {
        Some(Ok((config, rejected))) => {
            if !rejected.is_empty() {
                info!("{} config value(s) rejected, defaults kept", rejected.len());
            }
            config
        }
        Some(Err(err)) => {
            error!("{}; using default parameters", err);
            Config::default()
        }
        None => Config::default(),
    };
    info!(
        "{} frames ({}), TLB {} ({}), {} page table, working-set window {}",
        config.num_frames,
        config.frame_repl,
        config.tlb_entries,
        config.tlb_repl,
        config.page_table,
        config.wsw
    );

    let synth = synth_refs.map(|references| SynthTrace {
        seed,
        references,
        processes: config.num_processes,
        ..SynthTrace::default()
    });

    if let Some(emit_path) = emit_path {
        let synth = synth.context("--emit needs -s <references>")?;
        let file = fs::File::create(&emit_path)
            .with_context(|| format!("cannot create {}", emit_path.display()))?;
        trace::write_events(io::BufWriter::new(file), synth.events())?;
        info!("wrote {} references to {}", synth.references, emit_path.display());
        return Ok(());
    }

    let trace = match (trace_path, synth) {
        (Some(path), _) => Trace::open(path.clone(), records_per_block, blocks_per_queue)
            .with_context(|| format!("cannot open trace {}", path.display()))?,
        (None, Some(synth)) => Trace::from_events(synth.events()),
        (None, None) => {
            info!("no trace given, loading {}", DEFAULT_TRACE);
            Trace::open(DEFAULT_TRACE.into(), records_per_block, blocks_per_queue)
                .with_context(|| format!("cannot open default trace {}", DEFAULT_TRACE))?
        }
    };

    let mut sim = config.to_simulator();
    let mut report = Report::new(verbose, heartbeat_int);
    sim.run(trace.records(), &mut report)?;

    let stats = sim.make_stats();
    match stats_path {
        Some(path) => {
            let stats_file = fs::File::create(&path)
                .with_context(|| format!("cannot open output file {}", path.display()))?;
            serde_json::to_writer_pretty(stats_file, &stats)?;
        }
        None => println!("{}", serde_json::to_string_pretty(&stats)?),
    }
    Ok(())
}
