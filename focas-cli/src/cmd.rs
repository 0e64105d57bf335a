//! Command implementations: one session per invocation.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use focas::{
    Handle, HandleManager, MachineStatus, OverrideKind, PositionKind, ReleaseOutcome, Transport,
    format_hms, normalize_program_text,
};
use serde::Serialize;

use crate::config::Config;
use crate::{Command, OutputFormat};

#[derive(Args)]
pub(crate) struct PositionArgs {
    /// Coordinate system.
    #[arg(long, default_value = "absolute")]
    kind: Kind,

    /// Number of axes to request.
    #[arg(long, default_value_t = 8)]
    axes: usize,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Kind {
    Absolute,
    Relative,
    Machine,
    Distance,
}

impl From<Kind> for PositionKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Absolute => Self::Absolute,
            Kind::Relative => Self::Relative,
            Kind::Machine => Self::Machine,
            Kind::Distance => Self::DistanceToGo,
        }
    }
}

#[derive(Args)]
pub(crate) struct UploadArgs {
    /// Program number; defaults to the executing program.
    program: Option<u32>,

    /// Write the program to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep the text exactly as received.
    #[arg(long)]
    raw: bool,
}

#[derive(Args)]
pub(crate) struct WatchArgs {
    /// Poll interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

/// Connects, runs `command` and always releases the handle.
pub(crate) fn run<T: Transport>(
    transport: T,
    config: &Config,
    command: Command,
    format: OutputFormat,
) -> Result<()> {
    let target = config.target();
    let manager = HandleManager::new(transport);
    let handle = manager
        .connect(&target)
        .with_context(|| format!("connecting to {}", target.peer()))?;

    let result = execute(&manager, handle, config, command, format);

    match manager.release(handle) {
        Ok(ReleaseOutcome::PartialCleanup { cause }) => {
            tracing::warn!(error = %cause, "session closed with partial cleanup");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "release failed"),
    }
    result
}

fn execute<T: Transport>(
    m: &HandleManager<T>,
    h: Handle,
    config: &Config,
    command: Command,
    format: OutputFormat,
) -> Result<()> {
    match command {
        Command::Status => status(m, h, format),
        Command::Info => info(m, h, format),
        Command::Axes => axes(m, h, format),
        Command::Position(args) => position(m, h, &args, format),
        Command::Program => program(m, h, format),
        Command::Upload(args) => upload(m, h, config, &args, format),
        Command::Alarms { max } => alarms(m, h, max, format),
        Command::Feed => feed(m, h, format),
        Command::Spindles => spindles(m, h, format),
        Command::Counters => counters(m, h, format),
        Command::Watch(args) => watch(m, h, &args, format),
        Command::GenConfig { .. } | Command::Completion { .. } => Ok(()),
    }
}

fn print_json<S: Serialize>(value: &S) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn status<T: Transport>(m: &HandleManager<T>, h: Handle, format: OutputFormat) -> Result<()> {
    let s = m.machine_status(h).context("reading status")?;
    if matches!(format, OutputFormat::Json) {
        return print_json(&s);
    }
    println!("type:      {}", s.tm_mode);
    println!("mode:      {}", s.mode);
    println!("run:       {}", s.run);
    println!("motion:    {}", s.motion);
    println!("mstb:      {}", if s.mstb_fin { "FIN" } else { "---" });
    println!("emergency: {}", s.emergency);
    println!("alarm:     {}", s.alarm);
    println!("editing:   {}", s.edit);
    Ok(())
}

fn info<T: Transport>(m: &HandleManager<T>, h: Handle, format: OutputFormat) -> Result<()> {
    let i = m.system_info(h).context("reading system info")?;
    if matches!(format, OutputFormat::Json) {
        return print_json(&i);
    }
    println!("model:     {}", i.model());
    println!("cnc type:  {} {}", i.cnc_type, i.mt_type);
    println!("max axes:  {}", i.max_axes);
    match i.axes {
        Some(n) => println!("axes:      {n}"),
        None => println!("axes:      unknown"),
    }
    Ok(())
}

fn axes<T: Transport>(m: &HandleManager<T>, h: Handle, format: OutputFormat) -> Result<()> {
    let names = m.axis_names(h).context("reading axis names")?;
    if matches!(format, OutputFormat::Json) {
        let names: Vec<String> = names.iter().map(ToString::to_string).collect();
        return print_json(&names);
    }
    println!("INDEX  NAME");
    for (i, name) in names.iter().enumerate() {
        println!("{i:<6} {name}");
    }
    Ok(())
}

fn position<T: Transport>(
    m: &HandleManager<T>,
    h: Handle,
    args: &PositionArgs,
    format: OutputFormat,
) -> Result<()> {
    let snap = m
        .position(h, args.kind.into(), args.axes)
        .context("reading position")?;
    if matches!(format, OutputFormat::Json) {
        return print_json(&snap);
    }
    println!("{:<6} {:>14}", "AXIS", snap.kind.to_string().to_uppercase());
    for v in &snap.values {
        let decimals = usize::try_from(v.decimals).unwrap_or(0);
        println!("{:<6} {:>14.*}", v.name.to_string(), decimals, v.value);
    }
    Ok(())
}

fn program<T: Transport>(m: &HandleManager<T>, h: Handle, format: OutputFormat) -> Result<()> {
    let prog = m.executing_program(h).context("reading executing program")?;
    let block = m.executing_block(h).context("reading executing block")?;
    if matches!(format, OutputFormat::Json) {
        let obj = serde_json::json!({
            "name": prog.name,
            "number": prog.number,
            "block": block.block,
            "line": block.text,
        });
        return print_json(&obj);
    }
    println!("program:   {} ({})", prog.name, prog.number);
    println!("block:     {}", block.block);
    println!("line:      {}", block.text);
    Ok(())
}

fn upload<T: Transport>(
    m: &HandleManager<T>,
    h: Handle,
    config: &Config,
    args: &UploadArgs,
    format: OutputFormat,
) -> Result<()> {
    let raw = match args.program {
        None => m
            .upload_executing_program_raw(h)
            .context("uploading executing program")?,
        Some(number) => {
            let mut session = m
                .start_upload(h, number)
                .with_context(|| format!("starting upload of O{number}"))?;
            let mut raw = Vec::new();
            let read = session.read_to_end(&mut raw);
            let ended = session.end();
            read.with_context(|| format!("reading O{number}"))?;
            ended.with_context(|| format!("ending upload of O{number}"))?;
            raw
        }
    };
    let text = if config.upload.normalize && !args.raw {
        normalize_program_text(&raw)
    } else {
        String::from_utf8_lossy(&raw).into_owned()
    };

    if let Some(path) = &args.output {
        std::fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), bytes = text.len(), "program saved");
        return Ok(());
    }
    if matches!(format, OutputFormat::Json) {
        return print_json(&serde_json::json!({ "program": args.program, "text": text }));
    }
    println!("{text}");
    Ok(())
}

fn alarms<T: Transport>(
    m: &HandleManager<T>,
    h: Handle,
    max: usize,
    format: OutputFormat,
) -> Result<()> {
    let list = m.alarms(h, max).context("reading alarms")?;
    if matches!(format, OutputFormat::Json) {
        return print_json(&list);
    }
    if list.is_empty() {
        println!("No alarms.");
        return Ok(());
    }
    println!("TYPE   NUMBER AXIS  MESSAGE");
    for a in &list {
        println!(
            "{:<6} {:>6} {:>4}  {}",
            a.kind.to_string(),
            a.number,
            a.axis,
            a.message
        );
    }
    Ok(())
}

fn feed<T: Transport>(m: &HandleManager<T>, h: Handle, format: OutputFormat) -> Result<()> {
    let actual = m.actual_feed_rate(h).context("reading feed rate")?;
    let feed = m
        .override_percentage(h, OverrideKind::Feed)
        .context("reading feed override")?;
    let jog = m
        .override_percentage(h, OverrideKind::Jog)
        .context("reading jog override")?;
    if matches!(format, OutputFormat::Json) {
        return print_json(&serde_json::json!({
            "actual": actual,
            "feed_override": feed,
            "jog_override": jog,
        }));
    }
    println!("actual:    {actual}");
    println!("override:  {feed}%");
    println!("jog:       {jog}%");
    Ok(())
}

fn spindles<T: Transport>(m: &HandleManager<T>, h: Handle, format: OutputFormat) -> Result<()> {
    let list = m.spindles(h).context("reading spindles")?;
    if matches!(format, OutputFormat::Json) {
        return print_json(&list);
    }
    println!("SPINDLE      LOAD      SPEED  OVERRIDE");
    for s in &list {
        let ovr = s.override_percent.map_or_else(|| "-".to_owned(), |p| format!("{p}%"));
        println!("{:<7} {:>9.1} {:>10.0}  {ovr:>8}", s.number, s.load, s.speed);
    }
    Ok(())
}

fn counters<T: Transport>(m: &HandleManager<T>, h: Handle, format: OutputFormat) -> Result<()> {
    let c = m.parameter_counters(h).context("reading counters")?;
    if matches!(format, OutputFormat::Json) {
        return print_json(&c);
    }
    let time = |v: Option<i64>| v.map_or_else(|| "-".to_owned(), format_hms);
    match c.parts_count {
        Some(n) => println!("parts:     {n}"),
        None => println!("parts:     -"),
    }
    println!("power on:  {}", time(c.power_on_secs));
    println!("operating: {}", time(c.operating_secs));
    println!("cutting:   {}", time(c.cutting_secs));
    println!("cycle:     {}", time(c.cycle_secs));
    Ok(())
}

/// Prints status whenever it changes, until SIGINT or SIGTERM.
fn watch<T: Transport>(
    m: &HandleManager<T>,
    h: Handle,
    args: &WatchArgs,
    format: OutputFormat,
) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(sig, Arc::clone(&stop))
            .context("installing signal handler")?;
    }

    let interval = Duration::from_millis(args.interval_ms.max(50));
    let mut last: Option<MachineStatus> = None;
    while !stop.load(Ordering::Relaxed) {
        match m.machine_status(h) {
            Ok(s) if last != Some(s) => {
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string(&s)?),
                    OutputFormat::Table => println!(
                        "{} {} {} EMG={} ALM={}",
                        s.mode, s.run, s.motion, s.emergency, s.alarm
                    ),
                }
                last = Some(s);
            }
            Ok(_) => {}
            Err(e) if e.is_transient() => tracing::warn!(error = %e, "poll skipped"),
            Err(e) => return Err(e).context("polling status"),
        }

        let deadline = Instant::now() + interval;
        while !stop.load(Ordering::Relaxed) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
    }
    tracing::info!("watch stopped");
    Ok(())
}
