use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use snesium_debug::{
    AddressInfo, DebugSession, DebuggerConfig, Engine, MemorySpace, PpuStepUnit,
    ProcessorContext, StepKind, Toggle, ViewId, ViewUpdate,
};
use snesium_runtime::{Pacing, Program, Runtime, RuntimeConfig, RuntimeHandle};
use tracing::{debug, info};

use crate::args::Args;

const DEFAULT_WAIT: Duration = Duration::from_millis(500);

const HELP: &str = "\
open <cpu|spc|sa1|gsu|dsp|cx4>  open a debugger view
close [view]                    close a view (default: current)
use <view>                      make a view current
views                           list open views
bp <addr>                       toggle an exec breakpoint
bpd <addr>                      enable or disable a breakpoint
bps                             list breakpoints
step [n] | over | out           instruction steps
ppu <cycle|line|frame>          raster steps
scanline <n>                    run to a scanline
run | break | toggle            resume, pause, or flip
wait [ms]                       print notifications for a while
events                          snapshot the event viewer
event <scanline> <cycle>        describe a captured event
vectors                         list handler vectors
reset                           reset the machine
quit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Open(ProcessorContext),
    Close(Option<ViewId>),
    Use(ViewId),
    Views,
    Toggle(u32),
    EnableDisable(u32),
    Breakpoints,
    Step(u32),
    Over,
    Out,
    Ppu(PpuStepUnit),
    Scanline(u16),
    Run,
    Break,
    ToggleRun,
    Wait(Duration),
    Events,
    Event { scanline: u16, cycle: u16 },
    Vectors,
    Reset,
    Help,
    Quit,
}

fn parse_address(s: &str) -> Result<u32> {
    let digits = s
        .strip_prefix('$')
        .or_else(|| s.strip_prefix("0x"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).with_context(|| format!("bad address `{s}`"))
}

fn parse_context(s: &str) -> Result<ProcessorContext> {
    let context = match s.to_ascii_lowercase().as_str() {
        "cpu" => ProcessorContext::Cpu,
        "spc" => ProcessorContext::Spc,
        "sa1" | "sa-1" => ProcessorContext::Sa1,
        "gsu" => ProcessorContext::Gsu,
        "dsp" => ProcessorContext::NecDsp,
        "cx4" => ProcessorContext::Cx4,
        other => bail!("unknown processor `{other}`"),
    };
    Ok(context)
}

fn parse_view(s: &str) -> Result<ViewId> {
    let digits = s.strip_prefix('#').unwrap_or(s);
    let raw = digits.parse().with_context(|| format!("bad view `{s}`"))?;
    Ok(ViewId::from_raw(raw))
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or_else(|| anyhow!("empty command"))?;
        let arg = words.next();
        let command = match (name, arg) {
            ("open", Some(ctx)) => Command::Open(parse_context(ctx)?),
            ("close", None) => Command::Close(None),
            ("close", Some(view)) => Command::Close(Some(parse_view(view)?)),
            ("use", Some(view)) => Command::Use(parse_view(view)?),
            ("views", None) => Command::Views,
            ("bp", Some(addr)) => Command::Toggle(parse_address(addr)?),
            ("bpd", Some(addr)) => Command::EnableDisable(parse_address(addr)?),
            ("bps", None) => Command::Breakpoints,
            ("step" | "s", None) => Command::Step(1),
            ("step" | "s", Some(n)) => Command::Step(n.parse().context("bad step count")?),
            ("over", None) => Command::Over,
            ("out", None) => Command::Out,
            ("ppu", Some(unit)) => Command::Ppu(match unit {
                "cycle" | "dot" => PpuStepUnit::Cycle,
                "line" | "scanline" => PpuStepUnit::Scanline,
                "frame" => PpuStepUnit::Frame,
                other => bail!("unknown ppu step `{other}`"),
            }),
            ("scanline", Some(n)) => Command::Scanline(n.parse().context("bad scanline")?),
            ("run" | "continue" | "c", None) => Command::Run,
            ("break", None) => Command::Break,
            ("toggle", None) => Command::ToggleRun,
            ("wait", None) => Command::Wait(DEFAULT_WAIT),
            ("wait", Some(ms)) => {
                Command::Wait(Duration::from_millis(ms.parse().context("bad wait time")?))
            }
            ("events", None) => Command::Events,
            ("event", Some(scanline)) => {
                let cycle = words.next().ok_or_else(|| anyhow!("event needs a cycle"))?;
                Command::Event {
                    scanline: scanline.parse().context("bad scanline")?,
                    cycle: cycle.parse().context("bad cycle")?,
                }
            }
            ("vectors", None) => Command::Vectors,
            ("reset", None) => Command::Reset,
            ("help" | "?", None) => Command::Help,
            ("quit" | "q" | "exit", None) => Command::Quit,
            _ => bail!("unknown command `{line}` (try `help`)"),
        };
        Ok(command)
    }
}

pub struct App {
    args: Args,
    session: DebugSession<RuntimeHandle>,
    handle: RuntimeHandle,
    current: Option<ViewId>,
    should_quit: bool,
    _runtime: Runtime,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = RuntimeConfig {
            region: args.region,
            pacing: if args.unthrottled {
                Pacing::Unthrottled
            } else {
                Pacing::Realtime
            },
            ..RuntimeConfig::default()
        };
        let runtime = Runtime::start(config).context("Failed to start runtime")?;
        let handle = runtime.handle();
        let notifications = handle.notifications()?;
        handle
            .load(Program::demo())
            .context("Failed to load demo program")?;

        let session = DebugSession::new(
            handle.clone(),
            notifications,
            DebuggerConfig {
                break_on_open: args.break_on_open,
                break_on_power_cycle_reset: args.break_on_reset,
                break_on_brk: args.break_on_traps,
                break_on_cop: args.break_on_traps,
                break_on_uninit_read: args.break_on_uninit_read,
                region: args.region,
                ..DebuggerConfig::default()
            },
        )?;
        info!(region = %args.region, "demo program loaded");

        Ok(Self {
            args,
            session,
            handle,
            current: None,
            should_quit: false,
            _runtime: runtime,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let input: Box<dyn BufRead> = match &self.args.script {
            Some(path) => Box::new(BufReader::new(
                File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
            )),
            None => Box::new(BufReader::new(io::stdin())),
        };
        let interactive = self.args.script.is_none();

        let mut lines = input.lines();
        while !self.should_quit {
            if interactive {
                self.prompt()?;
            }
            let Some(line) = lines.next() else {
                break;
            };
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.parse::<Command>() {
                Ok(command) => {
                    if let Err(err) = self.execute(command) {
                        println!("error: {err:#}");
                    }
                }
                Err(err) => println!("{err:#}"),
            }
            self.print_updates()?;
        }
        Ok(())
    }

    fn prompt(&self) -> Result<()> {
        let mut stdout = io::stdout();
        match self.current {
            Some(view) => write!(stdout, "{view}> ")?,
            None => write!(stdout, "> ")?,
        }
        stdout.flush()?;
        Ok(())
    }

    fn current(&self) -> Result<ViewId> {
        self.current
            .ok_or_else(|| anyhow!("no view is open (try `open cpu`)"))
    }

    fn execute(&mut self, command: Command) -> Result<()> {
        debug!(?command, "execute");
        match command {
            Command::Open(context) => {
                let view = self.session.open_view(context)?;
                self.current = Some(view);
                let title = self.session.view(view).map_or("", |v| v.title());
                println!("opened {view} ({title})");
            }
            Command::Close(view) => {
                let view = match view {
                    Some(view) => view,
                    None => self.current()?,
                };
                self.session.close_view(view)?;
                if self.current == Some(view) {
                    self.current = self.session.views().next().map(|v| v.id());
                }
                println!("closed {view}");
            }
            Command::Use(view) => {
                if self.session.view(view).is_none() {
                    bail!("no view {view}");
                }
                self.current = Some(view);
            }
            Command::Views => {
                for view in self.session.views() {
                    let marker = if Some(view.id()) == self.current { '*' } else { ' ' };
                    let address = view
                        .formatted_active_address()
                        .unwrap_or_else(|| "running".to_string());
                    println!("{marker}{} {} {address}", view.id(), view.title());
                }
            }
            Command::Toggle(address) => {
                let view = self.current()?;
                let space = self.view_space(view)?;
                match self
                    .session
                    .toggle_breakpoint(view, AddressInfo::new(i32::try_from(address)?, space))?
                {
                    Toggle::Added(key) => println!("breakpoint {key} added"),
                    Toggle::Removed(key) => println!("breakpoint {key} removed"),
                    Toggle::Ignored => println!("${address:06X} has no mapping"),
                }
            }
            Command::EnableDisable(address) => {
                let view = self.current()?;
                let space = self.view_space(view)?;
                if !self
                    .session
                    .enable_disable_breakpoint(view, AddressInfo::new(i32::try_from(address)?, space))?
                {
                    println!("no breakpoint at ${address:06X}");
                }
            }
            Command::Breakpoints => {
                let store = self.session.breakpoints().store();
                if store.is_empty() {
                    println!("no breakpoints");
                }
                for (key, bp) in store.iter() {
                    println!("{key} {bp}");
                }
            }
            Command::Step(count) => {
                let view = self.current()?;
                self.session.step(view, count, StepKind::SingleStep)?;
            }
            Command::Over => {
                let view = self.current()?;
                self.session.step(view, 1, StepKind::StepOver)?;
            }
            Command::Out => {
                let view = self.current()?;
                self.session.step(view, 1, StepKind::StepOut)?;
            }
            Command::Ppu(unit) => {
                let view = self.current()?;
                self.session.step_ppu(view, unit)?;
            }
            Command::Scanline(scanline) => {
                let view = self.current()?;
                self.session.run_to_scanline(view, scanline)?;
            }
            Command::Run => {
                let view = self.current()?;
                self.session.resume(view)?;
            }
            Command::Break => {
                let view = self.current()?;
                self.session.break_now(view)?;
            }
            Command::ToggleRun => {
                let view = self.current()?;
                self.session.toggle_break_continue(view)?;
            }
            Command::Wait(timeout) => {
                let updates = self.session.wait(timeout)?;
                self.print(&updates);
            }
            Command::Events => {
                self.session.take_event_snapshot()?;
                let options = *self.session.event_viewer_options();
                let frame = self.handle.get_event_viewer_output(&options)?;
                let events = frame.pixels.iter().filter(|p| **p != 0).count();
                println!("{events} events in a {}x{} frame", frame.width, frame.height);
            }
            Command::Event { scanline, cycle } => {
                match self.session.describe_event(scanline, cycle, None)? {
                    Some(details) => print!("{details}"),
                    None => println!("no event near {scanline}:{cycle}"),
                }
            }
            Command::Vectors => {
                let view = self.current()?;
                for (_, label) in self.session.vector_labels(view)? {
                    println!("{label}");
                }
            }
            Command::Reset => self.handle.reset()?,
            Command::Help => println!("{HELP}"),
            Command::Quit => self.should_quit = true,
        }
        Ok(())
    }

    fn view_space(&self, view: ViewId) -> Result<MemorySpace> {
        self.session
            .view(view)
            .map(|v| v.profile().memory_space)
            .ok_or_else(|| anyhow!("no view {view}"))
    }

    fn print_updates(&mut self) -> Result<()> {
        let updates = self.session.pump()?;
        self.print(&updates);
        Ok(())
    }

    fn print(&mut self, updates: &[ViewUpdate]) {
        for update in updates {
            match update {
                ViewUpdate::Break {
                    view,
                    classification,
                } => {
                    let address = self
                        .session
                        .view(*view)
                        .and_then(|v| v.formatted_active_address())
                        .unwrap_or_default();
                    println!("{view} break: {} at {address}", classification.message);
                    if classification.focus {
                        self.current = Some(*view);
                    }
                }
                ViewUpdate::Closed { view, context } => {
                    println!("{view} ({context}) closed: coprocessor unloaded");
                    if self.current == Some(*view) {
                        self.current = self.session.views().next().map(|v| v.id());
                    }
                }
                ViewUpdate::Refreshed { .. } | ViewUpdate::ContinueAction { .. } => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_addresses_in_every_notation() {
        assert_eq!(parse_address("$809000").ok(), Some(0x80_9000));
        assert_eq!(parse_address("0xFFC0").ok(), Some(0xFFC0));
        assert_eq!(parse_address("8000").ok(), Some(0x8000));
        assert!(parse_address("$zz").is_err());
    }

    #[test]
    fn parses_commands() {
        assert_eq!(
            "open sa-1".parse::<Command>().ok(),
            Some(Command::Open(ProcessorContext::Sa1))
        );
        assert_eq!("step".parse::<Command>().ok(), Some(Command::Step(1)));
        assert_eq!("s 4".parse::<Command>().ok(), Some(Command::Step(4)));
        assert_eq!(
            "ppu line".parse::<Command>().ok(),
            Some(Command::Ppu(PpuStepUnit::Scanline))
        );
        assert_eq!(
            "event 100 12".parse::<Command>().ok(),
            Some(Command::Event {
                scanline: 100,
                cycle: 12
            })
        );
        assert_eq!("use #2".parse::<Command>().ok(), Some(Command::Use(ViewId::from_raw(2))));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!("".parse::<Command>().is_err());
        assert!("open z80".parse::<Command>().is_err());
        assert!("event 100".parse::<Command>().is_err());
        assert!("step lots".parse::<Command>().is_err());
        assert!("bp".parse::<Command>().is_err());
    }
}
