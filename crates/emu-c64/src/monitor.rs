//! Machine-language monitor.
//!
//! Commands arrive as text lines while the run loop is suspended. Numbers
//! are hexadecimal with an optional `$` prefix. Output and the prompt go
//! out as events through the machine's queue, so they interleave correctly
//! with frames produced by stepping.
//!
//! The monitor owns the checkpoints. Exec breakpoints are polled by the
//! scheduler before each instruction; load/store watchpoints are pushed
//! down to the bus, which records the first matching access.

use std::fmt::{self, Write as _};

use mos_6502::{Status, disassemble};

use crate::bus::{AccessKind, Watch, WatchHit};
use crate::events::MachineEvent;
use crate::iec::DRIVE_DEVICE;
use crate::machine::Machine;

/// Bytes shown by `m` without an end address.
const DUMP_LEN: u16 = 0x80;
/// Instructions shown by `d` without an end address.
const DISASM_LINES: usize = 16;
/// Cycles `next` will run waiting for a subroutine to return.
const NEXT_LIMIT: u64 = 20_000_000;
/// Largest count `z` accepts. Stop and pause requests wait until a step
/// command finishes, so one command must stay short.
const MAX_STEPS: u32 = 100_000;

const HELP: &str = "\
m [start [end]]          memory dump
r [REG=val ...]          show or set registers (A X Y SP PC P)
> addr byte ...          write memory
d [start [end]]          disassemble
break [addr [end]] / bk  add exec breakpoint, or list checkpoints
watch [load|store] addr [end]
del [n] / delete         delete checkpoint n, or all
enable n / disable n     toggle checkpoint
z / step [n]             step n instructions (n <= 186a0)
n / next                 step over subroutine calls
x / g [addr] / continue  leave the monitor
@$ / dir                 directory of drive 8
reset [0|1]              soft or hard reset
help / ?                 this list";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    #[default]
    Inactive,
    AwaitingCommand,
    Executing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointKind {
    Exec,
    Load,
    Store,
    /// Load or store.
    Access,
}

impl CheckpointKind {
    fn describe(self) -> &'static str {
        match self {
            Self::Exec => "exec",
            Self::Load => "load",
            Self::Store => "store",
            Self::Access => "load store",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub number: u32,
    pub start: u16,
    pub end: u16,
    pub kind: CheckpointKind,
    pub enabled: bool,
    pub hits: u64,
}

impl Checkpoint {
    fn contains(&self, address: u16) -> bool {
        (self.start..=self.end).contains(&address)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.kind == CheckpointKind::Exec {
            "BREAK"
        } else {
            "WATCH"
        };
        write!(f, "{label}: {}  C:${:04x}", self.number, self.start)?;
        if self.end != self.start {
            write!(f, "-${:04x}", self.end)?;
        }
        write!(f, "  (Stop on {})", self.kind.describe())?;
        if !self.enabled {
            f.write_str(" disabled")?;
        }
        write!(f, "  hits {}", self.hits)
    }
}

/// A line the monitor could not parse. Nothing was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSyntaxError(String);

impl fmt::Display for MonitorSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error: {}", self.0)
    }
}

impl std::error::Error for MonitorSyntaxError {}

fn syntax(message: impl Into<String>) -> MonitorSyntaxError {
    MonitorSyntaxError(message.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    A,
    X,
    Y,
    Sp,
    Pc,
    P,
}

impl Register {
    fn parse(name: &str) -> Result<Self, MonitorSyntaxError> {
        match name.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "X" => Ok(Self::X),
            "Y" => Ok(Self::Y),
            "SP" | "S" => Ok(Self::Sp),
            "PC" => Ok(Self::Pc),
            "P" | "FL" => Ok(Self::P),
            _ => Err(syntax(format!("unknown register {name}"))),
        }
    }
}

/// A parsed monitor command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Memory { start: Option<u16>, end: Option<u16> },
    Registers,
    SetRegisters(Vec<(Register, u16)>),
    Write { address: u16, bytes: Vec<u8> },
    Disassemble { start: Option<u16>, end: Option<u16> },
    Break { start: u16, end: u16 },
    ListCheckpoints,
    Watch { kind: CheckpointKind, start: u16, end: u16 },
    Delete(Option<u32>),
    Enable(u32),
    Disable(u32),
    Step(u32),
    Next,
    Go(Option<u16>),
    Directory,
    Reset { hard: bool },
    Help,
}

fn parse_hex(token: &str) -> Result<u16, MonitorSyntaxError> {
    let digits = token.strip_prefix("C:").or_else(|| token.strip_prefix("c:")).unwrap_or(token);
    let digits = digits.strip_prefix('$').unwrap_or(digits);
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    u16::from_str_radix(digits, 16).map_err(|_| syntax(format!("bad number {token:?}")))
}

fn parse_byte(token: &str) -> Result<u8, MonitorSyntaxError> {
    u8::try_from(parse_hex(token)?).map_err(|_| syntax(format!("{token} is not a byte")))
}

fn parse_number(token: &str) -> Result<u32, MonitorSyntaxError> {
    parse_hex(token).map(u32::from)
}

fn no_more(args: &[&str]) -> Result<(), MonitorSyntaxError> {
    match args.first() {
        None => Ok(()),
        Some(extra) => Err(syntax(format!("unexpected {extra:?}"))),
    }
}

/// Optional `[start [end]]`.
fn parse_range(args: &[&str]) -> Result<(Option<u16>, Option<u16>), MonitorSyntaxError> {
    let start = args.first().map(|t| parse_hex(t)).transpose()?;
    let end = args.get(1).map(|t| parse_hex(t)).transpose()?;
    no_more(args.get(2..).unwrap_or_default())?;
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            return Err(syntax("end before start"));
        }
    }
    Ok((start, end))
}

/// Parse one input line.
pub fn parse(line: &str) -> Result<Command, MonitorSyntaxError> {
    let line = line.trim();
    // `>` and `@` may be glued to their argument.
    let (word, rest) = if let Some(rest) = line.strip_prefix('>') {
        (">", rest)
    } else if let Some(rest) = line.strip_prefix('@') {
        ("@", rest)
    } else {
        line.split_once(char::is_whitespace).unwrap_or((line, ""))
    };
    let args: Vec<&str> = rest.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()).collect();
    let word = word.to_ascii_lowercase();

    match word.as_str() {
        "m" => {
            let (start, end) = parse_range(&args)?;
            Ok(Command::Memory { start, end })
        }
        "d" => {
            let (start, end) = parse_range(&args)?;
            Ok(Command::Disassemble { start, end })
        }
        "r" if args.is_empty() => Ok(Command::Registers),
        "r" => {
            // Accept `A=01`, `A = 01` and `A =01`.
            let joined = rest.replace(" =", "=").replace("= ", "=");
            let mut pairs = Vec::new();
            for token in joined.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()) {
                let (name, value) = token
                    .split_once('=')
                    .ok_or_else(|| syntax(format!("expected REG=value, got {token:?}")))?;
                let register = Register::parse(name)?;
                let value = parse_hex(value)?;
                if register != Register::Pc && value > 0xFF {
                    return Err(syntax(format!("{name} is an 8-bit register")));
                }
                pairs.push((register, value));
            }
            Ok(Command::SetRegisters(pairs))
        }
        ">" => {
            let (address, bytes) = args.split_first().ok_or_else(|| syntax("> needs an address"))?;
            if bytes.is_empty() {
                return Err(syntax("> needs at least one byte"));
            }
            Ok(Command::Write {
                address: parse_hex(address)?,
                bytes: bytes.iter().map(|b| parse_byte(b)).collect::<Result<_, _>>()?,
            })
        }
        "break" | "bk" => match parse_range(&args)? {
            (None, _) => Ok(Command::ListCheckpoints),
            (Some(start), end) => Ok(Command::Break {
                start,
                end: end.unwrap_or(start),
            }),
        },
        "watch" | "w" => {
            let (kind, args) = match args.first().map(|a| a.to_ascii_lowercase()) {
                Some(k) if k == "load" => (CheckpointKind::Load, &args[1..]),
                Some(k) if k == "store" => (CheckpointKind::Store, &args[1..]),
                _ => (CheckpointKind::Access, &args[..]),
            };
            match parse_range(args)? {
                (Some(start), end) => Ok(Command::Watch {
                    kind,
                    start,
                    end: end.unwrap_or(start),
                }),
                (None, _) => Err(syntax("watch needs an address")),
            }
        }
        "del" | "delete" => {
            let number = args.first().map(|t| parse_number(t)).transpose()?;
            no_more(args.get(1..).unwrap_or_default())?;
            Ok(Command::Delete(number))
        }
        "enable" | "en" | "disable" | "dis" => {
            let number = parse_number(args.first().ok_or_else(|| syntax(format!("{word} needs a number")))?)?;
            no_more(&args[1..])?;
            if word.starts_with("en") {
                Ok(Command::Enable(number))
            } else {
                Ok(Command::Disable(number))
            }
        }
        "z" | "step" => {
            let count = args.first().map(|t| parse_number(t)).transpose()?.unwrap_or(1);
            no_more(args.get(1..).unwrap_or_default())?;
            if count == 0 {
                return Err(syntax("step count must be at least 1"));
            }
            if count > MAX_STEPS {
                return Err(syntax(format!("step count is limited to {MAX_STEPS:x}")));
            }
            Ok(Command::Step(count))
        }
        "n" | "next" => {
            no_more(&args)?;
            Ok(Command::Next)
        }
        "x" | "continue" => {
            no_more(&args)?;
            Ok(Command::Go(None))
        }
        "g" | "goto" => {
            let address = args.first().map(|t| parse_hex(t)).transpose()?;
            no_more(args.get(1..).unwrap_or_default())?;
            Ok(Command::Go(address))
        }
        "@" if rest.trim() == "$" => Ok(Command::Directory),
        "@" => Err(syntax("only @$ is supported")),
        "dir" => {
            no_more(&args)?;
            Ok(Command::Directory)
        }
        "reset" => {
            let hard = match args.first().copied() {
                None | Some("0") => false,
                Some("1") => true,
                Some(other) => return Err(syntax(format!("reset type {other:?}"))),
            };
            no_more(args.get(1..).unwrap_or_default())?;
            Ok(Command::Reset { hard })
        }
        "help" | "?" => Ok(Command::Help),
        "" => Err(syntax("empty command")),
        other => Err(syntax(format!("unknown command {other:?}"))),
    }
}

/// What the scheduler should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    Stay,
    Resume,
}

#[derive(Debug, Default)]
pub struct Monitor {
    state: MonitorState,
    checkpoints: Vec<Checkpoint>,
    next_number: u32,
    next_dump: Option<u16>,
    next_disasm: Option<u16>,
    /// Breakpoint address to pass over once after leaving the monitor.
    resume_pc: Option<u16>,
}

impl Monitor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_number: 1,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn state(&self) -> MonitorState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != MonitorState::Inactive
    }

    #[must_use]
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Suspend into the monitor. `reason` is printed before the registers.
    pub fn enter(&mut self, machine: &mut Machine, reason: Option<&str>) {
        machine.settle_reset();
        self.state = MonitorState::AwaitingCommand;
        self.next_dump = None;
        self.next_disasm = None;
        let mut text = String::new();
        if let Some(reason) = reason {
            text.push_str(reason);
            text.push('\n');
        }
        let pc = machine.cpu().regs.pc;
        text.push_str(&disassemble_line(machine, pc));
        output(machine, text);
        prompt(machine);
    }

    /// Run one command line. Errors are reported as output.
    pub fn execute(&mut self, line: &str, machine: &mut Machine) -> MonitorAction {
        let command = match parse(line) {
            Ok(command) => command,
            Err(e) => {
                output(machine, e.to_string());
                prompt(machine);
                return MonitorAction::Stay;
            }
        };
        self.state = MonitorState::Executing;
        let action = self.run(command, machine);
        match action {
            MonitorAction::Stay => {
                self.state = MonitorState::AwaitingCommand;
                prompt(machine);
            }
            MonitorAction::Resume => self.leave(machine),
        }
        action
    }

    /// Back to the run loop. A breakpoint at the current PC is passed over
    /// once so execution can continue from it.
    pub fn leave(&mut self, machine: &Machine) {
        self.state = MonitorState::Inactive;
        self.resume_pc = Some(machine.cpu().regs.pc);
    }

    fn run(&mut self, command: Command, machine: &mut Machine) -> MonitorAction {
        match command {
            Command::Memory { start, end } => {
                let start = start.or(self.next_dump).unwrap_or(machine.cpu().regs.pc);
                let end = end.unwrap_or_else(|| start.saturating_add(DUMP_LEN - 1));
                let text = dump(machine, start, end);
                output(machine, text);
                self.next_dump = Some(end.wrapping_add(1));
            }
            Command::Registers => {
                let text = registers(machine);
                output(machine, text);
            }
            Command::SetRegisters(pairs) => {
                let regs = &mut machine.cpu_mut().regs;
                for (register, value) in pairs {
                    match register {
                        Register::A => regs.a = value as u8,
                        Register::X => regs.x = value as u8,
                        Register::Y => regs.y = value as u8,
                        Register::Sp => regs.s = value as u8,
                        Register::Pc => regs.pc = value,
                        Register::P => regs.p = Status::from_byte(value as u8),
                    }
                }
                let text = registers(machine);
                output(machine, text);
            }
            Command::Write { address, bytes } => {
                for (i, byte) in bytes.into_iter().enumerate() {
                    machine.poke(address.wrapping_add(i as u16), byte);
                }
            }
            Command::Disassemble { start, end } => {
                let start = start.or(self.next_disasm).unwrap_or(machine.cpu().regs.pc);
                let (text, next) = disassembly(machine, start, end);
                output(machine, text);
                self.next_disasm = Some(next);
            }
            Command::Break { start, end } => self.add(machine, CheckpointKind::Exec, start, end),
            Command::Watch { kind, start, end } => self.add(machine, kind, start, end),
            Command::ListCheckpoints => {
                let text = if self.checkpoints.is_empty() {
                    "No breakpoints are set".to_string()
                } else {
                    self.checkpoints.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
                };
                output(machine, text);
            }
            Command::Delete(None) => {
                self.checkpoints.clear();
                self.sync_watches(machine);
                output(machine, "Deleted all checkpoints".into());
            }
            Command::Delete(Some(number)) => {
                let before = self.checkpoints.len();
                self.checkpoints.retain(|c| c.number != number);
                if self.checkpoints.len() == before {
                    output(machine, format!("No such checkpoint {number}"));
                } else {
                    self.sync_watches(machine);
                }
            }
            Command::Enable(number) | Command::Disable(number) => {
                let enabled = matches!(command, Command::Enable(_));
                match self.checkpoints.iter_mut().find(|c| c.number == number) {
                    Some(checkpoint) => {
                        checkpoint.enabled = enabled;
                        self.sync_watches(machine);
                    }
                    None => output(machine, format!("No such checkpoint {number}")),
                }
            }
            Command::Step(count) => {
                let mut notes = String::new();
                for _ in 0..count {
                    if let Some(jam) = machine.step().jam {
                        let _ = writeln!(notes, "{jam}");
                        break;
                    }
                }
                let pc = machine.cpu().regs.pc;
                notes.push_str(&disassemble_line(machine, pc));
                output(machine, notes);
            }
            Command::Next => self.step_over(machine),
            Command::Go(address) => {
                if let Some(pc) = address {
                    machine.cpu_mut().regs.pc = pc;
                }
                return MonitorAction::Resume;
            }
            Command::Directory => {
                let text = match machine.directory_text(DRIVE_DEVICE) {
                    Ok(text) => text.trim_end().to_string(),
                    Err(e) => e.to_string(),
                };
                output(machine, text);
            }
            Command::Reset { hard } => {
                machine.reset(hard);
                return MonitorAction::Resume;
            }
            Command::Help => output(machine, HELP.to_string()),
        }
        MonitorAction::Stay
    }

    /// Run a JSR to completion; anything else is a single step.
    fn step_over(&mut self, machine: &mut Machine) {
        let pc = machine.cpu().regs.pc;
        let is_call = machine.peek(pc) == 0x20;
        machine.step();
        if is_call {
            let target = pc.wrapping_add(3);
            let start = machine.cycles();
            while machine.cpu().regs.pc != target {
                let pc = machine.cpu().regs.pc;
                if let Some(number) = self.check_exec(pc) {
                    output(machine, format!("BREAK: {number}  C:${pc:04x}"));
                    break;
                }
                if machine.step().jam.is_some() || machine.cycles() - start > NEXT_LIMIT {
                    output(machine, "next: subroutine did not return".into());
                    break;
                }
            }
        }
        let pc = machine.cpu().regs.pc;
        let text = disassemble_line(machine, pc);
        output(machine, text);
    }

    fn add(&mut self, machine: &mut Machine, kind: CheckpointKind, start: u16, end: u16) {
        let checkpoint = Checkpoint {
            number: self.next_number,
            start,
            end,
            kind,
            enabled: true,
            hits: 0,
        };
        self.next_number += 1;
        output(machine, checkpoint.to_string());
        self.checkpoints.push(checkpoint);
        self.sync_watches(machine);
    }

    fn sync_watches(&self, machine: &mut Machine) {
        let watches = self
            .checkpoints
            .iter()
            .filter(|c| c.enabled)
            .flat_map(|c| {
                let kinds: &[AccessKind] = match c.kind {
                    CheckpointKind::Exec => &[],
                    CheckpointKind::Load => &[AccessKind::Load],
                    CheckpointKind::Store => &[AccessKind::Store],
                    CheckpointKind::Access => &[AccessKind::Load, AccessKind::Store],
                };
                kinds.iter().map(|&kind| Watch {
                    number: c.number,
                    start: c.start,
                    end: c.end,
                    kind,
                })
            })
            .collect();
        machine.set_watches(watches);
    }

    #[must_use]
    pub fn has_exec_checkpoints(&self) -> bool {
        self.checkpoints
            .iter()
            .any(|c| c.enabled && c.kind == CheckpointKind::Exec)
    }

    /// Exec breakpoint about to fire at `pc`, counting the hit.
    pub fn check_exec(&mut self, pc: u16) -> Option<u32> {
        if self.resume_pc.take() == Some(pc) {
            return None;
        }
        let checkpoint = self
            .checkpoints
            .iter_mut()
            .find(|c| c.enabled && c.kind == CheckpointKind::Exec && c.contains(pc))?;
        checkpoint.hits += 1;
        Some(checkpoint.number)
    }

    /// Count a watch hit and describe it for the monitor entry message.
    pub fn record_watch(&mut self, hit: WatchHit) -> String {
        if let Some(checkpoint) = self.checkpoints.iter_mut().find(|c| c.number == hit.number) {
            checkpoint.hits += 1;
        }
        let kind = match hit.kind {
            AccessKind::Load => "load",
            AccessKind::Store => "store",
        };
        format!("WATCH: {}  C:${:04x}  ({kind})", hit.number, hit.address)
    }
}

fn output(machine: &mut Machine, text: String) {
    machine.push_event(MachineEvent::MonitorOutput { text });
}

fn prompt(machine: &mut Machine) {
    let text = format!("(C:${:04x}) ", machine.cpu().regs.pc);
    machine.push_event(MachineEvent::MonitorPrompt { text });
}

fn registers(machine: &mut Machine) -> String {
    let (ddr, port) = (machine.peek(0x0000), machine.peek(0x0001));
    let raster = machine.bus().chipset.vic.raster_line();
    let cycle = machine.bus().chipset.vic.raster_cycle();
    let regs = machine.cpu().regs;
    format!(
        "  ADDR A  X  Y  SP 00 01 NV-BDIZC LIN CYC\n.;{:04x} {:02x} {:02x} {:02x} {:02x} {ddr:02x} {port:02x} {} {raster:03} {cycle:03}",
        regs.pc,
        regs.a,
        regs.x,
        regs.y,
        regs.s,
        regs.p.render()
    )
}

/// Hex and PETSCII dump, 16 bytes per line.
fn dump(machine: &mut Machine, start: u16, end: u16) -> String {
    let mut out = String::new();
    let mut line_start = u32::from(start);
    let end = u32::from(end);
    while line_start <= end {
        let line_end = (line_start + 15).min(end);
        let bytes: Vec<u8> = (line_start..=line_end).map(|a| machine.peek(a as u16)).collect();
        let _ = write!(out, ">C:{line_start:04x} ");
        for (i, byte) in bytes.iter().enumerate() {
            if i % 4 == 0 {
                out.push(' ');
            }
            let _ = write!(out, "{byte:02x} ");
        }
        for i in bytes.len()..16 {
            if i % 4 == 0 {
                out.push(' ');
            }
            out.push_str("   ");
        }
        out.push_str("  ");
        out.extend(bytes.iter().map(|&b| petscii_display(b)));
        out.push('\n');
        line_start += 16;
    }
    out.pop();
    out
}

fn petscii_display(byte: u8) -> char {
    match byte {
        0x20..=0x5F => char::from(byte),
        0xC1..=0xDA => char::from(byte - 0x80).to_ascii_lowercase(),
        _ => '.',
    }
}

fn disassemble_line(machine: &mut Machine, address: u16) -> String {
    let line = disassemble(machine.bus_mut(), address);
    let bytes: Vec<String> = line.bytes.iter().map(|b| format!("{b:02x}")).collect();
    let marker = if line.undocumented { "*" } else { " " };
    format!(".C:{:04x}  {:<9} {marker}{}", line.address, bytes.join(" "), line.text)
}

fn disassembly(machine: &mut Machine, start: u16, end: Option<u16>) -> (String, u16) {
    let mut lines = Vec::new();
    let mut address = start;
    loop {
        lines.push(disassemble_line(machine, address));
        let next = disassemble(machine.bus_mut(), address).next_address();
        let done = match end {
            Some(end) => next > end || next < address,
            None => lines.len() >= DISASM_LINES,
        };
        address = next;
        if done {
            break;
        }
    }
    (lines.join("\n"), address)
}
