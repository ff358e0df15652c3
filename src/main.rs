use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, IntoDiagnostic, NamedSource, Result};

use svm::{disassemble, print_registers, Output, RunState};

/// svm is an assembler and virtual machine for a minimal 16-bit register machine.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.sasm` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.sasm` or binary `.svm` file directly and output to terminal
    Run {
        /// `.sasm` or `.svm` file to run
        name: PathBuf,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
        /// Print registers and flags to stderr once the program stops
        #[arg(short, long)]
        registers: bool,
    },
    /// Create binary `.svm` file to run later
    Compile {
        /// `.sasm` file to compile
        name: PathBuf,
        /// Destination to output .svm file
        dest: Option<PathBuf>,
    },
    /// Check a `.sasm` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Print a listing of the instructions in a `.svm` or `.sasm` file
    Disasm {
        /// `.svm` or `.sasm` file to disassemble
        name: PathBuf,
    },
    /// Place a watch on a `.sasm` file to receive constant assembler updates
    Watch {
        /// `.sasm` file to watch
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    svm::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(svm::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    if let Some(command) = args.command {
        match command {
            Command::Run {
                name,
                minimal,
                registers,
            } => run(&name, minimal, registers),
            Command::Compile { name, dest } => {
                file_message(Green, "Assembling", &name);
                let program = assemble(&name)?;

                let out_file_name = dest.unwrap_or_else(|| name.with_extension("svm"));
                fs::write(&out_file_name, &program).into_diagnostic()?;

                message(Green, "Finished", "emit binary");
                file_message(Green, "Saved", &out_file_name);
                Ok(())
            }
            Command::Check { name } => {
                file_message(Green, "Checking", &name);
                let _ = assemble(&name)?;
                message(Green, "Success", "no errors found!");
                Ok(())
            }
            Command::Disasm { name } => {
                let program = load(&name)?;
                for line in disassemble(&program) {
                    println!("{line}");
                }
                Ok(())
            }
            Command::Watch { name } => {
                if !name.exists() {
                    bail!("File does not exist. Exiting...")
                }
                // Vim breaks if watching a single file
                let folder_path = match name.parent() {
                    Some(pth) if pth.is_dir() => pth.to_path_buf(),
                    _ => Path::new(".").to_path_buf(),
                };

                // Clear screen and move cursor to top left
                print!("\x1B[2J\x1B[2;1H");
                file_message(Green, "Watching", &name);
                message(Cyan, "Help", "press CTRL+C to exit");

                let mut watcher = Hotwatch::new_with_custom_delay(Duration::from_millis(500))
                    .into_diagnostic()?;

                watcher
                    .watch(folder_path, move |event: Event| match event.kind {
                        // Watch remove for vim changes
                        EventKind::Modify(_) | EventKind::Remove(_) => {
                            // Clear screen
                            print!("\x1B[2J\x1B[2;1H");
                            file_message(Green, "Watching", &name);
                            message(Green, "Re-checking", "file change detected");
                            message(Cyan, "Help", "press CTRL+C to exit");

                            // Makes reruns more obvious
                            sleep(Duration::from_millis(50));

                            if !name.exists() {
                                eprintln!("File was removed. Exiting...");
                                return Flow::Exit;
                            }
                            match assemble(&name) {
                                Ok(_) => message(Green, "Success", "no errors found!"),
                                Err(e) => println!("\n{:?}", e),
                            }
                            Flow::Continue
                        }
                        _ => Flow::Continue,
                    })
                    .into_diagnostic()?;
                watcher.run();
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        run(&path, false, false)
    } else {
        println!("\n~ svm v{VERSION} ~");
        println!("{SHORT_INFO}");
        Ok(())
    }
}

enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, right.as_str());
}

fn message<S>(color: MsgColor, left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(name: &Path, minimal: bool, registers: bool) -> Result<()> {
    if !minimal {
        let verb = if is_source(name) { "Assembling" } else { "Loading" };
        file_message(MsgColor::Green, verb, name);
    }
    let program = load(name)?;
    let mut state = RunState::from_raw(&program).map_err(|fault| fault.report())?;
    state.set_trace(svm::env::is_trace_enabled());

    if !minimal {
        message(MsgColor::Green, "Running", "emitted binary");
    }
    let mut out = Output::stdout();
    let result = state.run(&mut out);
    if !minimal {
        out.start_new_line().into_diagnostic()?;
    }
    if registers {
        print_registers(&state, minimal);
    }
    if let Err(fault) = result {
        if !minimal {
            let at = match fault.pc() {
                Some(pc) => format!("machine stopped at PC 0x{pc:04x}"),
                None => "machine stopped".to_string(),
            };
            message(MsgColor::Red, "Faulted", at.as_str());
        }
        return Err(fault.report());
    }

    if !minimal {
        message(MsgColor::Green, "Halted", "reached HALT");
        file_message(MsgColor::Green, "Completed", name);
    }
    Ok(())
}

fn is_source(name: &Path) -> bool {
    matches!(
        name.extension().and_then(|ext| ext.to_str()),
        Some("sasm" | "asm")
    )
}

/// Read a program image, assembling it first if it is a source file.
fn load(name: &Path) -> Result<Vec<u8>> {
    let Some(ext) = name.extension() else {
        bail!("File has no extension. Exiting...");
    };
    match ext.to_str() {
        Some("svm" | "bin") => fs::read(name).into_diagnostic(),
        Some("sasm" | "asm") => assemble(name),
        _ => bail!("File has unknown extension. Exiting..."),
    }
}

/// Assemble a source file, rendering any error against its contents.
fn assemble(name: &Path) -> Result<Vec<u8>> {
    let contents = fs::read_to_string(name).into_diagnostic()?;
    match svm::assemble(&contents) {
        Ok(program) => Ok(program),
        Err(err) => Err(err.report(NamedSource::new(name.display().to_string(), contents))),
    }
}

const SHORT_INFO: &str = r"
Welcome to svm, an assembler and virtual machine for a minimal 16-bit register machine.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
