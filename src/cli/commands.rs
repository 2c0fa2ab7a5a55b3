use crate::cli::args::{CompletionsArgs, DebugArgs, OutputFormat, RunArgs};
use crate::cli::Cli;
use crate::config::Settings;
use crate::debugger::{BreakpointSet, ControllerEvent, DebugState, ExecutionController};
use crate::protocol::{self, CommandMessage, DebugResponse, EventMessage};
use crate::runtime::{Runtime, RuntimeConfig};
use anyhow::{Context, Result};
use clap::CommandFactory;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use tracing::info;

/// Execute the run command.
pub fn run(args: RunArgs, settings: &Settings) -> Result<()> {
    let source = read_source(&args.file)?;
    let runtime = start_runtime(settings, &args.search_paths)?;
    let (controller, events) = ExecutionController::new(Arc::clone(&runtime))?;

    let breakpoints: BreakpointSet = args.breakpoints.iter().copied().collect();
    let delay = args.delay.unwrap_or(settings.execution.delay_ms);
    info!(file = %args.file.display(), %breakpoints, delay, "Running script");
    controller.submit(source.clone(), breakpoints, delay)?;

    let mut failure = None;
    for event in events.iter() {
        print_event(&event, args.output, args.trace_lines, &source, controller.current_line());
        match event {
            // Nobody is at the keyboard; report the stop and move on.
            ControllerEvent::DebugStateChanged(DebugState::Paused) => {
                controller.continue_execution()
            }
            ControllerEvent::ErrorOccurred(message) => failure = Some(message),
            ControllerEvent::ExecutionFinished => break,
            _ => {}
        }
    }
    io::stdout().flush()?;

    drop(controller);
    runtime.finalize();
    match failure {
        Some(message) => anyhow::bail!("Script failed: {}", message),
        None => Ok(()),
    }
}

/// Execute the debug command: an interactive prompt driving one controller.
pub fn debug(args: DebugArgs, settings: &Settings) -> Result<()> {
    let source = read_source(&args.file)?;
    let runtime = start_runtime(settings, &args.search_paths)?;
    let (controller, events) = ExecutionController::new(Arc::clone(&runtime))?;
    controller.set_breakpoints(args.breakpoints.iter().copied().collect());
    controller.set_execution_delay(args.delay.unwrap_or(settings.execution.delay_ms));

    let printer_source = source.clone();
    let printer = thread::Builder::new()
        .name("event-printer".to_string())
        .spawn(move || print_interactive(events, &printer_source))?;

    println!(
        "{} {} ({})",
        "Debugging".bold(),
        args.file.display(),
        runtime.version()
    );
    println!("Type 'h' for help.");
    start_session(&controller, &source, args.stop_on_entry)?;

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline("(sdb) ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                controller.abort();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match parse_repl_command(line) {
            Ok(ReplCommand::Quit) => break,
            Ok(ReplCommand::Help) => print_help(),
            Ok(ReplCommand::ListBreakpoints) => {
                println!("Breakpoints: {}", controller.breakpoints());
            }
            Ok(ReplCommand::Restart) => {
                if let Err(err) = start_session(&controller, &source, false) {
                    eprintln!("{}", err.to_string().red());
                }
            }
            Ok(ReplCommand::Protocol(message)) => {
                match protocol::dispatch(&controller, message) {
                    DebugResponse::Ok => {}
                    DebugResponse::Error { message } => eprintln!("{}", message.red()),
                    DebugResponse::State {
                        state,
                        line,
                        executing,
                        breakpoints,
                    } => println!(
                        "state: {}, line: {}, executing: {}, breakpoints: {:?}",
                        state, line, executing, breakpoints
                    ),
                }
            }
            Err(message) => eprintln!("{}", message.red()),
        }
    }

    // Dropping the controller aborts the session and closes the event stream.
    drop(controller);
    if printer.join().is_err() {
        eprintln!("{}", "Event printer stopped unexpectedly".red());
    }
    runtime.finalize();
    Ok(())
}

/// Execute the completions command.
pub fn completions(args: CompletionsArgs) -> Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(args.shell, &mut command, name, &mut io::stdout());
    Ok(())
}

/// One line typed at the debug prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Protocol(CommandMessage),
    ListBreakpoints,
    Restart,
    Help,
    Quit,
}

pub fn parse_repl_command(line: &str) -> std::result::Result<ReplCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Err("Empty command".to_string());
    };
    let arg = parts.next();

    let line_arg = || -> std::result::Result<u32, String> {
        let raw = arg.ok_or_else(|| format!("'{}' needs a line number", verb))?;
        match raw.parse::<u32>() {
            Ok(0) => Err("Line numbers start at 1".to_string()),
            Ok(n) => Ok(n),
            Err(_) => Err(format!("Invalid line number: {}", raw)),
        }
    };

    let command = match verb {
        "c" | "continue" => ReplCommand::Protocol(CommandMessage::Continue),
        "s" | "step" => ReplCommand::Protocol(CommandMessage::StepInto),
        "n" | "next" => ReplCommand::Protocol(CommandMessage::StepOver),
        "o" | "out" => ReplCommand::Protocol(CommandMessage::StepOut),
        "b" | "break" => ReplCommand::Protocol(CommandMessage::AddBreakpoint { line: line_arg()? }),
        "d" | "delete" => {
            ReplCommand::Protocol(CommandMessage::RemoveBreakpoint { line: line_arg()? })
        }
        "delay" => {
            let raw = arg.ok_or("'delay' needs a value in milliseconds")?;
            let ms = raw
                .parse::<u64>()
                .map_err(|_| format!("Invalid delay: {}", raw))?;
            ReplCommand::Protocol(CommandMessage::SetDelay { ms })
        }
        "state" => ReplCommand::Protocol(CommandMessage::GetState),
        "abort" => ReplCommand::Protocol(CommandMessage::Abort),
        "bl" => ReplCommand::ListBreakpoints,
        "r" | "run" => ReplCommand::Restart,
        "h" | "help" | "?" => ReplCommand::Help,
        "q" | "quit" | "exit" => ReplCommand::Quit,
        other => return Err(format!("Unknown command '{}'. Type 'h' for help.", other)),
    };
    Ok(command)
}

fn print_help() {
    println!("Commands:");
    println!("  c, continue      resume until the next breakpoint");
    println!("  s, step          step into the next line");
    println!("  n, next          step over calls");
    println!("  o, out           run until the current function returns");
    println!("  b N, break N     add a breakpoint at line N");
    println!("  d N, delete N    remove the breakpoint at line N");
    println!("  bl               list breakpoints");
    println!("  delay MS         wait MS milliseconds after each line");
    println!("  state            show the debugger state");
    println!("  abort            stop the running script");
    println!("  r, run           run the script again");
    println!("  q, quit          leave the debugger");
}

fn start_session(controller: &ExecutionController, source: &str, stop_on_entry: bool) -> Result<()> {
    match first_code_line(source).filter(|_| stop_on_entry) {
        Some(entry) => {
            let mut breakpoints = controller.breakpoints();
            breakpoints.add(entry);
            controller.submit(source, breakpoints, controller.execution_delay())?;
        }
        None => controller.run(source)?,
    }
    Ok(())
}

/// First line that is neither blank nor a comment.
fn first_code_line(source: &str) -> Option<u32> {
    source
        .lines()
        .position(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with("--")
        })
        .and_then(|index| u32::try_from(index + 1).ok())
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {}", path.display()))
}

fn start_runtime(settings: &Settings, extra_paths: &[PathBuf]) -> Result<Arc<Runtime>> {
    let runtime = Runtime::global();
    let mut config: RuntimeConfig = settings.runtime.clone();
    for path in extra_paths {
        if !config.search_paths.contains(path) {
            config.search_paths.push(path.clone());
        }
    }
    runtime.initialize(&config)?;
    Ok(runtime)
}

fn source_line(source: &str, line: i64) -> Option<&str> {
    let index = usize::try_from(line).ok()?.checked_sub(1)?;
    source.lines().nth(index)
}

fn print_event(
    event: &ControllerEvent,
    format: OutputFormat,
    trace_lines: bool,
    source: &str,
    current_line: i64,
) {
    if format == OutputFormat::Json {
        match EventMessage::from(event).to_json_line() {
            Ok(json) => println!("{}", json),
            Err(err) => eprintln!("Failed to encode event: {}", err),
        }
        return;
    }

    match event {
        ControllerEvent::OutputReceived(text) => print!("{}", text),
        ControllerEvent::ErrorOccurred(message) => {
            eprintln!("{} {}", "error:".red().bold(), message)
        }
        ControllerEvent::LineExecuted(line) if trace_lines => {
            eprintln!("{}", format!("-> line {}", line).dimmed())
        }
        ControllerEvent::DebugStateChanged(DebugState::Paused) => {
            let text = source_line(source, current_line).unwrap_or("").trim();
            eprintln!(
                "{} line {}: {}",
                "paused at".yellow().bold(),
                current_line,
                text
            );
        }
        _ => {}
    }
}

fn print_interactive(events: Receiver<ControllerEvent>, source: &str) {
    let mut current_line = -1_i64;
    for event in events {
        match &event {
            ControllerEvent::LineExecuted(line) => current_line = i64::from(*line),
            ControllerEvent::OutputReceived(text) => {
                print!("{}", text);
                let _ = io::stdout().flush();
            }
            ControllerEvent::ErrorOccurred(message) => {
                println!("{} {}", "error:".red().bold(), message)
            }
            ControllerEvent::DebugStateChanged(DebugState::Paused) => {
                let text = source_line(source, current_line).unwrap_or("");
                println!("{} {:>4} | {}", "=>".yellow().bold(), current_line, text);
            }
            ControllerEvent::ExecutionStarted => println!("{}", "Execution started".green()),
            ControllerEvent::ExecutionFinished => {
                println!("{}", "Execution finished ('r' to run again)".green())
            }
            _ => {}
        }
    }
}
