use std::{
    env::{self, args_os},
    error::Error,
    ffi::OsString,
    fs,
    io::{self, stdin, IsTerminal},
    path::Path,
    process::ExitCode,
};

use moonwalk::codegen::JsGenerator;
use moonwalk::interpreter::{Config, Interpreter, Val};
use rustyline::validate::MatchingBracketValidator;
use rustyline::Editor;
use rustyline::{error::ReadlineError, Cmd, ConditionalEventHandler, Event, EventContext, EventHandler, KeyEvent, Movement, RepeatCount};
use rustyline::{Completer, Helper, Highlighter, Hinter, Validator};
use tracing::warn;

const USAGE: &str = "usage: moonwalk [--emit-js] [file]";

fn main() -> ExitCode {
    init_tracing();

    let mut emit_js = false;
    let mut file: Option<OsString> = None;
    for arg in args_os().skip(1) {
        if arg == "--emit-js" {
            emit_js = true;
        } else if file.is_none() {
            file = Some(arg);
        } else {
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    }

    let result = match (emit_js, file) {
        (true, Some(path)) => fs::read_to_string(Path::new(&path))
            .map_err(Into::into)
            .and_then(|source| emit(&source)),
        (true, None) => io::read_to_string(stdin().lock())
            .map_err(Into::into)
            .and_then(|source| emit(&source)),
        (false, Some(path)) => run_file(Path::new(&path)),
        (false, None) => run_prompt(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Installs a stderr subscriber, but only when `RUST_LOG` asks for one.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn config() -> Config {
    let config = Config::default();
    match env::var("MOONWALK_MAX_DEPTH") {
        Ok(depth) => match depth.parse() {
            Ok(depth) => config.with_max_call_depth(depth),
            Err(_) => {
                warn!(value = %depth, "ignoring invalid MOONWALK_MAX_DEPTH");
                config
            }
        },
        Err(_) => config,
    }
}

fn emit(source: &str) -> Result<(), Box<dyn Error>> {
    let chunk = moonwalk::parse(source)?;
    print!("{}", JsGenerator::new().generate(&chunk));
    Ok(())
}

fn run_file(path: &Path) -> Result<(), Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    let mut interpreter = Interpreter::with_config(config());
    interpreter.run(content.as_str())?;
    Ok(())
}

struct TabEventHandler;
impl ConditionalEventHandler for TabEventHandler {
    fn handle(&self, _: &Event, _n: RepeatCount, _: bool, _: &EventContext) -> Option<Cmd> {
        Some(Cmd::Indent(Movement::WholeLine))
    }
}

#[derive(Helper, Completer, Hinter, Highlighter, Validator)]
struct ReplHelper {
    #[rustyline(Completer)]
    completer: (),
    #[rustyline(Validator)]
    validator: MatchingBracketValidator,
}

fn run_prompt() -> Result<(), Box<dyn Error>> {
    let mut interpreter = Interpreter::with_config(config());
    if !stdin().is_terminal() {
        let program = io::read_to_string(stdin().lock())?;
        interpreter.run(program.as_str())?;
        return Ok(());
    }

    let h = ReplHelper {
        completer: (),
        validator: MatchingBracketValidator::new(),
    };
    let mut rl = Editor::new()?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabEventHandler)),
    );

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match interpreter.run(&line) {
                    Ok(Val::Nil) => {}
                    Ok(val) => println!("{val}"),
                    Err(err) => println!("error: {err}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(()),
            Err(err) => break Err(Box::new(err)),
        }
    }
}
