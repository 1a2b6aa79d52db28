use std::{env, fs, process::ExitCode};

use amber::{Capture, SerializeOptions, serialize};

const USAGE: &str = "usage: amber <capture.json> [--factory] [--strict] [-o <out.js>]";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut capture_path: Option<String> = None;
    let mut out_path: Option<String> = None;
    let mut options = SerializeOptions::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--factory" => options = options.factory_function(true),
            "--strict" => options = options.strict(true),
            "-o" => {
                let Some(path) = iter.next() else {
                    eprintln!("error: -o requires a path\n{USAGE}");
                    return ExitCode::FAILURE;
                };
                out_path = Some(path);
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return ExitCode::SUCCESS;
            }
            other if capture_path.is_none() => capture_path = Some(other.to_owned()),
            other => {
                eprintln!("error: unexpected argument `{other}`\n{USAGE}");
                return ExitCode::FAILURE;
            }
        }
    }
    let Some(capture_path) = capture_path else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    let text = match fs::read_to_string(&capture_path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("error: cannot read {capture_path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let capture = match Capture::from_json(&text) {
        Ok(capture) => capture,
        Err(err) => {
            eprintln!("error: {capture_path} is not a valid capture: {err}");
            return ExitCode::FAILURE;
        }
    };

    let module = match serialize(&capture.heap, capture.root, &options) {
        Ok(module) => module,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match out_path {
        Some(path) => {
            if let Err(err) = fs::write(&path, module) {
                eprintln!("error: cannot write {path}: {err}");
                return ExitCode::FAILURE;
            }
        }
        None => print!("{module}"),
    }
    ExitCode::SUCCESS
}
