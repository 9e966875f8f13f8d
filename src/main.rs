// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/main.rs

// Command line entry point.

// <>

use zylisp::zy::{self, Environment};

use std::env;
use std::process;

fn main() {
    if let Err(e) = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
    {
        eprintln!("logger setup failed: {}", e);
    }

    // zylisp file <filename> to run a Zy file
    // zylisp eval <expression> to print one result
    // zylisp [repl] for the Zy REPL
    let args: Vec<String> = env::args().collect();
    let code = match args.get(1).map(String::as_str) {
        Some("file") if args.len() >= 3 => match zy::run_file(&args[2]) {
            Ok(out) => {
                println!("{}", out);
                0
            }
            Err(e) => {
                eprintln!("error: {}", e);
                1
            }
        },
        Some("eval") if args.len() >= 3 => {
            let mut env = Environment::new();
            let out = env.eval_string(&args[2..].join(" "));
            env.stop();
            match out {
                Ok(out) => {
                    println!("{}", out);
                    0
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    1
                }
            }
        }
        None | Some("repl") => match zy::repl() {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("error: {}", e);
                1
            }
        },
        Some(other) => {
            eprintln!("unknown command `{}`; try file, eval, or repl", other);
            2
        }
    };

    process::exit(code);
}
