use clap::Parser as ClapParser;
use std::{
    fs,
    io::{self, Read},
    process,
    sync::Arc,
};

use goslang::{Console, Error, HeapCreateInfo, VM, VMCreateInfo, compile_json};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON syntax tree of the program, `-` for stdin
    #[arg(help = "The program to run")]
    program: String,

    #[arg(long, help = "Heap size in 8-byte words")]
    heap_words: Option<usize>,

    /// Print the compiled program instead of running it
    #[arg(long, help = "Dump bytecode for the input")]
    dump_bytecode: bool,

    #[arg(long, help = "Exit when main returns, without waiting for goroutines")]
    no_wait: bool,
}

fn read_program(path: &str) -> io::Result<String> {
    if path == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    fs::read_to_string(path)
}

fn run(cli: &Cli) -> Result<(), Error> {
    let text = read_program(&cli.program)?;
    let program = compile_json(&text)?;
    if cli.dump_bytecode {
        print!("{program}");
        return Ok(());
    }

    let mut info = VMCreateInfo::default();
    if let Some(words) = cli.heap_words {
        info.heap = HeapCreateInfo { words };
    }
    let vm = VM::new(info, program, Arc::new(Console::stdout()))?;
    let stats = vm.run()?;
    log::debug!(
        "main finished: {} instructions, peak stack {}, peak control stack {}",
        stats.instructions,
        stats.peak_depth,
        stats.peak_return_depth
    );
    if !cli.no_wait {
        vm.wait_idle();
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        eprintln!("Error running {}: {}", cli.program, err);
        process::exit(1);
    }
}
