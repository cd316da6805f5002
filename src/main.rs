//! MARS - CLI Entry Point
//!
//! Commands:
//! - `mars asm <source>` - Assemble and list a Redcode program
//! - `mars run <sources>...` - Load programs into the MARS and run a contest
//! - `mars debug <source>` - Single-step a program in a MiniMars
//! - `mars test` - Built-in self-test

use clap::{Parser, Subcommand};
use slog::{o, Discard, Drain, Level, Logger};
use slog_term::{FullFormat, TermDecorator};

use mars::asm::format_warrior;
use mars::core::{Mars, MarsConfig, MiniMars};
use mars::Warrior;

#[derive(Parser)]
#[command(name = "mars")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "A Memory Array Redcode Simulator for Corewar programs")]
struct Cli {
    /// Log engine events to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a program and print its listing
    Asm {
        /// Path to the Redcode source
        source: String,
        /// Print the assembled warrior as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load programs into the MARS and run them against each other
    Run {
        /// Paths to the Redcode sources
        #[arg(required = true)]
        sources: Vec<String>,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<String>,
        /// Number of rounds to run (default: from configuration)
        #[arg(short, long)]
        rounds: Option<u64>,
        /// Keep running while a single program survives
        #[arg(long)]
        single: bool,
        /// Seed for program placement
        #[arg(long)]
        seed: Option<u64>,
        /// Number of memory cells
        #[arg(long)]
        memory_size: Option<usize>,
        /// Cells reserved on each side of a program
        #[arg(long)]
        buffer: Option<usize>,
        /// Maximum number of programs
        #[arg(long)]
        max_programs: Option<usize>,
        /// Stop once fewer programs than this survive
        #[arg(long)]
        min_survivors: Option<usize>,
        /// Addresses remembered per program counter
        #[arg(long)]
        history: Option<usize>,
    },
    /// Step through a program on its own
    Debug {
        /// Path to the Redcode source
        source: String,
        /// Maximum number of instructions to execute
        #[arg(short, long, default_value = "100")]
        steps: usize,
        /// Memory size (default: just big enough for the program)
        #[arg(long)]
        size: Option<usize>,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();
    let logger = build_logger(cli.verbose);

    match cli.command {
        Some(Commands::Asm { source, json }) => {
            assemble_file(&source, json);
        }
        Some(Commands::Run {
            sources,
            config,
            rounds,
            single,
            seed,
            memory_size,
            buffer,
            max_programs,
            min_survivors,
            history,
        }) => {
            let mut config = match config {
                Some(path) => match MarsConfig::load(&path) {
                    Ok(c) => c,
                    Err(e) => {
                        eprintln!("❌ {}", e);
                        std::process::exit(1);
                    }
                },
                None => MarsConfig::default(),
            };
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(n) = memory_size {
                config.memory_size = n;
            }
            if let Some(n) = buffer {
                config.buffer = n;
            }
            if let Some(n) = max_programs {
                config.max_programs = n;
            }
            if let Some(n) = min_survivors {
                config.min_survivors = n;
            }
            if let Some(n) = history {
                config.history_size = n;
            }
            run_contest(&sources, config, rounds, single, logger);
        }
        Some(Commands::Debug { source, steps, size }) => {
            debug_program(&source, steps, size);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("MARS v0.1.0");
            println!("A Memory Array Redcode Simulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn build_logger(verbose: u8) -> Logger {
    let level = match verbose {
        0 => return Logger::root(Discard, o!()),
        1 => Level::Info,
        2 => Level::Debug,
        _ => Level::Trace,
    };
    let decorator = TermDecorator::new().stderr().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = drain.filter_level(level).fuse();
    Logger::root(drain, o!())
}

fn load_warrior(path: &str) -> Warrior {
    match Warrior::from_file(path) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("❌ {}: {}", path, e);
            for fault in e.faults() {
                eprintln!("   {}", fault);
            }
            std::process::exit(1);
        }
    }
}

fn assemble_file(path: &str, json: bool) {
    let warrior = load_warrior(path);

    if json {
        match serde_json::to_string_pretty(&warrior) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!("📝 Assembled {} words", warrior.len());
    println!();
    print!("{}", format_warrior(&warrior));
}

fn run_contest(paths: &[String], config: MarsConfig, rounds: Option<u64>, single: bool, logger: Logger) {
    let mut mars = match Mars::new(config) {
        Ok(m) => m.with_logger(logger),
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    for path in paths {
        let warrior = load_warrior(path);
        match mars.load(warrior, None) {
            Ok(entry) => println!("📂 Loaded {} ({} words) at {}", entry.warrior.name, entry.warrior.len(), entry.start),
            Err(e) => {
                eprintln!("❌ {}: {}", path, e);
                std::process::exit(1);
            }
        }
    }

    println!("🚀 Running...");
    let outcome = mars.run(rounds, !single);

    println!();
    println!("━━━ Result ━━━");
    println!("Rounds: {}", outcome.rounds);
    println!("Faults: {}", outcome.faults);
    for status in mars.status() {
        let mark = if status.alive { "✓" } else { "✗" };
        println!("{} {}", mark, status);
    }

    if !outcome.halted_early && mars.num_alive() > 1 {
        println!();
        println!("⚠️  Round limit reached with {} programs alive. Use --rounds to increase.", mars.num_alive());
    }
}

fn debug_program(path: &str, steps: usize, size: Option<usize>) {
    let warrior = load_warrior(path);
    let mut machine = match MiniMars::new(&warrior, size) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    println!("🔍 {}", machine);
    print!("{}", machine.dump_all());

    for _ in 0..steps {
        let addr = machine.next_instr();
        match machine.step() {
            Ok(Some(word)) => {
                if let Some(addr) = addr {
                    println!("{:04}: {}", addr, word);
                }
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("❌ Runtime error at {:?}: {}", addr, e);
                std::process::exit(1);
            }
        }
    }

    println!();
    println!("━━━ Result ━━━");
    println!("{}", machine);
    print!("{}", machine.dump_all());
}

fn run_self_test() {
    use mars::core::MachineState;

    println!("━━━ MARS Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    // Test 1: Mice assembles cleanly
    print!("Mice assembles to 8 words... ");
    let mice = [
        "ptr     DAT #0",
        "start   MOV #12, ptr",
        "loop    MOV @ptr, <copy",
        "        DJN loop, ptr",
        "        SPL @copy",
        "        ADD #653, copy",
        "        JMZ start, ptr",
        "copy    DAT #833",
        "        END start",
    ];
    match Warrior::from_lines(mice) {
        Ok(w) if w.len() == 8 && w.start_offset() == 1 => {
            println!("✓");
            passed += 1;
        }
        Ok(w) => {
            println!("✗ (got {} words)", w.len());
            failed += 1;
        }
        Err(e) => {
            println!("✗ ({})", e);
            failed += 1;
        }
    }

    // Test 2: Imp copies itself forward
    print!("Imp moves through memory... ");
    let ok = match MiniMars::from_lines([" MOV 0, 1"], Some(10)) {
        Ok(mut m) => m.run(5).is_ok() && m.memory().fetch(5).to_string() == "MOV 0, 1",
        Err(_) => false,
    };
    if ok { println!("✓"); passed += 1; }
    else { println!("✗"); failed += 1; }

    // Test 3: DAT halts
    print!("DAT halts the program... ");
    let ok = match MiniMars::from_lines([" DAT #0"], None) {
        Ok(mut m) => m.run(10) == Ok(1) && m.state() == MachineState::Halt,
        Err(_) => false,
    };
    if ok { println!("✓"); passed += 1; }
    else { println!("✗"); failed += 1; }

    // Test 4: Reservation splits across the end of memory
    print!("Reservation wraps around memory... ");
    let config = MarsConfig { buffer: 10, seed: Some(0), ..MarsConfig::default() };
    let ok = match Mars::new(config) {
        Ok(mut m) => {
            m.use_loc(5, 10);
            m.reserved() == &[(0, 24), (4091, 4095)]
        }
        Err(_) => false,
    };
    if ok { println!("✓"); passed += 1; }
    else { println!("✗"); failed += 1; }

    // Test 5: Dwarf beats a program that halts
    print!("Contest ends with one survivor... ");
    let config = MarsConfig { seed: Some(0), ..MarsConfig::default() };
    let ok = match Mars::new(config) {
        Ok(mut m) => {
            let loaded = m.load_source([" ADD #4, 3", " MOV 2, @2", " JMP -2", " DAT #0"], None).is_ok()
                && m.load_source([" JMP 1", " DAT #0"], None).is_ok();
            loaded && m.run(None, true).halted_early && m.alive(0) && !m.alive(1)
        }
        Err(_) => false,
    };
    if ok { println!("✓"); passed += 1; }
    else { println!("✗"); failed += 1; }

    println!();
    println!("Passed: {}, Failed: {}", passed, failed);
    if failed > 0 {
        std::process::exit(1);
    }
    println!();
    println!("✓ All tests passed!");
}
