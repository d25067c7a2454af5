// In demos/engine_loop.rs
//
// A tiny engine loop: a core system that stops on `exit`, and a terminal that
// echoes every message on the bus and publishes commands typed on stdin.
//
//   send <type> [kind] [data...]   publish a message, kind defaults to "empty"
//   exit                           publish `exit`
//
// cargo run --example engine_loop
use magma_msgbus::{BusBuilder, BusClient, MessageBus, MessageListener};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(16);
const SWEEP_EVERY: Duration = Duration::from_millis(250);

struct Core {
    running: Arc<AtomicBool>,
}

impl BusClient for Core {
    fn on_attach(&mut self, listener: &MessageListener) {
        if let Err(e) = listener.subscribe("exit") {
            log::error!("core failed to subscribe to exit: {}", e);
        }
        self.running.store(true, Ordering::SeqCst);
    }

    fn on_detach(&mut self, _listener: &MessageListener) {
        log::info!("core detached");
    }
}

impl Core {
    fn update(&mut self, listener: &MessageListener) {
        if listener.drain().count() > 0 {
            self.running.store(false, Ordering::SeqCst);
        }
    }
}

struct Terminal;

impl BusClient for Terminal {
    fn on_attach(&mut self, listener: &MessageListener) {
        listener.subscribe_to_all();
    }
}

impl Terminal {
    fn update(&mut self, listener: &MessageListener) {
        while let Some(msg) = listener.pop_message() {
            let name = msg.type_name().unwrap_or_else(|_| msg.type_id().to_string());
            println!("Message of type {{\"{}\"}} sent, data: {{{}}};", name, msg);
        }
    }
}

/// Split a command line on whitespace, keeping `"quoted text"` as one token.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = line.trim_start();
    while !rest.is_empty() {
        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            tokens.push(quoted[..end].to_string());
            rest = quoted.get(end + 1..).unwrap_or("");
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            tokens.push(rest[..end].to_string());
            rest = &rest[end..];
        }
        rest = rest.trim_start();
    }
    tokens
}

fn handle_command(bus: &MessageBus, line: &str) {
    let tokens = tokenize(line);
    let result = match tokens.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] => return,
        ["exit"] => bus.publish_text("exit", "empty", ""),
        ["send", msg_type] => bus.publish_text(*msg_type, "empty", ""),
        ["send", msg_type, kind, data @ ..] => bus.publish_text(*msg_type, kind, &data.join(" ")),
        _ => {
            eprintln!("usage: send <type> [kind] [data...] | exit");
            return;
        }
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let bus = match BusBuilder::new().build() {
        Ok(bus) => bus,
        Err(e) => {
            eprintln!("Failed to create bus: {}", e);
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(false));
    let mut core = bus.attach(Core {
        running: running.clone(),
    });
    let mut terminal = bus.attach(Terminal);

    let interrupt_bus = bus.clone();
    ctrlc::set_handler(move || {
        if let Err(e) = interrupt_bus.publish_text("exit", "empty", "") {
            eprintln!("Error: {}", e);
        }
    })
    .expect("Error setting Ctrl+C handler");

    let input_bus = bus.clone();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => handle_command(&input_bus, &line),
                Err(_) => break,
            }
        }
    });

    println!("Engine running. Type `send <type> [kind] [data]` or `exit`.");
    let mut last_sweep = Instant::now();
    while running.load(Ordering::SeqCst) {
        let (system, listener) = terminal.parts();
        system.update(listener);
        let (system, listener) = core.parts();
        system.update(listener);

        if last_sweep.elapsed() >= SWEEP_EVERY {
            let freed = bus.sweep();
            if freed > 0 {
                log::debug!("swept {} slots", freed);
            }
            last_sweep = Instant::now();
        }
        std::thread::sleep(FRAME);
    }

    drop(core);
    drop(terminal);
    println!("Engine stopped, {} slots freed on shutdown", bus.sweep());
}
