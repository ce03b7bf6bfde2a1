#[macro_use]
extern crate log;

use crossbeam_channel::tick;
use getopts::Options;
use hotmeter::{CarbonHandler, Distribution, Snapshot};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct Generator {
    latency: Arc<Distribution>,
    done: Arc<AtomicBool>,
}

impl Generator {
    fn new(latency: Arc<Distribution>, done: Arc<AtomicBool>) -> Generator { Generator { latency, done } }

    fn run(&mut self) {
        let mut t0 = Instant::now();
        while !self.done.load(Ordering::Relaxed) {
            let t1 = Instant::now();
            self.latency.record_duration(t1 - t0);
            t0 = t1;
        }
    }
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

pub fn opts() -> Options {
    let mut opts = Options::new();

    opts.optmulti("d", "destination", "carbon destination to report to", "HOST:PORT");
    opts.optopt("p", "producers", "number of producers", "INTEGER");
    opts.optopt("c", "capacity", "maximum number of sampled values per flush", "INTEGER");
    opts.optopt("i", "interval", "flush interval in milliseconds", "INTEGER");
    opts.optopt("n", "flushes", "number of flushes before exiting", "INTEGER");
    opts.optflag("h", "help", "print this help menu");

    opts
}

fn parse_or<T: std::str::FromStr>(matches: &getopts::Matches, name: &str, default: T) -> Result<T, String> {
    match matches.opt_str(name) {
        Some(s) => s.parse().map_err(|_| format!("invalid value for --{}: {}", name, s)),
        None => Ok(default),
    }
}

fn settings(matches: &getopts::Matches) -> Result<(usize, usize, u64, usize), String> {
    let producers = parse_or(matches, "producers", 1)?;
    let capacity = parse_or(matches, "capacity", 1000)?;
    let interval = parse_or(matches, "interval", 1000)?;
    let flushes = parse_or(matches, "flushes", 10)?;
    Ok((producers, capacity, interval, flushes))
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = opts();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            error!("Failed to parse command line args: {}", f);
            return;
        },
    };

    if matches.opt_present("help") {
        print_usage(program, &opts);
        return;
    }

    info!("hotmeter benchmark");

    let parsed = settings(&matches);
    let (producers, capacity, interval, flushes) = match parsed {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return;
        },
    };

    let mut destinations = matches.opt_strs("destination");
    if destinations.is_empty() {
        destinations.push("127.0.0.1:2003".to_owned());
    }

    info!("producers: {}", producers);
    info!("capacity: {}", capacity);
    info!("interval: {}ms", interval);
    info!("destinations: {:?}", destinations);

    let handler = match CarbonHandler::builder().destinations(destinations).build() {
        Ok(handler) => handler,
        Err(e) => {
            error!("unable to configure carbon handler: {}", e);
            return;
        },
    };
    handler.init();

    // Spin up our sample producers.
    let latency = Arc::new(Distribution::with_capacity(capacity));
    let done = Arc::new(AtomicBool::new(false));
    let generators: Vec<_> = (0..producers)
        .map(|_| {
            let mut generator = Generator::new(latency.clone(), done.clone());
            thread::spawn(move || generator.run())
        })
        .collect();

    // Flush on every tick, the same way a service would.
    let ticker = tick(Duration::from_millis(interval));
    let mut t0 = Instant::now();
    let mut total = 0.0;
    for _ in 0..flushes {
        let t1 = match ticker.recv() {
            Ok(t1) => t1,
            Err(_) => break,
        };

        let mut snapshot = Snapshot::new();
        snapshot.merge("benchmark.loop_ns", latency.read_meter());

        let turn_total = snapshot.get("benchmark.loop_ns.count").unwrap_or(0.0);
        total += turn_total;
        let rate = turn_total / (t1 - t0).as_secs_f64();

        info!("rate: {} samples per second", rate);
        info!(
            "latency (ns): p50: {} p90: {} p99: {} max: {}",
            snapshot.get("benchmark.loop_ns.p50").unwrap_or(0.0),
            snapshot.get("benchmark.loop_ns.p90").unwrap_or(0.0),
            snapshot.get("benchmark.loop_ns.p99").unwrap_or(0.0),
            snapshot.get("benchmark.loop_ns.pmx").unwrap_or(0.0),
        );

        snapshot.insert("benchmark.rate", rate);
        handler.handle_meters(snapshot);
        t0 = t1;
    }

    done.store(true, Ordering::Relaxed);
    for generator in generators {
        let _ = generator.join();
    }

    info!("total metrics recorded: {}", total);
}
