//! A small harness that assembles an `AsyncPrognoser` from a config file
//! and drives it with a synthetic battery discharge feed.
//!
//! # 使用方法
//! ```bash
//! cargo run --bin prognoser-cli -- battery.cfg --source battery0 --ticks 40
//! ```
//! - `battery.cfg`：`ConfigMap` 文本格式的配置文件（见 `config` 模块文档）。
//! - `--source`：总线上使用的 `source` 字符串，默认 `battery0`。
//! - `--ticks`：合成信号发布的轮数，默认 20。
//! - `--workers`：异步总线工作线程数，默认 2。
//!
//! 仅用于本地演示与手动验证；不是这个运行时的对外契约，调度、日志格式均可随时变化。
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use prog_core::{
    install_default_subscriber, AsyncPrognoserBuilder, ConfigMap, Message, MessageBus, MessageId,
    Payload, ProgError,
};

fn main() {
    install_default_subscriber();
    if let Err(err) = run() {
        eprintln!("prognoser-cli failed: {err}");
        std::process::exit(1);
    }
}

struct Options {
    config_path: PathBuf,
    source: String,
    ticks: u64,
    workers: usize,
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<Options, ProgError> {
    let config_path = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| usage("missing config file path"))?;

    let mut source = "battery0".to_string();
    let mut ticks = 20u64;
    let mut workers = 2usize;

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--source" => {
                source = args.next().ok_or_else(|| usage("--source needs a value"))?;
            }
            "--ticks" => {
                let value = args.next().ok_or_else(|| usage("--ticks needs a value"))?;
                ticks = value.parse().map_err(|_| usage("--ticks must be an integer"))?;
            }
            "--workers" => {
                let value = args.next().ok_or_else(|| usage("--workers needs a value"))?;
                workers = value.parse().map_err(|_| usage("--workers must be an integer"))?;
            }
            unknown => return Err(usage(&format!("unknown argument: {unknown}"))),
        }
    }

    Ok(Options {
        config_path,
        source,
        ticks,
        workers,
    })
}

fn usage(detail: &str) -> ProgError {
    ProgError::config_missing(format!(
        "{detail}\nusage: prognoser-cli <config-file> [--source NAME] [--ticks N] [--workers N]"
    ))
}

fn run() -> Result<(), ProgError> {
    let options = parse_options(env::args().skip(1))?;

    let text = std::fs::read_to_string(&options.config_path).map_err(|err| {
        ProgError::config_missing_with_source(
            format!("could not read {}", options.config_path.display()),
            err,
        )
    })?;
    let mut config = ConfigMap::new();
    if let Some(dir) = options.config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        config.add_search_path(dir)?;
    }
    config.parse(&text)?;

    let bus = Arc::new(MessageBus::new_async(options.workers.max(1)));
    let source: Arc<str> = options.source.clone().into();

    let captured: Arc<parking_lot::Mutex<u64>> = Arc::new(parking_lot::Mutex::new(0));
    {
        let captured = captured.clone();
        let handler = move |message: &Message| {
            *captured.lock() += 1;
            tracing::info!(source = message.source(), "prediction published");
        };
        bus.subscribe(Arc::new(handler), source.clone(), MessageId::PREDICTION);
    }

    let prognoser = AsyncPrognoserBuilder::new()
        .with_config(config)
        .build(bus.clone(), source.clone(), source.clone())?;

    drive_synthetic_feed(&bus, &source, options.ticks);
    bus.wait_for(Duration::from_millis(50));

    println!(
        "published {} ticks on source '{}', {} prediction(s) observed",
        options.ticks,
        source,
        *captured.lock()
    );
    drop(prognoser);
    Ok(())
}

/// Publishes a simple, monotonically-discharging battery load/voltage feed
/// — not a calibrated dataset, just enough structure to exercise the
/// observer/predictor pipeline end to end.
fn drive_synthetic_feed(bus: &MessageBus, source: &Arc<str>, ticks: u64) {
    for i in 0..ticks {
        let t = i * 1_000_000;
        let voltage = 4.1 - (i as f64) * 0.01;
        bus.publish(
            Message::new(MessageId::MODEL_INPUT_VECTOR, source.clone(), t, Payload::Vector(vec![12.0])).unwrap(),
        );
        bus.publish(
            Message::new(
                MessageId::MODEL_OUTPUT_VECTOR,
                source.clone(),
                t,
                Payload::Vector(vec![voltage, 293.0]),
            )
            .unwrap(),
        );
        bus.wait_for(Duration::from_millis(5));
    }
}
