use clap::Parser;
use rust_gb_core::runner::{Runner, RunnerEvent, RunnerOptions};
use rust_gb_core::{Args, Config, GameBoy, logger};
use std::process;
use std::sync::{Arc, Mutex};

fn main() {
    let args = Args::parse();

    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    };
    logger::init(config.debug);
    log::info!("=== 啟動 Game Boy 模擬器 ===");

    let gb = match GameBoy::from_config(&config) {
        Ok(gb) => gb,
        Err(err) => {
            log::error!("{err}");
            eprintln!("Error: {err}");
            process::exit(1);
        }
    };

    let options = RunnerOptions {
        step_delay: config.step_delay(),
        max_steps: config.max_steps,
    };
    let runner = Runner::spawn(Arc::new(Mutex::new(gb)), options);

    process::exit(present(runner, config.headless));
}

#[cfg(feature = "display")]
fn present(runner: Runner, headless: bool) -> i32 {
    if headless {
        return run_headless(runner);
    }
    match rust_gb_core::sdl3::run(runner) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err}");
            1
        }
    }
}

#[cfg(not(feature = "display"))]
fn present(runner: Runner, _headless: bool) -> i32 {
    run_headless(runner)
}

// 無視窗模式：等待 CPU 執行緒停止，輸出狀態報告
fn run_headless(runner: Runner) -> i32 {
    let event = match runner.events().recv() {
        Ok(event) => event,
        Err(_) => {
            eprintln!("Error: CPU thread exited without reporting");
            return 1;
        }
    };

    let (report, code) = match event {
        RunnerEvent::Halted { report, .. } => (report, 1),
        RunnerEvent::StepLimitReached { report, .. } => (report, 0),
        RunnerEvent::Stopped { .. } => return 0,
    };

    eprintln!("{report}");
    match report.to_json() {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("Error: failed to serialize state report: {err}"),
    }
    code
}
