// 模擬執行緒 - 在背景連續呼叫 step()，透過 crossbeam channel 回報停止原因
// 共享狀態只有 Arc<Mutex<GameBoy>>，畫面端只讀取

use crate::cpu::StateReport;
use crate::error::Error;
use crate::gameboy::GameBoy;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Why the worker stopped.
#[derive(Debug)]
pub enum RunnerEvent {
    Halted { error: Error, report: StateReport },
    StepLimitReached { steps: u64, report: StateReport },
    Stopped { steps: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerOptions {
    pub step_delay: Duration,
    pub max_steps: Option<u64>,
}

pub fn lock_machine(machine: &Mutex<GameBoy>) -> MutexGuard<'_, GameBoy> {
    match machine.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug)]
pub struct Runner {
    machine: Arc<Mutex<GameBoy>>,
    stop: Arc<AtomicBool>,
    events: Receiver<RunnerEvent>,
    handle: Option<JoinHandle<()>>,
}

impl Runner {
    pub fn spawn(machine: Arc<Mutex<GameBoy>>, options: RunnerOptions) -> Self {
        let (tx, rx) = channel::unbounded();
        let stop = Arc::new(AtomicBool::new(false));

        let worker_machine = Arc::clone(&machine);
        let worker_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("gb-cpu".to_string())
            .spawn(move || run_loop(&worker_machine, &worker_stop, options, &tx));

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::error!("failed to spawn CPU thread: {err}");
                None
            }
        };

        Runner {
            machine,
            stop,
            events: rx,
            handle,
        }
    }

    pub fn machine(&self) -> &Arc<Mutex<GameBoy>> {
        &self.machine
    }

    /// Current machine state, taken between two steps.
    pub fn snapshot(&self) -> StateReport {
        lock_machine(&self.machine).state_report()
    }

    pub fn events(&self) -> &Receiver<RunnerEvent> {
        &self.events
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Asks the worker to stop at the next step boundary and waits for it.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.join();
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("CPU thread panicked");
            }
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    machine: &Mutex<GameBoy>,
    stop: &AtomicBool,
    options: RunnerOptions,
    tx: &Sender<RunnerEvent>,
) {
    log::info!("CPU thread started");
    let mut steps = 0u64;
    let event = loop {
        if stop.load(Ordering::Relaxed) {
            break RunnerEvent::Stopped { steps };
        }
        if options.max_steps.is_some_and(|max| steps >= max) {
            let report = lock_machine(machine).state_report();
            break RunnerEvent::StepLimitReached { steps, report };
        }

        {
            let mut gb = lock_machine(machine);
            if let Err(error) = gb.step() {
                let report = gb.state_report().with_error(&error);
                break RunnerEvent::Halted { error, report };
            }
        }
        steps += 1;

        if !options.step_delay.is_zero() {
            thread::sleep(options.step_delay);
        }
    };

    match &event {
        RunnerEvent::Halted { error, .. } => log::error!("CPU halted after {steps} steps: {error}"),
        RunnerEvent::StepLimitReached { steps, .. } => log::info!("step limit reached ({steps})"),
        RunnerEvent::Stopped { steps } => log::info!("CPU thread stopped after {steps} steps"),
    }
    // 接收端可能已經關閉
    let _ = tx.send(event);
}
