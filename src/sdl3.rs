extern crate sdl3;

use crate::runner::{Runner, RunnerEvent, lock_machine};
use sdl3::event::Event;
use sdl3::keyboard::Keycode;
use sdl3::pixels::PixelFormat;
use sdl3::rect::Rect;
use std::time::Duration;

const WINDOW_TITLE: &str = "GameBoy";
const WINDOW_SCALE: u32 = 4;

fn sdl_err(err: impl std::fmt::Display) -> String {
    err.to_string()
}

/// Presentation loop: owns the main thread while the runner steps the CPU.
/// Each iteration locks the machine, renders a frame snapshot and unlocks.
pub fn run(mut runner: Runner) -> Result<(), String> {
    let viewport = lock_machine(runner.machine()).viewport();
    let (w, h) = (viewport.width as u32, viewport.height as u32);

    let sdl_context = sdl3::init().map_err(sdl_err)?;
    let video_subsystem = sdl_context.video().map_err(sdl_err)?;

    let window = video_subsystem
        .window(WINDOW_TITLE, w * WINDOW_SCALE, h * WINDOW_SCALE)
        .position_centered()
        .resizable()
        .build()
        .map_err(sdl_err)?;

    let mut canvas = window.into_canvas();
    let texture_creator = canvas.texture_creator();
    // ABGR8888 在小端序上等於 R,G,B,A 位元組順序
    let mut stream_tex = texture_creator
        .create_texture_streaming(PixelFormat::ABGR8888, w, h)
        .map_err(sdl_err)?;

    let mut event_pump = sdl_context.event_pump().map_err(sdl_err)?;
    let mut halted = false;

    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                // ` 鍵：輸出目前的 CPU/中斷/LCD 狀態
                Event::KeyDown {
                    keycode: Some(Keycode::Grave),
                    ..
                } => {
                    let report = runner.snapshot();
                    log::info!("state dump\n{report}");
                    eprintln!("{report}");
                }
                _ => {}
            }
        }

        // CPU 停止後保留最後一幀，錯誤顯示在標題列
        if let Ok(event) = runner.events().try_recv() {
            let title = match &event {
                RunnerEvent::Halted { error, report } => {
                    eprintln!("{report}");
                    format!("{WINDOW_TITLE} - halted: {error}")
                }
                RunnerEvent::StepLimitReached { steps, .. } => {
                    format!("{WINDOW_TITLE} - stopped after {steps} steps")
                }
                RunnerEvent::Stopped { .. } => format!("{WINDOW_TITLE} - stopped"),
            };
            halted = matches!(event, RunnerEvent::Halted { .. });
            let _ = canvas.window_mut().set_title(&title);
        }

        let frame = lock_machine(runner.machine()).frame();
        let rgba = frame.to_rgba();
        stream_tex
            .update(None, &rgba, frame.width * 4)
            .map_err(sdl_err)?;

        // 整數倍縮放並置中
        let (win_w, win_h) = canvas.window().size();
        let scale_x = win_w as f32 / w as f32;
        let scale_y = win_h as f32 / h as f32;
        let scale = scale_x.min(scale_y).floor().max(1.0) as u32;
        let dest_w = w * scale;
        let dest_h = h * scale;
        let dst_x = ((win_w as i32 - dest_w as i32) / 2).max(0);
        let dst_y = ((win_h as i32 - dest_h as i32) / 2).max(0);
        let dest = Rect::new(dst_x, dst_y, dest_w, dest_h);

        canvas.clear();
        canvas.copy(&stream_tex, None, dest).map_err(sdl_err)?;
        canvas.present();

        ::std::thread::sleep(Duration::new(0, 1_000_000_000u32 / 60));
    }

    runner.stop();
    if halted {
        return Err("CPU halted".to_string());
    }
    Ok(())
}
