use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context};
use clap::Parser;
use crossbeam::channel::Receiver;
use log::{info, trace, warn};
use rasterizer::Rasterizer;

use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::rect::Rect;

use glb_viewer::assets::FsSource;
use glb_viewer::config::{ModelEntry, ViewerConfig};
use glb_viewer::controls::{control_for_key, Control};
use glb_viewer::Viewer;

/// Orbit a glTF model lit by an HDRI environment.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// RON config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Equirectangular EXR used for lighting and background.
    #[arg(long)]
    hdri: Option<PathBuf>,

    /// GLB model to offer, repeat for several. Keys 1..9 switch between them.
    #[arg(long = "model")]
    models: Vec<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    auto_rotate: bool,

    /// Radians per frame.
    #[arg(long)]
    rotate_speed: Option<f32>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };
        if let Some(hdri) = self.hdri {
            config.environment = hdri;
        }
        if !self.models.is_empty() {
            config.models = self.models.into_iter().map(ModelEntry::from_path).collect();
        }
        if let Some(width) = self.width {
            config.window.width = width;
        }
        if let Some(height) = self.height {
            config.window.height = height;
        }
        if self.auto_rotate {
            config.settings.auto_rotate = true;
        }
        if let Some(speed) = self.rotate_speed {
            config.settings.rotate_speed = speed;
        }
        Ok(config)
    }
}

/// Lines typed on stdin, read on their own thread.
fn spawn_stdin_controls() -> anyhow::Result<Receiver<String>> {
    let (sender, receiver) = crossbeam::channel::unbounded();
    std::thread::Builder::new()
        .name("stdin-controls".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(receiver)
}

fn apply_control(viewer: &mut Viewer, control: Control) {
    if let Err(e) = viewer.apply(control) {
        warn!("{}", e);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config()?;
    let (mut width, mut height) = (config.window.width.max(1), config.window.height.max(1));

    let sdl_context = sdl2::init().map_err(|e| anyhow!(e)).context("failed to initialise SDL")?;
    let video_subsystem = sdl_context.video().map_err(|e| anyhow!(e))?;

    let window = video_subsystem
        .window(&config.window.title, width, height)
        .position_centered()
        .resizable()
        .build()
        .context("failed to create window")?;

    let mut canvas = window.into_canvas().build()?;
    let texture_creator = canvas.texture_creator();
    let mut display_texture =
        texture_creator.create_texture_streaming(PixelFormatEnum::RGBA32, width, height)?;

    let mut rasterizer = Rasterizer::new(width, height);
    let mut pixels = vec![0u8; (4 * width * height) as usize];
    let mut viewer = Viewer::new(&config, Arc::new(FsSource), rasterizer.aspect_ratio());
    let stdin_controls = spawn_stdin_controls()?;

    info!(
        "R auto-rotate, +/- speed, [/] fov, A/Z ambient, arrows environment, I/K sun, 1-{} models",
        viewer.models().len().clamp(1, 9)
    );

    let mut event_pump = sdl_context.event_pump().map_err(|e| anyhow!(e))?;
    let mut timer = Instant::now();
    'running: loop {
        let delta = timer.elapsed().as_secs_f32();
        timer = Instant::now();

        for event in event_pump.poll_iter() {
            viewer.handle_event(&event, height);
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                Event::KeyDown {
                    keycode: Some(key), ..
                } => {
                    if let Some(control) = control_for_key(key, viewer.settings(), viewer.camera().fov())
                    {
                        apply_control(&mut viewer, control);
                    }
                }
                Event::Window {
                    win_event: WindowEvent::SizeChanged(w, h),
                    ..
                } => {
                    width = (w as u32).max(1);
                    height = (h as u32).max(1);
                    rasterizer = Rasterizer::new(width, height);
                    pixels = vec![0u8; (4 * width * height) as usize];
                    display_texture = texture_creator.create_texture_streaming(
                        PixelFormatEnum::RGBA32,
                        width,
                        height,
                    )?;
                    viewer.resize(width, height);
                }
                _ => {}
            }
        }

        for line in stdin_controls.try_iter() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<Control>() {
                Ok(control) => apply_control(&mut viewer, control),
                Err(e) => warn!("{}", e),
            }
        }

        viewer.tick();
        viewer.render(&mut rasterizer);
        rasterizer.framebuffer().write_rgba8(&mut pixels);

        let fullscreen_rect = Rect::new(0, 0, width, height);
        display_texture.update(fullscreen_rect, &pixels, (4 * width) as usize)?;
        canvas
            .copy(&display_texture, fullscreen_rect, fullscreen_rect)
            .map_err(|e| anyhow!(e))?;
        canvas.present();

        canvas.window_mut().set_title(&format!(
            "{} | FPS : {:.02}",
            config.window.title,
            1.0 / delta.max(1e-6)
        ))?;
        trace!("{:?}", rasterizer.frametime());
    }

    Ok(())
}
