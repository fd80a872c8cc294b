use std::cell::RefCell;
use std::error::Error;
use std::ffi::c_void;
use std::fmt::Display;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

use anyhow::Context;
use futures::executor::block_on;
use glam::Mat4;
use gltf_scene::gltf::{load_glb, load_gltf, DirectorySource, LoaderOptions};
use gltf_scene::renderer::{CachingBackend, GlDevice, RenderBackend};
use gltf_scene::scene::{Scene, Viewport};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::video::{GLProfile, Window};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let path = std::env::args()
        .nth(1)
        .context("usage: gltf-scene-viewer <model.gltf | model.glb>")?;

    let sdl_context = sdl2::init().map_err(SdlErr)?;
    let video_subsystem = sdl_context.video().map_err(SdlErr)?;
    let gl_attr = video_subsystem.gl_attr();
    gl_attr.set_context_profile(GLProfile::GLES);
    gl_attr.set_context_version(3, 0);
    gl_attr.set_depth_size(24);
    // Linear->SRGB conversion is done in shader.
    gl_attr.set_framebuffer_srgb_compatible(false);
    let window = video_subsystem
        .window(env!("CARGO_PKG_NAME"), 948, 533)
        .resizable()
        .opengl()
        .build()?;
    let _gl_context = window.gl_create_context().map_err(SdlErr)?;
    video_subsystem.gl_set_swap_interval(1).map_err(SdlErr)?;
    let mut event_pump = sdl_context.event_pump().map_err(SdlErr)?;

    let device = GlDevice::new(|s| video_subsystem.gl_get_proc_address(s) as *const c_void)?;
    let backend = Rc::new(RefCell::new(CachingBackend::new(device)));
    // Declared after the backend so that it's dropped first, and the GPU
    // resources are released while the context is still alive.
    let mut scene = load_scene(Path::new(&path))?;
    scene.attach_backend(backend.clone());
    resize(&mut scene, &backend, &window);

    let mut last_stats = Instant::now();
    let mut spinning = true;
    let mut angle = 0.0;
    let mut last_frame = Instant::now();
    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                Event::KeyDown {
                    keycode: Some(Keycode::Space),
                    ..
                } => spinning = !spinning,
                Event::Window {
                    win_event: WindowEvent::SizeChanged(..),
                    ..
                } => resize(&mut scene, &backend, &window),
                _ => {}
            }
        }

        let now = Instant::now();
        if spinning {
            angle += (now - last_frame).as_secs_f32() * 0.5;
        }
        last_frame = now;
        scene.root_transform = Mat4::from_rotation_y(angle);
        scene.render()?;
        window.gl_swap_window();

        if last_stats.elapsed().as_secs() >= 5 {
            log::debug!("{:?}", backend.borrow().stats());
            last_stats = now;
        }
    }

    scene.destroy()?;
    Ok(())
}

fn load_scene(path: &Path) -> anyhow::Result<Scene> {
    let base = path.parent().unwrap_or(Path::new("."));
    let source = DirectorySource::new(base);
    // The viewer would rather show something than nothing.
    let options = LoaderOptions {
        accessor_view_fallback: true,
        orthographic_fallback: true,
        ..LoaderOptions::default()
    };
    let is_glb = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("glb"));
    let scene = if is_glb {
        let glb = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        block_on(load_glb(&glb, &source, &options))
    } else {
        let gltf = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        block_on(load_gltf(&gltf, &source, &options))
    };
    scene.with_context(|| format!("loading {}", path.display()))
}

fn resize(scene: &mut Scene, backend: &RefCell<CachingBackend<GlDevice>>, window: &Window) {
    let (width, height) = window.drawable_size();
    backend
        .borrow_mut()
        .device_mut()
        .resize(width as i32, height as i32);
    scene.viewport = Some(Viewport { width, height });
}

#[derive(Debug)]
pub struct SdlErr(String);
impl Display for SdlErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sdl error: {}", self.0)
    }
}
impl Error for SdlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
