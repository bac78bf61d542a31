use canvas_renderer::{
    stroke::{Cap, Join},
    wgpu_renderer::WgpuRenderer,
    Color, Context, Device, Extend, Pattern, Surface,
};

#[macro_use]
extern crate log;

const WIDTH: u32 = 256;
const HEIGHT: u32 = 256;

fn draw(context: &mut Context<WgpuRenderer>) -> Result<(), canvas_renderer::Error> {
    let mut background = Pattern::linear(glam::vec2(0.0, 0.0), glam::vec2(0.0, HEIGHT as f32));
    background.add_color_stop(0.0, Color::rgb(0.1, 0.1, 0.2));
    background.add_color_stop(1.0, Color::rgb(0.3, 0.3, 0.5));
    background.set_extend(Extend::Pad);
    context.set_source(&background)?;
    context.paint()?;

    context.set_source_rgba(0.9, 0.5, 0.1, 0.8)?;
    context.arc(128.0, 128.0, 80.0, 0.0, 2.0 * std::f32::consts::PI);
    context.fill()?;

    context.save();
    context.rectangle(16.0, 16.0, 224.0, 168.0);
    context.clip()?;
    context.translate(128.0, 128.0)?;
    context.rotate(0.3)?;
    let mut star = Pattern::radial(glam::vec2(0.0, 0.0), 5.0, glam::vec2(0.0, 0.0), 60.0);
    star.add_color_stop(0.0, Color::WHITE);
    star.add_color_stop(1.0, Color::new(1.0, 1.0, 0.0, 0.5));
    context.set_source(&star)?;
    for i in 0..5 {
        let angle = i as f32 * 4.0 * std::f32::consts::PI / 5.0 - std::f32::consts::FRAC_PI_2;
        context.line_to(60.0 * angle.cos(), 60.0 * angle.sin());
    }
    context.close_path();
    context.fill_preserve()?;
    context.set_source_rgb(0.2, 0.1, 0.0)?;
    context.set_line_width(3.0);
    context.set_line_join(Join::Round);
    context.stroke()?;
    context.rectangle(-20.0, -20.0, 40.0, 40.0);
    context.clip()?;
    context.clear()?;
    context.restore()?;

    context.set_line_width(12.0);
    context.set_line_cap(Cap::Round);
    context.move_to(24.0, 232.0);
    context.curve_to(80.0, 160.0, 176.0, 300.0, 232.0, 220.0);
    context.stroke()?;
    context.flush()
}

fn main() {
    env_logger::init();
    pollster::block_on(run());
}

async fn run() {
    let instance = wgpu::Instance::default();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: None,
        })
        .await
        .expect("No suitable adapter found");
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            ..Default::default()
        })
        .await
        .expect("Failed to create device");

    let texture_size = wgpu::Extent3d {
        width: WIDTH,
        height: HEIGHT,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: None,
        size: texture_size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let mut renderer = WgpuRenderer::new(&device, &queue, &texture);
    renderer.clear_target(wgpu::Color::TRANSPARENT).unwrap();

    let canvas_device = Device::new();
    let surface = Surface::new(&canvas_device, WIDTH, HEIGHT);
    let mut context = Context::new(surface, renderer);
    draw(&mut context).unwrap();
    drop(context);
    info!("live contexts after drawing: {}", canvas_device.live_contexts());

    let bytes_per_row = (WIDTH * 4).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: None,
        size: (bytes_per_row * HEIGHT) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: None,
            },
        },
        texture_size,
    );
    queue.submit(Some(encoder.finish()));
    readback.slice(..).map_async(wgpu::MapMode::Read, |result| {
        if let Err(error) = result {
            error!("Failed to map readback buffer: {}", error);
        }
    });
    device.poll(wgpu::PollType::Wait).unwrap();

    let data = readback.slice(..).get_mapped_range();
    let covered = data
        .chunks_exact(bytes_per_row as usize)
        .flat_map(|row| row[0..(WIDTH * 4) as usize].chunks_exact(4))
        .filter(|pixel| pixel[3] > 0)
        .count();
    info!("{} of {} pixels covered", covered, WIDTH * HEIGHT);
    let center = ((HEIGHT / 2 * bytes_per_row) + WIDTH / 2 * 4) as usize;
    info!("center pixel: {:?}", &data[center..center + 4]);
}
