//! GPU context shared by the engine and the texture pipeline.
//!
//! The page owns the context. The engine draws with it and the texture pipeline
//! uploads into it; neither owns it. [`GpuContext`] is the part of the context the
//! pipeline needs, [`WgpuContext`] is the implementation used in the browser (WebGL2
//! through wgpu) and on native hosts.

use anyhow::Context as _;

use crate::surface::Surface;

/// Texture creation as seen by the texture pipeline.
pub trait GpuContext: 'static {
    type Texture: 'static;

    /// A texture filled with a single texel, shown until the real image is uploaded.
    fn placeholder(&self, label: &str, rgba: [u8; 4]) -> Self::Texture;

    /// Upload a decoded image as a new texture.
    ///
    /// The whole image goes to mip level 0 as 8-bit RGBA with straight alpha; no
    /// mipmaps are generated.
    fn upload(&self, label: &str, image: &image::RgbaImage) -> anyhow::Result<Self::Texture>;
}

/// A GPU texture with its default view and sampler.
#[derive(Clone, Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

/// Colour textures keep their bytes as-is; gamma handling is up to the engine's shaders.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[derive(Debug)]
pub struct WgpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// Present when the context was created for an on-screen canvas.
    pub surface: Option<wgpu::Surface<'static>>,
    pub config: Option<wgpu::SurfaceConfiguration>,
}

impl WgpuContext {
    /// Negotiates an adapter and device for `surface`.
    ///
    /// In the browser the canvas becomes a wgpu surface that is configured to its
    /// current size. Native builds create an offscreen device only.
    pub async fn new(surface: &Surface) -> anyhow::Result<Self> {
        log::info!("setting up wgpu for surface `{}`", surface.id());
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        #[cfg(target_arch = "wasm32")]
        let target = Some(
            instance
                .create_surface(wgpu::SurfaceTarget::Canvas(surface.canvas().clone()))
                .context("canvas cannot back a wgpu surface")?,
        );
        #[cfg(not(target_arch = "wasm32"))]
        let target: Option<wgpu::Surface<'static>> = None;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: target.as_ref(),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("canvas-host device"),
                required_features: wgpu::Features::empty(),
                experimental_features: Default::default(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("GPU device request was refused")?;

        let config = target.as_ref().map(|target| {
            let caps = target.get_capabilities(&adapter);
            let format = caps
                .formats
                .iter()
                .copied()
                .find(|f| f.is_srgb())
                .unwrap_or(caps.formats[0]);
            let (width, height) = surface.size();
            wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format,
                width: width.max(1),
                height: height.max(1),
                present_mode: caps.present_modes[0],
                alpha_mode: caps.alpha_modes[0],
                view_formats: vec![],
                desired_maximum_frame_latency: 2,
            }
        });
        if let (Some(target), Some(config)) = (&target, &config) {
            target.configure(&device, config);
        }

        Ok(Self {
            device,
            queue,
            surface: target,
            config,
        })
    }

    fn create_texture(&self, label: &str, width: u32, height: u32, rgba: &[u8]) -> GpuTexture {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        GpuTexture {
            texture,
            view,
            sampler,
        }
    }
}

impl GpuContext for WgpuContext {
    type Texture = GpuTexture;

    fn placeholder(&self, label: &str, rgba: [u8; 4]) -> GpuTexture {
        self.create_texture(label, 1, 1, &rgba)
    }

    fn upload(&self, label: &str, image: &image::RgbaImage) -> anyhow::Result<GpuTexture> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("image has no pixels ({width}x{height})");
        }
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            anyhow::bail!("image is {width}x{height} but the device allows at most {max}x{max}");
        }
        Ok(self.create_texture(label, width, height, image.as_raw()))
    }
}
