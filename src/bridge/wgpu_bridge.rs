use super::{BridgeError, DecodeBridge, expand_layer};
use crate::imaging::PixelBuffer;
use crate::texture::{CubeFace, Cubemap, Layer, PixelFormat, Surface};
use std::sync::mpsc;
use tracing::debug;

/// Headless GPU decoder built on `wgpu`.
///
/// Created with [`WgpuBridge::new`] it owns no device and acquires a
/// transient one for each decode call. [`WgpuBridge::session`] (and
/// [`DecodeBridge::open_session`]) hold a device until dropped.
#[derive(Default)]
pub struct WgpuBridge {
    context: Option<GpuContext>,
}

impl WgpuBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session() -> Result<Self, BridgeError> {
        Ok(Self {
            context: Some(GpuContext::acquire()?),
        })
    }

    /// Run `f` on the owned context, or on a transient one that is released
    /// when `f` returns, whether or not it succeeded.
    fn with_gpu<T>(
        &self,
        f: impl FnOnce(&GpuContext) -> Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        match &self.context {
            Some(ctx) => f(ctx),
            None => {
                let ctx = GpuContext::acquire()?;
                debug!("acquired transient decode context");
                f(&ctx)
            }
        }
    }
}

impl DecodeBridge for WgpuBridge {
    fn decode_layer(&self, layer: &Layer) -> Result<PixelBuffer, BridgeError> {
        if !layer.format().is_block_compressed() {
            return expand_layer(layer);
        }
        self.with_gpu(|ctx| ctx.decode(layer))
    }

    fn open_session(&self) -> Result<Box<dyn DecodeBridge>, BridgeError> {
        Ok(Box::new(Self::session()?))
    }

    fn decode_surface(&self, surface: &Surface) -> Result<Vec<PixelBuffer>, BridgeError> {
        if !surface.format().is_block_compressed() {
            return surface.layers().iter().map(expand_layer).collect();
        }
        self.with_gpu(|ctx| surface.layers().iter().map(|l| ctx.decode(l)).collect())
    }

    fn decode_cube(&self, cube: &Cubemap) -> Result<Vec<PixelBuffer>, BridgeError> {
        let bases = CubeFace::DECODE_ORDER.map(|face| cube.face(face).base());
        if !cube.format().is_block_compressed() {
            return bases.into_iter().map(expand_layer).collect();
        }
        self.with_gpu(|ctx| bases.into_iter().map(|l| ctx.decode(l)).collect())
    }
}

struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
}

impl GpuContext {
    fn acquire() -> Result<Self, BridgeError> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| BridgeError::NoAdapter(e.to_string()))?;
        if !adapter
            .features()
            .contains(wgpu::Features::TEXTURE_COMPRESSION_BC)
        {
            return Err(BridgeError::MissingFeature);
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("texview-decode-device"),
            required_features: wgpu::Features::TEXTURE_COMPRESSION_BC,
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .map_err(|e| BridgeError::Device(e.to_string()))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("texview-readback"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/readback.wgsl").into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texview-readback-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("texview-readback-pipeline-layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("texview-readback-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            layout,
        })
    }

    /// Upload one compressed layer, draw it into an RGBA8 target and read
    /// the target back.
    fn decode(&self, layer: &Layer) -> Result<PixelBuffer, BridgeError> {
        let format = layer.format();
        let (width, height) = (layer.width(), layer.height());
        let texture_format = match format {
            PixelFormat::Bc1 | PixelFormat::Bc1a => wgpu::TextureFormat::Bc1RgbaUnorm,
            PixelFormat::Bc2 => wgpu::TextureFormat::Bc2RgbaUnorm,
            PixelFormat::Bc3 => wgpu::TextureFormat::Bc3RgbaUnorm,
            _ => return expand_layer(layer),
        };
        let limit = self.device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(BridgeError::TooLarge {
                format,
                width,
                height,
                limit,
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let rgba = self.draw_and_read(layer, texture_format);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BridgeError::Readback(err.to_string()));
        }
        let mut rgba = rgba?;

        // DXT1 without alpha: punch-through texels read back as transparent
        // black but the format is opaque.
        if format == PixelFormat::Bc1 {
            for px in rgba.chunks_exact_mut(4) {
                px[3] = u8::MAX;
            }
        }
        Ok(PixelBuffer::from_rgba_top_down(width, height, &rgba)?)
    }

    fn draw_and_read(
        &self,
        layer: &Layer,
        texture_format: wgpu::TextureFormat,
    ) -> Result<Vec<u8>, BridgeError> {
        let (width, height) = (layer.width(), layer.height());
        let blocks_x = width.div_ceil(4);
        let blocks_y = height.div_ceil(4);
        let block_bytes = layer.format().block_bytes().unwrap_or(16) as u32;

        // Compressed textures must cover whole blocks.
        let physical = wgpu::Extent3d {
            width: blocks_x * 4,
            height: blocks_y * 4,
            depth_or_array_layers: 1,
        };
        let src = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("texview-compressed-layer"),
            size: physical,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            src.as_image_copy(),
            layer.data(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(blocks_x * block_bytes),
                rows_per_image: Some(blocks_y),
            },
            physical,
        );

        let logical = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let target = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("texview-readback-target"),
            size: logical,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let src_view = src.create_view(&wgpu::TextureViewDescriptor::default());
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texview-readback-bind"),
            layout: &self.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&src_view),
            }],
        });

        let row_bytes = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = row_bytes.div_ceil(align) * align;
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texview-readback-buffer"),
            size: u64::from(padded_row) * u64::from(height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("texview-readback-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("texview-readback-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind, &[]);
            pass.draw(0..3, 0..1);
        }
        encoder.copy_texture_to_buffer(
            target.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            logical,
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = sender.send(res);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| BridgeError::Readback(e.to_string()))?;
        receiver
            .recv()
            .map_err(|e| BridgeError::Readback(e.to_string()))?
            .map_err(|e| BridgeError::Readback(e.to_string()))?;

        let data = slice.get_mapped_range();
        let mut rgba = Vec::with_capacity(row_bytes as usize * height as usize);
        for row in data.chunks_exact(padded_row as usize) {
            rgba.extend_from_slice(&row[..row_bytes as usize]);
        }
        drop(data);
        readback.unmap();
        Ok(rgba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Pixel;

    // No test here touches a GPU: uncompressed data never acquires one.

    #[test]
    fn transient_bridge_expands_uncompressed_without_gpu() {
        let layer = Layer::new(PixelFormat::Bgra8, 1, 1, vec![10, 20, 30, 40]).unwrap();
        let buf = WgpuBridge::new().decode_layer(&layer).unwrap();
        assert_eq!(buf.get(0, 0), Pixel::new(30, 20, 10, 40));
    }

    #[test]
    fn uncompressed_surface_skips_gpu() {
        let surface = Surface::new(vec![
            Layer::new(PixelFormat::Rgb565, 2, 2, vec![0xff; 8]).unwrap(),
            Layer::new(PixelFormat::Rgb565, 1, 1, vec![0xff; 2]).unwrap(),
        ])
        .unwrap();
        let levels = WgpuBridge::new().decode_surface(&surface).unwrap();
        assert_eq!(levels.len(), 2);
        assert!(levels.iter().all(|l| l.is_opaque()));
    }
}
