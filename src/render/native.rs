use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat3, Vec3};
use log::{debug, warn};
use wgpu::util::DeviceExt;
use winit::window::{Window, WindowId};

use super::{physical_size, RenderError, RenderSurface, RendererOptions};
use crate::camera::PerspectiveCamera;
use crate::geometry::{Geometry, MeshData};
use crate::scene::{Light, Scene};

const MSAA_SAMPLES: u32 = 4;

/// wgpu-backed surface drawing into a native window.
pub struct GpuSurface {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    logical_size: (u32, u32),
    pixel_ratio: f64,
    sample_count: u32,
    targets: FrameTargets,
    pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    mesh_cache: HashMap<String, MeshBuffers>,
}

impl GpuSurface {
    /// Initializes the GPU for the provided window.
    pub async fn new(window: Arc<Window>, options: RendererOptions) -> Result<Self> {
        let size = window.inner_size();
        let pixel_ratio = window.scale_factor();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("hero-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                ..Default::default()
            })
            .await
            .context("failed to create GPU device")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no supported formats")?;
        let alpha_mode = pick_alpha_mode(&caps.alpha_modes, options.alpha);

        let sample_count = if options.antialias
            && adapter
                .get_texture_format_features(format)
                .flags
                .sample_count_supported(MSAA_SAMPLES)
        {
            MSAA_SAMPLES
        } else {
            1
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        let targets = FrameTargets::create(&device, &config, sample_count);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("hero-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let global_layout = uniform_layout::<GlobalUniform>(&device, "global-bind-layout");
        let object_layout = uniform_layout::<ObjectConstants>(&device, "object-bind-layout");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("hero-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("hero-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: (MeshData::STRIDE * std::mem::size_of::<f32>()) as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        },
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: (3 * std::mem::size_of::<f32>()) as u64,
                            shader_location: 1,
                        },
                    ],
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: FrameTargets::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        debug!(
            "gpu surface ready: {}x{} {format:?} msaa={sample_count} alpha={alpha_mode:?}",
            config.width, config.height
        );

        let logical_size = (
            (size.width as f64 / pixel_ratio).round() as u32,
            (size.height as f64 / pixel_ratio).round() as u32,
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            logical_size,
            pixel_ratio,
            sample_count,
            targets,
            pipeline,
            global_buffer,
            global_bind_group,
            object_layout,
            mesh_cache: HashMap::new(),
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn reconfigure(&mut self) {
        let (width, height) =
            physical_size(self.logical_size.0, self.logical_size.1, self.pixel_ratio);
        if width == self.config.width && height == self.config.height {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.targets = FrameTargets::create(&self.device, &self.config, self.sample_count);
    }

    /// Uploads `geometry` once; later frames reuse the buffers.
    fn upload_mesh(&mut self, geometry: &Geometry) -> String {
        let device = &self.device;
        let key = geometry.cache_key();
        self.mesh_cache
            .entry(key.clone())
            .or_insert_with(|| MeshBuffers::from_mesh(device, &geometry.tessellate(), &key));
        key
    }
}

impl RenderSurface for GpuSurface {
    fn set_size(&mut self, width: u32, height: u32) {
        self.logical_size = (width, height);
        self.reconfigure();
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
        self.reconfigure();
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), RenderError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(RenderError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::Timeout) => return Err(RenderError::Timeout),
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(other) => return Err(RenderError::Backend(other.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let params = camera.params();
        let lighting = scene.lighting();
        let (ambient, sun_color) = linear_light_colors(scene);
        let (fog_color, fog_range) = match scene.fog {
            Some(fog) => (
                srgb_to_linear(fog.color.rgb()).extend(1.0),
                [fog.near, fog.far, 0.0, 0.0],
            ),
            None => (glam::Vec4::ZERO, [0.0; 4]),
        };
        let globals = GlobalUniform {
            view_proj: params.view_proj.to_cols_array_2d(),
            camera_position: params.position.extend(1.0).into(),
            ambient: ambient.extend(0.0).into(),
            sun_direction: lighting.sun_direction.extend(0.0).into(),
            sun_color: sun_color.extend(0.0).into(),
            fog_color: fog_color.into(),
            fog_range,
        };
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&globals));

        let items = scene.draw_list();
        let mut draws = Vec::with_capacity(items.len());
        for item in &items {
            let key = self.upload_mesh(&item.mesh.geometry);

            let normal = Mat3::from_mat4(item.world).inverse().transpose();
            let material = item.mesh.material;
            let constants = ObjectConstants {
                model: item.world.to_cols_array_2d(),
                normal: mat3_to_3x4(normal),
                color: srgb_to_linear(material.color.rgb()).extend(1.0).into(),
                surface: [material.metalness, material.roughness, 0.0, 0.0],
            };
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("object-uniform"),
                    contents: bytes_of(&constants),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("object-bind-group"),
                layout: &self.object_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            draws.push((key, bind_group));
        }

        let background = srgb_to_linear(scene.background.rgb());
        let clear = wgpu::Color {
            r: background.x as f64,
            g: background.y as f64,
            b: background.z as f64,
            a: 1.0,
        };
        let (color_view, resolve_target) = match &self.targets.msaa {
            Some(msaa) => (msaa, Some(&view)),
            None => (&view, None),
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("hero-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("hero-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.global_bind_group, &[]);
            for (key, bind_group) in &draws {
                let Some(mesh) = self.mesh_cache.get(key) else {
                    warn!("mesh {key} missing from cache");
                    continue;
                };
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.set_bind_group(1, bind_group, &[]);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }
}

fn pick_alpha_mode(modes: &[wgpu::CompositeAlphaMode], transparent: bool) -> wgpu::CompositeAlphaMode {
    let preferred: &[wgpu::CompositeAlphaMode] = if transparent {
        &[
            wgpu::CompositeAlphaMode::PreMultiplied,
            wgpu::CompositeAlphaMode::PostMultiplied,
        ]
    } else {
        &[wgpu::CompositeAlphaMode::Opaque]
    };
    preferred
        .iter()
        .find(|mode| modes.contains(mode))
        .or_else(|| modes.first())
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

fn uniform_layout<T>(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
            },
            count: None,
        }],
    })
}

/// Ambient and sun radiance in linear space. Intensities scale the decoded
/// color, they are not themselves gamma encoded.
fn linear_light_colors(scene: &Scene) -> (Vec3, Vec3) {
    let mut ambient = Vec3::ZERO;
    let mut sun = Vec3::ZERO;
    for light in &scene.lights {
        match *light {
            Light::Ambient { color, intensity } => {
                ambient += srgb_to_linear(color.rgb()) * intensity;
            }
            Light::Directional {
                color, intensity, ..
            } => sun += srgb_to_linear(color.rgb()) * intensity,
        }
    }
    (ambient, sun)
}

fn srgb_to_linear(color: Vec3) -> Vec3 {
    let channel = |c: f32| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Vec3::new(channel(color.x), channel(color.y), channel(color.z))
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &MeshData, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

/// Depth buffer plus the optional multisampled color target.
struct FrameTargets {
    depth: wgpu::TextureView,
    msaa: Option<wgpu::TextureView>,
}

impl FrameTargets {
    const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration, samples: u32) -> Self {
        let size = wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = |label: &str, format: wgpu::TextureFormat| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size,
                    mip_level_count: 1,
                    sample_count: samples,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        Self {
            depth: texture("depth-texture", Self::DEPTH_FORMAT),
            msaa: (samples > 1).then(|| texture("msaa-color", config.format)),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    ambient: [f32; 4],
    sun_direction: [f32; 4],
    sun_color: [f32; 4],
    fog_color: [f32; 4],
    fog_range: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    color: [f32; 4],
    surface: [f32; 4],
}

const SHADER: &str = r#"
struct GlobalUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    ambient: vec4<f32>,
    sun_direction: vec4<f32>,
    sun_color: vec4<f32>,
    fog_color: vec4<f32>,
    fog_range: vec4<f32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
    surface: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

@group(1) @binding(0)
var<uniform> item: ObjectConstants;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = item.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;

    let world_normal = mat3x3<f32>(
        item.normal[0].xyz,
        item.normal[1].xyz,
        item.normal[2].xyz
    ) * input.normal;

    out.normal = normalize(world_normal);
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.normal);
    let to_light = -normalize(globals.sun_direction.xyz);
    let to_eye = normalize(globals.camera_position.xyz - input.world_pos);
    let diffuse = max(dot(normal, to_light), 0.0);

    let metalness = item.surface.x;
    let roughness = clamp(item.surface.y, 0.05, 1.0);
    let half_dir = normalize(to_light + to_eye);
    let shininess = 2.0 / (roughness * roughness);
    let specular = pow(max(dot(normal, half_dir), 0.0), shininess) * (1.0 - roughness) * diffuse;

    let albedo = item.color.rgb;
    let lit = albedo * (globals.ambient.rgb + globals.sun_color.rgb * diffuse * (1.0 - 0.5 * metalness))
        + mix(vec3<f32>(0.04), albedo, metalness) * globals.sun_color.rgb * specular;

    var color = lit;
    if (globals.fog_color.w > 0.0) {
        let distance = length(globals.camera_position.xyz - input.world_pos);
        let near = globals.fog_range.x;
        let far = globals.fog_range.y;
        let fog = clamp((distance - near) / max(far - near, 0.0001), 0.0, 1.0);
        color = mix(lit, globals.fog_color.rgb, fog);
    }
    return vec4<f32>(color, item.color.a);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[test]
    fn alpha_mode_prefers_premultiplied_when_transparent() {
        let modes = [
            wgpu::CompositeAlphaMode::Opaque,
            wgpu::CompositeAlphaMode::PreMultiplied,
        ];
        assert_eq!(
            pick_alpha_mode(&modes, true),
            wgpu::CompositeAlphaMode::PreMultiplied
        );
        assert_eq!(pick_alpha_mode(&modes, false), wgpu::CompositeAlphaMode::Opaque);
        assert_eq!(
            pick_alpha_mode(&[wgpu::CompositeAlphaMode::Opaque], true),
            wgpu::CompositeAlphaMode::Opaque
        );
    }

    #[test]
    fn srgb_round_trips_endpoints() {
        assert_eq!(srgb_to_linear(Vec3::ZERO), Vec3::ZERO);
        assert!((srgb_to_linear(Vec3::ONE) - Vec3::ONE).length() < 1e-6);
        assert!(srgb_to_linear(Vec3::splat(0.5)).x < 0.5);
    }

    #[test]
    fn light_intensity_is_applied_after_decoding() {
        let mut scene = Scene::new(Color::WHITE);
        scene.lights.push(Light::Ambient {
            color: Color::WHITE,
            intensity: 0.6,
        });
        scene.lights.push(Light::Directional {
            color: Color::WHITE,
            intensity: 0.8,
            position: Vec3::new(10.0, 20.0, 10.0),
            cast_shadow: true,
        });
        let (ambient, sun) = linear_light_colors(&scene);
        assert!((ambient - Vec3::splat(0.6)).length() < 1e-5);
        assert!((sun - Vec3::splat(0.8)).length() < 1e-5);

        scene.lights.truncate(1);
        scene.lights[0] = Light::Ambient {
            color: Color(0x808080),
            intensity: 0.5,
        };
        let (ambient, sun) = linear_light_colors(&scene);
        let expected = srgb_to_linear(Color(0x808080).rgb()) * 0.5;
        assert!((ambient - expected).length() < 1e-6);
        assert_eq!(sun, Vec3::ZERO);
    }

    #[test]
    fn uniforms_are_sixteen_byte_aligned() {
        assert_eq!(std::mem::size_of::<GlobalUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<ObjectConstants>() % 16, 0);
    }
}
