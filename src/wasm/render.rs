use std::collections::HashMap;

use glam::Mat4;
use rand::rngs::StdRng;
use wasm_bindgen::JsCast;
use web_sys::{
    HtmlCanvasElement, WebGl2RenderingContext as GL, WebGlBuffer, WebGlFramebuffer,
    WebGlProgram, WebGlRenderbuffer, WebGlShader, WebGlTexture, WebGlUniformLocation,
    WebGlVertexArrayObject,
};

use super::shaders;
use crate::animation::{FrameView, RenderSurface};
use crate::effect::{EffectPipeline, EffectStage};
use crate::error::{FieldError, Result};
use crate::geometry::{self, Mesh};
use crate::glitch::{GlitchDriver, GlitchParams};
use crate::random::{stream_rng, GLITCH_STREAM};

const OCTAHEDRON_COLOR: u32 = 0xFFFF00;
const RING_COLOR: u32 = 0x9370DB;
const SOLID_OPACITY: f32 = 0.8;
const SKY_COLOR: u32 = 0x87CEEB;
const GROUND_COLOR: u32 = 0x8B4513;
const LIGHT_INTENSITY: f32 = 1.5;
const POINT_SIZE: f32 = 0.1;

fn rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xFF) as f32 / 255.0,
        ((hex >> 8) & 0xFF) as f32 / 255.0,
        (hex & 0xFF) as f32 / 255.0,
    ]
}

fn surface_err(what: &str) -> FieldError {
    FieldError::Surface(what.to_string())
}

/// A linked program and the uniform locations it was asked for.
struct Program {
    program: WebGlProgram,
    uniforms: HashMap<&'static str, WebGlUniformLocation>,
}

impl Program {
    fn new(gl: &GL, vs: &str, fs: &str, uniforms: &[&'static str]) -> Result<Self> {
        let vert = compile_shader(gl, GL::VERTEX_SHADER, vs)?;
        let frag = compile_shader(gl, GL::FRAGMENT_SHADER, fs)?;
        let program = link_program(gl, &vert, &frag)?;
        gl.delete_shader(Some(&vert));
        gl.delete_shader(Some(&frag));

        let uniforms = uniforms
            .iter()
            .filter_map(|&name| gl.get_uniform_location(&program, name).map(|loc| (name, loc)))
            .collect();
        Ok(Self { program, uniforms })
    }

    fn loc(&self, name: &str) -> Option<&WebGlUniformLocation> {
        self.uniforms.get(name)
    }
}

fn compile_shader(gl: &GL, kind: u32, source: &str) -> Result<WebGlShader> {
    let shader = gl
        .create_shader(kind)
        .ok_or_else(|| surface_err("cannot create shader"))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);
    if gl
        .get_shader_parameter(&shader, GL::COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(shader)
    } else {
        let log = gl.get_shader_info_log(&shader).unwrap_or_default();
        gl.delete_shader(Some(&shader));
        Err(FieldError::Surface(format!("shader compile failed: {log}")))
    }
}

fn link_program(gl: &GL, vert: &WebGlShader, frag: &WebGlShader) -> Result<WebGlProgram> {
    let program = gl
        .create_program()
        .ok_or_else(|| surface_err("cannot create program"))?;
    gl.attach_shader(&program, vert);
    gl.attach_shader(&program, frag);
    gl.link_program(&program);
    if gl
        .get_program_parameter(&program, GL::LINK_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(program)
    } else {
        let log = gl.get_program_info_log(&program).unwrap_or_default();
        gl.delete_program(Some(&program));
        Err(FieldError::Surface(format!("program link failed: {log}")))
    }
}

fn vertex_buffer(gl: &GL, location: u32, data: &[f32], usage: u32) -> Result<WebGlBuffer> {
    let buffer = gl
        .create_buffer()
        .ok_or_else(|| surface_err("cannot create buffer"))?;
    gl.bind_buffer(GL::ARRAY_BUFFER, Some(&buffer));
    gl.buffer_data_with_u8_array(GL::ARRAY_BUFFER, bytemuck::cast_slice(data), usage);
    gl.enable_vertex_attrib_array(location);
    gl.vertex_attrib_pointer_with_i32(location, 3, GL::FLOAT, false, 0, 0);
    Ok(buffer)
}

/// Static solid mesh.
struct MeshBuffers {
    vao: WebGlVertexArrayObject,
    vertex_count: i32,
}

impl MeshBuffers {
    fn new(gl: &GL, mesh: &Mesh) -> Result<Self> {
        let vao = gl
            .create_vertex_array()
            .ok_or_else(|| surface_err("cannot create vertex array"))?;
        gl.bind_vertex_array(Some(&vao));
        vertex_buffer(gl, 0, &mesh.positions, GL::STATIC_DRAW)?;
        vertex_buffer(gl, 1, &mesh.normals, GL::STATIC_DRAW)?;
        gl.bind_vertex_array(None);
        Ok(Self {
            vao,
            vertex_count: mesh.vertex_count() as i32,
        })
    }
}

/// Particle buffers, re-uploaded whenever the field marks them dirty.
struct PointBuffers {
    vao: WebGlVertexArrayObject,
    positions: WebGlBuffer,
    colors: WebGlBuffer,
    count: i32,
}

impl PointBuffers {
    fn new(gl: &GL) -> Result<Self> {
        let vao = gl
            .create_vertex_array()
            .ok_or_else(|| surface_err("cannot create vertex array"))?;
        gl.bind_vertex_array(Some(&vao));
        let positions = vertex_buffer(gl, 0, &[], GL::DYNAMIC_DRAW)?;
        let colors = vertex_buffer(gl, 1, &[], GL::DYNAMIC_DRAW)?;
        gl.bind_vertex_array(None);
        Ok(Self {
            vao,
            positions,
            colors,
            count: 0,
        })
    }

    fn upload(gl: &GL, buffer: &WebGlBuffer, data: &[f32]) {
        gl.bind_buffer(GL::ARRAY_BUFFER, Some(buffer));
        gl.buffer_data_with_u8_array(GL::ARRAY_BUFFER, bytemuck::cast_slice(data), GL::DYNAMIC_DRAW);
    }
}

/// Offscreen color + depth target for the effect chain.
struct RenderTarget {
    framebuffer: WebGlFramebuffer,
    texture: WebGlTexture,
    depth: WebGlRenderbuffer,
    width: u32,
    height: u32,
}

impl RenderTarget {
    fn new(gl: &GL, width: u32, height: u32) -> Result<Self> {
        let texture = gl
            .create_texture()
            .ok_or_else(|| surface_err("cannot create texture"))?;
        gl.bind_texture(GL::TEXTURE_2D, Some(&texture));
        gl.tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_u8_array(
            GL::TEXTURE_2D,
            0,
            GL::RGBA8 as i32,
            width as i32,
            height as i32,
            0,
            GL::RGBA,
            GL::UNSIGNED_BYTE,
            None,
        )
        .map_err(|e| FieldError::Surface(format!("texture allocation failed: {e:?}")))?;
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MIN_FILTER, GL::LINEAR as i32);
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MAG_FILTER, GL::LINEAR as i32);
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_S, GL::CLAMP_TO_EDGE as i32);
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_T, GL::CLAMP_TO_EDGE as i32);

        let depth = gl
            .create_renderbuffer()
            .ok_or_else(|| surface_err("cannot create renderbuffer"))?;
        gl.bind_renderbuffer(GL::RENDERBUFFER, Some(&depth));
        gl.renderbuffer_storage(
            GL::RENDERBUFFER,
            GL::DEPTH_COMPONENT24,
            width as i32,
            height as i32,
        );

        let framebuffer = gl
            .create_framebuffer()
            .ok_or_else(|| surface_err("cannot create framebuffer"))?;
        gl.bind_framebuffer(GL::FRAMEBUFFER, Some(&framebuffer));
        gl.framebuffer_texture_2d(
            GL::FRAMEBUFFER,
            GL::COLOR_ATTACHMENT0,
            GL::TEXTURE_2D,
            Some(&texture),
            0,
        );
        gl.framebuffer_renderbuffer(
            GL::FRAMEBUFFER,
            GL::DEPTH_ATTACHMENT,
            GL::RENDERBUFFER,
            Some(&depth),
        );
        let status = gl.check_framebuffer_status(GL::FRAMEBUFFER);
        gl.bind_framebuffer(GL::FRAMEBUFFER, None);
        if status != GL::FRAMEBUFFER_COMPLETE {
            return Err(FieldError::Surface(format!(
                "framebuffer incomplete: 0x{status:x}"
            )));
        }

        Ok(Self {
            framebuffer,
            texture,
            depth,
            width,
            height,
        })
    }

    fn delete(&self, gl: &GL) {
        gl.delete_framebuffer(Some(&self.framebuffer));
        gl.delete_texture(Some(&self.texture));
        gl.delete_renderbuffer(Some(&self.depth));
    }
}

/// WebGL2 canvas that draws the particle field and solids, optionally through
/// the render -> glitch -> output chain.
pub struct WebGlSurface {
    gl: GL,
    canvas: HtmlCanvasElement,
    mesh_program: Program,
    points_program: Program,
    copy_program: Program,
    glitch_program: Program,
    octahedron: MeshBuffers,
    ring: MeshBuffers,
    points: PointBuffers,
    fullscreen: WebGlVertexArrayObject,
    target: Option<RenderTarget>,
    stages: Vec<EffectStage>,
    glitch: GlitchDriver,
    rng: StdRng,
}

impl WebGlSurface {
    /// `seed` is the field seed; the glitch driver derives its own stream from it.
    pub fn new(canvas: HtmlCanvasElement, seed: Option<u64>) -> Result<Self> {
        let gl: GL = canvas
            .get_context("webgl2")
            .map_err(|e| FieldError::Surface(format!("getContext failed: {e:?}")))?
            .ok_or_else(|| surface_err("WebGL2 not supported"))?
            .dyn_into()
            .map_err(|_| surface_err("context is not WebGL2"))?;

        let mesh_program = Program::new(
            &gl,
            shaders::MESH_VS,
            shaders::MESH_FS,
            &[
                "u_view_proj",
                "u_model",
                "u_color",
                "u_opacity",
                "u_sky",
                "u_ground",
                "u_intensity",
            ],
        )?;
        let points_program = Program::new(
            &gl,
            shaders::POINTS_VS,
            shaders::POINTS_FS,
            &["u_view", "u_proj", "u_size", "u_scale"],
        )?;
        let copy_program = Program::new(&gl, shaders::FULLSCREEN_VS, shaders::COPY_FS, &["u_scene"])?;
        let glitch_program = Program::new(
            &gl,
            shaders::FULLSCREEN_VS,
            shaders::GLITCH_FS,
            &[
                "u_scene",
                "u_bypass",
                "u_amount",
                "u_angle",
                "u_seed",
                "u_seed_x",
                "u_seed_y",
                "u_distortion_x",
                "u_distortion_y",
                "u_col_s",
            ],
        )?;

        let octahedron = MeshBuffers::new(&gl, &geometry::octahedron(1.0))?;
        let ring = MeshBuffers::new(&gl, &geometry::torus(4.0, 1.0, 30, 200))?;
        let points = PointBuffers::new(&gl)?;
        let fullscreen = gl
            .create_vertex_array()
            .ok_or_else(|| surface_err("cannot create vertex array"))?;

        let mut rng = stream_rng(seed, GLITCH_STREAM)?;
        let glitch = GlitchDriver::new(&mut rng);

        Ok(Self {
            gl,
            canvas,
            mesh_program,
            points_program,
            copy_program,
            glitch_program,
            octahedron,
            ring,
            points,
            fullscreen,
            target: None,
            stages: Vec::new(),
            glitch,
            rng,
        })
    }

    fn upload(&mut self, frame: &FrameView<'_>) -> Result<()> {
        if frame.dirty.positions {
            self.points.count = i32::try_from(frame.field.len())
                .map_err(|_| surface_err("too many particles for one draw call"))?;
            PointBuffers::upload(&self.gl, &self.points.positions, frame.field.positions());
        }
        if frame.dirty.colors {
            PointBuffers::upload(&self.gl, &self.points.colors, frame.field.colors());
        }
        Ok(())
    }

    /// Offscreen target matching the canvas, recreated after a resize.
    fn target(&mut self, width: u32, height: u32) -> Result<&RenderTarget> {
        let stale = self
            .target
            .as_ref()
            .map_or(true, |t| t.width != width || t.height != height);
        if stale {
            if let Some(old) = self.target.take() {
                old.delete(&self.gl);
            }
            self.target = Some(RenderTarget::new(&self.gl, width, height)?);
        }
        self.target
            .as_ref()
            .ok_or_else(|| surface_err("render target missing"))
    }

    fn draw_scene(&self, frame: &FrameView<'_>, width: u32, height: u32) {
        let gl = &self.gl;
        let aspect = width as f32 / height as f32;
        let view = frame.camera.view();
        let proj = frame.camera.projection(aspect);

        gl.viewport(0, 0, width as i32, height as i32);
        gl.clear_color(0.0, 0.0, 0.0, 1.0);
        gl.clear(GL::COLOR_BUFFER_BIT | GL::DEPTH_BUFFER_BIT);
        gl.enable(GL::DEPTH_TEST);

        // opaque points first
        gl.disable(GL::BLEND);
        let p = &self.points_program;
        gl.use_program(Some(&p.program));
        gl.uniform_matrix4fv_with_f32_array(p.loc("u_view"), false, &view.to_cols_array());
        gl.uniform_matrix4fv_with_f32_array(p.loc("u_proj"), false, &proj.to_cols_array());
        gl.uniform1f(p.loc("u_size"), POINT_SIZE);
        gl.uniform1f(p.loc("u_scale"), height as f32 / 2.0);
        gl.bind_vertex_array(Some(&self.points.vao));
        gl.draw_arrays(GL::POINTS, 0, self.points.count);

        gl.enable(GL::BLEND);
        gl.blend_func(GL::SRC_ALPHA, GL::ONE_MINUS_SRC_ALPHA);
        let m = &self.mesh_program;
        gl.use_program(Some(&m.program));
        gl.uniform_matrix4fv_with_f32_array(
            m.loc("u_view_proj"),
            false,
            &(proj * view).to_cols_array(),
        );
        gl.uniform1f(m.loc("u_opacity"), SOLID_OPACITY);
        gl.uniform3fv_with_f32_array(m.loc("u_sky"), &rgb(SKY_COLOR));
        gl.uniform3fv_with_f32_array(m.loc("u_ground"), &rgb(GROUND_COLOR));
        gl.uniform1f(m.loc("u_intensity"), LIGHT_INTENSITY);

        let solids = [
            (&self.octahedron, frame.solids.octahedron_model(), rgb(OCTAHEDRON_COLOR)),
            (&self.ring, frame.solids.ring_model(), rgb(RING_COLOR)),
        ];
        for (mesh, model, color) in solids {
            self.draw_mesh(mesh, model, color);
        }
        gl.bind_vertex_array(None);
    }

    fn draw_mesh(&self, mesh: &MeshBuffers, model: Mat4, color: [f32; 3]) {
        let m = &self.mesh_program;
        self.gl
            .uniform_matrix4fv_with_f32_array(m.loc("u_model"), false, &model.to_cols_array());
        self.gl.uniform3fv_with_f32_array(m.loc("u_color"), &color);
        self.gl.bind_vertex_array(Some(&mesh.vao));
        self.gl.draw_arrays(GL::TRIANGLES, 0, mesh.vertex_count);
    }

    fn present(&self, texture: &WebGlTexture, glitch: Option<GlitchParams>, width: u32, height: u32) {
        let gl = &self.gl;
        gl.bind_framebuffer(GL::FRAMEBUFFER, None);
        gl.viewport(0, 0, width as i32, height as i32);
        gl.disable(GL::DEPTH_TEST);
        gl.disable(GL::BLEND);
        gl.active_texture(GL::TEXTURE0);
        gl.bind_texture(GL::TEXTURE_2D, Some(texture));

        let program = match glitch {
            Some(params) => {
                let g = &self.glitch_program;
                gl.use_program(Some(&g.program));
                gl.uniform1i(g.loc("u_bypass"), i32::from(params.bypass));
                gl.uniform1f(g.loc("u_amount"), params.amount);
                gl.uniform1f(g.loc("u_angle"), params.angle);
                gl.uniform1f(g.loc("u_seed"), params.seed);
                gl.uniform1f(g.loc("u_seed_x"), params.seed_x);
                gl.uniform1f(g.loc("u_seed_y"), params.seed_y);
                gl.uniform1f(g.loc("u_distortion_x"), params.distortion_x);
                gl.uniform1f(g.loc("u_distortion_y"), params.distortion_y);
                gl.uniform1f(g.loc("u_col_s"), params.col_s);
                g
            }
            None => {
                gl.use_program(Some(&self.copy_program.program));
                &self.copy_program
            }
        };
        gl.uniform1i(program.loc("u_scene"), 0);
        gl.bind_vertex_array(Some(&self.fullscreen));
        gl.draw_arrays(GL::TRIANGLES, 0, 3);
        gl.bind_vertex_array(None);
    }
}

impl RenderSurface for WebGlSurface {
    fn draw(&mut self, frame: &FrameView<'_>) -> Result<()> {
        if self.gl.is_context_lost() {
            return Err(surface_err("WebGL context lost"));
        }
        let (width, height) = (self.canvas.width(), self.canvas.height());
        if width == 0 || height == 0 {
            return Err(surface_err("canvas has zero size"));
        }

        self.upload(frame)?;

        if !self.stages.contains(&EffectStage::Render) {
            self.gl.bind_framebuffer(GL::FRAMEBUFFER, None);
            self.draw_scene(frame, width, height);
            return Ok(());
        }

        let glitch = if self.stages.contains(&EffectStage::Glitch) {
            Some(self.glitch.next(&mut self.rng))
        } else {
            None
        };

        let framebuffer = self.target(width, height)?.framebuffer.clone();
        self.gl.bind_framebuffer(GL::FRAMEBUFFER, Some(&framebuffer));
        self.draw_scene(frame, width, height);

        if self.stages.contains(&EffectStage::Output) {
            if let Some(target) = self.target.as_ref() {
                self.present(&target.texture, glitch, width, height);
            }
        }
        Ok(())
    }
}

impl EffectPipeline for WebGlSurface {
    fn set_stages(&mut self, stages: &[EffectStage]) {
        self.stages = stages.to_vec();
    }

    fn stages(&self) -> &[EffectStage] {
        &self.stages
    }
}
