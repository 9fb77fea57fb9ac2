/// WGSL shader code for the preview renderer
///
/// One textured quad per frame. The vertex stage places the quad from the
/// frame layout (fit scale, pan/zoom) and maps its corners onto the crop
/// window. The fragment stage applies the shared colour matrix, the same
/// one the CPU export bake uses.

/// Quad + colour matrix shader
///
/// The uniform layout must match `GpuUniforms` in pipeline.rs:
/// mat4x4 (64) + vec4 (16) + 4 x vec2 (32) = 112 bytes.
pub const PREVIEW_SHADER: &str = r#"
struct Uniforms {
    color_matrix: mat4x4<f32>,
    color_offset: vec4<f32>,
    half_extent: vec2<f32>,
    translate: vec2<f32>,
    uv_min: vec2<f32>,
    uv_max: vec2<f32>,
}

@group(0) @binding(0) var image_texture: texture_2d<f32>;
@group(0) @binding(1) var image_sampler: sampler;
@group(0) @binding(2) var<uniform> uniforms: Uniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coords: vec2<f32>,
}

// ========== Vertex Shader ==========
// Triangle strip, no vertex buffers:
// 0 -> (-1,  1), 1 -> (-1, -1), 2 -> (1, 1), 3 -> (1, -1)
@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;

    let x = select(-1.0, 1.0, vertex_index >= 2u);
    let y = select(1.0, -1.0, (vertex_index & 1u) == 1u);
    let corner = vec2<f32>(x, y);

    output.clip_position = vec4<f32>(corner * uniforms.half_extent + uniforms.translate, 0.0, 1.0);

    // Clip Y points up, texture V points down
    let t = vec2<f32>(corner.x * 0.5 + 0.5, 0.5 - corner.y * 0.5);
    output.tex_coords = mix(uniforms.uv_min, uniforms.uv_max, t);

    return output;
}

// ========== Fragment Shader ==========
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(image_texture, image_sampler, input.tex_coords);
    let graded = uniforms.color_matrix * color + uniforms.color_offset;
    return clamp(graded, vec4<f32>(0.0), vec4<f32>(1.0));
}
"#;

/// Get the shader source
pub fn get_shader() -> &'static str {
    PREVIEW_SHADER
}
