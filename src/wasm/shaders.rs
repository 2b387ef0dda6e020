// GLSL ES 3.00 sources for the WebGL2 surface.

pub const MESH_VS: &str = include_str!("shaders/mesh.vert");
pub const MESH_FS: &str = include_str!("shaders/mesh.frag");
pub const POINTS_VS: &str = include_str!("shaders/points.vert");
pub const POINTS_FS: &str = include_str!("shaders/points.frag");
pub const FULLSCREEN_VS: &str = include_str!("shaders/fullscreen.vert");
pub const COPY_FS: &str = include_str!("shaders/copy.frag");
pub const GLITCH_FS: &str = include_str!("shaders/glitch.frag");
