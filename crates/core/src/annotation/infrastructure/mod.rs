pub mod canvas_renderer;
pub mod font_loader;
