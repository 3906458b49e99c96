pub mod render;

pub use render::{
    BACKGROUND, Canvas, FONT_SEARCH_PATHS, TextRenderer, blit_premultiplied, load_font,
    render_text_pixmap, text_width, wrap_lines,
};
